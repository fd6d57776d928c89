// src/exec/install.rs

//! Dependency install step.
//!
//! A task's install command runs only when its manifest (e.g. `package.json`
//! in the source folder) changed since the last successful install. The
//! manifest's blake3 hash is stamped under
//! `<temporary folder>/npm/<task>/<mode>/.manifest-hash`.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::Context;
use blake3::Hasher;
use tracing::{debug, info};

use crate::errors::Result;
use crate::exec::{OutputTarget, execute};
use crate::project::{BuildContext, InstallStep};

/// File name of the stamp holding the last installed manifest hash.
pub const MANIFEST_HASH_FILE: &str = ".manifest-hash";

/// Compute the hash of a single file.
pub fn compute_file_hash(path: &Path) -> Result<String> {
    let mut hasher = Hasher::new();
    let mut file =
        File::open(path).with_context(|| format!("opening file for hashing: {:?}", path))?;
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

pub fn stamp_path(ctx: &BuildContext) -> PathBuf {
    ctx.temporary_folder("npm/#TASK_NAME#/#MODE_NAME#/")
        .join(MANIFEST_HASH_FILE)
}

/// Run the task's install step if its manifest changed.
///
/// Returns `Ok(false)` when there is nothing to install (no install step, no
/// manifest in the source folder, or an unchanged manifest).
pub async fn ensure_dependencies(ctx: &BuildContext) -> Result<bool> {
    let Some(task) = ctx.task() else {
        return Ok(false);
    };
    let Some(step) = task.install() else {
        return Ok(false);
    };
    let Some(source) = ctx.source_folder() else {
        return Ok(false);
    };

    let manifest = source.join(&step.manifest);
    if !manifest.is_file() {
        debug!(task = %task.name(), manifest = ?manifest, "no install manifest; skipping install");
        return Ok(false);
    }

    let hash = compute_file_hash(&manifest)?;
    let stamp = stamp_path(ctx);
    let previous = tokio::fs::read_to_string(&stamp).await.ok();
    if previous.as_deref().map(str::trim) == Some(hash.as_str()) {
        debug!(task = %task.name(), "install manifest unchanged");
        return Ok(false);
    }

    run_install(ctx, step, &source).await?;

    if let Some(parent) = stamp.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&stamp, &hash).await?;
    info!(task = %task.name(), hash = %hash, "dependencies installed");
    Ok(true)
}

async fn run_install(ctx: &BuildContext, step: &InstallStep, source: &Path) -> Result<()> {
    ctx.log(&format!("\n# INSTALL: {} #\n", step.command)).await;
    let command = ctx.shell_command(&step.command).current_dir(source);
    execute(&command, &OutputTarget::from(ctx.output().cloned())).await
}

#[cfg(all(test, unix))]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::project::{Application, BuildParams, CommandBackend, Task};

    fn context(root: &Path, tmp: &Path, install: &str) -> BuildContext {
        let task = Task::new("client", root, Arc::new(CommandBackend::new("true"))).with_install(
            InstallStep {
                command: install.to_string(),
                manifest: "package.json".to_string(),
            },
        );
        let app = Arc::new(Application::new("web", root, root).with_task(task));
        let task = app.tasks()[0].clone();
        let params = BuildParams {
            temporary_root: tmp.to_path_buf(),
            ..BuildParams::default()
        };
        BuildContext::for_task(params, app, task)
    }

    #[tokio::test]
    async fn install_runs_only_when_manifest_changes() {
        let root = tempfile::tempdir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("src")).unwrap();
        std::fs::write(root.path().join("src/package.json"), "{}").unwrap();

        let ctx = context(root.path(), tmp.path(), "echo run >> installs.log");

        assert!(ensure_dependencies(&ctx).await.unwrap());
        assert!(!ensure_dependencies(&ctx).await.unwrap());

        std::fs::write(root.path().join("src/package.json"), "{\"a\":1}").unwrap();
        assert!(ensure_dependencies(&ctx).await.unwrap());

        let installs = std::fs::read_to_string(root.path().join("src/installs.log")).unwrap();
        assert_eq!(installs.lines().count(), 2);
    }

    #[tokio::test]
    async fn missing_manifest_skips_install() {
        let root = tempfile::tempdir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        let ctx = context(root.path(), tmp.path(), "exit 1");

        assert!(!ensure_dependencies(&ctx).await.unwrap());
    }

    #[tokio::test]
    async fn failed_install_is_not_stamped() {
        let root = tempfile::tempdir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("src")).unwrap();
        std::fs::write(root.path().join("src/package.json"), "{}").unwrap();
        let ctx = context(root.path(), tmp.path(), "exit 1");

        assert!(ensure_dependencies(&ctx).await.is_err());
        assert!(!stamp_path(&ctx).exists());
    }
}
