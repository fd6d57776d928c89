// src/config/validate.rs

use std::collections::HashSet;

use globset::Glob;

use crate::config::model::{ApplicationManifest, RawApplicationManifest, Settings};
use crate::errors::{ComposeWatchError, Result};

impl TryFrom<RawApplicationManifest> for ApplicationManifest {
    type Error = ComposeWatchError;

    fn try_from(raw: RawApplicationManifest) -> std::result::Result<Self, Self::Error> {
        validate_manifest(&raw)?;
        Ok(ApplicationManifest::new_unchecked(raw.root, raw.tasks))
    }
}

/// Check an application manifest for the mistakes that would otherwise only
/// show up on the first rebuild.
pub fn validate_manifest(manifest: &RawApplicationManifest) -> Result<()> {
    ensure_has_tasks(manifest)?;
    validate_tasks(manifest)?;
    Ok(())
}

fn ensure_has_tasks(manifest: &RawApplicationManifest) -> Result<()> {
    if manifest.tasks.is_empty() {
        return Err(ComposeWatchError::ConfigError(
            "application manifest must contain at least one [[task]] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_tasks(manifest: &RawApplicationManifest) -> Result<()> {
    let mut seen = HashSet::new();

    for task in manifest.tasks.iter() {
        let name = task.effective_name();

        if task.cmd.trim().is_empty() {
            return Err(ComposeWatchError::ConfigError(format!(
                "task '{}' has an empty `cmd`",
                name
            )));
        }

        if !seen.insert(name.clone()) {
            return Err(ComposeWatchError::ConfigError(format!(
                "task name '{}' is used more than once",
                name
            )));
        }

        if matches!(task.install.as_deref(), Some(cmd) if cmd.trim().is_empty()) {
            return Err(ComposeWatchError::ConfigError(format!(
                "task '{}' has an empty `install` command",
                name
            )));
        }

        for pattern in task.exclude.iter() {
            if let Err(err) = Glob::new(pattern) {
                return Err(ComposeWatchError::ConfigError(format!(
                    "task '{}' has an invalid exclude pattern '{}': {}",
                    name, pattern, err
                )));
            }
        }
    }
    Ok(())
}

/// Sanity checks on resolved project settings.
pub fn validate_settings(settings: &Settings) -> Result<()> {
    if settings.name.trim().is_empty() {
        return Err(ComposeWatchError::ConfigError(
            "[project].name must not be empty".to_string(),
        ));
    }

    let timing = &settings.timing;
    let intervals = [
        ("build_interval", timing.build_interval),
        ("image_interval", timing.image_interval),
        ("restart_interval", timing.restart_interval),
        ("docker_logs_polling_interval", timing.logs_interval),
    ];
    for (key, value) in intervals {
        if value.is_zero() {
            return Err(ComposeWatchError::ConfigError(format!(
                "[timing].{key} must be >= 1 (got 0)"
            )));
        }
    }

    if settings.compose_program.split_whitespace().next().is_none() {
        return Err(ComposeWatchError::ConfigError(
            "[project].compose_program must not be empty".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::TaskManifest;

    fn manifest(tasks: Vec<TaskManifest>) -> RawApplicationManifest {
        RawApplicationManifest { root: None, tasks }
    }

    #[test]
    fn rejects_empty_manifest() {
        let err = ApplicationManifest::try_from(manifest(vec![])).unwrap_err();
        assert!(matches!(err, ComposeWatchError::ConfigError(msg) if msg.contains("at least one")));
    }

    #[test]
    fn rejects_duplicate_task_names() {
        let mut a = TaskManifest::with_cmd("make");
        a.folder = Some("client".into());
        let mut b = TaskManifest::with_cmd("make");
        b.name = Some("client".into());

        let err = ApplicationManifest::try_from(manifest(vec![a, b])).unwrap_err();
        assert!(matches!(err, ComposeWatchError::ConfigError(msg) if msg.contains("more than once")));
    }

    #[test]
    fn rejects_bad_exclude_glob() {
        let mut task = TaskManifest::with_cmd("make");
        task.exclude = vec!["src/[".to_string()];

        let err = ApplicationManifest::try_from(manifest(vec![task])).unwrap_err();
        assert!(matches!(err, ComposeWatchError::ConfigError(msg) if msg.contains("invalid exclude")));
    }

    #[test]
    fn accepts_minimal_task() {
        let parsed = ApplicationManifest::try_from(manifest(vec![TaskManifest::with_cmd("make")]));
        assert!(parsed.is_ok());
    }
}
