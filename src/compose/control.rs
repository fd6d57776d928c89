// src/compose/control.rs

//! Production [`ComposeControl`]: shells out to docker-compose and docker.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, info};

use crate::config::Settings;
use crate::errors::Result;
use crate::exec::{BuildCommand, ComposeControl, OutputTarget, capture, execute};
use crate::types::BoxFuture;

/// Controls the composition through `<compose_program> -f <file> ...`.
///
/// Container ids are looked up with `ps -q <service>` and cached until the
/// next [`up`](ComposeControl::up), which may recreate containers.
#[derive(Debug)]
pub struct DockerCompose {
    compose_program: Vec<String>,
    docker_program: String,
    compose_file: PathBuf,
    ids: Mutex<HashMap<String, String>>,
}

impl DockerCompose {
    /// `compose_program` may hold several words, e.g. `"docker compose"`.
    pub fn new(
        compose_program: &str,
        docker_program: impl Into<String>,
        compose_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            compose_program: compose_program.split_whitespace().map(str::to_string).collect(),
            docker_program: docker_program.into(),
            compose_file: compose_file.into(),
            ids: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            &settings.compose_program,
            settings.docker_program.clone(),
            settings.compose_file.clone(),
        )
    }

    pub fn compose_file(&self) -> &Path {
        &self.compose_file
    }

    fn compose_command<I, S>(&self, args: I) -> BuildCommand
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut words = self.compose_program.iter();
        let program = words.next().map(String::as_str).unwrap_or("docker-compose");
        BuildCommand::new(program)
            .args(words.cloned())
            .arg("-f")
            .arg(self.compose_file.display().to_string())
            .args(args)
    }

    pub fn up_command(&self, extra_args: &[String]) -> BuildCommand {
        self.compose_command(["up", "-d"]).args(extra_args.iter().cloned())
    }

    pub fn stop_command(&self) -> BuildCommand {
        self.compose_command(["stop"])
    }

    pub fn ps_command(&self, service: &str) -> BuildCommand {
        self.compose_command(["ps", "-q", service])
    }

    pub fn logs_command(&self, container_id: &str, since: Option<u64>) -> BuildCommand {
        let mut cmd = BuildCommand::new(&self.docker_program).arg("logs");
        if let Some(since) = since {
            cmd = cmd.arg("--since").arg(since.to_string());
        }
        cmd.arg(container_id)
    }

    pub fn invalidate_ids(&self) {
        self.lock_ids().clear();
    }

    fn lock_ids(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        match self.ids.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Container id of `service`, if it is running.
    pub async fn container_id(&self, service: &str) -> Option<String> {
        let cached = self.lock_ids().get(service).cloned();
        if cached.is_some() {
            return cached;
        }

        let output = capture(&self.ps_command(service)).await?;
        if !output.status.success() {
            return None;
        }
        let id = String::from_utf8_lossy(&output.stdout)
            .split_whitespace()
            .next()?
            .to_string();

        debug!(service, id = %id, "resolved container id");
        self.lock_ids().insert(service.to_string(), id.clone());
        Some(id)
    }
}

impl ComposeControl for DockerCompose {
    fn up<'a>(&'a self, extra_args: &'a [String]) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            info!(file = ?self.compose_file, "bringing composition up");
            let result = execute(&self.up_command(extra_args), &OutputTarget::Inherit).await;
            self.invalidate_ids();
            result
        })
    }

    fn stop(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            info!(file = ?self.compose_file, "stopping composition");
            execute(&self.stop_command(), &OutputTarget::Inherit).await
        })
    }

    fn logs<'a>(&'a self, service: &'a str, since: Option<u64>) -> BoxFuture<'a, String> {
        Box::pin(async move {
            let Some(id) = self.container_id(service).await else {
                return String::new();
            };
            match capture(&self.logs_command(&id, since)).await {
                Some(output) if output.status.success() => {
                    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
                    text.push_str(&String::from_utf8_lossy(&output.stderr));
                    text
                }
                _ => String::new(),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multi_word_compose_program_is_split() {
        let compose = DockerCompose::new("docker compose", "docker", "/p/docker-compose.yml");

        let up = compose.up_command(&["--build".to_string()]);
        assert_eq!(up.program, "docker");
        assert_eq!(
            up.args,
            ["compose", "-f", "/p/docker-compose.yml", "up", "-d", "--build"]
        );

        let stop = compose.stop_command();
        assert_eq!(stop.args, ["compose", "-f", "/p/docker-compose.yml", "stop"]);
    }

    #[test]
    fn logs_command_passes_since_only_when_known() {
        let compose = DockerCompose::new("docker-compose", "docker", "/p/docker-compose.yml");

        assert_eq!(compose.logs_command("abc", None).args, ["logs", "abc"]);
        assert_eq!(
            compose.logs_command("abc", Some(1700000000)).args,
            ["logs", "--since", "1700000000", "abc"]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn container_ids_are_cached_until_invalidated() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fake-compose");
        let counter = dir.path().join("calls");
        std::fs::write(
            &script,
            format!("echo x >> {}\necho c0ffee\n", counter.display()),
        )
        .unwrap();

        let program = format!("sh {}", script.display());
        let compose = DockerCompose::new(&program, "docker", "/p/dc.yml");
        assert_eq!(compose.container_id("web").await.as_deref(), Some("c0ffee"));
        assert_eq!(compose.container_id("web").await.as_deref(), Some("c0ffee"));
        compose.invalidate_ids();
        assert_eq!(compose.container_id("web").await.as_deref(), Some("c0ffee"));

        let calls = std::fs::read_to_string(&counter).unwrap();
        assert_eq!(calls.lines().count(), 2);
    }

    #[tokio::test]
    async fn logs_of_unknown_container_are_empty() {
        let compose = DockerCompose::new("/nonexistent/compose-binary", "docker", "/p/dc.yml");
        assert_eq!(compose.logs("web", None).await, "");
    }
}
