// src/project/backend.rs

//! Pluggable build backends.
//!
//! A backend knows how to turn a [`BuildContext`] into the command that
//! produces a task's bundle. Only [`BuildBackend::build_configuration`] is
//! required; the source folder and task parameters have defaults.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::errors::Result;
use crate::exec::{BuildCommand, OutputTarget, execute};
use crate::project::BuildContext;
use crate::types::BoxFuture;

/// Hook run after a task built successfully.
pub trait AfterBuildHook: Send + Sync + fmt::Debug {
    fn run<'a>(&'a self, ctx: &'a BuildContext) -> BoxFuture<'a, Result<()>>;
}

/// Per-task knobs a backend exposes to the scheduler.
#[derive(Debug, Clone)]
pub struct TaskParameters {
    pub rebuild_image: bool,
    pub on_after_build: Option<Arc<dyn AfterBuildHook>>,
}

impl Default for TaskParameters {
    fn default() -> Self {
        Self {
            rebuild_image: true,
            on_after_build: None,
        }
    }
}

/// How to build one task.
pub trait BuildBackend: Send + Sync + fmt::Debug {
    /// The command producing the task's output for this context.
    fn build_configuration(&self, ctx: &BuildContext) -> Result<BuildCommand>;

    /// Source folder override. `None` means `<task folder>/src/`.
    fn source_folder(&self, _ctx: &BuildContext) -> Option<PathBuf> {
        None
    }

    fn parameters(&self) -> TaskParameters {
        TaskParameters::default()
    }
}

/// Backend running a shell command inside the task folder.
///
/// The command sees the context through its environment, see
/// [`BuildContext::environment`].
#[derive(Debug, Clone)]
pub struct CommandBackend {
    cmd: String,
    source: Option<PathBuf>,
    rebuild_image: bool,
    after_build: Option<Arc<CommandHook>>,
}

impl CommandBackend {
    pub fn new(cmd: impl Into<String>) -> Self {
        Self {
            cmd: cmd.into(),
            source: None,
            rebuild_image: true,
            after_build: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<PathBuf>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_rebuild_image(mut self, rebuild_image: bool) -> Self {
        self.rebuild_image = rebuild_image;
        self
    }

    pub fn with_after_build(mut self, cmd: impl Into<String>) -> Self {
        self.after_build = Some(Arc::new(CommandHook::new(cmd)));
        self
    }
}

impl BuildBackend for CommandBackend {
    fn build_configuration(&self, ctx: &BuildContext) -> Result<BuildCommand> {
        Ok(ctx.shell_command(&self.cmd))
    }

    fn source_folder(&self, _ctx: &BuildContext) -> Option<PathBuf> {
        self.source.clone()
    }

    fn parameters(&self) -> TaskParameters {
        TaskParameters {
            rebuild_image: self.rebuild_image,
            on_after_build: self
                .after_build
                .clone()
                .map(|hook| hook as Arc<dyn AfterBuildHook>),
        }
    }
}

/// Shell command used as an after-build hook.
#[derive(Debug, Clone)]
pub struct CommandHook {
    cmd: String,
}

impl CommandHook {
    pub fn new(cmd: impl Into<String>) -> Self {
        Self { cmd: cmd.into() }
    }
}

impl AfterBuildHook for CommandHook {
    fn run<'a>(&'a self, ctx: &'a BuildContext) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let command = ctx.shell_command(&self.cmd);
            let output = OutputTarget::from(ctx.output().cloned());
            execute(&command, &output).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::{Application, BuildParams, Task};

    #[test]
    fn command_backend_exposes_context_in_env() {
        let backend = Arc::new(CommandBackend::new("make bundle").with_after_build("true"));
        let task = Task::new("client", "/apps/web/client", backend.clone());
        let app = Arc::new(Application::new("web", "/apps/web", "/apps/web").with_task(task));
        let task = app.tasks()[0].clone();

        let ctx = BuildContext::for_task(BuildParams::default(), Arc::clone(&app), task);
        let command = backend.build_configuration(&ctx).unwrap();

        assert_eq!(command.cwd.as_deref(), Some(std::path::Path::new("/apps/web/client")));
        assert!(command.args.iter().any(|a| a == "make bundle"));
        assert!(command.env.contains(&("TASK_NAME".to_string(), "client".to_string())));
        assert!(command.env.contains(&("BUILD_MODE".to_string(), "development".to_string())));
        assert!(backend.parameters().on_after_build.is_some());
    }

    #[test]
    fn defaults_rebuild_image_without_hook() {
        let params = TaskParameters::default();
        assert!(params.rebuild_image);
        assert!(params.on_after_build.is_none());
    }
}
