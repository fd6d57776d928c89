// src/project/context.rs

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::DEFAULT_DESTINATION_FOLDER;
use crate::exec::BuildCommand;
use crate::project::template::{self, TemplateRefs};
use crate::project::{Application, LogStream, Task};
use crate::types::Mode;

/// Parameters of one build invocation.
#[derive(Debug, Clone)]
pub struct BuildParams {
    pub production: bool,
    /// Destination template, see [`template`].
    pub destination_folder: String,
    /// Root of all temporary folders (logs, install stamps, caches).
    pub temporary_root: PathBuf,
    /// Template below `temporary_root`; `None` means `#CONTEXT_ID#/`.
    pub temporary_sub_folder: Option<String>,
    pub image_name: Option<String>,
    /// Run the task's dependency install step before building.
    pub use_install: bool,
    pub output: Option<Arc<LogStream>>,
}

impl Default for BuildParams {
    fn default() -> Self {
        Self {
            production: false,
            destination_folder: DEFAULT_DESTINATION_FOLDER.to_string(),
            temporary_root: std::env::temp_dir().join("composewatch"),
            temporary_sub_folder: None,
            image_name: None,
            use_install: true,
            output: None,
        }
    }
}

/// Everything one build (of a task, or of an application image) needs to
/// know. Created fresh per invocation.
#[derive(Debug, Clone)]
pub struct BuildContext {
    params: BuildParams,
    application: Arc<Application>,
    task: Option<Arc<Task>>,
    image_name: Option<String>,
}

impl BuildContext {
    pub fn for_task(params: BuildParams, application: Arc<Application>, task: Arc<Task>) -> Self {
        Self {
            params,
            application,
            task: Some(task),
            image_name: None,
        }
    }

    /// Context for an image build: bound to the application, no task.
    pub fn for_application(params: BuildParams, application: Arc<Application>) -> Self {
        Self {
            params,
            application,
            task: None,
            image_name: None,
        }
    }

    pub fn params(&self) -> &BuildParams {
        &self.params
    }

    pub fn application(&self) -> &Arc<Application> {
        &self.application
    }

    pub fn task(&self) -> Option<&Arc<Task>> {
        self.task.as_ref()
    }

    pub fn mode(&self) -> Mode {
        Mode::from_production_flag(self.params.production)
    }

    fn refs(&self) -> TemplateRefs<'_> {
        TemplateRefs {
            application: Some(&self.application),
            task: self.task.as_deref(),
            mode: Some(self.mode()),
        }
    }

    /// Resolve a template against this context; relative results are
    /// rooted at the application's root folder.
    pub fn fill_template(&self, template: &str) -> PathBuf {
        template::resolve(template, &self.refs())
    }

    /// Task sources: the backend's override, else `<task folder>/src/`.
    pub fn source_folder(&self) -> Option<PathBuf> {
        let task = self.task.as_ref()?;
        Some(
            task.backend()
                .source_folder(self)
                .unwrap_or_else(|| task.folder().join("src")),
        )
    }

    /// Where build output goes. An empty destination template falls back to
    /// `<temporary folder>/build/#TASK_NAME#/#MODE_NAME#/`.
    pub fn destination_folder(&self) -> PathBuf {
        if self.params.destination_folder.trim().is_empty() {
            return self.temporary_folder("build/#TASK_NAME#/#MODE_NAME#/");
        }
        self.fill_template(&self.params.destination_folder)
    }

    /// Create the destination folder if needed and return it.
    pub async fn provide_destination_folder(&self) -> std::io::Result<PathBuf> {
        let dst = self.destination_folder();
        tokio::fs::create_dir_all(&dst).await?;
        Ok(dst)
    }

    /// `<temporary root>/<sub folder>/<tail>`, all templates filled.
    pub fn temporary_folder(&self, tail: &str) -> PathBuf {
        let refs = self.refs();
        let middle = self
            .params
            .temporary_sub_folder
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or("#CONTEXT_ID#/");

        self.params
            .temporary_root
            .join(&*template::substitute(middle, &refs))
            .join(&*template::substitute(tail, &refs))
    }

    /// Per-task cache folder for incremental bundlers.
    pub fn cache_folder(&self) -> PathBuf {
        self.temporary_folder("cache/#TASK_NAME#/")
    }

    /// First existing of `<root>/docker/<mode>.dockerfile`, `<mode>.docker`,
    /// `<mode>`, then the compose `build.dockerfile`.
    pub fn dockerfile_path(&self) -> Option<PathBuf> {
        let dir = self.application.root().join("docker");
        let mode = self.mode();

        let candidates = [
            format!("{mode}.dockerfile"),
            format!("{mode}.docker"),
            mode.to_string(),
        ];
        candidates
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.is_file())
            .or_else(|| {
                self.application
                    .dockerfile()
                    .filter(|path| path.is_file())
                    .map(|path| path.to_path_buf())
            })
    }

    pub fn image_name(&self) -> Option<&str> {
        self.image_name
            .as_deref()
            .or(self.params.image_name.as_deref())
    }

    pub fn set_image_name(&mut self, name: impl Into<String>) {
        self.image_name = Some(name.into());
    }

    pub fn output(&self) -> Option<&Arc<LogStream>> {
        self.params.output.as_ref()
    }

    pub fn use_install(&self) -> bool {
        self.params.use_install
    }

    /// Write `data` to the application's output stream, if any.
    pub async fn log(&self, data: &str) {
        if let Some(stream) = self.output() {
            stream.write(data.as_bytes()).await;
        }
    }

    /// Variables exported to build commands and hooks.
    pub fn environment(&self) -> Vec<(String, String)> {
        let mut env = vec![
            ("BUILD_MODE".to_string(), self.mode().to_string()),
            (
                "APPLICATION_NAME".to_string(),
                self.application.name().to_string(),
            ),
        ];
        if let Some(task) = &self.task {
            env.push(("TASK_NAME".to_string(), task.name().to_string()));
            env.push((
                "BUILD_DST".to_string(),
                self.destination_folder().display().to_string(),
            ));
            env.push((
                "BUILD_CACHE".to_string(),
                self.cache_folder().display().to_string(),
            ));
        }
        if let Some(src) = self.source_folder() {
            env.push(("BUILD_SRC".to_string(), src.display().to_string()));
        }
        env
    }

    /// Shell command run in the task folder (or application root) with
    /// [`environment`](Self::environment) exported.
    pub fn shell_command(&self, script: &str) -> BuildCommand {
        let cwd = match &self.task {
            Some(task) => task.folder().to_path_buf(),
            None => self.application.root().to_path_buf(),
        };
        BuildCommand::shell(script)
            .current_dir(cwd)
            .envs(self.environment())
    }
}
