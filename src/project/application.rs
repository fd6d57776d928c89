// src/project/application.rs

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{ApplicationManifest, TaskManifest};
use crate::project::backend::{BuildBackend, CommandBackend, TaskParameters};

/// One service declared in the compose file, with its buildable tasks.
#[derive(Debug)]
pub struct Application {
    name: String,
    build_root: PathBuf,
    root: PathBuf,
    dockerfile: Option<PathBuf>,
    tasks: Vec<Arc<Task>>,
}

impl Application {
    /// `build_root` is the docker build context; `root` is where relative
    /// task folders and path templates are anchored.
    pub fn new(
        name: impl Into<String>,
        build_root: impl Into<PathBuf>,
        root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            build_root: build_root.into(),
            root: root.into(),
            dockerfile: None,
            tasks: Vec::new(),
        }
    }

    /// Build an application from its validated `application.toml`.
    ///
    /// `build_root` is the service's compose build context, which is also
    /// the folder holding the manifest.
    pub fn from_manifest(
        name: impl Into<String>,
        build_root: impl Into<PathBuf>,
        manifest: &ApplicationManifest,
    ) -> Self {
        let build_root = build_root.into();
        let root = match manifest.root() {
            Some(root) => build_root.join(root),
            None => build_root.clone(),
        };

        let mut app = Self::new(name, build_root, root);
        for entry in manifest.tasks() {
            let task = Task::from_manifest(entry, &app.root);
            app = app.with_task(task);
        }
        app
    }

    /// Compose `build.dockerfile`, used when no mode-specific dockerfile
    /// exists under `<root>/docker/`.
    pub fn with_dockerfile(mut self, dockerfile: impl Into<PathBuf>) -> Self {
        self.dockerfile = Some(dockerfile.into());
        self
    }

    pub fn with_task(mut self, task: Task) -> Self {
        self.tasks.push(Arc::new(task));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn build_root(&self) -> &Path {
        &self.build_root
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dockerfile(&self) -> Option<&Path> {
        self.dockerfile.as_deref()
    }

    pub fn tasks(&self) -> &[Arc<Task>] {
        &self.tasks
    }

    pub fn task(&self, name: &str) -> Option<&Arc<Task>> {
        self.tasks.iter().find(|t| t.name() == name)
    }
}

/// Dependency install step, run only when `manifest` changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallStep {
    pub command: String,
    /// File name inside the task folder, e.g. `package.json`.
    pub manifest: String,
}

/// One buildable unit of an application.
pub struct Task {
    name: String,
    folder: PathBuf,
    backend: Arc<dyn BuildBackend>,
    install: Option<InstallStep>,
    exclude: Vec<String>,
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("folder", &self.folder)
            .field("backend", &self.backend)
            .finish_non_exhaustive()
    }
}

impl Task {
    pub fn new(
        name: impl Into<String>,
        folder: impl Into<PathBuf>,
        backend: Arc<dyn BuildBackend>,
    ) -> Self {
        Self {
            name: name.into(),
            folder: folder.into(),
            backend,
            install: None,
            exclude: Vec::new(),
        }
    }

    fn from_manifest(entry: &TaskManifest, app_root: &Path) -> Self {
        let folder = match &entry.folder {
            Some(folder) => app_root.join(folder),
            None => app_root.to_path_buf(),
        };

        let mut backend = CommandBackend::new(entry.cmd.clone()).with_rebuild_image(entry.rebuild_image);
        if let Some(source) = &entry.source {
            backend = backend.with_source(folder.join(source));
        }
        if let Some(after) = &entry.after_build {
            backend = backend.with_after_build(after.clone());
        }

        let mut task = Self::new(entry.effective_name(), folder, Arc::new(backend))
            .with_exclude(entry.exclude.clone());
        if let Some(command) = &entry.install {
            task = task.with_install(InstallStep {
                command: command.clone(),
                manifest: entry.install_manifest.clone(),
            });
        }
        task
    }

    pub fn with_install(mut self, install: InstallStep) -> Self {
        self.install = Some(install);
        self
    }

    pub fn with_exclude(mut self, exclude: Vec<String>) -> Self {
        self.exclude = exclude;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn backend(&self) -> &Arc<dyn BuildBackend> {
        &self.backend
    }

    pub fn install(&self) -> Option<&InstallStep> {
        self.install.as_ref()
    }

    pub fn exclude(&self) -> &[String] {
        &self.exclude
    }

    pub fn parameters(&self) -> TaskParameters {
        self.backend.parameters()
    }

    /// Whether a successful build of this task should rebuild the image.
    pub fn needs_image_rebuild(&self) -> bool {
        self.parameters().rebuild_image
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RawApplicationManifest;

    #[test]
    fn manifest_tasks_resolve_against_root() {
        let raw: RawApplicationManifest = toml::from_str(
            r#"
root = "app"

[[task]]
folder = "client"
cmd = "npm run build"
install = "npm install"

[[task]]
name = "api"
folder = "server"
cmd = "npm run build:server"
rebuild_image = false
"#,
        )
        .unwrap();
        let manifest = ApplicationManifest::try_from(raw).unwrap();

        let app = Application::from_manifest("web", "/srv/web", &manifest);

        assert_eq!(app.root(), Path::new("/srv/web/app"));
        assert_eq!(app.build_root(), Path::new("/srv/web"));

        let client = app.task("client").unwrap();
        assert_eq!(client.folder(), Path::new("/srv/web/app/client"));
        assert!(client.needs_image_rebuild());
        assert_eq!(client.install().unwrap().manifest, "package.json");

        let api = app.task("api").unwrap();
        assert_eq!(api.folder(), Path::new("/srv/web/app/server"));
        assert!(!api.needs_image_rebuild());
        assert!(api.install().is_none());
    }
}
