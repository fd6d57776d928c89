// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Default destination template: `<task folder>/build/<mode>/`.
pub const DEFAULT_DESTINATION_FOLDER: &str = "#TASK_FOLDER#build/#MODE_NAME#/";

/// Name of the per-application manifest looked up in each build context.
pub const APPLICATION_MANIFEST: &str = "application.toml";

/// Project configuration as read from `composewatch.toml`.
///
/// ```toml
/// [project]
/// name = "shop"
/// compose_file = "docker/docker-compose.yml"
///
/// [timing]
/// build_interval = 300
/// docker_logs_polling_interval = 1000
/// ```
///
/// All sections are optional; CLI flags take precedence over file values.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawProjectConfig {
    #[serde(default)]
    pub project: ProjectSection,

    #[serde(default)]
    pub timing: TimingSection,
}

/// `[project]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectSection {
    #[serde(default)]
    pub name: Option<String>,

    /// Relative paths are resolved against the config file's folder.
    #[serde(default)]
    pub compose_file: Option<PathBuf>,

    #[serde(default)]
    pub destination_folder: Option<String>,

    /// Root for logs, install stamps and caches. Defaults to
    /// `<system temp>/composewatch`.
    #[serde(default)]
    pub temporary_folder: Option<PathBuf>,

    /// May contain several words, e.g. `"docker compose"`.
    #[serde(default = "default_compose_program")]
    pub compose_program: String,

    #[serde(default = "default_docker_program")]
    pub docker_program: String,
}

fn default_compose_program() -> String {
    "docker-compose".to_string()
}

fn default_docker_program() -> String {
    "docker".to_string()
}

impl Default for ProjectSection {
    fn default() -> Self {
        Self {
            name: None,
            compose_file: None,
            destination_folder: None,
            temporary_folder: None,
            compose_program: default_compose_program(),
            docker_program: default_docker_program(),
        }
    }
}

/// `[timing]` section. All values are milliseconds.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct TimingSection {
    #[serde(default = "default_queue_interval")]
    pub build_interval: u64,

    #[serde(default = "default_queue_interval")]
    pub image_interval: u64,

    #[serde(default = "default_queue_interval")]
    pub restart_interval: u64,

    #[serde(default = "default_logs_interval")]
    pub docker_logs_polling_interval: u64,

    #[serde(default = "default_aggregate_timeout")]
    pub watch_aggregate_timeout: u64,
}

fn default_queue_interval() -> u64 {
    300
}

fn default_logs_interval() -> u64 {
    1000
}

fn default_aggregate_timeout() -> u64 {
    200
}

impl Default for TimingSection {
    fn default() -> Self {
        Self {
            build_interval: default_queue_interval(),
            image_interval: default_queue_interval(),
            restart_interval: default_queue_interval(),
            docker_logs_polling_interval: default_logs_interval(),
            watch_aggregate_timeout: default_aggregate_timeout(),
        }
    }
}

/// Loop cadences, resolved from [`TimingSection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub build_interval: Duration,
    pub image_interval: Duration,
    pub restart_interval: Duration,
    pub logs_interval: Duration,
    pub watch_aggregate_timeout: Duration,
}

impl From<TimingSection> for Timing {
    fn from(t: TimingSection) -> Self {
        Self {
            build_interval: Duration::from_millis(t.build_interval),
            image_interval: Duration::from_millis(t.image_interval),
            restart_interval: Duration::from_millis(t.restart_interval),
            logs_interval: Duration::from_millis(t.docker_logs_polling_interval),
            watch_aggregate_timeout: Duration::from_millis(t.watch_aggregate_timeout),
        }
    }
}

impl Default for Timing {
    fn default() -> Self {
        TimingSection::default().into()
    }
}

/// Fully resolved project settings (file + CLI), validated.
#[derive(Debug, Clone)]
pub struct Settings {
    pub name: String,
    pub compose_file: PathBuf,
    pub destination_folder: String,
    pub temporary_folder: PathBuf,
    pub compose_program: String,
    pub docker_program: String,
    pub production: bool,
    pub timing: Timing,
}

impl Settings {
    /// Temporary sub-folder template shared by every build of this project.
    pub fn temporary_sub_folder(&self) -> String {
        format!("{}/#APPLICATION_NAME#/", self.name)
    }

    /// Folder holding the output log of one application.
    pub fn log_folder(&self, application: &str) -> PathBuf {
        self.temporary_folder
            .join(&self.name)
            .join(application)
            .join("log")
    }
}

/// `application.toml` as read from disk.
///
/// ```toml
/// [[task]]
/// folder = "client"
/// cmd = "npx webpack --mode $BUILD_MODE --output-path $BUILD_DST"
/// install = "npm install"
///
/// [[task]]
/// folder = "server"
/// cmd = "npx webpack --config webpack.server.js"
/// after_build = "cp package.json $BUILD_DST"
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RawApplicationManifest {
    /// Application root, relative to the manifest. Defaults to the manifest's
    /// folder.
    #[serde(default)]
    pub root: Option<PathBuf>,

    #[serde(default, rename = "task")]
    pub tasks: Vec<TaskManifest>,
}

/// One `[[task]]` table.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskManifest {
    /// Defaults to the base name of `folder` (or of the application root).
    #[serde(default)]
    pub name: Option<String>,

    /// Task folder, relative to the application root.
    #[serde(default)]
    pub folder: Option<PathBuf>,

    /// Source folder, relative to the task folder. Defaults to `src`.
    #[serde(default)]
    pub source: Option<PathBuf>,

    /// Build command, run through `sh -c` inside the task folder.
    pub cmd: String,

    /// Dependency install command, run when `install_manifest` changed.
    #[serde(default)]
    pub install: Option<String>,

    #[serde(default = "default_install_manifest")]
    pub install_manifest: String,

    /// Command run after a successful build.
    #[serde(default)]
    pub after_build: Option<String>,

    #[serde(default = "default_rebuild_image")]
    pub rebuild_image: bool,

    /// Globs, relative to the source folder, that never trigger a rebuild.
    #[serde(default = "default_exclude")]
    pub exclude: Vec<String>,
}

fn default_install_manifest() -> String {
    "package.json".to_string()
}

fn default_rebuild_image() -> bool {
    true
}

fn default_exclude() -> Vec<String> {
    vec!["**/node_modules/**".to_string(), "**/.git/**".to_string()]
}

impl TaskManifest {
    /// Task whose only required field is `cmd`.
    pub fn with_cmd(cmd: impl Into<String>) -> Self {
        Self {
            name: None,
            folder: None,
            source: None,
            cmd: cmd.into(),
            install: None,
            install_manifest: default_install_manifest(),
            after_build: None,
            rebuild_image: default_rebuild_image(),
            exclude: default_exclude(),
        }
    }

    /// Explicit `name`, else the base name of `folder`, else `"main"`.
    pub fn effective_name(&self) -> String {
        if let Some(name) = self.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            return name.to_string();
        }
        self.folder
            .as_deref()
            .and_then(|f| f.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "main".to_string())
    }
}

/// Validated application manifest.
#[derive(Debug, Clone)]
pub struct ApplicationManifest {
    root: Option<PathBuf>,
    tasks: Vec<TaskManifest>,
}

impl ApplicationManifest {
    /// Build without validation; use `TryFrom<RawApplicationManifest>`.
    pub(crate) fn new_unchecked(root: Option<PathBuf>, tasks: Vec<TaskManifest>) -> Self {
        Self { root, tasks }
    }

    pub fn root(&self) -> Option<&PathBuf> {
        self.root.as_ref()
    }

    pub fn tasks(&self) -> &[TaskManifest] {
        &self.tasks
    }
}
