// src/compose/composition.rs

//! The docker-compose descriptor, as far as the orchestrator cares about it:
//! which services are built from local sources, and how their images are
//! named.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::errors::{ComposeWatchError, Result};

#[derive(Debug, Deserialize)]
struct RawCompose {
    #[serde(default)]
    services: BTreeMap<String, RawService>,
}

#[derive(Debug, Deserialize)]
struct RawService {
    #[serde(default)]
    build: Option<RawBuild>,
}

/// `build:` is either a context path or a table.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawBuild {
    Context(String),
    Full {
        #[serde(default)]
        context: Option<String>,
        #[serde(default)]
        dockerfile: Option<String>,
    },
}

impl RawBuild {
    /// Only a build naming both a context and a dockerfile is orchestrated;
    /// anything else yields `None`. An explicitly empty context is a
    /// configuration error.
    fn into_service_build(self, code: &str) -> Result<Option<ServiceBuild>> {
        let (context, dockerfile) = match self {
            RawBuild::Context(context) => {
                debug!(service = %code, context = %context, "short build form names no dockerfile");
                return Ok(None);
            }
            RawBuild::Full {
                context,
                dockerfile,
            } => (context, dockerfile),
        };

        let Some(context) = context else {
            return Ok(None);
        };
        if context.trim().is_empty() {
            return Err(ComposeWatchError::ConfigError(format!(
                "service '{code}' has an empty build context"
            )));
        }
        let Some(dockerfile) = dockerfile.filter(|d| !d.trim().is_empty()) else {
            return Ok(None);
        };

        Ok(Some(ServiceBuild {
            context: PathBuf::from(context),
            dockerfile: PathBuf::from(dockerfile),
        }))
    }
}

/// Build metadata of one service, as declared (paths not yet resolved).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceBuild {
    /// Relative to the compose file's folder.
    pub context: PathBuf,
    /// Relative to the build context.
    pub dockerfile: PathBuf,
}

/// Parsed compose file. Read-only for the lifetime of a run.
#[derive(Debug, Clone)]
pub struct Composition {
    path: PathBuf,
    folder: PathBuf,
    image_prefix: String,
    services: BTreeMap<String, ServiceBuild>,
}

impl Composition {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let path = path.canonicalize().map_err(|err| {
            ComposeWatchError::ConfigError(format!(
                "cannot read composition file {}: {err}",
                path.display()
            ))
        })?;
        let text = std::fs::read_to_string(&path)?;
        Self::parse(path, &text)
    }

    /// Parse `text` as the compose file located at `path`.
    pub fn parse(path: impl Into<PathBuf>, text: &str) -> Result<Self> {
        let path = path.into();
        let raw: RawCompose = serde_yaml::from_str(text)?;

        let mut services = BTreeMap::new();
        for (code, service) in raw.services {
            let Some(build) = service.build else {
                continue;
            };
            match build.into_service_build(&code)? {
                Some(build) => {
                    services.insert(code, build);
                }
                None => debug!(service = %code, "service has no build dockerfile; not watched"),
            }
        }

        let folder = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let image_prefix = image_prefix_for(&folder);

        Ok(Self {
            path,
            folder,
            image_prefix,
            services,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Folder holding the compose file; service contexts resolve against it.
    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn image_prefix(&self) -> &str {
        &self.image_prefix
    }

    /// Services built from local sources, keyed by service code.
    pub fn schema(&self) -> &BTreeMap<String, ServiceBuild> {
        &self.services
    }

    /// Absolute build context of `code`.
    pub fn context_path(&self, code: &str) -> Option<PathBuf> {
        self.services
            .get(code)
            .map(|build| self.folder.join(&build.context))
    }

    /// Image name docker-compose uses for `code`: `<prefix>_<code>`.
    pub fn make_image_name(&self, code: &str) -> String {
        format!("{}_{}", self.image_prefix, code)
    }
}

/// docker-compose's default project name: the folder name, lowercased, with
/// anything but `[a-z0-9_-]` removed.
fn image_prefix_for(folder: &Path) -> String {
    folder
        .file_name()
        .map(|name| name.to_string_lossy().to_lowercase())
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect()
}
