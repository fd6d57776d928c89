// src/exec/backend.rs

//! Collaborator traits the schedulers talk to.
//!
//! The schedulers never spawn processes themselves. They call a
//! [`SourceBuilder`] for task builds, an [`ImageBuilder`] for container
//! images and a [`ComposeControl`] for the running composition. Production
//! code uses [`TaskBuilder`](super::TaskBuilder),
//! [`DockerImageBuilder`](crate::compose::DockerImageBuilder) and
//! [`DockerCompose`](crate::compose::DockerCompose); tests swap in fakes that
//! record calls without touching the system.

use crate::engine::BuildItem;
use crate::errors::Result;
use crate::project::BuildContext;
use crate::types::BoxFuture;

/// Runs one task build.
pub trait SourceBuilder: Send + Sync {
    fn build<'a>(&'a self, item: &'a BuildItem) -> BoxFuture<'a, Result<()>>;
}

/// Builds (and optionally pushes) an application's container image.
///
/// The context is bound to the application only; its image name is already
/// set.
pub trait ImageBuilder: Send + Sync {
    fn build_image<'a>(&'a self, ctx: &'a BuildContext) -> BoxFuture<'a, Result<()>>;

    fn push<'a>(&'a self, ctx: &'a BuildContext) -> BoxFuture<'a, Result<()>>;
}

/// Control over the running composition.
pub trait ComposeControl: Send + Sync {
    /// Bring the composition up, passing `extra_args` after `up -d`.
    fn up<'a>(&'a self, extra_args: &'a [String]) -> BoxFuture<'a, Result<()>>;

    fn stop(&self) -> BoxFuture<'_, Result<()>>;

    /// Container output of `service` since the Unix timestamp `since`
    /// (everything when `None`). Lookup failures yield an empty string.
    fn logs<'a>(&'a self, service: &'a str, since: Option<u64>) -> BoxFuture<'a, String>;
}
