// src/exec/source.rs

//! Production [`SourceBuilder`]: runs a task through its build backend.

use tracing::{debug, info};

use crate::engine::BuildItem;
use crate::errors::{ComposeWatchError, Result};
use crate::exec::backend::SourceBuilder;
use crate::exec::install::ensure_dependencies;
use crate::exec::{OutputTarget, execute};
use crate::project::BuildContext;
use crate::types::BoxFuture;

const BANNER: &str = "\n################\n# BUILD OUTPUT #\n################\n";

/// Builds tasks by running the command their backend configures.
///
/// Sequence per build: banner, dependency install (when enabled and the
/// manifest changed), destination folder, backend command, after-build hook.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskBuilder;

impl SourceBuilder for TaskBuilder {
    fn build<'a>(&'a self, item: &'a BuildItem) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move { build_task(&item.context()).await })
    }
}

pub async fn build_task(ctx: &BuildContext) -> Result<()> {
    let task = ctx.task().ok_or_else(|| {
        ComposeWatchError::ConfigError(format!(
            "build context of {} is not bound to a task",
            ctx.application().name()
        ))
    })?;

    info!(application = %ctx.application().name(), task = %task.name(), mode = %ctx.mode(), "building");
    ctx.log(BANNER).await;

    if ctx.use_install() {
        ensure_dependencies(ctx).await?;
    }

    let dst = ctx.provide_destination_folder().await?;
    debug!(task = %task.name(), destination = ?dst, "destination folder ready");

    let command = task.backend().build_configuration(ctx)?;
    execute(&command, &OutputTarget::from(ctx.output().cloned())).await?;

    if let Some(hook) = task.parameters().on_after_build {
        hook.run(ctx).await?;
    }

    Ok(())
}
