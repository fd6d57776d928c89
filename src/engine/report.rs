// src/engine/report.rs

use tracing::error;

use crate::engine::{BuildItem, ImageItem};
use crate::errors::ComposeWatchError;

/// Receives per-item failures from the schedulers.
pub trait FailureReporter: Send + Sync {
    fn action_failed(&self, item: &BuildItem, error: &ComposeWatchError);

    fn image_build_failed(&self, item: &ImageItem, error: &ComposeWatchError);
}

/// Default reporter: one error line pointing at the application's log file.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

fn log_location(params: &crate::project::BuildParams) -> String {
    params
        .output
        .as_ref()
        .and_then(|stream| stream.path())
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "<no log file>".to_string())
}

impl FailureReporter for LogReporter {
    fn action_failed(&self, item: &BuildItem, error: &ComposeWatchError) {
        error!(
            application = %item.application.name(),
            task = %item.task.name(),
            error = %error,
            "Build failed, look for details: {}",
            log_location(&item.params)
        );
    }

    fn image_build_failed(&self, item: &ImageItem, error: &ComposeWatchError) {
        error!(
            application = %item.application.name(),
            error = %error,
            "Image build failed, look for details: {}",
            log_location(&item.params)
        );
    }
}
