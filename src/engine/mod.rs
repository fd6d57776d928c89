// src/engine/mod.rs

//! Build/rebuild scheduling engine.
//!
//! Three work queues carry work down the pipeline:
//!
//! ```text
//! watcher ─▶ build queue ─▶ BuildScheduler ─▶ image queue ─▶ ImageScheduler
//!                                                              │
//!            compose file watcher ─▶ restart queue ◀───────────┘
//!                                          │
//!                                   RestartScheduler ─▶ compose up
//! ```
//!
//! Each scheduler is a loop over one [`Ticker`]; all loops stop once the
//! [`Pipeline`]'s halt signal fires. The [`LogPoller`] runs beside them on
//! its own cadence and the [`ShutdownCoordinator`] tears everything down.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use crate::project::{Application, BuildContext, BuildParams, Task};

pub mod build;
pub mod image;
pub mod log_poller;
pub mod queue;
pub mod report;
pub mod restart;
pub mod shutdown;
pub mod ticker;

pub use build::BuildScheduler;
pub use image::ImageScheduler;
pub use log_poller::{Clock, LogPoller, system_clock};
pub use queue::WorkQueue;
pub use report::{FailureReporter, LogReporter};
pub use restart::RestartScheduler;
pub use shutdown::{ShutdownCoordinator, ShutdownOutcome};
pub use ticker::Ticker;

/// Build queue entry: one task to build.
#[derive(Debug, Clone)]
pub struct BuildItem {
    pub application: Arc<Application>,
    pub task: Arc<Task>,
    pub params: BuildParams,
}

impl BuildItem {
    pub fn new(application: Arc<Application>, task: Arc<Task>, params: BuildParams) -> Self {
        Self {
            application,
            task,
            params,
        }
    }

    /// Fresh context for one invocation of this build.
    pub fn context(&self) -> BuildContext {
        BuildContext::for_task(
            self.params.clone(),
            Arc::clone(&self.application),
            Arc::clone(&self.task),
        )
    }

    /// `<application>:<task>`, as shown in logs.
    pub fn label(&self) -> String {
        format!("{}:{}", self.application.name(), self.task.name())
    }
}

/// Image queue entry: one application whose image needs a rebuild.
#[derive(Debug, Clone)]
pub struct ImageItem {
    pub application: Arc<Application>,
    pub params: BuildParams,
}

impl From<&BuildItem> for ImageItem {
    fn from(item: &BuildItem) -> Self {
        Self {
            application: Arc::clone(&item.application),
            params: item.params.clone(),
        }
    }
}

/// Restart queue entry. Only its presence matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartTrigger;

/// What one scheduler tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The queue was locked; nothing was drained.
    Locked,
    /// The queue was empty.
    Idle,
    Drained { processed: usize, failed: usize },
}

/// The three queues and the global halt signal, shared by every loop.
#[derive(Debug)]
pub struct Pipeline {
    build: WorkQueue<BuildItem>,
    images: WorkQueue<ImageItem>,
    restart: WorkQueue<RestartTrigger>,
    halt: watch::Sender<bool>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline {
    pub fn new() -> Self {
        let (halt, _) = watch::channel(false);
        Self {
            build: WorkQueue::new(),
            images: WorkQueue::new(),
            restart: WorkQueue::new(),
            halt,
        }
    }

    pub fn build_queue(&self) -> &WorkQueue<BuildItem> {
        &self.build
    }

    pub fn image_queue(&self) -> &WorkQueue<ImageItem> {
        &self.images
    }

    pub fn restart_queue(&self) -> &WorkQueue<RestartTrigger> {
        &self.restart
    }

    /// Enqueue a task build.
    ///
    /// The image queue is locked right away, so no image wave can start while
    /// the build queue holds work. The build scheduler unlocks it once it
    /// finds the build queue empty.
    pub fn order_build(&self, item: BuildItem) {
        debug!(item = %item.label(), "build ordered");
        self.build.push(item);
        self.images.lock();
    }

    pub fn order_image(&self, item: ImageItem) {
        debug!(application = %item.application.name(), "image build ordered");
        self.images.push(item);
    }

    pub fn order_restart(&self) {
        debug!("restart ordered");
        self.restart.push(RestartTrigger);
    }

    /// Stop every loop at its next wait.
    pub fn halt(&self) {
        self.halt.send_replace(true);
    }

    pub fn is_halted(&self) -> bool {
        *self.halt.borrow()
    }

    pub fn halt_signal(&self) -> watch::Receiver<bool> {
        self.halt.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::CommandBackend;

    fn item() -> BuildItem {
        let task = Task::new("client", "/apps/web/client", Arc::new(CommandBackend::new("true")));
        let app = Arc::new(Application::new("web", "/apps/web", "/apps/web").with_task(task));
        let task = app.tasks()[0].clone();
        BuildItem::new(app, task, BuildParams::default())
    }

    #[test]
    fn ordering_a_build_locks_the_image_queue() {
        let pipeline = Pipeline::new();
        assert!(!pipeline.image_queue().is_locked());

        pipeline.order_build(item());

        assert_eq!(pipeline.build_queue().len(), 1);
        assert!(pipeline.image_queue().is_locked());
        assert_eq!(item().label(), "web:client");
    }

    #[test]
    fn halt_is_observed_by_late_subscribers() {
        let pipeline = Pipeline::new();
        pipeline.halt();

        assert!(pipeline.is_halted());
        assert!(*pipeline.halt_signal().borrow());
    }
}
