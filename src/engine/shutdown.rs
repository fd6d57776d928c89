// src/engine/shutdown.rs

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{error, info};

use crate::engine::Pipeline;
use crate::exec::ComposeControl;
use crate::project::OutputStreams;
use crate::watch::WatcherHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    Completed,
    /// The composition did not stop; nothing else was torn down.
    StopFailed,
}

/// Orderly teardown on interrupt.
///
/// Stages, strictly in order:
/// 1. stop the composition (a failure ends the shutdown right there),
/// 2. halt every loop and lock the build queue,
/// 3. close the output streams, waiting for each flush,
/// 4. close the watchers.
pub struct ShutdownCoordinator {
    pipeline: Arc<Pipeline>,
    compose: Arc<dyn ComposeControl>,
    streams: Arc<OutputStreams>,
    watchers: Mutex<Vec<WatcherHandle>>,
    composition_stopped: AtomicBool,
}

impl ShutdownCoordinator {
    pub fn new(
        pipeline: Arc<Pipeline>,
        compose: Arc<dyn ComposeControl>,
        streams: Arc<OutputStreams>,
    ) -> Self {
        Self {
            pipeline,
            compose,
            streams,
            watchers: Mutex::new(Vec::new()),
            composition_stopped: AtomicBool::new(false),
        }
    }

    fn lock_watchers(&self) -> std::sync::MutexGuard<'_, Vec<WatcherHandle>> {
        match self.watchers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn add_watchers(&self, watchers: impl IntoIterator<Item = WatcherHandle>) {
        self.lock_watchers().extend(watchers);
    }

    /// Watchers still open.
    pub fn active_watchers(&self) -> usize {
        self.lock_watchers().len()
    }

    pub async fn shutdown(&self) -> ShutdownOutcome {
        if !self.composition_stopped.load(Ordering::SeqCst) {
            info!("Stopping composition...");
            if let Err(err) = self.compose.stop().await {
                error!(error = %err, "was not able to stop the composition");
                return ShutdownOutcome::StopFailed;
            }
            self.composition_stopped.store(true, Ordering::SeqCst);
        }

        self.pipeline.halt();
        self.pipeline.build_queue().lock();

        self.streams.close_all().await;

        let watchers: Vec<WatcherHandle> = self.lock_watchers().drain(..).collect();
        for mut watcher in watchers {
            watcher.close();
        }

        info!("Bye-bye");
        ShutdownOutcome::Completed
    }
}
