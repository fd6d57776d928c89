// src/engine/build.rs

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::engine::{FailureReporter, ImageItem, Pipeline, TickOutcome, Ticker};
use crate::exec::SourceBuilder;

/// Drains the build queue, builds every drained task concurrently and hands
/// image-rebuild candidates to the image queue.
pub struct BuildScheduler {
    pipeline: Arc<Pipeline>,
    builder: Arc<dyn SourceBuilder>,
    reporter: Arc<dyn FailureReporter>,
}

impl BuildScheduler {
    pub fn new(
        pipeline: Arc<Pipeline>,
        builder: Arc<dyn SourceBuilder>,
        reporter: Arc<dyn FailureReporter>,
    ) -> Self {
        Self {
            pipeline,
            builder,
            reporter,
        }
    }

    /// Tick every `period` until the pipeline halts.
    pub async fn run(self, period: Duration) {
        let mut ticker = Ticker::new(period, self.pipeline.halt_signal());
        while ticker.next().await {
            self.tick().await;
        }
        debug!("build scheduler stopped");
    }

    /// One scheduling step.
    ///
    /// - locked build queue: nothing happens.
    /// - empty build queue: the image queue is unlocked.
    /// - otherwise every item is drained and built; the image queue stays
    ///   locked until the batch settles. Successful items whose task wants an
    ///   image rebuild are pushed to the image queue, one per application,
    ///   but only if no item of the batch failed.
    pub async fn tick(&self) -> TickOutcome {
        let build = self.pipeline.build_queue();
        let images = self.pipeline.image_queue();

        if build.is_locked() {
            return TickOutcome::Locked;
        }
        if build.is_empty() {
            images.unlock();
            return TickOutcome::Idle;
        }

        images.lock();
        let items = build.pop_all();
        debug!(count = items.len(), "draining build queue");

        let results = join_all(items.iter().map(|item| self.builder.build(item))).await;

        let mut failed = 0;
        for (item, result) in items.iter().zip(&results) {
            if let Err(err) = result {
                failed += 1;
                self.reporter.action_failed(item, err);
            }
        }

        if failed > 0 {
            warn!(
                failed,
                total = items.len(),
                "build cycle had failures; no images will be rebuilt"
            );
            return TickOutcome::Drained {
                processed: items.len(),
                failed,
            };
        }

        let mut seen = HashSet::new();
        let candidates: Vec<ImageItem> = items
            .iter()
            .filter(|item| item.task.needs_image_rebuild())
            .filter(|item| seen.insert(item.application.name().to_string()))
            .map(ImageItem::from)
            .collect();

        let labels: Vec<String> = items.iter().map(|item| item.label()).collect();
        info!("Done ({})", labels.join(", "));

        if !candidates.is_empty() {
            debug!(count = candidates.len(), "queueing image rebuilds");
            images.push_all(candidates);
        }

        TickOutcome::Drained {
            processed: items.len(),
            failed: 0,
        }
    }
}
