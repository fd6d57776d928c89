// src/engine/image.rs

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::compose::Composition;
use crate::engine::{FailureReporter, ImageItem, Pipeline, TickOutcome, Ticker};
use crate::exec::ImageBuilder;
use crate::project::BuildContext;

/// Drains the image queue, rebuilds the images concurrently and requests one
/// composition restart per clean wave.
pub struct ImageScheduler {
    pipeline: Arc<Pipeline>,
    builder: Arc<dyn ImageBuilder>,
    composition: Arc<Composition>,
    reporter: Arc<dyn FailureReporter>,
}

impl ImageScheduler {
    pub fn new(
        pipeline: Arc<Pipeline>,
        builder: Arc<dyn ImageBuilder>,
        composition: Arc<Composition>,
        reporter: Arc<dyn FailureReporter>,
    ) -> Self {
        Self {
            pipeline,
            builder,
            composition,
            reporter,
        }
    }

    pub async fn run(self, period: Duration) {
        let mut ticker = Ticker::new(period, self.pipeline.halt_signal());
        while ticker.next().await {
            self.tick().await;
        }
        debug!("image scheduler stopped");
    }

    /// Image-build context for `item`, named after the composition's rule.
    pub fn context_for(&self, item: &ImageItem) -> BuildContext {
        let mut ctx = BuildContext::for_application(item.params.clone(), Arc::clone(&item.application));
        ctx.set_image_name(self.composition.make_image_name(item.application.name()));
        ctx
    }

    /// One scheduling step.
    ///
    /// The queue is locked for the whole image wave and left locked; the
    /// build scheduler releases it once the build queue is empty again.
    pub async fn tick(&self) -> TickOutcome {
        let queue = self.pipeline.image_queue();
        if queue.is_locked() {
            return TickOutcome::Locked;
        }
        if queue.is_empty() {
            return TickOutcome::Idle;
        }

        queue.lock();
        let drained = queue.pop_all();
        let processed = drained.len();

        let mut seen = HashSet::new();
        let items: Vec<ImageItem> = drained
            .into_iter()
            .filter(|item| seen.insert(item.application.name().to_string()))
            .collect();
        debug!(count = items.len(), "draining image queue");

        let contexts: Vec<BuildContext> = items.iter().map(|item| self.context_for(item)).collect();
        let results = join_all(contexts.iter().map(|ctx| self.builder.build_image(ctx))).await;

        let mut failed = 0;
        for (item, result) in items.iter().zip(&results) {
            if let Err(err) = result {
                failed += 1;
                self.reporter.image_build_failed(item, err);
            }
        }

        if failed > 0 {
            warn!(failed, total = items.len(), "image wave had failures; not restarting");
        } else {
            let names: Vec<&str> = contexts.iter().filter_map(|ctx| ctx.image_name()).collect();
            info!("Done ({})", names.join(", "));
            self.pipeline.order_restart();
        }

        TickOutcome::Drained { processed, failed }
    }
}
