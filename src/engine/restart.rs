// src/engine/restart.rs

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::engine::{Pipeline, TickOutcome, Ticker};
use crate::exec::ComposeControl;

/// Collapses any number of restart triggers into one `up`.
pub struct RestartScheduler {
    pipeline: Arc<Pipeline>,
    compose: Arc<dyn ComposeControl>,
    extra_args: Vec<String>,
}

impl RestartScheduler {
    pub fn new(pipeline: Arc<Pipeline>, compose: Arc<dyn ComposeControl>) -> Self {
        Self {
            pipeline,
            compose,
            extra_args: Vec::new(),
        }
    }

    /// Arguments appended to every `up -d`.
    pub fn with_extra_args(mut self, extra_args: Vec<String>) -> Self {
        self.extra_args = extra_args;
        self
    }

    pub async fn run(self, period: Duration) {
        let mut ticker = Ticker::new(period, self.pipeline.halt_signal());
        while ticker.next().await {
            self.tick().await;
        }
        debug!("restart scheduler stopped");
    }

    /// A failed `up` is logged and not retried; the next trigger tries again.
    pub async fn tick(&self) -> TickOutcome {
        let queue = self.pipeline.restart_queue();
        if queue.is_locked() {
            return TickOutcome::Locked;
        }

        let triggers = queue.pop_all();
        if triggers.is_empty() {
            return TickOutcome::Idle;
        }

        debug!(coalesced = triggers.len(), "restarting composition");
        let failed = match self.compose.up(&self.extra_args).await {
            Ok(()) => {
                info!("Composition is up");
                0
            }
            Err(err) => {
                error!(error = %err, "was not able to restart the composition");
                1
            }
        };

        TickOutcome::Drained {
            processed: triggers.len(),
            failed,
        }
    }
}
