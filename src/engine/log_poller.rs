// src/engine/log_poller.rs

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::{debug, trace};

use crate::engine::{Pipeline, Ticker};
use crate::exec::ComposeControl;
use crate::project::{Application, LogSink};

/// Source of "now" in Unix seconds.
pub type Clock = Arc<dyn Fn() -> u64 + Send + Sync>;

/// Wall clock. Skew or a slow fetch can drop or repeat lines; that is
/// accepted for a development tool.
pub fn system_clock() -> Clock {
    Arc::new(|| {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default()
    })
}

/// Tails every application's container output into a [`LogSink`].
pub struct LogPoller {
    pipeline: Arc<Pipeline>,
    applications: Vec<Arc<Application>>,
    compose: Arc<dyn ComposeControl>,
    sink: Arc<dyn LogSink>,
    clock: Clock,
    last_polled: HashMap<String, u64>,
}

impl LogPoller {
    pub fn new(
        pipeline: Arc<Pipeline>,
        applications: Vec<Arc<Application>>,
        compose: Arc<dyn ComposeControl>,
        sink: Arc<dyn LogSink>,
    ) -> Self {
        Self {
            pipeline,
            applications,
            compose,
            sink,
            clock: system_clock(),
            last_polled: HashMap::new(),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn last_polled(&self, application: &str) -> Option<u64> {
        self.last_polled.get(application).copied()
    }

    pub async fn run(mut self, period: Duration) {
        let mut ticker = Ticker::new(period, self.pipeline.halt_signal());
        while ticker.next().await {
            self.tick().await;
        }
        debug!("log poller stopped");
    }

    /// Fetch new output of each application in turn, never concurrently.
    pub async fn tick(&mut self) {
        for application in &self.applications {
            let since = self.last_polled.get(application.name()).copied();
            let text = self.compose.logs(application.name(), since).await;
            trace!(application = %application.name(), ?since, bytes = text.len(), "polled logs");

            if !text.is_empty() {
                self.sink.on_message(application, text).await;
            }
            self.last_polled
                .insert(application.name().to_string(), (self.clock)());
        }
    }
}
