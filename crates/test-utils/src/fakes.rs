#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use composewatch::engine::{BuildItem, FailureReporter, ImageItem};
use composewatch::errors::{ComposeWatchError, Result};
use composewatch::exec::{ComposeControl, ImageBuilder, SourceBuilder};
use composewatch::project::{Application, BuildContext, LogSink};
use composewatch::types::BoxFuture;
use tokio::sync::watch;

fn failure(what: &str) -> ComposeWatchError {
    ComposeWatchError::CommandFailed {
        program: what.to_string(),
        code: 1,
    }
}

/// A latch fakes can wait on, so a test can hold an action "in flight".
#[derive(Debug)]
pub struct Gate {
    open: watch::Sender<bool>,
}

impl Gate {
    pub fn new() -> Arc<Self> {
        let (open, _) = watch::channel(false);
        Arc::new(Self { open })
    }

    pub fn open(&self) {
        self.open.send_replace(true);
    }

    pub async fn wait(&self) {
        let mut rx = self.open.subscribe();
        let _ = rx.wait_for(|open| *open).await;
    }
}

/// Fake task builder:
/// - records the label (`app:task`) of every build it starts
/// - fails the labels registered with `failing_on`
/// - optionally waits on a [`Gate`] before finishing.
#[derive(Default)]
pub struct FakeRunner {
    started: Mutex<Vec<String>>,
    failing: HashSet<String>,
    gate: Option<Arc<Gate>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(mut self, label: &str) -> Self {
        self.failing.insert(label.to_string());
        self
    }

    pub fn gated(mut self, gate: Arc<Gate>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn started(&self) -> Vec<String> {
        self.started.lock().unwrap().clone()
    }
}

impl SourceBuilder for FakeRunner {
    fn build<'a>(&'a self, item: &'a BuildItem) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let label = item.label();
            self.started.lock().unwrap().push(label.clone());
            if let Some(gate) = &self.gate {
                gate.wait().await;
            }
            if self.failing.contains(&label) {
                Err(failure(&label))
            } else {
                Ok(())
            }
        })
    }
}

/// Fake image builder recording built and pushed image names.
#[derive(Default)]
pub struct FakeImageBuilder {
    built: Mutex<Vec<String>>,
    pushed: Mutex<Vec<String>>,
    failing: HashSet<String>,
}

impl FakeImageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail builds for application `code`.
    pub fn failing_on(mut self, code: &str) -> Self {
        self.failing.insert(code.to_string());
        self
    }

    pub fn built(&self) -> Vec<String> {
        self.built.lock().unwrap().clone()
    }

    pub fn pushed(&self) -> Vec<String> {
        self.pushed.lock().unwrap().clone()
    }
}

impl ImageBuilder for FakeImageBuilder {
    fn build_image<'a>(&'a self, ctx: &'a BuildContext) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let image = ctx.image_name().unwrap_or_default().to_string();
            self.built.lock().unwrap().push(image.clone());
            if self.failing.contains(ctx.application().name()) {
                Err(failure(&image))
            } else {
                Ok(())
            }
        })
    }

    fn push<'a>(&'a self, ctx: &'a BuildContext) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let image = ctx.image_name().unwrap_or_default().to_string();
            self.pushed.lock().unwrap().push(image);
            Ok(())
        })
    }
}

/// Fake composition control.
///
/// `events()` lists `"up"`, `"stop"` and `"logs:<service>"` in call order.
#[derive(Default)]
pub struct FakeCompose {
    events: Mutex<Vec<String>>,
    log_calls: Mutex<Vec<(String, Option<u64>)>>,
    logs: Mutex<HashMap<String, String>>,
    fail_up: bool,
    fail_stop: bool,
    stop_gate: Option<Arc<Gate>>,
}

impl FakeCompose {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_up(mut self) -> Self {
        self.fail_up = true;
        self
    }

    pub fn failing_stop(mut self) -> Self {
        self.fail_stop = true;
        self
    }

    /// `stop()` does not resolve before the gate opens.
    pub fn gated_stop(mut self, gate: Arc<Gate>) -> Self {
        self.stop_gate = Some(gate);
        self
    }

    /// Text returned by every `logs(service, _)` call.
    pub fn with_logs(self, service: &str, text: &str) -> Self {
        self.logs
            .lock()
            .unwrap()
            .insert(service.to_string(), text.to_string());
        self
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn up_count(&self) -> usize {
        self.events().iter().filter(|e| *e == "up").count()
    }

    pub fn stop_count(&self) -> usize {
        self.events().iter().filter(|e| *e == "stop").count()
    }

    pub fn log_calls(&self) -> Vec<(String, Option<u64>)> {
        self.log_calls.lock().unwrap().clone()
    }
}

impl ComposeControl for FakeCompose {
    fn up<'a>(&'a self, _extra_args: &'a [String]) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.events.lock().unwrap().push("up".to_string());
            if self.fail_up { Err(failure("up")) } else { Ok(()) }
        })
    }

    fn stop(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.events.lock().unwrap().push("stop".to_string());
            if let Some(gate) = &self.stop_gate {
                gate.wait().await;
            }
            if self.fail_stop { Err(failure("stop")) } else { Ok(()) }
        })
    }

    fn logs<'a>(&'a self, service: &'a str, since: Option<u64>) -> BoxFuture<'a, String> {
        Box::pin(async move {
            self.events.lock().unwrap().push(format!("logs:{service}"));
            self.log_calls
                .lock()
                .unwrap()
                .push((service.to_string(), since));
            self.logs
                .lock()
                .unwrap()
                .get(service)
                .cloned()
                .unwrap_or_default()
        })
    }
}

/// Log sink recording `(application, text)` pairs.
#[derive(Default)]
pub struct RecordingSink {
    messages: Mutex<Vec<(String, String)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<(String, String)> {
        self.messages.lock().unwrap().clone()
    }
}

impl LogSink for RecordingSink {
    fn on_message<'a>(&'a self, application: &'a Application, text: String) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            self.messages
                .lock()
                .unwrap()
                .push((application.name().to_string(), text));
        })
    }
}

/// Failure reporter recording what failed.
#[derive(Default)]
pub struct RecordingReporter {
    builds: Mutex<Vec<String>>,
    images: Mutex<Vec<String>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Labels (`app:task`) of failed builds.
    pub fn failed_builds(&self) -> Vec<String> {
        self.builds.lock().unwrap().clone()
    }

    /// Application codes of failed image builds.
    pub fn failed_images(&self) -> Vec<String> {
        self.images.lock().unwrap().clone()
    }
}

impl FailureReporter for RecordingReporter {
    fn action_failed(&self, item: &BuildItem, _error: &ComposeWatchError) {
        self.builds.lock().unwrap().push(item.label());
    }

    fn image_build_failed(&self, item: &ImageItem, _error: &ComposeWatchError) {
        self.images
            .lock()
            .unwrap()
            .push(item.application.name().to_string());
    }
}
