// src/project/streams.rs

//! Per-application output streams.
//!
//! Every application gets one append-only log file. Build output, image build
//! output and polled container logs all land there. The streams are owned by
//! the [`Project`](crate::project::Project) and closed by the shutdown
//! coordinator.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use futures::future::join_all;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::project::Application;
use crate::types::BoxFuture;

/// File name of the log inside an application's log folder.
pub const OUTPUT_FILE: &str = "output";

/// A single writable log sink.
///
/// Writes after [`close`](LogStream::close) are dropped silently, as are
/// write errors: output is best effort.
pub struct LogStream {
    path: Option<PathBuf>,
    file: tokio::sync::Mutex<Option<File>>,
}

impl fmt::Debug for LogStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogStream")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl LogStream {
    /// Create (truncate) the log file at `path`, creating parent folders.
    pub fn create(path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::File::create(&path)?;
        Ok(Self {
            path: Some(path),
            file: tokio::sync::Mutex::new(Some(File::from_std(file))),
        })
    }

    /// A stream that swallows everything.
    pub fn discard() -> Self {
        Self {
            path: None,
            file: tokio::sync::Mutex::new(None),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub async fn write(&self, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        let mut guard = self.file.lock().await;
        if let Some(file) = guard.as_mut() {
            if let Err(err) = file.write_all(data).await {
                debug!(path = ?self.path, error = %err, "dropping log output");
            }
        }
    }

    /// Flush and close. Idempotent.
    pub async fn close(&self) {
        let mut guard = self.file.lock().await;
        if let Some(mut file) = guard.take() {
            if let Err(err) = file.flush().await {
                warn!(path = ?self.path, error = %err, "failed to flush log stream");
            }
        }
    }

    pub async fn is_closed(&self) -> bool {
        self.file.lock().await.is_none()
    }
}

/// Receiver of polled container logs.
pub trait LogSink: Send + Sync {
    fn on_message<'a>(&'a self, application: &'a Application, text: String) -> BoxFuture<'a, ()>;
}

/// The set of per-application streams, created lazily on first use.
#[derive(Debug)]
pub struct OutputStreams {
    log_root: PathBuf,
    streams: Mutex<BTreeMap<String, Arc<LogStream>>>,
}

impl OutputStreams {
    /// `log_root` is the project's temporary folder; each application logs
    /// into `<log_root>/<application>/log/output`.
    pub fn new(log_root: impl Into<PathBuf>) -> Self {
        Self {
            log_root: log_root.into(),
            streams: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn log_path(&self, application: &str) -> PathBuf {
        self.log_root.join(application).join("log").join(OUTPUT_FILE)
    }

    /// Stream for `application`, opening its log file on first access.
    ///
    /// If the file cannot be created, a discarding stream is returned and the
    /// error is logged; a broken log must not stop builds.
    pub fn stream(&self, application: &str) -> Arc<LogStream> {
        let mut streams = match self.streams.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        streams
            .entry(application.to_string())
            .or_insert_with(|| {
                let path = self.log_path(application);
                match LogStream::create(&path) {
                    Ok(stream) => Arc::new(stream),
                    Err(err) => {
                        warn!(application, path = ?path, error = %err, "cannot open log file; discarding output");
                        Arc::new(LogStream::discard())
                    }
                }
            })
            .clone()
    }

    /// Close every stream that was opened, waiting for each flush.
    pub async fn close_all(&self) {
        let streams: Vec<Arc<LogStream>> = {
            let guard = match self.streams.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            guard.values().cloned().collect()
        };

        debug!(count = streams.len(), "closing output streams");
        join_all(streams.iter().map(|s| s.close())).await;
    }
}

impl LogSink for OutputStreams {
    fn on_message<'a>(&'a self, application: &'a Application, text: String) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            self.stream(application.name()).write(text.as_bytes()).await;
        })
    }
}
