// src/watch/watcher.rs

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::engine::{BuildItem, Pipeline};
use crate::errors::Result;
use crate::watch::debounce::{Debouncer, WatchSignal};
use crate::watch::patterns::{ChangeFilter, is_relevant};

/// Knobs of one watch.
#[derive(Debug, Clone, Copy)]
pub struct WatchOptions {
    /// Drop the burst caused by setting up the watch. The whole first
    /// `aggregate_timeout` window is dropped, including real edits made in it.
    pub ignore_initial: bool,
    pub follow_symlinks: bool,
    /// How long a burst of changes is collected before one request fires.
    pub aggregate_timeout: Duration,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            ignore_initial: true,
            follow_symlinks: true,
            aggregate_timeout: Duration::from_millis(200),
        }
    }
}

/// Keeps a watch alive. [`close`](Self::close) (or dropping the handle) stops
/// the underlying watcher and its forwarding task.
pub struct WatcherHandle {
    label: String,
    inner: Option<RecommendedWatcher>,
    forward: Option<JoinHandle<()>>,
}

impl fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatcherHandle")
            .field("label", &self.label)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl WatcherHandle {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }

    pub fn close(&mut self) {
        if self.inner.take().is_some() {
            debug!(watch = %self.label, "watcher closed");
        }
        if let Some(forward) = self.forward.take() {
            forward.abort();
        }
    }
}

impl Drop for WatcherHandle {
    fn drop(&mut self) {
        self.close();
    }
}

/// Path predicate applied to every raw event path.
pub type PathFilter = Arc<dyn Fn(&Path) -> bool + Send + Sync>;

/// Watch `paths` recursively and call `on_change` once per debounced burst.
///
/// Paths that cannot be watched are logged and skipped; only a failure to
/// create the watcher itself is an error.
pub fn watch_paths<F>(
    label: impl Into<String>,
    paths: &[PathBuf],
    mode: RecursiveMode,
    filter: PathFilter,
    options: WatchOptions,
    on_change: F,
) -> Result<WatcherHandle>
where
    F: Fn(Vec<PathBuf>) + Send + 'static,
{
    let label = label.into();
    let (tx, mut rx) = mpsc::unbounded_channel::<WatchSignal>();

    let mut watcher = RecommendedWatcher::new(
        {
            let tx = tx.clone();
            let label = label.clone();
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if !is_relevant(&event.kind) {
                        return;
                    }
                    let paths: Vec<PathBuf> =
                        event.paths.into_iter().filter(|p| filter(p.as_path())).collect();
                    if !paths.is_empty() {
                        let _ = tx.send(WatchSignal::Changed(paths));
                    }
                }
                Err(err) => warn!(watch = %label, error = %err, "file watch error"),
            }
        },
        Config::default().with_follow_symlinks(options.follow_symlinks),
    )
    .map_err(anyhow::Error::from)?;

    for path in paths {
        match watcher.watch(path, mode) {
            Ok(()) => info!(watch = %label, path = ?path, "watching"),
            Err(err) => warn!(watch = %label, path = ?path, error = %err, "cannot watch path"),
        }
    }
    let _ = tx.send(WatchSignal::InitialScan);

    let forward_label = label.clone();
    let forward = tokio::spawn(async move {
        let mut debouncer = Debouncer::new(options.ignore_initial);
        while let Some(signal) = rx.recv().await {
            debouncer.record(signal);
            tokio::time::sleep(options.aggregate_timeout).await;
            while let Ok(signal) = rx.try_recv() {
                debouncer.record(signal);
            }
            if let Some(changed) = debouncer.flush() {
                debug!(watch = %forward_label, changed = changed.len(), "change detected");
                on_change(changed);
            }
        }
    });

    Ok(WatcherHandle {
        label,
        inner: Some(watcher),
        forward: Some(forward),
    })
}

/// Watch a task's source folder; every debounced change orders `item`.
///
/// The task's destination folder and the temporary root are never watched,
/// so a build writing its output under the sources does not order itself
/// again.
pub fn watch_task(
    pipeline: Arc<Pipeline>,
    item: BuildItem,
    options: WatchOptions,
) -> Result<WatcherHandle> {
    let ctx = item.context();
    let root = ctx
        .source_folder()
        .unwrap_or_else(|| item.task.folder().to_path_buf());
    let mut filter = ChangeFilter::new(&root, item.task.exclude())?;
    for output in [ctx.destination_folder(), ctx.params().temporary_root.clone()] {
        if root.starts_with(&output) {
            warn!(item = %item.label(), output = ?output, "sources live inside an output folder; it stays watched");
            continue;
        }
        filter = filter.ignoring(output);
    }
    let filter: PathFilter = Arc::new(move |path| filter.matches(path));

    watch_paths(
        item.label(),
        &[root],
        RecursiveMode::Recursive,
        filter,
        options,
        move |changed| {
            info!(item = %item.label(), changed = changed.len(), "sources changed");
            pipeline.order_build(item.clone());
        },
    )
}

/// Watch the compose file; a change orders a restart.
///
/// The parent folder is watched so that editors replacing the file do not
/// end the watch.
pub fn watch_composition(
    pipeline: Arc<Pipeline>,
    compose_file: &Path,
    options: WatchOptions,
) -> Result<WatcherHandle> {
    let folder = compose_file
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let file_name = compose_file.file_name().map(|n| n.to_os_string());
    let filter: PathFilter = Arc::new(move |path| path.file_name().map(|n| n.to_os_string()) == file_name);

    watch_paths(
        "composition",
        &[folder],
        RecursiveMode::NonRecursive,
        filter,
        options,
        move |_| {
            info!("composition file changed");
            pipeline.order_restart();
        },
    )
}
