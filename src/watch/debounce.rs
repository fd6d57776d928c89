// src/watch/debounce.rs

//! Burst aggregation for raw watch signals.

use std::collections::BTreeSet;
use std::path::PathBuf;

/// What the filesystem layer reports to a [`Debouncer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchSignal {
    /// Watching was set up; stands for the files that already exist.
    InitialScan,
    Changed(Vec<PathBuf>),
}

/// Collects the signals of one burst and turns them into at most one rebuild
/// request.
///
/// With `ignore_initial`, the burst holding the [`WatchSignal::InitialScan`]
/// is dropped as a whole: setting up a watch never triggers a rebuild, and
/// neither does anything that lands in the same aggregation window.
#[derive(Debug, Clone, Default)]
pub struct Debouncer {
    ignore_initial: bool,
    suppress: bool,
    initial: bool,
    pending: BTreeSet<PathBuf>,
}

impl Debouncer {
    pub fn new(ignore_initial: bool) -> Self {
        Self {
            ignore_initial,
            ..Self::default()
        }
    }

    pub fn record(&mut self, signal: WatchSignal) {
        match signal {
            WatchSignal::InitialScan if self.ignore_initial => self.suppress = true,
            WatchSignal::InitialScan => self.initial = true,
            WatchSignal::Changed(paths) => self.pending.extend(paths),
        }
    }

    /// End the current burst.
    ///
    /// Returns the changed paths (sorted, deduplicated) if the burst asks for
    /// a rebuild. An initial scan that is not ignored yields `Some` even
    /// without paths.
    pub fn flush(&mut self) -> Option<Vec<PathBuf>> {
        let paths: Vec<PathBuf> = std::mem::take(&mut self.pending).into_iter().collect();
        let initial = std::mem::take(&mut self.initial);

        if std::mem::take(&mut self.suppress) {
            return None;
        }
        if paths.is_empty() && !initial {
            return None;
        }
        Some(paths)
    }
}
