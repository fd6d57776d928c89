// src/engine/queue.rs

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use tracing::trace;

/// FIFO buffer of work items with a lock flag.
///
/// Semantics:
/// - `push` / `push_all` always append, locked or not. Locking blocks
///   *draining* (the scheduler checks [`is_locked`](Self::is_locked) before
///   calling [`pop_all`](Self::pop_all)), never enqueueing.
/// - `pop_all` removes and returns every buffered item in one step; no item
///   is ever partially drained.
/// - The buffer sits behind a short std mutex that is never held across an
///   `.await`; the lock flag is a plain atomic.
#[derive(Debug)]
pub struct WorkQueue<T> {
    items: Mutex<VecDeque<T>>,
    locked: AtomicBool,
}

impl<T> Default for WorkQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> WorkQueue<T> {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            locked: AtomicBool::new(false),
        }
    }

    fn buffer(&self) -> MutexGuard<'_, VecDeque<T>> {
        match self.items.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn push(&self, item: T) {
        self.buffer().push_back(item);
    }

    pub fn push_all<I>(&self, items: I)
    where
        I: IntoIterator<Item = T>,
    {
        self.buffer().extend(items);
    }

    /// Drain every buffered item, oldest first.
    pub fn pop_all(&self) -> Vec<T> {
        let drained: Vec<T> = self.buffer().drain(..).collect();
        trace!(drained = drained.len(), "drained work queue");
        drained
    }

    pub fn is_empty(&self) -> bool {
        self.buffer().is_empty()
    }

    pub fn len(&self) -> usize {
        self.buffer().len()
    }

    pub fn lock(&self) {
        self.locked.store(true, Ordering::SeqCst);
    }

    pub fn unlock(&self) {
        self.locked.store(false, Ordering::SeqCst);
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pop_all_drains_in_fifo_order() {
        let queue = WorkQueue::new();
        queue.push(1);
        queue.push_all([2, 3]);
        queue.push(4);

        assert_eq!(queue.len(), 4);
        assert_eq!(queue.pop_all(), vec![1, 2, 3, 4]);
        assert!(queue.is_empty());
        assert!(queue.pop_all().is_empty());
    }

    #[test]
    fn locking_does_not_block_push() {
        let queue = WorkQueue::new();
        queue.lock();
        queue.push("a");
        queue.push_all(["b"]);

        assert!(queue.is_locked());
        assert_eq!(queue.len(), 2);

        queue.unlock();
        assert!(!queue.is_locked());
        assert_eq!(queue.pop_all(), vec!["a", "b"]);
    }
}
