//! Sponsored queue: one-shot messages that preempt the recurring loop.
//!
//! Fed from outside (bid acceptance), drained by the scheduler. Enqueue never
//! fails and never checks the path; a missing file shows up later as a load
//! error that the producer skips.

use std::collections::VecDeque;
use std::path::PathBuf;

use parking_lot::Mutex;

/// FIFO of pending sponsored audio files.
#[derive(Debug, Default)]
pub struct SponsoredQueue {
    pending: Mutex<VecDeque<PathBuf>>,
}

impl SponsoredQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a file. Returns the queue length after the push.
    pub fn enqueue(&self, path: impl Into<PathBuf>) -> usize {
        let path = path.into();
        let mut pending = self.pending.lock();
        pending.push_back(path.clone());
        let queued = pending.len();
        drop(pending);
        tracing::debug!(path = %path.display(), queued, "sponsored message queued");
        queued
    }

    /// Pop the oldest entry, if any. Never blocks on an empty queue.
    pub fn dequeue_if_any(&self) -> Option<PathBuf> {
        self.pending.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }

    /// Paths still waiting, oldest first.
    pub fn snapshot(&self) -> Vec<PathBuf> {
        self.pending.lock().iter().cloned().collect()
    }
}
