//! Per-listener view of the shared broadcast.
//!
//! Each [`Subscription`] keeps its own read position over the one ring. It
//! starts with the stream header, then joins at the live edge and drains new
//! chunks in sequence order, sleeping on the state watch between batches.

use std::collections::VecDeque;
use std::sync::Arc;

use bytes::Bytes;
use futures::Stream;
use tokio::sync::watch;

use super::ring::Chunk;
use super::{BroadcastState, Shared};

/// An independent listening session.
pub struct Subscription {
    shared: Arc<Shared>,
    state_rx: watch::Receiver<BroadcastState>,
    last_seen: Option<u64>,
    pending: VecDeque<Chunk>,
    header_sent: bool,
    missed: u64,
}

impl Subscription {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        let state_rx = shared.state.subscribe();
        // Join at the live edge: the newest chunk is the first one delivered.
        let last_seen = shared.ring.read().newest_seq().and_then(|n| n.checked_sub(1));
        Self {
            shared,
            state_rx,
            last_seen,
            pending: VecDeque::new(),
            header_sent: false,
            missed: 0,
        }
    }

    /// Next bytes for the listener: the header once, then PCM payloads.
    /// `None` once the broadcast has stopped.
    pub async fn next(&mut self) -> Option<Bytes> {
        if !self.header_sent {
            self.header_sent = true;
            return Some(self.shared.header.clone());
        }
        self.next_chunk().await.map(|chunk| chunk.payload)
    }

    /// Next audio chunk with its metadata. Does not emit the header.
    pub async fn next_chunk(&mut self) -> Option<Chunk> {
        loop {
            if let Some(chunk) = self.pending.pop_front() {
                return Some(chunk);
            }
            // Mark the current version seen before looking, so a push that
            // races with the look still wakes `changed()`.
            drop(self.state_rx.borrow_and_update());
            if self.shared.is_stopped() {
                return None;
            }
            self.refill();
            if !self.pending.is_empty() {
                continue;
            }
            if self.state_rx.changed().await.is_err() {
                return None;
            }
        }
    }

    /// Highest sequence number handed out (or skipped past) so far.
    pub fn last_seen(&self) -> Option<u64> {
        self.last_seen
    }

    /// Chunks evicted before this subscriber could read them.
    pub fn missed(&self) -> u64 {
        self.missed
    }

    /// Adapt to a byte stream, e.g. for an HTTP response body.
    pub fn into_stream(self) -> impl Stream<Item = std::io::Result<Bytes>> + Send + 'static {
        futures::stream::unfold(self, |mut sub| async move {
            sub.next().await.map(|bytes| (Ok(bytes), sub))
        })
    }

    fn refill(&mut self) {
        let fresh = self.shared.ring.read().after(self.last_seen);
        let Some(first) = fresh.first() else {
            return;
        };
        let expected = self.last_seen.map_or(0, |s| s + 1);
        if first.seq > expected {
            let lost = first.seq - expected;
            self.missed += lost;
            tracing::debug!(lost, resumed_at = first.seq, "subscriber fell behind the buffer");
        }
        for chunk in fresh {
            self.last_seen = Some(chunk.seq);
            // The header already went out at the start of the session.
            if !chunk.is_header() {
                self.pending.push_back(chunk);
            }
        }
    }
}
