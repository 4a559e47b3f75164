//! Bounded, sequence-numbered store of recent chunks.
//!
//! Sequence numbers start at 0 and increase by one per push, so the retained
//! window is always a contiguous range `oldest..=newest`. Pushing into a full
//! ring evicts the oldest chunk; a reader that had not reached it yet simply
//! never sees it.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::SystemTime;

use bytes::Bytes;

/// One produced unit of PCM audio.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Position in the broadcast, strictly increasing from 0.
    pub seq: u64,
    /// Raw little-endian 16-bit PCM (or the stream header for the header chunk).
    pub payload: Bytes,
    /// Wall-clock production time.
    pub timestamp: SystemTime,
    /// Track on air when the chunk was produced; `None` only for the header.
    pub track: Option<Arc<str>>,
    /// Whether the chunk belongs to a voice-free pause.
    pub paused: bool,
}

impl Chunk {
    pub fn is_header(&self) -> bool {
        self.track.is_none()
    }
}

/// Ring of the most recent `capacity` chunks.
#[derive(Debug)]
pub struct ChunkRing {
    chunks: VecDeque<Chunk>,
    capacity: usize,
    next_seq: u64,
}

impl ChunkRing {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            chunks: VecDeque::with_capacity(capacity),
            capacity,
            next_seq: 0,
        }
    }

    /// Append a chunk, evicting the oldest when full. Returns its sequence number.
    pub fn push(&mut self, payload: Bytes, track: Option<Arc<str>>, paused: bool) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        if self.chunks.len() == self.capacity {
            self.chunks.pop_front();
        }
        self.chunks.push_back(Chunk {
            seq,
            payload,
            timestamp: SystemTime::now(),
            track,
            paused,
        });
        seq
    }

    pub fn newest_seq(&self) -> Option<u64> {
        self.chunks.back().map(|c| c.seq)
    }

    pub fn oldest_seq(&self) -> Option<u64> {
        self.chunks.front().map(|c| c.seq)
    }

    /// Every retained chunk newer than `last_seen`, ascending.
    /// `None` means nothing seen yet.
    pub fn after(&self, last_seen: Option<u64>) -> Vec<Chunk> {
        let Some(oldest) = self.oldest_seq() else {
            return Vec::new();
        };
        let first_wanted = last_seen.map_or(0, |s| s + 1);
        let skip = first_wanted.saturating_sub(oldest) as usize;
        self.chunks.iter().skip(skip).cloned().collect()
    }

    /// Sequence numbers currently retained.
    pub fn sequences(&self) -> Vec<u64> {
        self.chunks.iter().map(|c| c.seq).collect()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
