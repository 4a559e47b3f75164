//! Structured status events.
//!
//! Observers (loggers, metrics, "now playing" pushers) subscribe through
//! [`Broadcast::events`](super::Broadcast::events). Track and pause events are
//! edge-triggered: one per change, not one per chunk. A slow observer lags and
//! loses events; it never holds up the producer.

use std::path::PathBuf;

use serde::Serialize;

use crate::scheduler::UnitKind;

/// Something observers may want to know about.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BroadcastEvent {
    /// A new unit went on air. `kind` is `None` for music-only stretches.
    TrackChanged {
        track: String,
        kind: Option<UnitKind>,
    },
    /// The voice-free pause after a unit started or ended.
    PauseChanged { track: String, paused: bool },
    /// A sponsored message joined the queue.
    SponsoredQueued { path: PathBuf, queued: usize },
    /// A selected unit could not be loaded and was dropped.
    TrackSkipped { path: PathBuf, reason: String },
    /// The producer exited. `error` is set when it died.
    Stopped { error: Option<String> },
}

/// Turns the per-chunk (unit, paused) tags into change events.
#[derive(Debug, Default)]
pub(crate) struct OnAirTracker {
    unit: Option<u64>,
    paused: Option<bool>,
}

impl OnAirTracker {
    pub(crate) fn observe(
        &mut self,
        unit: u64,
        track: &str,
        kind: Option<UnitKind>,
        paused: bool,
    ) -> Vec<BroadcastEvent> {
        let mut events = Vec::new();
        if self.unit != Some(unit) {
            self.unit = Some(unit);
            self.paused = None;
            events.push(BroadcastEvent::TrackChanged {
                track: track.to_string(),
                kind,
            });
        }
        if self.paused != Some(paused) {
            // Entering a unit un-paused is implied by TrackChanged.
            if paused || self.paused.is_some() {
                events.push(BroadcastEvent::PauseChanged {
                    track: track.to_string(),
                    paused,
                });
            }
            self.paused = Some(paused);
        }
        events
    }
}
