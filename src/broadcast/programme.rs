//! One render step of the programme: pick, load, mix.
//!
//! Synchronous and self-contained so the producer can run it on the blocking
//! pool. Every aired voice unit is followed by exactly one pause. The music
//! cursor lives here and advances by the length of everything aired.
//!
//! Music-only stretches that stand in for voice (idle, or filler after a
//! cycle of unplayable tracks) last at least one chunk, even when the
//! configured pause is zero.

use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;

use crate::config::StationConfig;
use crate::mixer::{MixedSegment, Mixer};
use crate::scheduler::{Scheduler, UnitKind};
use crate::sponsored::SponsoredQueue;
use crate::track::TrackStore;
use crate::{Error, Result};

/// A mixed segment ready to be cut into chunks.
#[derive(Debug, Clone)]
pub(crate) struct Rendered {
    /// Identifies the unit this segment belongs to; a unit and its pause share it.
    pub unit: u64,
    pub track: Arc<str>,
    /// `None` for music-only stretches.
    pub kind: Option<UnitKind>,
    pub paused: bool,
    /// Little-endian 16-bit PCM.
    pub pcm: Bytes,
}

/// Outcome of one step.
#[derive(Debug)]
pub(crate) enum Step {
    Aired(Rendered),
    /// The selected unit failed to load; nothing was aired for it.
    Skipped { path: PathBuf, error: Error },
}

#[derive(Debug, Clone)]
struct PauseDue {
    unit: u64,
    track: Arc<str>,
    kind: Option<UnitKind>,
    samples: usize,
}

/// Failure injected into the next render step.
#[cfg(test)]
#[derive(Debug)]
pub(crate) enum Fault {
    Fail(Error),
    Panic,
}

pub(crate) struct Programme {
    scheduler: Scheduler,
    store: TrackStore,
    mixer: Arc<Mixer>,
    pause_samples: usize,
    filler_samples: usize,
    cursor: usize,
    units: u64,
    pause_due: Option<PauseDue>,
    idle_unit: Option<u64>,
    failures_in_a_row: usize,
    #[cfg(test)]
    pub(crate) fault: Option<Fault>,
}

impl Programme {
    pub(crate) fn new(
        config: &StationConfig,
        mixer: Arc<Mixer>,
        sponsored: Arc<SponsoredQueue>,
    ) -> Self {
        Self {
            scheduler: Scheduler::new(config.recurring_tracks.clone(), sponsored),
            store: TrackStore::new(config.sample_rate),
            mixer,
            pause_samples: config.pause_samples(),
            filler_samples: config.pause_samples().max(config.chunk_samples),
            cursor: 0,
            units: 0,
            pause_due: None,
            idle_unit: None,
            failures_in_a_row: 0,
            #[cfg(test)]
            fault: None,
        }
    }

    /// Current music bed offset.
    pub(crate) fn cursor(&self) -> usize {
        self.cursor
    }

    /// Consecutive skips that make up one full cycle of bad tracks.
    pub(crate) fn cycle_len(&self) -> usize {
        self.scheduler.recurring_len().max(1)
    }

    pub(crate) fn render_next(&mut self) -> Result<Step> {
        #[cfg(test)]
        match self.fault.take() {
            Some(Fault::Fail(error)) => return Err(error),
            Some(Fault::Panic) => panic!("injected render panic"),
            None => {}
        }

        if let Some(due) = self.pause_due.take() {
            let segment = self.mixer.pause(due.samples, self.cursor);
            return Ok(Step::Aired(self.air(segment, due.unit, due.track, due.kind, true)));
        }

        let Some(unit) = self.scheduler.next_unit() else {
            return Ok(Step::Aired(self.render_idle()));
        };

        match self.store.load_voice(&unit.path) {
            Ok(track) => {
                self.failures_in_a_row = 0;
                self.idle_unit = None;
                let id = self.next_unit_id();
                let name: Arc<str> = Arc::from(track.name.as_str());
                let segment = self.mixer.mix(&track.samples, self.cursor);
                self.pause_due = Some(PauseDue {
                    unit: id,
                    track: name.clone(),
                    kind: Some(unit.kind),
                    samples: self.pause_samples,
                });
                Ok(Step::Aired(self.air(segment, id, name, Some(unit.kind), false)))
            }
            Err(error) if error.is_skippable() => {
                self.failures_in_a_row += 1;
                // A whole cycle of bad files: air a music-only pause before
                // trying again rather than spinning.
                if self.failures_in_a_row >= self.cycle_len() {
                    self.failures_in_a_row = 0;
                    let id = self.next_unit_id();
                    self.pause_due = Some(PauseDue {
                        unit: id,
                        track: self.bed_name(),
                        kind: None,
                        samples: self.filler_samples,
                    });
                }
                Ok(Step::Skipped {
                    path: unit.path,
                    error,
                })
            }
            Err(error) => Err(error),
        }
    }

    /// Music only, while there is nothing to play. Consecutive idle
    /// segments count as one unit.
    fn render_idle(&mut self) -> Rendered {
        let id = match self.idle_unit {
            Some(id) => id,
            None => {
                let id = self.next_unit_id();
                self.idle_unit = Some(id);
                id
            }
        };
        let segment = self.mixer.pause(self.filler_samples, self.cursor);
        self.air(segment, id, self.bed_name(), None, true)
    }

    fn air(
        &mut self,
        segment: MixedSegment,
        unit: u64,
        track: Arc<str>,
        kind: Option<UnitKind>,
        paused: bool,
    ) -> Rendered {
        self.cursor = segment.cursor;
        Rendered {
            unit,
            track,
            kind,
            paused,
            pcm: Bytes::from(segment.to_pcm16()),
        }
    }

    fn next_unit_id(&mut self) -> u64 {
        self.units += 1;
        self.units
    }

    fn bed_name(&self) -> Arc<str> {
        Arc::from(self.mixer.music().name.as_str())
    }
}
