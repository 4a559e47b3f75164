//! Playlist / priority scheduler.
//!
//! Picks the next voice unit. A queued sponsored message always wins; when the
//! queue is empty the recurring tracks play in fixed cyclic order. The queue is
//! consulted before *every* unit, so a sponsored message waits at most for the
//! remainder of the unit currently on air (plus its pause).
//!
//! The recurring position is a persistent cursor: a sponsored interruption does
//! not restart the cycle, the next recurring pick is the track after the last
//! one played. The schedule never ends.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use crate::sponsored::SponsoredQueue;

/// Where a unit came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    Recurring,
    Sponsored,
}

/// One voice file chosen for playback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unit {
    pub path: PathBuf,
    pub kind: UnitKind,
}

/// Decides what plays next.
#[derive(Debug)]
pub struct Scheduler {
    recurring: Vec<PathBuf>,
    next_recurring: usize,
    sponsored: Arc<SponsoredQueue>,
}

impl Scheduler {
    pub fn new(recurring: Vec<PathBuf>, sponsored: Arc<SponsoredQueue>) -> Self {
        Self {
            recurring,
            next_recurring: 0,
            sponsored,
        }
    }

    /// Next unit to air, or `None` when there is nothing to play at all
    /// (no recurring tracks and an empty sponsored queue).
    pub fn next_unit(&mut self) -> Option<Unit> {
        if let Some(path) = self.sponsored.dequeue_if_any() {
            return Some(Unit {
                path,
                kind: UnitKind::Sponsored,
            });
        }
        if self.recurring.is_empty() {
            return None;
        }
        let path = self.recurring[self.next_recurring].clone();
        self.next_recurring = (self.next_recurring + 1) % self.recurring.len();
        Some(Unit {
            path,
            kind: UnitKind::Recurring,
        })
    }

    pub fn recurring_len(&self) -> usize {
        self.recurring.len()
    }

    pub fn sponsored(&self) -> &Arc<SponsoredQueue> {
        &self.sponsored
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheduler(tracks: &[&str]) -> Scheduler {
        Scheduler::new(
            tracks.iter().map(PathBuf::from).collect(),
            Arc::new(SponsoredQueue::new()),
        )
    }

    fn paths(s: &mut Scheduler, n: usize) -> Vec<String> {
        (0..n)
            .map(|_| s.next_unit().unwrap().path.display().to_string())
            .collect()
    }

    #[test]
    fn recurring_tracks_cycle_in_order() {
        let mut s = scheduler(&["a.wav", "b.wav", "c.wav"]);
        assert_eq!(
            paths(&mut s, 7),
            vec!["a.wav", "b.wav", "c.wav", "a.wav", "b.wav", "c.wav", "a.wav"]
        );
    }

    #[test]
    fn sponsored_preempts_and_is_consumed_once() {
        let mut s = scheduler(&["a.wav", "b.wav"]);
        assert_eq!(s.next_unit().unwrap().path, PathBuf::from("a.wav"));

        s.sponsored().enqueue("ad1.wav");
        s.sponsored().enqueue("ad2.wav");

        let unit = s.next_unit().unwrap();
        assert_eq!(unit.kind, UnitKind::Sponsored);
        assert_eq!(unit.path, PathBuf::from("ad1.wav"));
        let unit = s.next_unit().unwrap();
        assert_eq!(unit.path, PathBuf::from("ad2.wav"));
        assert!(s.sponsored().is_empty());

        // The cycle resumes where it left off.
        let unit = s.next_unit().unwrap();
        assert_eq!(unit.kind, UnitKind::Recurring);
        assert_eq!(unit.path, PathBuf::from("b.wav"));
    }

    #[test]
    fn nothing_to_play_without_tracks() {
        let mut s = scheduler(&[]);
        assert!(s.next_unit().is_none());
        s.sponsored().enqueue("ad.wav");
        assert_eq!(s.next_unit().unwrap().kind, UnitKind::Sponsored);
        assert!(s.next_unit().is_none());
    }
}
