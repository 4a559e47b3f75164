//! Always-on shared radio broadcast.
//!
//! One producer renders a continuous programme (voice tracks mixed over a
//! looping music bed, each followed by a music-only pause) and paces it into a
//! bounded ring of PCM chunks. Any number of listeners read the same ring, so
//! everyone hears the same audio at the same moment; a listener that connects
//! late joins at the live edge.
//!
//! ## Architecture
//!
//! ```text
//! sponsored queue ──┐
//!                   ├→ scheduler → track store → mixer (+ music bed cursor)
//! recurring tracks ─┘                               ↓
//!                                         producer (paced, one task)
//!                                                   ↓
//!                                         chunk ring (seq, track, paused)
//!                                       ↙           ↓           ↘
//!                             subscription   subscription   subscription
//!                                   ↓               ↓               ↓
//!                             HTTP /radio/stream (WAV header + PCM)
//! ```
//!
//! ## Modules
//!
//! - [`audio`]: WAV I/O, streaming header, PCM conversion, peak limiting
//! - [`track`]: voice/music loading
//! - [`mixer`]: voice over a looping bed
//! - [`sponsored`]: one-shot message queue
//! - [`scheduler`]: sponsored-first, then recurring round robin
//! - [`broadcast`]: the producer, ring buffer and subscriptions
//! - [`server`]: axum routes for streaming and status

pub mod audio;
pub mod broadcast;
pub mod config;
pub mod mixer;
pub mod scheduler;
pub mod server;
pub mod sponsored;
pub mod track;

mod error;

pub use broadcast::{
    Broadcast, BroadcastEvent, BroadcastInfo, BroadcastState, BroadcastTask, Subscription,
};
pub use config::StationConfig;
pub use error::{Error, Result};
