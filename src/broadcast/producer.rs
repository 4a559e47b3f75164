//! The single producer loop.
//!
//! ```text
//! header ─▶ ring[0]
//! loop {
//!     programme.render_next()      (blocking pool)
//!     for each chunk_samples slice:
//!         stop flag? ─▶ return
//!         ring.push ─▶ state.send (wakes subscribers)
//!         edge-triggered events
//!         pace
//! }
//! ```
//!
//! Pacing: while the ring is under half full the loop only yields, to refill
//! quickly; otherwise it sleeps whatever is left of one chunk's playback time
//! so production tracks what listeners hear. A full cycle of steps that air
//! nothing (skipped or empty units) costs one chunk period of sleep.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use super::events::{BroadcastEvent, OnAirTracker};
use super::programme::{Programme, Step};
use super::Shared;
use crate::{Error, Result};

/// Yield used while the ring is refilling.
const REFILL_YIELD: Duration = Duration::from_millis(1);

pub(crate) async fn run(shared: Arc<Shared>, mut programme: Programme) -> Result<()> {
    shared.publish_header();
    tokio::time::sleep(REFILL_YIELD).await;

    let per_chunk = Duration::from_secs_f64(shared.config.seconds_per_chunk());
    let chunk_bytes = shared.config.chunk_samples * 2;
    let refill_below = shared.config.buffer_chunks / 2;
    let mut on_air = OnAirTracker::default();
    let mut last_chunk = Instant::now();
    let mut silent_steps = 0;

    tracing::info!(
        chunk_samples = shared.config.chunk_samples,
        buffer_chunks = shared.config.buffer_chunks,
        "starting continuous audio generation"
    );

    while !shared.is_stopped() {
        let (returned, step) = tokio::task::spawn_blocking(move || {
            let step = programme.render_next();
            (programme, step)
        })
        .await
        .map_err(|e| Error::ProducerFatal(format!("render task failed: {e}")))?;
        programme = returned;

        let rendered = match step? {
            Step::Aired(rendered) if !rendered.pcm.is_empty() => Some(rendered),
            // Zero-length pause between units.
            Step::Aired(rendered) if rendered.paused => continue,
            Step::Aired(_) => None,
            Step::Skipped { path, error } => {
                tracing::warn!(path = %path.display(), %error, "skipping unplayable track");
                shared.emit(BroadcastEvent::TrackSkipped {
                    path,
                    reason: error.to_string(),
                });
                None
            }
        };
        let Some(rendered) = rendered else {
            silent_steps += 1;
            if silent_steps >= programme.cycle_len() {
                silent_steps = 0;
                tokio::time::sleep(per_chunk).await;
            }
            continue;
        };
        silent_steps = 0;

        let mut offset = 0;
        while offset < rendered.pcm.len() {
            if shared.is_stopped() {
                break;
            }
            let end = (offset + chunk_bytes).min(rendered.pcm.len());
            let payload = rendered.pcm.slice(offset..end);
            offset = end;

            let seq = shared.publish(payload, &rendered);
            let events = on_air.observe(
                rendered.unit,
                &rendered.track,
                rendered.kind,
                rendered.paused,
            );
            for event in events {
                shared.emit(event);
            }
            tracing::trace!(seq, track = %rendered.track, paused = rendered.paused, "chunk");

            if shared.buffered() < refill_below {
                tokio::time::sleep(REFILL_YIELD).await;
            } else {
                let remaining = per_chunk.saturating_sub(last_chunk.elapsed());
                tokio::time::sleep(remaining).await;
            }
            last_chunk = Instant::now();
        }
    }

    tracing::info!("audio generation stopped");
    Ok(())
}
