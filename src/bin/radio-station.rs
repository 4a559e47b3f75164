//! Shared radio station: one broadcast, many listeners, over HTTP.
//!
//! Loads the music bed and the recurring voice tracks, starts the paced
//! producer and serves the stream until Ctrl-C.
//!
//! # Example
//!
//! ```sh
//! radio-station --music music/bed.wav \
//!     --track voices/intro.wav --track voices/station_id.wav \
//!     --bind 0.0.0.0:5002
//!
//! # listen
//! ffplay http://localhost:5002/radio/stream
//!
//! # queue a sponsored message
//! curl 'http://localhost:5002/radio/add_sponsored?audio_file=voices/sponsored/ad.wav'
//! ```
//!
//! A JSON config (`--config station.json`) may replace the flags; explicit
//! flags override its values.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use shared_radio::{Broadcast, BroadcastEvent, StationConfig, server};
use tokio::{net::TcpListener, sync::broadcast::error::RecvError};

// ── CLI ──────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "radio-station",
    about = "Always-on shared radio broadcast over HTTP"
)]
struct Args {
    /// JSON station config. Flags below override its fields.
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Music bed (WAV), looped under everything.
    #[arg(long, short = 'm')]
    music: Option<PathBuf>,

    /// Recurring voice track (WAV). Repeat for several; played in order.
    #[arg(long = "track", short = 't')]
    tracks: Vec<PathBuf>,

    /// Music gain.
    #[arg(long)]
    music_volume: Option<f32>,

    /// Voice gain.
    #[arg(long)]
    voice_volume: Option<f32>,

    /// Music-only pause after each voice unit, in seconds.
    #[arg(long)]
    pause: Option<f64>,

    /// Address to serve on.
    #[arg(long, default_value = "0.0.0.0:5002")]
    bind: SocketAddr,
}

impl Args {
    fn into_config(self) -> anyhow::Result<(StationConfig, SocketAddr)> {
        let mut config = match (&self.config, &self.music) {
            (Some(path), _) => StationConfig::from_json_file(path)
                .with_context(|| format!("reading config {}", path.display()))?,
            (None, Some(music)) => StationConfig::new(music, Vec::new()),
            (None, None) => anyhow::bail!("either --config or --music is required"),
        };
        if let Some(music) = self.music {
            config.music_file = music;
        }
        if !self.tracks.is_empty() {
            config.recurring_tracks = self.tracks;
        }
        if let Some(v) = self.music_volume {
            config.music_volume = v;
        }
        if let Some(v) = self.voice_volume {
            config.voice_volume = v;
        }
        if let Some(p) = self.pause {
            config.pause_duration_s = p;
        }
        Ok((config, self.bind))
    }
}

// ── Main ─────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let (config, bind) = Args::parse().into_config()?;
    tracing::info!(
        music = %config.music_file.display(),
        tracks = config.recurring_tracks.len(),
        "loading station"
    );

    // Bed decoding can take a moment for long files.
    let broadcast = tokio::task::spawn_blocking(move || Broadcast::new(config)).await??;
    tokio::spawn(log_events(broadcast.clone()));

    let producer = broadcast.start()?;
    let listener = TcpListener::bind(bind)
        .await
        .with_context(|| format!("binding {bind}"))?;

    let on_air = broadcast.clone();
    let mut state = broadcast.state();
    let shutdown = async move {
        let producer_gone = async {
            let _ = state.wait_for(|_| !on_air.is_live()).await;
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => tracing::info!("ctrl-c, shutting down"),
            _ = producer_gone => {}
        }
        // Open streams end once the broadcast is stopped, letting the server drain.
        on_air.stop();
    };
    server::serve(listener, broadcast.clone(), shutdown).await?;

    producer.join().await?;
    tracing::info!("broadcast stopped");
    Ok(())
}

// ── Event log ────────────────────────────────────────────────────────────────

async fn log_events(broadcast: Broadcast) {
    let mut events = broadcast.events();
    loop {
        match events.recv().await {
            Ok(BroadcastEvent::TrackChanged { track, kind }) => {
                tracing::info!(?kind, "now playing: {track}");
            }
            Ok(BroadcastEvent::PauseChanged { track, paused: true }) => {
                tracing::info!("pause after {track}");
            }
            Ok(BroadcastEvent::PauseChanged { paused: false, .. }) => {}
            Ok(BroadcastEvent::SponsoredQueued { path, queued }) => {
                tracing::info!(queued, "sponsored queued: {}", path.display());
            }
            Ok(BroadcastEvent::TrackSkipped { path, reason }) => {
                tracing::warn!("skipped {}: {reason}", path.display());
            }
            Ok(BroadcastEvent::Stopped { error: Some(e) }) => {
                tracing::error!("broadcast died: {e}");
                break;
            }
            Ok(BroadcastEvent::Stopped { error: None }) => break,
            Err(RecvError::Lagged(n)) => tracing::debug!("event log lagged by {n}"),
            Err(RecvError::Closed) => break,
        }
    }
}
