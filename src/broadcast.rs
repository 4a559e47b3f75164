//! Shared broadcast engine.
//!
//! One producer task mixes the programme into a bounded ring of sequence-numbered
//! chunks; any number of [`Subscription`]s tap the same ring from the live edge.
//! The producer never waits on a listener and listeners never block the
//! producer: the ring is behind a short-held `RwLock` and the "new data" signal
//! is a `watch` channel carrying the latest [`BroadcastState`].
//!
//! ## Lifecycle
//!
//! ```no_run
//! use shared_radio::{Broadcast, StationConfig};
//!
//! #[tokio::main]
//! async fn main() -> shared_radio::Result<()> {
//!     let config = StationConfig::new("music/bed.wav", vec!["voices/intro.wav".into()]);
//!     let broadcast = Broadcast::new(config)?;
//!     let task = broadcast.start()?;
//!
//!     let mut listener = broadcast.subscribe();
//!     let header = listener.next().await;
//!
//!     broadcast.stop();
//!     task.join().await
//! }
//! ```

mod events;
mod producer;
mod programme;
mod ring;
mod subscriber;

pub use events::BroadcastEvent;
pub use ring::{Chunk, ChunkRing};
pub use subscriber::Subscription;

use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use futures::FutureExt;
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::audio::stream_header;
use crate::config::StationConfig;
use crate::mixer::Mixer;
use crate::scheduler::UnitKind;
use crate::sponsored::SponsoredQueue;
use crate::track::{AudioTrack, TrackStore};
use crate::{Error, Result};

use programme::{Programme, Rendered};

/// Shown by [`Broadcast::current_track`] before the first audio chunk.
pub const WAITING_TRACK: &str = "Waiting for broadcast...";

/// Event channel depth; slower observers lag.
const EVENT_CAPACITY: usize = 64;

/// Latest producer-side snapshot, replaced on every chunk.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BroadcastState {
    /// Track of the newest audio chunk. Runs slightly ahead of what a
    /// real-time listener hears.
    pub track: Option<Arc<str>>,
    pub kind: Option<UnitKind>,
    pub paused: bool,
    /// Sequence number of the newest chunk (header included).
    pub last_seq: Option<u64>,
}

/// Status summary for "now playing" style queries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BroadcastInfo {
    /// `"live"` while the producer runs, `"stopped"` after.
    pub status: &'static str,
    pub current_track: String,
    pub is_paused: bool,
    pub music_volume: f32,
    pub voice_volume: f32,
    pub pause_duration_seconds: f64,
    pub sample_rate: u32,
    pub sponsored_queued: usize,
}

/// State shared by the handle, the producer and every subscription.
pub(crate) struct Shared {
    pub(crate) config: StationConfig,
    mixer: Arc<Mixer>,
    sponsored: Arc<SponsoredQueue>,
    pub(crate) ring: RwLock<ChunkRing>,
    pub(crate) state: watch::Sender<BroadcastState>,
    events: broadcast::Sender<BroadcastEvent>,
    pub(crate) header: Bytes,
    started: AtomicBool,
    stopped: AtomicBool,
}

impl Shared {
    pub(crate) fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub(crate) fn buffered(&self) -> usize {
        self.ring.read().len()
    }

    pub(crate) fn emit(&self, event: BroadcastEvent) {
        // No observers is fine.
        let _ = self.events.send(event);
    }

    /// Header chunk: sequence 0, no track, not paced.
    fn publish_header(&self) {
        let seq = self.ring.write().push(self.header.clone(), None, false);
        self.state.send_modify(|state| state.last_seq = Some(seq));
    }

    /// Append one audio chunk and wake subscribers.
    fn publish(&self, payload: Bytes, rendered: &Rendered) -> u64 {
        let seq = self
            .ring
            .write()
            .push(payload, Some(rendered.track.clone()), rendered.paused);
        self.state.send_modify(|state| {
            state.last_seq = Some(seq);
            state.track = Some(rendered.track.clone());
            state.kind = rendered.kind;
            state.paused = rendered.paused;
        });
        seq
    }

    /// Mark the broadcast stopped and wake everyone waiting on it.
    fn halt(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.state.send_modify(|_| {});
    }
}

/// Handle to one broadcast. Cheap to clone; every connection handler gets one.
#[derive(Clone)]
pub struct Broadcast {
    shared: Arc<Shared>,
}

impl Broadcast {
    /// Validate `config` and load the music bed.
    pub fn new(config: StationConfig) -> Result<Self> {
        config.validate()?;
        let music = TrackStore::new(config.sample_rate).load_music(&config.music_file)?;
        Self::with_music(config, music)
    }

    /// Build from a music bed already in memory.
    pub fn with_music(config: StationConfig, music: AudioTrack) -> Result<Self> {
        config.validate()?;
        let mixer = Mixer::new(music, config.music_volume, config.voice_volume)?;
        let (state, _) = watch::channel(BroadcastState::default());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let shared = Shared {
            ring: RwLock::new(ChunkRing::new(config.buffer_chunks)),
            header: Bytes::copy_from_slice(&stream_header(config.sample_rate)),
            mixer: Arc::new(mixer),
            sponsored: Arc::new(SponsoredQueue::new()),
            state,
            events,
            started: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            config,
        };
        Ok(Self {
            shared: Arc::new(shared),
        })
    }

    /// Spawn the producer on the current tokio runtime.
    ///
    /// A broadcast runs once; starting it again is an error.
    pub fn start(&self) -> Result<BroadcastTask> {
        let programme = Programme::new(
            &self.shared.config,
            Arc::clone(&self.shared.mixer),
            Arc::clone(&self.shared.sponsored),
        );
        self.launch(programme)
    }

    fn launch(&self, programme: Programme) -> Result<BroadcastTask> {
        if self.shared.started.swap(true, Ordering::SeqCst) {
            return Err(Error::Config("broadcast already started".into()));
        }
        let shared = Arc::clone(&self.shared);
        let handle = tokio::spawn(async move {
            let outcome = AssertUnwindSafe(producer::run(Arc::clone(&shared), programme))
                .catch_unwind()
                .await;
            let result = outcome
                .unwrap_or_else(|_| Err(Error::ProducerFatal("producer panicked".into())));
            if let Err(error) = &result {
                tracing::error!(%error, "broadcast producer died");
            }
            shared.halt();
            shared.emit(BroadcastEvent::Stopped {
                error: result.as_ref().err().map(|e| e.to_string()),
            });
            result
        });
        tracing::info!("shared broadcast started");
        Ok(BroadcastTask { handle })
    }

    /// Ask the producer to stop at the next chunk boundary and release every
    /// subscriber.
    pub fn stop(&self) {
        if !self.shared.is_stopped() {
            tracing::info!("shared broadcast stopping");
        }
        self.shared.halt();
    }

    /// `true` between [`start`](Self::start) and the producer exiting.
    pub fn is_live(&self) -> bool {
        self.shared.started.load(Ordering::SeqCst) && !self.shared.is_stopped()
    }

    /// Open a new listening session at the live edge.
    pub fn subscribe(&self) -> Subscription {
        Subscription::new(Arc::clone(&self.shared))
    }

    /// Status events (track/pause changes, skips, queue activity).
    pub fn events(&self) -> broadcast::Receiver<BroadcastEvent> {
        self.shared.events.subscribe()
    }

    /// Watch the producer-side state.
    pub fn state(&self) -> watch::Receiver<BroadcastState> {
        self.shared.state.subscribe()
    }

    /// Queue a one-shot message ahead of the recurring loop. Always succeeds;
    /// the path is not checked here. Returns the queue length.
    pub fn add_sponsored_message(&self, path: impl Into<PathBuf>) -> usize {
        let path = path.into();
        let queued = self.shared.sponsored.enqueue(path.clone());
        self.shared.emit(BroadcastEvent::SponsoredQueued { path, queued });
        queued
    }

    /// Name of the track on air and whether it is in its pause.
    pub fn current_track(&self) -> (String, bool) {
        let state = self.shared.state.borrow();
        match &state.track {
            Some(track) => (track.to_string(), state.paused),
            None => (WAITING_TRACK.to_string(), false),
        }
    }

    pub fn broadcast_info(&self) -> BroadcastInfo {
        let (current_track, is_paused) = self.current_track();
        let config = &self.shared.config;
        BroadcastInfo {
            status: if self.is_live() { "live" } else { "stopped" },
            current_track,
            is_paused,
            music_volume: config.music_volume,
            voice_volume: config.voice_volume,
            pause_duration_seconds: config.pause_duration_s,
            sample_rate: config.sample_rate,
            sponsored_queued: self.shared.sponsored.len(),
        }
    }

    /// The stream header every subscriber receives first.
    pub fn header(&self) -> Bytes {
        self.shared.header.clone()
    }

    /// Sequence numbers currently held in the ring.
    pub fn buffered_sequences(&self) -> Vec<u64> {
        self.shared.ring.read().sequences()
    }
}

/// The running producer.
pub struct BroadcastTask {
    handle: JoinHandle<Result<()>>,
}

impl BroadcastTask {
    /// Wait for the producer to exit. A fatal producer error comes back here.
    pub async fn join(self) -> Result<()> {
        self.handle
            .await
            .map_err(|e| Error::ProducerFatal(format!("producer task failed: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::write_wav;
    use programme::Fault;
    use std::time::Duration;

    const RATE: u32 = 24_000;

    struct Station {
        _dir: tempfile::TempDir,
        dir: PathBuf,
        broadcast: Broadcast,
    }

    /// Small geometry so tests cover many chunks quickly:
    /// 1000-sample chunks, 16-chunk ring, 0.5 s pauses.
    fn station(voices: &[(&str, usize)]) -> Station {
        station_with_pause(voices, 0.5)
    }

    fn station_with_pause(voices: &[(&str, usize)], pause_duration_s: f64) -> Station {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().to_path_buf();
        let mut tracks = Vec::new();
        for (name, len) in voices {
            let path = dir.join(name);
            write_wav(&path, &vec![0.25; *len], RATE, 1).unwrap();
            tracks.push(path);
        }
        let bed = dir.join("bed.wav");
        let music: Vec<f32> = (0..RATE as usize).map(|i| (i as f32 * 0.01).sin()).collect();
        write_wav(&bed, &music, RATE, 1).unwrap();

        let config = StationConfig {
            chunk_samples: 1000,
            buffer_chunks: 16,
            pause_duration_s,
            ..StationConfig::new(&bed, tracks)
        };
        Station {
            _dir: tmp,
            dir,
            broadcast: Broadcast::new(config).unwrap(),
        }
    }

    async fn wait_for_seq(broadcast: &Broadcast, seq: u64) {
        let mut state = broadcast.state();
        state
            .wait_for(|s| s.last_seq.is_some_and(|last| last >= seq))
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn subscriber_sees_contiguous_sequence() {
        let st = station(&[("a.wav", 2500), ("b.wav", 1200)]);
        let mut sub = st.broadcast.subscribe();
        let task = st.broadcast.start().unwrap();

        assert_eq!(sub.next().await.unwrap(), st.broadcast.header());
        let mut seqs = Vec::new();
        for _ in 0..60 {
            let chunk = sub.next_chunk().await.unwrap();
            assert!(chunk.payload.len() <= 2000);
            assert!(chunk.track.is_some());
            seqs.push(chunk.seq);
        }
        // Sequence 0 is the header chunk; audio starts at 1 with no gaps.
        let expected: Vec<u64> = (1..=60).collect();
        assert_eq!(seqs, expected);
        assert_eq!(sub.last_seen(), Some(60));
        assert_eq!(sub.missed(), 0);

        st.broadcast.stop();
        task.join().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn late_joiner_starts_at_live_edge() {
        let st = st_with_one_track();
        let task = st.broadcast.start().unwrap();
        wait_for_seq(&st.broadcast, 40).await;

        let newest_at_join = st.broadcast.state().borrow().last_seq.unwrap();
        let oldest_at_join = st.broadcast.buffered_sequences()[0];
        let mut sub = st.broadcast.subscribe();

        let header = sub.next().await.unwrap();
        assert_eq!(&header[0..4], b"RIFF");
        let first = sub.next_chunk().await.unwrap();
        assert!(first.seq <= newest_at_join, "{} > {newest_at_join}", first.seq);
        assert!(first.seq >= oldest_at_join);

        let second = sub.next_chunk().await.unwrap();
        assert_eq!(second.seq, first.seq + 1);

        st.broadcast.stop();
        task.join().await.unwrap();
    }

    fn st_with_one_track() -> Station {
        station(&[("a.wav", 3000)])
    }

    #[tokio::test(start_paused = true)]
    async fn ring_stays_bounded_and_contiguous() {
        let st = st_with_one_track();
        let task = st.broadcast.start().unwrap();
        wait_for_seq(&st.broadcast, 100).await;

        let seqs = st.broadcast.buffered_sequences();
        assert_eq!(seqs.len(), 16);
        assert!(seqs.windows(2).all(|w| w[1] == w[0] + 1));

        st.broadcast.stop();
        task.join().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn every_subscriber_hears_the_same_bytes() {
        let st = station(&[("a.wav", 1500), ("b.wav", 2500)]);
        let mut first = st.broadcast.subscribe();
        let mut second = st.broadcast.subscribe();
        let task = st.broadcast.start().unwrap();

        assert_eq!(first.next().await, second.next().await);
        for _ in 0..20 {
            let a = first.next_chunk().await.unwrap();
            let b = second.next_chunk().await.unwrap();
            assert_eq!(a.seq, b.seq);
            assert_eq!(a.payload, b.payload);
        }

        st.broadcast.stop();
        task.join().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn stop_releases_waiting_subscribers() {
        let st = st_with_one_track();
        let task = st.broadcast.start().unwrap();
        let mut sub = st.broadcast.subscribe();
        sub.next().await.unwrap();

        st.broadcast.stop();
        task.join().await.unwrap();

        let drained = tokio::time::timeout(Duration::from_secs(5), async {
            while sub.next().await.is_some() {}
        })
        .await;
        assert!(drained.is_ok(), "subscriber kept waiting after stop");
        assert!(!st.broadcast.is_live());
        assert_eq!(st.broadcast.broadcast_info().status, "stopped");
    }

    #[tokio::test(start_paused = true)]
    async fn status_tracks_producer_side() {
        let st = station(&[("a.wav", 5000)]);
        assert_eq!(st.broadcast.current_track(), (WAITING_TRACK.to_string(), false));

        let task = st.broadcast.start().unwrap();
        wait_for_seq(&st.broadcast, 1).await;
        let (track, paused) = st.broadcast.current_track();
        assert_eq!(track, "a.wav");
        assert!(!paused);

        let info = st.broadcast.broadcast_info();
        assert_eq!(info.status, "live");
        assert_eq!(info.music_volume, 0.15);
        assert_eq!(info.pause_duration_seconds, 0.5);

        st.broadcast.stop();
        task.join().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn sponsored_message_goes_out_next_and_bad_files_are_skipped() {
        let st = station(&[("a.wav", 2000), ("b.wav", 2000)]);
        let ad = st.dir.join("sponsored_1.wav");
        write_wav(&ad, &vec![0.5; 1000], RATE, 1).unwrap();

        let mut events = st.broadcast.events();
        let task = st.broadcast.start().unwrap();

        // Wait until a.wav is on air, then queue a missing file and a real one.
        let mut state = st.broadcast.state();
        state
            .wait_for(|s| s.track.as_deref() == Some("a.wav"))
            .await
            .unwrap();
        st.broadcast.add_sponsored_message(st.dir.join("missing.wav"));
        st.broadcast.add_sponsored_message(&ad);

        let mut changes = Vec::new();
        let mut skipped = Vec::new();
        while changes.len() < 3 {
            match events.recv().await.unwrap() {
                BroadcastEvent::TrackChanged { track, kind } => changes.push((track, kind)),
                BroadcastEvent::TrackSkipped { path, .. } => skipped.push(path),
                _ => {}
            }
        }
        assert_eq!(
            changes,
            vec![
                ("a.wav".to_string(), Some(UnitKind::Recurring)),
                ("sponsored_1.wav".to_string(), Some(UnitKind::Sponsored)),
                ("b.wav".to_string(), Some(UnitKind::Recurring)),
            ]
        );
        assert_eq!(skipped, vec![st.dir.join("missing.wav")]);
        assert_eq!(st.broadcast.broadcast_info().sponsored_queued, 0);

        st.broadcast.stop();
        task.join().await.unwrap();
    }

    #[tokio::test]
    async fn starting_twice_is_rejected() {
        let st = st_with_one_track();
        let task = st.broadcast.start().unwrap();
        assert!(matches!(st.broadcast.start(), Err(Error::Config(_))));
        st.broadcast.stop();
        task.join().await.unwrap();
    }

    /// PCM samples a fresh subscriber receives within `window` of virtual time.
    async fn samples_within(broadcast: &Broadcast, window: Duration) -> usize {
        let mut sub = broadcast.subscribe();
        let mut bytes = 0;
        let _ = tokio::time::timeout(window, async {
            sub.next().await;
            while let Some(chunk) = sub.next_chunk().await {
                bytes += chunk.payload.len();
            }
        })
        .await;
        bytes / 2
    }

    #[tokio::test(start_paused = true)]
    async fn zero_pause_with_no_tracks_keeps_real_time_rate() {
        let st = station_with_pause(&[], 0.0);
        let task = st.broadcast.start().unwrap();

        // Three seconds of air, minus whatever the ring had not yet reached.
        let samples = samples_within(&st.broadcast, Duration::from_secs(3)).await;
        assert!(samples >= 2 * RATE as usize, "only {samples} samples in 3 s");

        st.broadcast.stop();
        task.join().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn zero_pause_with_only_bad_tracks_airs_music_at_a_steady_pace() {
        let st = station_with_pause(&[], 0.0);
        let mut config = st.broadcast.shared.config.clone();
        config.recurring_tracks = vec![st.dir.join("missing.wav")];
        let broadcast = Broadcast::new(config).unwrap();
        let mut events = broadcast.events();
        let skips = tokio::spawn(async move {
            let mut skipped = 0;
            loop {
                match events.recv().await {
                    Ok(BroadcastEvent::TrackSkipped { .. }) => skipped += 1,
                    Ok(BroadcastEvent::Stopped { .. }) => return skipped,
                    Ok(_) => {}
                    Err(e) => panic!("event stream: {e}"),
                }
            }
        });
        let task = broadcast.start().unwrap();

        let samples = samples_within(&broadcast, Duration::from_secs(3)).await;
        assert!(samples >= 2 * RATE as usize, "only {samples} samples in 3 s");

        broadcast.stop();
        task.join().await.unwrap();

        // About one skip per chunk period: 3 s is ~72 chunks, nowhere near a spin.
        let skipped = skips.await.unwrap();
        assert!(skipped > 0);
        assert!(skipped <= 100, "{skipped} skips in 3 s");
    }

    async fn assert_fatal(fault: Fault) {
        let st = st_with_one_track();
        let mut events = st.broadcast.events();
        let mut programme = Programme::new(
            &st.broadcast.shared.config,
            Arc::clone(&st.broadcast.shared.mixer),
            Arc::clone(&st.broadcast.shared.sponsored),
        );
        programme.fault = Some(fault);

        let mut sub = st.broadcast.subscribe();
        let listener = tokio::spawn(async move {
            sub.next().await.unwrap();
            sub.next_chunk().await
        });
        let task = st.broadcast.launch(programme).unwrap();

        assert!(matches!(task.join().await, Err(Error::ProducerFatal(_))));
        let released = tokio::time::timeout(Duration::from_secs(5), listener)
            .await
            .expect("subscriber kept waiting after a fatal error")
            .unwrap();
        assert!(released.is_none());
        assert_eq!(st.broadcast.broadcast_info().status, "stopped");
        assert!(!st.broadcast.is_live());

        let mut stopped = None;
        while let Ok(event) = events.try_recv() {
            if let BroadcastEvent::Stopped { error } = event {
                stopped = Some(error);
            }
        }
        assert!(matches!(stopped, Some(Some(_))), "{stopped:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn render_error_ends_the_broadcast() {
        assert_fatal(Fault::Fail(Error::ProducerFatal("disk gone".into()))).await;
    }

    #[tokio::test(start_paused = true)]
    async fn render_panic_ends_the_broadcast() {
        assert_fatal(Fault::Panic).await;
    }
}
