//! Station configuration.
//!
//! One explicit structure describes the whole broadcast: the music bed, the
//! recurring track list, mix levels, pause length and the chunk/buffer
//! geometry of the shared stream. Defaults: music at 15%, 10 s pauses,
//! 8192-sample chunks, a 100-chunk buffer, 24 kHz.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Configuration for one broadcast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationConfig {
    /// Background music, looped under everything.
    pub music_file: PathBuf,

    /// Voice tracks replayed forever in this order.
    #[serde(default)]
    pub recurring_tracks: Vec<PathBuf>,

    /// Music gain (default: 0.15).
    #[serde(default = "default_music_volume")]
    pub music_volume: f32,

    /// Voice gain (default: 1.0).
    #[serde(default = "default_voice_volume")]
    pub voice_volume: f32,

    /// Music-only pause after every voice unit, in seconds (default: 10).
    #[serde(default = "default_pause_duration_s")]
    pub pause_duration_s: f64,

    /// Samples per broadcast chunk (default: 8192).
    #[serde(default = "default_chunk_samples")]
    pub chunk_samples: usize,

    /// Number of recent chunks retained for subscribers (default: 100).
    #[serde(default = "default_buffer_chunks")]
    pub buffer_chunks: usize,

    /// Stream sample rate in Hz (default: 24000).
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
}

impl StationConfig {
    /// Build a config with default levels and geometry.
    pub fn new(music_file: impl Into<PathBuf>, recurring_tracks: Vec<PathBuf>) -> Self {
        Self {
            music_file: music_file.into(),
            recurring_tracks,
            music_volume: default_music_volume(),
            voice_volume: default_voice_volume(),
            pause_duration_s: default_pause_duration_s(),
            chunk_samples: default_chunk_samples(),
            buffer_chunks: default_buffer_chunks(),
            sample_rate: default_sample_rate(),
        }
    }

    /// Load a config from a JSON file. The result is validated.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the numbers describe a playable station.
    pub fn validate(&self) -> Result<()> {
        for (name, volume) in [
            ("music_volume", self.music_volume),
            ("voice_volume", self.voice_volume),
        ] {
            if !volume.is_finite() || volume < 0.0 {
                return Err(Error::Config(format!(
                    "{name} must be a finite, non-negative gain, got {volume}"
                )));
            }
        }
        if !self.pause_duration_s.is_finite() || self.pause_duration_s < 0.0 {
            return Err(Error::Config(format!(
                "pause_duration_s must be >= 0, got {}",
                self.pause_duration_s
            )));
        }
        if self.chunk_samples == 0 {
            return Err(Error::Config("chunk_samples must be > 0".into()));
        }
        if self.buffer_chunks == 0 {
            return Err(Error::Config("buffer_chunks must be > 0".into()));
        }
        if self.sample_rate == 0 {
            return Err(Error::Config("sample_rate must be > 0".into()));
        }
        Ok(())
    }

    /// Length of one pause in samples: `pause_duration_s * sample_rate`.
    pub fn pause_samples(&self) -> usize {
        (self.pause_duration_s * self.sample_rate as f64) as usize
    }

    /// Real-time duration of one full chunk.
    pub fn seconds_per_chunk(&self) -> f64 {
        self.chunk_samples as f64 / self.sample_rate as f64
    }
}

fn default_music_volume() -> f32 {
    0.15
}

fn default_voice_volume() -> f32 {
    1.0
}

fn default_pause_duration_s() -> f64 {
    10.0
}

fn default_chunk_samples() -> usize {
    8192
}

fn default_buffer_chunks() -> usize {
    100
}

fn default_sample_rate() -> u32 {
    24_000
}
