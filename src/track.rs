//! Track store: read-only access to the music bed and voice files.
//!
//! Every track is decoded to mono `f32`. Files at a different sample rate
//! than the stream are played as-is (no resampling), with a warning.

use std::path::{Path, PathBuf};

use crate::audio::read_wav_mono;
use crate::{Error, Result};

/// A decoded, immutable mono track.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioTrack {
    /// Display name (file name).
    pub name: String,
    /// Where the track was loaded from.
    pub path: PathBuf,
    /// Mono samples in [-1, 1].
    pub samples: Vec<f32>,
    /// Sample rate declared by the file.
    pub sample_rate: u32,
}

impl AudioTrack {
    /// Build a track from samples already in memory.
    pub fn from_samples(name: impl Into<String>, samples: Vec<f32>, sample_rate: u32) -> Self {
        let name = name.into();
        Self {
            path: PathBuf::from(&name),
            name,
            samples,
            sample_rate,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Playback length in seconds at the track's own rate.
    pub fn duration_s(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate.max(1) as f64
    }
}

/// Loads tracks from disk for a stream running at `sample_rate`.
#[derive(Debug, Clone, Copy)]
pub struct TrackStore {
    sample_rate: u32,
}

impl TrackStore {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate }
    }

    /// Load the music bed. An empty bed cannot be looped and is a format error.
    pub fn load_music(&self, path: impl AsRef<Path>) -> Result<AudioTrack> {
        let track = self.load(path.as_ref())?;
        if track.is_empty() {
            return Err(Error::Format(format!(
                "music bed {} has no samples",
                track.path.display()
            )));
        }
        tracing::info!(
            track = %track.name,
            samples = track.len(),
            duration_s = track.duration_s(),
            "music bed loaded"
        );
        Ok(track)
    }

    /// Load a voice track (recurring or sponsored).
    pub fn load_voice(&self, path: impl AsRef<Path>) -> Result<AudioTrack> {
        let track = self.load(path.as_ref())?;
        tracing::debug!(track = %track.name, samples = track.len(), "voice track loaded");
        Ok(track)
    }

    fn load(&self, path: &Path) -> Result<AudioTrack> {
        let (samples, sample_rate) = read_wav_mono(path)?;
        if sample_rate != self.sample_rate {
            tracing::warn!(
                path = %path.display(),
                file_rate = sample_rate,
                stream_rate = self.sample_rate,
                "sample rate mismatch, playing without resampling"
            );
        }
        Ok(AudioTrack {
            name: track_name(path),
            path: path.to_path_buf(),
            samples,
            sample_rate,
        })
    }
}

/// File name of `path`, or the whole path when it has none.
pub fn track_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::write_wav;

    #[test]
    fn loads_voice_as_mono_with_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("intro.wav");
        write_wav(&path, &[0.2, 0.4, -0.2, -0.4], 24000, 2).unwrap();

        let track = TrackStore::new(24000).load_voice(&path).unwrap();
        assert_eq!(track.name, "intro.wav");
        assert_eq!(track.len(), 2);
        assert!((track.samples[0] - 0.3).abs() < 1e-6);
        assert!((track.samples[1] + 0.3).abs() < 1e-6);
    }

    #[test]
    fn empty_music_bed_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bed.wav");
        write_wav(&path, &[], 24000, 1).unwrap();

        let store = TrackStore::new(24000);
        assert!(matches!(store.load_music(&path), Err(Error::Format(_))));
        // An empty voice track is fine: it just contributes no samples.
        assert!(store.load_voice(&path).unwrap().is_empty());
    }

    #[test]
    fn missing_voice_is_io_error() {
        let store = TrackStore::new(24000);
        let err = store.load_voice("/nonexistent/sponsored_1.wav").unwrap_err();
        assert!(matches!(err, Error::Io(_)), "got {err}");
    }

    #[test]
    fn duration_uses_own_rate() {
        let track = AudioTrack::from_samples("a", vec![0.0; 48000], 24000);
        assert!((track.duration_s() - 2.0).abs() < 1e-12);
    }
}
