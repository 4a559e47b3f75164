//! Mixer: voice over a looping music bed.
//!
//! Pure functions of (voice samples, music cursor). The cursor is an offset
//! into the bed that wraps modulo the bed length; the caller carries it from
//! one unit to the next so the music never restarts or skips.
//!
//! ```text
//! bed:    |----------------------|----------------------|
//!                  ^cursor
//! voice:           |=========== len ==========|
//! mixed = bed[cursor..] * music_volume + voice * voice_volume
//! ```
//!
//! Segments whose peak exceeds full scale are rescaled as a whole to a 0.95
//! peak (see [`limit_peak`]). A pause is a mix with a silent voice, so pauses
//! still carry music.

use crate::audio::{limit_peak, to_pcm16_le};
use crate::track::AudioTrack;
use crate::{Error, Result};

/// Output of one mix: float samples plus the advanced music cursor.
#[derive(Debug, Clone, PartialEq)]
pub struct MixedSegment {
    pub samples: Vec<f32>,
    pub cursor: usize,
}

impl MixedSegment {
    /// Little-endian 16-bit PCM of the whole segment.
    pub fn to_pcm16(&self) -> Vec<u8> {
        to_pcm16_le(&self.samples)
    }
}

/// Owns the music bed and the mix levels.
#[derive(Debug, Clone)]
pub struct Mixer {
    music: AudioTrack,
    music_volume: f32,
    voice_volume: f32,
}

impl Mixer {
    /// The bed must hold at least one sample.
    pub fn new(music: AudioTrack, music_volume: f32, voice_volume: f32) -> Result<Self> {
        if music.is_empty() {
            return Err(Error::Format(format!("music bed {} is empty", music.name)));
        }
        Ok(Self {
            music,
            music_volume,
            voice_volume,
        })
    }

    pub fn music(&self) -> &AudioTrack {
        &self.music
    }

    pub fn music_len(&self) -> usize {
        self.music.len()
    }

    /// `length` samples of the bed starting at `offset`, looped and scaled
    /// by the music volume.
    pub fn music_segment(&self, length: usize, offset: usize) -> Vec<f32> {
        let mut segment = self.looped(length, offset);
        for s in segment.iter_mut() {
            *s *= self.music_volume;
        }
        segment
    }

    /// Mix `voice` over the bed starting at `cursor`.
    pub fn mix(&self, voice: &[f32], cursor: usize) -> MixedSegment {
        let mut samples = self.music_segment(voice.len(), cursor);
        for (out, &v) in samples.iter_mut().zip(voice) {
            *out += v * self.voice_volume;
        }
        if limit_peak(&mut samples) {
            tracing::trace!(len = voice.len(), "mixed segment rescaled to headroom");
        }
        MixedSegment {
            samples,
            cursor: self.advance(cursor, voice.len()),
        }
    }

    /// A voice-free segment of `length` samples: music only.
    pub fn pause(&self, length: usize, cursor: usize) -> MixedSegment {
        self.mix(&vec![0.0; length], cursor)
    }

    /// `(cursor + length) mod bed length`.
    pub fn advance(&self, cursor: usize, length: usize) -> usize {
        let len = self.music_len();
        (cursor % len + length % len) % len
    }

    /// Raw looped copy of the bed. Each pass copies up to the end of the bed
    /// then wraps to its start, so no gap appears at the seam.
    fn looped(&self, length: usize, offset: usize) -> Vec<f32> {
        let bed = &self.music.samples;
        let mut segment = Vec::with_capacity(length);
        let mut position = offset % bed.len();
        while segment.len() < length {
            let take = (length - segment.len()).min(bed.len() - position);
            segment.extend_from_slice(&bed[position..position + take]);
            position = 0;
        }
        segment
    }
}
