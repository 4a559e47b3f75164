//! Float → 16-bit PCM conversion and clip prevention.

/// Peak level a limited segment is rescaled to.
pub const HEADROOM_PEAK: f32 = 0.95;

/// Largest absolute sample value.
pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max)
}

/// Rescale the whole segment so its peak sits at [`HEADROOM_PEAK`] when it
/// would otherwise exceed full scale. Segments within range are untouched.
///
/// Returns true if the segment was rescaled.
pub fn limit_peak(samples: &mut [f32]) -> bool {
    let max_abs = peak(samples);
    if max_abs > 1.0 {
        let scale = HEADROOM_PEAK / max_abs;
        for s in samples.iter_mut() {
            *s *= scale;
        }
        true
    } else {
        false
    }
}

/// Clip to [-1, 1], scale by 32767 and truncate, emitting little-endian bytes.
pub fn to_pcm16_le(samples: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &s in samples {
        let value = (s.clamp(-1.0, 1.0) * 32767.0) as i16;
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}
