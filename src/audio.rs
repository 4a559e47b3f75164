//! Audio I/O utilities.
//!
//! WAV decoding with mono collapse, WAV writing, the streaming WAV header and
//! float → 16-bit PCM conversion used on the wire.

mod pcm;
mod wav;

pub use pcm::{limit_peak, peak, to_pcm16_le, HEADROOM_PEAK};
pub use wav::{read_wav, read_wav_mono, stream_header, write_wav, STREAM_HEADER_LEN};
