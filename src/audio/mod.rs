//! Shared audio primitives — signal windows, lip-sync amplitude extraction,
//! resampling, and the RIFF/WAVE container.
//!
//! # Pipeline
//!
//! ```text
//! Microphone → cpal callback → downmix_to_mono → resample → PCM16 chunks
//!                                   └──▶ SignalTap ──▶ AmplitudeAnalyzer
//!
//! Reply PCM  → synthesize_wav / parse_wav → f32 samples → output stream
//!                                   └──▶ SignalTap ──▶ AmplitudeAnalyzer
//! ```
//!
//! The same [`AmplitudeAnalyzer`] formula drives lip-sync for both the live
//! input (avatar "listening") and the decoded output (avatar "speaking").

pub mod amplitude;
pub mod resample;
pub mod ring;
pub mod wav;

pub use amplitude::{
    amplitude_of, magnitude_byte, AmplitudeAnalyzer, AmplitudeSample, SignalTap, MIDPOINT,
};
pub use resample::{downmix_to_mono, resample};
pub use ring::RingBuffer;
pub use wav::{
    f32_to_pcm16, looks_like_wav, parse_wav, pcm16_to_f32, synthesize_wav, WavError, PCM_BITS,
};
