//! Reply playback — payload decoding, speaker output, and lip-sync ticks.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use avatar_voice::avatar::LogRenderer;
//! use avatar_voice::playback::{
//!     CpalOutputBackend, EncodedAudioPayload, PlaybackOrchestrator,
//! };
//!
//! # async fn demo(pcm: Vec<u8>) -> Result<(), avatar_voice::playback::PlaybackError> {
//! let orch = PlaybackOrchestrator::new(
//!     Arc::new(CpalOutputBackend),
//!     Arc::new(LogRenderer),
//!     50,    // lip-sync tick interval, ms
//!     2_048, // analysis window, magnitude bytes
//! );
//!
//! let payload = EncodedAudioPayload::raw_pcm16(pcm, 24_000);
//! let handle = orch.play(&payload)?;
//! handle.wait().await;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod cpal_backend;
pub mod orchestrator;

pub use backend::{OutputBackend, OutputVoice, PcmAudio, PlaybackError};
pub use cpal_backend::CpalOutputBackend;
pub use orchestrator::{
    EncodedAudioPayload, PlaybackHandle, PlaybackOrchestrator, PlaybackOutcome, PlaybackState,
};
