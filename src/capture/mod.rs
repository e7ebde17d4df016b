//! Microphone capture — device acquisition, chunked PCM encoding, and
//! recording-session ownership.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use avatar_voice::capture::{AudioCaptureEngine, CpalCaptureBackend, StreamSpec};
//!
//! let spec = StreamSpec { sample_rate: 24_000, chunk_interval_ms: 20 };
//! let mut engine = AudioCaptureEngine::new(Box::new(CpalCaptureBackend), spec, 2_048);
//!
//! engine.start_capture()?;
//! let level = engine.level(); // live input loudness, any time
//! let blob = engine.stop_capture()?; // None when nothing was captured
//! # Ok::<(), avatar_voice::capture::CaptureError>(())
//! ```

pub mod backend;
pub mod cpal_backend;
pub mod engine;
pub mod session;

pub use backend::{CaptureBackend, CaptureError, CaptureStream, StreamSpec};
pub use cpal_backend::CpalCaptureBackend;
pub use engine::AudioCaptureEngine;
pub use session::{EncodedAudioBlob, RecordingSession, SessionState};
