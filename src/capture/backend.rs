//! The capture backend seam.
//!
//! [`CaptureBackend`] abstracts the microphone so the engine (and the
//! interaction machine above it) can be unit-tested without hardware.  The
//! production implementation is [`CpalCaptureBackend`](super::CpalCaptureBackend);
//! tests use scripted doubles.

use std::sync::mpsc;

use thiserror::Error;

use crate::audio::SignalTap;

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

/// Errors that can occur while acquiring or running the microphone.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CaptureError {
    /// The user or OS denied access to the microphone.
    #[error("microphone access denied")]
    PermissionDenied,

    /// No compatible input device exists.
    #[error("no compatible input device available")]
    DeviceUnavailable,

    /// The platform lacks the required capture primitive.
    #[error("audio capture not supported in this environment: {0}")]
    UnsupportedEnvironment(String),

    /// `start_capture` was called while a session is already active.
    ///
    /// Acquiring hardware is observable, so a second start is rejected rather
    /// than double-acquired.
    #[error("capture already in progress")]
    AlreadyCapturing,
}

// ---------------------------------------------------------------------------
// StreamSpec
// ---------------------------------------------------------------------------

/// Fixed parameters a capture stream must honour.
#[derive(Debug, Clone, Copy)]
pub struct StreamSpec {
    /// Session sample rate in Hz; the backend resamples the device to this.
    pub sample_rate: u32,
    /// Time-based chunk boundary.  Tighter intervals reduce end-to-end
    /// latency and chunk loss on abrupt stop; larger intervals reduce
    /// per-chunk overhead.
    pub chunk_interval_ms: u64,
}

impl StreamSpec {
    /// Number of mono samples per encoded chunk.
    pub fn samples_per_chunk(&self) -> usize {
        ((self.sample_rate as u64 * self.chunk_interval_ms) / 1_000).max(1) as usize
    }
}

// ---------------------------------------------------------------------------
// CaptureBackend / CaptureStream
// ---------------------------------------------------------------------------

/// A live microphone stream.
///
/// [`close`](Self::close) must release the underlying device and flush any
/// pending chunk; it must be idempotent, and implementations also release on
/// drop so the hardware can never leak.
pub trait CaptureStream: Send {
    /// Stop the stream and release the device.  After this returns, the
    /// chunk sender passed to [`CaptureBackend::open`] has been dropped and
    /// no further chunk can arrive.
    fn close(&mut self);
}

/// Opens microphone streams.
///
/// Implementations deliver mono 16-bit little-endian PCM chunks (at
/// `spec.sample_rate`, one chunk per `spec.chunk_interval_ms`) over the
/// `chunks` sender, in capture order, and feed `tap` with magnitude bytes
/// for live amplitude analysis.
pub trait CaptureBackend: Send + Sync {
    /// Acquire the device and start streaming.
    ///
    /// # Errors
    ///
    /// [`CaptureError::PermissionDenied`] when access is refused,
    /// [`CaptureError::DeviceUnavailable`] when no input device exists,
    /// [`CaptureError::UnsupportedEnvironment`] when the platform cannot
    /// capture at all.
    fn open(
        &self,
        spec: StreamSpec,
        chunks: mpsc::Sender<Vec<u8>>,
        tap: SignalTap,
    ) -> Result<Box<dyn CaptureStream>, CaptureError>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
