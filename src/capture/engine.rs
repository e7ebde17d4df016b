//! The audio capture engine — owns microphone acquisition and the active
//! [`RecordingSession`].
//!
//! # Contract
//!
//! * [`start_capture`](AudioCaptureEngine::start_capture) acquires the device
//!   through the configured [`CaptureBackend`] and begins a new session.
//!   Starting while active is [`CaptureError::AlreadyCapturing`] — never a
//!   double acquire.
//! * [`stop_capture`](AudioCaptureEngine::stop_capture) always releases the
//!   device, drains every chunk that arrived before the stream closed, and
//!   produces the session's [`EncodedAudioBlob`] exactly once.  Stopping with
//!   no chunks yields `Ok(None)`; stopping twice is a no-op.
//! * [`level`](AudioCaptureEngine::level) reads the live input loudness
//!   without affecting capture and never fails.

use std::sync::mpsc;
use std::time::Duration;

use crate::audio::{AmplitudeAnalyzer, AmplitudeSample, SignalTap};

use super::backend::{CaptureBackend, CaptureError, CaptureStream, StreamSpec};
use super::session::{EncodedAudioBlob, RecordingSession};

/// How long `stop_capture` keeps waiting for in-flight chunks after the
/// stream has closed.  The backend drops its sender on close, so in practice
/// the drain ends on disconnect, not on this timeout.
const DRAIN_TIMEOUT: Duration = Duration::from_millis(200);

// ---------------------------------------------------------------------------
// AudioCaptureEngine
// ---------------------------------------------------------------------------

struct ActiveCapture {
    session: RecordingSession,
    stream: Box<dyn CaptureStream>,
    chunk_rx: mpsc::Receiver<Vec<u8>>,
}

/// Owns the microphone and at most one [`RecordingSession`] at a time.
///
/// # Example
///
/// ```rust,no_run
/// use avatar_voice::capture::{AudioCaptureEngine, CpalCaptureBackend, StreamSpec};
///
/// let spec = StreamSpec { sample_rate: 24_000, chunk_interval_ms: 20 };
/// let mut engine = AudioCaptureEngine::new(Box::new(CpalCaptureBackend), spec, 2_048);
///
/// engine.start_capture().unwrap();
/// // … user speaks …
/// let blob = engine.stop_capture().unwrap();
/// ```
pub struct AudioCaptureEngine {
    backend: Box<dyn CaptureBackend>,
    spec: StreamSpec,
    tap: SignalTap,
    analyzer: AmplitudeAnalyzer,
    active: Option<ActiveCapture>,
}

impl AudioCaptureEngine {
    /// Create an engine over `backend`.
    ///
    /// `window_len` sizes the lip-sync analysis window (magnitude bytes kept
    /// for [`level`](Self::level)).
    pub fn new(backend: Box<dyn CaptureBackend>, spec: StreamSpec, window_len: usize) -> Self {
        let tap = SignalTap::new(window_len);
        let analyzer = AmplitudeAnalyzer::new(tap.clone());
        Self {
            backend,
            spec,
            tap,
            analyzer,
            active: None,
        }
    }

    /// Acquire the microphone and begin a new recording session.
    ///
    /// The session is created only after the device is successfully acquired,
    /// so a permission failure leaves no session behind.
    ///
    /// # Errors
    ///
    /// [`CaptureError::AlreadyCapturing`] when a session is active, plus the
    /// backend's acquisition errors.
    pub fn start_capture(&mut self) -> Result<(), CaptureError> {
        if self.active.is_some() {
            return Err(CaptureError::AlreadyCapturing);
        }

        self.tap.clear();
        let (chunk_tx, chunk_rx) = mpsc::channel();
        let stream = self.backend.open(self.spec, chunk_tx, self.tap.clone())?;

        let session = RecordingSession::begin(self.spec.sample_rate);
        log::info!("recording session {} started", session.id());

        self.active = Some(ActiveCapture {
            session,
            stream,
            chunk_rx,
        });
        Ok(())
    }

    /// Stop capturing, release the device, and return the encoded blob.
    ///
    /// Returns `Ok(None)` when no chunks were captured or when no capture is
    /// active (double stop is a no-op).
    pub fn stop_capture(&mut self) -> Result<Option<EncodedAudioBlob>, CaptureError> {
        let Some(mut active) = self.active.take() else {
            return Ok(None);
        };

        // Release the hardware first; close() joins the stream thread, which
        // flushes its final partial chunk and drops the sender.
        active.stream.close();

        loop {
            match active.chunk_rx.recv_timeout(DRAIN_TIMEOUT) {
                Ok(chunk) => active.session.append_chunk(chunk),
                Err(_) => break,
            }
        }

        active.session.finish();
        let id = active.session.id();
        let mime = format!("audio/pcm;rate={}", self.spec.sample_rate);
        let blob = active.session.into_blob(&mime);

        match &blob {
            Some(b) => log::info!("session {id} stopped: {} bytes", b.len()),
            None => log::info!("session {id} stopped with no audio"),
        }

        self.tap.clear();
        Ok(blob)
    }

    /// Current loudness of the live input signal.
    ///
    /// Returns the zero sample when no capture is active — never fails.
    pub fn level(&self) -> AmplitudeSample {
        if self.active.is_some() {
            self.analyzer.sample()
        } else {
            AmplitudeSample::SILENT
        }
    }

    /// Returns `true` while a recording session is active.
    pub fn is_capturing(&self) -> bool {
        self.active.is_some()
    }

    /// A clone of the lip-sync analyzer over this engine's input tap.
    ///
    /// Lets a tick task read the live level without borrowing the engine;
    /// between sessions the tap is cleared, so the clone reads silence.
    pub fn analyzer(&self) -> AmplitudeAnalyzer {
        self.analyzer.clone()
    }

    /// The fixed stream parameters this engine captures with.
    pub fn spec(&self) -> StreamSpec {
        self.spec
    }
}

impl Drop for AudioCaptureEngine {
    fn drop(&mut self) {
        // Hardware must be released even if the owner forgot to stop.
        if self.active.is_some() {
            let _ = self.stop_capture();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
