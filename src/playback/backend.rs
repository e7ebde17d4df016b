//! Output device abstraction behind the playback orchestrator.
//!
//! The trait seam exists for the same reason as in capture: hardware streams
//! are untestable, so the orchestrator talks to a [`OutputBackend`] trait and
//! tests substitute scripted doubles.

use crate::audio::{SignalTap, WavError};
use thiserror::Error;

// ---------------------------------------------------------------------------
// PlaybackError
// ---------------------------------------------------------------------------

/// Errors from decoding or starting reply playback.
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// The payload could not be decoded into PCM samples.
    #[error("failed to decode reply audio: {0}")]
    Decode(String),

    /// The environment refused to start output (e.g. an autoplay policy
    /// before any user gesture).  Retryable after resuming the output
    /// context.
    #[error("output blocked by the environment")]
    Blocked,

    /// No usable output device.
    #[error("output device unavailable")]
    DeviceUnavailable,

    /// The output stream failed after starting.
    #[error("output stream error: {0}")]
    Stream(String),
}

impl From<WavError> for PlaybackError {
    fn from(err: WavError) -> Self {
        PlaybackError::Decode(err.to_string())
    }
}

// ---------------------------------------------------------------------------
// PcmAudio
// ---------------------------------------------------------------------------

/// Decoded reply audio, ready for an output device.
#[derive(Debug, Clone)]
pub struct PcmAudio {
    /// Mono float samples in `[-1.0, 1.0]`.
    pub samples: Vec<f32>,
    /// Native sample rate of the decoded signal.
    pub sample_rate: u32,
}

impl PcmAudio {
    /// Playback duration at the native rate.
    pub fn duration(&self) -> std::time::Duration {
        if self.sample_rate == 0 {
            return std::time::Duration::ZERO;
        }
        std::time::Duration::from_secs_f64(self.samples.len() as f64 / f64::from(self.sample_rate))
    }
}

// ---------------------------------------------------------------------------
// OutputVoice / OutputBackend
// ---------------------------------------------------------------------------

/// A single in-flight utterance on the output device.
pub trait OutputVoice: Send {
    /// Whether the device has consumed the last sample.
    fn is_finished(&self) -> bool;

    /// Stop output immediately and release the device.  Idempotent.
    fn stop(&mut self);
}

/// Opens output streams on the speaker device.
pub trait OutputBackend: Send + Sync {
    /// Start playing `audio`, feeding magnitude bytes of the cursor position
    /// into `tap` as samples leave for the device.
    fn start(
        &self,
        audio: PcmAudio,
        tap: SignalTap,
    ) -> Result<Box<dyn OutputVoice>, PlaybackError>;

    /// Ask the environment to unlock audio output.
    ///
    /// Called once after a [`PlaybackError::Blocked`] start before the single
    /// retry.  Backends with no such notion return `Ok(())`.
    fn resume_output(&self) -> Result<(), PlaybackError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wav_errors_convert_to_decode() {
        let err: PlaybackError = WavError::OddPcmLength(3).into();
        assert!(matches!(err, PlaybackError::Decode(_)));
    }

    #[test]
    fn duration_reflects_sample_count() {
        let audio = PcmAudio {
            samples: vec![0.0; 24_000],
            sample_rate: 24_000,
        };
        assert_eq!(audio.duration(), std::time::Duration::from_secs(1));
    }

    #[test]
    fn zero_rate_duration_is_zero() {
        let audio = PcmAudio {
            samples: vec![0.0; 100],
            sample_rate: 0,
        };
        assert_eq!(audio.duration(), std::time::Duration::ZERO);
    }
}
