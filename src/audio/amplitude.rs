//! Loudness-derived lip-sync signal extraction.
//!
//! The avatar's mouth openness is a single scalar per tick, derived from the
//! mean deviation of a time-domain magnitude window from its neutral midpoint:
//!
//! ```text
//! normalized = clamp(mean(|sample - 128|) / 128, 0, 1)
//! ```
//!
//! Samples are unsigned bytes centred at 128 (silence), so silence yields
//! `0.0` and a full-scale square wave yields ≈`1.0`.  The same formula drives
//! lip-sync whether the avatar is listening (live input) or speaking (decoded
//! output) — a deliberate symmetry.
//!
//! # Example
//!
//! ```rust
//! use avatar_voice::audio::{amplitude_of, SignalTap, AmplitudeAnalyzer};
//!
//! assert_eq!(amplitude_of(&[128u8; 512]).value(), 0.0); // silence
//!
//! let tap = SignalTap::new(512);
//! tap.push(&[255u8; 512]);
//! let analyzer = AmplitudeAnalyzer::new(tap);
//! assert!(analyzer.sample().value() > 0.9);
//! ```

use std::sync::{Arc, Mutex};

use super::ring::RingBuffer;

/// Neutral midpoint of the unsigned-byte magnitude domain.
pub const MIDPOINT: u8 = 128;

// ---------------------------------------------------------------------------
// AmplitudeSample
// ---------------------------------------------------------------------------

/// A single normalized loudness value in `[0.0, 1.0]`.
///
/// Recomputed on every tick, never persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmplitudeSample(f32);

impl AmplitudeSample {
    /// The zero sample — returned whenever no signal is active.
    pub const SILENT: AmplitudeSample = AmplitudeSample(0.0);

    /// The normalized value, guaranteed to be in `[0.0, 1.0]`.
    pub fn value(self) -> f32 {
        self.0
    }
}

// ---------------------------------------------------------------------------
// amplitude_of
// ---------------------------------------------------------------------------

/// Compute the normalized amplitude of a magnitude window.
///
/// Deterministic: identical windows always yield identical outputs.  An empty
/// window is silence.
pub fn amplitude_of(window: &[u8]) -> AmplitudeSample {
    if window.is_empty() {
        return AmplitudeSample::SILENT;
    }

    let sum: u32 = window
        .iter()
        .map(|&s| u32::from(s.abs_diff(MIDPOINT)))
        .sum();
    let mean = sum as f32 / window.len() as f32;

    AmplitudeSample((mean / f32::from(MIDPOINT)).clamp(0.0, 1.0))
}

/// Convert a float PCM sample in `[-1.0, 1.0]` to an unsigned magnitude byte
/// centred at [`MIDPOINT`].
///
/// Stream backends feed their taps through this so capture and playback
/// analysis share one domain.
pub fn magnitude_byte(sample: f32) -> u8 {
    let clamped = sample.clamp(-1.0, 1.0);
    (clamped * 127.0 + f32::from(MIDPOINT)).round().clamp(0.0, 255.0) as u8
}

// ---------------------------------------------------------------------------
// SignalTap
// ---------------------------------------------------------------------------

/// Shared window of the most recent magnitude bytes of a live signal.
///
/// The producing stream (capture callback or playback cursor) pushes bytes;
/// the analyzer snapshots the window on each tick.  Cloning is cheap — all
/// clones observe the same window.
#[derive(Clone)]
pub struct SignalTap {
    window: Arc<Mutex<RingBuffer<u8>>>,
}

impl SignalTap {
    /// Create a tap holding the most recent `window_len` magnitude bytes.
    pub fn new(window_len: usize) -> Self {
        Self {
            window: Arc::new(Mutex::new(RingBuffer::new(window_len.max(1)))),
        }
    }

    /// Append magnitude bytes from the stream side.
    pub fn push(&self, bytes: &[u8]) {
        if let Ok(mut win) = self.window.lock() {
            win.push_slice(bytes);
        }
    }

    /// Append float PCM samples, converting each through [`magnitude_byte`].
    pub fn push_samples(&self, samples: &[f32]) {
        if let Ok(mut win) = self.window.lock() {
            for &s in samples {
                win.push_slice(&[magnitude_byte(s)]);
            }
        }
    }

    /// Chronological copy of the current window (empty when nothing has been
    /// pushed yet).
    pub fn window(&self) -> Vec<u8> {
        self.window
            .lock()
            .map(|win| win.snapshot())
            .unwrap_or_default()
    }

    /// Reset the window to silence.
    pub fn clear(&self) {
        if let Ok(mut win) = self.window.lock() {
            win.clear();
        }
    }
}

// ---------------------------------------------------------------------------
// AmplitudeAnalyzer
// ---------------------------------------------------------------------------

/// Turns a live or decoded signal into a normalized loudness value on demand.
///
/// Stateless beyond its handle to the signal source: each call to
/// [`sample`](Self::sample) reads the tap's current window and applies
/// [`amplitude_of`].
#[derive(Clone)]
pub struct AmplitudeAnalyzer {
    tap: SignalTap,
}

impl AmplitudeAnalyzer {
    /// Create an analyzer reading from `tap`.
    pub fn new(tap: SignalTap) -> Self {
        Self { tap }
    }

    /// Current loudness of the tapped signal.
    ///
    /// Returns [`AmplitudeSample::SILENT`] when the window is empty — never
    /// fails.
    pub fn sample(&self) -> AmplitudeSample {
        amplitude_of(&self.tap.window())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // ---- amplitude_of ------------------------------------------------------

    #[test]
    fn silence_is_zero() {
        let window = vec![MIDPOINT; 1024];
        assert_eq!(amplitude_of(&window).value(), 0.0);
    }

    #[test]
    fn empty_window_is_zero() {
        assert_eq!(amplitude_of(&[]).value(), 0.0);
    }

    #[test]
    fn full_scale_square_is_clamped_to_one() {
        // Alternating 0 / 255 → mean deviation 127.5 → 127.5/128 ≈ 0.996
        let window: Vec<u8> = (0..512).map(|i| if i % 2 == 0 { 0 } else { 255 }).collect();
        let a = amplitude_of(&window).value();
        assert!(a > 0.99 && a <= 1.0, "amplitude = {a}");
    }

    #[test]
    fn output_always_in_unit_range() {
        let window = vec![0u8; 64]; // maximum negative deviation: |0 - 128| = 128
        let a = amplitude_of(&window).value();
        assert!((0.0..=1.0).contains(&a));
        assert!((a - 1.0).abs() < 1e-6, "|0-128|/128 should be exactly 1.0");
    }

    #[test]
    fn deterministic_for_identical_windows() {
        let window: Vec<u8> = (0..=255).cycle().take(1024).collect();
        let first = amplitude_of(&window);
        let second = amplitude_of(&window);
        assert_eq!(first, second);
    }

    #[test]
    fn quiet_signal_is_quieter_than_loud_signal() {
        let quiet = vec![MIDPOINT + 5; 256];
        let loud = vec![MIDPOINT + 100; 256];
        assert!(amplitude_of(&quiet).value() < amplitude_of(&loud).value());
    }

    // ---- magnitude_byte ----------------------------------------------------

    #[test]
    fn magnitude_byte_maps_silence_to_midpoint() {
        assert_eq!(magnitude_byte(0.0), MIDPOINT);
    }

    #[test]
    fn magnitude_byte_clamps_out_of_range_input() {
        assert_eq!(magnitude_byte(2.0), magnitude_byte(1.0));
        assert_eq!(magnitude_byte(-3.0), magnitude_byte(-1.0));
    }

    // ---- SignalTap / AmplitudeAnalyzer -------------------------------------

    #[test]
    fn analyzer_reads_silent_before_any_push() {
        let analyzer = AmplitudeAnalyzer::new(SignalTap::new(256));
        assert_eq!(analyzer.sample(), AmplitudeSample::SILENT);
    }

    #[test]
    fn analyzer_tracks_pushed_signal() {
        let tap = SignalTap::new(256);
        let analyzer = AmplitudeAnalyzer::new(tap.clone());

        tap.push(&[255u8; 256]);
        assert!(analyzer.sample().value() > 0.9);

        tap.clear();
        assert_eq!(analyzer.sample(), AmplitudeSample::SILENT);
    }

    #[test]
    fn push_samples_converts_float_pcm() {
        let tap = SignalTap::new(128);
        tap.push_samples(&vec![0.0f32; 128]);
        assert_eq!(amplitude_of(&tap.window()).value(), 0.0);

        tap.push_samples(&vec![1.0f32; 128]);
        assert!(amplitude_of(&tap.window()).value() > 0.9);
    }

    #[test]
    fn clones_observe_same_window() {
        let tap = SignalTap::new(64);
        let clone = tap.clone();
        tap.push(&[200u8; 64]);
        assert_eq!(clone.window(), tap.window());
    }
}
