//! Voice interaction pipeline for an animated avatar.
//!
//! Captures microphone audio into chunked PCM sessions, ships finished
//! recordings to an inference service, and plays the spoken reply back while
//! driving the avatar's mouth from the live signal amplitude.
//!
//! # Architecture
//!
//! ```text
//! mic ──▶ capture::AudioCaptureEngine ──EncodedAudioBlob──▶ inference
//!             │ SignalTap                                      │ reply
//!             ▼                                                ▼
//!         avatar lip-sync ◀──SignalTap── playback::PlaybackOrchestrator
//!                                                              │
//! interaction::InteractionStateMachine ◀───────────────────────┘
//!   Idle → Recording → Processing → Speaking → Idle
//! ```
//!
//! The hardware seams ([`capture::CaptureBackend`],
//! [`playback::OutputBackend`]), the service seam
//! ([`inference::InferenceClient`]) and the presentation seams
//! ([`avatar::AvatarRenderer`], [`transcript::TranscriptSink`]) are traits,
//! so every layer above the device drivers is testable with doubles.

pub mod audio;
pub mod avatar;
pub mod capture;
pub mod config;
pub mod inference;
pub mod interaction;
pub mod playback;
pub mod transcript;
