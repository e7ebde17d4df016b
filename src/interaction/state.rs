//! Interaction phases and shared turn state.
//!
//! [`InteractionState`] drives the voice-interaction state machine.  An
//! embedding UI reads it via [`SharedTurnState`] to render status.
//!
//! [`TurnState`] is the single source of truth for the current phase, the
//! last exchanged texts, and any error annotation.

use std::sync::{Arc, Mutex};

// ---------------------------------------------------------------------------
// InteractionState
// ---------------------------------------------------------------------------

/// Phases of a voice interaction turn.
///
/// The state machine transitions are:
///
/// ```text
/// Idle ──start──▶ Recording ──stop──▶ Processing
///                                     ──reply has audio──▶ Speaking
///                                     ──no audio / error─▶ Idle
/// Speaking ──playback done / stopped──▶ Idle
/// ```
///
/// There is no terminal error phase: every failure annotates the turn and
/// returns the machine to `Idle`, ready for the next attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionState {
    /// Waiting for the user to start talking.
    Idle,

    /// Microphone is active; chunks are accumulating in the session.
    Recording,

    /// Recording finished; the inference round trip is in flight.
    Processing,

    /// Reply audio is playing; lip-sync ticks are live.
    Speaking,
}

impl InteractionState {
    /// Returns `true` while a turn is in flight and a new recording cannot
    /// start.
    ///
    /// ```
    /// use avatar_voice::interaction::InteractionState;
    ///
    /// assert!(!InteractionState::Idle.is_busy());
    /// assert!(InteractionState::Recording.is_busy());
    /// assert!(InteractionState::Processing.is_busy());
    /// assert!(InteractionState::Speaking.is_busy());
    /// ```
    pub fn is_busy(&self) -> bool {
        !matches!(self, InteractionState::Idle)
    }

    /// A short human-readable label suitable for a status line.
    pub fn label(&self) -> &'static str {
        match self {
            InteractionState::Idle => "Idle",
            InteractionState::Recording => "Recording",
            InteractionState::Processing => "Thinking",
            InteractionState::Speaking => "Speaking",
        }
    }
}

impl Default for InteractionState {
    fn default() -> Self {
        InteractionState::Idle
    }
}

// ---------------------------------------------------------------------------
// TurnState
// ---------------------------------------------------------------------------

/// Shared turn state — what an embedding UI needs to render status.
///
/// Held behind [`SharedTurnState`].  The interaction machine mutates it; a
/// UI reads it each frame.
#[derive(Debug, Default)]
pub struct TurnState {
    /// Current phase of the interaction.
    pub interaction: InteractionState,

    /// What the service heard the user say, from the most recent turn.
    pub last_user_text: Option<String>,

    /// The assistant's most recent reply text.
    pub last_ai_text: Option<String>,

    /// Description of the most recent failure.
    ///
    /// Set whenever a turn aborts; cleared when the next recording starts.
    pub last_error: Option<String>,
}

// ---------------------------------------------------------------------------
// SharedTurnState
// ---------------------------------------------------------------------------

/// Thread-safe handle to [`TurnState`].
///
/// Cheap to clone (`Arc` clone).  Lock for a short critical section; do
/// **not** hold the lock across `.await` points.
pub type SharedTurnState = Arc<Mutex<TurnState>>;

/// Construct a new [`SharedTurnState`] wrapping a default [`TurnState`].
pub fn new_shared_turn_state() -> SharedTurnState {
    Arc::new(Mutex::new(TurnState::default()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
