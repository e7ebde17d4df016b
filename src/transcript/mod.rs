//! The transcript collaborator seam — a pure sink for conversation turns.
//!
//! The pipeline reports recognized user text, assistant replies, and
//! user-visible system notices here, fire-and-forget.  Display and styling
//! belong to the embedding UI; persistence lives in [`store`].

pub mod store;

use std::fmt;

pub use store::ConversationLog;

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// Who a transcript turn belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Recognized speech from the person talking to the avatar.
    User,
    /// The avatar's reply text.
    Assistant,
    /// Pipeline notices (errors, empty-recording hints) shown to the user.
    System,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        };
        write!(f, "{name}")
    }
}

// ---------------------------------------------------------------------------
// TranscriptSink
// ---------------------------------------------------------------------------

/// Receives transcript turns from the pipeline.
///
/// Fire-and-forget: failures inside a sink must not propagate back into the
/// interaction flow.
pub trait TranscriptSink: Send + Sync {
    /// Record one turn of the conversation.
    fn record_turn(&self, role: Role, text: &str);
}

// ---------------------------------------------------------------------------
// ConsoleTranscript
// ---------------------------------------------------------------------------

/// Sink that prints turns to stdout — the CLI front door's chat history.
pub struct ConsoleTranscript;

impl TranscriptSink for ConsoleTranscript {
    fn record_turn(&self, role: Role, text: &str) {
        println!("[{role}] {text}");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_display_matches_wire_names() {
        assert_eq!(Role::User.to_string(), "user");
        assert_eq!(Role::Assistant.to_string(), "assistant");
        assert_eq!(Role::System.to_string(), "system");
    }

    /// Verify the trait is object-safe (usable as `dyn TranscriptSink`).
    #[test]
    fn sink_is_object_safe() {
        let sink: Box<dyn TranscriptSink> = Box::new(ConsoleTranscript);
        sink.record_turn(Role::System, "ready");
    }
}
