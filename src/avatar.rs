//! The rendering collaborator seam.
//!
//! The pipeline never renders anything itself: it pushes an expression tag
//! and a lip-openness value to whatever character engine is attached, and
//! never reads anything back.  The calls are one-directional by contract —
//! a renderer must not call back into the capture or playback engines.

use std::fmt;

// ---------------------------------------------------------------------------
// Expression
// ---------------------------------------------------------------------------

/// Expression tags the avatar understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expression {
    /// Resting face — requested on every return to idle.
    Neutral,
    /// The avatar is being spoken to (recording in progress).
    Listening,
    /// The avatar is talking (reply playback in progress).
    Speaking,
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Expression::Neutral => "neutral",
            Expression::Listening => "listening",
            Expression::Speaking => "speaking",
        };
        write!(f, "{tag}")
    }
}

// ---------------------------------------------------------------------------
// AvatarRenderer
// ---------------------------------------------------------------------------

/// Receives expression tags and lip-sync amplitudes from the pipeline.
///
/// Implementors must be `Send + Sync` so they can be shared as
/// `Arc<dyn AvatarRenderer>` between the interaction machine and the tick
/// tasks.  Both methods are fire-and-forget: the pipeline neither expects a
/// result nor inspects the renderer's state.
pub trait AvatarRenderer: Send + Sync {
    /// Request an expression change.
    fn set_expression(&self, expression: Expression);

    /// Forward one lip-openness value in `[0.0, 1.0]`.
    ///
    /// Called on every amplitude tick while a stream is live; expected to be
    /// cheap.
    fn update_lip_value(&self, amplitude: f32);
}

// ---------------------------------------------------------------------------
// LogRenderer
// ---------------------------------------------------------------------------

/// Default renderer that writes to the log — useful headless and in the CLI
/// front door, where no character engine is attached.
///
/// Lip values are logged at `trace` to keep the 50 ms tick out of normal
/// output.
pub struct LogRenderer;

impl AvatarRenderer for LogRenderer {
    fn set_expression(&self, expression: Expression) {
        log::debug!("avatar expression → {expression}");
    }

    fn update_lip_value(&self, amplitude: f32) {
        log::trace!("avatar lip value → {amplitude:.3}");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expression_tags_render_lowercase() {
        assert_eq!(Expression::Neutral.to_string(), "neutral");
        assert_eq!(Expression::Listening.to_string(), "listening");
        assert_eq!(Expression::Speaking.to_string(), "speaking");
    }

    /// Verify the trait is object-safe (usable as `dyn AvatarRenderer`).
    #[test]
    fn renderer_is_object_safe() {
        let renderer: Box<dyn AvatarRenderer> = Box::new(LogRenderer);
        renderer.set_expression(Expression::Neutral);
        renderer.update_lip_value(0.0);
    }
}
