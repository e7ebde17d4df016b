//! Interaction state machine — drives the full record → infer → speak loop.
//!
//! [`InteractionStateMachine`] owns the capture engine and the playback
//! orchestrator, and responds to [`InteractionEvent`]s received over a
//! `tokio::sync::mpsc` channel.
//!
//! # Turn flow
//!
//! ```text
//! InteractionEvent::StartRecording
//!   └─▶ acquire mic, expression = listening          [Recording]
//!         └─▶ 50 ms input lip-sync ticks while live
//!
//! InteractionEvent::StopRecording
//!   └─▶ release mic, expression = neutral            [Processing]
//!         ├─ no audio  → system notice               [Idle]
//!         └─ blob      → inference round trip
//!               ├─ Err → system notice + last_error  [Idle]
//!               └─ Ok  → transcript turns, log
//!                     ├─ reply audio → play + lip-sync [Speaking] → [Idle]
//!                     └─ text only  →                  [Idle]
//! ```
//!
//! Every failure path closes the mouth, restores a neutral expression, and
//! lands back in `Idle` — the machine is always ready for the next attempt.
//!
//! Reply playback does not block the event loop: a start pressed while the
//! avatar is speaking is rejected as busy, and a recording that reaches the
//! configured length cap is stopped as if the user had released the button.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, Notify};

use crate::avatar::{AvatarRenderer, Expression};
use crate::capture::{AudioCaptureEngine, CaptureError};
use crate::inference::InferenceClient;
use crate::playback::{
    EncodedAudioPayload, PlaybackHandle, PlaybackOrchestrator, PlaybackOutcome,
};
use crate::transcript::{ConversationLog, Role, TranscriptSink};

use super::state::{InteractionState, SharedTurnState};

// ---------------------------------------------------------------------------
// InteractionEvent / InteractionError
// ---------------------------------------------------------------------------

/// Commands the machine responds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionEvent {
    /// Begin a new recording (rejected unless idle).
    StartRecording,
    /// Finish the recording and run the rest of the turn.
    StopRecording,
}

/// Errors surfaced to the caller of the machine's direct methods.
#[derive(Debug, Error)]
pub enum InteractionError {
    /// A turn is already in flight.
    #[error("busy: {0}")]
    Busy(&'static str),

    /// Microphone acquisition failed.
    #[error(transparent)]
    Capture(#[from] CaptureError),
}

// ---------------------------------------------------------------------------
// TurnSettings
// ---------------------------------------------------------------------------

/// The per-turn knobs the machine needs from application config.
#[derive(Debug, Clone)]
pub struct TurnSettings {
    /// Persona name sent with every inference request.
    pub persona: String,
    /// Sample rate to assume for headerless reply PCM.
    pub reply_sample_rate: u32,
    /// Input-side lip-sync tick interval.
    pub lipsync_tick_ms: u64,
    /// Longest allowed recording; the event loop stops longer ones itself.
    pub max_recording_secs: f32,
}

/// Boxed wait on an in-flight reply playback, polled by the event loop.
type SpeakingWait = Pin<Box<dyn Future<Output = PlaybackOutcome> + Send>>;

/// Await the future inside `slot`, or pend forever when it is empty.
async fn armed<F: Future + Unpin>(slot: &mut Option<F>) -> F::Output {
    match slot {
        Some(fut) => fut.await,
        None => std::future::pending().await,
    }
}

// ---------------------------------------------------------------------------
// InteractionStateMachine
// ---------------------------------------------------------------------------

/// Drives the complete voice-interaction loop.
///
/// Create with [`InteractionStateMachine::new`], then either call
/// [`run`](Self::run) inside a tokio task or drive
/// [`start_recording`](Self::start_recording) /
/// [`stop_recording`](Self::stop_recording) directly.
pub struct InteractionStateMachine {
    state: SharedTurnState,
    capture: AudioCaptureEngine,
    playback: PlaybackOrchestrator,
    inference: Arc<dyn InferenceClient>,
    renderer: Arc<dyn AvatarRenderer>,
    transcript: Arc<dyn TranscriptSink>,
    conversation_log: Option<ConversationLog>,
    settings: TurnSettings,
    input_tick_stop: Option<Arc<Notify>>,
}

impl InteractionStateMachine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        state: SharedTurnState,
        capture: AudioCaptureEngine,
        playback: PlaybackOrchestrator,
        inference: Arc<dyn InferenceClient>,
        renderer: Arc<dyn AvatarRenderer>,
        transcript: Arc<dyn TranscriptSink>,
        conversation_log: Option<ConversationLog>,
        settings: TurnSettings,
    ) -> Self {
        Self {
            state,
            capture,
            playback,
            inference,
            renderer,
            transcript,
            conversation_log,
            settings,
            input_tick_stop: None,
        }
    }

    // -----------------------------------------------------------------------
    // Main async loop
    // -----------------------------------------------------------------------

    /// Run the machine until `events` is closed.
    ///
    /// This is an `async fn` and should be spawned as a tokio task from
    /// `main()`.  It never returns while the channel is open.
    ///
    /// The loop keeps receiving while a reply is playing, so a start request
    /// arriving mid-playback hits the `Busy` rejection instead of executing
    /// once the turn is over.  A recording that reaches
    /// [`TurnSettings::max_recording_secs`] is stopped automatically.
    pub async fn run(mut self, mut events: mpsc::Receiver<InteractionEvent>) {
        let mut speaking: Option<SpeakingWait> = None;
        let mut recording_cap: Option<Pin<Box<tokio::time::Sleep>>> = None;

        loop {
            tokio::select! {
                outcome = armed(&mut speaking) => {
                    self.finish_speaking(outcome);
                    speaking = None;
                }
                () = armed(&mut recording_cap) => {
                    log::info!(
                        "interaction: recording reached the {}s cap, stopping",
                        self.settings.max_recording_secs
                    );
                    recording_cap = None;
                    speaking = self.complete_turn(&mut events).await;
                }
                maybe_event = events.recv() => {
                    let Some(event) = maybe_event else { break };
                    match event {
                        InteractionEvent::StartRecording => match self.start_recording() {
                            Ok(()) => {
                                let cap = Duration::from_secs_f32(
                                    self.settings.max_recording_secs.max(0.01),
                                );
                                recording_cap = Some(Box::pin(tokio::time::sleep(cap)));
                            }
                            Err(e) => log::warn!("start recording rejected: {e}"),
                        },
                        InteractionEvent::StopRecording => {
                            if speaking.is_some()
                                || self.phase() != InteractionState::Recording
                            {
                                log::debug!("interaction: stop ignored, not recording");
                            } else {
                                recording_cap = None;
                                speaking = self.complete_turn(&mut events).await;
                            }
                        }
                    }
                }
            }
        }

        // Let an in-flight reply finish before shutting down.
        if let Some(wait) = speaking {
            let outcome = wait.await;
            self.finish_speaking(outcome);
        }

        log::info!("interaction: event channel closed, machine shutting down");
    }

    /// Run the stop half of a turn, handing back the playback wait when the
    /// reply carried audio.  Events that queued up while the turn was
    /// processing were sent against a busy machine and are discarded.
    async fn complete_turn(
        &mut self,
        events: &mut mpsc::Receiver<InteractionEvent>,
    ) -> Option<SpeakingWait> {
        let speaking = self
            .process_recording()
            .await
            .map(|handle| -> SpeakingWait { Box::pin(handle.wait()) });
        while let Ok(stale) = events.try_recv() {
            log::warn!("interaction: ignoring {stale:?} received mid-turn");
        }
        speaking
    }

    // -----------------------------------------------------------------------
    // Turn handlers
    // -----------------------------------------------------------------------

    /// Begin a recording: acquire the microphone and start listening.
    ///
    /// # Errors
    ///
    /// [`InteractionError::Busy`] when a turn is already in flight, plus the
    /// capture engine's acquisition errors.  On a capture failure a system
    /// notice lands in the transcript and the machine stays idle.
    pub fn start_recording(&mut self) -> Result<(), InteractionError> {
        let phase = self.phase();
        if phase.is_busy() {
            return Err(InteractionError::Busy(phase.label()));
        }

        if let Err(e) = self.capture.start_capture() {
            self.fail_turn(&format!("microphone unavailable: {e}"));
            return Err(e.into());
        }

        {
            let mut st = self.state.lock().unwrap();
            st.interaction = InteractionState::Recording;
            st.last_error = None;
        }
        self.renderer.set_expression(Expression::Listening);
        self.spawn_input_ticks();

        log::debug!("interaction: → Recording");
        Ok(())
    }

    /// Finish the recording and run the rest of the turn to completion.
    ///
    /// Stopping while not recording is a no-op.  The call returns once the
    /// machine is back in `Idle` — including after reply playback.
    pub async fn stop_recording(&mut self) {
        if let Some(handle) = self.process_recording().await {
            let outcome = handle.wait().await;
            self.finish_speaking(outcome);
        }
    }

    /// Everything between releasing the mic and the reply starting to play:
    /// blob collection, the inference round trip, transcript bookkeeping.
    ///
    /// Returns the handle of the started playback, or `None` when the turn
    /// ended without one — in that case the machine is already back in
    /// `Idle`.
    async fn process_recording(&mut self) -> Option<PlaybackHandle> {
        if self.phase() != InteractionState::Recording {
            log::debug!("interaction: stop ignored, not recording");
            return None;
        }

        self.stop_input_ticks();
        self.set_phase(InteractionState::Processing);
        self.renderer.set_expression(Expression::Neutral);

        // ── 1. Release the mic and collect the session blob ──────────────
        let blob = match self.capture.stop_capture() {
            Ok(Some(blob)) => blob,
            Ok(None) => {
                log::warn!("interaction: recording produced no audio");
                self.transcript
                    .record_turn(Role::System, "I didn't catch any audio, try again?");
                self.set_phase(InteractionState::Idle);
                return None;
            }
            Err(e) => {
                self.fail_turn(&format!("recording failed: {e}"));
                self.set_phase(InteractionState::Idle);
                return None;
            }
        };

        // ── 2. Inference round trip ──────────────────────────────────────
        let reply = match self.inference.infer(&blob, &self.settings.persona).await {
            Ok(reply) => reply,
            Err(e) => {
                self.fail_turn(&format!("couldn't reach the assistant: {e}"));
                self.set_phase(InteractionState::Idle);
                return None;
            }
        };

        // ── 3. Transcript + conversation log ─────────────────────────────
        if let Some(user_text) = &reply.user_text {
            self.transcript.record_turn(Role::User, user_text);
        }
        if let Some(ai_text) = &reply.ai_text {
            self.transcript.record_turn(Role::Assistant, ai_text);
        }
        {
            let mut st = self.state.lock().unwrap();
            st.last_user_text = reply.user_text.clone();
            st.last_ai_text = reply.ai_text.clone();
        }
        if let (Some(log_file), Some(user_text), Some(ai_text)) = (
            self.conversation_log.as_ref(),
            reply.user_text.as_deref(),
            reply.ai_text.as_deref(),
        ) {
            log_file.append(user_text, ai_text);
        }

        // ── 4. Reply playback ────────────────────────────────────────────
        let Some(pcm) = reply.audio.filter(|pcm| !pcm.is_empty()) else {
            log::debug!("interaction: text-only reply, no playback");
            self.set_phase(InteractionState::Idle);
            return None;
        };

        self.set_phase(InteractionState::Speaking);
        self.renderer.set_expression(Expression::Speaking);

        let payload = EncodedAudioPayload::raw_pcm16(pcm, self.settings.reply_sample_rate);
        match self.playback.play(&payload) {
            Ok(handle) => Some(handle),
            Err(e) => {
                self.fail_turn(&format!("couldn't play the reply: {e}"));
                self.renderer.set_expression(Expression::Neutral);
                self.set_phase(InteractionState::Idle);
                None
            }
        }
    }

    /// Close out the speaking phase once the reply playback resolved.
    fn finish_speaking(&self, outcome: PlaybackOutcome) {
        if outcome == PlaybackOutcome::Stopped {
            log::debug!("interaction: reply playback was cut short");
        }
        self.renderer.set_expression(Expression::Neutral);
        self.set_phase(InteractionState::Idle);
        log::debug!("interaction: turn complete → Idle");
    }

    /// Shared turn state handle, for embedding UIs.
    pub fn state(&self) -> SharedTurnState {
        Arc::clone(&self.state)
    }

    // -----------------------------------------------------------------------
    // Input lip-sync ticks
    // -----------------------------------------------------------------------

    /// Drive the avatar's mouth from the live microphone level while
    /// recording, at the same cadence as reply playback.
    fn spawn_input_ticks(&mut self) {
        let stop = Arc::new(Notify::new());
        let analyzer = self.capture.analyzer();
        let renderer = Arc::clone(&self.renderer);
        let tick = Duration::from_millis(self.settings.lipsync_tick_ms.max(1));

        let task_stop = Arc::clone(&stop);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    () = task_stop.notified() => break,
                    _ = interval.tick() => {
                        renderer.update_lip_value(analyzer.sample().value());
                    }
                }
            }
            renderer.update_lip_value(0.0);
        });

        self.input_tick_stop = Some(stop);
    }

    fn stop_input_ticks(&mut self) {
        if let Some(stop) = self.input_tick_stop.take() {
            stop.notify_one();
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn phase(&self) -> InteractionState {
        self.state.lock().unwrap().interaction
    }

    fn set_phase(&self, phase: InteractionState) {
        self.state.lock().unwrap().interaction = phase;
    }

    /// Record a failure: system notice in the transcript plus the error
    /// annotation on the shared state.  Does not change the phase.
    fn fail_turn(&self, message: &str) {
        log::error!("interaction: {message}");
        self.transcript.record_turn(Role::System, message);
        self.state.lock().unwrap().last_error = Some(message.to_string());
    }
}

impl Drop for InteractionStateMachine {
    fn drop(&mut self) {
        self.stop_input_ticks();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
