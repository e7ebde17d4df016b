//! Reply playback orchestration — decode, start, lip-sync, completion.
//!
//! One utterance at a time: the orchestrator decodes the reply payload,
//! starts a voice on the output backend, then drives a fixed-interval
//! lip-sync tick until the voice finishes or the caller stops it.  The
//! returned [`PlaybackHandle`] resolves exactly once, whichever comes first.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{oneshot, Notify};

use crate::audio::{looks_like_wav, parse_wav, pcm16_to_f32, AmplitudeAnalyzer, SignalTap};
use crate::avatar::AvatarRenderer;

use super::backend::{OutputBackend, OutputVoice, PcmAudio, PlaybackError};

// ---------------------------------------------------------------------------
// EncodedAudioPayload
// ---------------------------------------------------------------------------

/// Reply audio as received from the inference service.
///
/// The payload is either a full RIFF/WAVE container or headerless raw PCM;
/// [`decode`](EncodedAudioPayload::decode) sniffs which.
#[derive(Debug, Clone)]
pub struct EncodedAudioPayload {
    /// Container or raw PCM bytes.
    pub bytes: Vec<u8>,
    /// Declared MIME type, informational only.
    pub mime_type: String,
    /// Sample rate to assume for headerless payloads.
    pub sample_rate: u32,
    /// Bit depth of the payload.  Only 16 is produced today.
    pub bits_per_sample: u16,
}

impl EncodedAudioPayload {
    /// Raw mono PCM16 at `sample_rate`, the service's usual shape.
    pub fn raw_pcm16(bytes: Vec<u8>, sample_rate: u32) -> Self {
        Self {
            bytes,
            mime_type: format!("audio/pcm;rate={sample_rate}"),
            sample_rate,
            bits_per_sample: 16,
        }
    }

    /// Decode into float samples, sniffing the container.
    ///
    /// # Errors
    ///
    /// Returns [`PlaybackError::Decode`] for malformed containers and for
    /// raw payloads that are not whole 16-bit frames.
    pub fn decode(&self) -> Result<PcmAudio, PlaybackError> {
        if looks_like_wav(&self.bytes) {
            let (samples, rate) = parse_wav(&self.bytes)?;
            return Ok(PcmAudio {
                samples: samples.iter().map(|&s| f32::from(s) / 32_768.0).collect(),
                sample_rate: rate,
            });
        }

        if self.bytes.len() % 2 != 0 {
            return Err(PlaybackError::Decode(format!(
                "raw PCM payload has odd length ({} bytes)",
                self.bytes.len()
            )));
        }

        Ok(PcmAudio {
            samples: pcm16_to_f32(&self.bytes),
            sample_rate: self.sample_rate,
        })
    }
}

// ---------------------------------------------------------------------------
// PlaybackState / PlaybackOutcome
// ---------------------------------------------------------------------------

/// Lifecycle of a single utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// Decoded, voice not yet confirmed on the device.
    Loading,
    /// Samples are leaving for the device.
    Playing,
    /// The voice ran to its last sample.
    Ended,
    /// Startup or streaming failed.
    Errored,
}

/// How a playback finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutcome {
    /// Every sample was delivered.
    Completed,
    /// The caller cut it short.
    Stopped,
}

// ---------------------------------------------------------------------------
// PlaybackHandle
// ---------------------------------------------------------------------------

/// Handle to one in-flight utterance.
///
/// [`wait`](Self::wait) resolves exactly once with the outcome;
/// [`stop`](Self::stop) is idempotent and safe from any task.
#[derive(Debug)]
pub struct PlaybackHandle {
    done_rx: oneshot::Receiver<PlaybackOutcome>,
    stop: Arc<Notify>,
    state: Arc<Mutex<PlaybackState>>,
}

impl PlaybackHandle {
    /// Wait until the utterance completes or is stopped.
    pub async fn wait(self) -> PlaybackOutcome {
        // A dropped sender means the tick task was torn down mid-flight;
        // report that as a stop rather than a completion.
        self.done_rx.await.unwrap_or(PlaybackOutcome::Stopped)
    }

    /// Cut the utterance short.  Stopping a finished utterance is a no-op.
    pub fn stop(&self) {
        self.stop.notify_one();
    }

    /// Current lifecycle state.
    pub fn state(&self) -> PlaybackState {
        self.state.lock().map(|s| *s).unwrap_or(PlaybackState::Errored)
    }
}

// ---------------------------------------------------------------------------
// PlaybackOrchestrator
// ---------------------------------------------------------------------------

/// Decodes reply payloads and plays them one utterance at a time.
pub struct PlaybackOrchestrator {
    backend: Arc<dyn OutputBackend>,
    renderer: Arc<dyn AvatarRenderer>,
    tick_interval: Duration,
    window_len: usize,
}

impl PlaybackOrchestrator {
    pub fn new(
        backend: Arc<dyn OutputBackend>,
        renderer: Arc<dyn AvatarRenderer>,
        tick_interval_ms: u64,
        window_len: usize,
    ) -> Self {
        Self {
            backend,
            renderer,
            tick_interval: Duration::from_millis(tick_interval_ms.max(1)),
            window_len,
        }
    }

    /// Decode `payload` and start playing it.
    ///
    /// A [`PlaybackError::Blocked`] start is retried exactly once, after
    /// asking the backend to resume the output environment.  On success the
    /// lip-sync tick task is already running when this returns.
    ///
    /// # Errors
    ///
    /// Decode failures and unrecoverable device failures are returned to the
    /// caller; nothing is left playing in that case.
    pub fn play(&self, payload: &EncodedAudioPayload) -> Result<PlaybackHandle, PlaybackError> {
        let audio = payload.decode()?;
        log::debug!(
            "reply decoded: {} samples at {} Hz ({:?})",
            audio.samples.len(),
            audio.sample_rate,
            audio.duration()
        );

        let tap = SignalTap::new(self.window_len);
        let state = Arc::new(Mutex::new(PlaybackState::Loading));

        let voice = match self.backend.start(audio.clone(), tap.clone()) {
            Ok(v) => v,
            Err(PlaybackError::Blocked) => {
                log::warn!("output blocked; resuming output context and retrying once");
                self.backend.resume_output()?;
                match self.backend.start(audio, tap.clone()) {
                    Ok(v) => v,
                    Err(e) => {
                        set_state(&state, PlaybackState::Errored);
                        return Err(e);
                    }
                }
            }
            Err(e) => {
                set_state(&state, PlaybackState::Errored);
                return Err(e);
            }
        };

        set_state(&state, PlaybackState::Playing);

        let stop = Arc::new(Notify::new());
        let (done_tx, done_rx) = oneshot::channel();

        tokio::spawn(tick_task(
            voice,
            AmplitudeAnalyzer::new(tap),
            Arc::clone(&self.renderer),
            self.tick_interval,
            Arc::clone(&stop),
            Arc::clone(&state),
            done_tx,
        ));

        Ok(PlaybackHandle { done_rx, stop, state })
    }
}

fn set_state(state: &Arc<Mutex<PlaybackState>>, value: PlaybackState) {
    if let Ok(mut s) = state.lock() {
        *s = value;
    }
}

// ---------------------------------------------------------------------------
// Tick task
// ---------------------------------------------------------------------------

/// Drive lip-sync at a fixed wall-clock interval until the voice finishes or
/// a stop arrives.  On every exit path the voice is stopped and the mouth is
/// closed.
async fn tick_task(
    mut voice: Box<dyn OutputVoice>,
    analyzer: AmplitudeAnalyzer,
    renderer: Arc<dyn AvatarRenderer>,
    tick_interval: Duration,
    stop: Arc<Notify>,
    state: Arc<Mutex<PlaybackState>>,
    done_tx: oneshot::Sender<PlaybackOutcome>,
) {
    let mut interval = tokio::time::interval(tick_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let mut done_tx = Some(done_tx);
    let outcome = loop {
        tokio::select! {
            () = stop.notified() => break PlaybackOutcome::Stopped,
            _ = interval.tick() => {
                if voice.is_finished() {
                    break PlaybackOutcome::Completed;
                }
                renderer.update_lip_value(analyzer.sample().value());
            }
        }
    };

    voice.stop();
    renderer.update_lip_value(0.0);
    set_state(&state, PlaybackState::Ended);

    if let Some(tx) = done_tx.take() {
        let _ = tx.send(outcome);
    }
    log::debug!("playback finished: {outcome:?}");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::synthesize_wav;
    use crate::avatar::Expression;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    // ---- Doubles -----------------------------------------------------------

    /// Voice that reports finished after a fixed number of polls.
    struct CountdownVoice {
        polls_left: AtomicUsize,
        stopped: Arc<AtomicBool>,
        stop_calls: Arc<AtomicUsize>,
    }

    impl OutputVoice for CountdownVoice {
        fn is_finished(&self) -> bool {
            if self.polls_left.load(Ordering::SeqCst) == 0 {
                return true;
            }
            self.polls_left.fetch_sub(1, Ordering::SeqCst);
            false
        }

        fn stop(&mut self) {
            self.stopped.store(true, Ordering::SeqCst);
            self.stop_calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Backend with a scripted sequence of start results.
    struct ScriptedOutput {
        script: Mutex<VecDeque<Result<usize, PlaybackError>>>,
        start_calls: AtomicUsize,
        resume_calls: AtomicUsize,
        voice_stopped: Arc<AtomicBool>,
        voice_stop_calls: Arc<AtomicUsize>,
    }

    impl ScriptedOutput {
        fn new(script: Vec<Result<usize, PlaybackError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                start_calls: AtomicUsize::new(0),
                resume_calls: AtomicUsize::new(0),
                voice_stopped: Arc::new(AtomicBool::new(false)),
                voice_stop_calls: Arc::new(AtomicUsize::new(0)),
            })
        }
    }

    impl OutputBackend for ScriptedOutput {
        fn start(
            &self,
            _audio: PcmAudio,
            tap: SignalTap,
        ) -> Result<Box<dyn OutputVoice>, PlaybackError> {
            self.start_calls.fetch_add(1, Ordering::SeqCst);
            tap.push(&[255u8; 64]); // pretend samples are flowing
            let next = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(PlaybackError::DeviceUnavailable));
            next.map(|polls| {
                Box::new(CountdownVoice {
                    polls_left: AtomicUsize::new(polls),
                    stopped: Arc::clone(&self.voice_stopped),
                    stop_calls: Arc::clone(&self.voice_stop_calls),
                }) as Box<dyn OutputVoice>
            })
        }

        fn resume_output(&self) -> Result<(), PlaybackError> {
            self.resume_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Renderer that records every lip value it receives.
    struct RecordingRenderer {
        lips: Mutex<Vec<f32>>,
    }

    impl RecordingRenderer {
        fn new() -> Arc<Self> {
            Arc::new(Self { lips: Mutex::new(Vec::new()) })
        }
    }

    impl AvatarRenderer for RecordingRenderer {
        fn set_expression(&self, _expression: Expression) {}
        fn update_lip_value(&self, amplitude: f32) {
            self.lips.lock().unwrap().push(amplitude);
        }
    }

    fn payload() -> EncodedAudioPayload {
        EncodedAudioPayload::raw_pcm16(vec![0u8; 64], 24_000)
    }

    fn orchestrator(
        backend: Arc<ScriptedOutput>,
        renderer: Arc<RecordingRenderer>,
    ) -> PlaybackOrchestrator {
        PlaybackOrchestrator::new(backend, renderer, 1, 256)
    }

    // ---- Decode ------------------------------------------------------------

    #[test]
    fn raw_pcm_decodes_at_declared_rate() {
        let payload = EncodedAudioPayload::raw_pcm16(vec![0, 0, 0, 64], 24_000);
        let audio = payload.decode().unwrap();
        assert_eq!(audio.sample_rate, 24_000);
        assert_eq!(audio.samples.len(), 2);
        assert_eq!(audio.samples[0], 0.0);
        assert!(audio.samples[1] > 0.49 && audio.samples[1] < 0.51);
    }

    #[test]
    fn wav_payload_uses_container_rate() {
        let wav = synthesize_wav(&[0u8; 8], 16_000).unwrap();
        let mut payload = EncodedAudioPayload::raw_pcm16(wav, 24_000);
        payload.mime_type = "audio/wav".into();
        let audio = payload.decode().unwrap();
        assert_eq!(audio.sample_rate, 16_000);
        assert_eq!(audio.samples.len(), 4);
    }

    #[test]
    fn odd_length_raw_payload_is_rejected() {
        let payload = EncodedAudioPayload::raw_pcm16(vec![1, 2, 3], 24_000);
        assert!(matches!(payload.decode(), Err(PlaybackError::Decode(_))));
    }

    // ---- Playback lifecycle ------------------------------------------------

    #[tokio::test]
    async fn completes_and_closes_the_mouth() {
        let backend = ScriptedOutput::new(vec![Ok(3)]);
        let renderer = RecordingRenderer::new();
        let orch = orchestrator(Arc::clone(&backend), Arc::clone(&renderer));

        let handle = orch.play(&payload()).unwrap();
        assert_eq!(handle.state(), PlaybackState::Playing);

        let outcome = handle.wait().await;
        assert_eq!(outcome, PlaybackOutcome::Completed);
        assert!(backend.voice_stopped.load(Ordering::SeqCst));

        let lips = renderer.lips.lock().unwrap();
        assert!(!lips.is_empty());
        assert_eq!(*lips.last().unwrap(), 0.0);
        // Mid-playback ticks saw a loud signal.
        assert!(lips[..lips.len() - 1].iter().any(|&v| v > 0.9));
    }

    #[tokio::test]
    async fn stop_cuts_playback_short() {
        // A voice that would poll "unfinished" effectively forever.
        let backend = ScriptedOutput::new(vec![Ok(usize::MAX)]);
        let renderer = RecordingRenderer::new();
        let orch = orchestrator(Arc::clone(&backend), Arc::clone(&renderer));

        let handle = orch.play(&payload()).unwrap();
        handle.stop();
        handle.stop(); // idempotent

        let outcome = handle.wait().await;
        assert_eq!(outcome, PlaybackOutcome::Stopped);
        assert!(backend.voice_stopped.load(Ordering::SeqCst));
        assert_eq!(*renderer.lips.lock().unwrap().last().unwrap(), 0.0);
    }

    #[tokio::test]
    async fn voice_is_stopped_exactly_once_per_utterance() {
        let backend = ScriptedOutput::new(vec![Ok(2)]);
        let renderer = RecordingRenderer::new();
        let orch = orchestrator(Arc::clone(&backend), Arc::clone(&renderer));

        let handle = orch.play(&payload()).unwrap();
        handle.wait().await;

        assert_eq!(backend.voice_stop_calls.load(Ordering::SeqCst), 1);
    }

    // ---- Blocked retry -----------------------------------------------------

    #[tokio::test]
    async fn blocked_start_resumes_and_retries_once() {
        let backend = ScriptedOutput::new(vec![Err(PlaybackError::Blocked), Ok(1)]);
        let renderer = RecordingRenderer::new();
        let orch = orchestrator(Arc::clone(&backend), renderer);

        let handle = orch.play(&payload()).unwrap();
        assert_eq!(backend.start_calls.load(Ordering::SeqCst), 2);
        assert_eq!(backend.resume_calls.load(Ordering::SeqCst), 1);

        assert_eq!(handle.wait().await, PlaybackOutcome::Completed);
    }

    #[tokio::test]
    async fn blocked_twice_fails_without_a_third_attempt() {
        let backend = ScriptedOutput::new(vec![
            Err(PlaybackError::Blocked),
            Err(PlaybackError::Blocked),
        ]);
        let renderer = RecordingRenderer::new();
        let orch = orchestrator(Arc::clone(&backend), renderer);

        let err = orch.play(&payload()).unwrap_err();
        assert!(matches!(err, PlaybackError::Blocked));
        assert_eq!(backend.start_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn device_failure_surfaces_to_caller() {
        let backend = ScriptedOutput::new(vec![Err(PlaybackError::DeviceUnavailable)]);
        let renderer = RecordingRenderer::new();
        let orch = orchestrator(Arc::clone(&backend), renderer);

        let err = orch.play(&payload()).unwrap_err();
        assert!(matches!(err, PlaybackError::DeviceUnavailable));
        // No retry for non-Blocked failures.
        assert_eq!(backend.start_calls.load(Ordering::SeqCst), 1);
        assert_eq!(backend.resume_calls.load(Ordering::SeqCst), 0);
    }
}
