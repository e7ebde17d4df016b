//! Application entry point — avatar voice console front door.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (returns default on first run).
//! 3. Create [`tokio`] runtime (multi-thread, 2 workers).
//! 4. Wire the interaction machine: cpal capture + playback backends, the
//!    HTTP inference client, a logging avatar renderer, the console
//!    transcript, and the JSON conversation log.
//! 5. Spawn the machine's event loop on the tokio runtime.
//! 6. Read stdin on the main thread — Enter toggles recording, `q` quits.

use std::io::BufRead;
use std::sync::Arc;

use tokio::sync::mpsc;

use avatar_voice::{
    avatar::LogRenderer,
    capture::{AudioCaptureEngine, CpalCaptureBackend, StreamSpec},
    config::{AppConfig, AppPaths},
    inference::HttpInferenceClient,
    interaction::{
        new_shared_turn_state, InteractionEvent, InteractionState, InteractionStateMachine,
        TurnSettings,
    },
    playback::{CpalOutputBackend, PlaybackOrchestrator},
    transcript::{ConsoleTranscript, ConversationLog, Role, TranscriptSink},
};

fn main() -> anyhow::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("avatar voice starting up");

    // 2. Configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("failed to load config ({e}); using defaults");
        AppConfig::default()
    });

    // 3. Tokio runtime (2 worker threads — the turn loop plus lip-sync ticks)
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("failed to create tokio runtime");

    // 4. Collaborators
    let state = new_shared_turn_state();
    let renderer: Arc<dyn avatar_voice::avatar::AvatarRenderer> = Arc::new(LogRenderer);
    let transcript: Arc<dyn TranscriptSink> = Arc::new(ConsoleTranscript);

    let capture = AudioCaptureEngine::new(
        Box::new(CpalCaptureBackend),
        StreamSpec {
            sample_rate: config.audio.sample_rate,
            chunk_interval_ms: u64::from(config.audio.chunk_interval_ms),
        },
        config.lipsync.window_len,
    );

    let playback = PlaybackOrchestrator::new(
        Arc::new(CpalOutputBackend),
        Arc::clone(&renderer),
        config.lipsync.tick_interval_ms,
        config.lipsync.window_len,
    );

    let inference = Arc::new(HttpInferenceClient::from_config(&config.inference));

    let conversation_log = if config.transcript.log_conversations {
        let path = AppPaths::new().conversations_file;
        log::info!("conversation history: {}", path.display());
        Some(ConversationLog::new(path))
    } else {
        None
    };

    let machine = InteractionStateMachine::new(
        Arc::clone(&state),
        capture,
        playback,
        inference,
        renderer,
        Arc::clone(&transcript),
        conversation_log,
        TurnSettings {
            persona: config.inference.persona.clone(),
            reply_sample_rate: config.inference.reply_sample_rate,
            lipsync_tick_ms: config.lipsync.tick_interval_ms,
            max_recording_secs: config.audio.max_recording_secs,
        },
    );

    // 5. Spawn the turn loop
    let (events_tx, events_rx) = mpsc::channel::<InteractionEvent>(16);
    rt.spawn(machine.run(events_rx));

    // 6. Console front door
    transcript.record_turn(
        Role::System,
        &format!(
            "talking to '{}' at {} — press Enter to start/stop recording, q to quit",
            config.inference.persona, config.inference.base_url
        ),
    );

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().eq_ignore_ascii_case("q") {
            break;
        }

        // Toggle on the machine's actual phase, so a rejected start or a
        // finished turn never desyncs the console.
        let event = if state.lock().unwrap().interaction == InteractionState::Recording {
            InteractionEvent::StopRecording
        } else {
            InteractionEvent::StartRecording
        };

        if rt.block_on(events_tx.send(event)).is_err() {
            log::error!("interaction loop is gone, exiting");
            break;
        }
    }

    drop(events_tx); // closes the loop; in-flight turn finishes first
    log::info!("avatar voice shutting down");
    Ok(())
}
