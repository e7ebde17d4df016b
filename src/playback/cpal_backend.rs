//! Speaker output via `cpal`.
//!
//! Mirrors the capture side: the output stream is not `Send` everywhere, so
//! it lives on a dedicated `speaker-playback` thread.  The thread owns the
//! stream; the audio callback walks a shared cursor through the decoded
//! samples, feeds the lip-sync tap with each sample's magnitude byte, and
//! flips a shared flag once the cursor passes the end.  Stopping the voice
//! signals the thread, which drops the stream and exits.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleRate;

use crate::audio::{magnitude_byte, SignalTap};

use super::backend::{OutputBackend, OutputVoice, PcmAudio, PlaybackError};

// ---------------------------------------------------------------------------
// CpalOutputBackend
// ---------------------------------------------------------------------------

/// Production [`OutputBackend`] using the system default output device.
pub struct CpalOutputBackend;

impl OutputBackend for CpalOutputBackend {
    fn start(
        &self,
        audio: PcmAudio,
        tap: SignalTap,
    ) -> Result<Box<dyn OutputVoice>, PlaybackError> {
        let finished = Arc::new(AtomicBool::new(false));
        let (setup_tx, setup_rx) = mpsc::channel::<Result<(), PlaybackError>>();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let thread_finished = Arc::clone(&finished);
        let join = thread::Builder::new()
            .name("speaker-playback".into())
            .spawn(move || playback_thread(audio, tap, thread_finished, &setup_tx, &stop_rx))
            .map_err(|e| PlaybackError::Stream(e.to_string()))?;

        match setup_rx.recv() {
            Ok(Ok(())) => Ok(Box::new(CpalOutputVoice {
                finished,
                stop_tx: Some(stop_tx),
                join: Some(join),
            })),
            Ok(Err(e)) => {
                let _ = join.join();
                Err(e)
            }
            Err(_) => {
                let _ = join.join();
                Err(PlaybackError::Stream(
                    "playback thread exited during setup".into(),
                ))
            }
        }
    }

    fn resume_output(&self) -> Result<(), PlaybackError> {
        // Native output has no autoplay gate; the next start attempt either
        // works or fails on its own terms.
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// CpalOutputVoice
// ---------------------------------------------------------------------------

/// Handle to the live `speaker-playback` thread.
///
/// `stop` is idempotent; dropping the handle also stops, so the device is
/// released on every exit path.
struct CpalOutputVoice {
    finished: Arc<AtomicBool>,
    stop_tx: Option<mpsc::Sender<()>>,
    join: Option<thread::JoinHandle<()>>,
}

impl OutputVoice for CpalOutputVoice {
    fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                log::error!("speaker-playback thread panicked");
            }
        }
    }
}

impl Drop for CpalOutputVoice {
    fn drop(&mut self) {
        self.stop();
    }
}

// ---------------------------------------------------------------------------
// Playback thread
// ---------------------------------------------------------------------------

fn map_build_error(e: &cpal::BuildStreamError) -> PlaybackError {
    match e {
        cpal::BuildStreamError::DeviceNotAvailable => PlaybackError::DeviceUnavailable,
        cpal::BuildStreamError::BackendSpecific { .. } => PlaybackError::Blocked,
        _ => PlaybackError::Stream(e.to_string()),
    }
}

/// Pick an output config matching the decoded sample rate, preferring mono.
fn pick_output_config(
    device: &cpal::Device,
    sample_rate: u32,
) -> Option<cpal::SupportedStreamConfig> {
    let matches_rate = |c: &cpal::SupportedStreamConfigRange| {
        c.min_sample_rate() <= SampleRate(sample_rate)
            && c.max_sample_rate() >= SampleRate(sample_rate)
    };

    let configs: Vec<_> = device.supported_output_configs().ok()?.collect();
    configs
        .iter()
        .find(|c| c.channels() == 1 && matches_rate(c))
        .or_else(|| configs.iter().find(|c| matches_rate(c)))
        .map(|c| c.clone().with_sample_rate(SampleRate(sample_rate)))
}

fn playback_thread(
    audio: PcmAudio,
    tap: SignalTap,
    finished: Arc<AtomicBool>,
    setup_tx: &mpsc::Sender<Result<(), PlaybackError>>,
    stop_rx: &mpsc::Receiver<()>,
) {
    let host = cpal::default_host();
    let Some(device) = host.default_output_device() else {
        let _ = setup_tx.send(Err(PlaybackError::DeviceUnavailable));
        return;
    };

    let Some(supported) = pick_output_config(&device, audio.sample_rate) else {
        let _ = setup_tx.send(Err(PlaybackError::Stream(format!(
            "no output config supports {} Hz",
            audio.sample_rate
        ))));
        return;
    };

    let config: cpal::StreamConfig = supported.into();
    let channels = config.channels as usize;

    let samples = Arc::new(audio.samples);
    let position = Arc::new(AtomicUsize::new(0));

    let cb_samples = Arc::clone(&samples);
    let cb_position = Arc::clone(&position);
    let cb_finished = Arc::clone(&finished);
    let cb_tap = tap;

    let stream = match device.build_output_stream(
        &config,
        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
            let mut pos = cb_position.load(Ordering::Relaxed);
            let mut magnitudes = Vec::with_capacity(data.len() / channels);

            for frame in data.chunks_mut(channels) {
                let sample = if pos < cb_samples.len() {
                    let s = cb_samples[pos];
                    pos += 1;
                    s
                } else {
                    cb_finished.store(true, Ordering::Release);
                    0.0
                };

                magnitudes.push(magnitude_byte(sample));
                for out in frame.iter_mut() {
                    *out = sample;
                }
            }

            cb_position.store(pos, Ordering::Relaxed);
            cb_tap.push(&magnitudes);
        },
        |err: cpal::StreamError| {
            log::error!("cpal output stream error: {err}");
        },
        None,
    ) {
        Ok(s) => s,
        Err(e) => {
            let _ = setup_tx.send(Err(map_build_error(&e)));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let mapped = match e {
            cpal::PlayStreamError::DeviceNotAvailable => PlaybackError::DeviceUnavailable,
            cpal::PlayStreamError::BackendSpecific { .. } => PlaybackError::Blocked,
        };
        let _ = setup_tx.send(Err(mapped));
        return;
    }

    log::info!(
        "speaker open: {} samples at {} Hz, {} ch",
        samples.len(),
        audio.sample_rate,
        channels
    );
    let _ = setup_tx.send(Ok(()));

    // Idle until stopped.  The orchestrator polls `is_finished` and stops the
    // voice itself once the cursor runs out, so there is no completion
    // deadline here.
    loop {
        match stop_rx.recv_timeout(Duration::from_millis(50)) {
            Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
            Err(mpsc::RecvTimeoutError::Timeout) => {}
        }
    }

    drop(stream);
    log::debug!("speaker-playback thread exited, device released");
}
