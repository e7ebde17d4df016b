//! Microphone capture via `cpal`.
//!
//! The cpal input stream is not `Send` on every platform, so it lives on a
//! dedicated `mic-capture` thread for its whole lifetime.  The thread owns
//! the stream, downmixes and resamples the raw callback buffers to the mono
//! session rate, feeds the lip-sync tap, and emits one encoded PCM16 chunk
//! per chunk interval.  Closing the stream handle signals the thread, which
//! flushes the final partial chunk, drops the stream (releasing the device)
//! and exits.

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use crate::audio::{downmix_to_mono, f32_to_pcm16, resample, SignalTap};

use super::backend::{CaptureBackend, CaptureError, CaptureStream, StreamSpec};

// ---------------------------------------------------------------------------
// CpalCaptureBackend
// ---------------------------------------------------------------------------

/// Production [`CaptureBackend`] using the system default input device.
pub struct CpalCaptureBackend;

impl CaptureBackend for CpalCaptureBackend {
    fn open(
        &self,
        spec: StreamSpec,
        chunks: mpsc::Sender<Vec<u8>>,
        tap: SignalTap,
    ) -> Result<Box<dyn CaptureStream>, CaptureError> {
        let (setup_tx, setup_rx) = mpsc::channel::<Result<(), CaptureError>>();
        let (close_tx, close_rx) = mpsc::channel::<()>();

        let join = thread::Builder::new()
            .name("mic-capture".into())
            .spawn(move || capture_thread(spec, chunks, tap, &setup_tx, &close_rx))
            .map_err(|e| CaptureError::UnsupportedEnvironment(e.to_string()))?;

        // The thread reports stream setup success or the mapped cpal error
        // before it enters its encode loop.
        match setup_rx.recv() {
            Ok(Ok(())) => Ok(Box::new(CpalCaptureStream {
                close_tx: Some(close_tx),
                join: Some(join),
            })),
            Ok(Err(e)) => {
                let _ = join.join();
                Err(e)
            }
            Err(_) => {
                let _ = join.join();
                Err(CaptureError::UnsupportedEnvironment(
                    "capture thread exited during setup".into(),
                ))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// CpalCaptureStream
// ---------------------------------------------------------------------------

/// Handle to the live `mic-capture` thread.
///
/// `close` is idempotent; dropping the handle also closes, so the device is
/// released on every exit path.
struct CpalCaptureStream {
    close_tx: Option<mpsc::Sender<()>>,
    join: Option<thread::JoinHandle<()>>,
}

impl CaptureStream for CpalCaptureStream {
    fn close(&mut self) {
        if let Some(tx) = self.close_tx.take() {
            let _ = tx.send(());
        }
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                log::error!("mic-capture thread panicked");
            }
        }
    }
}

impl Drop for CpalCaptureStream {
    fn drop(&mut self) {
        self.close();
    }
}

// ---------------------------------------------------------------------------
// Capture thread
// ---------------------------------------------------------------------------

/// Map cpal's build-time errors onto the capture taxonomy.
///
/// OS-level microphone denial surfaces from cpal as a backend-specific
/// error, not a dedicated variant.
fn map_build_error(e: &cpal::BuildStreamError) -> CaptureError {
    match e {
        cpal::BuildStreamError::DeviceNotAvailable => CaptureError::DeviceUnavailable,
        cpal::BuildStreamError::StreamConfigNotSupported => {
            CaptureError::UnsupportedEnvironment(e.to_string())
        }
        _ => CaptureError::PermissionDenied,
    }
}

fn capture_thread(
    spec: StreamSpec,
    chunks: mpsc::Sender<Vec<u8>>,
    tap: SignalTap,
    setup_tx: &mpsc::Sender<Result<(), CaptureError>>,
    close_rx: &mpsc::Receiver<()>,
) {
    let host = cpal::default_host();
    let Some(device) = host.default_input_device() else {
        let _ = setup_tx.send(Err(CaptureError::DeviceUnavailable));
        return;
    };

    let supported = match device.default_input_config() {
        Ok(s) => s,
        Err(e) => {
            let mapped = match e {
                cpal::DefaultStreamConfigError::DeviceNotAvailable => {
                    CaptureError::DeviceUnavailable
                }
                cpal::DefaultStreamConfigError::StreamTypeNotSupported => {
                    CaptureError::UnsupportedEnvironment(e.to_string())
                }
                cpal::DefaultStreamConfigError::BackendSpecific { .. } => {
                    CaptureError::PermissionDenied
                }
            };
            let _ = setup_tx.send(Err(mapped));
            return;
        }
    };

    let device_channels = supported.channels();
    let device_rate = supported.sample_rate().0;
    let config: cpal::StreamConfig = supported.into();

    let (raw_tx, raw_rx) = mpsc::channel::<Vec<f32>>();

    let stream = match device.build_input_stream(
        &config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            // Keep the audio callback trivial: hand the buffer off and return.
            let _ = raw_tx.send(data.to_vec());
        },
        |err: cpal::StreamError| {
            log::error!("cpal input stream error: {err}");
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
            cpal::PlayStreamError::DeviceNotAvailable => CaptureError::DeviceUnavailable,
            cpal::PlayStreamError::BackendSpecific { .. } => CaptureError::PermissionDenied,
        };
        let _ = setup_tx.send(Err(mapped));
        return;
    }

    log::info!(
        "microphone open: {} Hz {} ch → {} Hz mono, {} ms chunks",
        device_rate,
        device_channels,
        spec.sample_rate,
        spec.chunk_interval_ms
    );
    let _ = setup_tx.send(Ok(()));

    let samples_per_chunk = spec.samples_per_chunk();
    let mut pending: Vec<f32> = Vec::with_capacity(samples_per_chunk * 2);

    loop {
        match raw_rx.recv_timeout(Duration::from_millis(10)) {
            Ok(raw) => {
                let mono = downmix_to_mono(&raw, device_channels);
                let session_rate = resample(&mono, device_rate, spec.sample_rate);

                tap.push_samples(&session_rate);
                pending.extend_from_slice(&session_rate);

                while pending.len() >= samples_per_chunk {
                    let chunk: Vec<f32> = pending.drain(..samples_per_chunk).collect();
                    if chunks.send(f32_to_pcm16(&chunk)).is_err() {
                        // Receiver gone — nothing left to deliver to.
                        drop(stream);
                        return;
                    }
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }

        if close_rx.try_recv().is_ok() {
            break;
        }
    }

    // Flush whatever arrived since the last chunk boundary so an abrupt stop
    // loses at most the samples still inside the hardware buffer.
    if !pending.is_empty() {
        let _ = chunks.send(f32_to_pcm16(&pending));
    }

    drop(stream);
    log::debug!("mic-capture thread exited, device released");
}
