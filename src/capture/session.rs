//! Recording session bookkeeping.
//!
//! A [`RecordingSession`] is created when capture starts and exclusively owned
//! by the capture engine for its whole lifetime.  Encoded chunks are appended
//! in arrival order and never mutated afterwards; at stop time the session is
//! consumed exactly once into an immutable [`EncodedAudioBlob`].

use std::time::Instant;

use uuid::Uuid;

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Lifecycle of a recording session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created but not yet receiving chunks.
    Idle,
    /// The microphone stream is live; chunks are being appended.
    Active,
    /// Capture has ended; no further chunk can arrive.
    Stopped,
}

// ---------------------------------------------------------------------------
// RecordingSession
// ---------------------------------------------------------------------------

/// One microphone recording: ordered, append-only encoded chunks plus the
/// fixed capture parameters.
///
/// # Example
///
/// ```rust
/// use avatar_voice::capture::RecordingSession;
///
/// let mut session = RecordingSession::begin(24_000);
/// session.append_chunk(vec![1, 2, 3]);
/// session.append_chunk(vec![4, 5]);
/// session.finish();
///
/// let blob = session.into_blob("audio/pcm;rate=24000").unwrap();
/// assert_eq!(blob.bytes(), &[1, 2, 3, 4, 5]);
/// ```
pub struct RecordingSession {
    id: Uuid,
    started_at: Instant,
    sample_rate: u32,
    channel_count: u16,
    chunks: Vec<Vec<u8>>,
    state: SessionState,
}

impl RecordingSession {
    /// Create a session in `Active` state at the given fixed sample rate.
    ///
    /// Capture is always mono.
    pub fn begin(sample_rate: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Instant::now(),
            sample_rate,
            channel_count: 1,
            chunks: Vec::new(),
            state: SessionState::Active,
        }
    }

    /// Append one encoded chunk.
    ///
    /// Chunks arriving after [`finish`](Self::finish) are discarded — the
    /// blob must only reflect what arrived while the session was active.
    pub fn append_chunk(&mut self, chunk: Vec<u8>) {
        if self.state != SessionState::Active {
            log::warn!(
                "session {}: dropping {}-byte chunk appended after stop",
                self.id,
                chunk.len()
            );
            return;
        }
        self.chunks.push(chunk);
    }

    /// Mark the session stopped; no further chunks will be accepted.
    pub fn finish(&mut self) {
        self.state = SessionState::Stopped;
    }

    /// Consume the session into an immutable blob, concatenating all chunks
    /// in append order.
    ///
    /// Returns `None` when no chunks were captured (e.g. stop immediately
    /// after start) — the caller treats this as "nothing to send", not an
    /// error.
    pub fn into_blob(self, mime_type: &str) -> Option<EncodedAudioBlob> {
        if self.chunks.is_empty() {
            return None;
        }

        let total: usize = self.chunks.iter().map(Vec::len).sum();
        let mut bytes = Vec::with_capacity(total);
        for chunk in &self.chunks {
            bytes.extend_from_slice(chunk);
        }

        Some(EncodedAudioBlob {
            bytes,
            mime_type: mime_type.to_string(),
            sample_rate: self.sample_rate,
        })
    }

    /// Unique id of this session.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Fixed capture sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Always 1 — capture is mono.
    pub fn channel_count(&self) -> u16 {
        self.channel_count
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Number of chunks appended so far.
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Seconds elapsed since the session began.
    pub fn elapsed_secs(&self) -> f32 {
        self.started_at.elapsed().as_secs_f32()
    }
}

// ---------------------------------------------------------------------------
// EncodedAudioBlob
// ---------------------------------------------------------------------------

/// Immutable concatenation of a session's chunks, tagged with its container
/// type.  Produced exactly once per session, at stop time.
#[derive(Debug, Clone)]
pub struct EncodedAudioBlob {
    bytes: Vec<u8>,
    mime_type: String,
    sample_rate: u32,
}

impl EncodedAudioBlob {
    /// The raw encoded bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Declared MIME / container type (e.g. `audio/pcm;rate=24000`).
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Sample rate the blob was captured at.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Total size in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns `true` when the blob carries no audio.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Consume the blob, yielding its bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
