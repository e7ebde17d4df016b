//! Inference service client — ships a finished recording, gets back the
//! reply.
//!
//! `HttpInferenceClient` posts the recording as multipart form data to the
//! service's `/api/chat` endpoint and parses the JSON reply: recognized user
//! text, the assistant's reply text, and base64-encoded reply PCM.  All
//! connection details come from [`InferenceConfig`]; nothing is hardcoded.

use async_trait::async_trait;
use base64::Engine;
use thiserror::Error;

use crate::audio::synthesize_wav;
use crate::capture::EncodedAudioBlob;
use crate::config::InferenceConfig;

// ---------------------------------------------------------------------------
// InferenceError
// ---------------------------------------------------------------------------

/// Errors that can occur during an inference round trip.
#[derive(Debug, Error)]
pub enum InferenceError {
    /// The recording could not be packaged for upload.
    #[error("failed to package recording: {0}")]
    Encode(String),

    /// HTTP transport or connection error.
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout.
    #[error("inference request timed out")]
    Timeout,

    /// The service answered with a non-success status.
    #[error("inference service returned HTTP {0}")]
    Server(u16),

    /// The HTTP response could not be parsed as expected JSON.
    #[error("failed to parse inference reply: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for InferenceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            InferenceError::Timeout
        } else {
            InferenceError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// InferenceReply
// ---------------------------------------------------------------------------

/// A parsed reply from the inference service.
///
/// Every field is optional on the wire; a reply with no audio still carries
/// its texts to the transcript.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceReply {
    /// What the service heard the user say.
    pub user_text: Option<String>,
    /// The assistant's reply text.
    pub ai_text: Option<String>,
    /// Decoded reply audio: raw mono PCM16 at the service's reply rate.
    pub audio: Option<Vec<u8>>,
}

/// Wire shape of the `/api/chat` JSON body.  `audio` is base64.
#[derive(serde::Deserialize)]
struct WireReply {
    user_text: Option<String>,
    ai_text: Option<String>,
    audio: Option<String>,
}

/// Parse a reply body, decoding the base64 audio payload.
fn parse_reply(body: &str) -> Result<InferenceReply, InferenceError> {
    let wire: WireReply =
        serde_json::from_str(body).map_err(|e| InferenceError::Parse(e.to_string()))?;

    let audio = match wire.audio {
        Some(b64) if !b64.is_empty() => Some(
            base64::engine::general_purpose::STANDARD
                .decode(b64.as_bytes())
                .map_err(|e| InferenceError::Parse(format!("invalid base64 audio: {e}")))?,
        ),
        _ => None,
    };

    Ok(InferenceReply {
        user_text: wire.user_text,
        ai_text: wire.ai_text,
        audio,
    })
}

// ---------------------------------------------------------------------------
// InferenceClient trait
// ---------------------------------------------------------------------------

/// Async trait for the inference round trip.
///
/// Implementors must be `Send + Sync` so they can be shared across tasks
/// (e.g. wrapped in `Arc<dyn InferenceClient>`).
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Send a finished recording and the active persona, await the reply.
    async fn infer(
        &self,
        blob: &EncodedAudioBlob,
        persona: &str,
    ) -> Result<InferenceReply, InferenceError>;
}

// ---------------------------------------------------------------------------
// HttpInferenceClient
// ---------------------------------------------------------------------------

/// Calls the inference service over HTTP multipart.
///
/// The recording goes up as a `audio.wav` file part (the raw session PCM
/// wrapped in a RIFF/WAVE container) next to a `character` text field naming
/// the persona.
pub struct HttpInferenceClient {
    client: reqwest::Client,
    config: InferenceConfig,
}

impl HttpInferenceClient {
    /// Build a client from application config.
    ///
    /// The HTTP client is pre-configured with the per-request timeout from
    /// `config.timeout_secs`.  A default (no-timeout) client is used as a
    /// last-resort fallback if the builder fails (should never happen in
    /// practice).
    pub fn from_config(config: &InferenceConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
        }
    }
}

#[async_trait]
impl InferenceClient for HttpInferenceClient {
    /// Upload `blob` to the configured `/api/chat` endpoint.
    ///
    /// The `Authorization: Bearer …` header is attached **only** when
    /// `config.api_key` is `Some(key)` and `key` is non-empty — safe for
    /// local deployments that require no authentication.
    async fn infer(
        &self,
        blob: &EncodedAudioBlob,
        persona: &str,
    ) -> Result<InferenceReply, InferenceError> {
        let wav = synthesize_wav(blob.bytes(), blob.sample_rate())
            .map_err(|e| InferenceError::Encode(e.to_string()))?;

        let form = reqwest::multipart::Form::new()
            .part(
                "audio",
                reqwest::multipart::Part::bytes(wav)
                    .file_name("audio.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| InferenceError::Encode(e.to_string()))?,
            )
            .text("character", persona.to_string());

        let url = format!("{}/api/chat", self.config.base_url);
        let mut req = self.client.post(&url).multipart(form);

        // Attach Authorization header only when api_key is a non-empty string.
        let key = self.config.api_key.as_deref().unwrap_or("");
        if !key.is_empty() {
            req = req.bearer_auth(key);
        }

        let response = req.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(InferenceError::Server(status.as_u16()));
        }

        let body = response.text().await?;
        parse_reply(&body)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
