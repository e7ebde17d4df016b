//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// AudioConfig
// ---------------------------------------------------------------------------

/// Settings for microphone capture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Mono session sample rate in Hz.  The default matches the reply rate
    /// of the inference service, so no resampling happens on playback.
    pub sample_rate: u32,
    /// Chunk interval in milliseconds — how often the capture stream emits
    /// an encoded PCM chunk into the session.
    pub chunk_interval_ms: u32,
    /// Maximum recording length in seconds; the interaction loop stops
    /// longer recordings automatically, as if the user had released the
    /// button.
    pub max_recording_secs: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 24_000,
            chunk_interval_ms: 20,
            max_recording_secs: 60.0,
        }
    }
}

// ---------------------------------------------------------------------------
// LipSyncConfig
// ---------------------------------------------------------------------------

/// Settings for the amplitude-driven lip-sync ticks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LipSyncConfig {
    /// Tick interval in milliseconds — how often a lip value is pushed to
    /// the avatar while a stream is live.
    pub tick_interval_ms: u64,
    /// Analysis window length in magnitude bytes.  2048 bytes at 24 kHz is
    /// roughly 85 ms of signal.
    pub window_len: usize,
}

impl Default for LipSyncConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 50,
            window_len: 2_048,
        }
    }
}

// ---------------------------------------------------------------------------
// InferenceConfig
// ---------------------------------------------------------------------------

/// Settings for the inference service round trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// Base URL of the service; `/api/chat` is appended per request.
    pub base_url: String,
    /// API key — `None` for local deployments.
    pub api_key: Option<String>,
    /// Persona name sent as the `character` field with every request.
    pub persona: String,
    /// Maximum seconds to wait for a reply before timing out.
    pub timeout_secs: u64,
    /// Sample rate of the service's raw PCM reply audio.
    pub reply_sample_rate: u32,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".into(),
            api_key: None,
            persona: "kei".into(),
            timeout_secs: 30,
            reply_sample_rate: 24_000,
        }
    }
}

// ---------------------------------------------------------------------------
// TranscriptConfig
// ---------------------------------------------------------------------------

/// Settings for conversation persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptConfig {
    /// Append completed turns to the conversation history file.
    pub log_conversations: bool,
}

impl Default for TranscriptConfig {
    fn default() -> Self {
        Self {
            log_conversations: true,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use avatar_voice::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Microphone capture settings.
    pub audio: AudioConfig,
    /// Lip-sync tick settings.
    pub lipsync: LipSyncConfig,
    /// Inference service settings.
    pub inference: InferenceConfig,
    /// Conversation persistence settings.
    pub transcript: TranscriptConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet
    /// (first-run scenario) so callers never need to special-case a missing
    /// file.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    /// Verify that a default `AppConfig` can be serialised to TOML and
    /// deserialised back without any data loss.
    #[test]
    fn round_trip_toml() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");

        let original = AppConfig::default();
        original.save_to(&path).expect("save");

        let loaded = AppConfig::load_from(&path).expect("load");

        // AudioConfig
        assert_eq!(original.audio.sample_rate, loaded.audio.sample_rate);
        assert_eq!(
            original.audio.chunk_interval_ms,
            loaded.audio.chunk_interval_ms
        );
        assert_eq!(
            original.audio.max_recording_secs,
            loaded.audio.max_recording_secs
        );

        // LipSyncConfig
        assert_eq!(
            original.lipsync.tick_interval_ms,
            loaded.lipsync.tick_interval_ms
        );
        assert_eq!(original.lipsync.window_len, loaded.lipsync.window_len);

        // InferenceConfig
        assert_eq!(original.inference.base_url, loaded.inference.base_url);
        assert_eq!(original.inference.api_key, loaded.inference.api_key);
        assert_eq!(original.inference.persona, loaded.inference.persona);
        assert_eq!(
            original.inference.timeout_secs,
            loaded.inference.timeout_secs
        );
        assert_eq!(
            original.inference.reply_sample_rate,
            loaded.inference.reply_sample_rate
        );

        // TranscriptConfig
        assert_eq!(
            original.transcript.log_conversations,
            loaded.transcript.log_conversations
        );
    }

    /// `load_from` on a non-existent path must return `Default` without error.
    #[test]
    fn load_missing_returns_default() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nonexistent.toml");

        let config = AppConfig::load_from(&path).expect("should not error");
        let default = AppConfig::default();

        assert_eq!(config.audio.sample_rate, default.audio.sample_rate);
        assert_eq!(config.inference.base_url, default.inference.base_url);
        assert_eq!(config.inference.persona, default.inference.persona);
    }

    /// Verify default values.
    #[test]
    fn default_values() {
        let cfg = AppConfig::default();

        assert_eq!(cfg.audio.sample_rate, 24_000);
        assert_eq!(cfg.audio.chunk_interval_ms, 20);
        assert_eq!(cfg.lipsync.tick_interval_ms, 50);
        assert_eq!(cfg.lipsync.window_len, 2_048);
        assert_eq!(cfg.inference.base_url, "http://localhost:8000");
        assert!(cfg.inference.api_key.is_none());
        assert_eq!(cfg.inference.persona, "kei");
        assert_eq!(cfg.inference.timeout_secs, 30);
        assert_eq!(cfg.inference.reply_sample_rate, 24_000);
        assert!(cfg.transcript.log_conversations);
    }

    /// Verify that modified non-default values survive a round trip.
    #[test]
    fn round_trip_modified_values() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("modified.toml");

        let mut cfg = AppConfig::default();
        cfg.audio.sample_rate = 16_000;
        cfg.lipsync.tick_interval_ms = 100;
        cfg.inference.base_url = "https://avatar.example.com".into();
        cfg.inference.api_key = Some("sk-test".into());
        cfg.inference.persona = "mika".into();
        cfg.transcript.log_conversations = false;

        cfg.save_to(&path).expect("save");
        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(loaded.audio.sample_rate, 16_000);
        assert_eq!(loaded.lipsync.tick_interval_ms, 100);
        assert_eq!(loaded.inference.base_url, "https://avatar.example.com");
        assert_eq!(loaded.inference.api_key, Some("sk-test".into()));
        assert_eq!(loaded.inference.persona, "mika");
        assert!(!loaded.transcript.log_conversations);
    }
}
