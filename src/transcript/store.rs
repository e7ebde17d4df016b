//! JSON conversation log.
//!
//! Every completed turn (user text + reply text) is appended to a
//! `conversations.json` file as `{timestamp, user_input, ai_response}`.
//! Logging is best-effort: a write failure is reported through `log` and
//! never interrupts the interaction flow.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ConversationEntry
// ---------------------------------------------------------------------------

/// One persisted conversation turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationEntry {
    /// When the turn completed (ISO-8601, UTC).
    pub timestamp: DateTime<Utc>,
    /// Recognized text of what the user said.
    pub user_input: String,
    /// The assistant's reply text.
    pub ai_response: String,
}

// ---------------------------------------------------------------------------
// ConversationLog
// ---------------------------------------------------------------------------

/// Append-only JSON conversation history.
///
/// The whole file is a single JSON array; a corrupt or unreadable file is
/// replaced rather than crashing the session.
///
/// # Example
///
/// ```rust,no_run
/// use avatar_voice::transcript::ConversationLog;
///
/// let log = ConversationLog::new("conversations.json");
/// log.append("hello", "hi there!");
/// ```
pub struct ConversationLog {
    path: PathBuf,
}

impl ConversationLog {
    /// Create a log backed by `path`.  The file is created on first append.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Append one completed turn.  Failures are logged, never returned.
    pub fn append(&self, user_input: &str, ai_response: &str) {
        let entry = ConversationEntry {
            timestamp: Utc::now(),
            user_input: user_input.to_string(),
            ai_response: ai_response.to_string(),
        };

        if let Err(e) = self.append_entry(&entry) {
            log::warn!(
                "failed to persist conversation turn to {}: {e}",
                self.path.display()
            );
        }
    }

    fn append_entry(&self, entry: &ConversationEntry) -> anyhow::Result<()> {
        let mut entries = self.read_all_or_empty();
        entries.push(entry.clone());

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(&entries)?;
        fs::write(&self.path, content)?;
        Ok(())
    }

    /// All persisted entries, oldest first.  Missing or corrupt files read
    /// as empty.
    pub fn read_all_or_empty(&self) -> Vec<ConversationEntry> {
        match fs::read_to_string(&self.path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                log::warn!(
                    "conversation log {} is corrupt ({e}); starting fresh",
                    self.path.display()
                );
                Vec::new()
            }),
            Err(_) => Vec::new(),
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
