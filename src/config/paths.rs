//! Cross-platform application paths using the `dirs` crate.
//!
//! Layout:
//!
//! Config dir (settings):
//!   Windows: %APPDATA%\avatar-voice\
//!   macOS:   ~/Library/Application Support/avatar-voice/
//!   Linux:   ~/.config/avatar-voice/
//!
//! Data dir (conversation history):
//!   Windows: %LOCALAPPDATA%\avatar-voice\
//!   macOS:   ~/Library/Application Support/avatar-voice/
//!   Linux:   ~/.local/share/avatar-voice/

use std::path::PathBuf;

/// Holds all resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory for `settings.toml`.
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
    /// Full path to the persisted conversation history.
    pub conversations_file: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "avatar-voice";

    /// Resolves all paths using the `dirs` crate.
    ///
    /// Falls back to the current directory if the platform cannot provide a
    /// standard path (should be extremely rare in practice).
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let settings_file = config_dir.join("settings.toml");
        let conversations_file = data_dir.join("conversations.json");

        Self {
            config_dir,
            settings_file,
            conversations_file,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_non_empty() {
        let paths = AppPaths::new();
        assert!(paths.config_dir.to_str().is_some_and(|s| !s.is_empty()));
        assert!(paths
            .settings_file
            .file_name()
            .is_some_and(|n| n == "settings.toml"));
        assert!(paths
            .conversations_file
            .file_name()
            .is_some_and(|n| n == "conversations.json"));
    }
}
