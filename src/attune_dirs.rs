//! Application directory paths for Attune.
//!
//! Uses the [`dirs`] crate for platform-appropriate resolution.
//!
//! | Purpose | macOS | Linux |
//! |---------|-------|-------|
//! | App data | `~/Library/Application Support/attune/` | `~/.local/share/attune/` |
//! | Config | `~/Library/Application Support/attune/` | `~/.config/attune/` |
//!
//! # Environment Overrides
//!
//! - `ATTUNE_DATA_DIR`: overrides [`data_dir`]
//! - `ATTUNE_CONFIG_DIR`: overrides [`config_dir`]

use std::path::PathBuf;

/// Application data root directory.
///
/// Holds the chat history database and in-flight audio artifacts.
#[must_use]
pub fn data_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("ATTUNE_DATA_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::data_dir()
        .map(|d| d.join("attune"))
        .unwrap_or_else(|| PathBuf::from("/tmp/attune-data"))
}

/// Application config directory.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("ATTUNE_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join("attune"))
        .unwrap_or_else(|| PathBuf::from("/tmp/attune-config"))
}

/// Main config file path (`config_dir()/config.toml`).
#[must_use]
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

/// Directory holding one recorded utterance per session (`data_dir()/artifacts/`).
#[must_use]
pub fn artifacts_dir() -> PathBuf {
    data_dir().join("artifacts")
}

/// Chat history database (`data_dir()/history.db`).
#[must_use]
pub fn history_db() -> PathBuf {
    data_dir().join("history.db")
}
