//! Channel membership persistence
//!
//! The set of channels the user has joined survives restarts. It is stored
//! as `channels.json` in the platform config directory, alongside any other
//! client state. Loading is best-effort: a missing, unreadable, or corrupt
//! file yields an empty set so startup never fails on bad state.

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;

use crate::constants::{APP_DIR_NAME, CHANNELS_FILE_NAME};

/// Persistent membership file structure
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
struct ChannelsFile {
    /// Names of channels the user is subscribed to
    channels: Vec<String>,
}

/// Persists the set of subscribed channel names
///
/// The store is write-through: the session saves on every subscription
/// toggle, so the file always reflects the live subscribed set.
#[derive(Debug, Clone)]
pub struct MembershipStore {
    /// Resolved file path, or None if no config directory exists
    path: Option<PathBuf>,
}

impl MembershipStore {
    /// Create a store at the platform-specific default path
    pub fn new() -> Self {
        Self {
            path: Self::default_path(),
        }
    }

    /// Create a store at an explicit path (used by tests)
    pub fn with_path(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    /// Get the platform-specific membership file path
    ///
    /// Returns None if the config directory cannot be determined.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR_NAME).join(CHANNELS_FILE_NAME))
    }

    /// Load the subscribed set from disk, or return empty if not found
    ///
    /// Returns an empty set if:
    /// - Config directory cannot be determined
    /// - Membership file doesn't exist
    /// - Membership file cannot be read
    /// - Membership file contains invalid JSON
    pub fn load(&self) -> HashSet<String> {
        if let Some(path) = &self.path
            && path.exists()
            && let Ok(contents) = fs::read_to_string(path)
            && let Ok(file) = serde_json::from_str::<ChannelsFile>(&contents)
        {
            return file.channels.into_iter().collect();
        }

        HashSet::new()
    }

    /// Save the subscribed set to disk
    ///
    /// Creates the config directory if it doesn't exist. Writes to a
    /// temporary file in the same directory and renames it over the target,
    /// so a reader never observes a partial file. Names are sorted so the
    /// file contents are stable across saves.
    pub fn save(&self, channels: &HashSet<String>) -> Result<(), String> {
        let path = self
            .path
            .as_ref()
            .ok_or_else(|| "config directory unavailable".to_string())?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("failed to create config directory: {e}"))?;
        }

        let mut names: Vec<String> = channels.iter().cloned().collect();
        names.sort();
        let file = ChannelsFile { channels: names };

        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| format!("failed to serialize membership: {e}"))?;

        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, json).map_err(|e| format!("failed to write membership: {e}"))?;
        fs::rename(&tmp_path, path).map_err(|e| format!("failed to replace membership: {e}"))?;

        Ok(())
    }
}

impl Default for MembershipStore {
    fn default() -> Self {
        Self::new()
    }
}
