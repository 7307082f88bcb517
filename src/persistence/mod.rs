//! State Persistence Module
//!
//! Keeps the two decision timestamps in a small JSON file between runs.
//! Reads tolerate a missing or corrupt file; writes never fail the caller.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

/// Timestamps (ms since epoch) carried from one cycle to the next
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotState {
    #[serde(default)]
    pub last_full_update_timestamp: i64,
    #[serde(default)]
    pub last_version_report_timestamp: i64,
}

/// JSON file holding [`BotState`]
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Stored state, or the zero state when the file is absent or unreadable
    pub fn load(&self) -> BotState {
        if !self.path.exists() {
            info!(path = %self.path.display(), "No saved state, starting fresh");
            return BotState::default();
        }

        match self.read() {
            Ok(state) => {
                debug!(path = %self.path.display(), ?state, "Loaded state");
                state
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Saved state is unreadable, starting fresh");
                BotState::default()
            }
        }
    }

    /// Write the state. Failures are logged and swallowed.
    pub fn save(&self, state: &BotState) {
        if let Err(e) = self.write(state) {
            error!(path = %self.path.display(), error = %e, "Failed to save state");
        }
    }

    fn read(&self) -> Result<BotState> {
        let raw = fs::read_to_string(&self.path).context("Failed to read state file")?;
        serde_json::from_str(&raw).context("Failed to parse state file")
    }

    fn write(&self, state: &BotState) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).context("Failed to create state directory")?;
        }
        let json = serde_json::to_string_pretty(state)?;
        fs::write(&self.path, json).context("Failed to write state file")?;
        Ok(())
    }
}
