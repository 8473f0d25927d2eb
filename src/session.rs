//! Session state record for crash/reload recovery.
//!
//! On every display update the viewer writes a small JSON record of where the
//! reader is. It is read back on the next start for inspection and recovery
//! tooling; nothing auto-resumes from it. Persistence failures are logged
//! and swallowed — losing the record must never affect the reading session.

use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Filename of the session record within the viewer cache dir.
const SESSION_FILENAME: &str = "reader-session.json";

/// Where the reader was, at `timestamp` (unix seconds).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionState {
    pub edition: String,
    pub volume: String,
    pub page_index: usize,
    pub timestamp: u64,
}

impl SessionState {
    pub fn now(edition: &str, volume: u32, page_index: usize) -> Self {
        Self {
            edition: edition.to_string(),
            volume: volume.to_string(),
            page_index,
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
        }
    }
}

/// Persist the record. Failures are logged, never propagated.
pub fn save(cache_dir: &Path, state: &SessionState) {
    if let Err(e) = try_save(cache_dir, state) {
        log::warn!("failed to save session state: {e}");
    }
}

fn try_save(cache_dir: &Path, state: &SessionState) -> Result<(), Box<dyn std::error::Error>> {
    fs::create_dir_all(cache_dir)?;
    let json = serde_json::to_string(state)?;
    fs::write(cache_dir.join(SESSION_FILENAME), json)?;
    Ok(())
}

/// Read the last record, if one exists and parses.
pub fn load(cache_dir: &Path) -> Option<SessionState> {
    let content = fs::read_to_string(cache_dir.join(SESSION_FILENAME)).ok()?;
    serde_json::from_str(&content).ok()
}
