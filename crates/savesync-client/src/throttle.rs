//! Throttle controller
//!
//! Limits how often start-of-session syncs run. The time of the last
//! attempted sync is loaded when the controller is created and persisted as
//! JSON after every attempt, so the window survives restarts.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use savesync_core::error::SaveSyncError;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::filesystem::atomic_write;

/// Why a sync is being attempted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncMode {
    /// Session start; subject to the throttle window
    Start,
    /// Session end; always runs, bounded by the quit timeout
    Quit,
    /// Explicit user request; always runs
    Force,
}

impl SyncMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncMode::Start => "start",
            SyncMode::Quit => "quit",
            SyncMode::Force => "force",
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ThrottleState {
    last_attempt: Option<DateTime<Utc>>,
}

/// Gates start-of-session syncs on elapsed time since the last attempt
#[derive(Debug)]
pub struct ThrottleController {
    state_file: PathBuf,
    interval: Duration,
    last_attempt: Option<DateTime<Utc>>,
}

impl ThrottleController {
    /// Loads the last attempt time from `state_file`
    ///
    /// A missing or unreadable state file means no attempt has been made.
    pub fn load(state_file: impl Into<PathBuf>, interval: Duration) -> Self {
        let state_file = state_file.into();
        let last_attempt = match std::fs::read_to_string(&state_file) {
            Ok(content) => match serde_json::from_str::<ThrottleState>(&content) {
                Ok(state) => state.last_attempt,
                Err(e) => {
                    warn!(path = %state_file.display(), error = %e, "Ignoring corrupt throttle state");
                    None
                }
            },
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %state_file.display(), error = %e, "Cannot read throttle state");
                }
                None
            }
        };

        debug!(?last_attempt, "Throttle state loaded");
        Self {
            state_file,
            interval,
            last_attempt,
        }
    }

    pub fn state_file(&self) -> &Path {
        &self.state_file
    }

    pub fn last_attempt(&self) -> Option<DateTime<Utc>> {
        self.last_attempt
    }

    /// Earliest time a start-of-session sync may run
    pub fn next_allowed(&self) -> Option<DateTime<Utc>> {
        let interval = chrono::Duration::from_std(self.interval).ok()?;
        self.last_attempt.map(|last| last + interval)
    }

    /// Returns true if a sync in `mode` may run at `now`
    pub fn should_run(&self, mode: SyncMode, now: DateTime<Utc>) -> bool {
        match mode {
            SyncMode::Quit | SyncMode::Force => true,
            SyncMode::Start => match self.next_allowed() {
                Some(next) => now >= next,
                None => true,
            },
        }
    }

    /// Records an attempt at `now` and persists it
    ///
    /// The in-memory clock is updated even if persisting fails.
    pub async fn record_attempt(&mut self, now: DateTime<Utc>) -> Result<(), SaveSyncError> {
        self.last_attempt = Some(now);
        let state = ThrottleState {
            last_attempt: Some(now),
        };
        let json = serde_json::to_vec_pretty(&state)
            .map_err(|e| SaveSyncError::storage(&self.state_file, std::io::Error::other(e)))?;
        atomic_write(&self.state_file, &json)
            .await
            .map_err(|e| SaveSyncError::storage(&self.state_file, e))
    }
}
