// src/config/model.rs

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::config::command::RebuildCommand;

/// Wait this long after the last change before rebuilding.
pub const DEBOUNCE_DELAY: Duration = Duration::from_secs(10);
/// Pause between watch-service connection attempts.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(5);
/// Connection attempts before the daemon gives up.
pub const MAX_RECONNECT_ATTEMPTS: u32 = 10;
/// Pause between checks of a live competing daemon.
pub const INSTANCE_RETRY_DELAY: Duration = Duration::from_secs(5);
/// Checks of a live competing daemon before giving up (5 minutes total).
pub const INSTANCE_MAX_RETRIES: u32 = 60;
/// How long a single `receive()` waits for events before reporting a timeout.
pub const RECEIVE_TIMEOUT: Duration = Duration::from_secs(60);

pub const DEFAULT_STATE_DIR: &str = "/tmp";

const INSTANCE_FILE_NAME: &str = "watchman-rebuild.instance";
const LOCK_FILE_NAME: &str = "watchman-rebuild.lock";

/// On-disk shape of `.watchman-rebuild.json`.
///
/// ```json
/// { "ignore_patterns": ["*.tmp", "result", ".direnv/"] }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IgnoreConfig {
    #[serde(default)]
    pub ignore_patterns: Vec<String>,
}

/// Fully resolved configuration for one daemon run.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Root of the configuration tree; watched and used as the rebuild cwd.
    pub config_path: PathBuf,
    pub command: RebuildCommand,
    /// Patterns with trailing `/` already stripped.
    pub ignore_patterns: Vec<String>,
}

/// Timing and placement knobs.
///
/// `Default` gives the production values; tests shrink the delays.
#[derive(Debug, Clone)]
pub struct DaemonSettings {
    pub debounce_delay: Duration,
    pub reconnect_delay: Duration,
    pub max_reconnect_attempts: u32,
    pub instance_retry_delay: Duration,
    pub instance_max_retries: u32,
    pub receive_timeout: Duration,
    pub state_dir: PathBuf,
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            debounce_delay: DEBOUNCE_DELAY,
            reconnect_delay: RECONNECT_DELAY,
            max_reconnect_attempts: MAX_RECONNECT_ATTEMPTS,
            instance_retry_delay: INSTANCE_RETRY_DELAY,
            instance_max_retries: INSTANCE_MAX_RETRIES,
            receive_timeout: RECEIVE_TIMEOUT,
            state_dir: PathBuf::from(DEFAULT_STATE_DIR),
        }
    }
}

impl DaemonSettings {
    pub fn with_state_dir(mut self, state_dir: impl AsRef<Path>) -> Self {
        self.state_dir = state_dir.as_ref().to_path_buf();
        self
    }

    /// PID marker shared by every daemon on this host.
    pub fn instance_file(&self) -> PathBuf {
        self.state_dir.join(INSTANCE_FILE_NAME)
    }

    /// Sentinel present while a rebuild subprocess runs.
    pub fn lock_file(&self) -> PathBuf {
        self.state_dir.join(LOCK_FILE_NAME)
    }
}
