// src/config/mod.rs

//! Daemon configuration.
//!
//! - [`model`] holds the resolved [`DaemonConfig`] and the timing knobs in
//!   [`DaemonSettings`].
//! - [`loader`] reads the per-project ignore file.
//! - [`command`] picks the platform rebuild command when none is given.

pub mod command;
pub mod loader;
pub mod model;

pub use command::{detect_rebuild_command, RebuildCommand};
pub use loader::{load_ignore_patterns, IGNORE_CONFIG_FILE};
pub use model::{
    DaemonConfig, DaemonSettings, IgnoreConfig, DEBOUNCE_DELAY, DEFAULT_STATE_DIR,
    INSTANCE_MAX_RETRIES, INSTANCE_RETRY_DELAY, MAX_RECONNECT_ATTEMPTS, RECEIVE_TIMEOUT,
    RECONNECT_DELAY,
};
