// src/engine/mod.rs

//! Orchestration engine for watchman-rebuild.
//!
//! This module ties together:
//! - the connection state machine (retry budget, when to give up)
//! - the debounce scheduler that turns bursts of changes into one rebuild
//! - the reconnect loop that keeps the watch subscription alive
//!
//! The pure state machine lives in [`state`]; the async shells are
//! [`debounce`] and [`reconnect`].

pub mod debounce;
pub mod reconnect;
pub mod state;

pub use debounce::{DebounceScheduler, PendingChangeSet};
pub use reconnect::ReconnectLoop;
pub use state::{ConnectStep, ConnectionTracker, LoopState};
