// src/lock/mod.rs

//! Cross-process mutual exclusion through marker files.
//!
//! - [`instance`] keeps a single live daemon per host (PID marker with an OS
//!   liveness check and a bounded wait for a competitor to exit).
//! - [`rebuild`] keeps a single rebuild subprocess running at a time
//!   (sentinel file guarded by an advisory lock).
//!
//! Both markers live in the daemon's state directory and are the only state
//! shared between processes.

pub mod instance;
pub mod rebuild;

pub use instance::{process_alive, InstanceGuard, InstancePolicy};
pub use rebuild::{LockStatus, RebuildLock, RebuildLockGuard};
