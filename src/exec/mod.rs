// src/exec/mod.rs

//! Rebuild execution layer.
//!
//! - [`backend`] provides the `RebuildTrigger` trait the debounce scheduler
//!   fires into, so tests can replace the real executor with a recorder.
//! - [`runner`] holds `RebuildExecutor`, which runs the rebuild command
//!   under the rebuild lock using `tokio::process::Command`.
//! - [`notification`] sends the success/failure desktop toast.

pub mod backend;
pub mod notification;
pub mod runner;

pub use backend::{RebuildTrigger, TriggerFuture};
pub use notification::{DesktopNotifier, Notifier, NotifyFuture};
pub use runner::{RebuildExecutor, UNFREE_ENV};
