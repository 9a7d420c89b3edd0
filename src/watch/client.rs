// src/watch/client.rs

//! Watch-service client abstraction.
//!
//! The reconnect loop talks to a [`WatchClient`] instead of a concrete
//! watcher. Production uses [`NotifyWatchClient`](super::NotifyWatchClient);
//! tests script connection failures, event batches and drops with a fake.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use thiserror::Error;

use crate::watch::filter::WatchFilter;

/// Name under which the daemon registers its subscription.
pub const SUBSCRIPTION_NAME: &str = "watchman-rebuild";

/// Errors from the watch transport.
///
/// [`TransportError::Timeout`] only means "nothing happened yet" and must be
/// answered by calling `receive()` again. Every other variant means the
/// connection is unusable and has to be re-established.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("timed out waiting for watch events")]
    Timeout,

    #[error("watch connection lost: {0}")]
    Disconnected(String),

    #[error("watch setup failed: {0}")]
    Setup(String),

    #[error("not connected to the watch service")]
    NotConnected,

    #[error(transparent)]
    Notify(#[from] notify::Error),
}

impl TransportError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout)
    }
}

/// Where the service is actually watching.
///
/// The service may canonicalize the requested path, or watch an enclosing
/// project and report the requested directory as `relative_path` under it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchRoot {
    pub root: PathBuf,
    pub relative_path: Option<PathBuf>,
}

impl WatchRoot {
    /// Directory that reported file names are relative to.
    pub fn base(&self) -> PathBuf {
        match &self.relative_path {
            Some(rel) => self.root.join(rel),
            None => self.root.clone(),
        }
    }
}

/// A named registration yielding changed regular files that pass `filter`.
#[derive(Debug, Clone)]
pub struct WatchSubscription {
    pub name: String,
    pub root: WatchRoot,
    pub filter: WatchFilter,
}

impl WatchSubscription {
    pub fn new(root: WatchRoot, filter: WatchFilter) -> Self {
        Self {
            name: SUBSCRIPTION_NAME.to_string(),
            root,
            filter,
        }
    }
}

/// One delivery from the watch service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchBatch {
    /// Subscription this batch belongs to.
    pub subscription: String,
    /// Changed file names relative to the subscription base.
    pub files: Vec<String>,
    /// Full-state snapshot rather than an incremental change list.
    pub is_fresh_instance: bool,
}

impl WatchBatch {
    pub fn changes(subscription: impl Into<String>, files: Vec<String>) -> Self {
        Self {
            subscription: subscription.into(),
            files,
            is_fresh_instance: false,
        }
    }

    pub fn fresh_instance(subscription: impl Into<String>, files: Vec<String>) -> Self {
        Self {
            subscription: subscription.into(),
            files,
            is_fresh_instance: true,
        }
    }
}

pub type ReceiveFuture<'a> =
    Pin<Box<dyn Future<Output = Result<WatchBatch, TransportError>> + Send + 'a>>;

/// Connection to a file-watching service.
///
/// A client is reused across reconnects: `close` drops the current
/// connection and a later `establish` opens a fresh one.
pub trait WatchClient: Send {
    /// Open a connection watching `root`.
    fn establish(&mut self, root: &Path) -> Result<WatchRoot, TransportError>;

    /// Register `subscription` on the current connection.
    fn subscribe(&mut self, subscription: &WatchSubscription) -> Result<(), TransportError>;

    /// Wait for the next batch, bounded by the client's own timeout.
    fn receive(&mut self) -> ReceiveFuture<'_>;

    /// Drop the current connection. Callers ignore the result.
    fn close(&mut self) -> Result<(), TransportError>;
}
