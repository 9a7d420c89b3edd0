// src/engine/reconnect.rs

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, error, info, trace, warn};

use crate::config::DaemonSettings;
use crate::errors::{RebuildError, Result};
use crate::watch::{TransportError, WatchBatch, WatchClient, WatchFilter, WatchSubscription};

use super::debounce::DebounceScheduler;
use super::state::{ConnectStep, ConnectionTracker, LoopState};

/// Keeps a watch subscription alive and feeds its batches to the debounce
/// scheduler.
///
/// This is the async shell around [`ConnectionTracker`]: the tracker decides
/// between retrying and giving up, and this struct does the waiting, the
/// connecting and the receiving.
pub struct ReconnectLoop<C: WatchClient> {
    client: C,
    root: PathBuf,
    filter: WatchFilter,
    scheduler: DebounceScheduler,
    tracker: ConnectionTracker,
    reconnect_delay: Duration,
    subscription: Option<WatchSubscription>,
}

impl<C: WatchClient> fmt::Debug for ReconnectLoop<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReconnectLoop")
            .field("root", &self.root)
            .field("tracker", &self.tracker)
            .field("scheduler", &self.scheduler)
            .finish_non_exhaustive()
    }
}

impl<C: WatchClient> ReconnectLoop<C> {
    pub fn new(
        client: C,
        root: impl Into<PathBuf>,
        filter: WatchFilter,
        scheduler: DebounceScheduler,
        settings: &DaemonSettings,
    ) -> Self {
        Self {
            client,
            root: root.into(),
            filter,
            scheduler,
            tracker: ConnectionTracker::new(settings.max_reconnect_attempts),
            reconnect_delay: settings.reconnect_delay,
            subscription: None,
        }
    }

    /// Watch until `shutdown` resolves or reconnection is exhausted.
    ///
    /// Either way the connection is closed and the debounce scheduler is shut
    /// down before returning, which waits out a rebuild already in flight.
    pub async fn run<F>(mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        info!(root = %self.root.display(), "watching for configuration changes");

        let outcome = tokio::select! {
            _ = shutdown => {
                info!("shutdown requested, stopping...");
                Ok(())
            }
            res = self.drive() => res,
        };

        self.teardown().await;
        outcome
    }

    async fn drive(&mut self) -> Result<()> {
        loop {
            match self.tracker.state() {
                LoopState::Disconnected => self.tracker.begin_connect(),
                LoopState::Connecting => self.connect().await?,
                LoopState::Watching => self.watch_once().await,
            }
        }
    }

    async fn connect(&mut self) -> Result<()> {
        let err = match self.try_connect() {
            Ok(subscription) => {
                self.subscription = Some(subscription);
                self.tracker.connected();
                info!("watching for changes...");
                return Ok(());
            }
            Err(err) => err,
        };

        self.close_quietly();
        error!(error = %err, "failed to connect to watch service");

        match self.tracker.connect_failed() {
            ConnectStep::GiveUp { attempts } => {
                error!(attempts, "giving up on the watch service, exiting");
                Err(RebuildError::ReconnectExhausted { attempts })
            }
            ConnectStep::Retry { attempt } => {
                info!(
                    "retrying in {:?} (attempt {}/{})...",
                    self.reconnect_delay,
                    attempt,
                    self.tracker.max_attempts()
                );
                tokio::time::sleep(self.reconnect_delay).await;
                Ok(())
            }
        }
    }

    fn try_connect(&mut self) -> std::result::Result<WatchSubscription, TransportError> {
        let root = self.client.establish(&self.root)?;
        debug!(
            watch_root = %root.root.display(),
            relative_path = ?root.relative_path,
            "watch established"
        );

        let subscription = WatchSubscription::new(root, self.filter.clone());
        self.client.subscribe(&subscription)?;
        Ok(subscription)
    }

    async fn watch_once(&mut self) {
        match self.client.receive().await {
            Ok(batch) => self.handle_batch(batch),
            Err(err) if err.is_timeout() => trace!("no watch events yet"),
            Err(err) => {
                warn!(error = %err, "watch connection lost");
                self.close_quietly();
                self.subscription = None;
                self.tracker.transport_lost();
                info!("reconnecting in {:?}...", self.reconnect_delay);
                tokio::time::sleep(self.reconnect_delay).await;
            }
        }
    }

    fn handle_batch(&self, batch: WatchBatch) {
        let Some(subscription) = &self.subscription else {
            return;
        };
        if batch.subscription != subscription.name {
            debug!(subscription = %batch.subscription, "ignoring batch for another subscription");
            return;
        }
        if batch.is_fresh_instance {
            debug!(files = batch.files.len(), "ignoring fresh-instance snapshot");
            return;
        }
        if batch.files.is_empty() {
            return;
        }
        self.scheduler.notify(batch.files);
    }

    fn close_quietly(&mut self) {
        if let Err(err) = self.client.close() {
            debug!(error = %err, "ignoring error while closing watch connection");
        }
    }

    async fn teardown(&mut self) {
        self.close_quietly();
        self.subscription = None;
        self.scheduler.shutdown().await;
        info!("watcher stopped");
    }
}
