// src/watch/notify_client.rs

use std::collections::VecDeque;
use std::path::Path;
use std::time::Duration;

use notify::event::{CreateKind, RemoveKind};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, trace};

use crate::watch::client::{
    ReceiveFuture, TransportError, WatchBatch, WatchClient, WatchRoot, WatchSubscription,
};
use crate::watch::path_utils::relative_str;

/// [`WatchClient`] backed by the platform's native file notifications
/// (`notify`: inotify, FSEvents, kqueue, ...).
///
/// A "connection" is one recursive watcher on the canonical root. It reports
/// a structural error when the watcher itself fails, its event channel
/// closes, or the watched root is removed.
pub struct NotifyWatchClient {
    receive_timeout: Duration,
    connection: Option<Connection>,
}

struct Connection {
    root: WatchRoot,
    // Dropping the watcher stops event delivery.
    _watcher: RecommendedWatcher,
    events: mpsc::UnboundedReceiver<notify::Result<Event>>,
    subscription: Option<WatchSubscription>,
    pending: VecDeque<WatchBatch>,
}

impl std::fmt::Debug for NotifyWatchClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifyWatchClient")
            .field("receive_timeout", &self.receive_timeout)
            .field("root", &self.connection.as_ref().map(|c| &c.root))
            .finish()
    }
}

impl NotifyWatchClient {
    pub fn new(receive_timeout: Duration) -> Self {
        Self {
            receive_timeout,
            connection: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }
}

impl WatchClient for NotifyWatchClient {
    fn establish(&mut self, root: &Path) -> Result<WatchRoot, TransportError> {
        self.connection = None;

        let canonical = root.canonicalize().map_err(|err| {
            TransportError::Setup(format!("cannot resolve {}: {err}", root.display()))
        })?;

        // Channel from the blocking notify callback into the async world.
        let (event_tx, event_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                // The receiver is gone only once the connection was closed.
                let _ = event_tx.send(res);
            },
            Config::default(),
        )?;
        watcher.watch(&canonical, RecursiveMode::Recursive)?;

        let watch_root = WatchRoot {
            root: canonical,
            relative_path: None,
        };
        info!(root = %watch_root.root.display(), "file watcher started");

        self.connection = Some(Connection {
            root: watch_root.clone(),
            _watcher: watcher,
            events: event_rx,
            subscription: None,
            pending: VecDeque::new(),
        });
        Ok(watch_root)
    }

    fn subscribe(&mut self, subscription: &WatchSubscription) -> Result<(), TransportError> {
        let conn = self.connection.as_mut().ok_or(TransportError::NotConnected)?;
        if subscription.root.root != conn.root.root {
            return Err(TransportError::Setup(format!(
                "subscription root {} is not the watched root {}",
                subscription.root.root.display(),
                conn.root.root.display()
            )));
        }

        // A new subscription starts from a full snapshot, like a
        // freshly started watch service.
        conn.pending
            .push_back(WatchBatch::fresh_instance(&subscription.name, Vec::new()));
        conn.subscription = Some(subscription.clone());
        debug!(
            subscription = %subscription.name,
            filter = ?subscription.filter,
            "subscribed"
        );
        Ok(())
    }

    fn receive(&mut self) -> ReceiveFuture<'_> {
        let timeout = self.receive_timeout;

        Box::pin(async move {
            let conn = self.connection.as_mut().ok_or(TransportError::NotConnected)?;
            if let Some(batch) = conn.pending.pop_front() {
                return Ok(batch);
            }

            let deadline = Instant::now() + timeout;
            loop {
                let event = match tokio::time::timeout_at(deadline, conn.events.recv()).await {
                    Err(_) => return Err(TransportError::Timeout),
                    Ok(None) => {
                        return Err(TransportError::Disconnected(
                            "watcher event channel closed".to_string(),
                        ));
                    }
                    Ok(Some(Err(err))) => return Err(err.into()),
                    Ok(Some(Ok(event))) => event,
                };
                trace!(?event, "received notify event");

                // Events before the subscription is registered have no consumer.
                let Some(subscription) = conn.subscription.as_ref() else {
                    continue;
                };
                if let Some(batch) = classify_event(&event, subscription)? {
                    return Ok(batch);
                }
            }
        })
    }

    fn close(&mut self) -> Result<(), TransportError> {
        if let Some(conn) = self.connection.take() {
            debug!(root = %conn.root.root.display(), "file watcher stopped");
        }
        Ok(())
    }
}

/// Map one notify event onto the subscription.
///
/// - A rescan request becomes a fresh-instance batch.
/// - Removal of the watched root is a structural error.
/// - Directories, paths outside the subscription base and filtered paths
///   are dropped; `None` means nothing is left to report.
pub fn classify_event(
    event: &Event,
    subscription: &WatchSubscription,
) -> Result<Option<WatchBatch>, TransportError> {
    if event.need_rescan() {
        return Ok(Some(WatchBatch::fresh_instance(
            &subscription.name,
            Vec::new(),
        )));
    }

    let base = subscription.root.base();
    if matches!(event.kind, EventKind::Remove(_))
        && event
            .paths
            .iter()
            .any(|p| p == &subscription.root.root || p == &base)
    {
        return Err(TransportError::Disconnected(format!(
            "watched root {} was removed",
            base.display()
        )));
    }

    let directory_event = matches!(
        event.kind,
        EventKind::Create(CreateKind::Folder) | EventKind::Remove(RemoveKind::Folder)
    );
    if directory_event
        || matches!(event.kind, EventKind::Access(_) | EventKind::Other)
    {
        return Ok(None);
    }

    let mut files: Vec<String> = Vec::new();
    for path in &event.paths {
        if path.is_dir() {
            continue;
        }
        let Some(rel) = relative_str(&base, path) else {
            continue;
        };
        if subscription.filter.allows(&rel) && !files.contains(&rel) {
            files.push(rel);
        }
    }

    if files.is_empty() {
        Ok(None)
    } else {
        Ok(Some(WatchBatch::changes(&subscription.name, files)))
    }
}
