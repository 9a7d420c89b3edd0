use std::collections::BTreeSet;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;
use watchman_rebuild::exec::{Notifier, NotifyFuture, RebuildTrigger, TriggerFuture};
use watchman_rebuild::types::NotificationKind;

/// A fake rebuild trigger that:
/// - records every path set it is fired with, and when
/// - optionally "runs" for `busy` before returning, like a slow rebuild.
#[derive(Debug, Clone, Default)]
pub struct RecordingTrigger {
    fired: Arc<Mutex<Vec<(Instant, BTreeSet<String>)>>>,
    busy: Duration,
}

impl RecordingTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn busy_for(mut self, busy: Duration) -> Self {
        self.busy = busy;
        self
    }

    pub fn fired(&self) -> Vec<(Instant, BTreeSet<String>)> {
        self.fired.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.fired.lock().unwrap().len()
    }

    pub fn path_sets(&self) -> Vec<BTreeSet<String>> {
        self.fired().into_iter().map(|(_, paths)| paths).collect()
    }
}

impl RebuildTrigger for RecordingTrigger {
    fn trigger(&self, paths: BTreeSet<String>) -> TriggerFuture<'_> {
        Box::pin(async move {
            self.fired.lock().unwrap().push((Instant::now(), paths));
            if !self.busy.is_zero() {
                tokio::time::sleep(self.busy).await;
            }
        })
    }
}

/// A fake notifier that records what would have been shown.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<NotificationKind>>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record, then report a delivery error.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<NotificationKind> {
        self.sent.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn send(&self, kind: NotificationKind) -> NotifyFuture<'_> {
        Box::pin(async move {
            self.sent.lock().unwrap().push(kind);
            if self.fail {
                Err(io::Error::other("no notification daemon"))
            } else {
                Ok(())
            }
        })
    }
}
