// src/engine/debounce.rs

//! Debounced rebuild scheduling.
//!
//! A single timer task owns the deadline. Every `notify` restarts it, so a
//! burst of saves, formatter runs and VCS hooks produces one rebuild once the
//! tree has been quiet for the whole delay. When the deadline passes, the
//! pending set is swapped out under its mutex and handed to the trigger.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::exec::RebuildTrigger;

/// Paths changed since the last trigger.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PendingChangeSet {
    paths: BTreeSet<String>,
}

impl PendingChangeSet {
    /// Add `paths`, returning how many were not already pending.
    pub fn merge<I>(&mut self, paths: I) -> usize
    where
        I: IntoIterator<Item = String>,
    {
        paths
            .into_iter()
            .filter(|p| self.paths.insert(p.clone()))
            .count()
    }

    /// Empty the set, returning what it held.
    pub fn take(&mut self) -> BTreeSet<String> {
        std::mem::take(&mut self.paths)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
enum TimerControl {
    /// Restart the quiet period from now.
    Reset,
    /// Disarm without firing.
    Cancel,
    /// Disarm and stop the timer task.
    Shutdown,
}

/// Coalesces change notifications into debounced rebuild triggers.
pub struct DebounceScheduler {
    delay: Duration,
    pending: Arc<Mutex<PendingChangeSet>>,
    firing: Arc<AtomicBool>,
    control_tx: mpsc::UnboundedSender<TimerControl>,
    timer: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for DebounceScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebounceScheduler")
            .field("delay", &self.delay)
            .field("pending", &self.pending_len())
            .finish_non_exhaustive()
    }
}

impl DebounceScheduler {
    /// Start the timer task. Must be called inside a Tokio runtime.
    pub fn spawn(delay: Duration, trigger: Arc<dyn RebuildTrigger>) -> Self {
        let pending = Arc::new(Mutex::new(PendingChangeSet::default()));
        let firing = Arc::new(AtomicBool::new(false));
        let (control_tx, control_rx) = mpsc::unbounded_channel();

        let timer = tokio::spawn(run_timer(
            delay,
            Arc::clone(&pending),
            Arc::clone(&firing),
            trigger,
            control_rx,
        ));

        Self {
            delay,
            pending,
            firing,
            control_tx,
            timer: Some(timer),
        }
    }

    pub fn pending_len(&self) -> usize {
        lock_pending(&self.pending).len()
    }

    /// Record changed paths and restart the quiet period.
    ///
    /// An empty `paths` is ignored and does not extend the delay.
    pub fn notify<I>(&self, paths: I)
    where
        I: IntoIterator<Item = String>,
    {
        let paths: Vec<String> = paths.into_iter().collect();
        if paths.is_empty() {
            return;
        }

        let mut pending = lock_pending(&self.pending);
        let added = pending.merge(paths);

        info!(
            new = added,
            pending = pending.len(),
            "change detected, waiting {:?} for more changes...",
            self.delay
        );
        if self.control_tx.send(TimerControl::Reset).is_err() {
            warn!("debounce timer is gone; change will not trigger a rebuild");
        }
    }

    /// Disarm the timer without firing. Pending paths are kept and go out
    /// with the next trigger.
    pub fn cancel(&self) {
        let _ = self.control_tx.send(TimerControl::Cancel);
    }

    /// Cancel the timer and stop its task.
    ///
    /// A rebuild already running is waited for, never interrupted.
    pub async fn shutdown(&mut self) {
        let _ = self.control_tx.send(TimerControl::Shutdown);
        let Some(timer) = self.timer.take() else {
            return;
        };
        if self.firing.load(Ordering::SeqCst) {
            info!("waiting for in-flight rebuild to finish");
        }
        if let Err(err) = timer.await {
            warn!(error = %err, "debounce timer task failed");
        }
    }
}

impl Drop for DebounceScheduler {
    fn drop(&mut self) {
        let _ = self.control_tx.send(TimerControl::Shutdown);
    }
}

fn lock_pending(pending: &Mutex<PendingChangeSet>) -> MutexGuard<'_, PendingChangeSet> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn run_timer(
    delay: Duration,
    pending: Arc<Mutex<PendingChangeSet>>,
    firing: Arc<AtomicBool>,
    trigger: Arc<dyn RebuildTrigger>,
    mut control_rx: mpsc::UnboundedReceiver<TimerControl>,
) {
    let mut deadline: Option<Instant> = None;

    loop {
        tokio::select! {
            // Controls first: a reset that raced the deadline wins.
            biased;

            control = control_rx.recv() => match control {
                Some(TimerControl::Reset) => deadline = Some(Instant::now() + delay),
                Some(TimerControl::Cancel) => deadline = None,
                Some(TimerControl::Shutdown) | None => break,
            },

            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                deadline = None;
                let paths = lock_pending(&pending).take();
                if paths.is_empty() {
                    debug!("debounce deadline passed with nothing pending");
                    continue;
                }
                firing.store(true, Ordering::SeqCst);
                trigger.trigger(paths).await;
                firing.store(false, Ordering::SeqCst);
            }
        }
    }

    debug!("debounce timer stopped");
}
