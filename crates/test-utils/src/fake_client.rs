use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;
use watchman_rebuild::watch::{
    ReceiveFuture, TransportError, WatchBatch, WatchClient, WatchRoot, WatchSubscription,
};

/// One scripted answer to `receive()`.
#[derive(Debug, Clone)]
pub enum Step {
    /// Deliver `files` as an incremental batch after `delay`.
    Changes { delay: Duration, files: Vec<String> },
    /// Deliver an arbitrary batch after `delay`.
    Batch { delay: Duration, batch: WatchBatch },
    /// Drop the connection with a structural error.
    Drop,
    /// Drop the connection and make every later connection attempt fail.
    Crash,
}

#[derive(Debug, Default)]
struct Script {
    steps: VecDeque<Step>,
    connect_failures: u32,
    fail_all_connects: bool,
    fresh_on_subscribe: bool,
    idle: Duration,

    connected: bool,
    subscription: Option<String>,
    pending_fresh: bool,

    connect_attempts: Vec<Instant>,
    subscriptions: usize,
    closes: usize,
}

/// Scripted [`WatchClient`].
///
/// Clones share the same script and call log, so a test can keep one handle
/// while the reconnect loop owns another.
///
/// - `establish` fails while scripted failures remain.
/// - `subscribe` queues a fresh-instance batch like a real service would.
/// - `receive` plays the next [`Step`]; with nothing scripted it waits
///   `idle` and reports a timeout.
#[derive(Debug, Clone)]
pub struct FakeWatchClient {
    inner: Arc<Mutex<Script>>,
}

impl Default for FakeWatchClient {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeWatchClient {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Script {
                fresh_on_subscribe: true,
                idle: Duration::from_secs(60),
                ..Script::default()
            })),
        }
    }

    /// The next `n` connection attempts fail.
    pub fn fail_connects(self, n: u32) -> Self {
        self.inner.lock().unwrap().connect_failures = n;
        self
    }

    /// Every connection attempt fails.
    pub fn fail_every_connect(self) -> Self {
        self.inner.lock().unwrap().fail_all_connects = true;
        self
    }

    pub fn idle(self, idle: Duration) -> Self {
        self.inner.lock().unwrap().idle = idle;
        self
    }

    pub fn push(&self, step: Step) {
        self.inner.lock().unwrap().steps.push_back(step);
    }

    pub fn connect_attempts(&self) -> Vec<Instant> {
        self.inner.lock().unwrap().connect_attempts.clone()
    }

    pub fn subscriptions(&self) -> usize {
        self.inner.lock().unwrap().subscriptions
    }

    pub fn closes(&self) -> usize {
        self.inner.lock().unwrap().closes
    }

    pub fn is_connected(&self) -> bool {
        self.inner.lock().unwrap().connected
    }
}

impl WatchClient for FakeWatchClient {
    fn establish(&mut self, root: &Path) -> Result<WatchRoot, TransportError> {
        let mut script = self.inner.lock().unwrap();
        script.connect_attempts.push(Instant::now());

        if script.fail_all_connects || script.connect_failures > 0 {
            script.connect_failures = script.connect_failures.saturating_sub(1);
            return Err(TransportError::Setup("watch service unavailable".into()));
        }

        script.connected = true;
        Ok(WatchRoot {
            root: PathBuf::from(root),
            relative_path: None,
        })
    }

    fn subscribe(&mut self, subscription: &WatchSubscription) -> Result<(), TransportError> {
        let mut script = self.inner.lock().unwrap();
        if !script.connected {
            return Err(TransportError::NotConnected);
        }
        script.subscriptions += 1;
        script.subscription = Some(subscription.name.clone());
        script.pending_fresh = script.fresh_on_subscribe;
        Ok(())
    }

    fn receive(&mut self) -> ReceiveFuture<'_> {
        let inner = Arc::clone(&self.inner);

        Box::pin(async move {
            let (step, name, idle) = {
                let mut script = inner.lock().unwrap();
                if !script.connected {
                    return Err(TransportError::NotConnected);
                }
                let name = script.subscription.clone().unwrap_or_default();
                if script.pending_fresh {
                    script.pending_fresh = false;
                    return Ok(WatchBatch::fresh_instance(name, vec!["flake.lock".into()]));
                }
                (script.steps.pop_front(), name, script.idle)
            };

            match step {
                Some(Step::Changes { delay, files }) => {
                    tokio::time::sleep(delay).await;
                    Ok(WatchBatch::changes(name, files))
                }
                Some(Step::Batch { delay, batch }) => {
                    tokio::time::sleep(delay).await;
                    Ok(batch)
                }
                Some(Step::Drop) => {
                    inner.lock().unwrap().connected = false;
                    Err(TransportError::Disconnected("connection reset".into()))
                }
                Some(Step::Crash) => {
                    let mut script = inner.lock().unwrap();
                    script.connected = false;
                    script.fail_all_connects = true;
                    Err(TransportError::Disconnected("watch service exited".into()))
                }
                None => {
                    tokio::time::sleep(idle).await;
                    Err(TransportError::Timeout)
                }
            }
        })
    }

    fn close(&mut self) -> Result<(), TransportError> {
        let mut script = self.inner.lock().unwrap();
        script.closes += 1;
        script.connected = false;
        script.subscription = None;
        script.pending_fresh = false;
        Ok(())
    }
}
