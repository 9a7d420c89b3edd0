// src/engine/state.rs

//! Pure connection state machine.
//!
//! Synchronous and deterministic: no Tokio, no IO. The reconnect loop asks
//! it what to do next and performs the waiting and connecting itself.

/// Where the reconnect loop is in the connection lifecycle.
///
/// Rebuilds are not a state here; they run on the debounce timer's task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Disconnected,
    Connecting,
    Watching,
}

/// Decision after a failed connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectStep {
    /// Wait the reconnect delay and try again.
    Retry { attempt: u32 },
    /// The attempt budget is spent.
    GiveUp { attempts: u32 },
}

#[derive(Debug, Clone)]
pub struct ConnectionTracker {
    state: LoopState,
    attempts: u32,
    max_attempts: u32,
}

impl ConnectionTracker {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            state: LoopState::Disconnected,
            attempts: 0,
            max_attempts,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Consecutive failed attempts since the last successful connection.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// `Disconnected -> Connecting`.
    pub fn begin_connect(&mut self) {
        self.state = LoopState::Connecting;
    }

    /// `Connecting -> Watching`; the attempt counter starts over.
    pub fn connected(&mut self) {
        self.state = LoopState::Watching;
        self.attempts = 0;
    }

    /// `Connecting -> Connecting`, or give up once `max_attempts` attempts
    /// have failed in a row.
    pub fn connect_failed(&mut self) -> ConnectStep {
        self.state = LoopState::Connecting;
        self.attempts += 1;
        if self.attempts >= self.max_attempts {
            ConnectStep::GiveUp {
                attempts: self.attempts,
            }
        } else {
            ConnectStep::Retry {
                attempt: self.attempts,
            }
        }
    }

    /// `Watching -> Disconnected` after a structural transport error.
    pub fn transport_lost(&mut self) {
        self.state = LoopState::Disconnected;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_disconnected() {
        let tracker = ConnectionTracker::new(10);
        assert_eq!(tracker.state(), LoopState::Disconnected);
        assert_eq!(tracker.attempts(), 0);
    }

    #[test]
    fn gives_up_on_the_tenth_consecutive_failure() {
        let mut tracker = ConnectionTracker::new(10);
        tracker.begin_connect();

        for attempt in 1..10 {
            assert_eq!(tracker.connect_failed(), ConnectStep::Retry { attempt });
            assert_eq!(tracker.state(), LoopState::Connecting);
        }
        assert_eq!(tracker.connect_failed(), ConnectStep::GiveUp { attempts: 10 });
    }

    #[test]
    fn success_resets_the_budget() {
        let mut tracker = ConnectionTracker::new(3);
        tracker.begin_connect();
        tracker.connect_failed();
        tracker.connect_failed();
        tracker.connected();
        assert_eq!(tracker.state(), LoopState::Watching);
        assert_eq!(tracker.attempts(), 0);

        tracker.transport_lost();
        assert_eq!(tracker.state(), LoopState::Disconnected);
        tracker.begin_connect();
        assert_eq!(tracker.connect_failed(), ConnectStep::Retry { attempt: 1 });
        assert_eq!(tracker.connect_failed(), ConnectStep::Retry { attempt: 2 });
        assert_eq!(tracker.connect_failed(), ConnectStep::GiveUp { attempts: 3 });
    }
}
