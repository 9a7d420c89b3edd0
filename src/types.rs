// src/types.rs

use std::fmt;

/// Result of a single rebuild attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildOutcome {
    /// The command exited with status 0.
    Succeeded,
    /// The command exited non-zero. `exit_code` is `None` when the process
    /// was terminated by a signal.
    Failed { exit_code: Option<i32> },
    /// Another rebuild held the lock; nothing was run.
    Skipped,
}

/// Which desktop toast to show after a rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Failure,
}

/// Where the rebuild command line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandSource {
    /// Passed on the command line.
    Explicit,
    /// Chosen from the host platform.
    Detected,
}

impl fmt::Display for CommandSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandSource::Explicit => f.write_str("explicit"),
            CommandSource::Detected => f.write_str("auto-detected"),
        }
    }
}
