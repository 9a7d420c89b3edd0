// src/exec/backend.rs

//! Pluggable rebuild trigger.
//!
//! The debounce scheduler talks to a `RebuildTrigger` instead of a concrete
//! executor. This makes it easy to swap in a recording fake in tests while
//! keeping the production implementation in [`runner`](super::runner).

use std::collections::BTreeSet;
use std::future::Future;
use std::pin::Pin;

pub type TriggerFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// Whatever should happen once a burst of changes has settled.
///
/// The future runs to completion on the scheduler's timer task; while it
/// runs, new changes accumulate in a fresh pending set.
pub trait RebuildTrigger: Send + Sync {
    /// `paths` is the deduplicated set of files changed since the last
    /// trigger. It is never empty.
    fn trigger(&self, paths: BTreeSet<String>) -> TriggerFuture<'_>;
}
