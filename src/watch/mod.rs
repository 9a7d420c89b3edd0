// src/watch/mod.rs

//! File watching.
//!
//! This module is responsible for:
//! - Compiling the project's ignore patterns into a [`WatchFilter`].
//! - The [`WatchClient`] abstraction over a watch service: establish a
//!   connection, subscribe with a filter, receive batches of changed files.
//! - The production client built on `notify`.
//!
//! It does **not** debounce or rebuild; it only turns filesystem changes into
//! batches of relative file names.

pub mod client;
pub mod filter;
pub mod notify_client;
pub mod path_utils;

pub use client::{
    ReceiveFuture, TransportError, WatchBatch, WatchClient, WatchRoot, WatchSubscription,
    SUBSCRIPTION_NAME,
};
pub use filter::WatchFilter;
pub use notify_client::NotifyWatchClient;
