//! Budget polling watcher
//!
//! Polls a [`SnapshotSource`] on an interval and notifies a callback and
//! any channel subscribers when the budget content changes.

pub mod watcher;

pub use watcher::*;
