//! Budget synchronization service
//!
//! Wires the gateway, cache, local fallback and watcher together behind the
//! entry points the UI layer calls.

pub mod repository;
pub mod service;


pub use repository::{BudgetRead, BudgetRepository, ReadSource};
pub use service::BudgetService;

pub use budgetsync_watcher::{ChangeOrigin, WatchEvent, WatchHandle};
