//! Remote budget API access for budgetsync
//!
//! This crate talks to the budget HTTP API through an ordered list of
//! endpoint candidates and keeps a short-lived, coalescing cache of the
//! last fetched snapshot.

pub mod gateway;
pub mod providers;
pub mod cache;


pub use gateway::*;
pub use cache::{CacheEntry, CacheStats, Lookup, SyncCache};
pub use providers::{HttpGateway, MemoryGateway, create_gateway};
