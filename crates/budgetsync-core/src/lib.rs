//! Budgetsync core: snapshot model, change detection, text commands and local persistence

pub mod model;
pub mod error;
pub mod diff;
pub mod category;
pub mod interpreter;
pub mod mutator;
pub mod store;
pub mod config;

#[cfg(test)]
pub mod tests;

#[cfg(test)]
pub mod test_utils;

pub use model::{
    BudgetSnapshot, CommandKind, CommandOutcome, ParsedCommand, ResolvedCommand, RESERVED_KEYS,
    RECOMMENDATIONS_KEY, TOTAL_BUDGET_KEY, format_amount, is_reserved_key,
};
pub use error::SyncError;
pub use diff::{ChangeDetector, SnapshotHash, snapshot_hash};
pub use category::CategoryResolver;
pub use interpreter::{CommandInterpreter, SUGGESTIONS};
pub use store::{BUDGET_PLAN_KEY, FileStore, LocalStore, MemoryStore, PersistenceFallback, STORE_DIR};
pub use config::{BudgetConfig, CONFIG_FILE};
