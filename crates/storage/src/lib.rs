#![forbid(unsafe_code)]

//! Transactional containment index over an embedded SQLite store.

mod cache;
pub mod config;
pub mod containment;
mod database;
pub mod dialect;
mod error;
pub mod schema;
pub mod txn;

pub use cache::CacheStats;
pub use config::IndexConfig;
pub use containment::{ContainmentCacheStats, ContainmentCursor, ContainmentIndex, Exclusion};
pub use database::Database;
pub use dialect::{Dialect, DialectQueries};
pub use error::{ClosedReason, IndexError};
pub use txn::{Transaction, TransactionManager, TransactionParticipant, TransactionState};
