//! Storage Layer
//!
//! Persists periodic traffic analytics records, in memory or in SQLite.

mod record;
mod repository;
mod sqlite;
mod store;

pub use record::{TrafficAction, TrafficRecord, TrafficSummary};
pub use repository::Repository;
pub use sqlite::SqliteRepository;
pub use store::{StorageConfig, TrafficStore};

use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Corrupt record: {0}")]
    CorruptRecord(String),
}

impl From<sqlx::Error> for StorageError {
    fn from(e: sqlx::Error) -> Self {
        StorageError::DatabaseError(e.to_string())
    }
}
