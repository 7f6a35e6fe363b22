//! Store selection

use crate::{Repository, SqliteRepository, StorageError, TrafficRecord, TrafficSummary};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite URL such as `sqlite://traffic.db`; records stay in memory when unset
    pub database_url: Option<String>,
    pub max_connections: u32,
    /// Retention for the in-memory store
    pub max_records: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            max_connections: 4,
            max_records: 10_000,
        }
    }
}

/// Record store used by the recorder and the analytics API
pub enum TrafficStore {
    Memory(Repository),
    Sqlite(SqliteRepository),
}

impl TrafficStore {
    pub async fn open(config: &StorageConfig) -> Result<Self, StorageError> {
        match &config.database_url {
            Some(url) => Ok(TrafficStore::Sqlite(
                SqliteRepository::connect(url, config.max_connections).await?,
            )),
            None => Ok(TrafficStore::Memory(Repository::new(config.max_records))),
        }
    }

    pub async fn insert(&self, record: TrafficRecord) -> Result<(), StorageError> {
        match self {
            TrafficStore::Memory(repo) => repo.insert(record),
            TrafficStore::Sqlite(repo) => repo.insert(&record).await,
        }
    }

    pub async fn recent(&self, limit: usize) -> Result<Vec<TrafficRecord>, StorageError> {
        match self {
            TrafficStore::Memory(repo) => repo.recent(limit),
            TrafficStore::Sqlite(repo) => repo.recent(limit).await,
        }
    }

    pub async fn summary(&self) -> Result<TrafficSummary, StorageError> {
        match self {
            TrafficStore::Memory(repo) => repo.summary(),
            TrafficStore::Sqlite(repo) => repo.summary().await,
        }
    }

    /// Release the connection pool; in-memory records need no teardown
    pub async fn close(&self) {
        if let TrafficStore::Sqlite(repo) = self {
            repo.close().await;
        }
    }

    pub fn backend(&self) -> &'static str {
        match self {
            TrafficStore::Memory(_) => "memory",
            TrafficStore::Sqlite(_) => "sqlite",
        }
    }
}
