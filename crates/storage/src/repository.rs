//! In-memory repository

use crate::{StorageError, TrafficRecord, TrafficSummary};
use std::collections::VecDeque;
use std::sync::Mutex;
use tracing::{debug, info};

/// Bounded in-memory record store
pub struct Repository {
    records: Mutex<VecDeque<TrafficRecord>>,
    /// Oldest records are dropped beyond this
    max_records: usize,
}

impl Repository {
    pub fn new(max_records: usize) -> Self {
        info!(max_records, "Creating in-memory repository");
        Self {
            records: Mutex::new(VecDeque::with_capacity(max_records.min(1024))),
            max_records: max_records.max(1),
        }
    }

    pub fn insert(&self, record: TrafficRecord) -> Result<(), StorageError> {
        let mut records = self
            .records
            .lock()
            .map_err(|e| StorageError::DatabaseError(format!("Lock error: {}", e)))?;

        // Enforce retention
        while records.len() >= self.max_records {
            records.pop_front();
        }

        debug!(time = %record.time, total = record.total, "Stored traffic record");
        records.push_back(record);
        Ok(())
    }

    /// Most recent records, newest first
    pub fn recent(&self, limit: usize) -> Result<Vec<TrafficRecord>, StorageError> {
        let records = self
            .records
            .lock()
            .map_err(|e| StorageError::DatabaseError(format!("Lock error: {}", e)))?;

        Ok(records.iter().rev().take(limit).cloned().collect())
    }

    pub fn summary(&self) -> Result<TrafficSummary, StorageError> {
        let records = self
            .records
            .lock()
            .map_err(|e| StorageError::DatabaseError(format!("Lock error: {}", e)))?;

        let mut summary = TrafficSummary::default();
        records.iter().for_each(|r| summary.add(r));
        Ok(summary)
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Repository {
    fn default() -> Self {
        Self::new(10_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::tests::sample;

    #[test]
    fn test_insert_and_recent() {
        let repo = Repository::default();
        repo.insert(sample(0, [1, 0, 0, 0], false)).unwrap();
        repo.insert(sample(1, [2, 0, 0, 0], false)).unwrap();
        repo.insert(sample(2, [3, 0, 0, 0], true)).unwrap();

        let recent = repo.recent(2).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].time, "08:02");
        assert_eq!(recent[1].time, "08:01");
    }

    #[test]
    fn test_retention_limit() {
        let repo = Repository::new(5);
        for minute in 0..10 {
            repo.insert(sample(minute, [minute, 0, 0, 0], false)).unwrap();
        }

        assert_eq!(repo.len(), 5);
        let oldest = repo.recent(5).unwrap().pop().unwrap();
        assert_eq!(oldest.lane_counts[0], 5);
    }

    #[test]
    fn test_summary() {
        let repo = Repository::default();
        assert!(repo.is_empty());
        assert_eq!(repo.summary().unwrap(), TrafficSummary::default());

        repo.insert(sample(0, [0; 4], true)).unwrap();
        repo.insert(sample(1, [0; 4], false)).unwrap();

        let summary = repo.summary().unwrap();
        assert_eq!(summary.total_records, 2);
        assert_eq!(summary.by_action["Ambulance"], 1);
    }
}
