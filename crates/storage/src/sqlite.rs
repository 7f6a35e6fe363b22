//! SQLite repository

use crate::{StorageError, TrafficAction, TrafficRecord, TrafficSummary};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use tracing::{debug, info};

const CREATE_TABLE: &str = "
CREATE TABLE IF NOT EXISTS traffic_records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    recorded_at_ms INTEGER NOT NULL,
    time TEXT NOT NULL,
    lane1 INTEGER NOT NULL,
    lane2 INTEGER NOT NULL,
    lane3 INTEGER NOT NULL,
    lane4 INTEGER NOT NULL,
    total INTEGER NOT NULL,
    vehicle_type TEXT,
    vehicle_count INTEGER NOT NULL,
    action TEXT NOT NULL,
    priority BOOLEAN NOT NULL,
    active_lane INTEGER NOT NULL,
    active_color TEXT NOT NULL
)";

const SELECT_COLUMNS: &str = "recorded_at_ms, time, lane1, lane2, lane3, lane4, total, \
     vehicle_type, vehicle_count, action, priority, active_lane, active_color";

/// Durable record store backed by a SQLite pool
pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    /// Open (creating if needed) the database at `url` and ensure the schema
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StorageError> {
        info!(url, "Opening SQLite repository");
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await?;

        sqlx::query(CREATE_TABLE).execute(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn insert(&self, record: &TrafficRecord) -> Result<(), StorageError> {
        let [lane1, lane2, lane3, lane4] = record.lane_counts;
        sqlx::query(
            "INSERT INTO traffic_records (recorded_at_ms, time, lane1, lane2, lane3, lane4, \
             total, vehicle_type, vehicle_count, action, priority, active_lane, active_color) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.recorded_at.timestamp_millis())
        .bind(&record.time)
        .bind(i64::from(lane1))
        .bind(i64::from(lane2))
        .bind(i64::from(lane3))
        .bind(i64::from(lane4))
        .bind(i64::from(record.total))
        .bind(record.vehicle_type.as_deref())
        .bind(record.vehicle_count as i64)
        .bind(record.action.as_str())
        .bind(record.priority)
        .bind(i64::from(record.active_lane))
        .bind(&record.active_color)
        .execute(&self.pool)
        .await?;

        debug!(time = %record.time, "Stored traffic record");
        Ok(())
    }

    /// Most recent records, newest first
    pub async fn recent(&self, limit: usize) -> Result<Vec<TrafficRecord>, StorageError> {
        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM traffic_records ORDER BY id DESC LIMIT ?"
        ))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(record_from_row).collect()
    }

    pub async fn summary(&self) -> Result<TrafficSummary, StorageError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM traffic_records")
            .fetch_one(&self.pool)
            .await?;

        let mut summary = TrafficSummary {
            total_records: total as usize,
            ..Default::default()
        };

        let by_type = sqlx::query(
            "SELECT vehicle_type AS label, COUNT(*) AS n FROM traffic_records \
             WHERE vehicle_type IS NOT NULL GROUP BY vehicle_type",
        )
        .fetch_all(&self.pool)
        .await?;
        for row in &by_type {
            summary
                .by_vehicle_type
                .insert(row.try_get("label")?, row.try_get::<i64, _>("n")? as usize);
        }

        let by_action = sqlx::query(
            "SELECT action AS label, COUNT(*) AS n FROM traffic_records GROUP BY action",
        )
        .fetch_all(&self.pool)
        .await?;
        for row in &by_action {
            summary
                .by_action
                .insert(row.try_get("label")?, row.try_get::<i64, _>("n")? as usize);
        }

        Ok(summary)
    }

    pub async fn close(&self) {
        info!("Closing SQLite repository");
        self.pool.close().await;
    }
}

fn count(row: &SqliteRow, column: &str) -> Result<u32, StorageError> {
    let value: i64 = row.try_get(column)?;
    u32::try_from(value)
        .map_err(|_| StorageError::CorruptRecord(format!("{column} out of range: {value}")))
}

fn record_from_row(row: &SqliteRow) -> Result<TrafficRecord, StorageError> {
    let millis: i64 = row.try_get("recorded_at_ms")?;
    let recorded_at = DateTime::<Utc>::from_timestamp_millis(millis)
        .ok_or_else(|| StorageError::CorruptRecord(format!("bad timestamp {millis}")))?;

    let action: String = row.try_get("action")?;
    let action = TrafficAction::parse(&action)
        .ok_or_else(|| StorageError::CorruptRecord(format!("unknown action {action}")))?;

    let active_lane = u8::try_from(count(row, "active_lane")?)
        .map_err(|_| StorageError::CorruptRecord("active_lane out of range".into()))?;

    Ok(TrafficRecord {
        recorded_at,
        time: row.try_get("time")?,
        lane_counts: [
            count(row, "lane1")?,
            count(row, "lane2")?,
            count(row, "lane3")?,
            count(row, "lane4")?,
        ],
        total: count(row, "total")?,
        vehicle_type: row.try_get("vehicle_type")?,
        vehicle_count: row.try_get::<i64, _>("vehicle_count")?.max(0) as u64,
        action,
        priority: row.try_get("priority")?,
        active_lane,
        active_color: row.try_get("active_color")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::tests::sample;

    async fn memory_repo() -> SqliteRepository {
        // One connection, since every in-memory connection is its own database
        SqliteRepository::connect("sqlite::memory:", 1).await.unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_read_back() {
        let repo = memory_repo().await;
        let record = sample(3, [4, 0, 7, 1], true);

        repo.insert(&record).await.unwrap();
        let recent = repo.recent(10).await.unwrap();

        assert_eq!(recent, vec![record]);
    }

    #[tokio::test]
    async fn test_recent_is_newest_first_and_limited() {
        let repo = memory_repo().await;
        for minute in 0..5 {
            repo.insert(&sample(minute, [minute, 0, 0, 0], false))
                .await
                .unwrap();
        }

        let recent = repo.recent(3).await.unwrap();
        let times: Vec<&str> = recent.iter().map(|r| r.time.as_str()).collect();
        assert_eq!(times, vec!["08:04", "08:03", "08:02"]);
    }

    #[tokio::test]
    async fn test_summary_groups() {
        let repo = memory_repo().await;
        repo.insert(&sample(0, [0; 4], false)).await.unwrap();
        repo.insert(&sample(1, [0; 4], false)).await.unwrap();
        repo.insert(&sample(2, [0; 4], true)).await.unwrap();

        let mut untyped = sample(3, [0; 4], false);
        untyped.vehicle_type = None;
        repo.insert(&untyped).await.unwrap();

        let summary = repo.summary().await.unwrap();
        assert_eq!(summary.total_records, 4);
        assert_eq!(summary.by_vehicle_type["Cars"], 2);
        assert_eq!(summary.by_vehicle_type["Emergency"], 1);
        assert_eq!(summary.by_action["Normal"], 3);
        assert_eq!(summary.by_action["Ambulance"], 1);
    }

    #[tokio::test]
    async fn test_closed_pool_rejects_writes() {
        let repo = memory_repo().await;
        repo.close().await;

        let result = repo.insert(&sample(0, [0; 4], false)).await;
        assert!(matches!(result, Err(StorageError::DatabaseError(_))));
    }
}
