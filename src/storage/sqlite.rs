//! SQLite-backed store for hosts and run summaries.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};

use super::{BenchStore, RunRecord, SavedHost, StorageError};
use crate::runs::Summary;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS hosts (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    url             TEXT    UNIQUE NOT NULL,
    added_at        INTEGER NOT NULL,
    last_used_at    INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS runs (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    created_at      INTEGER NOT NULL,
    host            TEXT,
    summary_json    TEXT    NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_hosts_last_used ON hosts(last_used_at);
"#;

/// Timestamps are stored as unix milliseconds.
fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and apply the schema.
    pub async fn open(path: &str) -> Result<Self, StorageError> {
        let opts = SqliteConnectOptions::from_str(&format!("sqlite://{}", path))
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(opts)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        sqlx::query(SCHEMA_SQL).execute(&pool).await?;

        tracing::info!(path = path, "Bench database opened");
        Ok(Self { pool })
    }
}

#[async_trait]
impl BenchStore for SqliteStore {
    async fn record_host(&self, url: &str) -> Result<(), StorageError> {
        let now = Utc::now().timestamp_millis();
        sqlx::query(
            "INSERT INTO hosts (url, added_at, last_used_at) VALUES (?1, ?2, ?2)
             ON CONFLICT(url) DO UPDATE SET last_used_at = excluded.last_used_at",
        )
        .bind(url)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_hosts(&self) -> Result<Vec<SavedHost>, StorageError> {
        let rows = sqlx::query(
            "SELECT url, added_at, last_used_at FROM hosts ORDER BY last_used_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| SavedHost {
                url: row.get("url"),
                added_at: from_millis(row.get("added_at")),
                last_used_at: from_millis(row.get("last_used_at")),
            })
            .collect())
    }

    async fn delete_host(&self, url: &str) -> Result<bool, StorageError> {
        let result = sqlx::query("DELETE FROM hosts WHERE url = ?1")
            .bind(url)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn persist_summary(&self, summary: &Summary) -> Result<i64, StorageError> {
        let summary_json = serde_json::to_string(summary)?;
        let result =
            sqlx::query("INSERT INTO runs (created_at, host, summary_json) VALUES (?1, ?2, ?3)")
                .bind(Utc::now().timestamp_millis())
                .bind(&summary.host)
                .bind(summary_json)
                .execute(&self.pool)
                .await?;

        let id = result.last_insert_rowid();
        tracing::debug!(record_id = id, host = %summary.host, "Persisted run summary");
        Ok(id)
    }

    async fn list_run_records(&self) -> Result<Vec<RunRecord>, StorageError> {
        let rows = sqlx::query("SELECT id, created_at, host FROM runs ORDER BY id DESC")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(|row| RunRecord {
                id: row.get("id"),
                created_at: from_millis(row.get("created_at")),
                host: row.get("host"),
            })
            .collect())
    }

    async fn fetch_run_record(&self, id: i64) -> Result<Option<Summary>, StorageError> {
        let row = sqlx::query("SELECT summary_json FROM runs WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let json: String = row.get("summary_json");
        let mut summary: Summary = serde_json::from_str(&json)?;
        summary.record_id = Some(id);
        Ok(Some(summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn open_store(dir: &TempDir) -> SqliteStore {
        let path = dir.path().join("bench.db");
        SqliteStore::open(path.to_str().unwrap()).await.unwrap()
    }

    #[tokio::test]
    async fn test_hosts_are_unique_and_most_recent_first() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;

        store.record_host("http://a:11434").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        store.record_host("http://b:11434").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        store.record_host("http://a:11434").await.unwrap();

        let hosts = store.list_hosts().await.unwrap();
        let urls: Vec<_> = hosts.iter().map(|h| h.url.as_str()).collect();
        assert_eq!(urls, vec!["http://a:11434", "http://b:11434"]);

        assert!(store.delete_host("http://a:11434").await.unwrap());
        assert!(!store.delete_host("http://a:11434").await.unwrap());
        assert_eq!(store.list_hosts().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_summary_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;

        let summary = Summary::new("http://a:11434", vec!["etch:1b".to_string()]);
        let first = store.persist_summary(&summary).await.unwrap();
        let second = store.persist_summary(&summary).await.unwrap();
        assert!(second > first);

        let loaded = store.fetch_run_record(first).await.unwrap().unwrap();
        assert_eq!(loaded.record_id, Some(first));
        assert_eq!(loaded.available_models, vec!["etch:1b"]);

        let records = store.list_run_records().await.unwrap();
        assert_eq!(records[0].id, second);
        assert_eq!(records[1].host.as_deref(), Some("http://a:11434"));

        assert!(store.fetch_run_record(9999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reopen_keeps_data() {
        let dir = TempDir::new().unwrap();
        {
            let store = open_store(&dir).await;
            store.record_host("http://kept:11434").await.unwrap();
        }
        let store = open_store(&dir).await;
        assert_eq!(store.list_hosts().await.unwrap()[0].url, "http://kept:11434");
    }
}
