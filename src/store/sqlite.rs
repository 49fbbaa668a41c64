//! SQLite-backed similarity index.
//!
//! One file holds every collection. Vectors are stored as little-endian
//! `f32` BLOBs and compared in Rust; the handbook is small enough that a
//! brute-force scan per query is the whole search.

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;

use super::{rank_candidates, StoreError, StoredRecord, VectorStore};
use crate::embedding::{blob_to_vec, vec_to_blob};
use crate::models::{IndexedRecord, RecordMatch};

/// Distance metric recorded for every collection this store creates.
const DISTANCE_COSINE: &str = "cosine";

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the index file at `path`.
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Other(format!(
                        "failed to create index directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS collections (
                name TEXT PRIMARY KEY,
                distance TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS records (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                position INTEGER NOT NULL,
                text TEXT NOT NULL,
                source TEXT NOT NULL,
                embedding BLOB NOT NULL,
                PRIMARY KEY (collection, id),
                FOREIGN KEY (collection) REFERENCES collections(name)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_records_collection_source ON records(collection, source)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn collection_exists(&self, name: &str) -> Result<bool, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM collections WHERE name = ?")
            .bind(name)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }
}

#[async_trait]
impl VectorStore for SqliteStore {
    async fn replace_collection(
        &self,
        name: &str,
        records: &[IndexedRecord],
    ) -> Result<(), StoreError> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM records WHERE collection = ?")
            .bind(name)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM collections WHERE name = ?")
            .bind(name)
            .execute(&mut *tx)
            .await?;

        sqlx::query("INSERT INTO collections (name, distance, created_at) VALUES (?, ?, ?)")
            .bind(name)
            .bind(DISTANCE_COSINE)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        for (position, record) in records.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO records (collection, id, position, text, source, embedding)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(name)
            .bind(&record.id)
            .bind(position as i64)
            .bind(&record.text)
            .bind(&record.source)
            .bind(vec_to_blob(&record.embedding))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn query(
        &self,
        name: &str,
        vector: &[f32],
        k: usize,
        source: Option<&str>,
    ) -> Result<Vec<RecordMatch>, StoreError> {
        if !self.collection_exists(name).await? {
            return Err(StoreError::CollectionNotFound(name.to_string()));
        }

        let rows = sqlx::query(
            r#"
            SELECT id, text, source, embedding
            FROM records
            WHERE collection = ? AND (? IS NULL OR source = ?)
            ORDER BY position
            "#,
        )
        .bind(name)
        .bind(source)
        .bind(source)
        .fetch_all(&self.pool)
        .await?;

        let candidates = rows.iter().map(|row| {
            let blob: Vec<u8> = row.get("embedding");
            (
                StoredRecord {
                    id: row.get("id"),
                    text: row.get("text"),
                    source: row.get("source"),
                },
                blob_to_vec(&blob),
            )
        });

        Ok(rank_candidates(vector, candidates, k))
    }

    async fn records(&self, name: &str) -> Result<Vec<StoredRecord>, StoreError> {
        if !self.collection_exists(name).await? {
            return Err(StoreError::CollectionNotFound(name.to_string()));
        }

        let rows = sqlx::query(
            "SELECT id, text, source FROM records WHERE collection = ? ORDER BY position",
        )
        .bind(name)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| StoredRecord {
                id: row.get("id"),
                text: row.get("text"),
                source: row.get("source"),
            })
            .collect())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
