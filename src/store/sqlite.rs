//! SQLite-backed [`CollectionStore`].
//!
//! One database file holds every collection. Vectors are stored as
//! little-endian `f32` BLOBs (see [`vec_to_blob`]).
//!
//! ```text
//! collections(name PK, created_at)
//! entries(collection, position, kind, content, embedding)  PK(collection, position)
//! ```
//!
//! `replace_collection` drops the old rows and writes the new ones in a
//! single transaction, so the file always holds one complete collection.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;

use super::{CollectionStore, IndexedDocument};
use crate::embedding::{blob_to_vec, vec_to_blob};
use crate::models::{Document, DocumentKind};

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `db_path` and run migrations.
    pub async fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create index directory: {}", parent.display())
            })?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open index database: {}", db_path.display()))?;

        run_migrations(&pool).await?;
        Ok(Self { pool })
    }
}

async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS collections (
            name TEXT PRIMARY KEY,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS entries (
            collection TEXT NOT NULL,
            position INTEGER NOT NULL,
            kind TEXT NOT NULL,
            content TEXT NOT NULL,
            embedding BLOB NOT NULL,
            PRIMARY KEY (collection, position),
            FOREIGN KEY (collection) REFERENCES collections(name)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

#[async_trait]
impl CollectionStore for SqliteStore {
    async fn replace_collection(&self, name: &str, entries: &[IndexedDocument]) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM entries WHERE collection = ?")
            .bind(name)
            .execute(&mut *tx)
            .await?;
        let existed = sqlx::query("DELETE FROM collections WHERE name = ?")
            .bind(name)
            .execute(&mut *tx)
            .await?
            .rows_affected()
            > 0;

        if !entries.is_empty() {
            sqlx::query("INSERT INTO collections (name, created_at) VALUES (?, ?)")
                .bind(name)
                .bind(chrono::Utc::now().timestamp())
                .execute(&mut *tx)
                .await?;

            for entry in entries {
                sqlx::query(
                    "INSERT INTO entries (collection, position, kind, content, embedding) VALUES (?, ?, ?, ?, ?)",
                )
                .bind(name)
                .bind(entry.position as i64)
                .bind(entry.document.kind.as_str())
                .bind(&entry.document.content)
                .bind(vec_to_blob(&entry.vector))
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(existed)
    }

    async fn load_collection(&self, name: &str) -> Result<Vec<IndexedDocument>> {
        let rows = sqlx::query(
            "SELECT position, kind, content, embedding FROM entries WHERE collection = ? ORDER BY position",
        )
        .bind(name)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let kind: String = row.get("kind");
                let kind = DocumentKind::parse(&kind)
                    .with_context(|| format!("Unknown document kind in index: {}", kind))?;
                let position: i64 = row.get("position");
                let blob: Vec<u8> = row.get("embedding");
                Ok(IndexedDocument {
                    position: position as usize,
                    document: Document::new(row.get::<String, _>("content"), kind),
                    vector: blob_to_vec(&blob),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entries() -> Vec<IndexedDocument> {
        vec![
            IndexedDocument {
                position: 0,
                document: Document::new("Task: Buy milk", DocumentKind::Task),
                vector: vec![1.0, 0.0],
            },
            IndexedDocument {
                position: 1,
                document: Document::new("Note: Remember gym", DocumentKind::Note),
                vector: vec![0.0, 1.0],
            },
        ]
    }

    async fn open_temp() -> (TempDir, SqliteStore) {
        let tmp = TempDir::new().unwrap();
        let store = SqliteStore::open(&tmp.path().join("index.sqlite"))
            .await
            .unwrap();
        (tmp, store)
    }

    #[tokio::test]
    async fn test_roundtrip_preserves_order_and_kind() {
        let (_tmp, store) = open_temp().await;
        store.replace_collection("c", &entries()).await.unwrap();
        let loaded = store.load_collection("c").await.unwrap();
        assert_eq!(loaded, entries());
    }

    #[tokio::test]
    async fn test_replace_reports_previous_existence() {
        let (_tmp, store) = open_temp().await;

        assert!(!store.replace_collection("c", &entries()).await.unwrap());
        assert!(store.replace_collection("c", &entries()[..1]).await.unwrap());
        assert_eq!(store.load_collection("c").await.unwrap().len(), 1);

        assert!(store.replace_collection("c", &[]).await.unwrap());
        assert!(store.load_collection("c").await.unwrap().is_empty());
        assert!(!store.replace_collection("c", &[]).await.unwrap());
    }

    #[tokio::test]
    async fn test_failed_replace_keeps_previous_rows() {
        let (_tmp, store) = open_temp().await;
        store.replace_collection("c", &entries()).await.unwrap();

        // Two entries at the same position violate the primary key.
        let mut broken = entries();
        broken[1].position = 0;
        assert!(store.replace_collection("c", &broken).await.is_err());

        assert_eq!(store.load_collection("c").await.unwrap(), entries());
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("index.sqlite");
        {
            let store = SqliteStore::open(&path).await.unwrap();
            store.replace_collection("c", &entries()).await.unwrap();
        }
        let store = SqliteStore::open(&path).await.unwrap();
        assert_eq!(store.load_collection("c").await.unwrap().len(), 2);
    }
}
