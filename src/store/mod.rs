//! Storage abstraction for embedded collections.
//!
//! The [`CollectionStore`] trait is the persistence seam under the
//! [`IndexStore`](crate::index::IndexStore): it only knows how to replace
//! and read back a named collection of embedded documents. Ranking
//! happens in memory, above this layer.
//!
//! | Backend | Module | Persistence |
//! |---------|--------|-------------|
//! | SQLite | [`sqlite`] | file under `index.dir` |
//! | In-memory | [`memory`] | process lifetime |

pub mod memory;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::config::IndexConfig;
use crate::models::Document;

/// One embedded document as persisted in a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedDocument {
    /// Zero-based insertion order within the collection.
    pub position: usize,
    pub document: Document,
    pub vector: Vec<f32>,
}

#[async_trait]
pub trait CollectionStore: Send + Sync {
    /// Make `name` hold exactly `entries`, in order, discarding whatever it
    /// held before. Either the whole replacement lands or nothing changes.
    ///
    /// Returns `Ok(false)` when the collection did not exist beforehand.
    async fn replace_collection(&self, name: &str, entries: &[IndexedDocument]) -> Result<bool>;

    /// Read a collection back in insertion order. A missing collection
    /// reads as empty.
    async fn load_collection(&self, name: &str) -> Result<Vec<IndexedDocument>>;
}

/// Open the backend selected by `config.backend`.
pub async fn open_store(config: &IndexConfig) -> Result<Arc<dyn CollectionStore>> {
    match config.backend.as_str() {
        "memory" => Ok(Arc::new(memory::InMemoryStore::new())),
        "sqlite" => Ok(Arc::new(sqlite::SqliteStore::open(&config.db_path()).await?)),
        other => anyhow::bail!("Unknown index backend: {}", other),
    }
}
