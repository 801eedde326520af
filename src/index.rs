//! The vector index: a named collection rebuilt wholesale on every sync.
//!
//! [`IndexStore`] pairs an [`Embedder`] with a [`CollectionStore`] and keeps
//! the current collection in memory as an immutable snapshot. Readers clone
//! the snapshot `Arc` and rank against it, so a retrieval always sees either
//! the collection before a sync or after it, never a partial one. Syncs are
//! serialised behind an async mutex: the last `replace_all` to finish wins.
//!
//! # Sync sequence
//!
//! ```text
//! embed documents ──▶ replace stored collection ──▶ swap snapshot
//!   (skipped if empty)   (one transaction; absent is fine)
//! ```
//!
//! The snapshot is swapped only after the store has committed, so the live
//! collection and the persisted one never diverge. A failure at either step
//! leaves both as they were.

use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;

use crate::embedding::{cosine_similarity, Embedder};
use crate::error::RagError;
use crate::models::{Document, ScoredDocument};
use crate::store::{CollectionStore, IndexedDocument};

#[derive(Default)]
struct Snapshot {
    generation: u64,
    entries: Vec<IndexedDocument>,
}

pub struct IndexStore {
    collection: String,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn CollectionStore>,
    snapshot: RwLock<Arc<Snapshot>>,
    sync_lock: Mutex<()>,
}

impl IndexStore {
    /// Open the index over `store`, loading whatever the last completed sync
    /// persisted under `collection`.
    pub async fn open(
        collection: impl Into<String>,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn CollectionStore>,
    ) -> Result<Self, RagError> {
        let collection = collection.into();
        let entries = store
            .load_collection(&collection)
            .await
            .map_err(RagError::index)?;

        tracing::info!(
            collection = %collection,
            documents = entries.len(),
            embedder = embedder.model_name(),
            "index opened"
        );

        Ok(Self {
            collection,
            embedder,
            store,
            snapshot: RwLock::new(Arc::new(Snapshot {
                generation: 0,
                entries,
            })),
            sync_lock: Mutex::new(()),
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Number of documents visible to retrieval right now.
    pub fn len(&self) -> usize {
        self.current().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Count of completed syncs since the index was opened.
    pub fn generation(&self) -> u64 {
        self.current().generation
    }

    fn current(&self) -> Arc<Snapshot> {
        self.snapshot
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Discard the collection and rebuild it from `documents`.
    ///
    /// Returns the number of documents indexed. An empty `documents` leaves
    /// an empty collection and never calls the embedder.
    ///
    /// # Errors
    ///
    /// [`RagError::IndexUnavailable`] when embedding or the backing store
    /// fails. Either way the previous collection stays in place.
    pub async fn replace_all(&self, documents: Vec<Document>) -> Result<usize, RagError> {
        let _guard = self.sync_lock.lock().await;

        let vectors = if documents.is_empty() {
            Vec::new()
        } else {
            let texts: Vec<String> = documents.iter().map(|d| d.content.clone()).collect();
            tracing::debug!(documents = texts.len(), "embedding documents");
            let vectors = self
                .embedder
                .embed_documents(&texts)
                .await
                .map_err(RagError::index)?;
            if vectors.len() != documents.len() {
                return Err(RagError::IndexUnavailable(format!(
                    "embedder returned {} vectors for {} documents",
                    vectors.len(),
                    documents.len()
                )));
            }
            vectors
        };

        let entries: Vec<IndexedDocument> = documents
            .into_iter()
            .zip(vectors)
            .enumerate()
            .map(|(position, (document, vector))| IndexedDocument {
                position,
                document,
                vector,
            })
            .collect();

        let existed = self
            .store
            .replace_collection(&self.collection, &entries)
            .await
            .map_err(|e| RagError::index(format!("{:#}", e)))?;
        if !existed {
            tracing::debug!(collection = %self.collection, "no previous collection to clear");
        }

        let count = entries.len();
        let mut slot = self
            .snapshot
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let generation = slot.generation + 1;
        *slot = Arc::new(Snapshot {
            generation,
            entries,
        });

        tracing::info!(collection = %self.collection, count, generation, "index replaced");
        Ok(count)
    }

    /// The `k` documents nearest to `query`, most similar first.
    ///
    /// Returns at most `min(k, len)` documents. `k == 0` and an empty
    /// collection both return nothing without calling the embedder.
    /// Equal scores keep index insertion order.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<ScoredDocument>, RagError> {
        let snapshot = self.current();
        if k == 0 || snapshot.entries.is_empty() {
            return Ok(Vec::new());
        }

        let query_vec = self
            .embedder
            .embed_query(query)
            .await
            .map_err(|e| RagError::index(format!("{:#}", e)))?;

        let mut scored: Vec<ScoredDocument> = snapshot
            .entries
            .iter()
            .map(|entry| ScoredDocument {
                document: entry.document.clone(),
                score: cosine_similarity(&query_vec, &entry.vector),
                position: entry.position,
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.position.cmp(&b.position))
        });
        scored.truncate(k.min(snapshot.entries.len()));

        Ok(scored)
    }
}
