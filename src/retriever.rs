//! Top-k retrieval over the [`IndexStore`].
//!
//! Clamps the caller's window to `retrieval.max_k` before searching and
//! guarantees a stable order: similarity descending, then index insertion
//! order. Nothing is cached; every call re-embeds the query.

use std::sync::Arc;

use crate::config::RetrievalConfig;
use crate::error::RagError;
use crate::index::IndexStore;
use crate::models::ScoredDocument;

pub struct Retriever {
    index: Arc<IndexStore>,
    max_k: usize,
}

impl Retriever {
    pub fn new(index: Arc<IndexStore>, config: &RetrievalConfig) -> Self {
        Self {
            index,
            max_k: config.max_k,
        }
    }

    /// Effective window for a requested `k`.
    pub fn clamp(&self, k: usize) -> usize {
        k.min(self.max_k)
    }

    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<ScoredDocument>, RagError> {
        let k = self.clamp(k);
        let mut docs = self.index.retrieve(query, k).await?;

        docs.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.position.cmp(&b.position))
        });

        tracing::debug!(requested = k, returned = docs.len(), "retrieved context");
        Ok(docs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::tests::VocabEmbedder;
    use crate::models::{Document, DocumentKind};
    use crate::store::memory::InMemoryStore;

    async fn retriever(max_k: usize, notes: &[&str]) -> Retriever {
        let index = IndexStore::open(
            "c",
            Arc::new(VocabEmbedder::new()),
            Arc::new(InMemoryStore::new()),
        )
        .await
        .unwrap();
        index
            .replace_all(
                notes
                    .iter()
                    .map(|n| Document::new(format!("Note: {}", n), DocumentKind::Note))
                    .collect(),
            )
            .await
            .unwrap();
        Retriever::new(
            Arc::new(index),
            &RetrievalConfig {
                default_k: 1,
                max_k,
            },
        )
    }

    #[tokio::test]
    async fn test_window_clamped_to_max_k() {
        let r = retriever(2, &["buy milk", "gym", "call"]).await;
        assert_eq!(r.clamp(usize::MAX), 2);
        assert_eq!(r.retrieve("milk", 1_000_000).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_ties_keep_insertion_order() {
        let r = retriever(10, &["gym", "call", "report"]).await;
        let docs = r.retrieve("nothing in vocabulary", 3).await.unwrap();
        let positions: Vec<usize> = docs.iter().map(|d| d.position).collect();
        assert_eq!(positions, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_most_similar_first() {
        let r = retriever(10, &["gym", "buy milk"]).await;
        let docs = r.retrieve("What should I buy?", 1).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].document.content, "Note: buy milk");
    }
}
