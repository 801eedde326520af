//! In-memory [`CollectionStore`] for tests and ephemeral deployments.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use super::{CollectionStore, IndexedDocument};

/// Collections kept in a `HashMap` behind a `RwLock`; gone when the process exits.
#[derive(Default)]
pub struct InMemoryStore {
    collections: RwLock<HashMap<String, Vec<IndexedDocument>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CollectionStore for InMemoryStore {
    async fn replace_collection(&self, name: &str, entries: &[IndexedDocument]) -> Result<bool> {
        let mut collections = self
            .collections
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let existed = if entries.is_empty() {
            collections.remove(name).is_some()
        } else {
            collections
                .insert(name.to_string(), entries.to_vec())
                .is_some()
        };
        Ok(existed)
    }

    async fn load_collection(&self, name: &str) -> Result<Vec<IndexedDocument>> {
        let collections = self
            .collections
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(collections.get(name).cloned().unwrap_or_default())
    }
}
