//! Sync controller: rebuild the index from a full client snapshot.
//!
//! ```text
//! Idle ──▶ Mapping ──▶ Embedding+Inserting ──▶ Done
//!                        (skipped when empty)   └──▶ Failed
//! ```
//!
//! Clearing the previous collection happens inside
//! [`IndexStore::replace_all`](crate::index::IndexStore::replace_all), after
//! the new documents have been embedded.

use anyhow::Context;
use std::path::Path;
use std::sync::Arc;

use crate::backends::Backends;
use crate::config::Config;
use crate::error::RagError;
use crate::mapper::map_records;
use crate::models::{SyncReport, SyncRequest};

/// Replace the indexed collection with the tasks and notes in `request`.
///
/// On failure nothing is reported as indexed; the error carries its kind.
pub async fn sync(backends: &Backends, request: SyncRequest) -> Result<SyncReport, RagError> {
    let index = backends.index().await?;

    tracing::debug!(
        tasks = request.tasks.len(),
        notes = request.notes.len(),
        "sync: mapping"
    );
    let documents = map_records(&request.tasks, &request.notes);

    tracing::debug!(documents = documents.len(), "sync: embedding and inserting");
    match index.replace_all(documents).await {
        Ok(indexed_items) => {
            tracing::info!(indexed_items, generation = index.generation(), "sync complete");
            Ok(SyncReport { indexed_items })
        }
        Err(e) => {
            tracing::warn!(kind = e.kind(), error = %e, "sync failed");
            Err(e)
        }
    }
}

/// `taskmaster sync <payload.json>`: index a snapshot file in the
/// configured store.
///
/// The payload has the same shape as the `POST /train` body.
pub async fn run_sync(config: &Config, payload: &Path) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(payload)
        .with_context(|| format!("Failed to read sync payload: {}", payload.display()))?;
    let request: SyncRequest = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse sync payload: {}", payload.display()))?;

    let backends = Backends::new(Arc::new(config.clone()));
    let report = sync(&backends, request).await?;

    println!(
        "Indexed {} items into collection '{}'.",
        report.indexed_items, config.index.collection
    );
    Ok(())
}
