//! Core data models used throughout the pipeline.
//!
//! Records arrive from the client in a sync request, are rendered into
//! [`Document`]s by the [`mapper`](crate::mapper), embedded into the index,
//! and come back out of retrieval as [`ScoredDocument`]s.

use serde::{Deserialize, Serialize};

/// A task as sent by the client. Exists only for the duration of a sync.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct TaskRecord {
    pub title: String,
    /// `null` and a missing field both render as empty text.
    #[serde(default)]
    pub description: Option<String>,
    pub status: String,
    pub priority: String,
    /// Caller-formatted due date, stored verbatim.
    pub date: String,
}

/// Body of `POST /train`: a full snapshot of the client's data.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct SyncRequest {
    pub tasks: Vec<TaskRecord>,
    #[serde(default)]
    pub notes: Vec<String>,
}

/// Outcome of a completed sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    pub indexed_items: usize,
}

/// A question plus the number of documents to retrieve for it.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatQuery {
    pub message: String,
    pub context_window: usize,
}

/// Type tag stored as `metadata.type` on every document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Task,
    Note,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Task => "task",
            DocumentKind::Note => "note",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "task" => Some(DocumentKind::Task),
            "note" => Some(DocumentKind::Note),
            _ => None,
        }
    }
}

/// The unit stored in the index: rendered text plus its type tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub content: String,
    pub kind: DocumentKind,
}

impl Document {
    pub fn new(content: impl Into<String>, kind: DocumentKind) -> Self {
        Self {
            content: content.into(),
            kind,
        }
    }
}

/// A retrieved document with its similarity to the query.
#[derive(Debug, Clone)]
pub struct ScoredDocument {
    pub document: Document,
    /// Cosine similarity, higher is closer.
    pub score: f32,
    /// Insertion order at index time; breaks score ties.
    pub position: usize,
}
