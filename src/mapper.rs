//! Record → document rendering.
//!
//! Every task and note is rendered into a fixed textual layout before it is
//! embedded. Rendering never rejects input: whatever the client sent is
//! interpolated verbatim.
//!
//! ```text
//! Task: {title}
//! Status: {status}
//! Priority: {priority}
//! DueDate: {date}
//! Description: {description}
//!
//! Note: {text}
//! ```

use crate::models::{Document, DocumentKind, TaskRecord};

/// Render one task into its document text.
pub fn render_task(task: &TaskRecord) -> String {
    format!(
        "Task: {}\nStatus: {}\nPriority: {}\nDueDate: {}\nDescription: {}",
        task.title,
        task.status,
        task.priority,
        task.date,
        task.description.as_deref().unwrap_or_default()
    )
}

/// Render one note into its document text.
pub fn render_note(note: &str) -> String {
    format!("Note: {}", note)
}

/// Map a sync snapshot into documents: all tasks in input order, then all
/// notes in input order.
pub fn map_records(tasks: &[TaskRecord], notes: &[String]) -> Vec<Document> {
    let mut documents = Vec::with_capacity(tasks.len() + notes.len());
    documents.extend(
        tasks
            .iter()
            .map(|t| Document::new(render_task(t), DocumentKind::Task)),
    );
    documents.extend(
        notes
            .iter()
            .map(|n| Document::new(render_note(n), DocumentKind::Note)),
    );
    documents
}
