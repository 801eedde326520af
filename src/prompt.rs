//! Prompt composition.
//!
//! The instruction preamble is fixed text; only the context block and the
//! question vary. Changing a single character of [`RAG_TEMPLATE`] breaks
//! comparability with previously recorded prompts.

use crate::models::ScoredDocument;

pub const RAG_TEMPLATE: &str = "You are the 'Task Master Architect', a personal productivity assistant.
Use the following pieces of context (User's Tasks and Notes) to answer the question at the end.
If the answer is not in the context, just answer generally as a helpful assistant.
Keep answers concise and actionable.

Context:
{context}

Question: {question}

Answer:";

/// Join document contents with a blank line, in retrieval order.
pub fn format_context(docs: &[ScoredDocument]) -> String {
    docs.iter()
        .map(|d| d.document.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Fill the template with the retrieved context and the verbatim question.
pub fn compose(docs: &[ScoredDocument], question: &str) -> String {
    fill(&format_context(docs), question)
}

fn fill(context: &str, question: &str) -> String {
    // Single pass: braces inside documents or the question stay literal.
    let (head, rest) = RAG_TEMPLATE
        .split_once("{context}")
        .unwrap_or((RAG_TEMPLATE, ""));
    let (middle, tail) = rest.split_once("{question}").unwrap_or((rest, ""));

    let mut prompt = String::with_capacity(RAG_TEMPLATE.len() + context.len() + question.len());
    prompt.push_str(head);
    prompt.push_str(context);
    prompt.push_str(middle);
    prompt.push_str(question);
    prompt.push_str(tail);
    prompt
}
