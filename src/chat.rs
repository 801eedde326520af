//! Chat controller: answer a question from the indexed tasks and notes.
//!
//! ```text
//! Idle ──▶ Retrieving ──▶ Composing ──▶ Generating ──▶ Done
//!                                                 └──▶ Failed
//! ```
//!
//! Errors up to and including the first fragment are returned from
//! [`answer_stream`]; errors after it arrive as the final item of the
//! stream.

use async_stream::stream;
use futures_util::StreamExt;
use std::io::Write;
use std::sync::Arc;

use crate::backends::Backends;
use crate::config::Config;
use crate::error::RagError;
use crate::generation::{ChatModel, FragmentStream};
use crate::models::ChatQuery;
use crate::prompt::compose;
use crate::retriever::Retriever;

async fn prepare(
    backends: &Backends,
    query: &ChatQuery,
) -> Result<(Arc<dyn ChatModel>, String), RagError> {
    let model = backends.model().await?;
    let index = backends.index().await?;
    let retriever = Retriever::new(index, &backends.config().retrieval);

    tracing::debug!(k = retriever.clamp(query.context_window), "chat: retrieving");
    let docs = retriever
        .retrieve(&query.message, query.context_window)
        .await
        .inspect_err(|e| tracing::warn!(kind = e.kind(), error = %e, "chat: retrieval failed"))?;

    tracing::debug!(documents = docs.len(), "chat: composing");
    let prompt = compose(&docs, &query.message);

    tracing::debug!(model = model.model_name(), "chat: generating");
    Ok((model, prompt))
}

/// Stream the answer to `query` fragment by fragment.
///
/// The first fragment is awaited before returning, so a model that fails
/// straight away surfaces as `Err` rather than as a one-item stream.
/// Dropping the returned stream cancels generation.
pub async fn answer_stream(
    backends: &Backends,
    query: &ChatQuery,
) -> Result<FragmentStream, RagError> {
    let (model, prompt) = prepare(backends, query).await?;
    let mut fragments = model
        .stream(&prompt)
        .await
        .inspect_err(|e| tracing::warn!(kind = e.kind(), error = %e, "chat: generation failed"))?;

    match fragments.next().await {
        Some(Err(e)) => {
            tracing::warn!(kind = e.kind(), error = %e, "chat: generation failed");
            Err(e)
        }
        first => {
            let head = futures_util::stream::iter(first);
            Ok(traced(head.chain(fragments).boxed()))
        }
    }
}

/// The complete answer to `query` as one string.
pub async fn answer(backends: &Backends, query: &ChatQuery) -> Result<String, RagError> {
    let (model, prompt) = prepare(backends, query).await?;
    let answer = model.generate(&prompt).await?;
    tracing::info!(chars = answer.len(), "chat: done");
    Ok(answer)
}

/// `taskmaster ask "<question>"`: answer from the persisted index.
///
/// Fragments are printed as they arrive unless `stream` is false.
pub async fn run_ask(
    config: &Config,
    question: &str,
    k: Option<usize>,
    stream: bool,
) -> anyhow::Result<()> {
    let backends = Backends::new(Arc::new(config.clone()));
    let query = ChatQuery {
        message: question.to_string(),
        context_window: k.unwrap_or(config.retrieval.default_k),
    };

    if stream {
        let mut fragments = answer_stream(&backends, &query).await?;
        let mut stdout = std::io::stdout();
        while let Some(fragment) = fragments.next().await {
            write!(stdout, "{}", fragment?)?;
            stdout.flush()?;
        }
        writeln!(stdout)?;
    } else {
        println!("{}", answer(&backends, &query).await?);
    }
    Ok(())
}

fn traced(mut fragments: FragmentStream) -> FragmentStream {
    Box::pin(stream! {
        let mut count = 0usize;
        while let Some(item) = fragments.next().await {
            match item {
                Ok(fragment) => {
                    count += 1;
                    yield Ok(fragment);
                }
                Err(e) => {
                    tracing::warn!(kind = e.kind(), error = %e, fragments = count, "chat: failed mid-stream");
                    yield Err(e);
                    return;
                }
            }
        }
        tracing::info!(fragments = count, "chat: done");
    })
}
