//! Text generation: the model collaborator behind `/chat`.
//!
//! The [`ChatModel`] trait produces an answer either as a lazy
//! [`FragmentStream`] or as one string. Concrete adapters:
//!
//! | Provider | Struct | Endpoint |
//! |----------|--------|----------|
//! | `gemini` | [`GeminiModel`] | `models/{model}:streamGenerateContent?alt=sse` |
//! | `openai` | [`OpenAIModel`] | `/v1/chat/completions` with `stream: true` |
//! | `ollama` | [`OllamaModel`] | `/api/generate` (NDJSON) |
//!
//! # Failure classification
//!
//! Providers report "not serving yet" in unstructured ways. All of that
//! text inspection lives in [`classify_failure`]: anything that looks like a
//! missing or warming-up model becomes [`RagError::ModelLoading`], the rest
//! [`RagError::Failed`].
//!
//! # Cancellation
//!
//! Fragment streams own the HTTP response body. Dropping the stream drops
//! the connection, which stops generation upstream.

mod gemini;
mod lines;
mod ollama;
mod openai;

pub use gemini::GeminiModel;
pub use ollama::OllamaModel;
pub use openai::OpenAIModel;

use anyhow::{bail, Result};
use async_trait::async_trait;
use futures_util::stream::{BoxStream, StreamExt};
use std::sync::Arc;
use std::time::Duration;

use crate::config::ModelConfig;
use crate::error::RagError;

/// Finite, non-restartable sequence of answer fragments.
pub type FragmentStream = BoxStream<'static, Result<String, RagError>>;

#[async_trait]
pub trait ChatModel: Send + Sync {
    fn model_name(&self) -> &str;

    /// Start generating. Errors returned here happen before any fragment
    /// exists; errors inside the stream happen after some may have been sent.
    async fn stream(&self, prompt: &str) -> Result<FragmentStream, RagError>;

    /// The whole answer: the in-order concatenation of [`stream`](Self::stream).
    async fn generate(&self, prompt: &str) -> Result<String, RagError> {
        let mut fragments = self.stream(prompt).await?;
        let mut answer = String::new();
        while let Some(fragment) = fragments.next().await {
            answer.push_str(&fragment?);
        }
        Ok(answer)
    }
}

/// Create the [`ChatModel`] named by `config.provider`.
///
/// # Errors
///
/// Fails for `"disabled"`, unknown providers, and missing credentials.
pub fn create_model(config: &ModelConfig) -> Result<Arc<dyn ChatModel>> {
    match config.provider.as_str() {
        "gemini" => Ok(Arc::new(GeminiModel::new(config)?)),
        "openai" => Ok(Arc::new(OpenAIModel::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaModel::new(config)?)),
        "disabled" => bail!("Generation model is disabled. Set [model] provider in config."),
        other => bail!("Unknown model provider: {}", other),
    }
}

/// `timeout_secs` bounds the wait for each read, so an answer may stream for
/// as long as the provider keeps sending.
pub(crate) fn http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .read_timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

/// Map a provider failure onto the error taxonomy.
///
/// `status` is the HTTP status when one was received; `detail` is whatever
/// text the provider returned.
pub fn classify_failure(status: Option<u16>, detail: &str) -> RagError {
    const NOT_READY_MARKERS: &[&str] = &["not found", "404", "loading", "unavailable"];

    let lower = detail.to_lowercase();
    let not_ready = matches!(status, Some(404) | Some(503))
        || NOT_READY_MARKERS.iter().any(|m| lower.contains(m));

    let message = match status {
        Some(code) => format!("HTTP {}: {}", code, detail.trim()),
        None => detail.trim().to_string(),
    };

    if not_ready {
        RagError::ModelLoading(message)
    } else {
        RagError::Failed(message)
    }
}

/// Send a generation request and return the response once the provider has
/// accepted it.
pub(crate) async fn send_checked(
    request: reqwest::RequestBuilder,
    label: &str,
) -> Result<reqwest::Response, RagError> {
    let response = request.send().await.map_err(|e| {
        if e.is_connect() {
            RagError::ModelLoading(format!("{} is not reachable: {}", label, e))
        } else {
            RagError::Failed(format!("{} request failed: {}", label, e))
        }
    })?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(classify_failure(
        Some(status.as_u16()),
        &format!("{} API error: {}", label, body),
    ))
}
