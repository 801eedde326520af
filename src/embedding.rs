//! Embedding provider abstraction and implementations.
//!
//! Defines the [`Embedder`] trait and concrete implementations:
//! - **[`DisabledEmbedder`]**: returns errors; used when embeddings are not configured.
//! - **[`GeminiEmbedder`]**: calls the Gemini `batchEmbedContents` endpoint.
//! - **[`OpenAIEmbedder`]**: calls the OpenAI embeddings API.
//! - **[`OllamaEmbedder`]**: calls a local Ollama instance's `/api/embed` endpoint.
//! - **`LocalEmbedder`**: runs models in-process via fastembed (feature
//!   `local-embeddings-fastembed`); no network calls after model download.
//!
//! Also provides vector utilities used by the index:
//! - [`cosine_similarity`]: similarity between two embedding vectors
//! - [`vec_to_blob`] / [`blob_to_vec`]: little-endian `f32` BLOB encoding for SQLite
//!
//! # Retry Strategy
//!
//! HTTP providers retry transient failures with exponential backoff:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{resolve_api_key, EmbeddingConfig, GOOGLE_API_KEY_ENV, OPENAI_API_KEY_ENV};

pub const GEMINI_DEFAULT_URL: &str = "https://generativelanguage.googleapis.com";
pub const OPENAI_DEFAULT_URL: &str = "https://api.openai.com";
pub const OLLAMA_DEFAULT_URL: &str = "http://localhost:11434";

/// What a text is being embedded for. Some providers embed stored
/// documents and search queries into asymmetric spaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedPurpose {
    Document,
    Query,
}

/// The embedding function the index is built on.
///
/// Implementations return one vector per input text, in input order.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-004"`).
    fn model_name(&self) -> &str;

    async fn embed(&self, texts: &[String], purpose: EmbedPurpose) -> Result<Vec<Vec<f32>>>;

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.embed(texts, EmbedPurpose::Document).await
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(&[text.to_string()], EmbedPurpose::Query)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Empty embedding response"))
    }
}

/// Create the [`Embedder`] named by `config.provider`.
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledEmbedder`] |
/// | `"gemini"` | [`GeminiEmbedder`] (needs `GOOGLE_API_KEY`) |
/// | `"openai"` | [`OpenAIEmbedder`] (needs `OPENAI_API_KEY`) |
/// | `"ollama"` | [`OllamaEmbedder`] |
/// | `"local"` | `LocalEmbedder` (feature-gated) |
///
/// # Errors
///
/// Returns an error for unknown provider names, a missing credential, or a
/// provider whose cargo feature is not compiled in.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledEmbedder)),
        "gemini" => Ok(Arc::new(GeminiEmbedder::new(config)?)),
        "openai" => Ok(Arc::new(OpenAIEmbedder::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaEmbedder::new(config)?)),
        #[cfg(feature = "local-embeddings-fastembed")]
        "local" => Ok(Arc::new(LocalEmbedder::new(config)?)),
        #[cfg(not(feature = "local-embeddings-fastembed"))]
        "local" => bail!("Local embedding provider requires --features local-embeddings-fastembed"),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

fn http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

/// POST a JSON body, retrying 429/5xx and network errors with exponential
/// backoff. Returns the decoded JSON response body.
async fn post_json_with_retry(
    client: &reqwest::Client,
    url: &str,
    headers: &[(&str, &str)],
    body: &serde_json::Value,
    max_retries: u32,
    label: &str,
) -> Result<serde_json::Value> {
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tracing::debug!(attempt, ?delay, provider = label, "retrying embedding request");
            tokio::time::sleep(delay).await;
        }

        let mut request = client.post(url).json(body);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return Ok(response.json().await?);
                }

                let body_text = response.text().await.unwrap_or_default();

                // 429 and 5xx are retried
                if status.as_u16() == 429 || status.is_server_error() {
                    last_err = Some(anyhow!("{} API error {}: {}", label, status, body_text));
                    continue;
                }

                bail!("{} API error {}: {}", label, status, body_text);
            }
            Err(e) => {
                last_err = Some(anyhow!("{} connection error ({}): {}", label, url, e));
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow!("{} embedding failed after retries", label)))
}

fn json_to_vec(values: &serde_json::Value, what: &str) -> Result<Vec<f32>> {
    Ok(values
        .as_array()
        .ok_or_else(|| anyhow!("Invalid {} response: embedding is not an array", what))?
        .iter()
        .map(|v| v.as_f64().unwrap_or(0.0) as f32)
        .collect())
}

fn ensure_count(vectors: &[Vec<f32>], expected: usize, label: &str) -> Result<()> {
    if vectors.len() != expected {
        bail!(
            "{} returned {} embeddings for {} inputs",
            label,
            vectors.len(),
            expected
        );
    }
    Ok(())
}

// ============ Disabled Provider ============

/// An embedder that always fails.
///
/// Used when `embedding.provider = "disabled"`. An empty sync still succeeds
/// because the index never calls the embedder for zero documents.
pub struct DisabledEmbedder;

#[async_trait]
impl Embedder for DisabledEmbedder {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn embed(&self, _texts: &[String], _purpose: EmbedPurpose) -> Result<Vec<Vec<f32>>> {
        bail!("Embedding provider is disabled")
    }
}

// ============ Gemini Provider ============

/// Embedder backed by the Gemini API (`models/{model}:batchEmbedContents`).
///
/// Documents are embedded with task type `RETRIEVAL_DOCUMENT`, queries with
/// `RETRIEVAL_QUERY`.
pub struct GeminiEmbedder {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
    batch_size: usize,
    max_retries: u32,
}

impl GeminiEmbedder {
    /// # Errors
    ///
    /// Fails when no API key is configured and `GOOGLE_API_KEY` is unset.
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = resolve_api_key(config.api_key.as_deref(), GOOGLE_API_KEY_ENV)
            .ok_or_else(|| anyhow!("{} not configured", GOOGLE_API_KEY_ENV))?;

        Ok(Self {
            client: http_client(config.timeout_secs)?,
            base_url: config
                .url
                .clone()
                .unwrap_or_else(|| GEMINI_DEFAULT_URL.to_string()),
            model: config.model.clone(),
            api_key,
            batch_size: config.batch_size.max(1),
            max_retries: config.max_retries,
        })
    }

    fn resource_name(&self) -> String {
        gemini_resource_name(&self.model)
    }
}

/// `text-embedding-004` → `models/text-embedding-004`.
pub(crate) fn gemini_resource_name(model: &str) -> String {
    if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{}", model)
    }
}

#[async_trait]
impl Embedder for GeminiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, texts: &[String], purpose: EmbedPurpose) -> Result<Vec<Vec<f32>>> {
        let resource = self.resource_name();
        let url = format!(
            "{}/v1beta/{}:batchEmbedContents",
            self.base_url.trim_end_matches('/'),
            resource
        );
        let task_type = match purpose {
            EmbedPurpose::Document => "RETRIEVAL_DOCUMENT",
            EmbedPurpose::Query => "RETRIEVAL_QUERY",
        };

        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let requests: Vec<serde_json::Value> = batch
                .iter()
                .map(|text| {
                    serde_json::json!({
                        "model": resource,
                        "content": { "parts": [{ "text": text }] },
                        "taskType": task_type,
                    })
                })
                .collect();
            let body = serde_json::json!({ "requests": requests });

            let json = post_json_with_retry(
                &self.client,
                &url,
                &[("x-goog-api-key", self.api_key.as_str())],
                &body,
                self.max_retries,
                "Gemini",
            )
            .await?;
            let parsed = parse_gemini_response(&json)?;
            ensure_count(&parsed, batch.len(), "Gemini")?;
            vectors.extend(parsed);
        }

        Ok(vectors)
    }
}

/// Extract `embeddings[].values` in order.
fn parse_gemini_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    json.get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow!("Invalid Gemini response: missing embeddings array"))?
        .iter()
        .map(|item| {
            let values = item
                .get("values")
                .ok_or_else(|| anyhow!("Invalid Gemini response: missing values"))?;
            json_to_vec(values, "Gemini")
        })
        .collect()
}

// ============ OpenAI Provider ============

/// Embedder backed by `POST /v1/embeddings`.
pub struct OpenAIEmbedder {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
    batch_size: usize,
    max_retries: u32,
}

impl OpenAIEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = resolve_api_key(config.api_key.as_deref(), OPENAI_API_KEY_ENV)
            .ok_or_else(|| anyhow!("{} not configured", OPENAI_API_KEY_ENV))?;

        Ok(Self {
            client: http_client(config.timeout_secs)?,
            base_url: config
                .url
                .clone()
                .unwrap_or_else(|| OPENAI_DEFAULT_URL.to_string()),
            model: config.model.clone(),
            api_key,
            batch_size: config.batch_size.max(1),
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, texts: &[String], _purpose: EmbedPurpose) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/v1/embeddings", self.base_url.trim_end_matches('/'));
        let auth = format!("Bearer {}", self.api_key);

        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let body = serde_json::json!({
                "model": self.model,
                "input": batch,
            });
            let json = post_json_with_retry(
                &self.client,
                &url,
                &[("Authorization", auth.as_str())],
                &body,
                self.max_retries,
                "OpenAI",
            )
            .await?;
            let parsed = parse_openai_response(&json)?;
            ensure_count(&parsed, batch.len(), "OpenAI")?;
            vectors.extend(parsed);
        }

        Ok(vectors)
    }
}

/// Extract `data[].embedding`, ordered by each item's `index`.
fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow!("Invalid OpenAI response: missing data array"))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (fallback, item) in data.iter().enumerate() {
        let embedding = item
            .get("embedding")
            .ok_or_else(|| anyhow!("Invalid OpenAI response: missing embedding"))?;
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(fallback);
        indexed.push((index, json_to_vec(embedding, "OpenAI")?));
    }

    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

// ============ Ollama Provider ============

/// Embedder backed by a local Ollama instance (`POST /api/embed`).
///
/// Requires the model to be pulled (e.g. `ollama pull nomic-embed-text`).
pub struct OllamaEmbedder {
    client: reqwest::Client,
    base_url: String,
    model: String,
    batch_size: usize,
    max_retries: u32,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            base_url: config
                .url
                .clone()
                .unwrap_or_else(|| OLLAMA_DEFAULT_URL.to_string()),
            model: config.model.clone(),
            batch_size: config.batch_size.max(1),
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, texts: &[String], _purpose: EmbedPurpose) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/api/embed", self.base_url.trim_end_matches('/'));

        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let body = serde_json::json!({
                "model": self.model,
                "input": batch,
            });
            let json =
                post_json_with_retry(&self.client, &url, &[], &body, self.max_retries, "Ollama")
                    .await?;
            let parsed = parse_ollama_response(&json)?;
            ensure_count(&parsed, batch.len(), "Ollama")?;
            vectors.extend(parsed);
        }

        Ok(vectors)
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    json.get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow!("Invalid Ollama response: missing embeddings array"))?
        .iter()
        .map(|embedding| json_to_vec(embedding, "Ollama"))
        .collect()
}

// ============ Local Provider (fastembed) ============

/// In-process embedder. The model is downloaded from Hugging Face on first
/// use, then kept loaded for the life of the process.
#[cfg(feature = "local-embeddings-fastembed")]
pub struct LocalEmbedder {
    model_name: String,
    fastembed_model: fastembed::EmbeddingModel,
    batch_size: usize,
    model: Arc<std::sync::Mutex<Option<fastembed::TextEmbedding>>>,
}

#[cfg(feature = "local-embeddings-fastembed")]
impl LocalEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        Ok(Self {
            model_name: config.model.clone(),
            fastembed_model: config_to_fastembed_model(&config.model)?,
            batch_size: config.batch_size.max(1),
            model: Arc::new(std::sync::Mutex::new(None)),
        })
    }
}

#[cfg(feature = "local-embeddings-fastembed")]
fn config_to_fastembed_model(name: &str) -> Result<fastembed::EmbeddingModel> {
    match name {
        "all-minilm-l6-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
        "bge-small-en-v1.5" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
        "nomic-embed-text-v1.5" => Ok(fastembed::EmbeddingModel::NomicEmbedTextV15),
        "multilingual-e5-small" => Ok(fastembed::EmbeddingModel::MultilingualE5Small),
        other => bail!(
            "Unknown local embedding model: '{}'. Supported models: \
             all-minilm-l6-v2, bge-small-en-v1.5, bge-base-en-v1.5, \
             nomic-embed-text-v1.5, multilingual-e5-small",
            other
        ),
    }
}

#[cfg(feature = "local-embeddings-fastembed")]
#[async_trait]
impl Embedder for LocalEmbedder {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn embed(&self, texts: &[String], _purpose: EmbedPurpose) -> Result<Vec<Vec<f32>>> {
        let texts = texts.to_vec();
        let slot = self.model.clone();
        let fastembed_model = self.fastembed_model.clone();
        let batch_size = self.batch_size;

        tokio::task::spawn_blocking(move || {
            let mut guard = slot
                .lock()
                .map_err(|_| anyhow!("local embedding model lock poisoned"))?;
            if guard.is_none() {
                let model = fastembed::TextEmbedding::try_new(
                    fastembed::InitOptions::new(fastembed_model).with_show_download_progress(false),
                )
                .map_err(|e| anyhow!("Failed to initialize local embedding model: {}", e))?;
                *guard = Some(model);
            }
            let model = guard
                .as_mut()
                .ok_or_else(|| anyhow!("local embedding model unavailable"))?;

            model
                .embed(texts, Some(batch_size))
                .map_err(|e| anyhow!("Local embedding failed: {}", e))
        })
        .await?
    }
}

// ============ Vector utilities ============

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// ```rust
/// use taskmaster_rag::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12);
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB written by [`vec_to_blob`].
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`, or `0.0` for empty vectors, vectors of
/// different lengths, and zero vectors.
///
/// ```text
///            a · b
/// cos(θ) = ─────────
///          ‖a‖ × ‖b‖
/// ```
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
