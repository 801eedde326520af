//! Ollama `/api/generate`, streamed as newline-delimited JSON.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};

use super::lines::decode_fragments;
use super::{classify_failure, http_client, send_checked, ChatModel, FragmentStream};
use crate::config::ModelConfig;
use crate::embedding::OLLAMA_DEFAULT_URL;
use crate::error::RagError;

/// Self-hosted models. A model that is still being pulled or loaded answers
/// with 404 or an `error` object, which surfaces as
/// [`RagError::ModelLoading`].
pub struct OllamaModel {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaModel {
    pub fn new(config: &ModelConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            base_url: config
                .url
                .clone()
                .unwrap_or_else(|| OLLAMA_DEFAULT_URL.to_string()),
            model: config.name.clone(),
        })
    }
}

#[async_trait]
impl ChatModel for OllamaModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn stream(&self, prompt: &str) -> Result<FragmentStream, RagError> {
        let url = format!("{}/api/generate", self.base_url.trim_end_matches('/'));
        let body = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": true,
        });

        let response = send_checked(self.client.post(&url).json(&body), "Ollama").await?;
        Ok(decode_fragments(response, "Ollama", parse_ollama_line))
    }
}

fn parse_ollama_line(line: &str) -> Result<Option<String>, RagError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let json: Value = serde_json::from_str(line)
        .map_err(|e| RagError::Failed(format!("Ollama sent malformed line: {}", e)))?;

    if let Some(error) = json.get("error").and_then(|e| e.as_str()) {
        return Err(classify_failure(None, error));
    }

    Ok(json
        .get("response")
        .and_then(|r| r.as_str())
        .map(str::to_string))
}
