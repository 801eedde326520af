//! OpenAI-compatible chat completions with `stream: true`.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

use super::lines::{decode_fragments, sse_data};
use super::{classify_failure, http_client, send_checked, ChatModel, FragmentStream};
use crate::config::{resolve_api_key, ModelConfig, OPENAI_API_KEY_ENV};
use crate::embedding::OPENAI_DEFAULT_URL;
use crate::error::RagError;

pub struct OpenAIModel {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl OpenAIModel {
    pub fn new(config: &ModelConfig) -> Result<Self> {
        let api_key = resolve_api_key(config.api_key.as_deref(), OPENAI_API_KEY_ENV)
            .ok_or_else(|| anyhow!("{} not configured", OPENAI_API_KEY_ENV))?;

        Ok(Self {
            client: http_client(config.timeout_secs)?,
            base_url: config
                .url
                .clone()
                .unwrap_or_else(|| OPENAI_DEFAULT_URL.to_string()),
            model: config.name.clone(),
            api_key,
        })
    }
}

#[async_trait]
impl ChatModel for OpenAIModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn stream(&self, prompt: &str) -> Result<FragmentStream, RagError> {
        let url = format!(
            "{}/v1/chat/completions",
            self.base_url.trim_end_matches('/')
        );
        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "stream": true,
        });

        let request = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body);
        let response = send_checked(request, "OpenAI").await?;

        Ok(decode_fragments(response, "OpenAI", parse_openai_line))
    }
}

fn parse_openai_line(line: &str) -> Result<Option<String>, RagError> {
    let Some(data) = sse_data(line) else {
        return Ok(None);
    };
    if data.is_empty() || data == "[DONE]" {
        return Ok(None);
    }

    let json: Value = serde_json::from_str(data)
        .map_err(|e| RagError::Failed(format!("OpenAI sent malformed event: {}", e)))?;

    if let Some(error) = json.get("error") {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("unknown error");
        return Err(classify_failure(None, message));
    }

    Ok(json
        .pointer("/choices/0/delta/content")
        .and_then(|c| c.as_str())
        .map(str::to_string))
}
