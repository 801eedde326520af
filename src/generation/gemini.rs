//! Gemini `streamGenerateContent` over server-sent events.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

use super::lines::{decode_fragments, sse_data};
use super::{classify_failure, http_client, send_checked, ChatModel, FragmentStream};
use crate::config::{resolve_api_key, ModelConfig, GOOGLE_API_KEY_ENV};
use crate::embedding::{gemini_resource_name, GEMINI_DEFAULT_URL};
use crate::error::RagError;

pub struct GeminiModel {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiModel {
    /// # Errors
    ///
    /// Fails when no API key is configured and `GOOGLE_API_KEY` is unset.
    pub fn new(config: &ModelConfig) -> Result<Self> {
        let api_key = resolve_api_key(config.api_key.as_deref(), GOOGLE_API_KEY_ENV)
            .ok_or_else(|| anyhow!("{} not configured", GOOGLE_API_KEY_ENV))?;

        Ok(Self {
            client: http_client(config.timeout_secs)?,
            base_url: config
                .url
                .clone()
                .unwrap_or_else(|| GEMINI_DEFAULT_URL.to_string()),
            model: config.name.clone(),
            api_key,
        })
    }
}

#[async_trait]
impl ChatModel for GeminiModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn stream(&self, prompt: &str) -> Result<FragmentStream, RagError> {
        let url = format!(
            "{}/v1beta/{}:streamGenerateContent?alt=sse",
            self.base_url.trim_end_matches('/'),
            gemini_resource_name(&self.model)
        );
        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }]
        });

        let request = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body);
        let response = send_checked(request, "Gemini").await?;

        Ok(decode_fragments(response, "Gemini", parse_gemini_line))
    }
}

fn parse_gemini_line(line: &str) -> Result<Option<String>, RagError> {
    let Some(data) = sse_data(line) else {
        return Ok(None);
    };
    if data.is_empty() {
        return Ok(None);
    }

    let json: Value = serde_json::from_str(data)
        .map_err(|e| RagError::Failed(format!("Gemini sent malformed event: {}", e)))?;

    if let Some(error) = json.get("error") {
        let code = error
            .get("code")
            .and_then(|c| c.as_u64())
            .and_then(|c| u16::try_from(c).ok());
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("unknown error");
        return Err(classify_failure(code, message));
    }

    let text: String = json
        .pointer("/candidates/0/content/parts")
        .and_then(|p| p.as_array())
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
                .collect()
        })
        .unwrap_or_default();

    Ok(Some(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_text_parts() {
        let line = r#"data: {"candidates":[{"content":{"parts":[{"text":"Buy "},{"text":"milk"}],"role":"model"}}]}"#;
        assert_eq!(parse_gemini_line(line).unwrap(), Some("Buy milk".to_string()));
    }

    #[test]
    fn test_non_data_lines_are_skipped() {
        assert_eq!(parse_gemini_line("").unwrap(), None);
        assert_eq!(parse_gemini_line(": ping").unwrap(), None);
    }

    #[test]
    fn test_finish_chunk_without_text() {
        let line = r#"data: {"candidates":[{"finishReason":"STOP"}]}"#;
        assert_eq!(parse_gemini_line(line).unwrap(), Some(String::new()));
    }

    #[test]
    fn test_inline_error_is_classified() {
        let line = r#"data: {"error":{"code":503,"message":"The model is overloaded.","status":"UNAVAILABLE"}}"#;
        assert!(matches!(
            parse_gemini_line(line).unwrap_err(),
            RagError::ModelLoading(_)
        ));
    }

    #[test]
    fn test_requires_key() {
        let config = ModelConfig {
            api_key: Some("  ".to_string()),
            ..ModelConfig::default()
        };
        if std::env::var(GOOGLE_API_KEY_ENV).is_err() {
            assert!(GeminiModel::new(&config).is_err());
        }
    }
}
