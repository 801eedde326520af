use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const GOOGLE_API_KEY_ENV: &str = "GOOGLE_API_KEY";
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub model: ModelConfig,
    pub embedding: EmbeddingConfig,
    pub index: IndexConfig,
    pub retrieval: RetrievalConfig,
    pub quotes: QuotesConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            log_level: "info".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Text-generation backend.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ModelConfig {
    /// `gemini`, `openai`, `ollama`, or `disabled`.
    pub provider: String,
    pub name: String,
    /// Base URL override; each provider has its own default.
    pub url: Option<String>,
    /// Falls back to the provider's environment variable at first use.
    pub api_key: Option<String>,
    /// Longest silence tolerated between reads of a response.
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            name: "gemini-2.0-flash".to_string(),
            url: None,
            api_key: None,
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// `gemini`, `openai`, `ollama`, `local`, or `disabled`.
    pub provider: String,
    pub model: String,
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub batch_size: usize,
    pub max_retries: u32,
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            model: "text-embedding-004".to_string(),
            url: None,
            api_key: None,
            batch_size: 64,
            max_retries: 3,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct IndexConfig {
    /// `sqlite` (persisted under `dir`) or `memory`.
    pub backend: String,
    pub dir: PathBuf,
    pub collection: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            backend: "sqlite".to_string(),
            dir: PathBuf::from("./index_db"),
            collection: "task_master_data".to_string(),
        }
    }
}

impl IndexConfig {
    pub fn db_path(&self) -> PathBuf {
        self.dir.join("index.sqlite")
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Used when a chat request carries no `context_window`.
    pub default_k: usize,
    /// Hard ceiling on any requested window.
    pub max_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_k: 5,
            max_k: 50,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct QuotesConfig {
    pub path: PathBuf,
}

impl Default for QuotesConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/quotes.json"),
        }
    }
}

/// Load configuration: TOML file (when given), then environment overrides,
/// then validation.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            toml::from_str(&content).with_context(|| "Failed to parse config file")?
        }
        None => Config::default(),
    };

    config.apply_env(|key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}

impl Config {
    /// Apply the recognised environment overrides. `lookup` is injectable so
    /// tests don't touch the process environment.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("HOST") {
            self.server.host = v;
        }
        if let Some(port) = lookup("PORT").and_then(|v| v.parse().ok()) {
            self.server.port = port;
        }
        if let Some(v) = lookup("LOG_LEVEL") {
            self.server.log_level = v;
        }
        if let Some(v) = lookup("AI_PROVIDER") {
            self.model.provider = v;
        }
        if let Some(v) = lookup("AI_MODEL") {
            self.model.name = v;
        }
        if let Some(v) = lookup("AI_MODEL_URL") {
            self.model.url = Some(v);
        }
        if let Some(v) = lookup("AI_EMBED_PROVIDER") {
            self.embedding.provider = v;
        }
        if let Some(v) = lookup("AI_EMBED_MODEL") {
            self.embedding.model = v;
        }
        if let Some(v) = lookup("AI_EMBED_URL") {
            self.embedding.url = Some(v);
        }
        if let Some(v) = lookup("INDEX_BACKEND") {
            self.index.backend = v;
        }
        if let Some(v) = lookup("INDEX_DIR") {
            self.index.dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("QUOTES_FILE") {
            self.quotes.path = PathBuf::from(v);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("server.port must be > 0");
        }

        if self.retrieval.max_k < 1 {
            anyhow::bail!("retrieval.max_k must be >= 1");
        }
        if self.retrieval.default_k > self.retrieval.max_k {
            anyhow::bail!(
                "retrieval.default_k ({}) must not exceed retrieval.max_k ({})",
                self.retrieval.default_k,
                self.retrieval.max_k
            );
        }

        if self.embedding.batch_size == 0 {
            anyhow::bail!("embedding.batch_size must be > 0");
        }

        match self.model.provider.as_str() {
            "gemini" | "openai" | "ollama" | "disabled" => {}
            other => anyhow::bail!(
                "Unknown model provider: '{}'. Must be gemini, openai, ollama, or disabled.",
                other
            ),
        }

        match self.embedding.provider.as_str() {
            "gemini" | "openai" | "ollama" | "local" | "disabled" => {}
            other => anyhow::bail!(
                "Unknown embedding provider: '{}'. Must be gemini, openai, ollama, local, or disabled.",
                other
            ),
        }

        match self.index.backend.as_str() {
            "sqlite" | "memory" => {}
            other => anyhow::bail!(
                "Unknown index backend: '{}'. Must be sqlite or memory.",
                other
            ),
        }

        Ok(())
    }
}

/// Resolve a provider credential: explicit config first, then the
/// provider's environment variable.
pub fn resolve_api_key(explicit: Option<&str>, env_var: &str) -> Option<String> {
    explicit
        .map(str::to_string)
        .or_else(|| std::env::var(env_var).ok())
        .filter(|k| !k.trim().is_empty())
}
