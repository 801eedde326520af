//! End-to-end tests: the real router on a local port, driven over HTTP,
//! with a vocabulary embedder and a scripted model standing in for the
//! remote providers.

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use taskmaster_rag::backends::Backends;
use taskmaster_rag::config::Config;
use taskmaster_rag::embedding::{EmbedPurpose, Embedder};
use taskmaster_rag::error::RagError;
use taskmaster_rag::generation::{ChatModel, FragmentStream};
use taskmaster_rag::index::IndexStore;
use taskmaster_rag::quotes::{QuoteBook, QuoteRecord};
use taskmaster_rag::server::router;
use taskmaster_rag::store::memory::InMemoryStore;

const VOCAB: &[&str] = &["buy", "milk", "gym", "report", "deadline", "call"];

struct VocabEmbedder;

#[async_trait]
impl Embedder for VocabEmbedder {
    fn model_name(&self) -> &str {
        "vocab"
    }

    async fn embed(&self, texts: &[String], _purpose: EmbedPurpose) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let lower = text.to_lowercase();
                let words: Vec<&str> = lower
                    .split(|c: char| !c.is_alphanumeric())
                    .collect();
                VOCAB
                    .iter()
                    .map(|v| words.iter().filter(|w| *w == v).count() as f32)
                    .collect()
            })
            .collect())
    }
}

/// Answers about milk when the prompt mentions it, generically otherwise.
/// With `fail_mid_stream`, the second fragment is an error.
#[derive(Default)]
struct ScriptedModel {
    prompts: Mutex<Vec<String>>,
    fail_mid_stream: bool,
}

impl ScriptedModel {
    fn last_prompt(&self) -> String {
        self.prompts.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn stream(&self, prompt: &str) -> Result<FragmentStream, RagError> {
        self.prompts.lock().unwrap().push(prompt.to_string());

        let items: Vec<Result<String, RagError>> = if self.fail_mid_stream {
            vec![
                Ok("Partial".to_string()),
                Err(RagError::Failed("upstream reset".to_string())),
            ]
        } else if prompt.contains("Buy milk") {
            ["You should ", "buy ", "milk", "."]
                .iter()
                .map(|s| Ok(s.to_string()))
                .collect()
        } else {
            ["I can help ", "you plan ", "your day."]
                .iter()
                .map(|s| Ok(s.to_string()))
                .collect()
        };
        Ok(stream::iter(items).boxed())
    }
}

/// Fails before producing anything, the way a provider still loading its
/// weights does.
struct WarmingModel;

#[async_trait]
impl ChatModel for WarmingModel {
    fn model_name(&self) -> &str {
        "warming"
    }

    async fn stream(&self, _prompt: &str) -> Result<FragmentStream, RagError> {
        Ok(stream::once(async {
            Err(RagError::ModelLoading("model is loading".to_string()))
        })
        .boxed())
    }
}

/// Emits a numbered fragment every few milliseconds, counting each one.
struct SlowModel {
    total: usize,
    produced: Arc<AtomicUsize>,
}

#[async_trait]
impl ChatModel for SlowModel {
    fn model_name(&self) -> &str {
        "slow"
    }

    async fn stream(&self, _prompt: &str) -> Result<FragmentStream, RagError> {
        let produced = self.produced.clone();
        Ok(stream::iter(0..self.total)
            .then(move |i| {
                let produced = produced.clone();
                async move {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    produced.fetch_add(1, Ordering::SeqCst);
                    Ok(format!("{} ", i))
                }
            })
            .boxed())
    }
}

struct TestServer {
    addr: SocketAddr,
    client: reqwest::Client,
}

impl TestServer {
    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    async fn train(&self, body: Value) -> reqwest::Response {
        self.client.post(self.url("/train")).json(&body).send().await.unwrap()
    }

    async fn chat(&self, body: Value) -> reqwest::Response {
        self.client.post(self.url("/chat")).json(&body).send().await.unwrap()
    }
}

async fn start(config: Config, model: Option<Arc<dyn ChatModel>>) -> TestServer {
    let index = IndexStore::open(
        config.index.collection.clone(),
        Arc::new(VocabEmbedder),
        Arc::new(InMemoryStore::new()),
    )
    .await
    .unwrap();
    let backends = Arc::new(Backends::with_components(
        Arc::new(config),
        model,
        Some(Arc::new(index)),
    ));
    let quotes = Arc::new(QuoteBook::new(vec![
        QuoteRecord {
            text: Some("First".to_string()),
            author: Some("A".to_string()),
        },
        QuoteRecord {
            text: Some("Second".to_string()),
            author: Some("B".to_string()),
        },
    ]));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = router(backends, quotes);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestServer {
        addr,
        client: reqwest::Client::new(),
    }
}

fn scenario_a_payload() -> Value {
    json!({
        "tasks": [{
            "title": "Buy milk",
            "description": "",
            "status": "todo",
            "priority": "low",
            "date": "2024-01-01"
        }],
        "notes": ["Remember gym"]
    })
}

/// Parse an NDJSON body into its lines.
async fn ndjson(resp: reqwest::Response) -> Vec<Value> {
    let body = resp.text().await.unwrap();
    body.lines()
        .filter(|l| !l.is_empty())
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

fn tokens(lines: &[Value]) -> String {
    lines
        .iter()
        .map(|l| l["token"].as_str().unwrap_or_default())
        .collect()
}

#[tokio::test]
async fn test_status_endpoints() {
    let server = start(Config::default(), Some(Arc::new(ScriptedModel::default()))).await;

    let root: Value = reqwest::get(server.url("/")).await.unwrap().json().await.unwrap();
    assert_eq!(root["status"], "Task Master AI Backend is Online");
    assert_eq!(root["model"], "scripted");

    let health: Value = reqwest::get(server.url("/health")).await.unwrap().json().await.unwrap();
    assert_eq!(health, json!({ "status": "alive", "model": "scripted" }));
}

#[tokio::test]
async fn test_quote_is_stable_within_a_day() {
    let server = start(Config::default(), Some(Arc::new(ScriptedModel::default()))).await;

    let first: Value = reqwest::get(server.url("/quote")).await.unwrap().json().await.unwrap();
    let second: Value = reqwest::get(server.url("/quote")).await.unwrap().json().await.unwrap();
    assert_eq!(first, second);
    assert!(first["quote"] == "First" || first["quote"] == "Second");
}

#[tokio::test]
async fn test_sync_then_chat() {
    let model = Arc::new(ScriptedModel::default());
    let server = start(Config::default(), Some(model.clone())).await;

    let resp = server.train(scenario_a_payload()).await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({ "status": "success", "indexed_items": 2 }));

    let resp = server
        .chat(json!({ "message": "What should I buy?", "context_window": 1 }))
        .await;
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["content-type"], "application/x-ndjson");

    let lines = ndjson(resp).await;
    assert!(lines.len() > 1);
    assert!(lines.iter().all(|l| l.get("token").is_some()));
    assert!(tokens(&lines).contains("milk"));

    let prompt = model.last_prompt();
    assert!(prompt.contains("Context:\nTask: Buy milk\nStatus: todo\nPriority: low\nDueDate: 2024-01-01\nDescription: \n\nQuestion: What should I buy?"));
    assert!(!prompt.contains("Remember gym"));
}

#[tokio::test]
async fn test_chat_before_any_sync() {
    let model = Arc::new(ScriptedModel::default());
    let server = start(Config::default(), Some(model.clone())).await;

    let resp = server.chat(json!({ "message": "How do I start?" })).await;
    assert_eq!(resp.status(), 200);
    let lines = ndjson(resp).await;
    assert_eq!(tokens(&lines), "I can help you plan your day.");
    assert!(model.last_prompt().contains("Context:\n\n\nQuestion: How do I start?"));
}

#[tokio::test]
async fn test_empty_sync_clears_previous_collection() {
    let model = Arc::new(ScriptedModel::default());
    let server = start(Config::default(), Some(model.clone())).await;

    server.train(scenario_a_payload()).await;
    let body: Value = server
        .train(json!({ "tasks": [], "notes": [] }))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body, json!({ "status": "success", "indexed_items": 0 }));

    let lines = ndjson(server.chat(json!({ "message": "buy milk?", "context_window": 50 })).await).await;
    assert!(!tokens(&lines).is_empty());
    assert!(!model.last_prompt().contains("Buy milk"));
}

#[tokio::test]
async fn test_train_without_tasks_is_rejected() {
    let server = start(Config::default(), Some(Arc::new(ScriptedModel::default()))).await;
    let resp = server.train(json!({ "notes": ["only notes"] })).await;
    assert!(resp.status().is_client_error());
}

#[tokio::test]
async fn test_null_description_renders_empty() {
    let model = Arc::new(ScriptedModel::default());
    let server = start(Config::default(), Some(model.clone())).await;

    let body: Value = server
        .train(json!({
            "tasks": [{ "title": "Call bank", "description": null, "status": "todo",
                        "priority": "high", "date": "2024-02-02" }]
        }))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["indexed_items"], 1);

    server.chat(json!({ "message": "call", "context_window": 1 })).await.text().await.unwrap();
    assert!(model.last_prompt().contains("Description: \n\nQuestion: call"));
}

#[tokio::test]
async fn test_missing_model_is_configuration_error() {
    let mut config = Config::default();
    config.model.provider = "disabled".to_string();
    let server = start(config, None).await;

    let resp = server.chat(json!({ "message": "hello" })).await;
    assert_eq!(resp.status(), 500);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "configuration_error");
    assert_eq!(body["error"]["retryable"], false);

    // Sync does not need the model.
    let resp = server.train(scenario_a_payload()).await;
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_mid_stream_failure_ends_with_error_line() {
    let model = Arc::new(ScriptedModel {
        fail_mid_stream: true,
        ..ScriptedModel::default()
    });
    let server = start(Config::default(), Some(model)).await;

    let resp = server.chat(json!({ "message": "anything" })).await;
    assert_eq!(resp.status(), 200);
    let lines = ndjson(resp).await;
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], json!({ "token": "Partial" }));
    assert_eq!(lines[1]["error"]["code"], "internal");
}

#[tokio::test]
async fn test_model_failing_on_first_fragment_is_an_error_response() {
    let server = start(Config::default(), Some(Arc::new(WarmingModel))).await;

    let resp = server.chat(json!({ "message": "anything" })).await;
    assert_eq!(resp.status(), 503);
    assert_eq!(resp.headers()["retry-after"], "10");
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "model_loading");
    assert_eq!(body["error"]["retryable"], true);
}

#[tokio::test]
async fn test_client_disconnect_stops_generation() {
    let produced = Arc::new(AtomicUsize::new(0));
    let model = Arc::new(SlowModel {
        total: 200,
        produced: produced.clone(),
    });
    let server = start(Config::default(), Some(model)).await;

    let mut resp = server.chat(json!({ "message": "anything" })).await;
    assert_eq!(resp.status(), 200);
    assert!(resp.chunk().await.unwrap().is_some());
    drop(resp);

    tokio::time::sleep(Duration::from_millis(300)).await;
    let after_disconnect = produced.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(produced.load(Ordering::SeqCst), after_disconnect);
    assert!(after_disconnect < 200);
}

#[tokio::test]
async fn test_concurrent_syncs_leave_one_complete_snapshot() {
    let model = Arc::new(ScriptedModel::default());
    let server = Arc::new(start(Config::default(), Some(model.clone())).await);

    let small = json!({ "tasks": [], "notes": ["gym"] });
    let large = json!({ "tasks": [], "notes": ["call mom", "call dad", "report deadline"] });
    let (a, b) = tokio::join!(server.train(small), server.train(large));
    assert_eq!(a.status(), 200);
    assert_eq!(b.status(), 200);

    server
        .chat(json!({ "message": "anything", "context_window": 50 }))
        .await
        .text()
        .await
        .unwrap();
    let prompt = model.last_prompt();
    let only_small = prompt.contains("Note: gym") && !prompt.contains("Note: call mom");
    let only_large = !prompt.contains("Note: gym")
        && prompt.contains("Note: call mom")
        && prompt.contains("Note: call dad")
        && prompt.contains("Note: report deadline");
    assert!(only_small || only_large, "torn snapshot: {}", prompt);
}
