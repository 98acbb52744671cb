//! HTTP round-trips against the router with in-process fake providers and a
//! real SQLite vector store.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tempfile::TempDir;

use ragloop::config::Config;
use ragloop::{server, service};
use ragloop_core::evaluate::JUDGE_SYSTEM_PROMPT;
use ragloop_core::tokenize::tokenize;
use ragloop_core::{Completion, Embedder, Error, Generator, Result, Service, VectorStore};

struct HashEmbedder;

#[async_trait]
impl Embedder for HashEmbedder {
    fn model_name(&self) -> &str {
        "hash-bow"
    }

    fn dims(&self) -> usize {
        32
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut v = vec![0.0f32; 32];
                for token in tokenize(text) {
                    let mut hasher = DefaultHasher::new();
                    token.hash(&mut hasher);
                    v[(hasher.finish() % 32) as usize] += 1.0;
                }
                v
            })
            .collect())
    }
}

/// Echoes a fixed answer; judges every answer as fully supported.
struct FakeGenerator {
    fail: bool,
}

#[async_trait]
impl Generator for FakeGenerator {
    fn model_name(&self) -> &str {
        "fake"
    }

    async fn complete(&self, system: &str, _user: &str) -> Result<Completion> {
        if self.fail {
            return Err(Error::provider(Service::Generation, "503 service unavailable"));
        }
        if system == JUDGE_SYSTEM_PROMPT {
            return Ok(Completion::new(
                r#"{"support": "fully", "utility": 4, "issues": []}"#,
                3,
            ));
        }
        Ok(Completion::new("You get 30 days of leave.", 12))
    }
}

async fn spawn_server(fail_generation: bool) -> (TempDir, SocketAddr) {
    let tmp = TempDir::new().unwrap();
    let mut config = Config::default();
    config.vector_store.path = tmp.path().join("ragloop.sqlite");

    let store: Arc<dyn VectorStore> = Arc::new(service::open_store(&config).await.unwrap());
    let pipeline = service::build_pipeline_with(
        &config,
        Arc::new(HashEmbedder),
        store,
        Arc::new(FakeGenerator {
            fail: fail_generation,
        }),
    )
    .unwrap();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = server::router(Arc::new(pipeline));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (tmp, addr)
}

#[tokio::test]
async fn test_health() {
    let (_tmp, addr) = spawn_server(false).await;
    let body: Value = reqwest::get(format!("http://{}/health", addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_index_then_query() {
    let (_tmp, addr) = spawn_server(false).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("http://{}/documents", addr))
        .json(&json!([
            "Policy: 30 days of leave after 12 months.",
            "Expense reports are approved by your line manager."
        ]))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["count"], 2);
    assert_eq!(body["chunks"], 2);

    let resp = client
        .post(format!("http://{}/query", addr))
        .json(&json!({"question": "How many days of leave?"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["answer"], "You get 30 days of leave.");
    assert_eq!(body["sources"][0], "doc_0");
    assert_eq!(body["strategy_used"], "hybrid");
    assert_eq!(body["was_refined"], false);
    assert_eq!(body["tokens_used"], 15);
    assert!((body["confidence"].as_f64().unwrap() - 0.8).abs() < 1e-9);

    let stats: Value = client
        .get(format!("http://{}/stats", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["total_queries"], 1);
    assert_eq!(stats["total_tokens"], 15);
    assert_eq!(stats["documents_indexed"], 2);
    assert_eq!(stats["vector_store_ready"], true);
    assert_eq!(stats["collection"], "rag_enterprise");
}

#[tokio::test]
async fn test_query_before_indexing() {
    let (_tmp, addr) = spawn_server(false).await;
    let body: Value = reqwest::Client::new()
        .post(format!("http://{}/query", addr))
        .json(&json!({"question": "anything", "k": 2}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["sources"], json!([]));
}

#[tokio::test]
async fn test_empty_question_is_bad_request() {
    let (_tmp, addr) = spawn_server(false).await;
    let resp = reqwest::Client::new()
        .post(format!("http://{}/query", addr))
        .json(&json!({"question": "   "}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let (_tmp, addr) = spawn_server(false).await;
    let resp = reqwest::Client::new()
        .post(format!("http://{}/documents", addr))
        .header("Content-Type", "application/json")
        .body(r#"{"not": "an array"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn test_provider_failure_is_bad_gateway() {
    let (_tmp, addr) = spawn_server(true).await;
    let client = reqwest::Client::new();
    let resp = client
        .post(format!("http://{}/query", addr))
        .json(&json!({"question": "anything"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 502);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "provider_error");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("generation"));

    // the failed call is still counted
    let stats: Value = client
        .get(format!("http://{}/stats", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["total_queries"], 1);
}
