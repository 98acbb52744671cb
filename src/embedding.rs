//! OpenAI-compatible embedding provider.
//!
//! Calls `POST {base_url}/embeddings` with the configured model. Batching is
//! done by the caller (the semantic index sends `embedding.batch_size` texts
//! per call); retries and backoff are handled by [`OpenAiClient`].

use async_trait::async_trait;
use ragloop_core::{Embedder, Error, Result, Service};

use crate::config::EmbeddingConfig;
use crate::openai::{api_key_from_env, OpenAiClient};

pub struct OpenAiEmbedder {
    /// Model name (e.g. `"text-embedding-3-small"`).
    model: String,
    /// Vector dimensionality (e.g. `1536`).
    dims: usize,
    client: OpenAiClient,
}

impl OpenAiEmbedder {
    /// Create a provider from configuration, reading `OPENAI_API_KEY`.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] if the key is missing or the model is empty.
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        Self::with_api_key(config, api_key_from_env()?)
    }

    pub fn with_api_key(config: &EmbeddingConfig, api_key: String) -> Result<Self> {
        if config.model.trim().is_empty() {
            return Err(Error::config("embedding.model required for OpenAI provider"));
        }
        let client = OpenAiClient::new(
            Service::Embedding,
            &config.base_url,
            api_key,
            config.max_retries,
            config.timeout_secs,
        )?;
        Ok(Self {
            model: config.model.clone(),
            dims: config.dims,
            client,
        })
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        let json = self.client.post_json("embeddings", &body).await?;
        parse_embeddings_response(&json)
    }
}

/// Parse an embeddings API response.
///
/// Extracts the `data[].embedding` arrays, ordered by `data[].index` so the
/// result matches input order.
fn parse_embeddings_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| Error::provider(Service::Embedding, "invalid response: missing data array"))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| Error::provider(Service::Embedding, "invalid response: missing embedding"))?;
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .unwrap_or(position as u64);

        let vec: Vec<f32> = embedding
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();
        indexed.push((index, vec));
    }

    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, vec)| vec).collect())
}
