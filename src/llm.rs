//! OpenAI-compatible chat-completion provider.
//!
//! Calls `POST {base_url}/chat/completions` with a system and a user
//! message and reports `usage.total_tokens` as the tokens consumed.

use async_trait::async_trait;
use ragloop_core::{Completion, Error, Generator, Result, Service};

use crate::config::LlmConfig;
use crate::openai::{api_key_from_env, OpenAiClient};

pub struct OpenAiGenerator {
    model: String,
    temperature: f32,
    client: OpenAiClient,
}

impl OpenAiGenerator {
    /// Create a provider from configuration, reading `OPENAI_API_KEY`.
    pub fn new(config: &LlmConfig) -> Result<Self> {
        Self::with_api_key(config, api_key_from_env()?)
    }

    pub fn with_api_key(config: &LlmConfig, api_key: String) -> Result<Self> {
        if config.model.trim().is_empty() {
            return Err(Error::config("llm.model required for OpenAI provider"));
        }
        let client = OpenAiClient::new(
            Service::Generation,
            &config.base_url,
            api_key,
            config.max_retries,
            config.timeout_secs,
        )?;
        Ok(Self {
            model: config.model.clone(),
            temperature: config.temperature,
            client,
        })
    }
}

#[async_trait]
impl Generator for OpenAiGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, system: &str, user: &str) -> Result<Completion> {
        let body = serde_json::json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
        });
        let json = self.client.post_json("chat/completions", &body).await?;
        parse_completion_response(&json)
    }
}

fn parse_completion_response(json: &serde_json::Value) -> Result<Completion> {
    let text = json
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.pointer("/message/content"))
        .and_then(|c| c.as_str())
        .ok_or_else(|| {
            Error::provider(Service::Generation, "invalid response: missing message content")
        })?;
    let tokens_used = json
        .pointer("/usage/total_tokens")
        .and_then(|t| t.as_u64())
        .unwrap_or(0);
    Ok(Completion::new(text, tokens_used))
}
