//! Shared HTTP plumbing for OpenAI-compatible providers.
//!
//! # Retry Strategy
//!
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors and timeouts → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)
//!
//! Errors surface as [`ragloop_core::Error::Provider`] tagged with the
//! calling service; a request that exhausts its timeout on the final
//! attempt is reported as a timeout.

use std::time::Duration;

use ragloop_core::{Error, Result, Service};
use tracing::warn;

pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Read the API key from [`API_KEY_ENV`].
pub fn api_key_from_env() -> Result<String> {
    match std::env::var(API_KEY_ENV) {
        Ok(key) if !key.trim().is_empty() => Ok(key),
        _ => Err(Error::config(format!(
            "{} environment variable not set",
            API_KEY_ENV
        ))),
    }
}

/// A configured client for one endpoint family.
pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    max_retries: u32,
    timeout_secs: u64,
    service: Service,
}

impl OpenAiClient {
    pub fn new(
        service: Service,
        base_url: &str,
        api_key: String,
        max_retries: u32,
        timeout_secs: u64,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            max_retries,
            timeout_secs,
            service,
        })
    }

    /// POST `body` to `{base_url}/{path}` with retry/backoff and return the
    /// decoded JSON response.
    pub async fn post_json(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value> {
        let url = format!("{}/{}", self.base_url, path);
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s, 8s, ...
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .http
                .post(&url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response.json().await.map_err(|e| {
                            Error::provider(self.service, format!("invalid response body: {}", e))
                        });
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    let err = Error::provider(
                        self.service,
                        format!("API error {}: {}", status, body_text),
                    );

                    // Rate limited or server error, retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        warn!(service = %self.service, %status, attempt, "retrying provider call");
                        last_err = Some(err);
                        continue;
                    }

                    // Client error (not 429), don't retry
                    return Err(err);
                }
                Err(e) => {
                    warn!(service = %self.service, error = %e, attempt, "provider request failed");
                    last_err = Some(if e.is_timeout() {
                        Error::timeout(self.service, self.timeout_secs)
                    } else {
                        Error::provider(self.service, e.to_string())
                    });
                    continue;
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| Error::provider(self.service, "request failed after retries")))
    }
}
