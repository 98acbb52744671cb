//! Chat-completion provider trait.
//!
//! One [`Generator`] serves both answer generation and judgment; callers
//! re-tag its errors with [`crate::error::Error::for_service`].

use async_trait::async_trait;

use crate::error::Result;

/// Output of one completion call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    /// Prompt plus completion tokens as reported by the provider, or `0`
    /// when the provider does not report usage.
    pub tokens_used: u64,
}

impl Completion {
    pub fn new(text: impl Into<String>, tokens_used: u64) -> Self {
        Self {
            text: text.into(),
            tokens_used,
        }
    }
}

/// Trait for chat-completion providers.
#[async_trait]
pub trait Generator: Send + Sync {
    fn model_name(&self) -> &str;

    /// Complete a single system + user exchange. No streaming.
    async fn complete(&self, system: &str, user: &str) -> Result<Completion>;
}
