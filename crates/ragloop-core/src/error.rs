//! Error taxonomy shared by every pipeline stage.
//!
//! Collaborator failures (embedding, generation, judgment, vector store)
//! are [`Error::Provider`] and propagate to the caller. Invalid settings are
//! [`Error::Configuration`] and are raised by constructors, never lazily
//! during a query. [`Error::Parse`] only exists so the evaluator can report
//! a malformed verdict to itself; it is recovered locally and never leaves
//! [`crate::evaluate::Evaluator::evaluate`].

use std::fmt;

use thiserror::Error;

/// The external service a [`Error::Provider`] originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Embedding,
    Generation,
    Judgment,
    VectorStore,
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Service::Embedding => "embedding",
            Service::Generation => "generation",
            Service::Judgment => "judgment",
            Service::VectorStore => "vector store",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("{service} provider error: {message}")]
    Provider { service: Service, message: String },

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("malformed judgment: {0}")]
    Parse(String),
}

impl Error {
    pub fn provider(service: Service, message: impl Into<String>) -> Self {
        Error::Provider {
            service,
            message: message.into(),
        }
    }

    /// A collaborator call that exceeded its deadline.
    pub fn timeout(service: Service, seconds: u64) -> Self {
        Error::Provider {
            service,
            message: format!("request timed out after {}s", seconds),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Error::Configuration(message.into())
    }

    /// Re-tag a provider error with the service the caller was acting as.
    ///
    /// The evaluator talks to the same [`crate::llm::Generator`] as the
    /// answerer; this keeps the error report honest about which stage failed.
    pub fn for_service(self, service: Service) -> Self {
        match self {
            Error::Provider { message, .. } => Error::Provider { service, message },
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_display_names_service() {
        let err = Error::provider(Service::Embedding, "429 rate limited");
        assert_eq!(
            err.to_string(),
            "embedding provider error: 429 rate limited"
        );
    }

    #[test]
    fn test_timeout_is_provider_error() {
        let err = Error::timeout(Service::Generation, 30);
        assert!(matches!(
            err,
            Error::Provider {
                service: Service::Generation,
                ..
            }
        ));
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn test_for_service_retags_only_provider_errors() {
        let err = Error::provider(Service::Generation, "boom").for_service(Service::Judgment);
        assert!(matches!(
            err,
            Error::Provider {
                service: Service::Judgment,
                ..
            }
        ));

        let err = Error::config("bad").for_service(Service::Judgment);
        assert!(matches!(err, Error::Configuration(_)));
    }
}
