//! # ragloop core
//!
//! Retrieval and answer quality control for question answering over a small
//! document corpus:
//!
//! - [`tokenize`] and [`lexical`]: BM25Okapi over whole documents.
//! - [`chunk`], [`embedding`], [`store`] and [`semantic`]: overlapping
//!   chunks embedded into a pluggable vector store.
//! - [`fusion`]: Reciprocal Rank Fusion of both rankings.
//! - [`answer`], [`evaluate`] and [`refine`]: grounded generation, a JSON
//!   self-judgment, and at most one regeneration.
//! - [`pipeline`]: the facade tying it together with running counters.
//!
//! External services sit behind the [`Embedder`], [`Generator`] and
//! [`VectorStore`] traits. This crate does no network or filesystem I/O;
//! HTTP providers and the SQLite store live in the `ragloop` app crate.

pub mod answer;
pub mod chunk;
pub mod embedding;
pub mod error;
pub mod evaluate;
pub mod fusion;
pub mod lexical;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod refine;
pub mod semantic;
pub mod store;
pub mod tokenize;

pub use embedding::{DistanceMetric, Embedder};
pub use error::{Error, Result, Service};
pub use fusion::FusionStrategy;
pub use llm::{Completion, Generator};
pub use models::{
    Document, EvaluationResult, FusedHit, Metadata, PipelineStats, QueryResponse, SearchResult,
    SupportLevel,
};
pub use pipeline::{FanOut, IndexReport, Pipeline, PipelineParams};
pub use store::{VectorHit, VectorRecord, VectorStore};
