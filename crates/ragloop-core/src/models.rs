//! Core data models that flow through indexing, retrieval and answering.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Free-form string metadata attached to documents and carried onto their
/// chunks and search results.
pub type Metadata = BTreeMap<String, String>;

/// A document in the indexed corpus.
///
/// `source` is assigned at indexing time in corpus order (`doc_0`,
/// `doc_1`, …) and is the identifier reported in answer sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub source: String,
    pub content: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Document {
    /// Synthetic source identifier for the document at `index`.
    pub fn source_id(index: usize) -> String {
        format!("doc_{}", index)
    }

    /// Turn raw corpus entries into documents, assigning sources in order.
    pub fn corpus(entries: Vec<(String, Metadata)>) -> Vec<Document> {
        entries
            .into_iter()
            .enumerate()
            .map(|(i, (content, metadata))| Document {
                source: Self::source_id(i),
                content,
                metadata,
            })
            .collect()
    }
}

/// A contiguous, overlapping slice of a document's text.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: String,
    /// `source` of the document this chunk was cut from.
    pub source: String,
    pub chunk_index: i64,
    pub text: String,
}

/// One retrieved item.
///
/// Semantic results carry `1 - distance` as score and chunk text as
/// content; lexical results carry the raw BM25 score and the whole
/// document. The two scales are not comparable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub content: String,
    pub score: f64,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub metadata: Metadata,
}

/// A fused result: the first-seen instance plus its accumulated fusion score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FusedHit {
    pub result: SearchResult,
    pub fused_score: f64,
}

/// How well an answer's claims are backed by the supplied context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SupportLevel {
    Fully,
    Partially,
    No,
}

impl SupportLevel {
    /// Lenient parse used for model output. Unknown values yield `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "fully" => Some(SupportLevel::Fully),
            "partially" => Some(SupportLevel::Partially),
            "no" => Some(SupportLevel::No),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SupportLevel::Fully => "fully",
            SupportLevel::Partially => "partially",
            SupportLevel::No => "no",
        }
    }
}

impl fmt::Display for SupportLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured verdict produced by the evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub support_level: SupportLevel,
    /// 1–5.
    pub utility_score: u8,
    pub unsupported_claims: Vec<String>,
    pub needs_refinement: bool,
}

impl EvaluationResult {
    /// Build a verdict, deriving `needs_refinement` from the threshold.
    pub fn new(
        support_level: SupportLevel,
        utility_score: u8,
        unsupported_claims: Vec<String>,
        utility_threshold: u8,
    ) -> Self {
        let needs_refinement =
            support_level == SupportLevel::No || utility_score < utility_threshold;
        Self {
            support_level,
            utility_score,
            unsupported_claims,
            needs_refinement,
        }
    }

    /// The verdict used when judgment fails. Never triggers refinement.
    pub fn neutral() -> Self {
        Self {
            support_level: SupportLevel::Partially,
            utility_score: 3,
            unsupported_claims: Vec::new(),
            needs_refinement: false,
        }
    }

    /// `utility_score / 5`, in `[0, 1]`.
    pub fn confidence(&self) -> f64 {
        f64::from(self.utility_score) / 5.0
    }
}

/// The answer to one processed question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub answer: String,
    pub confidence: f64,
    pub sources: Vec<String>,
    pub latency_ms: f64,
    pub tokens_used: u64,
    pub strategy_used: String,
    pub was_refined: bool,
}

/// Running counters and index state of a pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineStats {
    pub total_queries: u64,
    pub total_tokens: u64,
    pub documents_indexed: usize,
    pub chunks_indexed: usize,
    pub vector_store_ready: bool,
    pub collection: String,
}
