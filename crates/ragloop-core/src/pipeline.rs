//! The pipeline facade: indexing, hybrid search and the answer loop.
//!
//! A [`Pipeline`] is `Send + Sync` and meant to be shared as
//! `Arc<Pipeline>`.
//!
//! The BM25 index and the vector collection form one logical index guarded
//! by an async `RwLock`. A search holds the read side across both
//! retrievers, so it sees either the old corpus or the new one, never a
//! mix. A rebuild embeds the new corpus without any lock on the index (only
//! the writer mutex, so rebuilds are serialised), then takes the write side
//! just long enough to replace the vector collection and the BM25 index
//! together.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::answer::Answerer;
use crate::chunk::ChunkingParams;
use crate::embedding::Embedder;
use crate::error::{Error, Result};
use crate::evaluate::{Evaluator, Judgment, DEFAULT_UTILITY_THRESHOLD};
use crate::fusion::FusionStrategy;
use crate::lexical::LexicalIndex;
use crate::llm::{Completion, Generator};
use crate::models::{Document, FusedHit, Metadata, PipelineStats, QueryResponse, SearchResult};
use crate::refine::{LoopFailure, RefinementLoop, RefinementPolicy, MAX_REFINEMENTS};
use crate::semantic::{SemanticIndex, DEFAULT_BATCH_SIZE};
use crate::store::VectorStore;

/// Number of fused hits reported as answer sources.
pub const SOURCES_REPORTED: usize = 3;

/// Number of candidates each retriever fetches for a fused output of `k`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanOut {
    /// `max(n, k)`.
    AtLeast(usize),
    /// Exactly `k` from each retriever.
    Output,
}

impl Default for FanOut {
    fn default() -> Self {
        FanOut::AtLeast(10)
    }
}

impl FanOut {
    pub fn fetch(&self, k: usize) -> usize {
        match self {
            FanOut::AtLeast(n) => (*n).max(k),
            FanOut::Output => k,
        }
    }
}

/// Tunables for a [`Pipeline`].
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineParams {
    pub fan_out: FanOut,
    /// Fused results passed to generation when `process` gets no `k`.
    pub rerank_k: usize,
    pub fusion: FusionStrategy,
    pub chunking: ChunkingParams,
    pub batch_size: usize,
    pub utility_threshold: u8,
    pub max_refinements: u32,
    pub refine_with_feedback: bool,
}

impl Default for PipelineParams {
    fn default() -> Self {
        Self {
            fan_out: FanOut::default(),
            rerank_k: 5,
            fusion: FusionStrategy::default(),
            chunking: ChunkingParams::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            utility_threshold: DEFAULT_UTILITY_THRESHOLD,
            max_refinements: MAX_REFINEMENTS,
            refine_with_feedback: true,
        }
    }
}

impl PipelineParams {
    pub fn validate(&self) -> Result<()> {
        if self.fan_out == FanOut::AtLeast(0) {
            return Err(Error::config("retriever_k must be >= 1"));
        }
        if self.rerank_k == 0 {
            return Err(Error::config("rerank_k must be >= 1"));
        }
        match self.fusion {
            FusionStrategy::Rrf { constant } => {
                if !constant.is_finite() || constant < 0.0 {
                    return Err(Error::config("rrf_k must be a non-negative number"));
                }
            }
            FusionStrategy::Weighted {
                semantic_weight,
                lexical_weight,
            } => {
                if semantic_weight < 0.0 || lexical_weight < 0.0 {
                    return Err(Error::config("hybrid weights must be non-negative"));
                }
                if semantic_weight + lexical_weight <= 0.0 {
                    return Err(Error::config("hybrid weights must not both be zero"));
                }
            }
        }
        self.chunking.validate()
    }
}

/// Result of a corpus rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexReport {
    pub documents: usize,
    pub chunks: usize,
}

/// State read by searches. `chunks` is the number of vectors the store holds
/// for this corpus; zero disables the semantic retriever.
struct IndexState {
    lexical: LexicalIndex,
    chunks: usize,
}

impl IndexState {
    fn empty() -> Self {
        Self {
            lexical: LexicalIndex::build(&[]),
            chunks: 0,
        }
    }

    fn semantic_ready(&self) -> bool {
        self.chunks > 0
    }
}

pub struct Pipeline {
    semantic: SemanticIndex,
    answerer: Answerer,
    evaluator: Evaluator,
    policy: RefinementPolicy,
    params: PipelineParams,
    index: RwLock<IndexState>,
    writer: Mutex<()>,
    total_queries: AtomicU64,
    total_tokens: AtomicU64,
    documents_indexed: AtomicUsize,
    chunks_indexed: AtomicUsize,
}

impl Pipeline {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        generator: Arc<dyn Generator>,
        params: PipelineParams,
    ) -> Result<Self> {
        params.validate()?;
        let semantic = SemanticIndex::new(embedder, store, params.chunking, params.batch_size)?;
        let evaluator = Evaluator::new(generator.clone(), params.utility_threshold)?;
        let answerer = Answerer::new(generator, params.refine_with_feedback);

        Ok(Self {
            semantic,
            answerer,
            evaluator,
            policy: RefinementPolicy::new(params.max_refinements),
            params,
            index: RwLock::new(IndexState::empty()),
            writer: Mutex::new(()),
            total_queries: AtomicU64::new(0),
            total_tokens: AtomicU64::new(0),
            documents_indexed: AtomicUsize::new(0),
            chunks_indexed: AtomicUsize::new(0),
        })
    }

    pub fn params(&self) -> &PipelineParams {
        &self.params
    }

    /// Replace the corpus with `texts`, sourced `doc_0`, `doc_1`, ….
    pub async fn add_documents(&self, texts: Vec<String>) -> Result<IndexReport> {
        self.add_documents_with_metadata(
            texts.into_iter().map(|t| (t, Metadata::new())).collect(),
        )
        .await
    }

    /// Replace the corpus, carrying per-document metadata onto chunks and
    /// search results.
    ///
    /// On error the previous corpus stays searchable, except when the store
    /// could not replace its collection atomically: then the semantic
    /// retriever is disabled until the next successful rebuild.
    pub async fn add_documents_with_metadata(
        &self,
        entries: Vec<(String, Metadata)>,
    ) -> Result<IndexReport> {
        let _writer = self.writer.lock().await;

        let documents = Document::corpus(entries);
        let lexical = LexicalIndex::build(&documents);
        let records = self.semantic.prepare(&documents).await?;

        let mut index = self.index.write().await;
        let chunks = match self.semantic.replace(&records).await {
            Ok(chunks) => chunks,
            Err(err) => {
                if !self.semantic.replace_is_atomic() {
                    warn!(
                        collection = self.semantic.collection(),
                        error = %err,
                        "vector collection left inconsistent, disabling semantic retrieval"
                    );
                    index.chunks = 0;
                    self.chunks_indexed.store(0, Ordering::SeqCst);
                }
                return Err(err);
            }
        };
        *index = IndexState { lexical, chunks };
        self.documents_indexed.store(documents.len(), Ordering::SeqCst);
        self.chunks_indexed.store(chunks, Ordering::SeqCst);
        drop(index);

        info!(
            documents = documents.len(),
            chunks,
            collection = self.semantic.collection(),
            "indexed corpus"
        );
        Ok(IndexReport {
            documents: documents.len(),
            chunks,
        })
    }

    /// Fused semantic + lexical results for `query`, at most `k`.
    pub async fn hybrid_search(&self, query: &str, k: usize) -> Result<Vec<FusedHit>> {
        let fetch = self.params.fan_out.fetch(k);

        let index = self.index.read().await;
        let semantic = if index.semantic_ready() {
            self.semantic.query(query, fetch).await?
        } else {
            Vec::new()
        };
        let lexical = index.lexical.query(query, fetch);
        drop(index);

        debug!(
            semantic = semantic.len(),
            lexical = lexical.len(),
            k,
            "hybrid search candidates"
        );
        Ok(self.params.fusion.fuse(semantic, lexical, k))
    }

    /// Answer `question` over the top `k` fused results (default `rerank_k`).
    pub async fn process(&self, question: &str, k: Option<usize>) -> Result<QueryResponse> {
        let start = Instant::now();
        self.total_queries.fetch_add(1, Ordering::SeqCst);

        let k = k.unwrap_or(self.params.rerank_k);
        let hits = self.hybrid_search(question, k).await?;
        let context: Vec<SearchResult> = hits.iter().map(|h| h.result.clone()).collect();

        let outcome = match RefinementLoop::new(&self.answerer, &self.evaluator, self.policy)
            .run(question, &context)
            .await
        {
            Ok(outcome) => outcome,
            Err(LoopFailure { error, tokens_used }) => {
                self.total_tokens.fetch_add(tokens_used, Ordering::SeqCst);
                return Err(error);
            }
        };
        self.total_tokens.fetch_add(outcome.tokens_used, Ordering::SeqCst);

        let sources = hits
            .iter()
            .take(SOURCES_REPORTED)
            .map(|h| h.result.source.clone())
            .collect();
        let latency_ms = start.elapsed().as_secs_f64() * 1000.0;

        info!(
            latency_ms,
            tokens = outcome.tokens_used,
            refined = outcome.was_refined,
            "processed question"
        );

        Ok(QueryResponse {
            answer: outcome.answer,
            confidence: outcome.evaluation.confidence(),
            sources,
            latency_ms,
            tokens_used: outcome.tokens_used,
            strategy_used: self.params.fusion.label().to_string(),
            was_refined: outcome.was_refined,
        })
    }

    /// Single generation over `context`, outside the refinement loop.
    pub async fn generate(&self, question: &str, context: &[SearchResult]) -> Result<Completion> {
        self.answerer.generate(question, context).await
    }

    /// Single judgment of `answer` against `context`. Never fails.
    pub async fn evaluate(&self, answer: &str, context: &[SearchResult]) -> Judgment {
        self.evaluator.evaluate(answer, context).await
    }

    pub fn stats(&self) -> PipelineStats {
        let chunks_indexed = self.chunks_indexed.load(Ordering::SeqCst);
        PipelineStats {
            total_queries: self.total_queries.load(Ordering::SeqCst),
            total_tokens: self.total_tokens.load(Ordering::SeqCst),
            documents_indexed: self.documents_indexed.load(Ordering::SeqCst),
            chunks_indexed,
            vector_store_ready: chunks_indexed > 0,
            collection: self.semantic.collection().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_params_are_valid() {
        assert!(PipelineParams::default().validate().is_ok());
    }

    #[test]
    fn test_fan_out_fetch() {
        assert_eq!(FanOut::AtLeast(10).fetch(5), 10);
        assert_eq!(FanOut::AtLeast(10).fetch(20), 20);
        assert_eq!(FanOut::Output.fetch(5), 5);
    }

    #[test]
    fn test_params_validation() {
        let bad = [
            PipelineParams {
                fan_out: FanOut::AtLeast(0),
                ..Default::default()
            },
            PipelineParams {
                rerank_k: 0,
                ..Default::default()
            },
            PipelineParams {
                fusion: FusionStrategy::Weighted {
                    semantic_weight: 0.0,
                    lexical_weight: 0.0,
                },
                ..Default::default()
            },
            PipelineParams {
                fusion: FusionStrategy::Weighted {
                    semantic_weight: -1.0,
                    lexical_weight: 2.0,
                },
                ..Default::default()
            },
            PipelineParams {
                chunking: ChunkingParams {
                    chunk_size: 100,
                    chunk_overlap: 100,
                },
                ..Default::default()
            },
        ];
        for params in bad {
            assert!(matches!(params.validate(), Err(Error::Configuration(_))));
        }
    }
}
