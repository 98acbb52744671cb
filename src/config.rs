//! TOML configuration.
//!
//! Every section is optional; a missing file section or key takes the
//! built-in default. [`load_config`] parses and validates a file,
//! [`Config::default`] is used when no `--config` is given.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use ragloop_core::chunk::ChunkingParams;
use ragloop_core::{DistanceMetric, FanOut, FusionStrategy, PipelineParams};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub vector_store: VectorStoreConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub evaluation: EvaluationConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub loader: LoaderConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_llm_model(),
            temperature: default_temperature(),
            base_url: default_base_url(),
            max_retries: default_max_retries(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_embedding_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_embedding_model(),
            dims: default_dims(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_embedding_timeout_secs(),
            base_url: default_base_url(),
        }
    }
}

fn default_provider() -> String {
    "openai".to_string()
}
fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}
fn default_temperature() -> f32 {
    0.1
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_dims() -> usize {
    1536
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_llm_timeout_secs() -> u64 {
    60
}
fn default_embedding_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct VectorStoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_metric")]
    pub metric: String,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            collection: default_collection(),
            metric: default_metric(),
        }
    }
}

fn default_store_path() -> PathBuf {
    PathBuf::from("./data/ragloop.sqlite")
}
fn default_collection() -> String {
    "rag_enterprise".to_string()
}
fn default_metric() -> String {
    "cosine".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_retriever_k")]
    pub retriever_k: usize,
    /// `"retriever_k"` fetches `max(retriever_k, k)` per retriever; `"k"`
    /// fetches exactly the number of fused results requested.
    #[serde(default = "default_fan_out")]
    pub fan_out: String,
    #[serde(default = "default_rerank_k")]
    pub rerank_k: usize,
    #[serde(default = "default_fusion")]
    pub fusion: String,
    #[serde(default = "default_rrf_k")]
    pub rrf_k: f64,
    #[serde(default = "default_weight")]
    pub hybrid_semantic_weight: f64,
    #[serde(default = "default_weight")]
    pub hybrid_bm25_weight: f64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            retriever_k: default_retriever_k(),
            fan_out: default_fan_out(),
            rerank_k: default_rerank_k(),
            fusion: default_fusion(),
            rrf_k: default_rrf_k(),
            hybrid_semantic_weight: default_weight(),
            hybrid_bm25_weight: default_weight(),
        }
    }
}

fn default_retriever_k() -> usize {
    10
}
fn default_fan_out() -> String {
    "retriever_k".to_string()
}
fn default_rerank_k() -> usize {
    5
}
fn default_fusion() -> String {
    "rrf".to_string()
}
fn default_rrf_k() -> f64 {
    60.0
}
fn default_weight() -> f64 {
    0.5
}

#[derive(Debug, Deserialize, Clone)]
pub struct EvaluationConfig {
    #[serde(default = "default_utility_threshold")]
    pub utility_threshold: u8,
    #[serde(default = "default_max_refinements")]
    pub max_refinements: u32,
    #[serde(default = "default_true")]
    pub refine_with_feedback: bool,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            utility_threshold: default_utility_threshold(),
            max_refinements: default_max_refinements(),
            refine_with_feedback: true,
        }
    }
}

fn default_utility_threshold() -> u8 {
    3
}
fn default_max_refinements() -> u32 {
    1
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoaderConfig {
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            follow_symlinks: false,
        }
    }
}

fn default_include_globs() -> Vec<String> {
    vec!["**/*.md".to_string(), "**/*.txt".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        // Validate providers
        for (section, provider) in [
            ("llm", &self.llm.provider),
            ("embedding", &self.embedding.provider),
        ] {
            if provider != "openai" {
                bail!(
                    "Unknown {} provider: '{}'. Must be openai.",
                    section,
                    provider
                );
            }
        }
        if self.llm.model.trim().is_empty() {
            bail!("llm.model must not be empty");
        }
        if self.embedding.model.trim().is_empty() {
            bail!("embedding.model must not be empty");
        }
        if self.embedding.dims == 0 {
            bail!("embedding.dims must be > 0");
        }
        if self.embedding.batch_size == 0 {
            bail!("embedding.batch_size must be > 0");
        }

        // Validate vector store
        if self.vector_store.collection.trim().is_empty() {
            bail!("vector_store.collection must not be empty");
        }
        self.metric()?;

        // Validate chunking
        if self.chunking.chunk_size == 0 {
            bail!("chunking.chunk_size must be > 0");
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            bail!("chunking.chunk_overlap must be smaller than chunking.chunk_size");
        }

        // Validate retrieval
        if self.retrieval.retriever_k < 1 {
            bail!("retrieval.retriever_k must be >= 1");
        }
        if self.retrieval.rerank_k < 1 {
            bail!("retrieval.rerank_k must be >= 1");
        }
        if self.retrieval.hybrid_semantic_weight < 0.0 || self.retrieval.hybrid_bm25_weight < 0.0 {
            bail!("retrieval hybrid weights must be non-negative");
        }
        if self.retrieval.hybrid_semantic_weight + self.retrieval.hybrid_bm25_weight <= 0.0 {
            bail!("retrieval hybrid weights must not both be zero");
        }
        self.fusion()?;
        self.fan_out()?;

        // Validate evaluation
        if !(1..=5).contains(&self.evaluation.utility_threshold) {
            bail!("evaluation.utility_threshold must be in 1..=5");
        }

        Ok(())
    }

    pub fn metric(&self) -> Result<DistanceMetric> {
        match DistanceMetric::parse(&self.vector_store.metric) {
            Some(metric) => Ok(metric),
            None => bail!(
                "Unknown vector_store.metric: '{}'. Must be cosine or l2.",
                self.vector_store.metric
            ),
        }
    }

    pub fn fusion(&self) -> Result<FusionStrategy> {
        match self.retrieval.fusion.as_str() {
            "rrf" => Ok(FusionStrategy::Rrf {
                constant: self.retrieval.rrf_k,
            }),
            "weighted" => Ok(FusionStrategy::Weighted {
                semantic_weight: self.retrieval.hybrid_semantic_weight,
                lexical_weight: self.retrieval.hybrid_bm25_weight,
            }),
            other => bail!(
                "Unknown retrieval.fusion: '{}'. Must be rrf or weighted.",
                other
            ),
        }
    }

    pub fn fan_out(&self) -> Result<FanOut> {
        match self.retrieval.fan_out.as_str() {
            "retriever_k" => Ok(FanOut::AtLeast(self.retrieval.retriever_k)),
            "k" => Ok(FanOut::Output),
            other => bail!(
                "Unknown retrieval.fan_out: '{}'. Must be retriever_k or k.",
                other
            ),
        }
    }

    pub fn pipeline_params(&self) -> Result<PipelineParams> {
        Ok(PipelineParams {
            fan_out: self.fan_out()?,
            rerank_k: self.retrieval.rerank_k,
            fusion: self.fusion()?,
            chunking: ChunkingParams {
                chunk_size: self.chunking.chunk_size,
                chunk_overlap: self.chunking.chunk_overlap,
            },
            batch_size: self.embedding.batch_size,
            utility_threshold: self.evaluation.utility_threshold,
            max_refinements: self.evaluation.max_refinements,
            refine_with_feedback: self.evaluation.refine_with_feedback,
        })
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}

/// Load `path` if given, otherwise validated defaults.
pub fn load_or_default(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => load_config(path),
        None => {
            let config = Config::default();
            config.validate()?;
            Ok(config)
        }
    }
}
