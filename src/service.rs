//! Build a [`Pipeline`] from configuration.
//!
//! Provider construction happens first so a missing `OPENAI_API_KEY` fails
//! before any file is touched.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use ragloop_core::{Embedder, Generator, IndexReport, Pipeline, VectorStore};

use crate::config::Config;
use crate::embedding::OpenAiEmbedder;
use crate::llm::OpenAiGenerator;
use crate::loader::load_documents;
use crate::sqlite_store::SqliteVectorStore;
use crate::{db, migrate};

/// Open the configured SQLite vector store, creating its schema.
pub async fn open_store(config: &Config) -> Result<SqliteVectorStore> {
    let pool = db::connect(&config.vector_store.path).await?;
    migrate::run_migrations(&pool).await?;
    Ok(SqliteVectorStore::new(
        pool,
        config.vector_store.collection.clone(),
        config.metric()?,
    ))
}

/// Pipeline over the configured providers and SQLite store.
pub async fn build_pipeline(config: &Config) -> Result<Pipeline> {
    let embedder: Arc<dyn Embedder> = Arc::new(
        OpenAiEmbedder::new(&config.embedding)
            .context("Failed to configure embedding provider")?,
    );
    let generator: Arc<dyn Generator> = Arc::new(
        OpenAiGenerator::new(&config.llm).context("Failed to configure LLM provider")?,
    );
    let store: Arc<dyn VectorStore> = Arc::new(open_store(config).await?);

    build_pipeline_with(config, embedder, store, generator)
}

/// Pipeline over caller-supplied collaborators, with params from `config`.
pub fn build_pipeline_with(
    config: &Config,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    generator: Arc<dyn Generator>,
) -> Result<Pipeline> {
    let pipeline = Pipeline::new(embedder, store, generator, config.pipeline_params()?)?;
    info!(
        llm = %config.llm.model,
        embedding = %config.embedding.model,
        collection = %config.vector_store.collection,
        strategy = pipeline.params().fusion.label(),
        "pipeline ready"
    );
    Ok(pipeline)
}

/// Load `paths` and index them into `pipeline`, replacing its corpus.
///
/// An empty `paths` leaves the pipeline untouched.
pub async fn index_paths(
    pipeline: &Pipeline,
    config: &Config,
    paths: &[PathBuf],
) -> Result<Option<IndexReport>> {
    if paths.is_empty() {
        return Ok(None);
    }
    let documents = load_documents(paths, &config.loader)?;
    let report = pipeline
        .add_documents_with_metadata(documents)
        .await
        .context("Failed to index documents")?;
    Ok(Some(report))
}
