//! Semantic index: chunk, embed, store, and nearest-neighbour query.
//!
//! Unlike the lexical index, the semantic side stores and returns chunks,
//! not whole documents. Each stored record carries its origin document's
//! `source` in metadata so fused results can be traced back.
//!
//! Rebuilding is two steps: [`SemanticIndex::prepare`] does the slow,
//! failure-prone embedding work, then [`SemanticIndex::replace`] swaps the
//! collection in one store call.

use std::sync::Arc;

use tracing::debug;

use crate::chunk::{chunk_text, ChunkingParams};
use crate::embedding::{check_dims, embed_query, Embedder};
use crate::error::{Error, Result, Service};
use crate::models::{Document, SearchResult};
use crate::store::{VectorRecord, VectorStore};

pub const DEFAULT_BATCH_SIZE: usize = 64;

pub struct SemanticIndex {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    chunking: ChunkingParams,
    batch_size: usize,
}

impl SemanticIndex {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        chunking: ChunkingParams,
        batch_size: usize,
    ) -> Result<Self> {
        chunking.validate()?;
        if batch_size == 0 {
            return Err(Error::config("embedding batch_size must be > 0"));
        }
        Ok(Self {
            embedder,
            store,
            chunking,
            batch_size,
        })
    }

    pub fn collection(&self) -> &str {
        self.store.collection()
    }

    /// Chunk and embed `documents` without touching the store.
    ///
    /// Every returned vector has the embedder's declared dimensionality.
    pub async fn prepare(&self, documents: &[Document]) -> Result<Vec<VectorRecord>> {
        let mut records = Vec::new();
        for doc in documents {
            for chunk in chunk_text(&doc.source, &doc.content, &self.chunking) {
                let mut metadata = doc.metadata.clone();
                metadata.insert("source".to_string(), chunk.source.clone());
                metadata.insert("chunk_index".to_string(), chunk.chunk_index.to_string());
                records.push(VectorRecord {
                    id: chunk.id,
                    text: chunk.text,
                    vector: Vec::new(),
                    metadata,
                });
            }
        }

        for batch in records.chunks_mut(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|r| r.text.clone()).collect();
            let vectors = self.embedder.embed(&texts).await?;
            if vectors.len() != texts.len() {
                return Err(Error::provider(
                    Service::Embedding,
                    format!(
                        "expected {} embeddings, got {}",
                        texts.len(),
                        vectors.len()
                    ),
                ));
            }
            for (record, vector) in batch.iter_mut().zip(vectors) {
                check_dims(self.embedder.as_ref(), &vector)?;
                record.vector = vector;
            }
        }

        Ok(records)
    }

    /// Make `records` the whole collection. Returns the number stored.
    pub async fn replace(&self, records: &[VectorRecord]) -> Result<usize> {
        self.store.replace(records).await?;
        debug!(
            collection = self.store.collection(),
            chunks = records.len(),
            "semantic index rebuilt"
        );
        Ok(records.len())
    }

    /// See [`VectorStore::replace_is_atomic`].
    pub fn replace_is_atomic(&self) -> bool {
        self.store.replace_is_atomic()
    }

    /// The `k` chunks nearest to `text`, scored `1 - distance`.
    pub async fn query(&self, text: &str, k: usize) -> Result<Vec<SearchResult>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let vector = embed_query(self.embedder.as_ref(), text).await?;
        check_dims(self.embedder.as_ref(), &vector)?;
        let hits = self.store.query(&vector, k).await?;

        Ok(hits
            .into_iter()
            .map(|hit| SearchResult {
                source: hit.metadata.get("source").cloned().unwrap_or_default(),
                content: hit.text,
                score: 1.0 - hit.distance,
                metadata: hit.metadata,
            })
            .collect())
    }
}
