//! Vector storage abstraction for the semantic index.
//!
//! The [`VectorStore`] trait defines the operations the semantic index
//! needs, enabling pluggable backends (SQLite in the app crate, in-memory
//! here). A store holds one named collection; [`VectorStore::replace`]
//! swaps its whole contents and is what the semantic index rebuilds with.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::Metadata;

/// A chunk vector ready to be stored.
#[derive(Debug, Clone)]
pub struct VectorRecord {
    /// Chunk UUID.
    pub id: String,
    /// Chunk text, returned verbatim on query.
    pub text: String,
    pub vector: Vec<f32>,
    /// Always contains `source`; also `chunk_index` and document metadata.
    pub metadata: Metadata,
}

/// A nearest-neighbour match.
#[derive(Debug, Clone)]
pub struct VectorHit {
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
    /// Distance under the store's metric; smaller is closer.
    pub distance: f64,
}

/// Abstract vector backend.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`collection`](VectorStore::collection) | Name of the collection this store manages |
/// | [`clear`](VectorStore::clear) | Remove every record in the collection |
/// | [`upsert`](VectorStore::upsert) | Insert or replace records by id |
/// | [`replace`](VectorStore::replace) | Swap the whole collection for `records` |
/// | [`query`](VectorStore::query) | `k` nearest records, ascending distance |
/// | [`count`](VectorStore::count) | Number of records in the collection |
#[async_trait]
pub trait VectorStore: Send + Sync {
    fn collection(&self) -> &str;

    async fn clear(&self) -> Result<()>;

    async fn upsert(&self, records: &[VectorRecord]) -> Result<()>;

    /// Make `records` the entire contents of the collection.
    ///
    /// The default is `clear` followed by `upsert` and is not atomic: a
    /// failing `upsert` leaves the collection empty or partial. Backends
    /// that can do better override it so a failure leaves the previous
    /// contents untouched.
    async fn replace(&self, records: &[VectorRecord]) -> Result<()> {
        self.clear().await?;
        self.upsert(records).await
    }

    /// Whether a failed [`replace`](VectorStore::replace) is guaranteed to
    /// leave the previous contents in place.
    fn replace_is_atomic(&self) -> bool {
        false
    }

    /// Return at most `k` records ordered by ascending distance. Ties keep
    /// insertion order.
    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<VectorHit>>;

    async fn count(&self) -> Result<usize>;
}

/// Sort hits by ascending distance (stable) and keep the first `k`.
pub fn rank_hits(mut hits: Vec<VectorHit>, k: usize) -> Vec<VectorHit> {
    hits.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    hits.truncate(k);
    hits
}
