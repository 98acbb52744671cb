//! In-memory [`VectorStore`] implementation for tests and ephemeral use.
//!
//! Uses a `Vec` behind `std::sync::RwLock`. Queries are brute-force over
//! every stored vector under the configured [`DistanceMetric`].

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::embedding::DistanceMetric;
use crate::error::{Error, Result, Service};

use super::{rank_hits, VectorHit, VectorRecord, VectorStore};

/// In-memory vector store holding a single collection.
pub struct InMemoryVectorStore {
    collection: String,
    metric: DistanceMetric,
    records: RwLock<Vec<VectorRecord>>,
}

impl InMemoryVectorStore {
    pub fn new(collection: impl Into<String>) -> Self {
        Self::with_metric(collection, DistanceMetric::default())
    }

    pub fn with_metric(collection: impl Into<String>, metric: DistanceMetric) -> Self {
        Self {
            collection: collection.into(),
            metric,
            records: RwLock::new(Vec::new()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Vec<VectorRecord>>> {
        self.records
            .read()
            .map_err(|_| Error::provider(Service::VectorStore, "in-memory store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Vec<VectorRecord>>> {
        self.records
            .write()
            .map_err(|_| Error::provider(Service::VectorStore, "in-memory store lock poisoned"))
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new("default")
    }
}

/// Insert `records`, replacing any with the same id in place.
fn merge(stored: &mut Vec<VectorRecord>, records: &[VectorRecord]) {
    for record in records {
        match stored.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => *existing = record.clone(),
            None => stored.push(record.clone()),
        }
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    fn collection(&self) -> &str {
        &self.collection
    }

    async fn clear(&self) -> Result<()> {
        self.write()?.clear();
        Ok(())
    }

    async fn upsert(&self, records: &[VectorRecord]) -> Result<()> {
        let mut stored = self.write()?;
        merge(&mut stored, records);
        Ok(())
    }

    async fn replace(&self, records: &[VectorRecord]) -> Result<()> {
        let mut fresh = Vec::with_capacity(records.len());
        merge(&mut fresh, records);
        *self.write()? = fresh;
        Ok(())
    }

    fn replace_is_atomic(&self) -> bool {
        true
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<VectorHit>> {
        let stored = self.read()?;
        let hits = stored
            .iter()
            .map(|r| VectorHit {
                id: r.id.clone(),
                text: r.text.clone(),
                metadata: r.metadata.clone(),
                distance: self.metric.distance(vector, &r.vector),
            })
            .collect();
        Ok(rank_hits(hits, k))
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }
}
