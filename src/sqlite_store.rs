//! SQLite-backed [`VectorStore`] implementation.
//!
//! Vectors live in the `vectors` table as little-endian f32 BLOBs, keyed by
//! `(collection, id)`. Nearest-neighbour search is brute force in Rust over
//! every row of the collection, which is fine for the corpus sizes this
//! tool targets.

use async_trait::async_trait;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};

use ragloop_core::embedding::{blob_to_vec, vec_to_blob, DistanceMetric};
use ragloop_core::store::{rank_hits, VectorHit, VectorRecord, VectorStore};
use ragloop_core::{Error, Metadata, Result, Service};

/// SQLite implementation of the [`VectorStore`] trait for one collection.
pub struct SqliteVectorStore {
    pool: SqlitePool,
    collection: String,
    metric: DistanceMetric,
}

impl SqliteVectorStore {
    /// The schema must already exist (see [`crate::migrate::run_migrations`]).
    pub fn new(pool: SqlitePool, collection: impl Into<String>, metric: DistanceMetric) -> Self {
        Self {
            pool,
            collection: collection.into(),
            metric,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Insert or update `records` inside `tx`, numbering new rows after the
    /// collection's current highest `seq`.
    async fn insert_records(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        records: &[VectorRecord],
    ) -> Result<()> {
        let next_seq: i64 =
            sqlx::query_scalar("SELECT COALESCE(MAX(seq) + 1, 0) FROM vectors WHERE collection = ?")
                .bind(&self.collection)
                .fetch_one(&mut **tx)
                .await
                .map_err(store_err)?;

        for (i, record) in records.iter().enumerate() {
            let metadata_json = serde_json::to_string(&record.metadata).map_err(store_err)?;
            let blob = vec_to_blob(&record.vector);

            sqlx::query(
                r#"
                INSERT INTO vectors (collection, id, seq, chunk_text, metadata_json, dims, embedding)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(collection, id) DO UPDATE SET
                    chunk_text = excluded.chunk_text,
                    metadata_json = excluded.metadata_json,
                    dims = excluded.dims,
                    embedding = excluded.embedding
                "#,
            )
            .bind(&self.collection)
            .bind(&record.id)
            .bind(next_seq + i as i64)
            .bind(&record.text)
            .bind(&metadata_json)
            .bind(record.vector.len() as i64)
            .bind(&blob)
            .execute(&mut **tx)
            .await
            .map_err(store_err)?;
        }
        Ok(())
    }
}

fn store_err(e: impl std::fmt::Display) -> Error {
    Error::provider(Service::VectorStore, e.to_string())
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    fn collection(&self) -> &str {
        &self.collection
    }

    async fn clear(&self) -> Result<()> {
        sqlx::query("DELETE FROM vectors WHERE collection = ?")
            .bind(&self.collection)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(())
    }

    async fn upsert(&self, records: &[VectorRecord]) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(store_err)?;
        self.insert_records(&mut tx, records).await?;
        tx.commit().await.map_err(store_err)?;
        Ok(())
    }

    /// DELETE and INSERTs in one transaction; a failure rolls back to the
    /// previous contents.
    async fn replace(&self, records: &[VectorRecord]) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(store_err)?;
        sqlx::query("DELETE FROM vectors WHERE collection = ?")
            .bind(&self.collection)
            .execute(&mut *tx)
            .await
            .map_err(store_err)?;
        self.insert_records(&mut tx, records).await?;
        tx.commit().await.map_err(store_err)?;
        Ok(())
    }

    fn replace_is_atomic(&self) -> bool {
        true
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<VectorHit>> {
        let rows = sqlx::query(
            "SELECT id, chunk_text, metadata_json, embedding FROM vectors WHERE collection = ? ORDER BY seq",
        )
        .bind(&self.collection)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        let mut hits = Vec::with_capacity(rows.len());
        for row in &rows {
            let metadata_json: String = row.get("metadata_json");
            let metadata: Metadata = serde_json::from_str(&metadata_json).map_err(store_err)?;
            let blob: Vec<u8> = row.get("embedding");

            hits.push(VectorHit {
                id: row.get("id"),
                text: row.get("chunk_text"),
                metadata,
                distance: self.metric.distance(vector, &blob_to_vec(&blob)),
            });
        }

        Ok(rank_hits(hits, k))
    }

    async fn count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM vectors WHERE collection = ?")
            .bind(&self.collection)
            .fetch_one(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(count as usize)
    }
}
