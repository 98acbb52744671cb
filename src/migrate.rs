use anyhow::Result;
use sqlx::SqlitePool;

/// Create the vector schema if it does not exist. Idempotent.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // One row per stored chunk vector, partitioned by collection
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS vectors (
            collection TEXT NOT NULL,
            id TEXT NOT NULL,
            seq INTEGER NOT NULL,
            chunk_text TEXT NOT NULL,
            metadata_json TEXT NOT NULL DEFAULT '{}',
            dims INTEGER NOT NULL,
            embedding BLOB NOT NULL,
            PRIMARY KEY (collection, id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_vectors_collection_seq ON vectors(collection, seq)")
        .execute(pool)
        .await?;

    Ok(())
}
