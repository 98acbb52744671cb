//! Vector store statistics.
//!
//! Summarises what is persisted in the SQLite store: database size and, per
//! collection, the number of chunk vectors and distinct source documents.
//! Used by `ragloop stats`.

use anyhow::Result;
use sqlx::Row;

use crate::config::Config;
use crate::{db, migrate};

/// Per-collection breakdown of stored vectors.
struct CollectionStats {
    collection: String,
    chunk_count: i64,
    doc_count: i64,
    dims: i64,
}

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let db_path = &config.vector_store.path;
    let pool = db::connect(db_path).await?;
    migrate::run_migrations(&pool).await?;

    let rows = sqlx::query(
        r#"
        SELECT
            collection,
            COUNT(*) AS chunk_count,
            COUNT(DISTINCT json_extract(metadata_json, '$.source')) AS doc_count,
            MAX(dims) AS dims
        FROM vectors
        GROUP BY collection
        ORDER BY collection
        "#,
    )
    .fetch_all(&pool)
    .await?;

    let collections: Vec<CollectionStats> = rows
        .iter()
        .map(|row| CollectionStats {
            collection: row.get("collection"),
            chunk_count: row.get("chunk_count"),
            doc_count: row.get("doc_count"),
            dims: row.get("dims"),
        })
        .collect();

    let db_size = std::fs::metadata(db_path).map(|m| m.len()).unwrap_or(0);

    println!("ragloop: Vector Store Stats");
    println!("===========================");
    println!();
    println!("  Database:    {}", db_path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!("  Collection:  {}", config.vector_store.collection);
    println!("  Metric:      {}", config.vector_store.metric);

    let configured = collections
        .iter()
        .find(|c| c.collection == config.vector_store.collection);
    println!(
        "  Chunks:      {}",
        configured.map(|c| c.chunk_count).unwrap_or(0)
    );

    if !collections.is_empty() {
        println!();
        println!("  By collection:");
        println!(
            "  {:<24} {:>6} {:>8} {:>6}",
            "COLLECTION", "DOCS", "CHUNKS", "DIMS"
        );
        println!("  {}", "-".repeat(48));

        for c in &collections {
            println!(
                "  {:<24} {:>6} {:>8} {:>6}",
                c.collection, c.doc_count, c.chunk_count, c.dims
            );
        }
    }

    println!();

    pool.close().await;
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
