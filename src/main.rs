//! # ragloop CLI
//!
//! Question answering over a local document corpus with hybrid retrieval
//! and self-evaluated answers.
//!
//! ## Usage
//!
//! ```bash
//! ragloop --config ./config/ragloop.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ragloop init` | Create the SQLite vector store and run schema migrations |
//! | `ragloop ask "<question>" --docs <path>...` | Index documents and answer a question |
//! | `ragloop search "<query>" --docs <path>...` | Index documents and print fused results |
//! | `ragloop serve --docs <path>...` | Start the HTTP server |
//! | `ragloop stats` | Summarise the persisted vector store |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the vector store
//! ragloop init
//!
//! # Ask against a directory of markdown files
//! ragloop ask "How many days of leave do I get?" --docs ./handbook
//!
//! # Machine-readable answer
//! ragloop ask "Who approves expenses?" --docs ./handbook --json
//!
//! # Serve the HTTP API
//! ragloop serve --docs ./handbook --bind 0.0.0.0:8000
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use ragloop::{config, logging, server, service, stats};

/// ragloop: hybrid retrieval, grounded answers, one self-refinement.
#[derive(Parser)]
#[command(
    name = "ragloop",
    about = "Answer questions over your documents with hybrid retrieval and self-evaluated answers",
    version,
    long_about = "ragloop indexes documents into a BM25 index and a SQLite vector store, fuses \
    both rankings with Reciprocal Rank Fusion, generates an answer grounded in the retrieved \
    context, judges that answer and regenerates it at most once when the judgment is poor."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// When omitted, built-in defaults are used. Every section of the
    /// file is optional.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the vector store schema.
    ///
    /// Creates the SQLite database file and the `vectors` table.
    /// Running it multiple times is safe.
    Init,

    /// Answer a question.
    ///
    /// Indexes the given documents, retrieves context, generates an
    /// answer, evaluates it and refines it at most once.
    Ask {
        /// The question to answer.
        question: String,

        /// Files or directories to index before answering.
        #[arg(long, num_args = 1..)]
        docs: Vec<PathBuf>,

        /// Number of fused results used as context (defaults to `retrieval.rerank_k`).
        #[arg(short, long)]
        k: Option<usize>,

        /// Print the full response as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print hybrid search results without generating an answer.
    Search {
        /// The search query string.
        query: String,

        /// Files or directories to index before searching.
        #[arg(long, num_args = 1..)]
        docs: Vec<PathBuf>,

        /// Maximum number of results to return (defaults to `retrieval.rerank_k`).
        #[arg(short, long)]
        k: Option<usize>,
    },

    /// Start the HTTP server.
    Serve {
        /// Files or directories to index at startup.
        #[arg(long, num_args = 1..)]
        docs: Vec<PathBuf>,

        /// Override `[server].bind`.
        #[arg(long)]
        bind: Option<String>,
    },

    /// Show vector store statistics.
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let cfg = config::load_or_default(cli.config.as_deref())?;
    logging::init_logging(&cfg.logging.level);

    match cli.command {
        Commands::Init => {
            let store = service::open_store(&cfg).await?;
            store.pool().close().await;
            println!(
                "Vector store initialized at {}.",
                cfg.vector_store.path.display()
            );
        }
        Commands::Ask {
            question,
            docs,
            k,
            json,
        } => {
            let pipeline = service::build_pipeline(&cfg).await?;
            index(&pipeline, &cfg, &docs).await?;

            let response = pipeline.process(&question, k).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                println!("{}", response.answer);
                println!();
                println!("  Confidence:  {:.2}", response.confidence);
                println!(
                    "  Sources:     {}",
                    if response.sources.is_empty() {
                        "(none)".to_string()
                    } else {
                        response.sources.join(", ")
                    }
                );
                println!("  Latency:     {:.0} ms", response.latency_ms);
                println!("  Tokens:      {}", response.tokens_used);
                println!("  Strategy:    {}", response.strategy_used);
                println!("  Refined:     {}", if response.was_refined { "yes" } else { "no" });
            }
        }
        Commands::Search { query, docs, k } => {
            let pipeline = service::build_pipeline(&cfg).await?;
            index(&pipeline, &cfg, &docs).await?;

            let k = k.unwrap_or(cfg.retrieval.rerank_k);
            let hits = pipeline.hybrid_search(&query, k).await?;
            if hits.is_empty() {
                println!("No results.");
            }
            for (i, hit) in hits.iter().enumerate() {
                let label = hit
                    .result
                    .metadata
                    .get("path")
                    .cloned()
                    .unwrap_or_else(|| hit.result.source.clone());
                let snippet: String = hit
                    .result
                    .content
                    .chars()
                    .take(160)
                    .collect::<String>()
                    .replace('\n', " ");
                println!(
                    "{}. [{:.4}] {} ({})",
                    i + 1,
                    hit.fused_score,
                    label,
                    hit.result.source
                );
                println!("    {}", snippet);
            }
        }
        Commands::Serve { docs, bind } => {
            let pipeline = service::build_pipeline(&cfg).await?;
            index(&pipeline, &cfg, &docs).await?;

            let bind = bind.unwrap_or_else(|| cfg.server.bind.clone());
            server::run_server(Arc::new(pipeline), &bind).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
    }

    Ok(())
}

async fn index(
    pipeline: &ragloop_core::Pipeline,
    cfg: &config::Config,
    docs: &[PathBuf],
) -> Result<()> {
    match service::index_paths(pipeline, cfg, docs).await? {
        Some(report) => eprintln!(
            "Indexed {} documents ({} chunks).",
            report.documents, report.chunks
        ),
        None => eprintln!("No --docs given; answering from an empty corpus."),
    }
    Ok(())
}
