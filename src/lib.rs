//! # ragloop
//!
//! Question answering over a small document corpus: hybrid BM25 + vector
//! retrieval fused with Reciprocal Rank Fusion, grounded generation, a JSON
//! self-evaluation, and at most one refinement.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────────────────────┐   ┌──────────┐
//! │   Loader    │──▶│  ragloop-core Pipeline       │──▶│  SQLite  │
//! │ files/dirs  │   │ BM25 + vectors → RRF → LLM   │   │ vectors  │
//! └─────────────┘   └──────────────┬───────────────┘   └──────────┘
//!                                  │
//!                      ┌───────────┴───────┐
//!                      ▼                   ▼
//!                 ┌──────────┐       ┌──────────┐
//!                 │   CLI    │       │   HTTP   │
//!                 │(ragloop) │       │  (axum)  │
//!                 └──────────┘       └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`openai`] | Shared HTTP client with retry/backoff |
//! | [`embedding`] | OpenAI-compatible embedding provider |
//! | [`llm`] | OpenAI-compatible chat-completion provider |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite vector store |
//! | [`loader`] | File and directory document loader |
//! | [`service`] | Pipeline construction from config |
//! | [`server`] | JSON HTTP server |
//! | [`stats`] | Vector store statistics |
//! | [`logging`] | Tracing subscriber setup |

pub mod config;
pub mod db;
pub mod embedding;
pub mod llm;
pub mod loader;
pub mod logging;
pub mod migrate;
pub mod openai;
pub mod server;
pub mod service;
pub mod sqlite_store;
pub mod stats;
