//! # ragdesk
//!
//! A retrieval-augmented customer-support answering engine.
//!
//! ragdesk ingests heterogeneous documents (PDF, Word, CSV, Markdown, HTML,
//! plain text) into a local vector collection, and answers support queries
//! by fusing categorization, retrieval, and generation into a single
//! confidence-scored chat turn (retrieval-augmented generation).
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌───────────────┐   ┌─────────────┐
//! │  Folder   │──▶│   Pipeline     │──▶│   SQLite    │
//! │  scan     │   │ Extract+Chunk │   │  vectors    │
//! └───────────┘   │    +Embed     │   └──────┬──────┘
//!                 └───────────────┘          │
//!                                            ▼
//!                 ┌───────────────┐   ┌─────────────┐
//!                 │  Generative   │◀──│ Orchestrator│──▶ ChatTurn
//!                 │  model seam   │   │ cat/ret/gen │
//!                 └───────────────┘   └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! ragdesk init                    # create data directories and stores
//! ragdesk ingest                  # index documents from the input folder
//! ragdesk chat "How do I reset my password?"
//! ragdesk reindex                 # clear and rebuild the whole index
//! ragdesk status                  # document records + vector count
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and startup validation |
//! | [`models`] | Core data types |
//! | [`language`] | Supported-language tags and detection |
//! | [`extract`] | Per-format text extraction |
//! | [`chunk`] | Overlapping sentence-aware chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`doc_index`] | Idempotence index over content hashes |
//! | [`vector_index`] | Vector store abstraction + SQLite implementation |
//! | [`ingest`] | Folder ingestion pipeline |
//! | [`llm`] | Generative-language capability seam |
//! | [`agent`] | RAG chat orchestrator |
//! | [`chatlog`] | Chat log and human-review queue store |

pub mod agent;
pub mod chatlog;
pub mod chunk;
pub mod config;
pub mod doc_index;
pub mod embedding;
pub mod extract;
pub mod ingest;
pub mod language;
pub mod llm;
pub mod models;
pub mod vector_index;
