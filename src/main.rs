//! # ragdesk CLI
//!
//! The `ragdesk` binary drives the ingestion pipeline and the chat
//! orchestrator from the command line.
//!
//! ## Usage
//!
//! ```bash
//! ragdesk --config ./config/ragdesk.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ragdesk init` | Create data directories and empty stores |
//! | `ragdesk ingest` | Index documents from the input folder |
//! | `ragdesk reindex` | Clear and rebuild the whole index |
//! | `ragdesk chat "<message>"` | Answer one support query |
//! | `ragdesk status` | Show document records and vector count |

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use ragdesk::agent::SupportAgent;
use ragdesk::chatlog::MemoryChatStore;
use ragdesk::config::{self, Config};
use ragdesk::doc_index::DocumentIndex;
use ragdesk::embedding;
use ragdesk::ingest::Ingestor;
use ragdesk::language::Language;
use ragdesk::llm;
use ragdesk::models::DocStatus;
use ragdesk::vector_index::{SqliteVectorIndex, VectorIndex};

/// ragdesk — a retrieval-augmented customer-support answering engine.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/ragdesk.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "ragdesk",
    about = "ragdesk — a retrieval-augmented customer-support answering engine",
    version,
    long_about = "ragdesk ingests heterogeneous documents (PDF, Word, CSV, Markdown, HTML, \
    plain text) into a local vector collection and answers support queries by fusing \
    categorization, retrieval, and generation into a confidence-scored chat turn."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/ragdesk.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Create data directories and empty stores.
    ///
    /// Creates the input folder, the document index file, and the vector
    /// collection. Idempotent — running it multiple times is safe.
    Init,

    /// Index documents from the input folder.
    ///
    /// Scans the folder non-recursively, skipping files whose content
    /// hash was already processed, and stores one embedding per chunk.
    Ingest {
        /// Folder to scan instead of `[ingest].input_dir`.
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Clear the whole index and rebuild it from the input folder.
    Reindex {
        /// Folder to scan instead of `[ingest].input_dir`.
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Answer one support query.
    Chat {
        /// The customer message.
        message: String,

        /// Force the response language (`en` or `ar`); detected from the
        /// message when omitted.
        #[arg(long)]
        language: Option<String>,

        /// Session identifier for the chat log.
        #[arg(long, default_value = "cli")]
        session_id: String,

        /// Optional user identifier for the chat log.
        #[arg(long)]
        user_id: Option<String>,
    },

    /// Show document records and the vector count.
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            tokio::fs::create_dir_all(&cfg.ingest.input_dir).await?;
            DocumentIndex::open(&cfg.store.doc_index_path).await?;
            SqliteVectorIndex::open(&cfg.store.vector_db_path).await?;
            println!("Stores initialized successfully.");
        }
        Commands::Ingest { dir } => {
            let dir = dir.unwrap_or_else(|| cfg.ingest.input_dir.clone());
            let ingestor = build_ingestor(&cfg).await?;
            ingestor.process_folder(&dir).await?;
        }
        Commands::Reindex { dir } => {
            let dir = dir.unwrap_or_else(|| cfg.ingest.input_dir.clone());
            let ingestor = build_ingestor(&cfg).await?;
            ingestor.clear_and_reindex(&dir).await?;
        }
        Commands::Chat {
            message,
            language,
            session_id,
            user_id,
        } => {
            run_chat(&cfg, &message, language.as_deref(), &session_id, user_id.as_deref())
                .await?;
        }
        Commands::Status => {
            run_status(&cfg).await?;
        }
    }

    Ok(())
}

async fn build_ingestor(cfg: &Config) -> Result<Ingestor> {
    let doc_index = Arc::new(DocumentIndex::open(&cfg.store.doc_index_path).await?);
    let vectors: Arc<dyn VectorIndex> =
        Arc::new(SqliteVectorIndex::open(&cfg.store.vector_db_path).await?);
    let embedder = embedding::create_provider(&cfg.embedding)?;
    Ok(Ingestor::new(cfg.clone(), doc_index, embedder, vectors))
}

async fn run_chat(
    cfg: &Config,
    message: &str,
    language_tag: Option<&str>,
    session_id: &str,
    user_id: Option<&str>,
) -> Result<()> {
    let vectors: Arc<dyn VectorIndex> =
        Arc::new(SqliteVectorIndex::open(&cfg.store.vector_db_path).await?);
    let embedder = embedding::create_provider(&cfg.embedding)?;
    let model = llm::create_model(&cfg.llm)?;

    let agent = SupportAgent::new(
        embedder,
        vectors,
        model,
        cfg.retrieval.top_k,
        cfg.llm.temperature,
        Duration::from_secs(cfg.llm.timeout_secs),
    );

    let language = Language::resolve(language_tag, message);
    let turn = agent.process_chat(message, language, user_id, Some(session_id)).await;

    let store = MemoryChatStore::new();
    store.record_turn(&turn, user_id, session_id);

    println!("{}", turn.response);
    println!();
    println!("  language:   {}", turn.language);
    println!("  category:   {}", turn.category);
    println!("  confidence: {:.2}", turn.confidence);
    println!("  resolved:   {}", turn.resolved);
    if !turn.resolved {
        println!("  queued for human review");
    }
    Ok(())
}

async fn run_status(cfg: &Config) -> Result<()> {
    let doc_index = DocumentIndex::open(&cfg.store.doc_index_path).await?;
    let vectors = SqliteVectorIndex::open(&cfg.store.vector_db_path).await?;

    let records = doc_index.all().await;
    println!("documents: {}", records.len());
    for (hash, record) in &records {
        let status = match record.status {
            DocStatus::Indexed => format!("indexed ({} chunks)", record.chunk_count),
            DocStatus::Error => format!(
                "error: {}",
                record.error.as_deref().unwrap_or("unknown")
            ),
        };
        println!(
            "  {} [{}] {} — {}",
            &hash[..12.min(hash.len())],
            record.file_type,
            record.filename,
            status
        );
    }
    println!("vectors: {}", vectors.count().await?);
    Ok(())
}
