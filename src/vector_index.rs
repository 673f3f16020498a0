//! Vector store abstraction and SQLite-backed implementation.
//!
//! The [`VectorIndex`] trait is the seam between the core and whatever
//! vector database backs it. [`SqliteVectorIndex`] persists vectors as
//! little-endian `f32` BLOBs with JSON metadata under a fixed collection
//! name and answers nearest-neighbor queries by computing cosine distance
//! in Rust over the stored rows.
//!
//! Failure policy: a failed `add` propagates to the caller (ingestion of
//! that chunk fails loudly); callers treat a failed `query` as an empty
//! result set so answering can proceed without context.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use uuid::Uuid;

use crate::models::{ChunkMetadata, RetrievedChunk, StoredEntry};

/// Fixed collection name for the support knowledge base.
pub const COLLECTION: &str = "support_docs";

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Store a vector with its metadata. The identifier is disambiguated
    /// internally, so duplicate `chunk_id`s never overwrite silently.
    async fn add(&self, chunk_id: &str, embedding: &[f32], metadata: &ChunkMetadata)
        -> Result<()>;

    /// Up to `top_k` nearest neighbors, ascending cosine distance
    /// (most similar first).
    async fn query(&self, embedding: &[f32], top_k: usize) -> Result<Vec<RetrievedChunk>>;

    /// Destroy all stored vectors and metadata, recreating an empty
    /// collection under the same name.
    async fn clear(&self) -> Result<()>;

    async fn count(&self) -> Result<i64>;

    async fn get_all(&self) -> Result<Vec<StoredEntry>>;
}

/// SQLite-backed vector index.
pub struct SqliteVectorIndex {
    pool: SqlitePool,
    collection: String,
}

impl SqliteVectorIndex {
    /// Open (or create) the collection in the database at `db_path`.
    pub async fn open(db_path: &Path) -> Result<Self> {
        let pool = connect(db_path).await?;
        let index = Self {
            pool,
            collection: COLLECTION.to_string(),
        };
        index.ensure_collection().await?;
        Ok(index)
    }

    async fn ensure_collection(&self) -> Result<()> {
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id TEXT PRIMARY KEY,
                embedding BLOB NOT NULL,
                text TEXT NOT NULL,
                metadata TEXT NOT NULL DEFAULT '{{}}'
            )
            "#,
            self.collection
        ))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for SqliteVectorIndex {
    async fn add(
        &self,
        chunk_id: &str,
        embedding: &[f32],
        metadata: &ChunkMetadata,
    ) -> Result<()> {
        // The store assigns no identity of its own; appending a random
        // suffix keeps ids unique across duplicate filenames.
        let unique_id = format!("{}_{}", chunk_id, &Uuid::new_v4().simple().to_string()[..8]);
        let blob = vec_to_blob(embedding);
        let metadata_json = serde_json::to_string(metadata)?;

        sqlx::query(&format!(
            "INSERT INTO {} (id, embedding, text, metadata) VALUES (?, ?, ?, ?)",
            self.collection
        ))
        .bind(&unique_id)
        .bind(&blob)
        .bind(&metadata.text)
        .bind(&metadata_json)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn query(&self, embedding: &[f32], top_k: usize) -> Result<Vec<RetrievedChunk>> {
        let rows = sqlx::query(&format!(
            "SELECT id, embedding, text, metadata FROM {}",
            self.collection
        ))
        .fetch_all(&self.pool)
        .await?;

        let mut results: Vec<RetrievedChunk> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let stored = blob_to_vec(&blob);
                let distance = 1.0 - cosine_similarity(embedding, &stored);
                let metadata_json: String = row.get("metadata");
                RetrievedChunk {
                    id: row.get("id"),
                    text: row.get("text"),
                    metadata: serde_json::from_str(&metadata_json).unwrap_or_default(),
                    distance,
                }
            })
            .collect();

        results.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(top_k);

        Ok(results)
    }

    async fn clear(&self) -> Result<()> {
        sqlx::query(&format!("DROP TABLE IF EXISTS {}", self.collection))
            .execute(&self.pool)
            .await?;
        self.ensure_collection().await
    }

    async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", self.collection))
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn get_all(&self) -> Result<Vec<StoredEntry>> {
        let rows = sqlx::query(&format!(
            "SELECT id, text, metadata FROM {} ORDER BY id",
            self.collection
        ))
        .fetch_all(&self.pool)
        .await?;

        let entries = rows
            .iter()
            .map(|row| {
                let metadata_json: String = row.get("metadata");
                StoredEntry {
                    id: row.get("id"),
                    text: row.get("text"),
                    metadata: serde_json::from_str(&metadata_json).unwrap_or_default(),
                }
            })
            .collect();

        Ok(entries)
    }
}

/// Open a SQLite pool for the collection database, creating the file and
/// its parent directory when missing. WAL keeps concurrent `add`s cheap.
async fn connect(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`; `0.0` for empty vectors or vectors
/// of different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
