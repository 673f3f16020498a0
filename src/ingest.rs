//! Document ingestion pipeline.
//!
//! Composes extraction → chunking → embedding → vector storage, driven by
//! a non-recursive folder scan. The content hash of each file's bytes is
//! the idempotence key: byte-identical re-submission is a no-op regardless
//! of filename, and the hash is computed once per file and reused on both
//! the success and error paths.

use anyhow::{Context, Result};
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncReadExt;

use crate::chunk::chunk_text;
use crate::config::Config;
use crate::doc_index::DocumentIndex;
use crate::embedding::EmbeddingProvider;
use crate::extract::{extract_text, FileKind};
use crate::models::{ChunkMetadata, DocStatus, DocumentRecord};
use crate::vector_index::VectorIndex;

/// Block size for streamed content hashing; bounds memory on large files.
const HASH_BLOCK_BYTES: usize = 8192;

/// Outcome of processing a single document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocOutcome {
    /// Extracted, chunked, embedded, and recorded.
    Indexed { chunks: usize },
    /// Content hash already present in the document index.
    Duplicate,
    /// Extraction produced no text; nothing recorded.
    Empty,
    /// Unsupported extension; nothing recorded.
    Unsupported,
    /// A step failed; an error record was written under the content hash.
    Failed { error: String },
}

/// Counters for one folder pass.
#[derive(Debug, Default, Clone)]
pub struct FolderSummary {
    pub indexed: u64,
    pub chunks_written: u64,
    pub duplicates: u64,
    pub empty: u64,
    pub unsupported: u64,
    pub errors: u64,
}

pub struct Ingestor {
    config: Config,
    doc_index: Arc<DocumentIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
    vectors: Arc<dyn VectorIndex>,
}

impl Ingestor {
    pub fn new(
        config: Config,
        doc_index: Arc<DocumentIndex>,
        embedder: Arc<dyn EmbeddingProvider>,
        vectors: Arc<dyn VectorIndex>,
    ) -> Self {
        Self {
            config,
            doc_index,
            embedder,
            vectors,
        }
    }

    /// Process every supported file directly inside `dir` (non-recursive),
    /// in deterministic filename order. One bad file never aborts the scan.
    pub async fn process_folder(&self, dir: &Path) -> Result<FolderSummary> {
        let mut read_dir = tokio::fs::read_dir(dir)
            .await
            .with_context(|| format!("Failed to read input folder: {}", dir.display()))?;

        let mut paths = Vec::new();
        while let Some(entry) = read_dir.next_entry().await? {
            if entry.file_type().await?.is_file() {
                paths.push(entry.path());
            }
        }
        paths.sort();

        println!("Processing documents in {}...", dir.display());

        let mut summary = FolderSummary::default();
        for path in &paths {
            match self.process_document(path).await? {
                DocOutcome::Indexed { chunks } => {
                    summary.indexed += 1;
                    summary.chunks_written += chunks as u64;
                }
                DocOutcome::Duplicate => summary.duplicates += 1,
                DocOutcome::Empty => summary.empty += 1,
                DocOutcome::Unsupported => summary.unsupported += 1,
                DocOutcome::Failed { .. } => summary.errors += 1,
            }
        }

        println!(
            "  indexed: {} ({} chunks), duplicates: {}, empty: {}, unsupported: {}, errors: {}",
            summary.indexed,
            summary.chunks_written,
            summary.duplicates,
            summary.empty,
            summary.unsupported,
            summary.errors
        );

        Ok(summary)
    }

    /// Process one document. Returns `Err` only for environment problems
    /// (unreadable file); extraction and storage failures are captured as
    /// an error record and reported in the outcome.
    pub async fn process_document(&self, path: &Path) -> Result<DocOutcome> {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let Some(kind) = FileKind::from_path(path) else {
            println!("Skipping unsupported file: {}", filename);
            return Ok(DocOutcome::Unsupported);
        };

        let file_size = tokio::fs::metadata(path)
            .await
            .with_context(|| format!("Failed to stat {}", path.display()))?
            .len();

        // Hashed once; the same value keys both success and error records.
        let hash = hash_file(path).await?;

        if self.doc_index.exists(&hash).await {
            println!("Document {} already processed, skipping...", filename);
            return Ok(DocOutcome::Duplicate);
        }

        println!("Processing {}...", filename);

        match self.index_document(path, &filename, kind).await {
            Ok(Some(chunk_count)) => {
                let record = DocumentRecord {
                    filename: filename.clone(),
                    file_type: kind.as_str().to_string(),
                    file_size,
                    chunk_count,
                    status: DocStatus::Indexed,
                    error: None,
                    indexed_at: Utc::now(),
                };
                self.doc_index.record(&hash, record).await?;
                println!("Successfully processed {} with {} chunks", filename, chunk_count);
                Ok(DocOutcome::Indexed {
                    chunks: chunk_count,
                })
            }
            Ok(None) => {
                println!("No text extracted from {}", filename);
                Ok(DocOutcome::Empty)
            }
            Err(e) => {
                eprintln!("Error processing {}: {}", path.display(), e);
                let record = DocumentRecord {
                    filename,
                    file_type: kind.as_str().to_string(),
                    file_size,
                    chunk_count: 0,
                    status: DocStatus::Error,
                    error: Some(e.to_string()),
                    indexed_at: Utc::now(),
                };
                self.doc_index.record(&hash, record).await?;
                Ok(DocOutcome::Failed {
                    error: e.to_string(),
                })
            }
        }
    }

    /// Extract, chunk, embed, and store one document's content.
    /// `Ok(None)` means extraction yielded no usable text.
    async fn index_document(
        &self,
        path: &Path,
        filename: &str,
        kind: FileKind,
    ) -> Result<Option<usize>> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let text = extract_text(&bytes, kind)?;
        if text.trim().is_empty() {
            return Ok(None);
        }

        let chunks = chunk_text(
            &text,
            self.config.chunking.chunk_size,
            self.config.chunking.overlap,
        );
        if chunks.is_empty() {
            return Ok(None);
        }

        for (i, chunk) in chunks.iter().enumerate() {
            let chunk_id = format!("{}_chunk_{}", filename, i);
            let embedding = self.embedder.embed(chunk).await;
            let metadata = ChunkMetadata {
                filename: filename.to_string(),
                chunk_id: chunk_id.clone(),
                chunk_index: i,
                file_type: kind.as_str().to_string(),
                text: chunk.clone(),
            };
            // A failed write aborts this document only; the folder scan
            // records the error and moves on.
            self.vectors
                .add(&chunk_id, &embedding, &metadata)
                .await
                .with_context(|| format!("Failed to store chunk {}", chunk_id))?;
        }

        Ok(Some(chunks.len()))
    }

    /// Destroy the vector collection and the document index, then rebuild
    /// both from the folder. A full reindex is the only operation that
    /// clears existing records.
    pub async fn clear_and_reindex(&self, dir: &Path) -> Result<FolderSummary> {
        self.vectors.clear().await?;
        self.doc_index.clear().await?;
        self.process_folder(dir).await
    }
}

/// Streamed SHA-256 of a file's bytes in fixed-size blocks.
async fn hash_file(path: &Path) -> Result<String> {
    let mut file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let mut hasher = Sha256::new();
    let mut buf = [0u8; HASH_BLOCK_BYTES];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hash_file_matches_whole_buffer_digest() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("blob.bin");
        // Larger than one hash block to exercise the streaming loop.
        let content: Vec<u8> = (0..20_000u32).map(|i| (i % 251) as u8).collect();
        tokio::fs::write(&path, &content).await.unwrap();

        let streamed = hash_file(&path).await.unwrap();
        let whole = format!("{:x}", Sha256::digest(&content));
        assert_eq!(streamed, whole);
    }

    #[tokio::test]
    async fn test_hash_file_is_content_addressed() {
        let tmp = tempfile::tempdir().unwrap();
        let a = tmp.path().join("a.txt");
        let b = tmp.path().join("b.txt");
        tokio::fs::write(&a, b"same bytes").await.unwrap();
        tokio::fs::write(&b, b"same bytes").await.unwrap();

        assert_eq!(hash_file(&a).await.unwrap(), hash_file(&b).await.unwrap());
    }
}
