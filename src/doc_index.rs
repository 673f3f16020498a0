//! Persistent document-processing index.
//!
//! Maps the content hash of a file's bytes to its [`DocumentRecord`],
//! making ingestion idempotent across repeated folder scans and process
//! restarts: byte-identical content is processed at most once, regardless
//! of its filename.
//!
//! Backed by a single JSON key-value file. Every `record` call persists
//! the whole map via a temp-file write and atomic rename, so a reader can
//! never observe a half-written entry; the key is immutable once
//! produced, so last-writer-wins is sufficient.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use crate::models::DocumentRecord;

pub struct DocumentIndex {
    path: PathBuf,
    entries: Mutex<HashMap<String, DocumentRecord>>,
}

impl DocumentIndex {
    /// Open the index at `path`, loading any existing records.
    ///
    /// A missing file starts an empty index; an unreadable one is logged
    /// and treated as empty rather than blocking startup.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.with_context(|| {
                format!("Failed to create index directory: {}", parent.display())
            })?;
        }

        let entries = match tokio::fs::read_to_string(path).await {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(map) => map,
                Err(e) => {
                    eprintln!(
                        "Warning: could not parse document index {}: {}",
                        path.display(),
                        e
                    );
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };

        Ok(Self {
            path: path.to_path_buf(),
            entries: Mutex::new(entries),
        })
    }

    pub async fn exists(&self, hash: &str) -> bool {
        self.entries.lock().await.contains_key(hash)
    }

    pub async fn get(&self, hash: &str) -> Option<DocumentRecord> {
        self.entries.lock().await.get(hash).cloned()
    }

    /// Insert a record and persist immediately. Subsequent process
    /// restarts observe the write.
    pub async fn record(&self, hash: &str, record: DocumentRecord) -> Result<()> {
        let mut entries = self.entries.lock().await;
        entries.insert(hash.to_string(), record);
        self.persist(&entries).await
    }

    /// All records, most recently indexed first.
    pub async fn all(&self) -> Vec<(String, DocumentRecord)> {
        let entries = self.entries.lock().await;
        let mut records: Vec<(String, DocumentRecord)> = entries
            .iter()
            .map(|(hash, record)| (hash.clone(), record.clone()))
            .collect();
        records.sort_by(|a, b| b.1.indexed_at.cmp(&a.1.indexed_at));
        records
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Drop every record. Only a full reindex calls this.
    pub async fn clear(&self) -> Result<()> {
        let mut entries = self.entries.lock().await;
        entries.clear();
        self.persist(&entries).await
    }

    async fn persist(&self, entries: &HashMap<String, DocumentRecord>) -> Result<()> {
        let json = serde_json::to_string_pretty(entries)?;
        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, json.as_bytes())
            .await
            .with_context(|| format!("Failed to write document index: {}", tmp_path.display()))?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .with_context(|| format!("Failed to replace document index: {}", self.path.display()))?;
        Ok(())
    }
}
