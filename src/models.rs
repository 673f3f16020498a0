//! Core data models used throughout ragdesk.
//!
//! These types represent the document records, chunk metadata, retrieval
//! results, and chat turns that flow through the ingestion and answering
//! pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::language::Language;

/// Processing status of an ingested document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocStatus {
    Indexed,
    Error,
}

/// Per-document processing record, keyed in the document index by the
/// content hash of the file bytes (not the filename).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub filename: String,
    pub file_type: String,
    pub file_size: u64,
    #[serde(default)]
    pub chunk_count: usize,
    pub status: DocStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub indexed_at: DateTime<Utc>,
}

/// Metadata stored alongside every vector. The literal chunk text is part
/// of the metadata so retrieval can return it without a second lookup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkMetadata {
    pub filename: String,
    pub chunk_id: String,
    pub chunk_index: usize,
    pub file_type: String,
    pub text: String,
}

/// A single nearest-neighbor result. Ephemeral; not persisted.
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    pub id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
    pub distance: f32,
}

/// A stored vector-index entry, returned by introspection queries.
#[derive(Debug, Clone)]
pub struct StoredEntry {
    pub id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// Closed set of support-query categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    ProductFaq,
    TechIssue,
    Transactional,
    Unknown,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::ProductFaq => "Product FAQ",
            Category::TechIssue => "Tech issue",
            Category::Transactional => "Transactional",
            Category::Unknown => "unknown",
        }
    }

    /// Map a free-form model label onto the closed category set.
    /// Unrecognized labels collapse to [`Category::Unknown`].
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "product faq" | "faq" | "product_faq" => Category::ProductFaq,
            "tech issue" | "technical issue" | "tech_issue" => Category::TechIssue,
            "transactional" => Category::Transactional,
            _ => Category::Unknown,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The orchestrator's answer to one chat request. Constructed fresh per
/// request; the core does not retain it.
#[derive(Debug, Clone, Serialize)]
pub struct ChatTurn {
    pub message: String,
    pub response: String,
    pub language: Language,
    pub category: Category,
    pub confidence: f32,
    pub resolved: bool,
}

impl ChatTurn {
    /// A turn is resolved iff its fused confidence clears the fixed 0.5
    /// threshold; unresolved turns are routed to human review.
    pub fn is_resolved(confidence: f32) -> bool {
        confidence > 0.5
    }
}
