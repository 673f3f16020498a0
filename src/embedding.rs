//! Embedding provider abstraction and implementations.
//!
//! Defines the [`EmbeddingProvider`] trait and concrete implementations:
//! - **[`HashEmbedder`]** — deterministic digest-based vectors; keeps the
//!   system runnable with no model and no network.
//! - **[`OpenAiEmbedder`]** — calls the OpenAI embeddings API with retry
//!   and backoff; a drop-in production replacement behind the same trait.
//!
//! The seam is infallible by contract: a provider that cannot produce a
//! vector degrades to zero-vectors of the configured dimension instead of
//! returning an error, so ingestion and retrieval never fail on this axis.
//!
//! # Provider Selection
//!
//! Use [`create_provider`] to instantiate the provider named in the
//! configuration (`"hash"` or `"openai"`).
//!
//! # Retry Strategy (OpenAI)
//!
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use anyhow::{bail, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;

use crate::config::EmbeddingConfig;

/// Trait for embedding providers.
///
/// `embed` must be deterministic for a fixed input and always return
/// exactly [`dims`](EmbeddingProvider::dims) elements. `embed_batch` is
/// element-wise equivalent to repeated single calls and must not
/// partially fail.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"hash-embedding"`).
    fn model_name(&self) -> &str;

    /// Returns the embedding vector dimensionality.
    fn dims(&self) -> usize;

    /// Embed a single text. Never errors; degraded providers return a
    /// zero-vector of length [`dims`](EmbeddingProvider::dims).
    async fn embed(&self, text: &str) -> Vec<f32>;

    /// Embed a batch of texts, one vector per input, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Vec<Vec<f32>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await);
        }
        out
    }
}

/// Create the [`EmbeddingProvider`] named by the configuration.
pub fn create_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "hash" => Ok(Arc::new(HashEmbedder::new(config.dims))),
        "openai" => Ok(Arc::new(OpenAiEmbedder::new(config)?)),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

// ============ Hash Embedder ============

/// Deterministic digest-based embedder.
///
/// Derives each vector lane from SHA-256 digests of four transformations
/// of the normalized text: the text itself, the text with a positional
/// seed, its character reversal, and its character-sorted form. Each
/// digest is reduced modulo a fixed range and rescaled into `[-1, 1]`.
/// A pure function of the text content only.
pub struct HashEmbedder {
    dims: usize,
}

impl HashEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims }
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    fn model_name(&self) -> &str {
        "hash-embedding"
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> Vec<f32> {
        hash_embedding(text, self.dims)
    }
}

/// Compute the deterministic hash embedding for `text`.
pub fn hash_embedding(text: &str, dims: usize) -> Vec<f32> {
    let normalized = text.to_lowercase();
    let normalized = normalized.trim();
    let reversed: String = normalized.chars().rev().collect();
    let sorted: String = {
        let mut chars: Vec<char> = normalized.chars().collect();
        chars.sort_unstable();
        chars.into_iter().collect()
    };

    let mut values = Vec::with_capacity(dims);
    'lanes: for lane in 0..dims / 4 {
        let variations = [
            normalized.to_string(),
            format!("{}{}", normalized, lane),
            format!("{}{}", reversed, lane),
            format!("{}{}", sorted, lane),
        ];
        for variation in &variations {
            let mut hasher = Sha256::new();
            hasher.update(variation.as_bytes());
            hasher.update(lane.to_string().as_bytes());
            let digest = hasher.finalize();

            let mut head = [0u8; 8];
            head.copy_from_slice(&digest[..8]);
            let value = (u64::from_be_bytes(head) % 2_000_000) as f32 / 1_000_000.0 - 1.0;
            values.push(value);

            if values.len() >= dims {
                break 'lanes;
            }
        }
    }

    values.resize(dims, 0.0);
    values
}

// ============ OpenAI Embedder ============

/// Embedding provider backed by the OpenAI `POST /v1/embeddings` endpoint.
///
/// Requires the `OPENAI_API_KEY` environment variable. Transport and
/// server failures are retried with exponential backoff; once retries are
/// exhausted the batch degrades to zero-vectors rather than erroring, per
/// the provider contract.
pub struct OpenAiEmbedder {
    model: String,
    dims: usize,
    max_retries: u32,
    timeout_secs: u64,
}

impl OpenAiEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for OpenAI provider"))?;
        if std::env::var("OPENAI_API_KEY").is_err() {
            bail!("OPENAI_API_KEY environment variable not set");
        }
        Ok(Self {
            model,
            dims: config.dims,
            max_retries: config.max_retries,
            timeout_secs: config.timeout_secs,
        })
    }

    async fn request_embeddings(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY not set"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()?;

        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = client
                .post("https://api.openai.com/v1/embeddings")
                .header("Authorization", format!("Bearer {}", api_key))
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        return parse_embeddings_response(&json);
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err =
                            Some(anyhow::anyhow!("OpenAI API error {}: {}", status, body_text));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    bail!("OpenAI API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Embedding failed after retries")))
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> Vec<f32> {
        let texts = [text.to_string()];
        let batch = self.embed_batch(&texts).await;
        batch.into_iter().next().unwrap_or_else(|| vec![0.0; self.dims])
    }

    async fn embed_batch(&self, texts: &[String]) -> Vec<Vec<f32>> {
        match self.request_embeddings(texts).await {
            Ok(vectors) if vectors.len() == texts.len() => vectors,
            Ok(_) => {
                eprintln!("Warning: embedding response count mismatch, using zero vectors");
                vec![vec![0.0; self.dims]; texts.len()]
            }
            Err(e) => {
                eprintln!("Warning: embedding batch failed: {}", e);
                vec![vec![0.0; self.dims]; texts.len()]
            }
        }
    }
}

fn parse_embeddings_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid embeddings response: missing data array"))?;

    let mut embeddings = Vec::with_capacity(data.len());
    for item in data {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| anyhow::anyhow!("Invalid embeddings response: missing embedding"))?;
        let vec: Vec<f32> = embedding
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();
        embeddings.push(vec);
    }
    Ok(embeddings)
}
