//! Generative-language capability seam.
//!
//! The orchestrator depends on [`LanguageModel`] — a `generate` call with
//! a system instruction for grounded answering, and a simpler `classify`
//! call for categorization. Failures (no network, bad key, timeouts) are
//! recoverable by design: every caller has a defined fallback, so model
//! errors never reach the end user as raw errors.
//!
//! - **[`GeminiModel`]** — calls the Gemini `generateContent` REST API.
//! - **[`DisabledModel`]** — always errors; keeps the system runnable
//!   offline with the orchestrator's degraded paths.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::LlmConfig;

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Returns the model identifier (e.g. `"gemini-2.5-flash"`).
    fn model_name(&self) -> &str;

    /// Generate prose from a system instruction and user text.
    async fn generate(
        &self,
        system_instruction: &str,
        user_text: &str,
        temperature: f32,
    ) -> Result<String>;

    /// Single-prompt completion used for categorization.
    async fn classify(&self, prompt: &str) -> Result<String>;
}

/// Create the [`LanguageModel`] named by the configuration.
pub fn create_model(config: &LlmConfig) -> Result<Arc<dyn LanguageModel>> {
    match config.provider.as_str() {
        "gemini" => Ok(Arc::new(GeminiModel::new(config)?)),
        "disabled" => Ok(Arc::new(DisabledModel)),
        other => bail!("Unknown llm provider: {}", other),
    }
}

// ============ Disabled Model ============

/// A no-op model that always returns errors; callers take their
/// fallback paths.
pub struct DisabledModel;

#[async_trait]
impl LanguageModel for DisabledModel {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn generate(&self, _system: &str, _user: &str, _temperature: f32) -> Result<String> {
        bail!("Language model is disabled")
    }

    async fn classify(&self, _prompt: &str) -> Result<String> {
        bail!("Language model is disabled")
    }
}

// ============ Gemini Model ============

/// Language model backed by the Gemini REST API.
///
/// Requires the `GEMINI_API_KEY` environment variable.
pub struct GeminiModel {
    model: String,
    timeout_secs: u64,
}

impl GeminiModel {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        if std::env::var("GEMINI_API_KEY").is_err() {
            bail!("GEMINI_API_KEY environment variable not set");
        }
        Ok(Self {
            model: config.model.clone(),
            timeout_secs: config.timeout_secs,
        })
    }

    async fn generate_content(&self, body: serde_json::Value) -> Result<String> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| anyhow::anyhow!("GEMINI_API_KEY not set"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()?;

        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
            self.model
        );

        let response = client
            .post(&url)
            .header("x-goog-api-key", &api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Gemini API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        parse_gemini_response(&json)
    }
}

#[async_trait]
impl LanguageModel for GeminiModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(
        &self,
        system_instruction: &str,
        user_text: &str,
        temperature: f32,
    ) -> Result<String> {
        let body = serde_json::json!({
            "system_instruction": { "parts": [{ "text": system_instruction }] },
            "contents": [{ "role": "user", "parts": [{ "text": user_text }] }],
            "generationConfig": { "temperature": temperature },
        });
        self.generate_content(body).await
    }

    async fn classify(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
        });
        self.generate_content(body).await
    }
}

/// Pull the concatenated text parts out of a `generateContent` response.
fn parse_gemini_response(json: &serde_json::Value) -> Result<String> {
    let parts = json
        .get("candidates")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid Gemini response: missing candidates"))?;

    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect::<Vec<_>>()
        .join("");

    Ok(text)
}
