//! Generation client — single bounded call to the external chat-completion
//! service, with defensive parsing and failure absorption.
//!
//! The public surface never fails: timeouts, transport errors, error statuses
//! and malformed bodies all degrade to an empty [`GenerationResult`]. A
//! check-in must stay reachable even when the generation service is down, so
//! failures here are converted to data, not propagated.

use secrecy::ExposeSecret;
use tracing::warn;

use crate::config::GenerationConfig;
use crate::model::clamp_confidence;

/// Path of the chat-completion endpoint, relative to the configured base URL.
const COMPLETIONS_PATH: &str = "/openai/v1/chat/completions";

/// Output cap for a single generation, in tokens.
const MAX_TOKENS: u32 = 200;

/// Fixed sampling temperature.
const TEMPERATURE: f64 = 0.2;

/// Normalized outcome of one generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationResult {
    /// Recommendation text; empty when generation failed.
    pub message: String,
    /// Confidence reported by the service, clamped to [0, 1].
    pub confidence: Option<f64>,
}

impl GenerationResult {
    /// The neutral result every failure mode collapses into.
    pub fn empty() -> Self {
        Self {
            message: String::new(),
            confidence: None,
        }
    }
}

/// Why a call failed. Internal only — callers of [`GenerationClient::generate`]
/// never see these; they exist so each failure path stays testable.
#[derive(Debug, thiserror::Error)]
pub enum GenerationFailure {
    #[error("request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Network(String),

    #[error("service returned status {0}")]
    Status(u16),

    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

/// Client for the external generation service.
pub struct GenerationClient {
    client: reqwest::Client,
    config: GenerationConfig,
}

impl GenerationClient {
    pub fn new(config: GenerationConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Generate a recommendation for the given prompt.
    ///
    /// Never returns an error: any failure is absorbed into
    /// [`GenerationResult::empty`] and logged.
    pub async fn generate(&self, prompt: &str) -> GenerationResult {
        match self.call(prompt).await {
            Ok(result) => result,
            Err(failure) => {
                warn!(%failure, "Generation call failed; returning empty result");
                GenerationResult::empty()
            }
        }
    }

    /// One bounded request/response cycle. All failure modes are explicit
    /// here so tests can distinguish them.
    async fn call(&self, prompt: &str) -> Result<GenerationResult, GenerationFailure> {
        let url = format!("{}{}", self.config.base_url, COMPLETIONS_PATH);
        let body = serde_json::json!({
            "model": self.config.model,
            "messages": [
                { "role": "user", "content": prompt }
            ],
            "max_tokens": MAX_TOKENS,
            "temperature": TEMPERATURE,
        });

        let resp = self
            .client
            .post(&url)
            .bearer_auth(self.config.api_key.expose_secret())
            .timeout(self.config.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenerationFailure::Timeout
                } else {
                    GenerationFailure::Network(e.to_string())
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(GenerationFailure::Status(status.as_u16()));
        }

        let data: serde_json::Value = resp.json().await.map_err(|e| {
            if e.is_timeout() {
                GenerationFailure::Timeout
            } else {
                GenerationFailure::MalformedResponse(e.to_string())
            }
        })?;

        Ok(parse_completion(&data))
    }
}

/// Extract message text and optional confidence from a completion body.
///
/// Expects `{"choices": [{"message": {"content": ...}, "confidence": ...}]}`.
/// Missing or non-string content yields an empty message; a missing or
/// non-numeric `confidence` is ignored rather than treated as an error.
fn parse_completion(data: &serde_json::Value) -> GenerationResult {
    let first = data
        .get("choices")
        .and_then(serde_json::Value::as_array)
        .and_then(|choices| choices.first());

    let message = first
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(serde_json::Value::as_str)
        .map(|s| s.trim().to_string())
        .unwrap_or_default();

    let confidence = first
        .and_then(|c| c.get("confidence"))
        .and_then(serde_json::Value::as_f64);

    GenerationResult {
        message,
        confidence: clamp_confidence(confidence),
    }
}

// ── Tests ───────────────────────────────────────────────────────────
