//! Enrichment service — one atomic enrich operation per check-in.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::error::ServiceError;
use crate::generation::GenerationClient;
use crate::model::clamp_confidence;
use crate::prompt::build_prompt;
use crate::store::CheckInStore;

/// Result of enriching one check-in.
#[derive(Debug, Clone, Serialize)]
pub struct EnrichmentResponse {
    pub check_in_id: i64,
    /// Empty when generation failed; the row is persisted either way.
    pub message: String,
    pub confidence: Option<f64>,
    pub generated_at: DateTime<Utc>,
}

/// Composes the prompt builder, generation client and check-in store to
/// perform one enrichment operation.
pub struct EnrichmentService {
    store: Arc<dyn CheckInStore>,
    client: GenerationClient,
}

impl EnrichmentService {
    pub fn new(store: Arc<dyn CheckInStore>, client: GenerationClient) -> Self {
        Self { store, client }
    }

    /// Enrich a check-in with a generated recommendation.
    ///
    /// Loads the check-in (NotFound if missing), builds the prompt, makes
    /// the bounded generation call — the only suspension point on external
    /// I/O — and persists the result atomically with the back-reference
    /// update. A failed generation still persists an empty message: the
    /// check-in must stay usable when the generation service is down.
    /// Re-enriching replaces the previous message (the link is strictly 1:1).
    pub async fn enrich(&self, check_in_id: i64) -> Result<EnrichmentResponse, ServiceError> {
        let check_in = self
            .store
            .get_check_in(check_in_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("CheckIn", check_in_id))?;

        let prompt = build_prompt(&check_in);
        let result = self.client.generate(&prompt).await;

        let generated_at = Utc::now();
        let saved = self
            .store
            .attach_generated_message(
                check_in.id,
                &result.message,
                clamp_confidence(result.confidence),
                generated_at,
            )
            .await?;

        info!(
            check_in_id,
            message_id = saved.id,
            empty = saved.message.is_empty(),
            "Check-in enriched"
        );

        Ok(EnrichmentResponse {
            check_in_id: saved.check_in_id,
            message: saved.message,
            confidence: saved.confidence,
            generated_at: saved.generated_at,
        })
    }
}
