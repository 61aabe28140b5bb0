//! Notification publishing — best-effort, fire-and-forget.

use async_trait::async_trait;

/// Errors from a notification publisher. Callers swallow these; the trait
/// keeps them explicit so implementations can still report what went wrong.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Publish to {topic} failed: {reason}")]
    PublishFailed { topic: String, reason: String },
}

/// Best-effort publisher for domain events (e.g. the welcome message on
/// user creation). Failures must never abort the calling operation.
#[async_trait]
pub trait NotificationPublisher: Send + Sync {
    async fn publish(
        &self,
        topic: &str,
        routing_key: &str,
        payload: &str,
    ) -> Result<(), NotifyError>;
}

/// Publisher that just logs the event. Stands in until a real broker is
/// wired up; keeps the publish call sites honest in the meantime.
pub struct LogPublisher;

#[async_trait]
impl NotificationPublisher for LogPublisher {
    async fn publish(
        &self,
        topic: &str,
        routing_key: &str,
        payload: &str,
    ) -> Result<(), NotifyError> {
        tracing::info!(topic, routing_key, payload, "Notification published");
        Ok(())
    }
}
