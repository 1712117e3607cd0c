//! Domain event publishing. NATS when connected, the log otherwise.

use crate::domain::events::DomainEvent;

const SUBJECT_PREFIX: &str = "marketplace";

#[derive(Clone, Default)]
pub struct EventPublisher { nats: Option<async_nats::Client> }

impl EventPublisher {
    pub fn new(nats: Option<async_nats::Client>) -> Self { Self { nats } }

    /// Never fails the caller; delivery problems are logged.
    pub async fn publish(&self, event: DomainEvent) {
        let subject = format!("{SUBJECT_PREFIX}.{}", event.kind());
        let Some(client) = &self.nats else {
            tracing::debug!(%subject, ?event, "event (no broker)");
            return;
        };
        match serde_json::to_vec(&event) {
            Ok(payload) => {
                if let Err(e) = client.publish(subject.clone(), payload.into()).await {
                    tracing::warn!(%subject, error = %e, "event publish failed");
                }
            }
            Err(e) => tracing::warn!(%subject, error = %e, "event serialization failed"),
        }
    }

    pub async fn publish_all(&self, events: impl IntoIterator<Item = DomainEvent>) {
        for event in events { self.publish(event).await; }
    }
}
