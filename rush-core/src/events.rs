use async_trait::async_trait;
use rush_shared::models::events::LedgerEvent;

use crate::CoreResult;

/// Sink for committed ledger events. Delivery happens after the commit, so a
/// failing publisher never rolls back a booking.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &LedgerEvent) -> CoreResult<()>;
}

/// Drops every event. Used when no broker is configured.
pub struct NoopPublisher;

#[async_trait]
impl EventPublisher for NoopPublisher {
    async fn publish(&self, event: &LedgerEvent) -> CoreResult<()> {
        tracing::debug!("Dropping {} event for trip {}", event.topic(), event.trip_id());
        Ok(())
    }
}
