use std::sync::Arc;

use async_trait::async_trait;
use rush_core::events::EventPublisher;
use rush_core::CoreResult;
use rush_shared::models::events::LedgerEvent;
use rush_store::EventProducer;
use tokio::sync::broadcast;

/// Hands every committed ledger event to the SSE subscribers and, when a
/// broker is configured, to Kafka.
pub struct LedgerEventFanout {
    sse_tx: broadcast::Sender<LedgerEvent>,
    kafka: Option<Arc<EventProducer>>,
}

impl LedgerEventFanout {
    pub fn new(sse_tx: broadcast::Sender<LedgerEvent>, kafka: Option<Arc<EventProducer>>) -> Self {
        Self { sse_tx, kafka }
    }
}

#[async_trait]
impl EventPublisher for LedgerEventFanout {
    async fn publish(&self, event: &LedgerEvent) -> CoreResult<()> {
        // Err only means nobody is listening.
        let _ = self.sse_tx.send(event.clone());

        match &self.kafka {
            Some(producer) => producer.publish(event).await,
            None => Ok(()),
        }
    }
}
