use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use rush_core::events::EventPublisher;
use rush_core::{CoreError, CoreResult};
use rush_shared::models::events::LedgerEvent;
use std::time::Duration;
use tracing::{error, info};

#[derive(Clone)]
pub struct EventProducer {
    producer: FutureProducer,
    topic_prefix: String,
}

impl EventProducer {
    pub fn new(brokers: &str, topic_prefix: &str) -> Result<Self, rdkafka::error::KafkaError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()?;

        Ok(Self {
            producer,
            topic_prefix: topic_prefix.to_string(),
        })
    }

    pub async fn send(&self, topic: &str, key: &str, payload: &str) -> Result<(), rdkafka::error::KafkaError> {
        let record = FutureRecord::to(topic)
            .key(key)
            .payload(payload);

        match self.producer.send(record, Timeout::After(Duration::from_secs(0))).await {
            Ok(delivery) => {
                info!("Sent message to {}/{}: partition {} offset {}", topic, key, delivery.partition, delivery.offset);
                Ok(())
            }
            Err((e, _msg)) => {
                error!("Failed to send message to {}: {}", topic, e);
                Err(e)
            }
        }
    }
}

/// Applies the deployment prefix, e.g. `staging.` + `trips.reserved`.
pub fn topic_name(prefix: &str, topic: &str) -> String {
    format!("{}{}", prefix, topic)
}

#[async_trait]
impl EventPublisher for EventProducer {
    async fn publish(&self, event: &LedgerEvent) -> CoreResult<()> {
        let payload = serde_json::to_string(event)
            .map_err(|e| CoreError::PublishError(e.to_string()))?;
        // Keyed by trip so one trip's events stay ordered within a partition.
        let key = event.trip_id().to_string();
        self.send(&topic_name(&self.topic_prefix, event.topic()), &key, &payload)
            .await
            .map_err(|e| CoreError::PublishError(e.to_string()))
    }
}
