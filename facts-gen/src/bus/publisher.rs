//! Publishes generated facts to the outbound topic

use super::{BusError, ProducerRecord, RecordProducer};
use facts_common::events::GeneratedFacts;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Failed to serialize generated facts: {0}")]
    Serialize(String),

    #[error("Failed to publish generated facts: {0}")]
    Delivery(String),

    #[error("Interrupted while waiting for publish acknowledgement")]
    Interrupted,
}

impl From<BusError> for PublishError {
    fn from(err: BusError) -> Self {
        match err {
            BusError::Cancelled => Self::Interrupted,
            other => Self::Delivery(other.to_string()),
        }
    }
}

pub struct FactsPublisher {
    producer: Arc<dyn RecordProducer>,
    topic: String,
}

impl FactsPublisher {
    pub fn new(producer: Arc<dyn RecordProducer>, topic: impl Into<String>) -> Self {
        Self {
            producer,
            topic: topic.into(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Send `{trackId, factsJson}` keyed by track id and wait for the ack
    pub async fn publish(
        &self,
        track_id: &str,
        facts_json: &str,
        event_type: &str,
        template_name: &str,
    ) -> Result<(), PublishError> {
        let payload = GeneratedFacts::new(track_id, facts_json)
            .to_json()
            .map_err(|e| PublishError::Serialize(e.to_string()))?;

        self.producer
            .send(ProducerRecord {
                topic: self.topic.clone(),
                partition: None,
                key: Some(track_id.as_bytes().to_vec()),
                payload: Some(payload.into_bytes()),
            })
            .await?;

        info!(
            track_id = %track_id,
            event_type = %event_type,
            template = %template_name,
            topic = %self.topic,
            "Published generated facts"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::MemoryProducer;

    #[tokio::test]
    async fn test_publish_keys_by_track_id() {
        let producer = Arc::new(MemoryProducer::new());
        let publisher = FactsPublisher::new(producer.clone(), "music.track.facts.generated");

        publisher
            .publish("t1", r#"{"short":"s"}"#, "created", "proxyapi")
            .await
            .unwrap();

        let records = producer.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].topic, "music.track.facts.generated");
        assert_eq!(records[0].key.as_deref(), Some(b"t1".as_slice()));

        let message: GeneratedFacts =
            serde_json::from_slice(records[0].payload.as_deref().unwrap()).unwrap();
        assert_eq!(message, GeneratedFacts::new("t1", r#"{"short":"s"}"#));
    }

    #[tokio::test]
    async fn test_broker_failure_is_delivery_error() {
        let producer = Arc::new(MemoryProducer::new());
        producer.set_failure(Some(BusError::Delivery("timed out".into())));
        let publisher = FactsPublisher::new(producer, "out");

        let result = publisher.publish("t1", "{}", "created", "proxyapi").await;
        assert!(matches!(result, Err(PublishError::Delivery(_))));
    }

    #[tokio::test]
    async fn test_cancelled_wait_is_interrupted() {
        let producer = Arc::new(MemoryProducer::new());
        producer.set_failure(Some(BusError::Cancelled));
        let publisher = FactsPublisher::new(producer, "out");

        let result = publisher.publish("t1", "{}", "created", "proxyapi").await;
        assert!(matches!(result, Err(PublishError::Interrupted)));
    }
}
