//! Kafka adapter over librdkafka
//!
//! - [`KafkaProducer`]: `FutureProducer`, each send waits for the delivery report
//! - [`KafkaConsumerLoop`]: `StreamConsumer` with auto-commit; records are
//!   passed one at a time through the [`RecordErrorHandler`]

use super::{BusError, InboundRecord, ProducerRecord, RecordErrorHandler, RecordOutcome, RecordProducer};
use async_trait::async_trait;
use facts_common::config::KafkaSettings;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use rdkafka::{ClientConfig, Message};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub struct KafkaProducer {
    producer: FutureProducer,
    queue_timeout: Duration,
}

impl KafkaProducer {
    pub fn new(settings: &KafkaSettings) -> Result<Self, BusError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &settings.bootstrap_servers)
            .set(
                "message.timeout.ms",
                settings.producer.message_timeout_ms.to_string(),
            )
            .create()
            .map_err(|e| BusError::Config(format!("Failed to create Kafka producer: {}", e)))?;

        Ok(Self {
            producer,
            queue_timeout: Duration::from_millis(settings.producer.message_timeout_ms),
        })
    }
}

#[async_trait]
impl RecordProducer for KafkaProducer {
    async fn send(&self, record: ProducerRecord) -> Result<(), BusError> {
        let mut future_record = FutureRecord::<[u8], [u8]>::to(&record.topic);
        if let Some(key) = record.key.as_deref() {
            future_record = future_record.key(key);
        }
        if let Some(payload) = record.payload.as_deref() {
            future_record = future_record.payload(payload);
        }
        if let Some(partition) = record.partition {
            future_record = future_record.partition(partition);
        }

        match self
            .producer
            .send(future_record, Timeout::After(self.queue_timeout))
            .await
        {
            Ok((partition, offset)) => {
                debug!(topic = %record.topic, partition, offset, "Record delivered");
                Ok(())
            }
            Err((KafkaError::Canceled, _)) => Err(BusError::Cancelled),
            Err((e, _)) => Err(BusError::Delivery(e.to_string())),
        }
    }
}

/// Copy the parts of a consumed message the handlers need
pub fn inbound_record<M: Message>(message: &M) -> InboundRecord {
    InboundRecord {
        topic: message.topic().to_string(),
        partition: message.partition(),
        offset: message.offset(),
        key: message.key().map(<[u8]>::to_vec),
        payload: message.payload().map(<[u8]>::to_vec),
    }
}

pub struct KafkaConsumerLoop {
    consumer: StreamConsumer,
    handler: Arc<RecordErrorHandler>,
}

impl KafkaConsumerLoop {
    pub fn new(settings: &KafkaSettings, handler: Arc<RecordErrorHandler>) -> Result<Self, BusError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &settings.bootstrap_servers)
            .set("group.id", &settings.consumer.group_id)
            .set("enable.auto.commit", "true")
            .set("auto.offset.reset", "earliest")
            .create()
            .map_err(|e| BusError::Config(format!("Failed to create Kafka consumer: {}", e)))?;

        consumer
            .subscribe(&[settings.topics.facts_events.as_str()])
            .map_err(|e| BusError::Config(format!("Failed to subscribe: {}", e)))?;

        info!(
            bootstrap_servers = %settings.bootstrap_servers,
            group_id = %settings.consumer.group_id,
            topic = %settings.topics.facts_events,
            "Kafka consumer subscribed"
        );

        Ok(Self { consumer, handler })
    }

    /// Consume until `shutdown` is cancelled
    pub async fn run(&self, shutdown: CancellationToken) {
        loop {
            let record = {
                let received = tokio::select! {
                    _ = shutdown.cancelled() => break,
                    received = self.consumer.recv() => received,
                };
                match received {
                    Ok(message) => inbound_record(&message),
                    Err(e) => {
                        warn!(error = %e, "Kafka receive failed");
                        continue;
                    }
                }
            };

            match self.handler.process_until(&record, &shutdown).await {
                None => break,
                Some(RecordOutcome::Handled { .. }) => {}
                Some(RecordOutcome::DeadLettered { retries, reason }) => {
                    warn!(offset = record.offset, retries, reason = %reason, "Record dead-lettered");
                }
                Some(RecordOutcome::Skipped { reason }) => {
                    error!(offset = record.offset, reason = %reason, "Record skipped");
                }
            }
        }

        info!("Kafka consumer loop stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rdkafka::message::{OwnedMessage, Timestamp};

    #[test]
    fn test_inbound_record_copies_message() {
        let message = OwnedMessage::new(
            Some(b"{}".to_vec()),
            Some(b"t1".to_vec()),
            "music.facts.events".to_string(),
            Timestamp::NotAvailable,
            2,
            17,
            None,
        );

        let record = inbound_record(&message);
        assert_eq!(record.topic, "music.facts.events");
        assert_eq!(record.partition, 2);
        assert_eq!(record.offset, 17);
        assert_eq!(record.key.as_deref(), Some(b"t1".as_slice()));
        assert_eq!(record.payload.as_deref(), Some(b"{}".as_slice()));
    }

    #[test]
    fn test_producer_creation_does_not_need_a_broker() {
        assert!(KafkaProducer::new(&KafkaSettings::default()).is_ok());
    }
}
