//! Per-record retry and dead-letter routing
//!
//! Wraps a [`RecordHandler`]. Retryable failures are re-invoked after
//! `initial × multiplier^(n-1)` up to `max-retries` times; non-retryable or
//! exhausted records are written verbatim to `<topic>.dlt`, partition 0.

use super::{
    dead_letter_topic, InboundRecord, ListenerError, ProducerRecord, RecordHandler, RecordProducer,
    DEAD_LETTER_PARTITION,
};
use crate::utils::Backoff;
use facts_common::config::ListenerRetrySettings;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Final state of one consumed record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    Handled { retries: u32 },
    DeadLettered { retries: u32, reason: String },
    /// Dead-lettering itself failed; the record is dropped
    Skipped { reason: String },
}

pub struct RecordErrorHandler {
    handler: Arc<dyn RecordHandler>,
    producer: Arc<dyn RecordProducer>,
    backoff: Backoff,
    max_retries: u32,
}

impl RecordErrorHandler {
    pub fn new(
        handler: Arc<dyn RecordHandler>,
        producer: Arc<dyn RecordProducer>,
        retry: &ListenerRetrySettings,
    ) -> Self {
        Self {
            handler,
            producer,
            backoff: Backoff::exponential(
                Duration::from_millis(retry.initial_interval_ms),
                retry.multiplier,
            ),
            max_retries: retry.max_retries,
        }
    }

    pub async fn process(&self, record: &InboundRecord) -> RecordOutcome {
        let mut retries = 0;

        loop {
            match self.handler.handle_record(record).await {
                Ok(()) => return RecordOutcome::Handled { retries },
                Err(err) if err.is_retryable() && retries < self.max_retries => {
                    retries += 1;
                    let delay = self.backoff.delay(retries);
                    warn!(
                        topic = %record.topic,
                        partition = record.partition,
                        offset = record.offset,
                        retry = retries,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Record processing failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return self.dead_letter(record, retries, &err).await,
            }
        }
    }

    /// Like [`process`](Self::process), but gives up when `shutdown` fires.
    /// `None` means the record was abandoned mid-processing.
    pub async fn process_until(
        &self,
        record: &InboundRecord,
        shutdown: &CancellationToken,
    ) -> Option<RecordOutcome> {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!(
                    topic = %record.topic,
                    partition = record.partition,
                    offset = record.offset,
                    "Shutdown requested, abandoning record"
                );
                None
            }
            outcome = self.process(record) => Some(outcome),
        }
    }

    async fn dead_letter(&self, record: &InboundRecord, retries: u32, err: &ListenerError) -> RecordOutcome {
        let topic = dead_letter_topic(&record.topic);

        warn!(
            topic = %record.topic,
            partition = record.partition,
            offset = record.offset,
            retries,
            retryable = err.is_retryable(),
            dead_letter_topic = %topic,
            error = %err,
            "Sending record to dead-letter topic"
        );

        let dead_letter = ProducerRecord {
            topic: topic.clone(),
            partition: Some(DEAD_LETTER_PARTITION),
            key: record.key.clone(),
            payload: record.payload.clone(),
        };

        match self.producer.send(dead_letter).await {
            Ok(()) => RecordOutcome::DeadLettered {
                retries,
                reason: err.to_string(),
            },
            Err(send_err) => {
                error!(
                    topic = %record.topic,
                    offset = record.offset,
                    dead_letter_topic = %topic,
                    error = %send_err,
                    "Dead-letter publish failed, skipping record"
                );
                RecordOutcome::Skipped {
                    reason: send_err.to_string(),
                }
            }
        }
    }
}
