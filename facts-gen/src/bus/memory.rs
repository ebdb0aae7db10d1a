//! In-memory producer
//!
//! Records every sent record instead of talking to a broker. Used by the
//! integration tests and by builds without the `kafka` feature.

use super::{BusError, ProducerRecord, RecordProducer};
use async_trait::async_trait;
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Default)]
pub struct MemoryProducer {
    sent: Mutex<Vec<ProducerRecord>>,
    failure: Mutex<Option<BusError>>,
}

impl MemoryProducer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following send fail with `error` (`None` restores success)
    pub fn set_failure(&self, error: Option<BusError>) {
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = error;
    }

    /// All records acknowledged so far, in send order
    pub fn records(&self) -> Vec<ProducerRecord> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn records_for(&self, topic: &str) -> Vec<ProducerRecord> {
        self.records()
            .into_iter()
            .filter(|record| record.topic == topic)
            .collect()
    }
}

#[async_trait]
impl RecordProducer for MemoryProducer {
    async fn send(&self, record: ProducerRecord) -> Result<(), BusError> {
        let failure = self
            .failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(error) = failure {
            return Err(error);
        }

        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
        Ok(())
    }
}
