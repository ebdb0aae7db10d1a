//! Message bus plumbing
//!
//! The pipeline only sees [`RecordProducer`] and [`RecordHandler`]; the Kafka
//! adapter (feature `kafka`) and the in-memory producer implement them.
//!
//! **Record path:**
//! consumer → [`RecordErrorHandler`] → [`FactsEventsListener`] → dispatcher

pub mod error_handler;
#[cfg(feature = "kafka")]
pub mod kafka;
pub mod listener;
pub mod memory;
pub mod publisher;

pub use error_handler::{RecordErrorHandler, RecordOutcome};
pub use listener::{FactsEventsListener, ListenerError};
pub use memory::MemoryProducer;
pub use publisher::{FactsPublisher, PublishError};

use async_trait::async_trait;
use thiserror::Error;

/// Suffix of the dead-letter topic derived from a source topic
pub const DEAD_LETTER_SUFFIX: &str = ".dlt";

/// Partition every dead-lettered record is written to
pub const DEAD_LETTER_PARTITION: i32 = 0;

pub fn dead_letter_topic(topic: &str) -> String {
    format!("{}{}", topic, DEAD_LETTER_SUFFIX)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    #[error("Bus configuration error: {0}")]
    Config(String),

    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error("Delivery wait was cancelled")]
    Cancelled,
}

/// Record to be written to the bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerRecord {
    pub topic: String,
    /// `None` lets the producer's partitioner choose
    pub partition: Option<i32>,
    pub key: Option<Vec<u8>>,
    pub payload: Option<Vec<u8>>,
}

/// Record read from the bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundRecord {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<Vec<u8>>,
    pub payload: Option<Vec<u8>>,
}

impl InboundRecord {
    /// Record with only topic and payload set, as produced by tests and tools
    pub fn with_payload(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            partition: 0,
            offset: 0,
            key: None,
            payload: Some(payload.into()),
        }
    }
}

/// Sends records and waits for the broker acknowledgement
#[async_trait]
pub trait RecordProducer: Send + Sync {
    async fn send(&self, record: ProducerRecord) -> Result<(), BusError>;
}

/// Processes one consumed record
#[async_trait]
pub trait RecordHandler: Send + Sync {
    async fn handle_record(&self, record: &InboundRecord) -> Result<(), ListenerError>;
}
