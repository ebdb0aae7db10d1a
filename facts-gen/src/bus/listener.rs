//! Facts events listener
//!
//! Decodes inbound record values into commands and hands them to the
//! dispatcher. Producers sometimes serialize the JSON twice, so a string root
//! is parsed once more; a second string layer is treated as malformed.

use super::{InboundRecord, RecordHandler};
use crate::dispatch::{CommandHandler, ProcessingError};
use async_trait::async_trait;
use facts_common::events::InboundCommand;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("Malformed facts event: {0}")]
    Malformed(String),

    #[error(transparent)]
    Processing(#[from] ProcessingError),
}

impl ListenerError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Malformed(_) => false,
            Self::Processing(e) => e.is_retryable(),
        }
    }
}

/// Decode a record value; `Ok(None)` is a JSON `null` command
pub fn decode_command(payload: Option<&[u8]>) -> Result<Option<InboundCommand>, ListenerError> {
    let bytes = match payload {
        Some(bytes) if !bytes.is_empty() => bytes,
        _ => return Err(ListenerError::Malformed("empty record value".to_string())),
    };

    let text = std::str::from_utf8(bytes)
        .map_err(|e| ListenerError::Malformed(format!("value is not UTF-8: {}", e)))?;

    let mut value: Value = serde_json::from_str(text)
        .map_err(|e| ListenerError::Malformed(format!("invalid JSON: {}", e)))?;

    if let Value::String(inner) = value {
        value = serde_json::from_str(&inner)
            .map_err(|e| ListenerError::Malformed(format!("invalid double-encoded JSON: {}", e)))?;
    }

    if value.is_null() {
        return Ok(None);
    }

    if !value.is_object() {
        return Err(ListenerError::Malformed(
            "facts command must be a JSON object".to_string(),
        ));
    }

    serde_json::from_value(value)
        .map(Some)
        .map_err(|e| ListenerError::Malformed(format!("not a facts command: {}", e)))
}

pub struct FactsEventsListener {
    dispatcher: Arc<dyn CommandHandler>,
}

impl FactsEventsListener {
    pub fn new(dispatcher: Arc<dyn CommandHandler>) -> Self {
        Self { dispatcher }
    }
}

#[async_trait]
impl RecordHandler for FactsEventsListener {
    async fn handle_record(&self, record: &InboundRecord) -> Result<(), ListenerError> {
        let command = decode_command(record.payload.as_deref())?;

        if let Some(command) = &command {
            info!(
                event_type = %command.event_type.as_deref().unwrap_or(""),
                track_id = %command.track_id.as_deref().unwrap_or(""),
                timestamp = ?command.timestamp,
                priority = ?command.priority,
                partition = record.partition,
                offset = record.offset,
                "Received facts command"
            );
        }

        self.dispatcher.handle(command).await?;
        Ok(())
    }
}
