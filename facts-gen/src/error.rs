//! Error types for facts-gen wiring
//!
//! Component errors live next to their components; this enum covers
//! service construction only.

use crate::bus::BusError;
use crate::services::{LlmError, MetadataError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(#[from] facts_common::Error),

    #[error("Music service client: {0}")]
    Metadata(#[from] MetadataError),

    #[error("LLM gateway client: {0}")]
    Llm(#[from] LlmError),

    #[error("Message bus: {0}")]
    Bus(#[from] BusError),
}

pub type ServiceResult<T> = Result<T, ServiceError>;
