//! # Facts Common Library
//!
//! Shared code for the track facts services including:
//! - Inbound command and outbound message types
//! - Track metadata and facts document models
//! - Configuration loading with environment overrides
//! - Common error type

pub mod config;
pub mod error;
pub mod events;
pub mod models;

pub use error::{Error, Result};
