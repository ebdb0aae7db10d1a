//! HTTP API

pub mod health;

pub use health::{health_routes, HealthResponse};
