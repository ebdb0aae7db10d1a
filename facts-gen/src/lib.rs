//! facts-gen library interface
//!
//! Exposes the pipeline pieces for the binary and for integration testing.

pub mod api;
pub mod bus;
pub mod dispatch;
pub mod error;
pub mod service;
pub mod services;
pub mod utils;

pub use crate::error::{ServiceError, ServiceResult};
pub use crate::service::FactsService;

use axum::Router;
use chrono::{DateTime, Utc};
use dispatch::DispatchStatus;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Dispatcher mode, queue depth and last processing error
    pub dispatch: Arc<DispatchStatus>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(dispatch: Arc<DispatchStatus>) -> Self {
        Self {
            dispatch,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new().merge(api::health_routes()).with_state(state)
}
