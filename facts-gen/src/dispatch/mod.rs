//! Generation dispatch
//!
//! Two interchangeable dispatchers sit behind [`CommandHandler`]:
//! - [`QueueDispatcher`]: admitted commands go to a priority queue drained by
//!   one worker task; failures are logged and dropped
//! - [`DirectDispatcher`]: admitted commands run inside the listener call;
//!   failures propagate to the bus error handler
//!
//! Both apply the same admission rules (see [`admission`]).

pub mod admission;
pub mod direct;
pub mod pipeline;
pub mod queue;
pub mod worker;

pub use admission::{admit, Decision, DropReason, GenerationRequest};
pub use direct::DirectDispatcher;
pub use pipeline::{GenerationPipeline, ProcessingError};
pub use queue::GenerationQueue;
pub use worker::QueueDispatcher;

use async_trait::async_trait;
use facts_common::config::DispatchMode;
use facts_common::events::InboundCommand;
use std::sync::{Arc, Mutex, PoisonError};

/// What happened to a handled command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// Queued for the worker
    Enqueued { track_id: String, queue_len: usize },
    /// Generated and published within the call
    Processed { track_id: String },
    /// Pending work for the track was purged
    Cancelled { track_id: String, removed: usize },
    Dropped(DropReason),
}

/// Entry point used by the listener
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(&self, command: Option<InboundCommand>) -> Result<Admission, ProcessingError>;
}

/// Dispatcher state shared with the health endpoint
pub struct DispatchStatus {
    mode: DispatchMode,
    queue: Option<Arc<GenerationQueue>>,
    last_error: Mutex<Option<String>>,
}

impl DispatchStatus {
    pub fn new(mode: DispatchMode, queue: Option<Arc<GenerationQueue>>) -> Self {
        Self {
            mode,
            queue,
            last_error: Mutex::new(None),
        }
    }

    pub fn mode(&self) -> DispatchMode {
        self.mode
    }

    /// Pending requests (always zero in direct mode)
    pub fn queue_depth(&self) -> usize {
        self.queue.as_ref().map_or(0, |queue| queue.len())
    }

    pub fn record_error(&self, message: impl Into<String>) {
        *self.last_error.lock().unwrap_or_else(PoisonError::into_inner) = Some(message.into());
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
