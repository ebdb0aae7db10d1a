//! Synchronous dispatcher: generation happens inside the listener call

use super::admission::{admit, Decision};
use super::pipeline::{GenerationPipeline, ProcessingError};
use super::{Admission, CommandHandler, DispatchStatus};
use async_trait::async_trait;
use facts_common::config::DispatchMode;
use facts_common::events::InboundCommand;
use std::sync::Arc;
use tracing::info;

pub struct DirectDispatcher {
    pipeline: Arc<GenerationPipeline>,
    status: Arc<DispatchStatus>,
}

impl DirectDispatcher {
    pub fn new(pipeline: Arc<GenerationPipeline>) -> Self {
        Self {
            pipeline,
            status: Arc::new(DispatchStatus::new(DispatchMode::Direct, None)),
        }
    }

    pub fn status(&self) -> Arc<DispatchStatus> {
        Arc::clone(&self.status)
    }
}

#[async_trait]
impl CommandHandler for DirectDispatcher {
    async fn handle(&self, command: Option<InboundCommand>) -> Result<Admission, ProcessingError> {
        match admit(command) {
            Decision::Drop(reason) => Ok(Admission::Dropped(reason)),
            Decision::Cancel { track_id } => {
                // Nothing is ever pending here
                info!(track_id = %track_id, removed = 0, "Track deleted, removed 0 pending");
                Ok(Admission::Cancelled {
                    track_id,
                    removed: 0,
                })
            }
            Decision::Generate(request) => match self.pipeline.process(&request).await {
                Ok(()) => Ok(Admission::Processed {
                    track_id: request.track_id,
                }),
                Err(e) => {
                    self.status.record_error(format!("{}: {}", request.track_id, e));
                    Err(e)
                }
            },
        }
    }
}
