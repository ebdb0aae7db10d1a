//! Queue dispatcher and its single generation worker
//!
//! The worker takes one request at a time and runs it in its own task so a
//! panic is reported as a join error instead of killing the loop. Shutdown
//! cancels the token: the worker stops waiting and aborts in-flight work.

use super::admission::{admit, Decision};
use super::pipeline::{GenerationPipeline, ProcessingError};
use super::queue::GenerationQueue;
use super::{Admission, CommandHandler, DispatchStatus};
use async_trait::async_trait;
use facts_common::config::DispatchMode;
use facts_common::events::InboundCommand;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub struct QueueDispatcher {
    queue: Arc<GenerationQueue>,
    pipeline: Arc<GenerationPipeline>,
    status: Arc<DispatchStatus>,
    shutdown: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl QueueDispatcher {
    pub fn new(pipeline: Arc<GenerationPipeline>) -> Self {
        let queue = Arc::new(GenerationQueue::new());
        let status = Arc::new(DispatchStatus::new(DispatchMode::Queue, Some(Arc::clone(&queue))));
        Self {
            queue,
            pipeline,
            status,
            shutdown: CancellationToken::new(),
            worker: Mutex::new(None),
        }
    }

    pub fn queue(&self) -> &Arc<GenerationQueue> {
        &self.queue
    }

    pub fn status(&self) -> Arc<DispatchStatus> {
        Arc::clone(&self.status)
    }

    /// Spawn the worker; calling it again while running is a no-op
    pub fn start(&self) {
        let mut worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        if worker.is_some() {
            warn!("Facts generation worker already started");
            return;
        }

        info!("Starting facts generation worker");
        *worker = Some(tokio::spawn(run_worker(
            Arc::clone(&self.queue),
            Arc::clone(&self.pipeline),
            Arc::clone(&self.status),
            self.shutdown.clone(),
        )));
    }

    /// Stop the worker without draining the queue
    pub async fn shutdown(&self) {
        self.shutdown.cancel();

        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(error = %e, "Facts generation worker ended abnormally");
            }
        }
        info!(pending = self.queue.len(), "Facts generation worker stopped");
    }
}

#[async_trait]
impl CommandHandler for QueueDispatcher {
    async fn handle(&self, command: Option<InboundCommand>) -> Result<Admission, ProcessingError> {
        match admit(command) {
            Decision::Drop(reason) => Ok(Admission::Dropped(reason)),
            Decision::Cancel { track_id } => {
                let removed = self.queue.remove_track(&track_id);
                info!(track_id = %track_id, removed, "Track deleted, removed {} pending", removed);
                Ok(Admission::Cancelled { track_id, removed })
            }
            Decision::Generate(request) => {
                let track_id = request.track_id.clone();
                let queue_len = self.queue.offer(request);
                debug!(track_id = %track_id, queue_len, "Facts request enqueued");
                Ok(Admission::Enqueued { track_id, queue_len })
            }
        }
    }
}

async fn run_worker(
    queue: Arc<GenerationQueue>,
    pipeline: Arc<GenerationPipeline>,
    status: Arc<DispatchStatus>,
    shutdown: CancellationToken,
) {
    loop {
        let request = tokio::select! {
            _ = shutdown.cancelled() => break,
            request = queue.take() => request,
        };

        let track_id = request.track_id.clone();
        let task_pipeline = Arc::clone(&pipeline);
        let mut task = tokio::spawn(async move { task_pipeline.process(&request).await });

        tokio::select! {
            _ = shutdown.cancelled() => {
                task.abort();
                warn!(track_id = %track_id, "Shutdown interrupted in-flight facts generation");
                break;
            }
            joined = &mut task => match joined {
                Ok(Ok(())) => {
                    debug!(track_id = %track_id, "Facts request completed");
                }
                Ok(Err(ProcessingError::TrackNotFound(_))) => {
                    info!(track_id = %track_id, "Track not found, discarding facts request");
                }
                Ok(Err(e)) => {
                    error!(track_id = %track_id, error = %e, "Facts generation failed, discarding request");
                    status.record_error(format!("{}: {}", track_id, e));
                }
                Err(e) => {
                    error!(track_id = %track_id, error = %e, "Facts generation task panicked");
                    status.record_error(format!("{}: worker task failed: {}", track_id, e));
                }
            },
        }
    }

    debug!("Facts generation worker loop exited");
}
