//! Service wiring
//!
//! Builds the clients, generator, publisher and the dispatcher selected by
//! `app.dispatch.mode`, and exposes the bus-facing record handler.

use crate::bus::{FactsEventsListener, FactsPublisher, RecordErrorHandler, RecordProducer};
use crate::dispatch::{
    CommandHandler, DirectDispatcher, DispatchStatus, GenerationPipeline, GenerationQueue,
    QueueDispatcher,
};
use crate::error::ServiceResult;
use crate::services::{
    ChatCompletion, FactsGenerator, LlmGatewayClient, MusicServiceClient, TrackMetadataSource,
};
use facts_common::config::{DispatchMode, Settings};
use std::sync::Arc;
use tracing::info;

enum Dispatcher {
    Queue(Arc<QueueDispatcher>),
    Direct(Arc<DirectDispatcher>),
}

pub struct FactsService {
    dispatcher: Dispatcher,
    records: Arc<RecordErrorHandler>,
}

impl FactsService {
    /// Wire the service around the given collaborators
    pub fn new(
        settings: &Settings,
        metadata: Arc<dyn TrackMetadataSource>,
        chat: Arc<dyn ChatCompletion>,
        producer: Arc<dyn RecordProducer>,
    ) -> Self {
        let llm = &settings.app.llm;
        let generator = FactsGenerator::new(chat, llm.prompt.clone(), llm.proxyapi.format_retry);
        let publisher = FactsPublisher::new(
            Arc::clone(&producer),
            settings.app.kafka.topics.generated_facts.clone(),
        );
        let pipeline = Arc::new(GenerationPipeline::new(metadata, generator, publisher));

        let dispatcher = match settings.app.dispatch.mode {
            DispatchMode::Queue => Dispatcher::Queue(Arc::new(QueueDispatcher::new(pipeline))),
            DispatchMode::Direct => Dispatcher::Direct(Arc::new(DirectDispatcher::new(pipeline))),
        };

        let command_handler: Arc<dyn CommandHandler> = match &dispatcher {
            Dispatcher::Queue(queue) => queue.clone(),
            Dispatcher::Direct(direct) => direct.clone(),
        };
        let listener = Arc::new(FactsEventsListener::new(command_handler));
        let records = Arc::new(RecordErrorHandler::new(
            listener,
            producer,
            &settings.app.kafka.listener.retry,
        ));

        info!(
            dispatch_mode = settings.app.dispatch.mode.as_str(),
            inbound_topic = %settings.app.kafka.topics.facts_events,
            outbound_topic = %settings.app.kafka.topics.generated_facts,
            "Facts service wired"
        );

        Self {
            dispatcher,
            records,
        }
    }

    /// Wire the service with the HTTP clients described by `settings`
    pub fn from_settings(settings: &Settings, producer: Arc<dyn RecordProducer>) -> ServiceResult<Self> {
        let metadata = Arc::new(MusicServiceClient::new(&settings.app.music_service)?);
        let chat = Arc::new(LlmGatewayClient::new(&settings.app.llm.proxyapi)?);
        Ok(Self::new(settings, metadata, chat, producer))
    }

    /// Handler for consumed records (retry + dead-letter wrapped)
    pub fn record_handler(&self) -> Arc<RecordErrorHandler> {
        Arc::clone(&self.records)
    }

    pub fn command_handler(&self) -> Arc<dyn CommandHandler> {
        match &self.dispatcher {
            Dispatcher::Queue(queue) => queue.clone(),
            Dispatcher::Direct(direct) => direct.clone(),
        }
    }

    pub fn status(&self) -> Arc<DispatchStatus> {
        match &self.dispatcher {
            Dispatcher::Queue(queue) => queue.status(),
            Dispatcher::Direct(direct) => direct.status(),
        }
    }

    /// Pending queue (queue mode only)
    pub fn queue(&self) -> Option<Arc<GenerationQueue>> {
        match &self.dispatcher {
            Dispatcher::Queue(queue) => Some(Arc::clone(queue.queue())),
            Dispatcher::Direct(_) => None,
        }
    }

    /// Start the generation worker (queue mode)
    pub fn start(&self) {
        if let Dispatcher::Queue(queue) = &self.dispatcher {
            queue.start();
        }
    }

    pub async fn shutdown(&self) {
        if let Dispatcher::Queue(queue) = &self.dispatcher {
            queue.shutdown().await;
        }
    }
}
