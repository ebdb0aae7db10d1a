//! Generation pipeline: metadata fetch → facts generation → publish

use super::admission::GenerationRequest;
use crate::bus::{FactsPublisher, PublishError};
use crate::services::{FactsGenerator, GenerationError, MetadataError, TrackMetadataSource};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("Track {0} not found in Music service")]
    TrackNotFound(String),

    #[error("Failed to fetch track metadata: {0}")]
    Metadata(MetadataError),

    #[error("Facts generation failed: {0}")]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Publish(#[from] PublishError),
}

impl ProcessingError {
    /// A missing track will stay missing; everything else may succeed later
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::TrackNotFound(_))
    }
}

impl From<MetadataError> for ProcessingError {
    fn from(err: MetadataError) -> Self {
        match err {
            MetadataError::TrackNotFound(track_id) => Self::TrackNotFound(track_id),
            other => Self::Metadata(other),
        }
    }
}

pub struct GenerationPipeline {
    metadata: Arc<dyn TrackMetadataSource>,
    generator: FactsGenerator,
    publisher: FactsPublisher,
}

impl GenerationPipeline {
    pub fn new(
        metadata: Arc<dyn TrackMetadataSource>,
        generator: FactsGenerator,
        publisher: FactsPublisher,
    ) -> Self {
        Self {
            metadata,
            generator,
            publisher,
        }
    }

    /// Run one request end to end
    pub async fn process(&self, request: &GenerationRequest) -> Result<(), ProcessingError> {
        let event_type = request.event_kind.as_str();

        info!(
            track_id = %request.track_id,
            event_type = %event_type,
            priority = request.priority,
            "Processing facts request"
        );

        let metadata = self.metadata.get_track(&request.track_id).await.map_err(|err| {
            let err = ProcessingError::from(err);
            if let ProcessingError::TrackNotFound(_) = err {
                warn!(track_id = %request.track_id, "Track not found in Music service");
            }
            err
        })?;

        let generated = self.generator.generate_facts(&metadata, event_type).await?;

        self.publisher
            .publish(
                &request.track_id,
                &generated.facts_json,
                event_type,
                &generated.template_name,
            )
            .await?;

        Ok(())
    }
}
