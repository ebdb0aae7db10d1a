//! Music service client
//!
//! Fetches track metadata from `GET {base_url}/internal/tracks/{trackId}`.
//!
//! A 404 is reported as [`MetadataError::TrackNotFound`] so callers can treat it
//! as permanent; every other failure is a fetch error. No retries happen here.

use async_trait::async_trait;
use facts_common::config::MusicServiceSettings;
use facts_common::models::TrackMetadata;
use reqwest::{StatusCode, Url};
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("facts-gen/", env!("CARGO_PKG_VERSION"));

/// Music service client errors
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("Track {0} not found")]
    TrackNotFound(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Music service error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid music service URL: {0}")]
    InvalidUrl(String),
}

/// Source of track metadata
#[async_trait]
pub trait TrackMetadataSource: Send + Sync {
    async fn get_track(&self, track_id: &str) -> Result<TrackMetadata, MetadataError>;
}

/// HTTP client for the Music service internal API
pub struct MusicServiceClient {
    http_client: reqwest::Client,
    base_url: Url,
}

impl MusicServiceClient {
    pub fn new(settings: &MusicServiceSettings) -> Result<Self, MetadataError> {
        let base_url = Url::parse(&settings.base_url)
            .map_err(|e| MetadataError::InvalidUrl(format!("{}: {}", settings.base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(MetadataError::InvalidUrl(settings.base_url.clone()));
        }

        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_millis(settings.timeout_ms))
            .build()
            .map_err(|e| MetadataError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url,
        })
    }

    /// URL for one track; the id is encoded as a single path segment
    fn track_url(&self, track_id: &str) -> Result<Url, MetadataError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| MetadataError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(["internal", "tracks", track_id]);
        Ok(url)
    }
}

#[async_trait]
impl TrackMetadataSource for MusicServiceClient {
    async fn get_track(&self, track_id: &str) -> Result<TrackMetadata, MetadataError> {
        let url = self.track_url(track_id)?;

        tracing::debug!(track_id = %track_id, url = %url, "Fetching track metadata");

        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| MetadataError::NetworkError(e.to_string()))?;

        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Err(MetadataError::TrackNotFound(track_id.to_string()));
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(MetadataError::ApiError(status.as_u16(), error_text));
        }

        let metadata: TrackMetadata = response
            .json()
            .await
            .map_err(|e| MetadataError::ParseError(e.to_string()))?;

        tracing::info!(
            track_id = %track_id,
            title = %metadata.title.as_deref().unwrap_or("unknown"),
            artist = %metadata.artist.as_deref().unwrap_or("unknown"),
            "Retrieved track metadata"
        );

        Ok(metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base_url: &str) -> MusicServiceClient {
        MusicServiceClient::new(&MusicServiceSettings {
            base_url: base_url.to_string(),
            timeout_ms: 1_000,
        })
        .unwrap()
    }

    #[test]
    fn test_track_url_joins_segments() {
        let url = client("http://music:8080").track_url("t1").unwrap();
        assert_eq!(url.as_str(), "http://music:8080/internal/tracks/t1");
    }

    #[test]
    fn test_track_url_keeps_base_path_and_trailing_slash() {
        let url = client("http://gw/music/").track_url("t1").unwrap();
        assert_eq!(url.as_str(), "http://gw/music/internal/tracks/t1");
    }

    #[test]
    fn test_track_id_is_segment_encoded() {
        let url = client("http://music").track_url("a/b c").unwrap();
        assert_eq!(url.as_str(), "http://music/internal/tracks/a%2Fb%20c");
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        let result = MusicServiceClient::new(&MusicServiceSettings {
            base_url: "not a url".to_string(),
            timeout_ms: 1_000,
        });
        assert!(matches!(result, Err(MetadataError::InvalidUrl(_))));
    }
}
