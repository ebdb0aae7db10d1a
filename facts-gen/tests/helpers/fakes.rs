//! In-process fakes for the metadata source and the chat model

use async_trait::async_trait;
use facts_common::models::TrackMetadata;
use facts_gen::services::{ChatCompletion, ChatMessage, LlmError, MetadataError, TrackMetadataSource};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

/// Chat model that replays scripted answers, then a fallback
pub struct ScriptedChat {
    script: Mutex<VecDeque<Result<String, LlmError>>>,
    fallback: Option<String>,
    calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedChat {
    pub fn new(script: Vec<Result<String, LlmError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Always answer with `content`
    pub fn always(content: &str) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Some(content.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Answer with `content` once the script runs out
    pub fn then_always(mut self, content: &str) -> Self {
        self.fallback = Some(content.to_string());
        self
    }

    pub fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatCompletion for ScriptedChat {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        self.calls.lock().unwrap().push(messages.to_vec());
        if let Some(next) = self.script.lock().unwrap().pop_front() {
            return next;
        }
        self.fallback.clone().ok_or(LlmError::EmptyResponse)
    }
}

/// Metadata source backed by a map; unknown ids are 404s
#[derive(Default)]
pub struct RecordingMetadata {
    tracks: HashMap<String, TrackMetadata>,
    unavailable: HashSet<String>,
    gate: Option<Arc<Semaphore>>,
    calls: Mutex<Vec<String>>,
}

impl RecordingMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a track with a title derived from its id
    pub fn with_track(mut self, track_id: &str) -> Self {
        self.tracks.insert(
            track_id.to_string(),
            TrackMetadata {
                id: Some(track_id.to_string()),
                title: Some(format!("Title {}", track_id)),
                artist: Some("Artist".to_string()),
                year: Some(2001),
                ..Default::default()
            },
        );
        self
    }

    /// Answer 503 for this track
    pub fn with_unavailable(mut self, track_id: &str) -> Self {
        self.unavailable.insert(track_id.to_string());
        self
    }

    /// Block every lookup until the semaphore hands out a permit
    pub fn with_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Track ids requested so far, in call order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TrackMetadataSource for RecordingMetadata {
    async fn get_track(&self, track_id: &str) -> Result<TrackMetadata, MetadataError> {
        self.calls.lock().unwrap().push(track_id.to_string());

        if let Some(gate) = &self.gate {
            let _permit = gate.acquire().await.unwrap();
        }

        if self.unavailable.contains(track_id) {
            return Err(MetadataError::ApiError(503, "unavailable".to_string()));
        }
        self.tracks
            .get(track_id)
            .cloned()
            .ok_or_else(|| MetadataError::TrackNotFound(track_id.to_string()))
    }
}
