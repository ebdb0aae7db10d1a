//! Test Helper Utilities
//!
//! Shared fakes and fixtures for facts-gen integration tests

#![allow(dead_code)]

pub mod fakes;
pub mod servers;

pub use fakes::{RecordingMetadata, ScriptedChat};
pub use servers::spawn_server;

use facts_common::config::{DispatchMode, Settings};
use std::time::Duration;

pub const INBOUND_TOPIC: &str = "music.facts.events";
pub const OUTBOUND_TOPIC: &str = "music.track.facts.generated";
pub const DEAD_LETTER_TOPIC: &str = "music.facts.events.dlt";

/// A model answer that passes validation
pub const VALID_FACTS: &str = r#"{"formatVersion":1,"lang":"ru","short":"Короткий факт.","full":"Полный факт. Ещё одно предложение.","sources":[{"title":"Wiki","url":"https://example.org/track"}]}"#;

/// Default settings with fast retries for tests
pub fn test_settings(mode: DispatchMode) -> Settings {
    let mut settings = Settings::default();
    settings.app.dispatch.mode = mode;
    settings.app.kafka.listener.retry.initial_interval_ms = 1;
    settings.app.llm.proxyapi.format_retry.backoff_ms = 0;
    settings
}

/// JSON value for an inbound command
pub fn command_json(event_type: &str, track_id: &str) -> String {
    serde_json::json!({
        "version": "1",
        "eventType": event_type,
        "trackId": track_id,
    })
    .to_string()
}

/// Poll `condition` until it holds, panicking after five seconds
pub async fn wait_until<F>(description: &str, condition: F)
where
    F: Fn() -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        if tokio::time::Instant::now() > deadline {
            panic!("Timed out waiting for: {}", description);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
