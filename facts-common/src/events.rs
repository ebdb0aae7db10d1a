//! Bus message types
//!
//! Inbound commands arrive on the facts-events topic from the Music service;
//! generated facts leave on the generated-facts topic keyed by track id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Priority assumed when a command carries none
pub const DEFAULT_PRIORITY: i32 = 0;

/// Lifecycle event kinds understood by the generator
///
/// Matching is case-insensitive; anything else is ignored upstream of the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Created,
    Updated,
    Refresh,
    Deleted,
}

impl EventKind {
    /// Parse a raw `eventType` value, ignoring case
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "created" => Some(Self::Created),
            "updated" => Some(Self::Updated),
            "refresh" => Some(Self::Refresh),
            "deleted" => Some(Self::Deleted),
            _ => None,
        }
    }

    /// Whether this kind asks for a (re)generation
    pub fn requires_generation(self) -> bool {
        !matches!(self, Self::Deleted)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Refresh => "refresh",
            Self::Deleted => "deleted",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Command received from the facts-events topic
///
/// Every field is optional on the wire; unknown fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundCommand {
    /// Opaque schema tag set by the producer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Raw event type (`created`, `updated`, `refresh`, `deleted`, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    /// Track identifier in the Music service
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track_id: Option<String>,
    /// Higher values are generated first
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
    /// Producer timestamp, used as the ordering tie-breaker
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl InboundCommand {
    /// Recognised event kind, if any
    pub fn kind(&self) -> Option<EventKind> {
        self.event_type.as_deref().and_then(EventKind::parse)
    }

    /// Track id when present and not blank
    pub fn non_blank_track_id(&self) -> Option<&str> {
        self.track_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
    }

    pub fn priority_or_default(&self) -> i32 {
        self.priority.unwrap_or(DEFAULT_PRIORITY)
    }

    /// Timestamp, or the Unix epoch when absent
    pub fn timestamp_or_default(&self) -> DateTime<Utc> {
        self.timestamp.unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }
}

/// Payload published on the generated-facts topic
///
/// `facts_json` carries the serialized facts document as a string so the
/// consumer can store it verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedFacts {
    pub track_id: String,
    pub facts_json: String,
}

impl GeneratedFacts {
    pub fn new(track_id: impl Into<String>, facts_json: impl Into<String>) -> Self {
        Self {
            track_id: track_id.into(),
            facts_json: facts_json.into(),
        }
    }

    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_is_case_insensitive() {
        assert_eq!(EventKind::parse("CREATED"), Some(EventKind::Created));
        assert_eq!(EventKind::parse("Refresh"), Some(EventKind::Refresh));
        assert_eq!(EventKind::parse("deleted"), Some(EventKind::Deleted));
        assert_eq!(EventKind::parse("played"), None);
        assert_eq!(EventKind::parse(""), None);
    }

    #[test]
    fn test_only_deleted_skips_generation() {
        assert!(EventKind::Created.requires_generation());
        assert!(EventKind::Updated.requires_generation());
        assert!(EventKind::Refresh.requires_generation());
        assert!(!EventKind::Deleted.requires_generation());
    }

    #[test]
    fn test_command_ignores_unknown_fields() {
        let json = r#"{"version":"1","eventType":"created","trackId":"t1","priority":5,
            "timestamp":"2024-01-01T00:00:00Z","source":"catalogue","extra":{"a":1}}"#;
        let command: InboundCommand = serde_json::from_str(json).unwrap();

        assert_eq!(command.version.as_deref(), Some("1"));
        assert_eq!(command.kind(), Some(EventKind::Created));
        assert_eq!(command.non_blank_track_id(), Some("t1"));
        assert_eq!(command.priority_or_default(), 5);
        assert_eq!(command.timestamp_or_default().to_rfc3339(), "2024-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_missing_fields_fall_back_to_defaults() {
        let command: InboundCommand = serde_json::from_str(r#"{"trackId":"  "}"#).unwrap();

        assert_eq!(command.kind(), None);
        assert_eq!(command.non_blank_track_id(), None);
        assert_eq!(command.priority_or_default(), DEFAULT_PRIORITY);
        assert_eq!(command.timestamp_or_default().timestamp(), 0);
    }

    #[test]
    fn test_generated_facts_wire_shape() {
        let message = GeneratedFacts::new("t1", r#"{"short":"s"}"#);
        let value: serde_json::Value = serde_json::from_str(&message.to_json().unwrap()).unwrap();

        assert_eq!(value["trackId"], "t1");
        assert_eq!(value["factsJson"], r#"{"short":"s"}"#);
    }
}
