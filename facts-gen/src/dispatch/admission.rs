//! Command admission
//!
//! Rules, first match wins:
//! 1. null command: drop (warn)
//! 2. `deleted` with a non-blank track id: cancel pending work for that track
//! 3. event type other than `created`/`updated`/`refresh`: drop (info)
//! 4. blank track id: drop (warn)
//! 5. otherwise: generate

use chrono::{DateTime, Utc};
use facts_common::events::{EventKind, InboundCommand};
use tracing::{info, warn};

/// Why a command was not admitted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    NullCommand,
    UnsupportedEvent,
    BlankTrackId,
}

/// Unit of generation work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub track_id: String,
    pub event_kind: EventKind,
    pub priority: i32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Drop(DropReason),
    Cancel { track_id: String },
    Generate(GenerationRequest),
}

/// Apply the admission rules to one command
pub fn admit(command: Option<InboundCommand>) -> Decision {
    let Some(command) = command else {
        warn!("Received null facts command, skipping");
        return Decision::Drop(DropReason::NullCommand);
    };

    let kind = command.kind();

    if kind == Some(EventKind::Deleted) {
        if let Some(track_id) = command.non_blank_track_id() {
            return Decision::Cancel {
                track_id: track_id.to_string(),
            };
        }
    }

    let Some(event_kind) = kind.filter(|k| k.requires_generation()) else {
        info!(
            event_type = %command.event_type.as_deref().unwrap_or(""),
            track_id = %command.track_id.as_deref().unwrap_or(""),
            "Unsupported eventType, skipping"
        );
        return Decision::Drop(DropReason::UnsupportedEvent);
    };

    let Some(track_id) = command.non_blank_track_id() else {
        warn!(event_type = %event_kind, "Facts command has blank trackId, skipping");
        return Decision::Drop(DropReason::BlankTrackId);
    };

    Decision::Generate(GenerationRequest {
        track_id: track_id.to_string(),
        event_kind,
        priority: command.priority_or_default(),
        timestamp: command.timestamp_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(event_type: &str, track_id: &str) -> InboundCommand {
        InboundCommand {
            event_type: Some(event_type.to_string()),
            track_id: Some(track_id.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_null_command_is_dropped() {
        assert_eq!(admit(None), Decision::Drop(DropReason::NullCommand));
    }

    #[test]
    fn test_deleted_cancels_by_track() {
        assert_eq!(
            admit(Some(command("DELETED", "t1"))),
            Decision::Cancel {
                track_id: "t1".to_string()
            }
        );
    }

    #[test]
    fn test_deleted_with_blank_track_is_unsupported() {
        assert_eq!(
            admit(Some(command("deleted", "  "))),
            Decision::Drop(DropReason::UnsupportedEvent)
        );
    }

    #[test]
    fn test_unknown_event_is_dropped() {
        assert_eq!(
            admit(Some(command("archived", "t1"))),
            Decision::Drop(DropReason::UnsupportedEvent)
        );
        assert_eq!(
            admit(Some(InboundCommand {
                track_id: Some("t1".into()),
                ..Default::default()
            })),
            Decision::Drop(DropReason::UnsupportedEvent)
        );
    }

    #[test]
    fn test_blank_track_is_dropped() {
        assert_eq!(
            admit(Some(command("created", ""))),
            Decision::Drop(DropReason::BlankTrackId)
        );
        assert_eq!(
            admit(Some(InboundCommand {
                event_type: Some("refresh".into()),
                ..Default::default()
            })),
            Decision::Drop(DropReason::BlankTrackId)
        );
    }

    #[test]
    fn test_generation_request_uses_defaults() {
        let Decision::Generate(request) = admit(Some(command("Updated", "t9"))) else {
            panic!("expected generation");
        };

        assert_eq!(request.track_id, "t9");
        assert_eq!(request.event_kind, EventKind::Updated);
        assert_eq!(request.priority, 0);
        assert_eq!(request.timestamp, DateTime::<Utc>::UNIX_EPOCH);
    }
}
