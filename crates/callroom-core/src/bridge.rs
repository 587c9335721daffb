//! Decoding of untyped events coming from the native video SDK bridge.
//!
//! The bridge hands over an event name plus a loosely shaped JSON payload.
//! Everything is validated here so the session only sees [`TransportEvent`].

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::errors::CallError;
use crate::events::TransportEvent;

pub const ROOM_DID_CONNECT: &str = "onRoomDidConnect";
pub const ROOM_DID_DISCONNECT: &str = "onRoomDidDisconnect";
pub const ROOM_DID_FAIL_TO_CONNECT: &str = "onRoomDidFailToConnect";
pub const PARTICIPANT_ADDED_VIDEO_TRACK: &str = "onParticipantAddedVideoTrack";
pub const PARTICIPANT_REMOVED_VIDEO_TRACK: &str = "onParticipantRemovedVideoTrack";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoomPayload {
    #[serde(default)]
    room_name: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ParticipantRef {
    #[serde(alias = "sid")]
    id: String,
}

#[derive(Debug, Deserialize)]
struct TrackRef {
    #[serde(alias = "trackSid")]
    id: String,
}

#[derive(Debug, Deserialize)]
struct TrackPayload {
    participant: ParticipantRef,
    track: TrackRef,
}

/// Turn a named bridge event into a typed [`TransportEvent`].
pub fn decode(name: &str, payload: &Value) -> Result<TransportEvent, CallError> {
    match name {
        ROOM_DID_CONNECT => {
            let room: RoomPayload = parse(name, payload)?;
            if let Some(error) = room.error {
                tracing::warn!("{name} carried an error: {error}");
            }
            Ok(TransportEvent::RoomConnected {
                room_name: room.room_name.unwrap_or_default(),
            })
        }
        ROOM_DID_DISCONNECT => {
            let room: RoomPayload = parse(name, payload)?;
            Ok(TransportEvent::RoomDisconnected {
                room_name: room.room_name.unwrap_or_default(),
                error: room.error,
            })
        }
        ROOM_DID_FAIL_TO_CONNECT => {
            let error = match payload {
                Value::String(s) => s.clone(),
                Value::Null => String::new(),
                _ => parse::<RoomPayload>(name, payload)?.error.unwrap_or_default(),
            };
            Ok(TransportEvent::RoomFailedToConnect { error })
        }
        PARTICIPANT_ADDED_VIDEO_TRACK => {
            let p: TrackPayload = parse(name, payload)?;
            Ok(TransportEvent::TrackAdded {
                participant_id: p.participant.id,
                track_id: p.track.id,
            })
        }
        PARTICIPANT_REMOVED_VIDEO_TRACK => {
            let p: TrackPayload = parse(name, payload)?;
            Ok(TransportEvent::TrackRemoved {
                participant_id: p.participant.id,
                track_id: p.track.id,
            })
        }
        other => Err(CallError::Bridge(format!("unknown event '{other}'"))),
    }
}

/// Same as [`decode`], for a payload still in its JSON text form.
pub fn decode_str(name: &str, json: &str) -> Result<TransportEvent, CallError> {
    let payload = if json.trim().is_empty() {
        Value::Null
    } else {
        serde_json::from_str(json).map_err(|e| CallError::Bridge(format!("{name}: {e}")))?
    };
    decode(name, &payload)
}

fn parse<T: DeserializeOwned>(name: &str, payload: &Value) -> Result<T, CallError> {
    // Room events may arrive without any payload at all.
    let parsed = if payload.is_null() {
        T::deserialize(Value::Object(Default::default()))
    } else {
        T::deserialize(payload)
    };
    parsed.map_err(|e| CallError::Bridge(format!("{name}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn room_connect_defaults_missing_name() {
        let ev = decode(ROOM_DID_CONNECT, &json!({})).unwrap();
        assert_eq!(ev, TransportEvent::RoomConnected { room_name: String::new() });

        let ev = decode(ROOM_DID_CONNECT, &json!({"roomName": "room1"})).unwrap();
        assert_eq!(ev, TransportEvent::RoomConnected { room_name: "room1".to_string() });
    }

    #[test]
    fn room_disconnect_keeps_error() {
        let payload = json!({"roomName": "room1", "error": "kicked"});
        let ev = decode(ROOM_DID_DISCONNECT, &payload).unwrap();
        assert_eq!(
            ev,
            TransportEvent::RoomDisconnected {
                room_name: "room1".to_string(),
                error: Some("kicked".to_string()),
            }
        );
    }

    #[test]
    fn fail_to_connect_accepts_string_or_object() {
        let ev = decode(ROOM_DID_FAIL_TO_CONNECT, &json!("bad token")).unwrap();
        assert_eq!(ev, TransportEvent::RoomFailedToConnect { error: "bad token".to_string() });

        let ev = decode(ROOM_DID_FAIL_TO_CONNECT, &json!({"error": "timeout"})).unwrap();
        assert_eq!(ev, TransportEvent::RoomFailedToConnect { error: "timeout".to_string() });
    }

    #[test]
    fn track_events_accept_sdk_field_names() {
        let payload = json!({"participant": {"sid": "PA1"}, "track": {"trackSid": "MT1"}});
        let ev = decode(PARTICIPANT_ADDED_VIDEO_TRACK, &payload).unwrap();
        assert_eq!(
            ev,
            TransportEvent::TrackAdded {
                participant_id: "PA1".to_string(),
                track_id: "MT1".to_string(),
            }
        );

        let payload = json!({"participant": {"id": "p1"}, "track": {"id": "t1"}});
        let ev = decode(PARTICIPANT_REMOVED_VIDEO_TRACK, &payload).unwrap();
        assert_eq!(
            ev,
            TransportEvent::TrackRemoved {
                participant_id: "p1".to_string(),
                track_id: "t1".to_string(),
            }
        );
    }

    #[test]
    fn track_event_without_ids_is_rejected() {
        let payload = json!({"participant": {"sid": "p1"}});
        let err = decode(PARTICIPANT_ADDED_VIDEO_TRACK, &payload).unwrap_err();
        assert!(matches!(err, CallError::Bridge(_)));

        let payload = json!({"participant": {}, "track": {"trackSid": "t"}});
        let err = decode(PARTICIPANT_ADDED_VIDEO_TRACK, &payload).unwrap_err();
        assert!(matches!(err, CallError::Bridge(_)));
    }

    #[test]
    fn unknown_event_is_rejected() {
        let err = decode("onDominantSpeakerDidChange", &json!({})).unwrap_err();
        assert!(err.to_string().contains("onDominantSpeakerDidChange"));
    }

    #[test]
    fn decode_str_handles_empty_and_invalid_json() {
        let ev = decode_str(ROOM_DID_CONNECT, "").unwrap();
        assert_eq!(ev, TransportEvent::RoomConnected { room_name: String::new() });
        assert!(decode_str(ROOM_DID_CONNECT, "{oops").is_err());
    }
}
