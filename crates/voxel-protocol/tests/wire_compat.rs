// Verify the wire format matches what the browser client expects.
// These tests ensure protocol compatibility is never broken.

use chrono::{TimeZone, Utc};
use voxel_core::types::{GameSession, GameState, GameType, PositionRecord};
use voxel_protocol::{ClientMessage, ProtocolError, ServerMessage};

#[test]
fn move_envelope_decodes_position() {
    let json = r#"{"type":"move","payload":{"userId":"A","x":1,"y":2,"latitude":52.5,"longitude":13.4}}"#;
    match ClientMessage::parse(json).unwrap() {
        ClientMessage::Move(pos) => {
            assert_eq!(pos.user_id, "A");
            assert_eq!(pos.x, 1.0);
            assert_eq!(pos.latitude, 52.5);
        }
        other => panic!("expected move, got {:?}", other),
    }
}

#[test]
fn create_event_missing_field_is_validation_error() {
    // no voxelTheme
    let json = r#"{"type":"create_event","payload":{
        "title":"Meetup","description":"d","x":1,"y":2,
        "creatorId":"u1","ticketPrice":0,"hasTickets":false}}"#;
    let err = ClientMessage::parse(json).unwrap_err();
    match err {
        ProtocolError::InvalidPayload { kind, reason } => {
            assert_eq!(kind, "create_event");
            assert!(reason.contains("voxelTheme"), "reason was: {reason}");
        }
        other => panic!("expected invalid payload, got {:?}", other),
    }
}

#[test]
fn create_event_full_payload_decodes() {
    let json = r#"{"type":"create_event","payload":{
        "title":"Meetup","description":"d","x":1,"y":2,
        "creatorId":"u1","ticketPrice":4.5,"hasTickets":true,"voxelTheme":"forest"}}"#;
    match ClientMessage::parse(json).unwrap() {
        ClientMessage::CreateEvent(ev) => {
            assert_eq!(ev.creator_id, "u1");
            assert!(ev.has_tickets);
        }
        other => panic!("expected create_event, got {:?}", other),
    }
}

#[test]
fn create_session_game_type_wire_name() {
    let json = r#"{"type":"create_session","payload":{"gameType":"PROXIMITY_TAG"}}"#;
    assert_eq!(
        ClientMessage::parse(json).unwrap(),
        ClientMessage::CreateSession {
            game_type: GameType::ProximityTag
        }
    );

    let bad = r#"{"type":"create_session","payload":{"gameType":"CHESS"}}"#;
    assert_eq!(ClientMessage::parse(bad).unwrap_err().code(), "INVALID_PAYLOAD");
}

#[test]
fn unknown_type_is_distinguished_from_malformed() {
    let unknown = ClientMessage::parse(r#"{"type":"dance","payload":{}}"#).unwrap_err();
    assert!(matches!(unknown, ProtocolError::UnknownType(ref k) if k == "dance"));

    let malformed = ClientMessage::parse("{not json").unwrap_err();
    assert_eq!(malformed.code(), "MALFORMED_FRAME");

    let untyped = ClientMessage::parse(r#"{"payload":{}}"#).unwrap_err();
    assert_eq!(untyped.code(), "MALFORMED_FRAME");
}

#[test]
fn leave_serialization() {
    let json = String::from(&*ServerMessage::leave("u-9").encode().unwrap());
    assert_eq!(json, r#"{"type":"leave","payload":{"userId":"u-9"}}"#);
}

#[test]
fn session_update_carries_session_as_payload() {
    let session = GameSession {
        id: "s1".into(),
        host_id: "C".into(),
        game_type: GameType::TreasureHunt,
        state: GameState::Lobby,
        players: vec!["C".into()],
        created_at: Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap(),
    };
    let frame = ServerMessage::SessionUpdate(session).encode().unwrap();
    let value: serde_json::Value = serde_json::from_str(&frame).unwrap();

    assert_eq!(value["type"], "session_update");
    assert_eq!(value["payload"]["hostId"], "C");
    assert_eq!(value["payload"]["gameType"], "TREASURE_HUNT");
    assert_eq!(value["payload"]["state"], "LOBBY");
    assert_eq!(value["payload"]["players"][0], "C");
}

#[test]
fn replayed_move_matches_client_shape() {
    let frame = ServerMessage::Move(PositionRecord {
        user_id: "B".into(),
        x: 3.0,
        y: 4.0,
        latitude: 0.0,
        longitude: 0.0,
    })
    .encode()
    .unwrap();

    // A replayed move must be indistinguishable from a relayed one.
    match ClientMessage::parse(&frame).unwrap() {
        ClientMessage::Move(pos) => assert_eq!(pos.user_id, "B"),
        other => panic!("expected move, got {:?}", other),
    }
}

#[test]
fn error_envelope_shape() {
    let frame = ServerMessage::error("INVALID_PAYLOAD", "missing field `title`")
        .encode()
        .unwrap();
    let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
    assert_eq!(value["type"], "error");
    assert_eq!(value["payload"]["code"], "INVALID_PAYLOAD");
}

#[test]
fn empty_events_list_is_an_array() {
    let frame = ServerMessage::EventsList(vec![]).encode().unwrap();
    assert_eq!(&*frame, r#"{"type":"events_list","payload":[]}"#);
}
