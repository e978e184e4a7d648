// Envelope `type` values exchanged with clients.

// client → server, relayed to the sender's scope
pub const MOVE: &str = "move";
pub const AUDIO: &str = "audio";
pub const WEBRTC_OFFER: &str = "webrtc_offer";
pub const WEBRTC_ANSWER: &str = "webrtc_answer";
pub const WEBRTC_ICE_CANDIDATE: &str = "webrtc_ice_candidate";

// client → server, handled by the gateway
pub const CREATE_EVENT: &str = "create_event";
pub const CREATE_SESSION: &str = "create_session";
pub const JOIN_SESSION: &str = "join_session";
pub const START_GAME: &str = "start_game";

// server → client
pub const EVENTS_LIST: &str = "events_list";
pub const LEAVE: &str = "leave";
pub const EVENT_CREATED: &str = "event_created";
pub const SESSION_UPDATE: &str = "session_update";
pub const ERROR: &str = "error";
