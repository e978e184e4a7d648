use std::collections::{HashMap, HashSet, VecDeque};

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};
use voxel_core::types::{ConnId, PositionRecord, Scope, VoxelEvent};
use voxel_protocol::{Frame, ServerMessage};

use crate::command::{Audience, Connection, HubCommand, HubStats};

/// Outcome of one fan-out.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Recipients whose queue accepted the frame.
    pub delivered: usize,
    /// Connections removed because their queue was full or closed,
    /// including any evicted while announcing those departures.
    pub evicted: Vec<ConnId>,
}

/// Sole owner of the live connection set, the position cache and the event
/// catalog. Only the registry loop touches it, so no locking is needed.
pub struct Registry {
    connections: HashMap<ConnId, Connection>,
    /// user_id -> last reported position, last write wins.
    positions: HashMap<String, PositionRecord>,
    events: Vec<VoxelEvent>,
}

impl Registry {
    pub fn new(events: Vec<VoxelEvent>) -> Self {
        Self {
            connections: HashMap::new(),
            positions: HashMap::new(),
            events,
        }
    }

    /// Consume commands until every `HubHandle` is dropped.
    pub async fn run(mut self, mut rx: mpsc::Receiver<HubCommand>) {
        info!(events = self.events.len(), "hub event loop started");
        while let Some(cmd) = rx.recv().await {
            self.apply(cmd);
        }
        info!("hub event loop stopped");
    }

    pub fn apply(&mut self, cmd: HubCommand) {
        match cmd {
            HubCommand::Register { conn, replay } => {
                let frames = self.register(conn);
                let _ = replay.send(frames);
            }
            HubCommand::Unregister(id) => {
                self.unregister(id);
            }
            HubCommand::Forward {
                from,
                position,
                frame,
            } => {
                self.forward(from, position, &frame);
            }
            HubCommand::Broadcast {
                audience,
                frame,
                exclude,
            } => {
                self.broadcast(&frame, &audience, exclude);
            }
            HubCommand::Assign { conn, scope } => {
                self.assign(conn, scope);
            }
            HubCommand::Direct { conn, frame } => {
                self.direct(conn, frame);
            }
            HubCommand::EventCreated(event) => self.event_created(event),
            HubCommand::Stats(reply) => {
                let _ = reply.send(self.stats());
            }
            HubCommand::Occupancy(reply) => {
                let _ = reply.send(self.occupied_sessions());
            }
        }
    }

    /// Add a connection and return its replay: the event catalog as one
    /// `events_list`, then one `move` per cached position.
    ///
    /// The replay goes back to the caller instead of into the outbound queue,
    /// so its length is bounded by the world, not by the queue capacity. The
    /// writer sends it before anything queued after this point.
    pub fn register(&mut self, conn: Connection) -> Vec<Frame> {
        let mut replay = Vec::with_capacity(1 + self.positions.len());
        replay.extend(encode(&ServerMessage::EventsList(self.events.clone())));
        replay.extend(
            self.positions
                .values()
                .filter_map(|pos| encode(&ServerMessage::Move(pos.clone()))),
        );

        info!(conn_id = %conn.id, user_id = %conn.user_id, scope = %conn.scope, replay = replay.len(), "client registered");
        self.connections.insert(conn.id, conn);
        replay
    }

    /// Remove a connection, forget its user's position and announce the
    /// departure. Returns false when it was already gone (e.g. evicted).
    pub fn unregister(&mut self, id: ConnId) -> bool {
        match self.connections.remove(&id) {
            Some(conn) => {
                info!(conn_id = %id, user_id = %conn.user_id, "client unregistered");
                self.retire(conn);
                true
            }
            None => {
                debug!(conn_id = %id, "unregister for unknown connection");
                false
            }
        }
    }

    /// Relay a client frame to everyone sharing the sender's scope.
    pub fn forward(&mut self, from: ConnId, position: Option<PositionRecord>, frame: &Frame) -> Delivery {
        let Some(sender) = self.connections.get_mut(&from) else {
            debug!(conn_id = %from, "dropping frame from connection no longer registered");
            return Delivery::default();
        };
        let scope = sender.scope.clone();
        if let Some(pos) = position {
            // remembered so the entry leaves with this connection even when
            // the payload names someone else
            sender.reported.insert(pos.user_id.clone());
            self.positions.insert(pos.user_id.clone(), pos);
        }
        self.broadcast(frame, &Audience::Scope(scope), Some(from))
    }

    /// Non-blocking fan-out. A recipient that cannot take the frame right
    /// now is evicted; the rest are unaffected.
    pub fn broadcast(&mut self, frame: &Frame, audience: &Audience, exclude: Option<ConnId>) -> Delivery {
        let (delivered, stalled) = self.fan_out(frame, audience, exclude);
        let mut evicted = Vec::new();
        for id in stalled {
            if let Some(conn) = self.connections.remove(&id) {
                evicted.extend(self.retire(conn));
            }
        }
        Delivery { delivered, evicted }
    }

    pub fn assign(&mut self, id: ConnId, scope: Scope) -> bool {
        match self.connections.get_mut(&id) {
            Some(conn) => {
                debug!(conn_id = %id, from = %conn.scope, to = %scope, "connection re-scoped");
                conn.scope = scope;
                true
            }
            None => false,
        }
    }

    pub fn direct(&mut self, id: ConnId, frame: Frame) -> bool {
        let Some(conn) = self.connections.get(&id) else {
            return false;
        };
        if conn.outbound.try_send(frame).is_ok() {
            return true;
        }
        if let Some(conn) = self.connections.remove(&id) {
            warn!(conn_id = %id, user_id = %conn.user_id, "forcing disconnect of slow client");
            self.retire(conn);
        }
        false
    }

    pub fn event_created(&mut self, event: VoxelEvent) {
        let frame = encode(&ServerMessage::EventCreated(event.clone()));
        self.events.push(event);
        if let Some(frame) = frame {
            self.broadcast(&frame, &Audience::Everyone, None);
        }
    }

    pub fn stats(&self) -> HubStats {
        HubStats {
            connections: self.connections.len(),
            positions: self.positions.len(),
            events: self.events.len(),
        }
    }

    pub fn occupied_sessions(&self) -> HashSet<String> {
        self.connections
            .values()
            .filter_map(|c| c.scope.session_id().map(str::to_string))
            .collect()
    }

    pub fn contains(&self, id: ConnId) -> bool {
        self.connections.contains_key(&id)
    }

    pub fn scope_of(&self, id: ConnId) -> Option<&Scope> {
        self.connections.get(&id).map(|c| &c.scope)
    }

    pub fn position(&self, user_id: &str) -> Option<&PositionRecord> {
        self.positions.get(user_id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Try every matching recipient once. Returns the delivered count and the
    /// ids that must be evicted; nothing is removed here.
    fn fan_out(&self, frame: &Frame, audience: &Audience, exclude: Option<ConnId>) -> (usize, Vec<ConnId>) {
        let mut delivered = 0;
        let mut stalled = Vec::new();
        for (id, conn) in &self.connections {
            if Some(*id) == exclude || !audience.includes(&conn.scope) {
                continue;
            }
            match conn.outbound.try_send(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(conn_id = %id, user_id = %conn.user_id, scope = %conn.scope, "forcing disconnect of slow client");
                    stalled.push(*id);
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(conn_id = %id, "outbound queue already closed");
                    stalled.push(*id);
                }
            }
        }
        (delivered, stalled)
    }

    /// Tear down an already-removed connection: drop its queue sender and
    /// every position it reported, then announce `leave`. Announcing can
    /// evict further slow recipients, which are retired the same way. Returns
    /// every connection retired.
    fn retire(&mut self, conn: Connection) -> Vec<ConnId> {
        let mut retired = Vec::new();
        let mut pending = VecDeque::from([conn]);
        while let Some(conn) = pending.pop_front() {
            retired.push(conn.id);
            self.positions.remove(&conn.user_id);
            for user_id in &conn.reported {
                self.positions.remove(user_id);
            }
            let audience = Audience::departure(&conn.scope);
            let leave = encode(&ServerMessage::leave(conn.user_id.as_str()));
            drop(conn);

            if let Some(frame) = leave {
                let (_, stalled) = self.fan_out(&frame, &audience, None);
                for id in stalled {
                    if let Some(next) = self.connections.remove(&id) {
                        pending.push_back(next);
                    }
                }
            }
        }
        retired
    }
}

fn encode(msg: &ServerMessage) -> Option<Frame> {
    match msg.encode() {
        Ok(frame) => Some(frame),
        Err(e) => {
            warn!(kind = msg.kind(), error = %e, "failed to encode server message");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::Value;
    use tokio::sync::mpsc::error::TryRecvError;
    use voxel_core::types::NewEvent;

    fn client(user: &str, scope: Scope, capacity: usize) -> (Connection, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Connection::new(ConnId::new(), user, scope, tx), rx)
    }

    fn drain(rx: &mut mpsc::Receiver<Frame>) -> Vec<Value> {
        let mut out = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            out.push(serde_json::from_str(&frame).unwrap());
        }
        out
    }

    fn decode(frames: Vec<Frame>) -> Vec<Value> {
        frames
            .iter()
            .map(|f| serde_json::from_str(f).unwrap())
            .collect()
    }

    fn session(id: &str) -> Scope {
        Scope::Session(id.to_string())
    }

    fn pos(user: &str, x: f64, y: f64) -> PositionRecord {
        PositionRecord {
            user_id: user.to_string(),
            x,
            y,
            latitude: 0.0,
            longitude: 0.0,
        }
    }

    fn frame(text: &str) -> Frame {
        Frame::from(text)
    }

    fn event(title: &str) -> VoxelEvent {
        NewEvent {
            title: title.into(),
            description: String::new(),
            x: 0.0,
            y: 0.0,
            creator_id: "c".into(),
            ticket_price: 0.0,
            has_tickets: false,
            voxel_theme: "plain".into(),
        }
        .stamp(Utc::now())
    }

    #[test]
    fn live_set_tracks_register_and_unregister() {
        let mut reg = Registry::new(vec![]);
        let (a, _ra) = client("a", Scope::World, 8);
        let (b, _rb) = client("b", Scope::World, 8);
        let (c, _rc) = client("c", session("s1"), 8);
        let (ida, idb, idc) = (a.id, b.id, c.id);

        reg.register(a);
        reg.register(b);
        reg.register(c);
        assert!(reg.unregister(idb));
        assert!(!reg.unregister(idb), "second unregister is a no-op");

        assert_eq!(reg.len(), 2);
        assert!(reg.contains(ida));
        assert!(!reg.contains(idb));
        assert!(reg.contains(idc));
    }

    #[test]
    fn register_replays_catalog_then_positions() {
        let mut reg = Registry::new(vec![event("one"), event("two")]);
        let (a, mut ra) = client("a", Scope::World, 8);
        let ida = a.id;
        reg.register(a);
        reg.forward(ida, Some(pos("a", 1.0, 2.0)), &frame(r#"{"type":"move"}"#));
        drain(&mut ra);

        let (f, mut rf) = client("f", Scope::World, 8);
        let got = decode(reg.register(f));

        assert!(drain(&mut rf).is_empty(), "replay bypasses the queue");
        assert_eq!(got[0]["type"], "events_list");
        assert_eq!(got[0]["payload"].as_array().unwrap().len(), 2);
        assert_eq!(got[1]["type"], "move");
        assert_eq!(got[1]["payload"]["userId"], "a");
        assert_eq!(got.len(), 2);
    }

    #[test]
    fn empty_catalog_still_replays_events_list() {
        let mut reg = Registry::new(vec![]);
        let (f, _rf) = client("f", Scope::World, 4);
        let got = decode(reg.register(f));
        assert_eq!(got.len(), 1);
        assert_eq!(got[0]["payload"], Value::Array(vec![]));
    }

    #[test]
    fn scoped_broadcast_reaches_exactly_scope_minus_exclude() {
        let mut reg = Registry::new(vec![]);
        let (a, mut ra) = client("a", session("s1"), 8);
        let (b, mut rb) = client("b", session("s1"), 8);
        let (c, mut rc) = client("c", session("s2"), 8);
        let (w, mut rw) = client("w", Scope::World, 8);
        let ida = a.id;
        for conn in [a, b, c, w] {
            reg.register(conn);
        }
        for rx in [&mut ra, &mut rb, &mut rc, &mut rw] {
            drain(rx);
        }

        let delivery = reg.broadcast(&frame(r#"{"type":"audio"}"#), &Audience::Scope(session("s1")), Some(ida));

        assert_eq!(delivery.delivered, 1);
        assert!(drain(&mut ra).is_empty());
        assert_eq!(drain(&mut rb).len(), 1);
        assert!(drain(&mut rc).is_empty());
        assert!(drain(&mut rw).is_empty());
    }

    #[test]
    fn global_broadcast_ignores_scope() {
        let mut reg = Registry::new(vec![]);
        let (a, mut ra) = client("a", session("s1"), 8);
        let (w, mut rw) = client("w", Scope::World, 8);
        reg.register(a);
        reg.register(w);
        drain(&mut ra);
        drain(&mut rw);

        let delivery = reg.broadcast(&frame("{}"), &Audience::Everyone, None);
        assert_eq!(delivery.delivered, 2);
    }

    #[test]
    fn move_from_world_reaches_world_peers_only() {
        let mut reg = Registry::new(vec![]);
        let (a, mut ra) = client("A", Scope::World, 8);
        let (b, mut rb) = client("B", Scope::World, 8);
        let (s, mut rs) = client("S", session("s1"), 8);
        let ida = a.id;
        for conn in [a, b, s] {
            reg.register(conn);
        }
        for rx in [&mut ra, &mut rb, &mut rs] {
            drain(rx);
        }

        let raw = r#"{"type":"move","payload":{"userId":"A","x":1,"y":2}}"#;
        reg.forward(ida, Some(pos("A", 1.0, 2.0)), &frame(raw));

        let got = drain(&mut rb);
        assert_eq!(got.len(), 1);
        assert_eq!(got[0]["payload"]["userId"], "A");
        assert!(drain(&mut ra).is_empty(), "sender never hears itself");
        assert!(drain(&mut rs).is_empty());
    }

    #[test]
    fn latest_position_wins_in_cache_and_replay() {
        let mut reg = Registry::new(vec![]);
        let (a, _ra) = client("a", Scope::World, 16);
        let ida = a.id;
        reg.register(a);
        reg.forward(ida, Some(pos("a", 1.0, 1.0)), &frame("{}"));
        reg.forward(ida, Some(pos("a", 9.0, 7.0)), &frame("{}"));

        assert_eq!(reg.position("a").map(|p| (p.x, p.y)), Some((9.0, 7.0)));

        let (f, _rf) = client("f", Scope::World, 8);
        let moves: Vec<_> = decode(reg.register(f))
            .into_iter()
            .filter(|m| m["type"] == "move")
            .collect();
        assert_eq!(moves.len(), 1);
        assert_eq!(moves[0]["payload"]["x"], 9.0);
    }

    #[test]
    fn forward_from_unregistered_sender_is_dropped() {
        let mut reg = Registry::new(vec![]);
        let (b, mut rb) = client("b", Scope::World, 8);
        reg.register(b);
        drain(&mut rb);

        let delivery = reg.forward(ConnId::new(), Some(pos("ghost", 0.0, 0.0)), &frame("{}"));
        assert_eq!(delivery, Delivery::default());
        assert!(reg.position("ghost").is_none());
        assert!(drain(&mut rb).is_empty());
    }

    #[test]
    fn slow_recipient_is_evicted_without_blocking_others() {
        let mut reg = Registry::new(vec![]);
        let (slow, mut rslow) = client("slow", Scope::World, 1);
        let (fast, mut rfast) = client("fast", Scope::World, 8);
        let (ids, idf) = (slow.id, fast.id);
        reg.register(slow);
        reg.register(fast);
        // fills the slow queue's only slot
        reg.broadcast(&frame(r#"{"type":"audio"}"#), &Audience::Everyone, None);
        drain(&mut rfast);

        let delivery = reg.broadcast(&frame(r#"{"type":"audio"}"#), &Audience::Everyone, None);

        assert_eq!(delivery.delivered, 1);
        assert_eq!(delivery.evicted, vec![ids]);
        assert!(!reg.contains(ids));
        assert!(reg.contains(idf));

        let fast_got = drain(&mut rfast);
        assert_eq!(fast_got[0]["type"], "audio");
        assert_eq!(fast_got[1]["type"], "leave");
        assert_eq!(fast_got[1]["payload"]["userId"], "slow");

        // queue closed: the buffered frame drains, then the writer sees the end
        assert!(rslow.try_recv().is_ok());
        assert_eq!(rslow.try_recv(), Err(TryRecvError::Disconnected));
    }

    #[test]
    fn eviction_drops_cached_position() {
        let mut reg = Registry::new(vec![]);
        let (slow, _rslow) = client("slow", Scope::World, 1);
        let ids = slow.id;
        reg.register(slow);
        // cached, but relayed to nobody: the sender is alone in the world
        reg.forward(ids, Some(pos("slow", 3.0, 3.0)), &frame("{}"));
        assert!(reg.position("slow").is_some());

        reg.broadcast(&frame("{}"), &Audience::Everyone, None);
        reg.broadcast(&frame("{}"), &Audience::Everyone, None);

        assert!(!reg.contains(ids));
        assert!(reg.position("slow").is_none());
    }

    #[test]
    fn unregister_announces_leave_to_session_only() {
        let mut reg = Registry::new(vec![]);
        let (a, _ra) = client("a", session("s1"), 8);
        let (b, mut rb) = client("b", session("s1"), 8);
        let (w, mut rw) = client("w", Scope::World, 8);
        let ida = a.id;
        for conn in [a, b, w] {
            reg.register(conn);
        }
        drain(&mut rb);
        drain(&mut rw);

        reg.unregister(ida);

        let got = drain(&mut rb);
        assert_eq!(got.len(), 1);
        assert_eq!(got[0]["type"], "leave");
        assert!(drain(&mut rw).is_empty());
    }

    #[test]
    fn unregister_from_world_announces_to_everyone() {
        let mut reg = Registry::new(vec![]);
        let (a, _ra) = client("a", Scope::World, 8);
        let (s, mut rs) = client("s", session("s1"), 8);
        let ida = a.id;
        reg.register(a);
        reg.register(s);
        drain(&mut rs);

        reg.forward(ida, Some(pos("a", 1.0, 1.0)), &frame("{}"));
        reg.unregister(ida);

        assert!(reg.position("a").is_none());
        let got = drain(&mut rs);
        assert_eq!(got.len(), 1);
        assert_eq!(got[0]["payload"]["userId"], "a");
    }

    #[test]
    fn assign_moves_connection_between_scopes() {
        let mut reg = Registry::new(vec![]);
        let (a, _ra) = client("a", Scope::World, 8);
        let ida = a.id;
        reg.register(a);

        assert!(reg.assign(ida, session("s9")));
        assert_eq!(reg.scope_of(ida), Some(&session("s9")));
        assert!(reg.occupied_sessions().contains("s9"));
        assert!(!reg.assign(ConnId::new(), session("s9")));
    }

    #[test]
    fn event_created_extends_catalog_and_reaches_everyone() {
        let mut reg = Registry::new(vec![]);
        let (a, mut ra) = client("a", session("s1"), 8);
        let (w, mut rw) = client("w", Scope::World, 8);
        reg.register(a);
        reg.register(w);
        drain(&mut ra);
        drain(&mut rw);

        reg.event_created(event("party"));

        assert_eq!(reg.stats().events, 1);
        assert_eq!(drain(&mut ra)[0]["type"], "event_created");
        assert_eq!(drain(&mut rw)[0]["payload"]["title"], "party");
    }

    #[test]
    fn direct_reaches_only_target() {
        let mut reg = Registry::new(vec![]);
        let (a, mut ra) = client("a", Scope::World, 8);
        let (b, mut rb) = client("b", Scope::World, 8);
        let ida = a.id;
        reg.register(a);
        reg.register(b);
        drain(&mut ra);
        drain(&mut rb);

        assert!(reg.direct(ida, frame(r#"{"type":"error"}"#)));
        assert_eq!(drain(&mut ra).len(), 1);
        assert!(drain(&mut rb).is_empty());
    }

    #[test]
    fn replay_larger_than_queue_still_registers() {
        let mut reg = Registry::new(vec![event("one")]);
        let mut peers = Vec::new();
        for user in ["a", "b", "c", "d"] {
            let (conn, rx) = client(user, Scope::World, 8);
            let id = conn.id;
            reg.register(conn);
            reg.forward(id, Some(pos(user, 1.0, 1.0)), &frame("{}"));
            peers.push(rx);
        }
        assert_eq!(reg.stats().positions, 4);

        let (late, mut rlate) = client("late", Scope::World, 1);
        let idl = late.id;
        let replay = reg.register(late);

        assert_eq!(replay.len(), 5);
        assert!(reg.contains(idl));
        assert!(rlate.try_recv().is_err(), "queue untouched by the replay");
    }

    #[test]
    fn position_reported_for_another_user_leaves_with_its_reporter() {
        let mut reg = Registry::new(vec![]);
        let (a, _ra) = client("a", Scope::World, 8);
        let ida = a.id;
        reg.register(a);

        reg.forward(ida, Some(pos("a", 1.0, 1.0)), &frame("{}"));
        reg.forward(ida, Some(pos("someone-else", 2.0, 2.0)), &frame("{}"));
        assert_eq!(reg.stats().positions, 2);

        reg.unregister(ida);

        assert!(reg.position("a").is_none());
        assert!(reg.position("someone-else").is_none());
        assert_eq!(reg.stats().positions, 0);
    }
}
