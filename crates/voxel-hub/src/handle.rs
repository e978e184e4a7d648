use std::collections::HashSet;

use tokio::sync::{mpsc, oneshot};
use voxel_core::types::{ConnId, PositionRecord, Scope, VoxelEvent};
use voxel_protocol::{Frame, ServerMessage};

use crate::command::{Audience, Connection, HubCommand, HubStats};
use crate::error::{HubError, Result};
use crate::registry::Registry;

/// Start the registry loop on the current runtime, seeded with the event
/// catalog, and return the handle every other task talks to it through.
pub fn spawn(capacity: usize, events: Vec<VoxelEvent>) -> HubHandle {
    let (tx, rx) = mpsc::channel(capacity);
    tokio::spawn(Registry::new(events).run(rx));
    HubHandle { tx }
}

/// Cloneable sender side of the registry loop. Every method only enqueues;
/// effects happen later, in command order.
#[derive(Clone)]
pub struct HubHandle {
    tx: mpsc::Sender<HubCommand>,
}

impl HubHandle {
    /// Register and wait for the replay the writer must send first.
    pub async fn register(&self, conn: Connection) -> Result<Vec<Frame>> {
        let (replay, rx) = oneshot::channel();
        self.send(HubCommand::Register { conn, replay }).await?;
        rx.await.map_err(|_| HubError::Closed)
    }

    pub async fn unregister(&self, conn: ConnId) -> Result<()> {
        self.send(HubCommand::Unregister(conn)).await
    }

    /// Relay a raw client frame to the sender's scope.
    pub async fn forward(&self, from: ConnId, position: Option<PositionRecord>, frame: Frame) -> Result<()> {
        self.send(HubCommand::Forward {
            from,
            position,
            frame,
        })
        .await
    }

    pub async fn broadcast_scoped(&self, message: &ServerMessage, scope: Scope, exclude: Option<ConnId>) -> Result<()> {
        self.broadcast(message, Audience::Scope(scope), exclude).await
    }

    pub async fn broadcast_global(&self, message: &ServerMessage, exclude: Option<ConnId>) -> Result<()> {
        self.broadcast(message, Audience::Everyone, exclude).await
    }

    pub async fn assign(&self, conn: ConnId, scope: Scope) -> Result<()> {
        self.send(HubCommand::Assign { conn, scope }).await
    }

    pub async fn direct(&self, conn: ConnId, message: &ServerMessage) -> Result<()> {
        let frame = message.encode()?;
        self.send(HubCommand::Direct { conn, frame }).await
    }

    pub async fn event_created(&self, event: VoxelEvent) -> Result<()> {
        self.send(HubCommand::EventCreated(event)).await
    }

    /// Round-trips through the loop, so it also waits for every command
    /// enqueued before it.
    pub async fn stats(&self) -> Result<HubStats> {
        let (reply, rx) = oneshot::channel();
        self.send(HubCommand::Stats(reply)).await?;
        rx.await.map_err(|_| HubError::Closed)
    }

    pub async fn occupied_sessions(&self) -> Result<HashSet<String>> {
        let (reply, rx) = oneshot::channel();
        self.send(HubCommand::Occupancy(reply)).await?;
        rx.await.map_err(|_| HubError::Closed)
    }

    async fn broadcast(&self, message: &ServerMessage, audience: Audience, exclude: Option<ConnId>) -> Result<()> {
        let frame = message.encode()?;
        self.send(HubCommand::Broadcast {
            audience,
            frame,
            exclude,
        })
        .await
    }

    async fn send(&self, cmd: HubCommand) -> Result<()> {
        self.tx.send(cmd).await.map_err(|_| HubError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stats_observe_prior_commands() {
        let hub = spawn(16, vec![]);
        let (tx, mut rx) = mpsc::channel(8);
        let conn = Connection::new(ConnId::new(), "a", Scope::World, tx);
        let id = conn.id;

        let replay = hub.register(conn).await.unwrap();
        assert_eq!(replay.len(), 1, "events_list replay");
        assert_eq!(hub.stats().await.unwrap().connections, 1);

        hub.unregister(id).await.unwrap();
        assert_eq!(hub.stats().await.unwrap().connections, 0);
        assert!(rx.recv().await.is_none(), "queue closed on unregister");
    }

    #[tokio::test]
    async fn direct_message_is_encoded_and_delivered() {
        let hub = spawn(16, vec![]);
        let (tx, mut rx) = mpsc::channel(8);
        let conn = Connection::new(ConnId::new(), "a", Scope::World, tx);
        let id = conn.id;
        hub.register(conn).await.unwrap();

        hub.direct(id, &ServerMessage::error("INVALID_PAYLOAD", "bad"))
            .await
            .unwrap();
        let frame = rx.recv().await.unwrap();
        assert!(frame.contains(r#""type":"error""#));
    }

    #[tokio::test]
    async fn occupancy_lists_session_scopes() {
        let hub = spawn(16, vec![]);
        let (tx, _rx) = mpsc::channel(8);
        let conn = Connection::new(ConnId::new(), "a", Scope::Session("s1".into()), tx);
        hub.register(conn).await.unwrap();

        let occupied = hub.occupied_sessions().await.unwrap();
        assert!(occupied.contains("s1"));
        assert_eq!(occupied.len(), 1);
    }
}
