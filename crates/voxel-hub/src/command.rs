use std::collections::HashSet;

use tokio::sync::{mpsc, oneshot};
use voxel_core::types::{ConnId, PositionRecord, Scope, VoxelEvent};
use voxel_protocol::Frame;

/// A live connection as the registry sees it: who, where, and the sending
/// half of its private outbound queue. Dropping the `Connection` closes the
/// queue, which is the writer's only shutdown signal.
#[derive(Debug)]
pub struct Connection {
    pub id: ConnId,
    pub user_id: String,
    pub scope: Scope,
    pub(crate) outbound: mpsc::Sender<Frame>,
    /// Every user id this connection has cached a position for.
    pub(crate) reported: HashSet<String>,
}

impl Connection {
    pub fn new(id: ConnId, user_id: impl Into<String>, scope: Scope, outbound: mpsc::Sender<Frame>) -> Self {
        Self {
            id,
            user_id: user_id.into(),
            scope,
            outbound,
            reported: HashSet::new(),
        }
    }
}

/// Who a broadcast is addressed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    /// Every live connection regardless of scope.
    Everyone,
    /// Only connections whose scope equals this one.
    Scope(Scope),
}

impl Audience {
    pub fn includes(&self, scope: &Scope) -> bool {
        match self {
            Audience::Everyone => true,
            Audience::Scope(target) => target == scope,
        }
    }

    /// Where a departing connection's `leave` is announced: its session, or
    /// the whole world when it had none.
    pub fn departure(scope: &Scope) -> Self {
        match scope {
            Scope::World => Audience::Everyone,
            Scope::Session(_) => Audience::Scope(scope.clone()),
        }
    }
}

/// Point-in-time counters for `/health`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HubStats {
    pub connections: usize,
    pub positions: usize,
    pub events: usize,
}

/// Everything the registry loop can be asked to do. Processed strictly one
/// at a time, in arrival order.
#[derive(Debug)]
pub enum HubCommand {
    /// Insert a connection; its replay frames come back on `replay`.
    Register {
        conn: Connection,
        replay: oneshot::Sender<Vec<Frame>>,
    },
    Unregister(ConnId),
    /// Relay a client frame to the sender's scope, excluding the sender.
    /// `position` is cached first when the frame is a `move`.
    Forward {
        from: ConnId,
        position: Option<PositionRecord>,
        frame: Frame,
    },
    Broadcast {
        audience: Audience,
        frame: Frame,
        exclude: Option<ConnId>,
    },
    /// Re-scope a connection (session create/join).
    Assign { conn: ConnId, scope: Scope },
    /// Deliver to one connection only.
    Direct { conn: ConnId, frame: Frame },
    /// Append to the event catalog and announce to everyone.
    EventCreated(VoxelEvent),
    Stats(oneshot::Sender<HubStats>),
    /// Session ids that currently have at least one live connection.
    Occupancy(oneshot::Sender<HashSet<String>>),
}
