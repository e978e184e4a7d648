use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use voxel_core::config::TransportConfig;
use voxel_core::types::{ConnId, Scope};
use voxel_hub::Connection;
use voxel_protocol::Frame;

use crate::app::AppState;
use crate::ws::dispatch::{self, ConnCtx};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectQuery {
    pub user_id: Option<String>,
    pub session_id: Option<String>,
}

impl ConnectQuery {
    /// Missing or empty `userId` gets a throwaway anonymous identity.
    fn user_id(&self) -> String {
        match self.user_id.as_deref() {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => format!("anon_{}", uuid::Uuid::new_v4().simple()),
        }
    }

    fn scope(&self) -> Scope {
        Scope::from_session_id(self.session_id.as_deref())
    }
}

/// Axum handler, upgrades HTTP to WebSocket at GET /ws.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<ConnectQuery>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let user_id = query.user_id();
    let scope = query.scope();
    let limit = state.config.transport.max_frame_bytes;
    info!(user_id = %user_id, scope = %scope, "incoming WS upgrade");

    ws.max_message_size(limit)
        .max_frame_size(limit)
        .on_upgrade(move |socket| run_connection(socket, state, user_id, scope))
}

/// One connection, two tasks: this one reads, a spawned one writes.
///
/// The writer only stops when the hub drops the queue sender (or a write
/// fails); the reader stops on its own and tells the hub, which is what
/// eventually closes the queue.
async fn run_connection(socket: WebSocket, state: Arc<AppState>, user_id: String, scope: Scope) {
    let ctx = ConnCtx {
        id: ConnId::new(),
        user_id,
    };
    let transport = state.config.transport.clone();

    let (outbound_tx, outbound_rx) = mpsc::channel::<Frame>(transport.outbound_queue);
    let conn = Connection::new(ctx.id, ctx.user_id.clone(), scope, outbound_tx);
    let replay = match state.hub.register(conn).await {
        Ok(replay) => replay,
        Err(e) => {
            warn!(conn_id = %ctx.id, error = %e, "hub unavailable, refusing connection");
            return;
        }
    };
    info!(conn_id = %ctx.id, user_id = %ctx.user_id, "new WS connection");

    let (sink, stream) = socket.split();
    let cancel = CancellationToken::new();
    let writer = tokio::spawn(write_pump(
        ctx.id,
        sink,
        replay,
        outbound_rx,
        transport.clone(),
        cancel.clone(),
    ));

    read_pump(&ctx, stream, &state, &transport, &cancel).await;

    if let Err(e) = state.hub.unregister(ctx.id).await {
        warn!(conn_id = %ctx.id, error = %e, "unregister failed");
    }
    let _ = writer.await;
    info!(conn_id = %ctx.id, user_id = %ctx.user_id, "WS connection closed");
}

/// Dispatch inbound text until the peer leaves, goes quiet past
/// `pong_wait`, or the writer gives up. Frames over `max_frame_bytes`
/// surface as a read error from the upgrade's size limit.
async fn read_pump<St>(
    ctx: &ConnCtx,
    mut stream: St,
    state: &Arc<AppState>,
    transport: &TransportConfig,
    cancel: &CancellationToken,
) where
    St: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    let liveness = tokio::time::sleep(transport.pong_wait());
    tokio::pin!(liveness);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(conn_id = %ctx.id, "writer stopped, closing reader");
                break;
            }

            _ = &mut liveness => {
                warn!(conn_id = %ctx.id, "no pong within deadline");
                break;
            }

            msg = stream.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    dispatch::handle(ctx, text.as_str(), state).await;
                }
                Some(Ok(Message::Pong(_))) => {
                    liveness.as_mut().reset(Instant::now() + transport.pong_wait());
                }
                Some(Ok(Message::Close(_))) | None => break,
                // binary frames are not part of the protocol; pings are
                // answered by the socket itself
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(conn_id = %ctx.id, error = %e, "read error");
                    break;
                }
            }
        }
    }
}

/// Send the register replay, then drain the queue in order, pinging every
/// `ping_period`. Ends with a Close frame once the hub drops the queue.
async fn write_pump<S>(
    conn_id: ConnId,
    mut sink: S,
    replay: Vec<Frame>,
    mut outbound: mpsc::Receiver<Frame>,
    transport: TransportConfig,
    cancel: CancellationToken,
) where
    S: Sink<Message> + Unpin,
    S::Error: fmt::Display,
{
    // whatever ends the writer also ends the reader
    let _guard = cancel.drop_guard();
    let write_wait = transport.write_wait();

    for frame in replay {
        if !write_timed(conn_id, &mut sink, text_message(&frame), write_wait).await {
            return;
        }
    }

    let period = transport.ping_period();
    let mut ping = tokio::time::interval_at(Instant::now() + period, period);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let message = tokio::select! {
            frame = outbound.recv() => match frame {
                Some(frame) => text_message(&frame),
                None => {
                    write_timed(conn_id, &mut sink, Message::Close(None), write_wait).await;
                    debug!(conn_id = %conn_id, "outbound queue closed");
                    return;
                }
            },
            _ = ping.tick() => Message::Ping(Default::default()),
        };

        if !write_timed(conn_id, &mut sink, message, write_wait).await {
            return;
        }
    }
}

fn text_message(frame: &Frame) -> Message {
    Message::Text(frame.to_string().into())
}

/// One write bounded by `write_wait`. False means the socket is done.
async fn write_timed<S>(conn_id: ConnId, sink: &mut S, message: Message, write_wait: Duration) -> bool
where
    S: Sink<Message> + Unpin,
    S::Error: fmt::Display,
{
    match tokio::time::timeout(write_wait, sink.send(message)).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            debug!(conn_id = %conn_id, error = %e, "write failed");
            false
        }
        Err(_) => {
            warn!(conn_id = %conn_id, "write timed out");
            false
        }
    }
}
