use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use voxel_core::types::ConnId;
use voxel_protocol::{ClientMessage, Frame, ProtocolError, ServerMessage};

use crate::app::AppState;
use crate::error::Result;

/// What dispatch needs to know about the connection a frame came in on.
#[derive(Debug, Clone)]
pub struct ConnCtx {
    pub id: ConnId,
    pub user_id: String,
}

/// Decode one inbound text frame and act on it.
///
/// Never fails the connection: malformed frames and unknown types are
/// dropped, invalid payloads get an `error` envelope back, and downstream
/// failures are logged.
pub async fn handle(ctx: &ConnCtx, text: &str, app: &Arc<AppState>) {
    let message = match ClientMessage::parse(text) {
        Ok(message) => message,
        Err(ProtocolError::UnknownType(kind)) => {
            debug!(conn_id = %ctx.id, kind = %kind, "ignoring unknown message type");
            return;
        }
        Err(e @ ProtocolError::Malformed(_)) => {
            warn!(conn_id = %ctx.id, error = %e, "dropping malformed frame");
            return;
        }
        Err(e @ ProtocolError::InvalidPayload { .. }) => {
            debug!(conn_id = %ctx.id, error = %e, "rejecting invalid payload");
            let reply = ServerMessage::error(e.code(), e.to_string());
            if let Err(e) = app.hub.direct(ctx.id, &reply).await {
                warn!(conn_id = %ctx.id, error = %e, "could not send error reply");
            }
            return;
        }
    };

    let kind = message.kind();
    if let Err(e) = route(ctx, text, message, app).await {
        warn!(conn_id = %ctx.id, kind, error = %e, "dispatch failed");
    }
}

async fn route(ctx: &ConnCtx, text: &str, message: ClientMessage, app: &Arc<AppState>) -> Result<()> {
    match message {
        // relayed verbatim so opaque payload fields survive untouched
        ClientMessage::Move(position) => {
            app.hub.forward(ctx.id, Some(position), Frame::from(text)).await?;
        }
        ClientMessage::Relay(_) => {
            app.hub.forward(ctx.id, None, Frame::from(text)).await?;
        }

        ClientMessage::CreateEvent(new) => {
            let event = new.stamp(Utc::now());
            app.store.insert_event(event.clone()).await?;
            info!(event_id = %event.id, creator_id = %event.creator_id, "event created");
            app.hub.event_created(event).await?;
        }

        ClientMessage::CreateSession { game_type } => {
            app.sessions
                .create_session(ctx.id, &ctx.user_id, game_type)
                .await?;
        }
        ClientMessage::JoinSession { session_id } => {
            app.sessions
                .join_session(&session_id, ctx.id, &ctx.user_id)
                .await?;
        }
        ClientMessage::StartGame { session_id } => {
            app.sessions.start_game(&session_id, &ctx.user_id).await?;
        }
    }
    Ok(())
}
