//! WebSocket Event Handlers - Handler per eventi WebSocket
//!
//! Gli errori non interrompono mai la connessione: vengono loggati e inviati
//! come evento `error` alla sola connessione che ha fatto la richiesta.

use crate::core::{AppError, AppState};
use crate::dtos::{ClientEvent, TypingDTO};
use crate::ws::connection::ConnectionContext;
use crate::ws::rooms::RoomKind;
use crate::ws::typing::TypingRoom;
use crate::ws::utils::send_error;
use crate::ws::{fanout, membership};
use tracing::{debug, error, instrument, warn};

/// Punto di ingresso per ogni frame di testo ricevuto
#[instrument(skip(state, ctx, text), fields(user_id = ctx.user.user_id, conn = %ctx.handle.id()))]
pub async fn process_text_frame(state: &AppState, ctx: &ConnectionContext, text: &str) {
    let result = match serde_json::from_str::<ClientEvent>(text) {
        Ok(event) => handle_client_event(state, ctx, event).await,
        Err(e) => Err(AppError::from(e)),
    };

    if let Err(e) = result {
        if e.is_server_fault() {
            error!("Event failed: {}", e);
        } else {
            warn!("Event rejected: {}", e);
        }
        send_error(&ctx.handle, &e);
    }
}

pub async fn handle_client_event(
    state: &AppState,
    ctx: &ConnectionContext,
    event: ClientEvent,
) -> Result<(), AppError> {
    debug!(?event, "Client event received");
    match event {
        // le join non autorizzate vengono ignorate in silenzio
        ClientEvent::JoinServer(server_id) => {
            membership::join(state, ctx, RoomKind::Server(server_id)).await;
        }
        ClientEvent::JoinChannel(channel_id) => {
            membership::join(state, ctx, RoomKind::Channel(channel_id)).await;
        }
        ClientEvent::JoinDm(thread_id) => {
            membership::join(state, ctx, RoomKind::DirectMessage(thread_id)).await;
        }
        ClientEvent::LeaveChannel(channel_id) => {
            membership::leave(state, ctx, RoomKind::Channel(channel_id));
        }
        ClientEvent::LeaveDm(thread_id) => {
            membership::leave(state, ctx, RoomKind::DirectMessage(thread_id));
        }
        ClientEvent::SendMessage(body) => fanout::send_message(state, ctx, body).await?,
        ClientEvent::SendDirectMessage(body) => fanout::send_direct_message(state, ctx, body).await?,
        ClientEvent::EditMessage(body) => fanout::edit_message(state, ctx, body).await?,
        ClientEvent::DeleteMessage(body) => fanout::delete_message(state, ctx, body).await?,
        ClientEvent::AddReaction(body) => fanout::toggle_reaction(state, ctx, body).await?,
        ClientEvent::Typing(TypingDTO { channel_id }) => {
            start_typing(state, ctx, TypingRoom::Channel(channel_id))?;
        }
        ClientEvent::StopTyping(TypingDTO { channel_id }) => {
            stop_typing(state, ctx, TypingRoom::Channel(channel_id))?;
        }
        ClientEvent::StartTypingDm(thread_id) => {
            start_typing(state, ctx, TypingRoom::DirectMessage(thread_id))?;
        }
        ClientEvent::StopTypingDm(thread_id) => {
            stop_typing(state, ctx, TypingRoom::DirectMessage(thread_id))?;
        }
    }
    Ok(())
}

fn ensure_joined(state: &AppState, ctx: &ConnectionContext, room: TypingRoom) -> Result<(), AppError> {
    if !state.rooms.is_member(room.room(), ctx.handle.id()) {
        return Err(AppError::forbidden("Join the room before typing"));
    }
    Ok(())
}

fn start_typing(state: &AppState, ctx: &ConnectionContext, room: TypingRoom) -> Result<(), AppError> {
    ensure_joined(state, ctx, room)?;
    state
        .typing
        .start(room, ctx.user.user_id, &ctx.user.username, ctx.handle.id());
    Ok(())
}

fn stop_typing(state: &AppState, ctx: &ConnectionContext, room: TypingRoom) -> Result<(), AppError> {
    ensure_joined(state, ctx, room)?;
    state.typing.stop(room, ctx.user.user_id);
    Ok(())
}
