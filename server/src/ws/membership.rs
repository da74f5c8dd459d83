//! Room Membership - Iscrizione delle connessioni alle stanze
//!
//! Unico punto di ingresso per join/leave di server, canali e conversazioni private.
//! Le richieste non autorizzate vengono ignorate senza notificare il client.

use crate::core::{AppError, AppState, authorize_channel, authorize_server_member, authorize_thread};
use crate::dtos::ServerEvent;
use crate::ws::connection::ConnectionContext;
use crate::ws::rooms::RoomKind;
use crate::ws::typing::TypingRoom;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Verifica che l'utente possa iscriversi alla stanza
pub async fn authorize_room(state: &AppState, user_id: i32, room: RoomKind) -> Result<(), AppError> {
    match room {
        RoomKind::Server(server_id) => authorize_server_member(state, user_id, server_id).await.map(|_| ()),
        RoomKind::Channel(channel_id) => authorize_channel(state, user_id, channel_id).await.map(|_| ()),
        RoomKind::DirectMessage(thread_id) => authorize_thread(state, user_id, thread_id).await.map(|_| ()),
    }
}

/// Iscrive la connessione alla stanza se l'utente è autorizzato.
///
/// # Returns
/// true se la connessione è stata iscritta ora (false se già iscritta o non autorizzata)
#[instrument(skip(state, ctx), fields(user_id = ctx.user.user_id, room = %room))]
pub async fn join(state: &AppState, ctx: &ConnectionContext, room: RoomKind) -> bool {
    if let Err(e) = authorize_room(state, ctx.user.user_id, room).await {
        if e.is_server_fault() {
            error!("Join failed: {}", e);
        } else {
            warn!("Join ignored: {}", e);
        }
        return false;
    }

    let newly_joined = state.rooms.join(room, ctx.handle.clone());
    if !newly_joined {
        debug!("Connection already in room");
        return false;
    }

    if let RoomKind::Server(server_id) = room {
        let event = Arc::new(ServerEvent::MemberOnline {
            user_id: ctx.user.user_id,
            username: ctx.user.username.clone(),
            server_id,
        });
        state.rooms.broadcast(room, event, Some(ctx.handle.id()));
    }
    true
}

/// Lascia la stanza; un eventuale indicatore di scrittura in quella stanza viene fermato
#[instrument(skip(state, ctx), fields(user_id = ctx.user.user_id, room = %room))]
pub fn leave(state: &AppState, ctx: &ConnectionContext, room: RoomKind) -> bool {
    let left = state.rooms.leave(room, ctx.handle.id());
    let typing_room = match room {
        RoomKind::Channel(id) => Some(TypingRoom::Channel(id)),
        RoomKind::DirectMessage(id) => Some(TypingRoom::DirectMessage(id)),
        RoomKind::Server(_) => None,
    };
    if let Some(typing_room) = typing_room {
        state.typing.stop(typing_room, ctx.user.user_id);
    }
    left
}

/// Iscrizione automatica alla connessione: tutti i server di cui l'utente è
/// proprietario o membro e tutte le conversazioni private attive.
#[instrument(skip(state, ctx), fields(user_id = ctx.user.user_id))]
pub async fn auto_join(state: &AppState, ctx: &ConnectionContext) -> Result<usize, AppError> {
    let servers = state.server.find_ids_by_user(&ctx.user.user_id).await?;
    let threads = state.dm.find_active_ids_by_user(&ctx.user.user_id).await?;

    let rooms = servers
        .into_iter()
        .map(RoomKind::Server)
        .chain(threads.into_iter().map(RoomKind::DirectMessage));

    let mut joined = 0;
    for room in rooms {
        if join(state, ctx, room).await {
            joined += 1;
        }
    }

    info!(joined, "Auto-join completed");
    Ok(joined)
}
