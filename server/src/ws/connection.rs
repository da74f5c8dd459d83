//! WebSocket Connection Management - Gestione connessioni WebSocket

use crate::core::AppState;
use crate::dtos::ServerEvent;
use crate::entities::{User, UserStatus};
use crate::ws::event_handlers::process_text_frame;
use crate::ws::membership;
use crate::ws::presence::{ConnectionHandle, ConnectionId, InternalSignal};
use crate::ws::rooms::RoomKind;
use axum::extract::ws::{Message, Utf8Bytes, WebSocket};
use chrono::Utc;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};
use tracing::{error, info, instrument, warn};

/// Contesto di una connessione autenticata: l'utente e il canale verso il suo writer
pub struct ConnectionContext {
    pub user: User,
    pub handle: ConnectionHandle,
}

/// Sequenza di connessione: presenza in memoria, presenza persistita,
/// iscrizione automatica alle stanze e solo dopo avvio dei task di lettura/scrittura.
#[instrument(skip(ws, state, user), fields(user_id = user.user_id))]
pub async fn handle_socket(ws: WebSocket, state: Arc<AppState>, user: User) {
    info!("WebSocket connection established");

    // Dividiamo il WebSocket in due metà: sender e receiver
    let (ws_tx, ws_rx) = ws.split();

    // Canale unbounded per non perdere eventi: ogni stanza accoda qui
    let (int_tx, int_rx) = unbounded_channel::<InternalSignal>();
    let ctx = ConnectionContext {
        user,
        handle: ConnectionHandle::new(int_tx),
    };

    state.presence.register(&ctx.user, ctx.handle.clone());

    if let Err(e) = state
        .user
        .set_presence(&ctx.user.user_id, UserStatus::Online, true, Utc::now())
        .await
    {
        error!("Failed to persist online status: {:?}", e);
    }

    if let Err(e) = membership::auto_join(&state, &ctx).await {
        error!("Auto-join failed: {}", e);
    }

    tokio::spawn(write_ws(ctx.handle.id(), ws_tx, int_rx));
    tokio::spawn(listen_ws(ctx, ws_rx, state));
}

#[instrument(skip(websocket_tx, internal_rx), fields(conn = %conn_id))]
pub async fn write_ws(
    conn_id: ConnectionId,
    mut websocket_tx: SplitSink<WebSocket, Message>,
    mut internal_rx: UnboundedReceiver<InternalSignal>,
) {
    info!("Write task started");

    while let Some(signal) = internal_rx.recv().await {
        match signal {
            InternalSignal::Event(event) => {
                let json = match serde_json::to_string(&*event) {
                    Ok(json) => json,
                    Err(e) => {
                        error!("Failed to serialize event: {:?}", e);
                        continue;
                    }
                };
                if let Err(e) = websocket_tx.send(Message::Text(Utf8Bytes::from(json))).await {
                    warn!("Failed to send event, closing writer: {:?}", e);
                    break;
                }
            }
            InternalSignal::Shutdown => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    let _ = websocket_tx.close().await;
    info!("Write task terminated");
}

#[instrument(skip(ctx, websocket_rx, state), fields(user_id = ctx.user.user_id, conn = %ctx.handle.id()))]
pub async fn listen_ws(ctx: ConnectionContext, mut websocket_rx: SplitStream<WebSocket>, state: Arc<AppState>) {
    info!("Listen task started");

    // gli eventi di una connessione sono processati in ordine, uno alla volta
    while let Some(msg_result) = websocket_rx.next().await {
        let msg = match msg_result {
            Ok(m) => m,
            Err(e) => {
                warn!("WebSocket error: {:?}", e);
                break;
            }
        };

        match msg {
            Message::Text(text) => process_text_frame(&state, &ctx, text.as_str()).await,
            Message::Close(_) => {
                info!("Close message received");
                break;
            }
            _ => {}
        }
    }

    disconnect(&state, &ctx).await;
    ctx.handle.shutdown();
    info!("Listen task terminated");
}

/// Pulizia alla disconnessione: indicatori di scrittura, stanze, presenza.
/// `memberOffline` e lo stato persistito cambiano solo quando se ne va l'ultima connessione dell'utente.
pub async fn disconnect(state: &AppState, ctx: &ConnectionContext) {
    let user_id = ctx.user.user_id;

    state.typing.clear_user(user_id);
    let left = state.rooms.leave_all(ctx.handle.id());

    if !state.presence.unregister(user_id, ctx.handle.id()) {
        info!("Connection closed, user still online on another device");
        return;
    }

    persist_offline(state, user_id).await;

    for room in left {
        if let RoomKind::Server(server_id) = room {
            let event = Arc::new(ServerEvent::MemberOffline {
                user_id,
                username: ctx.user.username.clone(),
                server_id,
            });
            state.rooms.broadcast(room, event, None);
        }
    }
    info!("User disconnected");
}

/// Scrive lo stato offline. Una riconnessione registrata nel frattempo ha già
/// avviato (o avvierà dopo) la propria scrittura online: se il registro dice che
/// l'utente è di nuovo online lo stato persistito viene riallineato.
pub async fn persist_offline(state: &AppState, user_id: i32) {
    if let Err(e) = state
        .user
        .set_presence(&user_id, UserStatus::Offline, false, Utc::now())
        .await
    {
        error!("Failed to persist offline status: {:?}", e);
        return;
    }

    if state.presence.is_online(user_id) {
        info!("User reconnected while going offline, restoring online status");
        if let Err(e) = state
            .user
            .set_presence(&user_id, UserStatus::Online, true, Utc::now())
            .await
        {
            error!("Failed to restore online status: {:?}", e);
        }
    }
}
