//! WebSocket Module - Gestione WebSocket per comunicazione real-time
//!
//! Questo modulo gestisce le connessioni WebSocket per la comunicazione in tempo reale
//! tra client e server. Include:
//! - Gestione upgrade HTTP -> WebSocket e ciclo di vita della connessione
//! - Registro delle presenze e stanze (server, canali, conversazioni private)
//! - Indicatori di scrittura con scadenza
//! - Fan-out di messaggi, modifiche, eliminazioni e reazioni

pub mod connection;
pub mod event_handlers;
pub mod fanout;
pub mod membership;
pub mod presence;
pub mod rooms;
pub mod typing;
pub mod utils;

// Re-exports pubblici
pub use connection::{ConnectionContext, handle_socket};
pub use presence::{ConnectionHandle, ConnectionId, InternalSignal, PresenceRegistry};
pub use rooms::{RoomKind, RoomMap};
pub use typing::{TypingRoom, TypingTracker};

use crate::{AppState, entities::User};
use axum::{
    Extension,
    extract::{State, ws::WebSocketUpgrade},
    response::Response,
};
use std::sync::Arc;

/// Entry point per gestire richieste di upgrade WebSocket.
/// L'utente è già stato autenticato dal middleware: un token mancante o non
/// valido viene rifiutato con 401 prima di arrivare qui.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<User>, // ottenuto dall'autenticazione JWT
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, current_user))
}
