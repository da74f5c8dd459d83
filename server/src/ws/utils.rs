//! WebSocket Utilities - Funzioni di supporto per WebSocket

use crate::core::AppError;
use crate::dtos::ServerEvent;
use crate::ws::presence::ConnectionHandle;
use std::sync::Arc;
use tracing::warn;

impl From<&AppError> for ServerEvent {
    fn from(value: &AppError) -> Self {
        ServerEvent::Error {
            code: value.status().as_u16(),
            message: value.message().to_string(),
        }
    }
}

/// Invia un messaggio di errore alla sola connessione che ha fatto la richiesta
pub fn send_error(handle: &ConnectionHandle, error: &AppError) {
    if !handle.send(Arc::new(ServerEvent::from(error))) {
        warn!(conn = %handle.id(), "Client disconnected, error not delivered");
    }
}
