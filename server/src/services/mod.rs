//! Services module - Coordinatore per tutti i service handler HTTP
//!
//! Ogni modulo gestisce gli endpoint HTTP per una specifica funzionalità.

pub mod history;
pub mod users;

// Re-exports per facilitare l'import
pub use history::{get_channel_messages, get_dm_messages, list_direct_messages};
pub use users::list_online_users;

use crate::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse};
use std::sync::Arc;

/// Root endpoint - liveness
pub async fn root(State(_state): State<Arc<AppState>>) -> impl IntoResponse {
    (StatusCode::OK, "Server is running!")
}
