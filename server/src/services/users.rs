//! User services - Presenza degli utenti

use crate::core::AppState;
use crate::dtos::PresenceDTO;
use axum::extract::{Json, State};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Snapshot delle presenze, lo stesso inviato con `userOnline`
#[instrument(skip(state))]
pub async fn list_online_users(State(state): State<Arc<AppState>>) -> Json<Vec<PresenceDTO>> {
    let snapshot = state.presence.list_all();
    debug!("{} users online", snapshot.len());
    Json(snapshot)
}
