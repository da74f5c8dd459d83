//! Server library - espone i moduli principali per i test

pub mod core;
pub mod dtos;
pub mod entities;
pub mod monitoring;
pub mod repositories;
pub mod services;
pub mod ws;

// Re-export dei tipi principali per facilitare l'import
pub use crate::core::{AppError, AppState, Config, auth, config};
pub use services::root;

use axum::{
    Router,
    http::{HeaderValue, Method},
    middleware,
    routing::{any, get},
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::warn;

/// Crea il router principale dell'applicazione
pub fn create_router(state: Arc<AppState>) -> Router {
    use crate::core::authentication_middleware;
    use monitoring::health;
    use ws::ws_handler;

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .nest("/users", configure_user_routes(state.clone()))
        .nest("/channels", configure_channel_routes(state.clone()))
        .nest("/dms", configure_dm_routes(state.clone()))
        .route(
            "/ws",
            any(ws_handler).layer(middleware::from_fn_with_state(
                state.clone(),
                authentication_middleware,
            )),
        )
        .with_state(state)
}

/// CORS: origine esplicita se configurata, altrimenti qualsiasi origine
pub fn cors_layer(origin: Option<&str>) -> CorsLayer {
    let allow_origin = match origin.map(str::parse::<HeaderValue>) {
        Some(Ok(value)) => AllowOrigin::exact(value),
        Some(Err(_)) => {
            warn!("Invalid CORS_ORIGIN, allowing any origin");
            AllowOrigin::from(Any)
        }
        None => AllowOrigin::from(Any),
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(Any)
}

/// Configura le routes per la presenza degli utenti
fn configure_user_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    use crate::core::authentication_middleware;
    use services::*;

    Router::new()
        .route("/online", get(list_online_users))
        .layer(middleware::from_fn_with_state(state, authentication_middleware))
}

/// Configura le routes per lo storico dei canali
fn configure_channel_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    use crate::core::authentication_middleware;
    use services::*;

    Router::new()
        .route("/{channel_id}/messages", get(get_channel_messages))
        .layer(middleware::from_fn_with_state(state, authentication_middleware))
}

/// Configura le routes per le conversazioni private
fn configure_dm_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    use crate::core::authentication_middleware;
    use services::*;

    Router::new()
        .route("/", get(list_direct_messages))
        .route("/{thread_id}/messages", get(get_dm_messages))
        .layer(middleware::from_fn_with_state(state, authentication_middleware))
}
