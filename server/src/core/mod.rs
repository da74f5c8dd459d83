//! Core Module - Componenti infrastrutturali dell'applicazione
//!
//! Questo modulo contiene tutti i componenti "core" dell'applicazione:
//! - Autenticazione JWT e controlli di accesso a server, canali e dm
//! - Configurazione
//! - Gestione errori
//! - Stato applicazione

pub mod auth;
pub mod config;
pub mod error;
pub mod state;

// Re-exports per facilitare l'import
pub use auth::{
    Claims, authentication_middleware, authorize_channel, authorize_server_member,
    authorize_thread, decode_jwt, encode_jwt, verify_credential,
};
pub use config::Config;
pub use error::AppError;
pub use state::AppState;
