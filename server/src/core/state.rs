//! Application State - Stato globale dell'applicazione
//!
//! Contiene tutti i repository, configurazioni e lo stato volatile condiviso
//! (presenze, stanze, indicatori di scrittura).

use crate::repositories::{
    ChannelRepository, DirectMessageRepository, MessageRepository, ServerRepository,
    UserRepository,
};
use crate::ws::presence::PresenceRegistry;
use crate::ws::rooms::RoomMap;
use crate::ws::typing::{DEFAULT_TYPING_TIMEOUT, TypingTracker};
use sqlx::SqlitePool;
use std::time::{Duration, Instant};

/// Stato globale dell'applicazione condiviso tra tutte le route, middleware e task WebSocket
pub struct AppState {
    /// Repository per la gestione degli utenti
    pub user: UserRepository,

    /// Repository per server e membri
    pub server: ServerRepository,

    /// Repository per i canali
    pub channel: ChannelRepository,

    /// Repository per le conversazioni private
    pub dm: DirectMessageRepository,

    /// Repository per messaggi e reazioni
    pub msg: MessageRepository,

    /// Secret key per JWT token
    pub jwt_secret: String,

    /// Utenti online con le loro connessioni (una per dispositivo)
    pub presence: PresenceRegistry,

    /// Stanze (server, canali, dm) con le connessioni iscritte
    pub rooms: RoomMap,

    /// Stato "sta scrivendo..." per stanza
    pub typing: TypingTracker,

    /// Pool condiviso, usato dall'health check
    pub pool: SqlitePool,

    pub started_at: Instant,
}

impl AppState {
    /// Crea una nuova istanza di AppState inizializzando tutti i repository
    /// con il pool di connessioni fornito e la JWT secret.
    pub fn new(pool: SqlitePool, jwt_secret: String) -> Self {
        Self::with_typing_timeout(pool, jwt_secret, DEFAULT_TYPING_TIMEOUT)
    }

    pub fn with_typing_timeout(pool: SqlitePool, jwt_secret: String, typing_timeout: Duration) -> Self {
        let rooms = RoomMap::new();
        Self {
            user: UserRepository::new(pool.clone()),
            server: ServerRepository::new(pool.clone()),
            channel: ChannelRepository::new(pool.clone()),
            dm: DirectMessageRepository::new(pool.clone()),
            msg: MessageRepository::new(pool.clone()),
            jwt_secret,
            presence: PresenceRegistry::new(),
            typing: TypingTracker::new(rooms.clone(), typing_timeout),
            rooms,
            pool,
            started_at: Instant::now(),
        }
    }
}
