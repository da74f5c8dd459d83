//! Presence Registry - Utenti online e relative connessioni
//!
//! Un utente può essere connesso da più dispositivi: risulta online finché
//! resta almeno una connessione registrata.

use crate::dtos::{PresenceDTO, ServerEvent};
use crate::entities::User;
use dashmap::DashMap;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, instrument, warn};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Segnali consegnati al task di scrittura di una connessione
#[derive(Debug)]
pub enum InternalSignal {
    Event(Arc<ServerEvent>),
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Estremità di invio verso una singola connessione WebSocket
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    tx: UnboundedSender<InternalSignal>,
}

impl ConnectionHandle {
    pub fn new(tx: UnboundedSender<InternalSignal>) -> Self {
        Self {
            id: ConnectionId(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed)),
            tx,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Accoda l'evento; false se il task di scrittura è già terminato
    pub fn send(&self, event: Arc<ServerEvent>) -> bool {
        self.tx.send(InternalSignal::Event(event)).is_ok()
    }

    pub fn shutdown(&self) {
        let _ = self.tx.send(InternalSignal::Shutdown);
    }
}

struct PresenceEntry {
    username: String,
    avatar: Option<String>,
    connections: HashMap<ConnectionId, ConnectionHandle>,
}

#[derive(Default)]
pub struct PresenceRegistry {
    users_online: DashMap<i32, PresenceEntry>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registra una connessione dell'utente.
    ///
    /// Se l'utente diventa online lo snapshot aggiornato va a tutti i client;
    /// altrimenti solo la nuova connessione riceve `userOnline` per inizializzarsi.
    #[instrument(skip(self, user, handle), fields(user_id = user.user_id, conn = %handle.id()))]
    pub fn register(&self, user: &User, handle: ConnectionHandle) -> bool {
        let became_online = {
            let mut entry = self
                .users_online
                .entry(user.user_id)
                .or_insert_with(|| PresenceEntry {
                    username: user.username.clone(),
                    avatar: user.avatar.clone(),
                    connections: HashMap::new(),
                });
            let was_empty = entry.connections.is_empty();
            entry.connections.insert(handle.id(), handle.clone());
            was_empty
        };

        let snapshot = Arc::new(ServerEvent::UserOnline(self.list_all()));
        if became_online {
            info!(online = self.online_count(), "User is now online");
            self.broadcast_all(snapshot);
        } else {
            info!("Additional connection for an online user");
            handle.send(snapshot);
        }
        became_online
    }

    /// Rimuove la connessione indicata. Nessun effetto se non registrata.
    ///
    /// # Returns
    /// true se era l'ultima connessione dell'utente (utente ora offline)
    #[instrument(skip(self), fields(conn = %conn_id))]
    pub fn unregister(&self, user_id: i32, conn_id: ConnectionId) -> bool {
        let went_offline = match self.users_online.get_mut(&user_id) {
            Some(mut entry) => entry.connections.remove(&conn_id).is_some() && entry.connections.is_empty(),
            None => false,
        };

        if !went_offline {
            return false;
        }

        // una nuova connessione arrivata nel frattempo mantiene l'utente online
        if self
            .users_online
            .remove_if(&user_id, |_, entry| entry.connections.is_empty())
            .is_none()
        {
            return false;
        }
        info!(online = self.online_count(), "User is now offline");
        self.broadcast_all(Arc::new(ServerEvent::UserOffline(self.list_all())));
        true
    }

    /// Snapshot degli utenti online ordinato per id
    pub fn list_all(&self) -> Vec<PresenceDTO> {
        let mut snapshot: Vec<PresenceDTO> = self
            .users_online
            .iter()
            .filter(|entry| !entry.connections.is_empty())
            .map(|entry| PresenceDTO {
                user_id: *entry.key(),
                username: entry.username.clone(),
                avatar: entry.avatar.clone(),
            })
            .collect();
        snapshot.sort_by_key(|p| p.user_id);
        snapshot
    }

    pub fn find_handles(&self, user_id: i32) -> Vec<ConnectionHandle> {
        self.users_online
            .get(&user_id)
            .map(|entry| entry.connections.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn is_online(&self, user_id: i32) -> bool {
        self.users_online
            .get(&user_id)
            .is_some_and(|entry| !entry.connections.is_empty())
    }

    pub fn online_count(&self) -> usize {
        self.users_online.len()
    }

    /// Invia l'evento a tutte le connessioni dell'utente
    pub fn send_to_user(&self, user_id: i32, event: Arc<ServerEvent>) -> usize {
        let handles = self.find_handles(user_id);
        if handles.is_empty() {
            info!(user_id, "User not online, event not delivered");
        }
        handles
            .iter()
            .filter(|handle| handle.send(event.clone()))
            .count()
    }

    /// Invia l'evento a ogni connessione registrata
    pub fn broadcast_all(&self, event: Arc<ServerEvent>) -> usize {
        let handles: Vec<ConnectionHandle> = self
            .users_online
            .iter()
            .flat_map(|entry| entry.connections.values().cloned().collect::<Vec<_>>())
            .collect();

        let mut delivered = 0;
        for handle in handles {
            if handle.send(event.clone()) {
                delivered += 1;
            } else {
                warn!(conn = %handle.id(), "Writer already closed, event dropped");
            }
        }
        delivered
    }
}
