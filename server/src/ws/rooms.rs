//! Room Map - Stanze (server, canali, conversazioni private) e connessioni iscritte
//!
//! Ogni stanza mappa le connessioni iscritte al loro canale di uscita. Il fan-out
//! scorre gli iscritti al momento dell'invio e accoda l'evento su ciascuno:
//! nessuna perdita di messaggi, ordine FIFO per connessione.

use crate::dtos::ServerEvent;
use crate::ws::presence::{ConnectionHandle, ConnectionId};
use dashmap::DashMap;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoomKind {
    Server(i32),
    Channel(i32),
    DirectMessage(i32),
}

impl fmt::Display for RoomKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoomKind::Server(id) => write!(f, "server-{id}"),
            RoomKind::Channel(id) => write!(f, "channel-{id}"),
            RoomKind::DirectMessage(id) => write!(f, "dm-{id}"),
        }
    }
}

#[derive(Clone, Default)]
pub struct RoomMap {
    rooms: Arc<DashMap<RoomKind, HashMap<ConnectionId, ConnectionHandle>>>,
}

impl RoomMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Iscrive la connessione alla stanza.
    /// Restituisce true se la connessione non era già iscritta.
    #[instrument(skip(self, handle), fields(room = %room, conn = %handle.id()))]
    pub fn join(&self, room: RoomKind, handle: ConnectionHandle) -> bool {
        let mut members = self.rooms.entry(room).or_default();
        let newly_joined = members.insert(handle.id(), handle).is_none();
        debug!(members = members.len(), newly_joined, "Joined room");
        newly_joined
    }

    /// Rimuove la connessione dalla stanza; la stanza vuota viene eliminata.
    #[instrument(skip(self), fields(room = %room, conn = %conn_id))]
    pub fn leave(&self, room: RoomKind, conn_id: ConnectionId) -> bool {
        let removed = match self.rooms.get_mut(&room) {
            Some(mut members) => members.remove(&conn_id).is_some(),
            None => false,
        };
        self.rooms.remove_if(&room, |_, members| members.is_empty());
        removed
    }

    /// Rimuove la connessione da tutte le stanze (disconnessione)
    pub fn leave_all(&self, conn_id: ConnectionId) -> Vec<RoomKind> {
        let mut left = Vec::new();
        for mut entry in self.rooms.iter_mut() {
            if entry.value_mut().remove(&conn_id).is_some() {
                left.push(*entry.key());
            }
        }
        // il guard di iter_mut va rilasciato prima di rimuovere le chiavi
        for room in &left {
            self.rooms.remove_if(room, |_, members| members.is_empty());
        }
        left
    }

    pub fn is_member(&self, room: RoomKind, conn_id: ConnectionId) -> bool {
        self.rooms
            .get(&room)
            .is_some_and(|members| members.contains_key(&conn_id))
    }

    pub fn member_count(&self, room: RoomKind) -> usize {
        self.rooms.get(&room).map_or(0, |members| members.len())
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Invia l'evento a ogni connessione iscritta, eventualmente esclusa quella indicata.
    ///
    /// # Returns
    /// Numero di connessioni a cui l'evento è stato accodato
    #[instrument(skip(self, event), fields(room = %room))]
    pub fn broadcast(
        &self,
        room: RoomKind,
        event: Arc<ServerEvent>,
        exclude: Option<ConnectionId>,
    ) -> usize {
        // copia dei destinatari: nessun guard resta aperto durante l'invio
        let recipients: Vec<ConnectionHandle> = match self.rooms.get(&room) {
            Some(members) => members
                .values()
                .filter(|handle| Some(handle.id()) != exclude)
                .cloned()
                .collect(),
            None => return 0,
        };

        let delivered = recipients
            .iter()
            .filter(|handle| handle.send(event.clone()))
            .count();
        debug!(delivered, "Broadcast to room");
        delivered
    }
}
