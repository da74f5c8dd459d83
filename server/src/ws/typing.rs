//! Typing Tracker - Indicatori "sta scrivendo..." per canale e conversazione privata
//!
//! Per ogni coppia (stanza, utente) lo stato passa da idle a typing e torna idle
//! per stop esplicito, invio di un messaggio, disconnessione o scadenza del timer.
//! Ogni transizione produce esattamente un evento.

use crate::dtos::ServerEvent;
use crate::ws::presence::ConnectionId;
use crate::ws::rooms::{RoomKind, RoomMap};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::task::AbortHandle;
use tracing::{debug, instrument};

pub const DEFAULT_TYPING_TIMEOUT: Duration = Duration::from_secs(10);

/// Stanze in cui si può scrivere
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypingRoom {
    Channel(i32),
    DirectMessage(i32),
}

impl TypingRoom {
    pub fn room(self) -> RoomKind {
        match self {
            TypingRoom::Channel(id) => RoomKind::Channel(id),
            TypingRoom::DirectMessage(id) => RoomKind::DirectMessage(id),
        }
    }

    fn started_event(self, user_id: i32, username: String) -> ServerEvent {
        match self {
            TypingRoom::Channel(channel_id) => ServerEvent::UserTyping {
                user_id,
                username,
                channel_id,
            },
            TypingRoom::DirectMessage(dm_id) => ServerEvent::UserStartedTypingDm {
                user_id,
                username,
                dm_id,
            },
        }
    }

    fn stopped_event(self, user_id: i32, username: String) -> ServerEvent {
        match self {
            TypingRoom::Channel(channel_id) => ServerEvent::UserStoppedTyping {
                user_id,
                username,
                channel_id,
            },
            TypingRoom::DirectMessage(dm_id) => ServerEvent::UserStoppedTypingDm {
                user_id,
                username,
                dm_id,
            },
        }
    }
}

struct TypingEntry {
    generation: u64,
    conn_id: ConnectionId,
    username: String,
    timer: AbortHandle,
}

#[derive(Clone)]
pub struct TypingTracker {
    rooms: RoomMap,
    typing: Arc<DashMap<TypingRoom, HashMap<i32, TypingEntry>>>,
    generations: Arc<AtomicU64>,
    timeout: Duration,
}

impl TypingTracker {
    pub fn new(rooms: RoomMap, timeout: Duration) -> Self {
        Self {
            rooms,
            typing: Arc::new(DashMap::new()),
            generations: Arc::new(AtomicU64::new(0)),
            timeout,
        }
    }

    /// Segna l'utente come "sta scrivendo" e (ri)arma il timer di scadenza.
    ///
    /// # Returns
    /// true solo nella transizione idle -> typing, l'unica che genera un evento
    #[instrument(skip(self, username), fields(conn = %conn_id))]
    pub fn start(&self, room: TypingRoom, user_id: i32, username: &str, conn_id: ConnectionId) -> bool {
        let generation = self.generations.fetch_add(1, Ordering::Relaxed);
        let timer = self.spawn_expiry(room, user_id, generation);

        let started = {
            let mut users = self.typing.entry(room).or_default();
            match users.get_mut(&user_id) {
                Some(entry) => {
                    entry.timer.abort();
                    entry.timer = timer;
                    entry.generation = generation;
                    // conn_id resta la connessione esclusa dall'evento di start
                    false
                }
                None => {
                    users.insert(
                        user_id,
                        TypingEntry {
                            generation,
                            conn_id,
                            username: username.to_string(),
                            timer,
                        },
                    );
                    true
                }
            }
        };

        if started {
            let event = Arc::new(room.started_event(user_id, username.to_string()));
            self.rooms.broadcast(room.room(), event, Some(conn_id));
        } else {
            debug!("Typing timer re-armed");
        }
        started
    }

    /// Stop esplicito (o dopo un invio). Nessun evento se l'utente non stava scrivendo.
    #[instrument(skip(self))]
    pub fn stop(&self, room: TypingRoom, user_id: i32) -> bool {
        match self.take_entry(room, user_id, None) {
            Some(entry) => {
                entry.timer.abort();
                self.emit_stopped(room, user_id, entry);
                true
            }
            None => false,
        }
    }

    /// Ferma ogni indicatore dell'utente, in tutte le stanze (disconnessione)
    #[instrument(skip(self))]
    pub fn clear_user(&self, user_id: i32) -> usize {
        let rooms: Vec<TypingRoom> = self
            .typing
            .iter()
            .filter(|entry| entry.value().contains_key(&user_id))
            .map(|entry| *entry.key())
            .collect();

        rooms
            .into_iter()
            .filter(|room| self.stop(*room, user_id))
            .count()
    }

    pub fn is_typing(&self, room: TypingRoom, user_id: i32) -> bool {
        self.typing
            .get(&room)
            .is_some_and(|users| users.contains_key(&user_id))
    }

    pub fn active_rooms(&self) -> usize {
        self.typing.len()
    }

    fn spawn_expiry(&self, room: TypingRoom, user_id: i32, generation: u64) -> AbortHandle {
        let tracker = self.clone();
        let timeout = self.timeout;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            // scade solo se nel frattempo il timer non è stato riarmato
            if let Some(entry) = tracker.take_entry(room, user_id, Some(generation)) {
                debug!(user_id, "Typing indicator expired");
                tracker.emit_stopped(room, user_id, entry);
            }
        })
        .abort_handle()
    }

    fn take_entry(&self, room: TypingRoom, user_id: i32, generation: Option<u64>) -> Option<TypingEntry> {
        let taken = match self.typing.get_mut(&room) {
            Some(mut users) => {
                let matches = users
                    .get(&user_id)
                    .is_some_and(|entry| generation.is_none_or(|g| entry.generation == g));
                if matches { users.remove(&user_id) } else { None }
            }
            None => None,
        };
        self.typing.remove_if(&room, |_, users| users.is_empty());
        taken
    }

    fn emit_stopped(&self, room: TypingRoom, user_id: i32, entry: TypingEntry) {
        let event = Arc::new(room.stopped_event(user_id, entry.username));
        self.rooms.broadcast(room.room(), event, Some(entry.conn_id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::presence::{ConnectionHandle, InternalSignal};
    use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};

    struct Fixture {
        tracker: TypingTracker,
        typist: ConnectionId,
        watcher_rx: UnboundedReceiver<InternalSignal>,
        typist_rx: UnboundedReceiver<InternalSignal>,
    }

    fn fixture(room: RoomKind) -> Fixture {
        let rooms = RoomMap::new();
        let (tx, typist_rx) = unbounded_channel();
        let typist = ConnectionHandle::new(tx);
        let (tx, watcher_rx) = unbounded_channel();
        let watcher = ConnectionHandle::new(tx);
        let typist_id = typist.id();
        rooms.join(room, typist);
        rooms.join(room, watcher);
        Fixture {
            tracker: TypingTracker::new(rooms, DEFAULT_TYPING_TIMEOUT),
            typist: typist_id,
            watcher_rx,
            typist_rx,
        }
    }

    fn drain(rx: &mut UnboundedReceiver<InternalSignal>) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(InternalSignal::Event(event)) = rx.try_recv() {
            events.push((*event).clone());
        }
        events
    }

    fn stops(events: &[ServerEvent]) -> usize {
        events
            .iter()
            .filter(|e| {
                matches!(
                    e,
                    ServerEvent::UserStoppedTyping { .. } | ServerEvent::UserStoppedTypingDm { .. }
                )
            })
            .count()
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_emits_exactly_one_stop() {
        let mut f = fixture(RoomKind::Channel(1));
        let room = TypingRoom::Channel(1);

        assert!(f.tracker.start(room, 1, "alice", f.typist));
        let events = drain(&mut f.watcher_rx);
        assert!(matches!(events.as_slice(), [ServerEvent::UserTyping { channel_id: 1, .. }]));

        tokio::time::sleep(Duration::from_millis(9_900)).await;
        assert_eq!(stops(&drain(&mut f.watcher_rx)), 0);
        assert!(f.tracker.is_typing(room, 1));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(stops(&drain(&mut f.watcher_rx)), 1);
        assert!(!f.tracker.is_typing(room, 1));
        assert_eq!(f.tracker.active_rooms(), 0);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(drain(&mut f.watcher_rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_rearms_without_new_event() {
        let mut f = fixture(RoomKind::DirectMessage(4));
        let room = TypingRoom::DirectMessage(4);

        assert!(f.tracker.start(room, 2, "bob", f.typist));
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(!f.tracker.start(room, 2, "bob", f.typist));

        let events = drain(&mut f.watcher_rx);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], ServerEvent::UserStartedTypingDm { dm_id: 4, .. }));

        // il primo timer avrebbe scaduto a 10s
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(drain(&mut f.watcher_rx).is_empty());

        tokio::time::sleep(Duration::from_secs(5)).await;
        let events = drain(&mut f.watcher_rx);
        assert_eq!(stops(&events), 1);
        assert!(matches!(events[0], ServerEvent::UserStoppedTypingDm { dm_id: 4, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_explicit_stop_then_timer_is_silent() {
        let mut f = fixture(RoomKind::Channel(1));
        let room = TypingRoom::Channel(1);

        f.tracker.start(room, 1, "alice", f.typist);
        assert!(f.tracker.stop(room, 1));
        assert!(!f.tracker.stop(room, 1));

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(stops(&drain(&mut f.watcher_rx)), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_user_stops_every_room() {
        let mut f = fixture(RoomKind::Channel(1));
        f.tracker.rooms.join(
            RoomKind::Channel(2),
            ConnectionHandle::new(unbounded_channel().0),
        );

        f.tracker.start(TypingRoom::Channel(1), 1, "alice", f.typist);
        f.tracker.start(TypingRoom::Channel(2), 1, "alice", f.typist);
        f.tracker.start(TypingRoom::Channel(1), 3, "charlie", f.typist);

        assert_eq!(f.tracker.clear_user(1), 2);
        assert!(f.tracker.is_typing(TypingRoom::Channel(1), 3));
        assert!(!f.tracker.is_typing(TypingRoom::Channel(2), 1));
        assert_eq!(stops(&drain(&mut f.watcher_rx)), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_device_rearm_keeps_start_exclusion() {
        let mut f = fixture(RoomKind::Channel(1));
        let room = TypingRoom::Channel(1);
        let (tx, mut tablet_rx) = unbounded_channel();
        let tablet = ConnectionHandle::new(tx);
        let tablet_id = tablet.id();
        f.tracker.rooms.join(RoomKind::Channel(1), tablet);

        assert!(f.tracker.start(room, 1, "alice", f.typist));
        assert!(!f.tracker.start(room, 1, "alice", tablet_id));
        assert!(f.tracker.stop(room, 1));

        // chi non ha visto lo start non riceve nemmeno lo stop
        assert!(drain(&mut f.typist_rx).is_empty());
        for rx in [&mut f.watcher_rx, &mut tablet_rx] {
            let events = drain(rx);
            assert_eq!(events.len(), 2);
            assert_eq!(stops(&events), 1);
        }
    }
}
