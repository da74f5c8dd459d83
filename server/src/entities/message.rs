//! Message entity - Entità messaggio

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Testo che sostituisce il contenuto di un messaggio eliminato.
pub const DELETED_PLACEHOLDER: &str = "[message deleted]";

#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct Message {
    pub message_id: i32,
    // esattamente uno tra channel_id e thread_id è valorizzato (CHECK sul db)
    pub channel_id: Option<i32>,
    pub thread_id: Option<i32>,
    pub sender_id: i32,
    pub content: String,
    pub reply_to: Option<i32>,
    pub edited: bool,
    pub edited_at: Option<DateTime<Utc>>,
    pub deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Contenitore di un messaggio: un canale oppure una conversazione privata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageOwner {
    Channel(i32),
    Thread(i32),
}

impl Message {
    pub fn owner(&self) -> Option<MessageOwner> {
        match (self.channel_id, self.thread_id) {
            (Some(channel_id), None) => Some(MessageOwner::Channel(channel_id)),
            (None, Some(thread_id)) => Some(MessageOwner::Thread(thread_id)),
            _ => None,
        }
    }

    pub fn is_authored_by(&self, user_id: i32) -> bool {
        self.sender_id == user_id
    }
}

/// Una riga della tabella message_reactions.
#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct Reaction {
    pub message_id: i32,
    pub emoji: String,
    pub user_id: i32,
}
