//! Message DTOs - Data Transfer Objects per messaggi

use crate::entities::{DELETED_PLACEHOLDER, Message, MessageOwner, Reaction, User};
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use validator::Validate;

lazy_static! {
    // una reazione è un singolo token senza spazi (emoji o shortcode)
    pub static ref EMOJI_REGEX: Regex = Regex::new(r"^\S+$").unwrap();
}

/// Snapshot dell'autore allegato a ogni messaggio inviato al client
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SenderDTO {
    pub id: i32,
    pub username: String,
    pub avatar: Option<String>,
}

impl From<&User> for SenderDTO {
    fn from(value: &User) -> Self {
        Self {
            id: value.user_id,
            username: value.username.clone(),
            avatar: value.avatar.clone(),
        }
    }
}

/// Anteprima del messaggio a cui si risponde
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ReplyPreviewDTO {
    pub id: i32,
    pub content: String,
    pub sender: SenderDTO,
    pub deleted: bool,
}

impl ReplyPreviewDTO {
    pub fn new(message: &Message, sender: SenderDTO) -> Self {
        let content = if message.deleted {
            DELETED_PLACEHOLDER.to_string()
        } else {
            message.content.clone()
        };
        Self {
            id: message.message_id,
            content,
            sender,
            deleted: message.deleted,
        }
    }
}

/// Reazioni raggruppate per emoji
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ReactionDTO {
    pub emoji: String,
    pub users: Vec<i32>,
}

impl ReactionDTO {
    /// Raggruppa le righe per emoji mantenendo l'ordine di prima comparsa
    pub fn group(reactions: &[Reaction]) -> Vec<ReactionDTO> {
        let mut grouped: Vec<ReactionDTO> = Vec::new();
        for reaction in reactions {
            match grouped.iter_mut().find(|r| r.emoji == reaction.emoji) {
                Some(entry) => entry.users.push(reaction.user_id),
                None => grouped.push(ReactionDTO {
                    emoji: reaction.emoji.clone(),
                    users: vec![reaction.user_id],
                }),
            }
        }
        grouped
    }
}

/// Struct per gestire io col client
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MessageDTO {
    pub id: i32,
    pub channel_id: Option<i32>,
    pub dm_id: Option<i32>,
    pub sender: SenderDTO,
    pub content: String,
    pub reply_to: Option<ReplyPreviewDTO>,
    pub reactions: Vec<ReactionDTO>,
    pub edited: bool,
    pub edited_at: Option<DateTime<Utc>>,
    pub deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl MessageDTO {
    pub fn new(
        message: Message,
        sender: SenderDTO,
        reply_to: Option<ReplyPreviewDTO>,
        reactions: Vec<ReactionDTO>,
    ) -> Self {
        Self {
            id: message.message_id,
            channel_id: message.channel_id,
            dm_id: message.thread_id,
            sender,
            content: message.content,
            reply_to,
            reactions,
            edited: message.edited,
            edited_at: message.edited_at,
            deleted: message.deleted,
            deleted_at: message.deleted_at,
            created_at: message.created_at,
        }
    }
}

/// DTO per creare un nuovo messaggio (senza message_id)
#[derive(Debug, Clone)]
pub struct CreateMessageDTO {
    pub owner: MessageOwner,
    pub sender_id: i32,
    pub content: String,
    pub reply_to: Option<i32>,
    pub created_at: DateTime<Utc>,
}

/// DTO per aggiornare un messaggio (solo campi modificabili)
#[derive(Debug, Clone)]
pub struct UpdateMessageDTO {
    pub content: String,
    pub edited_at: DateTime<Utc>,
}

// ************************* PAYLOAD IN INGRESSO ************************* //

#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageDTO {
    pub channel_id: Option<i32>,
    pub dm_id: Option<i32>,

    #[validate(length(min = 1, max = 2000, message = "Message content must be between 1 and 2000 characters"))]
    pub content: String,

    pub reply_to: Option<i32>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SendDirectMessageDTO {
    pub recipient_id: i32,

    #[validate(length(min = 1, max = 2000, message = "Message content must be between 1 and 2000 characters"))]
    pub content: String,

    pub reply_to: Option<i32>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
#[serde(rename_all = "camelCase")]
pub struct EditMessageDTO {
    pub message_id: i32,

    #[validate(length(min = 1, max = 2000, message = "Message content must be between 1 and 2000 characters"))]
    pub new_content: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DeleteMessageDTO {
    pub message_id: i32,
}

#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReactionRequestDTO {
    pub message_id: i32,

    #[validate(length(min = 1, max = 32), regex(path = *EMOJI_REGEX))]
    pub emoji: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TypingDTO {
    pub channel_id: i32,
}

/// Il contenuto non può essere composto solo da spazi
pub fn is_blank(content: &str) -> bool {
    content.trim().is_empty()
}
