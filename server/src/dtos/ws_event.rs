//! WebSocket Event DTOs - Data Transfer Objects per eventi WebSocket
//!
//! Ogni frame è un oggetto JSON `{ "type": "<evento>", "data": <payload> }`.

use serde::{Deserialize, Serialize};

use super::{
    DeleteMessageDTO, EditMessageDTO, MessageDTO, PresenceDTO, ReactionDTO, ReactionRequestDTO,
    SendDirectMessageDTO, SendMessageDTO, TypingDTO,
};

/// Eventi inviati dal client.
/// Serde deserializza per esempio:
/// { "type": "joinChannel", "data": 3 }
/// { "type": "sendMessage", "data": { "channelId": 3, "content": "ciao" } }
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    JoinServer(i32),
    JoinChannel(i32),
    LeaveChannel(i32),
    #[serde(rename = "joinDM")]
    JoinDm(i32),
    #[serde(rename = "leaveDM")]
    LeaveDm(i32),
    SendMessage(SendMessageDTO),
    SendDirectMessage(SendDirectMessageDTO),
    EditMessage(EditMessageDTO),
    DeleteMessage(DeleteMessageDTO),
    AddReaction(ReactionRequestDTO),
    Typing(TypingDTO),
    StopTyping(TypingDTO),
    #[serde(rename = "startTypingDM")]
    StartTypingDm(i32),
    #[serde(rename = "stopTypingDM")]
    StopTypingDm(i32),
}

/// Eventi inviati dal server
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    UserOnline(Vec<PresenceDTO>),
    UserOffline(Vec<PresenceDTO>),
    #[serde(rename_all = "camelCase")]
    MemberOnline {
        user_id: i32,
        username: String,
        server_id: i32,
    },
    #[serde(rename_all = "camelCase")]
    MemberOffline {
        user_id: i32,
        username: String,
        server_id: i32,
    },
    NewMessage(MessageDTO),
    MessageEdited(MessageDTO),
    #[serde(rename_all = "camelCase")]
    MessageDeleted {
        message_id: i32,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        channel_id: Option<i32>,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        dm_id: Option<i32>,
    },
    #[serde(rename_all = "camelCase")]
    ReactionAdded {
        message_id: i32,
        reactions: Vec<ReactionDTO>,
    },
    #[serde(rename = "newDMMessage", rename_all = "camelCase")]
    NewDmMessage { message: MessageDTO, dm_id: i32 },
    #[serde(rename_all = "camelCase")]
    UserTyping {
        user_id: i32,
        username: String,
        channel_id: i32,
    },
    #[serde(rename_all = "camelCase")]
    UserStoppedTyping {
        user_id: i32,
        username: String,
        channel_id: i32,
    },
    #[serde(rename = "userStartedTypingDM", rename_all = "camelCase")]
    UserStartedTypingDm {
        user_id: i32,
        username: String,
        dm_id: i32,
    },
    #[serde(rename = "userStoppedTypingDM", rename_all = "camelCase")]
    UserStoppedTypingDm {
        user_id: i32,
        username: String,
        dm_id: i32,
    },
    Error { code: u16, message: String },
}
