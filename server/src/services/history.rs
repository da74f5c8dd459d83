//! History services - Storico messaggi e conversazioni private
//!
//! Contiene anche la costruzione dei `MessageDTO` (autore, anteprima della
//! risposta, reazioni) usata sia dalle route HTTP sia dal fan-out WebSocket.

use crate::core::{AppError, AppState, authorize_channel, authorize_thread};
use crate::dtos::{
    DirectMessageThreadDTO, HistoryQuery, MessageDTO, ReactionDTO, ReplyPreviewDTO, SenderDTO,
};
use crate::entities::{Message, MessageOwner, User};
use crate::repositories::Read;
use axum::{
    Extension,
    extract::{Json, Path, Query, State},
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};
use validator::Validate;

pub async fn sender_snapshot(state: &AppState, user_id: i32) -> Result<SenderDTO, AppError> {
    state
        .user
        .read(&user_id)
        .await?
        .map(|user| SenderDTO::from(&user))
        .ok_or_else(|| {
            AppError::internal_server_error("Message sender not found")
                .with_details(format!("user {user_id} missing"))
        })
}

/// Anteprima del messaggio citato; None se il riferimento non esiste più
pub async fn reply_preview(state: &AppState, reply_to: i32) -> Result<Option<ReplyPreviewDTO>, AppError> {
    let Some(target) = state.msg.read(&reply_to).await? else {
        return Ok(None);
    };
    let sender = sender_snapshot(state, target.sender_id).await?;
    Ok(Some(ReplyPreviewDTO::new(&target, sender)))
}

/// Arricchisce un messaggio con anteprima della risposta e reazioni
pub async fn hydrate_message(
    state: &AppState,
    message: Message,
    sender: SenderDTO,
) -> Result<MessageDTO, AppError> {
    let reply = match message.reply_to {
        Some(reply_to) => reply_preview(state, reply_to).await?,
        None => None,
    };
    let reactions = ReactionDTO::group(&state.msg.reactions_of(&message.message_id).await?);
    Ok(MessageDTO::new(message, sender, reply, reactions))
}

/// Come `hydrate_message` ma per una pagina: reazioni in una sola query, autori in cache
async fn hydrate_page(state: &AppState, messages: Vec<Message>) -> Result<Vec<MessageDTO>, AppError> {
    let ids: Vec<i32> = messages.iter().map(|m| m.message_id).collect();
    let reactions = state.msg.reactions_of_many(&ids).await?;

    let mut senders: HashMap<i32, SenderDTO> = HashMap::new();
    let mut page = Vec::with_capacity(messages.len());

    for message in messages {
        let sender = match senders.get(&message.sender_id) {
            Some(sender) => sender.clone(),
            None => {
                let sender = sender_snapshot(state, message.sender_id).await?;
                senders.insert(message.sender_id, sender.clone());
                sender
            }
        };

        let reply = match message.reply_to {
            Some(reply_to) => reply_preview(state, reply_to).await?,
            None => None,
        };

        let own_reactions: Vec<_> = reactions
            .iter()
            .filter(|r| r.message_id == message.message_id)
            .cloned()
            .collect();

        page.push(MessageDTO::new(
            message,
            sender,
            reply,
            ReactionDTO::group(&own_reactions),
        ));
    }

    Ok(page)
}

#[instrument(skip(state, current_user, params), fields(user_id = %current_user.user_id, channel_id = %channel_id))]
pub async fn get_channel_messages(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<User>,
    Path(channel_id): Path<i32>,
    Query(params): Query<HistoryQuery>, // ?before=<message_id>&limit=<n>
) -> Result<Json<Vec<MessageDTO>>, AppError> {
    debug!("Fetching channel history");
    params.validate()?;
    authorize_channel(&state, current_user.user_id, channel_id).await?;

    let messages = state
        .msg
        .find_page(MessageOwner::Channel(channel_id), params.before, params.page_size())
        .await?;

    info!("Retrieved {} messages", messages.len());
    Ok(Json(hydrate_page(&state, messages).await?))
}

#[instrument(skip(state, current_user, params), fields(user_id = %current_user.user_id, thread_id = %thread_id))]
pub async fn get_dm_messages(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<User>,
    Path(thread_id): Path<i32>,
    Query(params): Query<HistoryQuery>,
) -> Result<Json<Vec<MessageDTO>>, AppError> {
    debug!("Fetching direct message history");
    params.validate()?;
    authorize_thread(&state, current_user.user_id, thread_id).await?;

    let messages = state
        .msg
        .find_page(MessageOwner::Thread(thread_id), params.before, params.page_size())
        .await?;

    info!("Retrieved {} messages", messages.len());
    Ok(Json(hydrate_page(&state, messages).await?))
}

#[instrument(skip(state, current_user), fields(user_id = %current_user.user_id))]
pub async fn list_direct_messages(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<User>,
) -> Result<Json<Vec<DirectMessageThreadDTO>>, AppError> {
    let threads = state.dm.list_active_by_user(&current_user.user_id).await?;

    let mut result = Vec::with_capacity(threads.len());
    for thread in &threads {
        let Some(other_id) = thread.other_participant(current_user.user_id) else {
            continue;
        };
        let other_user = sender_snapshot(&state, other_id).await?;
        result.push(DirectMessageThreadDTO::new(thread, other_user));
    }

    info!("User has {} active conversations", result.len());
    Ok(Json(result))
}
