//! Message Fan-Out - Invio, modifica, eliminazione e reazioni
//!
//! Ogni operazione persiste prima e poi consegna: se il database fallisce
//! nessun client riceve nulla. I destinatari sono calcolati al momento dell'invio.

use crate::core::{AppError, AppState, authorize_channel, authorize_thread};
use crate::dtos::{
    CreateMessageDTO, DeleteMessageDTO, EditMessageDTO, ReactionDTO, ReactionRequestDTO,
    SendDirectMessageDTO, SendMessageDTO, SenderDTO, ServerEvent, UpdateMessageDTO, is_blank,
};
use crate::entities::{DirectMessageThread, Message, MessageOwner};
use crate::repositories::{Create, Read, Update};
use crate::services::history::hydrate_message;
use crate::ws::connection::ConnectionContext;
use crate::ws::rooms::RoomKind;
use crate::ws::typing::TypingRoom;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, instrument};
use validator::Validate;

/// Destinatari degli eventi relativi a un messaggio
enum Audience {
    /// tutte le connessioni iscritte al canale
    Channel(i32),
    /// tutte le connessioni live dei due partecipanti
    Thread(DirectMessageThread),
}

impl Audience {
    fn deliver(&self, state: &AppState, event: ServerEvent) -> usize {
        let event = Arc::new(event);
        match self {
            Audience::Channel(channel_id) => {
                state.rooms.broadcast(RoomKind::Channel(*channel_id), event, None)
            }
            Audience::Thread(thread) => thread
                .participants()
                .iter()
                .map(|user_id| state.presence.send_to_user(*user_id, event.clone()))
                .sum(),
        }
    }
}

/// Verifica l'accesso dell'utente alla stanza del messaggio
async fn resolve_audience(state: &AppState, user_id: i32, message: &Message) -> Result<Audience, AppError> {
    match message.owner() {
        Some(MessageOwner::Channel(channel_id)) => {
            authorize_channel(state, user_id, channel_id).await?;
            Ok(Audience::Channel(channel_id))
        }
        Some(MessageOwner::Thread(thread_id)) => {
            let thread = authorize_thread(state, user_id, thread_id).await?;
            Ok(Audience::Thread(thread))
        }
        None => Err(AppError::internal_server_error("Corrupted message record")
            .with_details(format!("message {} has no owner", message.message_id))),
    }
}

async fn find_message(state: &AppState, message_id: i32) -> Result<Message, AppError> {
    state
        .msg
        .read(&message_id)
        .await?
        .ok_or_else(|| AppError::not_found("Message not found"))
}

fn check_content(content: &str) -> Result<(), AppError> {
    if is_blank(content) {
        return Err(AppError::bad_request("Message content cannot be empty"));
    }
    Ok(())
}

/// La risposta deve citare un messaggio della stessa stanza
async fn check_reply_target(
    state: &AppState,
    reply_to: Option<i32>,
    owner: MessageOwner,
) -> Result<(), AppError> {
    let Some(reply_to) = reply_to else {
        return Ok(());
    };
    match state.msg.read(&reply_to).await? {
        Some(target) if target.owner() == Some(owner) => Ok(()),
        _ => Err(AppError::bad_request("Reply target not found in this conversation")),
    }
}

/// sendMessage: verso un canale (`channelId`) oppure una conversazione esistente (`dmId`)
#[instrument(skip(state, ctx, body), fields(user_id = ctx.user.user_id))]
pub async fn send_message(state: &AppState, ctx: &ConnectionContext, body: SendMessageDTO) -> Result<(), AppError> {
    body.validate()?;
    check_content(&body.content)?;

    match (body.channel_id, body.dm_id) {
        (Some(channel_id), None) => send_to_channel(state, ctx, channel_id, body.content, body.reply_to).await,
        (None, Some(dm_id)) => {
            let thread = authorize_thread(state, ctx.user.user_id, dm_id).await?;
            send_to_thread(state, ctx, thread, body.content, body.reply_to).await
        }
        _ => Err(AppError::bad_request("Exactly one of channelId or dmId is required")),
    }
}

async fn send_to_channel(
    state: &AppState,
    ctx: &ConnectionContext,
    channel_id: i32,
    content: String,
    reply_to: Option<i32>,
) -> Result<(), AppError> {
    authorize_channel(state, ctx.user.user_id, channel_id).await?;
    let owner = MessageOwner::Channel(channel_id);
    check_reply_target(state, reply_to, owner).await?;

    let message = state
        .msg
        .create(&CreateMessageDTO {
            owner,
            sender_id: ctx.user.user_id,
            content,
            reply_to,
            created_at: Utc::now(),
        })
        .await?;
    info!(message_id = message.message_id, channel_id, "Message persisted");

    let dto = hydrate_message(state, message, SenderDTO::from(&ctx.user)).await?;
    let delivered = Audience::Channel(channel_id).deliver(state, ServerEvent::NewMessage(dto));
    debug!(delivered, "Message delivered");

    state.typing.stop(TypingRoom::Channel(channel_id), ctx.user.user_id);
    Ok(())
}

async fn send_to_thread(
    state: &AppState,
    ctx: &ConnectionContext,
    thread: DirectMessageThread,
    content: String,
    reply_to: Option<i32>,
) -> Result<(), AppError> {
    let owner = MessageOwner::Thread(thread.thread_id);
    check_reply_target(state, reply_to, owner).await?;

    let message = state
        .msg
        .create(&CreateMessageDTO {
            owner,
            sender_id: ctx.user.user_id,
            content,
            reply_to,
            created_at: Utc::now(),
        })
        .await?;
    info!(message_id = message.message_id, thread_id = thread.thread_id, "Direct message persisted");

    let dto = hydrate_message(state, message, SenderDTO::from(&ctx.user)).await?;
    let dm_id = thread.thread_id;
    let delivered = Audience::Thread(thread).deliver(state, ServerEvent::NewDmMessage { message: dto, dm_id });
    debug!(delivered, "Direct message delivered");

    state.typing.stop(TypingRoom::DirectMessage(dm_id), ctx.user.user_id);
    Ok(())
}

/// sendDirectMessage: crea (o riattiva) la conversazione canonica con il destinatario
#[instrument(skip(state, ctx, body), fields(user_id = ctx.user.user_id, recipient_id = body.recipient_id))]
pub async fn send_direct_message(
    state: &AppState,
    ctx: &ConnectionContext,
    body: SendDirectMessageDTO,
) -> Result<(), AppError> {
    body.validate()?;
    check_content(&body.content)?;

    if body.recipient_id == ctx.user.user_id {
        return Err(AppError::bad_request("Cannot send a direct message to yourself"));
    }
    if state.user.read(&body.recipient_id).await?.is_none() {
        return Err(AppError::not_found("User not found"));
    }

    let (thread, opened) = state
        .dm
        .find_or_create(&ctx.user.user_id, &body.recipient_id, Utc::now())
        .await?;

    // conversazione nuova o riattivata: l'auto-join l'aveva saltata, iscriviamo ora le connessioni live
    if opened {
        info!(thread_id = thread.thread_id, "Direct message thread opened");
        let room = RoomKind::DirectMessage(thread.thread_id);
        for user_id in thread.participants() {
            for handle in state.presence.find_handles(user_id) {
                state.rooms.join(room, handle);
            }
        }
    }

    send_to_thread(state, ctx, thread, body.content, body.reply_to).await
}

/// editMessage: solo l'autore, mai su un messaggio eliminato
#[instrument(skip(state, ctx, body), fields(user_id = ctx.user.user_id, message_id = body.message_id))]
pub async fn edit_message(state: &AppState, ctx: &ConnectionContext, body: EditMessageDTO) -> Result<(), AppError> {
    body.validate()?;
    check_content(&body.new_content)?;

    let message = find_message(state, body.message_id).await?;
    if !message.is_authored_by(ctx.user.user_id) {
        return Err(AppError::forbidden("You can only edit your own messages"));
    }
    if message.deleted {
        return Err(AppError::bad_request("Cannot edit a deleted message"));
    }
    let audience = resolve_audience(state, ctx.user.user_id, &message).await?;

    let updated = state
        .msg
        .update(
            &message.message_id,
            &UpdateMessageDTO {
                content: body.new_content,
                edited_at: Utc::now(),
            },
        )
        .await?;
    info!("Message edited");

    let dto = hydrate_message(state, updated, SenderDTO::from(&ctx.user)).await?;
    audience.deliver(state, ServerEvent::MessageEdited(dto));
    Ok(())
}

/// deleteMessage: eliminazione logica, idempotente
#[instrument(skip(state, ctx, body), fields(user_id = ctx.user.user_id, message_id = body.message_id))]
pub async fn delete_message(state: &AppState, ctx: &ConnectionContext, body: DeleteMessageDTO) -> Result<(), AppError> {
    let message = find_message(state, body.message_id).await?;
    if !message.is_authored_by(ctx.user.user_id) {
        return Err(AppError::forbidden("You can only delete your own messages"));
    }
    if message.deleted {
        debug!("Message already deleted, nothing to do");
        return Ok(());
    }
    let audience = resolve_audience(state, ctx.user.user_id, &message).await?;

    let deleted = state.msg.soft_delete(&message.message_id, Utc::now()).await?;
    info!("Message deleted");

    audience.deliver(
        state,
        ServerEvent::MessageDeleted {
            message_id: deleted.message_id,
            channel_id: deleted.channel_id,
            dm_id: deleted.thread_id,
        },
    );
    Ok(())
}

/// addReaction: toggle della reazione dell'utente
#[instrument(skip(state, ctx, body), fields(user_id = ctx.user.user_id, message_id = body.message_id))]
pub async fn toggle_reaction(
    state: &AppState,
    ctx: &ConnectionContext,
    body: ReactionRequestDTO,
) -> Result<(), AppError> {
    body.validate()?;

    let message = find_message(state, body.message_id).await?;
    let audience = resolve_audience(state, ctx.user.user_id, &message).await?;
    if message.deleted {
        return Err(AppError::bad_request("Cannot react to a deleted message"));
    }

    let outcome = state
        .msg
        .toggle_reaction(&message.message_id, &body.emoji, &ctx.user.user_id)
        .await?;
    info!(?outcome, emoji = %body.emoji, "Reaction toggled");

    let reactions = ReactionDTO::group(&state.msg.reactions_of(&message.message_id).await?);
    audience.deliver(
        state,
        ServerEvent::ReactionAdded {
            message_id: message.message_id,
            reactions,
        },
    );
    Ok(())
}
