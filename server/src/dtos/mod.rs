//! DTOs module - Data Transfer Objects
//!
//! Questo modulo contiene tutti i DTOs usati per la comunicazione client-server.
//! I DTOs separano la rappresentazione esterna (API e frame WebSocket) dalla
//! rappresentazione interna (entities).

pub mod message;
pub mod query;
pub mod thread;
pub mod user;
pub mod ws_event;

pub use message::{
    CreateMessageDTO, DeleteMessageDTO, EditMessageDTO, MessageDTO, ReactionDTO,
    ReactionRequestDTO, ReplyPreviewDTO, SendDirectMessageDTO, SendMessageDTO, SenderDTO,
    TypingDTO, UpdateMessageDTO, is_blank,
};
pub use query::HistoryQuery;
pub use thread::DirectMessageThreadDTO;
pub use user::PresenceDTO;
pub use ws_event::{ClientEvent, ServerEvent};
