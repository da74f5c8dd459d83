//! Entities module - Entità del dominio applicativo
//!
//! Questo modulo contiene tutte le entità (models) che rappresentano i dati persistiti nel database.
//! Ogni entity corrisponde a una tabella nel database.

pub mod channel;
pub mod direct_message;
pub mod enums;
pub mod message;
pub mod server;
pub mod user;

// Re-exports per facilitare l'import
pub use channel::Channel;
pub use direct_message::DirectMessageThread;
pub use enums::{ChannelType, MemberRole, UserStatus};
pub use message::{DELETED_PLACEHOLDER, Message, MessageOwner, Reaction};
pub use server::{Server, ServerMember};
pub use user::User;
