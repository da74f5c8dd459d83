//! Repositories module - Coordinatore per tutti i repository del progetto
//!
//! Ogni repository gestisce le operazioni di database per una specifica entità.
//! Le query usano `query`/`query_as` verificate a run-time con `FromRow`, così la
//! compilazione non richiede un database raggiungibile.

pub mod channel;
pub mod direct_message;
pub mod message;
pub mod server;
pub mod traits;
pub mod user;

// Re-esportazione dei trait per facilitare l'import
pub use traits::{Create, Read, Update};

pub use channel::ChannelRepository;
pub use direct_message::DirectMessageRepository;
pub use message::{MessageRepository, ReactionToggle};
pub use server::ServerRepository;
pub use user::UserRepository;
