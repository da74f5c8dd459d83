//! Channel entity - Entità canale, appartiene sempre a un server

use super::enums::ChannelType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct Channel {
    pub channel_id: i32,
    pub server_id: i32,
    pub name: String,
    pub channel_type: ChannelType,
    pub position: i32,
    pub topic: Option<String>,
    pub description: Option<String>,
    pub is_private: bool,
    pub last_message_id: Option<i32>,
    pub created_at: DateTime<Utc>,
}
