//! Server entity - Entità server (community) e membri

use super::enums::MemberRole;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct Server {
    pub server_id: i32,
    pub name: String,
    pub owner_id: i32,
    pub invite_code: String,
    pub max_members: i32,
    pub created_at: DateTime<Utc>,
}

impl Server {
    pub fn is_owner(&self, user_id: i32) -> bool {
        self.owner_id == user_id
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct ServerMember {
    pub server_id: i32,
    pub user_id: i32,
    pub role: MemberRole,
    pub joined_at: DateTime<Utc>,
}
