//! User entity - Entità utente (senza password: l'hash resta nel database)

use super::enums::UserStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub user_id: i32,
    pub username: String,
    pub avatar: Option<String>,
    pub status: UserStatus,
    pub last_seen: DateTime<Utc>,
    // cache persistita della presenza, la verità a runtime è il PresenceRegistry
    pub is_online: bool,
}
