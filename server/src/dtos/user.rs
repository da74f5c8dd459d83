//! User DTOs - Data Transfer Objects per utenti

use crate::entities::User;
use serde::{Deserialize, Serialize};

/// Voce dello snapshot di presenza (userOnline / userOffline / GET /users/online)
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PresenceDTO {
    pub user_id: i32,
    pub username: String,
    pub avatar: Option<String>,
}

impl From<&User> for PresenceDTO {
    fn from(value: &User) -> Self {
        Self {
            user_id: value.user_id,
            username: value.username.clone(),
            avatar: value.avatar.clone(),
        }
    }
}
