//! DirectMessageThread entity - Conversazione privata tra esattamente due utenti

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// I partecipanti sono salvati ordinati (`user_low < user_high`), così la coppia
/// {A, B} identifica sempre la stessa riga indipendentemente da chi scrive per primo.
#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct DirectMessageThread {
    pub thread_id: i32,
    pub user_low: i32,
    pub user_high: i32,
    pub last_message_id: Option<i32>,
    pub last_activity: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl DirectMessageThread {
    /// Ordina una coppia di utenti nella forma canonica usata come chiave.
    pub fn canonical_pair(a: i32, b: i32) -> (i32, i32) {
        if a <= b { (a, b) } else { (b, a) }
    }

    pub fn participants(&self) -> [i32; 2] {
        [self.user_low, self.user_high]
    }

    pub fn has_participant(&self, user_id: i32) -> bool {
        self.user_low == user_id || self.user_high == user_id
    }

    pub fn other_participant(&self, user_id: i32) -> Option<i32> {
        if self.user_low == user_id {
            Some(self.user_high)
        } else if self.user_high == user_id {
            Some(self.user_low)
        } else {
            None
        }
    }
}
