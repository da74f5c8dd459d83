//! Query DTOs - Data Transfer Objects per query di paginazione

use serde::{Deserialize, Serialize};
use validator::Validate;

pub const DEFAULT_PAGE_SIZE: i64 = 50;

/// DTO per query parameters di paginazione messaggi
#[derive(Serialize, Deserialize, Debug, Default, Validate)]
pub struct HistoryQuery {
    /// id del messaggio più vecchio già caricato dal client
    #[serde(default)]
    pub before: Option<i32>,

    #[serde(default)]
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<i64>,
}

impl HistoryQuery {
    pub fn page_size(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE)
    }
}
