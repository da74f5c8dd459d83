//! Direct message thread DTOs

use crate::entities::DirectMessageThread;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::SenderDTO;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DirectMessageThreadDTO {
    pub dm_id: i32,
    pub participants: [i32; 2],
    pub other_user: SenderDTO,
    pub last_message_id: Option<i32>,
    pub last_activity: DateTime<Utc>,
}

impl DirectMessageThreadDTO {
    pub fn new(thread: &DirectMessageThread, other_user: SenderDTO) -> Self {
        Self {
            dm_id: thread.thread_id,
            participants: thread.participants(),
            other_user,
            last_message_id: thread.last_message_id,
            last_activity: thread.last_activity,
        }
    }
}
