//! ChannelRepository - Repository per i canali dei server

use super::Read;
use crate::entities::Channel;
use sqlx::{Error, SqlitePool};

pub struct ChannelRepository {
    connection_pool: SqlitePool,
}

impl ChannelRepository {
    pub fn new(connection_pool: SqlitePool) -> Self {
        Self { connection_pool }
    }

    /// Controlla la lista degli utenti ammessi di un canale privato
    pub async fn is_user_allowed(&self, channel_id: &i32, user_id: &i32) -> Result<bool, Error> {
        let found = sqlx::query_scalar::<_, i32>(
            "SELECT user_id FROM channel_allowed_users WHERE channel_id = ? AND user_id = ?",
        )
        .bind(channel_id)
        .bind(user_id)
        .fetch_optional(&self.connection_pool)
        .await?;

        Ok(found.is_some())
    }
}

impl Read<Channel, i32> for ChannelRepository {
    async fn read(&self, id: &i32) -> Result<Option<Channel>, Error> {
        sqlx::query_as::<_, Channel>(
            r#"
            SELECT
                channel_id,
                server_id,
                name,
                channel_type,
                position,
                topic,
                description,
                is_private,
                last_message_id,
                created_at
            FROM channels
            WHERE channel_id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.connection_pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::ChannelType;

    #[sqlx::test(fixtures(path = "../../fixtures", scripts("users", "servers")))]
    async fn test_read_channel_and_allow_list(pool: SqlitePool) -> sqlx::Result<()> {
        let repo = ChannelRepository::new(pool);

        let staff = repo.read(&3).await?.expect("staff channel exists");
        assert!(staff.is_private);
        assert_eq!(staff.channel_type, ChannelType::Text);
        assert!(repo.is_user_allowed(&3, &3).await?);
        assert!(!repo.is_user_allowed(&3, &2).await?);
        assert_eq!(repo.read(&1).await?.and_then(|c| c.last_message_id), None);
        Ok(())
    }
}
