//! ServerRepository - Repository per server (community) e membri

use super::Read;
use crate::entities::{Server, ServerMember};
use sqlx::{Error, SqlitePool};

pub struct ServerRepository {
    connection_pool: SqlitePool,
}

impl ServerRepository {
    pub fn new(connection_pool: SqlitePool) -> Self {
        Self { connection_pool }
    }

    /// Riga di membership dell'utente nel server, se esiste.
    /// Il proprietario può non avere una riga: va controllato anche `Server::owner_id`.
    pub async fn find_member(&self, server_id: &i32, user_id: &i32) -> Result<Option<ServerMember>, Error> {
        sqlx::query_as::<_, ServerMember>(
            r#"
            SELECT server_id, user_id, role, joined_at
            FROM server_members
            WHERE server_id = ? AND user_id = ?
            "#,
        )
        .bind(server_id)
        .bind(user_id)
        .fetch_optional(&self.connection_pool)
        .await
    }

    /// Id di tutti i server di cui l'utente è proprietario o membro
    pub async fn find_ids_by_user(&self, user_id: &i32) -> Result<Vec<i32>, Error> {
        sqlx::query_scalar::<_, i32>(
            r#"
            SELECT server_id FROM servers WHERE owner_id = ?
            UNION
            SELECT server_id FROM server_members WHERE user_id = ?
            ORDER BY server_id
            "#,
        )
        .bind(user_id)
        .bind(user_id)
        .fetch_all(&self.connection_pool)
        .await
    }
}

impl Read<Server, i32> for ServerRepository {
    async fn read(&self, id: &i32) -> Result<Option<Server>, Error> {
        sqlx::query_as::<_, Server>(
            r#"
            SELECT server_id, name, owner_id, invite_code, max_members, created_at
            FROM servers
            WHERE server_id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.connection_pool)
        .await
    }
}
