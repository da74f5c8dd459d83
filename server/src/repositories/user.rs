//! UserRepository - Repository per la gestione degli utenti

use super::Read;
use crate::entities::{User, UserStatus};
use chrono::{DateTime, Utc};
use sqlx::{Error, SqlitePool};

// la password non viene mai selezionata: resta di competenza del servizio di autenticazione
const USER_COLUMNS: &str = "user_id, username, avatar, status, last_seen, is_online";

pub struct UserRepository {
    connection_pool: SqlitePool,
}

impl UserRepository {
    pub fn new(connection_pool: SqlitePool) -> UserRepository {
        Self { connection_pool }
    }

    /// Aggiorna lo stato di presenza persistito (connessione/disconnessione)
    pub async fn set_presence(
        &self,
        user_id: &i32,
        status: UserStatus,
        is_online: bool,
        last_seen: DateTime<Utc>,
    ) -> Result<(), Error> {
        sqlx::query("UPDATE users SET status = ?, is_online = ?, last_seen = ? WHERE user_id = ?")
            .bind(status)
            .bind(is_online)
            .bind(last_seen)
            .bind(user_id)
            .execute(&self.connection_pool)
            .await?;

        Ok(())
    }

    /// Porta offline tutti gli utenti. Va chiamata all'avvio, prima di accettare connessioni:
    /// il registro delle presenze parte vuoto e i flag di una esecuzione precedente non valgono più.
    ///
    /// # Returns
    /// Numero di utenti che risultavano ancora online
    pub async fn reset_all_presence(&self) -> Result<u64, Error> {
        let result = sqlx::query(
            "UPDATE users SET is_online = 0, status = 'offline' WHERE is_online = 1 OR status <> 'offline'",
        )
        .execute(&self.connection_pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Utenti marcati online nel database
    pub async fn find_online(&self) -> Result<Vec<User>, Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE is_online = 1 ORDER BY user_id"
        ))
        .fetch_all(&self.connection_pool)
        .await
    }
}

impl Read<User, i32> for UserRepository {
    async fn read(&self, id: &i32) -> Result<Option<User>, Error> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = ?"))
            .bind(id)
            .fetch_optional(&self.connection_pool)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[sqlx::test(fixtures(path = "../../fixtures", scripts("users")))]
    async fn test_read_user_without_password(pool: SqlitePool) -> sqlx::Result<()> {
        let repo = UserRepository::new(pool);
        let alice = repo.read(&1).await?.expect("alice exists");
        assert_eq!(alice.username, "alice");
        assert_eq!(alice.avatar.as_deref(), Some("alice.png"));
        assert!(repo.read(&999).await?.is_none());
        Ok(())
    }

    #[sqlx::test(fixtures(path = "../../fixtures", scripts("users")))]
    async fn test_reset_all_presence(pool: SqlitePool) -> sqlx::Result<()> {
        let repo = UserRepository::new(pool);
        assert_eq!(repo.find_online().await?.len(), 2);

        let reset = repo.reset_all_presence().await?;
        // alice (online) e charlie (busy, online)
        assert_eq!(reset, 2);
        assert!(repo.find_online().await?.is_empty());

        let charlie = repo.read(&3).await?.expect("charlie exists");
        assert_eq!(charlie.status, UserStatus::Offline);
        assert!(!charlie.is_online);
        Ok(())
    }

    #[sqlx::test(fixtures(path = "../../fixtures", scripts("users")))]
    async fn test_set_presence(pool: SqlitePool) -> sqlx::Result<()> {
        let repo = UserRepository::new(pool);
        let now = Utc::now();
        repo.set_presence(&2, UserStatus::Online, true, now).await?;

        let bob = repo.read(&2).await?.expect("bob exists");
        assert!(bob.is_online);
        assert_eq!(bob.status, UserStatus::Online);
        assert_eq!(bob.last_seen.timestamp(), now.timestamp());
        Ok(())
    }
}
