//! DirectMessageRepository - Repository per le conversazioni private

use super::Read;
use crate::entities::DirectMessageThread;
use chrono::{DateTime, Utc};
use sqlx::{Error, SqlitePool};

const THREAD_COLUMNS: &str =
    "thread_id, user_low, user_high, last_message_id, last_activity, is_active, created_at";

pub struct DirectMessageRepository {
    connection_pool: SqlitePool,
}

impl DirectMessageRepository {
    pub fn new(connection_pool: SqlitePool) -> Self {
        Self { connection_pool }
    }

    /// Cerca la conversazione tra due utenti, in qualunque ordine siano passati
    pub async fn find_by_pair(&self, a: &i32, b: &i32) -> Result<Option<DirectMessageThread>, Error> {
        let (low, high) = DirectMessageThread::canonical_pair(*a, *b);
        sqlx::query_as::<_, DirectMessageThread>(&format!(
            "SELECT {THREAD_COLUMNS} FROM direct_message_threads WHERE user_low = ? AND user_high = ?"
        ))
        .bind(low)
        .bind(high)
        .fetch_optional(&self.connection_pool)
        .await
    }

    /// Restituisce la conversazione canonica della coppia, creandola se non esiste
    /// e riattivandola se era stata disattivata.
    ///
    /// # Returns
    /// `(thread, opened)` dove `opened` è true se la conversazione è stata creata
    /// o riattivata da questa chiamata (prima non era attiva).
    /// Il vincolo UNIQUE(user_low, user_high) garantisce una sola riga per coppia anche
    /// con due richieste concorrenti.
    pub async fn find_or_create(
        &self,
        a: &i32,
        b: &i32,
        now: DateTime<Utc>,
    ) -> Result<(DirectMessageThread, bool), Error> {
        let (low, high) = DirectMessageThread::canonical_pair(*a, *b);

        let inserted = sqlx::query(
            r#"
            INSERT INTO direct_message_threads (user_low, user_high, last_activity, is_active, created_at)
            VALUES (?, ?, ?, 1, ?)
            ON CONFLICT (user_low, user_high) DO NOTHING
            "#,
        )
        .bind(low)
        .bind(high)
        .bind(now)
        .bind(now)
        .execute(&self.connection_pool)
        .await?;
        let created = inserted.rows_affected() == 1;

        let reactivated = if created {
            false
        } else {
            let updated = sqlx::query(
                "UPDATE direct_message_threads SET is_active = 1 \
                 WHERE user_low = ? AND user_high = ? AND is_active = 0",
            )
            .bind(low)
            .bind(high)
            .execute(&self.connection_pool)
            .await?;
            updated.rows_affected() == 1
        };

        let thread = self
            .find_by_pair(&low, &high)
            .await?
            .ok_or(Error::RowNotFound)?;

        Ok((thread, created || reactivated))
    }

    /// Id delle conversazioni attive dell'utente (per l'auto-join alla connessione)
    pub async fn find_active_ids_by_user(&self, user_id: &i32) -> Result<Vec<i32>, Error> {
        sqlx::query_scalar::<_, i32>(
            r#"
            SELECT thread_id FROM direct_message_threads
            WHERE (user_low = ? OR user_high = ?) AND is_active = 1
            ORDER BY thread_id
            "#,
        )
        .bind(user_id)
        .bind(user_id)
        .fetch_all(&self.connection_pool)
        .await
    }

    /// Conversazioni attive dell'utente, dalla più recente
    pub async fn list_active_by_user(&self, user_id: &i32) -> Result<Vec<DirectMessageThread>, Error> {
        sqlx::query_as::<_, DirectMessageThread>(&format!(
            r#"
            SELECT {THREAD_COLUMNS} FROM direct_message_threads
            WHERE (user_low = ? OR user_high = ?) AND is_active = 1
            ORDER BY last_activity DESC, thread_id DESC
            "#
        ))
        .bind(user_id)
        .bind(user_id)
        .fetch_all(&self.connection_pool)
        .await
    }
}

impl Read<DirectMessageThread, i32> for DirectMessageRepository {
    async fn read(&self, id: &i32) -> Result<Option<DirectMessageThread>, Error> {
        sqlx::query_as::<_, DirectMessageThread>(&format!(
            "SELECT {THREAD_COLUMNS} FROM direct_message_threads WHERE thread_id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.connection_pool)
        .await
    }
}
