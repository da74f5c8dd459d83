//! MessageRepository - Repository per la gestione dei messaggi

use super::{Create, Read, Update};
use crate::dtos::{CreateMessageDTO, UpdateMessageDTO};
use crate::entities::{DELETED_PLACEHOLDER, Message, MessageOwner, Reaction};
use chrono::{DateTime, Utc};
use sqlx::{Error, SqlitePool};

const MESSAGE_COLUMNS: &str = "message_id, channel_id, thread_id, sender_id, content, reply_to, \
     edited, edited_at, deleted, deleted_at, created_at";

/// Esito di un toggle di reazione
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionToggle {
    Added,
    Removed,
}

// MESSAGE REPO
pub struct MessageRepository {
    connection_pool: SqlitePool,
}

impl MessageRepository {
    pub fn new(connection_pool: SqlitePool) -> Self {
        Self { connection_pool }
    }

    /// Pagina di storico di un canale o di una conversazione.
    ///
    /// Prende gli ultimi `limit` messaggi non eliminati con id minore di `before`
    /// (tutti se `before` è None) e li restituisce dal più vecchio al più recente.
    pub async fn find_page(
        &self,
        owner: MessageOwner,
        before: Option<i32>,
        limit: i64,
    ) -> Result<Vec<Message>, Error> {
        let (column, owner_id) = match owner {
            MessageOwner::Channel(id) => ("channel_id", id),
            MessageOwner::Thread(id) => ("thread_id", id),
        };

        let mut messages = sqlx::query_as::<_, Message>(&format!(
            r#"
            SELECT {MESSAGE_COLUMNS} FROM messages
            WHERE {column} = ? AND deleted = 0 AND (? IS NULL OR message_id < ?)
            ORDER BY message_id DESC
            LIMIT ?
            "#
        ))
        .bind(owner_id)
        .bind(before)
        .bind(before)
        .bind(limit)
        .fetch_all(&self.connection_pool)
        .await?;

        messages.reverse();
        Ok(messages)
    }

    /// Eliminazione logica: il record resta, il contenuto viene sostituito dal placeholder
    pub async fn soft_delete(&self, message_id: &i32, at: DateTime<Utc>) -> Result<Message, Error> {
        sqlx::query(
            "UPDATE messages SET deleted = 1, deleted_at = ?, content = ? WHERE message_id = ?",
        )
        .bind(at)
        .bind(DELETED_PLACEHOLDER)
        .bind(message_id)
        .execute(&self.connection_pool)
        .await?;

        self.read(message_id).await?.ok_or(Error::RowNotFound)
    }

    /// Aggiunge la reazione se l'utente non l'aveva ancora messa, altrimenti la toglie
    pub async fn toggle_reaction(
        &self,
        message_id: &i32,
        emoji: &str,
        user_id: &i32,
    ) -> Result<ReactionToggle, Error> {
        let removed = sqlx::query(
            "DELETE FROM message_reactions WHERE message_id = ? AND emoji = ? AND user_id = ?",
        )
        .bind(message_id)
        .bind(emoji)
        .bind(user_id)
        .execute(&self.connection_pool)
        .await?;

        if removed.rows_affected() > 0 {
            return Ok(ReactionToggle::Removed);
        }

        sqlx::query(
            "INSERT OR IGNORE INTO message_reactions (message_id, emoji, user_id) VALUES (?, ?, ?)",
        )
        .bind(message_id)
        .bind(emoji)
        .bind(user_id)
        .execute(&self.connection_pool)
        .await?;

        Ok(ReactionToggle::Added)
    }

    /// Tutte le reazioni di un messaggio, in ordine di inserimento
    pub async fn reactions_of(&self, message_id: &i32) -> Result<Vec<Reaction>, Error> {
        sqlx::query_as::<_, Reaction>(
            "SELECT message_id, emoji, user_id FROM message_reactions WHERE message_id = ? ORDER BY reaction_id",
        )
        .bind(message_id)
        .fetch_all(&self.connection_pool)
        .await
    }

    /// Reazioni di più messaggi in una sola query (per le pagine di storico)
    pub async fn reactions_of_many(&self, message_ids: &[i32]) -> Result<Vec<Reaction>, Error> {
        if message_ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; message_ids.len()].join(", ");
        let sql = format!(
            "SELECT message_id, emoji, user_id FROM message_reactions \
             WHERE message_id IN ({placeholders}) ORDER BY reaction_id"
        );

        let mut query = sqlx::query_as::<_, Reaction>(&sql);
        for id in message_ids {
            query = query.bind(id);
        }
        query.fetch_all(&self.connection_pool).await
    }
}

impl Create<Message, CreateMessageDTO> for MessageRepository {
    /// Inserisce il messaggio e aggiorna il puntatore all'ultimo messaggio della stanza
    /// (per le conversazioni anche `last_activity` e la riattivazione) in un'unica transazione.
    async fn create(&self, data: &CreateMessageDTO) -> Result<Message, Error> {
        let (channel_id, thread_id) = match data.owner {
            MessageOwner::Channel(id) => (Some(id), None),
            MessageOwner::Thread(id) => (None, Some(id)),
        };

        let mut tx = self.connection_pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO messages (channel_id, thread_id, sender_id, content, reply_to, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(channel_id)
        .bind(thread_id)
        .bind(data.sender_id)
        .bind(&data.content)
        .bind(data.reply_to)
        .bind(data.created_at)
        .execute(&mut *tx)
        .await?;

        let new_id = result.last_insert_rowid() as i32;

        let pointer = match data.owner {
            MessageOwner::Channel(id) => {
                sqlx::query("UPDATE channels SET last_message_id = ? WHERE channel_id = ?")
                    .bind(new_id)
                    .bind(id)
            }
            MessageOwner::Thread(id) => sqlx::query(
                r#"
                UPDATE direct_message_threads
                SET last_message_id = ?, last_activity = ?, is_active = 1
                WHERE thread_id = ?
                "#,
            )
            .bind(new_id)
            .bind(data.created_at)
            .bind(id),
        };
        // un errore qui fa rollback anche dell'insert (drop della transazione)
        pointer.execute(&mut *tx).await?;

        tx.commit().await?;

        Ok(Message {
            message_id: new_id,
            channel_id,
            thread_id,
            sender_id: data.sender_id,
            content: data.content.clone(),
            reply_to: data.reply_to,
            edited: false,
            edited_at: None,
            deleted: false,
            deleted_at: None,
            created_at: data.created_at,
        })
    }
}

impl Read<Message, i32> for MessageRepository {
    async fn read(&self, id: &i32) -> Result<Option<Message>, Error> {
        sqlx::query_as::<_, Message>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE message_id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.connection_pool)
        .await
    }
}

impl Update<Message, UpdateMessageDTO, i32> for MessageRepository {
    async fn update(&self, id: &i32, data: &UpdateMessageDTO) -> Result<Message, Error> {
        let result = sqlx::query(
            "UPDATE messages SET content = ?, edited = 1, edited_at = ? WHERE message_id = ?",
        )
        .bind(&data.content)
        .bind(data.edited_at)
        .bind(id)
        .execute(&self.connection_pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::RowNotFound);
        }

        self.read(id).await?.ok_or(Error::RowNotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[sqlx::test(fixtures(
        path = "../../fixtures",
        scripts("users", "servers", "direct_messages", "messages")
    ))]
    async fn test_create_then_page(pool: SqlitePool) -> sqlx::Result<()> {
        let repo = MessageRepository::new(pool);
        let created = repo
            .create(&CreateMessageDTO {
                owner: MessageOwner::Channel(1),
                sender_id: 3,
                content: "hello there".to_string(),
                reply_to: Some(2),
                created_at: Utc::now(),
            })
            .await?;
        assert_eq!(created.message_id, 5);

        let last: Option<i32> = sqlx::query_scalar("SELECT last_message_id FROM channels WHERE channel_id = 1")
            .fetch_one(&repo.connection_pool)
            .await?;
        assert_eq!(last, Some(5));

        let page = repo.find_page(MessageOwner::Channel(1), None, 50).await?;
        let ids: Vec<i32> = page.iter().map(|m| m.message_id).collect();
        assert_eq!(ids, vec![1, 2, 5]);
        assert_eq!(page[2].reply_to, Some(2));

        let older = repo.find_page(MessageOwner::Channel(1), Some(5), 1).await?;
        assert_eq!(older.len(), 1);
        assert_eq!(older[0].message_id, 2);
        Ok(())
    }

    #[sqlx::test(fixtures(
        path = "../../fixtures",
        scripts("users", "servers", "direct_messages", "messages")
    ))]
    async fn test_soft_delete_hides_from_history(pool: SqlitePool) -> sqlx::Result<()> {
        let repo = MessageRepository::new(pool);
        let deleted = repo.soft_delete(&1, Utc::now()).await?;
        assert!(deleted.deleted);
        assert_eq!(deleted.content, DELETED_PLACEHOLDER);

        let page = repo.find_page(MessageOwner::Channel(1), None, 50).await?;
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].message_id, 2);
        Ok(())
    }

    #[sqlx::test(fixtures(
        path = "../../fixtures",
        scripts("users", "servers", "direct_messages", "messages")
    ))]
    async fn test_toggle_reaction_parity(pool: SqlitePool) -> sqlx::Result<()> {
        let repo = MessageRepository::new(pool);

        // bob aveva già messo 👍 sul messaggio 1
        assert_eq!(repo.toggle_reaction(&1, "👍", &2).await?, ReactionToggle::Removed);
        assert!(repo.reactions_of(&1).await?.is_empty());

        assert_eq!(repo.toggle_reaction(&1, "👍", &2).await?, ReactionToggle::Added);
        assert_eq!(repo.toggle_reaction(&1, "👍", &3).await?, ReactionToggle::Added);
        assert_eq!(repo.reactions_of(&1).await?.len(), 2);

        let many = repo.reactions_of_many(&[1, 2, 4]).await?;
        assert_eq!(many.len(), 2);
        Ok(())
    }

    #[sqlx::test(fixtures(
        path = "../../fixtures",
        scripts("users", "servers", "direct_messages", "messages")
    ))]
    async fn test_update_marks_edited(pool: SqlitePool) -> sqlx::Result<()> {
        let repo = MessageRepository::new(pool);
        let updated = repo
            .update(
                &4,
                &UpdateMessageDTO {
                    content: "second thought".to_string(),
                    edited_at: Utc::now(),
                },
            )
            .await?;
        assert!(updated.edited);
        assert!(updated.edited_at.is_some());
        assert_eq!(updated.content, "second thought");

        let missing = repo
            .update(
                &99,
                &UpdateMessageDTO {
                    content: "x".to_string(),
                    edited_at: Utc::now(),
                },
            )
            .await;
        assert!(matches!(missing, Err(Error::RowNotFound)));
        Ok(())
    }

    #[sqlx::test(fixtures(
        path = "../../fixtures",
        scripts("users", "servers", "direct_messages", "messages")
    ))]
    async fn test_create_rolls_back_when_pointer_fails(pool: SqlitePool) -> sqlx::Result<()> {
        let repo = MessageRepository::new(pool);
        sqlx::query(
            "CREATE TRIGGER reject_pointer BEFORE UPDATE ON direct_message_threads \
             BEGIN SELECT RAISE(ABORT, 'pointer update rejected'); END",
        )
        .execute(&repo.connection_pool)
        .await?;

        let result = repo
            .create(&CreateMessageDTO {
                owner: MessageOwner::Thread(1),
                sender_id: 1,
                content: "lost".to_string(),
                reply_to: None,
                created_at: Utc::now(),
            })
            .await;
        assert!(matches!(result, Err(Error::Database(_))));

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages")
            .fetch_one(&repo.connection_pool)
            .await?;
        assert_eq!(count, 4);
        Ok(())
    }
}
