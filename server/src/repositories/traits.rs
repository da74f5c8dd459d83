//! Repository traits - Interfacce comuni dei repository
//!
//! Messaggi, canali, server e conversazioni non vengono mai cancellati fisicamente:
//! l'eliminazione di un messaggio è un `Update` (soft delete), quindi non esiste `Delete`.

/// Inserimento di una nuova riga.
///
/// `CreateDTO` non porta l'id: lo assegna SQLite (`last_insert_rowid`).
pub trait Create<Entity, CreateDTO> {
    async fn create(&self, data: &CreateDTO) -> Result<Entity, sqlx::Error>;
}

/// Lettura per chiave primaria, `Ok(None)` se la riga non esiste
pub trait Read<Entity, Id> {
    async fn read(&self, id: &Id) -> Result<Option<Entity>, sqlx::Error>;
}

/// Aggiornamento dei soli campi modificabili.
///
/// # Returns
/// L'entità aggiornata, `sqlx::Error::RowNotFound` se nessuna riga corrisponde
pub trait Update<Entity, UpdateDTO, Id> {
    async fn update(&self, id: &Id, data: &UpdateDTO) -> Result<Entity, sqlx::Error>;
}
