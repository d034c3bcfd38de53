//! # Party Repository
//!
//! Minimal customer directory. The ledger only needs to know that a
//! challan's customer exists; managing parties belongs to the caller.

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use stockbook_core::Party;

/// Repository for party database operations.
#[derive(Debug, Clone)]
pub struct PartyRepository {
    pool: SqlitePool,
}

impl PartyRepository {
    /// Creates a new PartyRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PartyRepository { pool }
    }

    /// Inserts a new party.
    pub async fn insert(&self, party: &Party) -> DbResult<()> {
        debug!(id = %party.id, name = %party.name, "Inserting party");

        sqlx::query(
            "INSERT INTO parties (id, owner_id, name, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&party.id)
        .bind(&party.owner_id)
        .bind(&party.name)
        .bind(party.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets a party by ID.
    pub async fn get_by_id(&self, owner_id: &str, id: &str) -> DbResult<Option<Party>> {
        let party = sqlx::query_as::<_, Party>(
            "SELECT id, owner_id, name, created_at FROM parties WHERE id = ?1 AND owner_id = ?2",
        )
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(party)
    }

    /// Returns true if the party exists for this owner.
    pub async fn exists(&self, owner_id: &str, id: &str) -> DbResult<bool> {
        let found: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM parties WHERE id = ?1 AND owner_id = ?2)",
        )
        .bind(id)
        .bind(owner_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(found != 0)
    }

    /// Lists an owner's parties by name.
    pub async fn list(&self, owner_id: &str) -> DbResult<Vec<Party>> {
        let parties = sqlx::query_as::<_, Party>(
            "SELECT id, owner_id, name, created_at FROM parties \
             WHERE owner_id = ?1 ORDER BY name COLLATE NOCASE",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(parties)
    }
}
