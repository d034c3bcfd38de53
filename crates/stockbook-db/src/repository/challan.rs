//! # Challan Repository
//!
//! Database operations for challans, their items and the per-owner number
//! counter.
//!
//! ## Challan Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Challan Lifecycle                                 │
//! │                                                                         │
//! │  1. SAVE (one transaction)                                             │
//! │     └── next_sequence() → 7 → "0007"                                   │
//! │     └── insert() challan header                                        │
//! │     └── N × entry::insert() (kind = deliver, challan_id = this)        │
//! │     └── N × insert_item() (entry_id, frozen pieces, ratio snapshot)    │
//! │                                                                         │
//! │  2. EDIT (one transaction)                                             │
//! │     └── update_header() guarded by version                             │
//! │     └── delete_items() + entry::delete_for_challan()                   │
//! │     └── N' × entry::insert() + insert_item()                           │
//! │                                                                         │
//! │  3. DELETE (one transaction)                                           │
//! │     └── delete_items() → entry::delete_for_challan() → delete()        │
//! │                                                                         │
//! │  Product quantities move in the same transaction (ledger commit).      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::DbResult;
use stockbook_core::{Challan, ChallanItem, EntryKind};

const CHALLAN_COLUMNS: &str = "id, owner_id, sequence_number, challan_number, customer_id, \
     challan_date, address, transport, notes, total_pieces, item_count, \
     created_at, updated_at, version";

const ITEM_COLUMNS: &str = "id, challan_id, position, product_id, entry_id, quantity, unit, \
     quantity_in_pieces, packets_per_linear, pieces_per_packet";

/// A challan line joined with the entry it generated, for the consistency audit.
///
/// The `entry_*` columns are `NULL` when the entry is missing.
#[derive(Debug, Clone, FromRow)]
pub struct ItemEntryLink {
    pub challan_id: String,
    pub item_id: String,
    pub entry_id: String,
    pub item_product_id: String,
    pub item_pieces: f64,
    pub entry_product_id: Option<String>,
    pub entry_pieces: Option<f64>,
    pub entry_kind: Option<EntryKind>,
    pub entry_challan_id: Option<String>,
}

/// Repository for challan reads.
#[derive(Debug, Clone)]
pub struct ChallanRepository {
    pool: SqlitePool,
}

impl ChallanRepository {
    /// Creates a new ChallanRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ChallanRepository { pool }
    }

    /// Gets a challan header by ID.
    pub async fn get_by_id(&self, owner_id: &str, id: &str) -> DbResult<Option<Challan>> {
        let mut conn = self.pool.acquire().await?;
        fetch(&mut conn, owner_id, id).await
    }

    /// Gets a challan header by its numeric sequence.
    pub async fn get_by_sequence(&self, owner_id: &str, sequence: i64) -> DbResult<Option<Challan>> {
        let challan = sqlx::query_as::<_, Challan>(&format!(
            "SELECT {CHALLAN_COLUMNS} FROM challans WHERE owner_id = ?1 AND sequence_number = ?2"
        ))
        .bind(owner_id)
        .bind(sequence)
        .fetch_optional(&self.pool)
        .await?;

        Ok(challan)
    }

    /// Items of a challan in document order.
    pub async fn items(&self, challan_id: &str) -> DbResult<Vec<ChallanItem>> {
        let mut conn = self.pool.acquire().await?;
        fetch_items(&mut conn, challan_id).await
    }

    /// Lists challans newest first, optionally for one customer.
    pub async fn list(
        &self,
        owner_id: &str,
        customer_id: Option<&str>,
        limit: u32,
    ) -> DbResult<Vec<Challan>> {
        let challans = sqlx::query_as::<_, Challan>(&format!(
            "SELECT {CHALLAN_COLUMNS} FROM challans \
             WHERE owner_id = ?1 AND (?2 IS NULL OR customer_id = ?2) \
             ORDER BY sequence_number DESC LIMIT ?3"
        ))
        .bind(owner_id)
        .bind(customer_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(challans)
    }

    /// Every challan header of an owner (for the audit).
    pub async fn list_all(&self, owner_id: &str) -> DbResult<Vec<Challan>> {
        let challans = sqlx::query_as::<_, Challan>(&format!(
            "SELECT {CHALLAN_COLUMNS} FROM challans WHERE owner_id = ?1 ORDER BY sequence_number"
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(challans)
    }

    /// Every item of an owner's challans joined with its generated entry.
    pub async fn item_entry_links(&self, owner_id: &str) -> DbResult<Vec<ItemEntryLink>> {
        let links = sqlx::query_as::<_, ItemEntryLink>(
            r#"
            SELECT
                ci.challan_id            AS challan_id,
                ci.id                    AS item_id,
                ci.entry_id              AS entry_id,
                ci.product_id            AS item_product_id,
                ci.quantity_in_pieces    AS item_pieces,
                e.product_id             AS entry_product_id,
                e.quantity_in_pieces     AS entry_pieces,
                e.kind                   AS entry_kind,
                e.challan_id             AS entry_challan_id
            FROM challan_items ci
            INNER JOIN challans c ON c.id = ci.challan_id
            LEFT JOIN ledger_entries e ON e.id = ci.entry_id
            WHERE c.owner_id = ?1
            ORDER BY c.sequence_number, ci.position
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(links)
    }

    /// Counts an owner's challans.
    pub async fn count(&self, owner_id: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM challans WHERE owner_id = ?1")
            .bind(owner_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Connection-level Reads
// =============================================================================

pub(crate) async fn fetch(
    conn: &mut SqliteConnection,
    owner_id: &str,
    id: &str,
) -> DbResult<Option<Challan>> {
    let challan = sqlx::query_as::<_, Challan>(&format!(
        "SELECT {CHALLAN_COLUMNS} FROM challans WHERE id = ?1 AND owner_id = ?2"
    ))
    .bind(id)
    .bind(owner_id)
    .fetch_optional(conn)
    .await?;

    Ok(challan)
}

pub(crate) async fn fetch_items(
    conn: &mut SqliteConnection,
    challan_id: &str,
) -> DbResult<Vec<ChallanItem>> {
    let items = sqlx::query_as::<_, ChallanItem>(&format!(
        "SELECT {ITEM_COLUMNS} FROM challan_items WHERE challan_id = ?1 ORDER BY position"
    ))
    .bind(challan_id)
    .fetch_all(conn)
    .await?;

    Ok(items)
}

// =============================================================================
// Transactional Writes (ledger commit phase)
// =============================================================================

/// Atomically allocates the next challan sequence for an owner.
///
/// ## How It Works
/// ```text
/// First save for an owner:  no counter row
///     → INSERT last_number = MAX(existing sequence) + 1  (1 on a fresh db)
/// Every later save:         counter row exists
///     → UPDATE last_number = last_number + 1
/// Both paths RETURN the new value in the same statement.
/// ```
///
/// Runs inside the save transaction, so a rolled-back save releases its number.
pub(crate) async fn next_sequence(conn: &mut SqliteConnection, owner_id: &str) -> DbResult<i64> {
    let sequence: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO challan_counters (owner_id, last_number)
        VALUES (
            ?1,
            COALESCE((SELECT MAX(sequence_number) FROM challans WHERE owner_id = ?1), 0) + 1
        )
        ON CONFLICT (owner_id) DO UPDATE SET last_number = last_number + 1
        RETURNING last_number
        "#,
    )
    .bind(owner_id)
    .fetch_one(conn)
    .await?;

    info!(owner_id = %owner_id, sequence, "Allocated challan sequence");
    Ok(sequence)
}

pub(crate) async fn insert(conn: &mut SqliteConnection, challan: &Challan) -> DbResult<()> {
    debug!(id = %challan.id, number = %challan.challan_number, "Inserting challan");

    sqlx::query(
        r#"
        INSERT INTO challans (
            id, owner_id, sequence_number, challan_number, customer_id,
            challan_date, address, transport, notes,
            total_pieces, item_count,
            created_at, updated_at, version
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5,
            ?6, ?7, ?8, ?9,
            ?10, ?11,
            ?12, ?13, ?14
        )
        "#,
    )
    .bind(&challan.id)
    .bind(&challan.owner_id)
    .bind(challan.sequence_number)
    .bind(&challan.challan_number)
    .bind(&challan.customer_id)
    .bind(challan.challan_date)
    .bind(&challan.address)
    .bind(&challan.transport)
    .bind(&challan.notes)
    .bind(challan.total_pieces)
    .bind(challan.item_count)
    .bind(challan.created_at)
    .bind(challan.updated_at)
    .bind(challan.version)
    .execute(conn)
    .await?;

    Ok(())
}

/// Rewrites header fields and totals if the challan still has `expected_version`.
pub(crate) async fn update_header(
    conn: &mut SqliteConnection,
    challan: &Challan,
    expected_version: i64,
) -> DbResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE challans SET
            customer_id = ?1,
            challan_date = ?2,
            address = ?3,
            transport = ?4,
            notes = ?5,
            total_pieces = ?6,
            item_count = ?7,
            updated_at = ?8,
            version = version + 1
        WHERE id = ?9 AND owner_id = ?10 AND version = ?11
        "#,
    )
    .bind(&challan.customer_id)
    .bind(challan.challan_date)
    .bind(&challan.address)
    .bind(&challan.transport)
    .bind(&challan.notes)
    .bind(challan.total_pieces)
    .bind(challan.item_count)
    .bind(challan.updated_at)
    .bind(&challan.id)
    .bind(&challan.owner_id)
    .bind(expected_version)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Deletes a challan header if it still has `expected_version`.
///
/// Items and member entries must already be gone.
pub(crate) async fn delete(
    conn: &mut SqliteConnection,
    owner_id: &str,
    id: &str,
    expected_version: i64,
) -> DbResult<bool> {
    let result =
        sqlx::query("DELETE FROM challans WHERE id = ?1 AND owner_id = ?2 AND version = ?3")
            .bind(id)
            .bind(owner_id)
            .bind(expected_version)
            .execute(conn)
            .await?;

    Ok(result.rows_affected() == 1)
}

pub(crate) async fn insert_item(conn: &mut SqliteConnection, item: &ChallanItem) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO challan_items (
            id, challan_id, position, product_id, entry_id,
            quantity, unit, quantity_in_pieces,
            packets_per_linear, pieces_per_packet
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5,
            ?6, ?7, ?8,
            ?9, ?10
        )
        "#,
    )
    .bind(&item.id)
    .bind(&item.challan_id)
    .bind(item.position)
    .bind(&item.product_id)
    .bind(&item.entry_id)
    .bind(item.quantity)
    .bind(item.unit)
    .bind(item.quantity_in_pieces)
    .bind(item.packets_per_linear)
    .bind(item.pieces_per_packet)
    .execute(conn)
    .await?;

    Ok(())
}

/// Deletes every item of a challan. Returns the number removed.
pub(crate) async fn delete_items(conn: &mut SqliteConnection, challan_id: &str) -> DbResult<u64> {
    let result = sqlx::query("DELETE FROM challan_items WHERE challan_id = ?1")
        .bind(challan_id)
        .execute(conn)
        .await?;

    Ok(result.rows_affected())
}
