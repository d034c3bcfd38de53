//! # Ledger Entry Repository
//!
//! Database operations for ledger entries (produce / deliver events).
//!
//! Reads are public; every write is crate-internal and runs inside a ledger
//! commit transaction, because an entry row must never change without the
//! matching product quantity changing in the same transaction.

use std::collections::HashMap;

use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use stockbook_core::{EntryFilter, LedgerEntry, ProductTotals};

const ENTRY_COLUMNS: &str = "id, owner_id, product_id, kind, quantity, unit, quantity_in_pieces, \
     entry_date, note, challan_id, created_at, updated_at, version";

/// Hard cap on list results when the filter sets no limit.
const DEFAULT_LIST_LIMIT: u32 = 500;

/// Repository for ledger entry reads.
#[derive(Debug, Clone)]
pub struct EntryRepository {
    pool: SqlitePool,
}

impl EntryRepository {
    /// Creates a new EntryRepository.
    pub fn new(pool: SqlitePool) -> Self {
        EntryRepository { pool }
    }

    /// Gets an entry by ID, scoped to an owner.
    pub async fn get_by_id(&self, owner_id: &str, id: &str) -> DbResult<Option<LedgerEntry>> {
        let mut conn = self.pool.acquire().await?;
        fetch(&mut conn, owner_id, id).await
    }

    /// Lists entries matching `filter`, newest date first.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let deliveries = db.entries().list(&owner_id, &EntryFilter {
    ///     product_id: Some(pipe_id),
    ///     kind: Some(EntryKind::Deliver),
    ///     ..Default::default()
    /// }).await?;
    /// ```
    pub async fn list(&self, owner_id: &str, filter: &EntryFilter) -> DbResult<Vec<LedgerEntry>> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {ENTRY_COLUMNS} FROM ledger_entries WHERE owner_id = "
        ));
        query.push_bind(owner_id);

        if let Some(product_id) = &filter.product_id {
            query.push(" AND product_id = ").push_bind(product_id);
        }
        if let Some(kind) = filter.kind {
            query.push(" AND kind = ").push_bind(kind);
        }
        if let Some(challan_id) = &filter.challan_id {
            query.push(" AND challan_id = ").push_bind(challan_id);
        }
        if let Some(from) = filter.from {
            query.push(" AND entry_date >= ").push_bind(from);
        }
        if let Some(to) = filter.to {
            query.push(" AND entry_date <= ").push_bind(to);
        }

        query
            .push(" ORDER BY entry_date DESC, created_at DESC LIMIT ")
            .push_bind(i64::from(filter.limit.unwrap_or(DEFAULT_LIST_LIMIT)));

        let entries = query
            .build_query_as::<LedgerEntry>()
            .fetch_all(&self.pool)
            .await?;

        debug!(count = entries.len(), "Listed entries");
        Ok(entries)
    }

    /// Entries generated by one challan.
    pub async fn list_for_challan(&self, challan_id: &str) -> DbResult<Vec<LedgerEntry>> {
        let entries = sqlx::query_as::<_, LedgerEntry>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM ledger_entries WHERE challan_id = ?1 ORDER BY created_at"
        ))
        .bind(challan_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Stored piece totals for one product.
    ///
    /// Uses `quantity_in_pieces` as frozen at entry time; nothing is reconverted.
    pub async fn totals_for_product(&self, product_id: &str) -> DbResult<ProductTotals> {
        let mut conn = self.pool.acquire().await?;
        fetch_totals(&mut conn, product_id).await
    }

    /// Stored piece totals for every product of an owner that has entries.
    pub async fn totals_by_product(&self, owner_id: &str) -> DbResult<HashMap<String, ProductTotals>> {
        let rows: Vec<(String, f64, f64, i64)> = sqlx::query_as(
            r#"
            SELECT
                product_id,
                TOTAL(CASE WHEN kind = 'produce' THEN quantity_in_pieces END),
                TOTAL(CASE WHEN kind = 'deliver' THEN quantity_in_pieces END),
                COUNT(*)
            FROM ledger_entries
            WHERE owner_id = ?1
            GROUP BY product_id
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(product_id, produced_pieces, delivered_pieces, entry_count)| {
                (
                    product_id,
                    ProductTotals {
                        produced_pieces,
                        delivered_pieces,
                        entry_count,
                    },
                )
            })
            .collect())
    }

    /// Entries whose product row no longer exists.
    ///
    /// Foreign keys prevent this in normal operation; it can still happen in
    /// databases written with `foreign_keys` off or restored from old backups.
    pub async fn orphaned(&self, owner_id: &str) -> DbResult<Vec<LedgerEntry>> {
        let entries = sqlx::query_as::<_, LedgerEntry>(
            r#"
            SELECT
                e.id, e.owner_id, e.product_id, e.kind, e.quantity, e.unit,
                e.quantity_in_pieces, e.entry_date, e.note, e.challan_id,
                e.created_at, e.updated_at, e.version
            FROM ledger_entries e
            LEFT JOIN products p ON p.id = e.product_id
            WHERE e.owner_id = ?1 AND p.id IS NULL
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Counts an owner's entries.
    pub async fn count(&self, owner_id: &str) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM ledger_entries WHERE owner_id = ?1")
                .bind(owner_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }
}

/// Reads an entry on `conn`, so a ledger write sees it under its own lock.
pub(crate) async fn fetch(
    conn: &mut SqliteConnection,
    owner_id: &str,
    id: &str,
) -> DbResult<Option<LedgerEntry>> {
    let entry = sqlx::query_as::<_, LedgerEntry>(&format!(
        "SELECT {ENTRY_COLUMNS} FROM ledger_entries WHERE id = ?1 AND owner_id = ?2"
    ))
    .bind(id)
    .bind(owner_id)
    .fetch_optional(conn)
    .await?;

    Ok(entry)
}

pub(crate) async fn fetch_totals(
    conn: &mut SqliteConnection,
    product_id: &str,
) -> DbResult<ProductTotals> {
    let (produced_pieces, delivered_pieces, entry_count): (f64, f64, i64) = sqlx::query_as(
        r#"
        SELECT
            TOTAL(CASE WHEN kind = 'produce' THEN quantity_in_pieces END),
            TOTAL(CASE WHEN kind = 'deliver' THEN quantity_in_pieces END),
            COUNT(*)
        FROM ledger_entries
        WHERE product_id = ?1
        "#,
    )
    .bind(product_id)
    .fetch_one(conn)
    .await?;

    Ok(ProductTotals {
        produced_pieces,
        delivered_pieces,
        entry_count,
    })
}

// =============================================================================
// Transactional Writes (ledger commit phase)
// =============================================================================

pub(crate) async fn insert(conn: &mut SqliteConnection, entry: &LedgerEntry) -> DbResult<()> {
    debug!(id = %entry.id, product_id = %entry.product_id, kind = %entry.kind, "Inserting entry");

    sqlx::query(
        r#"
        INSERT INTO ledger_entries (
            id, owner_id, product_id, kind,
            quantity, unit, quantity_in_pieces,
            entry_date, note, challan_id,
            created_at, updated_at, version
        ) VALUES (
            ?1, ?2, ?3, ?4,
            ?5, ?6, ?7,
            ?8, ?9, ?10,
            ?11, ?12, ?13
        )
        "#,
    )
    .bind(&entry.id)
    .bind(&entry.owner_id)
    .bind(&entry.product_id)
    .bind(entry.kind)
    .bind(entry.quantity)
    .bind(entry.unit)
    .bind(entry.quantity_in_pieces)
    .bind(entry.entry_date)
    .bind(&entry.note)
    .bind(&entry.challan_id)
    .bind(entry.created_at)
    .bind(entry.updated_at)
    .bind(entry.version)
    .execute(conn)
    .await?;

    Ok(())
}

/// Rewrites an entry in place if it still has `expected_version`.
pub(crate) async fn update(
    conn: &mut SqliteConnection,
    entry: &LedgerEntry,
    expected_version: i64,
) -> DbResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE ledger_entries SET
            product_id = ?1,
            kind = ?2,
            quantity = ?3,
            unit = ?4,
            quantity_in_pieces = ?5,
            entry_date = ?6,
            note = ?7,
            updated_at = ?8,
            version = version + 1
        WHERE id = ?9 AND owner_id = ?10 AND version = ?11
        "#,
    )
    .bind(&entry.product_id)
    .bind(entry.kind)
    .bind(entry.quantity)
    .bind(entry.unit)
    .bind(entry.quantity_in_pieces)
    .bind(entry.entry_date)
    .bind(&entry.note)
    .bind(entry.updated_at)
    .bind(&entry.id)
    .bind(&entry.owner_id)
    .bind(expected_version)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Deletes a standalone entry if it still has `expected_version`.
pub(crate) async fn delete(
    conn: &mut SqliteConnection,
    owner_id: &str,
    id: &str,
    expected_version: i64,
) -> DbResult<bool> {
    let result = sqlx::query(
        "DELETE FROM ledger_entries WHERE id = ?1 AND owner_id = ?2 AND version = ?3",
    )
    .bind(id)
    .bind(owner_id)
    .bind(expected_version)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Deletes every entry a challan generated. Returns the number removed.
pub(crate) async fn delete_for_challan(
    conn: &mut SqliteConnection,
    challan_id: &str,
) -> DbResult<u64> {
    let result = sqlx::query("DELETE FROM ledger_entries WHERE challan_id = ?1")
        .bind(challan_id)
        .execute(conn)
        .await?;

    Ok(result.rows_affected())
}
