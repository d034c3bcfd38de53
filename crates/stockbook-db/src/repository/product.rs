//! # Product Repository
//!
//! Database operations for products.
//!
//! ## Key Operations
//! - Owner-scoped lookups (single and batched)
//! - Insert and detail edits
//! - Version-conditioned stock writes (crate-internal, used by the ledger)
//!
//! ## Conditional Stock Writes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Stock Update Strategy                                │
//! │                                                                         │
//! │  ❌ WRONG: read-modify-write without a guard                           │
//! │     SELECT quantity → 100                                              │
//! │     UPDATE products SET quantity = 70 WHERE id = ?                     │
//! │     (a concurrent delivery also read 100 → oversold)                  │
//! │                                                                         │
//! │  ✅ CORRECT: absolute value guarded by the version that was read       │
//! │     UPDATE products SET quantity = 70, version = version + 1           │
//! │     WHERE id = ? AND owner_id = ? AND version = 3                      │
//! │     rows_affected == 0 → someone else got there first → re-plan       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use stockbook_core::{Product, ProductDetails, StockChange};

const PRODUCT_COLUMNS: &str = "id, owner_id, name, size, quantity, previous_stock, \
     packets_per_linear, pieces_per_packet, created_at, updated_at, version";

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.products();
///
/// let product = repo.get_by_id(&owner_id, "uuid-here").await?;
/// let all = repo.list(&owner_id).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets a product by its ID.
    ///
    /// ## Returns
    /// * `Ok(Some(Product))` - Product found for this owner
    /// * `Ok(None)` - Product not found (or owned by someone else)
    pub async fn get_by_id(&self, owner_id: &str, id: &str) -> DbResult<Option<Product>> {
        let mut conn = self.pool.acquire().await?;
        fetch(&mut conn, owner_id, id).await
    }

    /// Loads several products at once, keyed by id.
    ///
    /// Ids that don't exist for this owner are simply absent from the map.
    pub async fn get_many(
        &self,
        owner_id: &str,
        ids: &[String],
    ) -> DbResult<HashMap<String, Product>> {
        let mut conn = self.pool.acquire().await?;
        fetch_many(&mut conn, owner_id, ids).await
    }

    /// Lists an owner's products by name, then size.
    pub async fn list(&self, owner_id: &str) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE owner_id = ?1 \
             ORDER BY name COLLATE NOCASE, size"
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Inserts a new product.
    ///
    /// ## Arguments
    /// * `product` - Product to insert (id should be generated beforehand)
    pub async fn insert(&self, product: &Product) -> DbResult<()> {
        debug!(id = %product.id, name = %product.name, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, owner_id, name, size,
                quantity, previous_stock,
                packets_per_linear, pieces_per_packet,
                created_at, updated_at, version
            ) VALUES (
                ?1, ?2, ?3, ?4,
                ?5, ?6,
                ?7, ?8,
                ?9, ?10, ?11
            )
            "#,
        )
        .bind(&product.id)
        .bind(&product.owner_id)
        .bind(&product.name)
        .bind(&product.size)
        .bind(product.quantity)
        .bind(product.previous_stock)
        .bind(product.packets_per_linear)
        .bind(product.pieces_per_packet)
        .bind(product.created_at)
        .bind(product.updated_at)
        .bind(product.version)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Updates name, size and ratios. Stock columns are untouched.
    ///
    /// ## Returns
    /// * `Ok(true)` - Updated
    /// * `Ok(false)` - Version moved since the product was read
    pub async fn update_details(
        &self,
        owner_id: &str,
        id: &str,
        details: &ProductDetails,
        expected_version: i64,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        debug!(id = %id, expected_version, "Updating product details");

        let result = sqlx::query(
            r#"
            UPDATE products SET
                name = ?1,
                size = ?2,
                packets_per_linear = ?3,
                pieces_per_packet = ?4,
                updated_at = ?5,
                version = version + 1
            WHERE id = ?6 AND owner_id = ?7 AND version = ?8
            "#,
        )
        .bind(details.name.trim())
        .bind(details.size.as_deref().map(str::trim))
        .bind(details.ratios.packets_per_linear)
        .bind(details.ratios.pieces_per_packet)
        .bind(now)
        .bind(id)
        .bind(owner_id)
        .bind(expected_version)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Deletes a product.
    ///
    /// Entries and challan items reference products with `ON DELETE RESTRICT`,
    /// so this fails with a foreign key violation if any still exist.
    pub async fn delete(&self, owner_id: &str, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting product");

        let result = sqlx::query("DELETE FROM products WHERE id = ?1 AND owner_id = ?2")
            .bind(id)
            .bind(owner_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Counts ledger entries and challan lines that reference a product.
    pub async fn reference_count(&self, id: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT
                (SELECT COUNT(*) FROM ledger_entries WHERE product_id = ?1) +
                (SELECT COUNT(*) FROM challan_items WHERE product_id = ?1)
            "#,
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Counts an owner's products (for diagnostics).
    pub async fn count(&self, owner_id: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE owner_id = ?1")
            .bind(owner_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Connection-level Reads (ledger plan phase, inside the write transaction)
// =============================================================================

pub(crate) async fn fetch(
    conn: &mut SqliteConnection,
    owner_id: &str,
    id: &str,
) -> DbResult<Option<Product>> {
    let product = sqlx::query_as::<_, Product>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1 AND owner_id = ?2"
    ))
    .bind(id)
    .bind(owner_id)
    .fetch_optional(conn)
    .await?;

    Ok(product)
}

pub(crate) async fn fetch_many(
    conn: &mut SqliteConnection,
    owner_id: &str,
    ids: &[String],
) -> DbResult<HashMap<String, Product>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE owner_id = "
    ));
    query.push_bind(owner_id).push(" AND id IN (");
    let mut separated = query.separated(", ");
    for id in ids {
        separated.push_bind(id);
    }
    separated.push_unseparated(")");

    let products = query.build_query_as::<Product>().fetch_all(conn).await?;

    debug!(requested = ids.len(), found = products.len(), "Loaded products");
    Ok(products.into_iter().map(|p| (p.id.clone(), p)).collect())
}

// =============================================================================
// Transactional Writes (ledger commit phase)
// =============================================================================

/// Writes a planned quantity if the product still has the version it was planned against.
///
/// Returns `false` when the guard fails; the caller rolls back and re-plans.
pub(crate) async fn apply_change(
    conn: &mut SqliteConnection,
    owner_id: &str,
    change: &StockChange,
    now: DateTime<Utc>,
) -> DbResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE products SET
            quantity = ?1,
            updated_at = ?2,
            version = version + 1
        WHERE id = ?3 AND owner_id = ?4 AND version = ?5
        "#,
    )
    .bind(change.after)
    .bind(now)
    .bind(&change.product_id)
    .bind(owner_id)
    .bind(change.expected_version)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Writes a new baseline together with its shifted quantity, guarded by version.
pub(crate) async fn apply_baseline(
    conn: &mut SqliteConnection,
    owner_id: &str,
    change: &StockChange,
    previous_stock: f64,
    now: DateTime<Utc>,
) -> DbResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE products SET
            previous_stock = ?1,
            quantity = ?2,
            updated_at = ?3,
            version = version + 1
        WHERE id = ?4 AND owner_id = ?5 AND version = ?6
        "#,
    )
    .bind(previous_stock)
    .bind(change.after)
    .bind(now)
    .bind(&change.product_id)
    .bind(owner_id)
    .bind(change.expected_version)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Helper to generate a new product ID.
pub fn generate_product_id() -> String {
    Uuid::new_v4().to_string()
}
