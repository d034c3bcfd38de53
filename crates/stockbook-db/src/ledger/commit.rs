//! Version-guarded stock writes shared by every ledger operation.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::debug;

use stockbook_core::StockChange;

use crate::error::{DbError, DbResult};
use crate::repository::product;

/// Writes every planned quantity, failing with `Conflict` on the first
/// product whose version moved since planning.
///
/// Runs on a `BEGIN IMMEDIATE` transaction before any entry or challan row
/// is written.
pub(super) async fn apply_changes(
    conn: &mut SqliteConnection,
    owner_id: &str,
    changes: &[StockChange],
    now: DateTime<Utc>,
) -> DbResult<()> {
    for change in changes {
        if !product::apply_change(conn, owner_id, change, now).await? {
            return Err(DbError::conflict("Product", &change.product_id));
        }
        debug!(
            product_id = %change.product_id,
            version = change.expected_version + 1,
            before = change.before,
            after = change.after,
            delta = change.delta(),
            "Stock updated"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::fixtures;
    use stockbook_core::DEFAULT_OWNER_ID;

    #[tokio::test]
    async fn test_stale_version_is_a_conflict() {
        let (db, ledger) = fixtures::ledger().await;
        let product = fixtures::product(&ledger, "Pipe", 100.0).await;

        let change = StockChange {
            product_id: product.id.clone(),
            expected_version: product.version,
            before: 100.0,
            after: 90.0,
        };

        let mut tx = db.pool().begin().await.unwrap();
        apply_changes(&mut tx, DEFAULT_OWNER_ID, &[change.clone()], Utc::now())
            .await
            .unwrap();
        tx.commit().await.unwrap();

        // Same plan again: the version has moved on.
        let mut tx = db.pool().begin().await.unwrap();
        let err = apply_changes(&mut tx, DEFAULT_OWNER_ID, &[change], Utc::now())
            .await
            .unwrap_err();
        assert!(err.is_conflict());
        tx.rollback().await.unwrap();

        assert_eq!(fixtures::quantity(&ledger, &product.id).await, 90.0);
    }

    #[tokio::test]
    async fn test_other_owner_cannot_write() {
        let (db, ledger) = fixtures::ledger().await;
        let product = fixtures::product(&ledger, "Pipe", 100.0).await;

        let change = StockChange {
            product_id: product.id.clone(),
            expected_version: product.version,
            before: 100.0,
            after: 0.0,
        };

        let mut tx = db.pool().begin().await.unwrap();
        let err = apply_changes(&mut tx, "someone-else", &[change], Utc::now())
            .await
            .unwrap_err();
        assert!(err.is_conflict());
    }
}
