//! # Ledger Service
//!
//! The only way stock moves. Wraps the pure planning in `stockbook-core`
//! with reads, a single write transaction, and optimistic retry.
//!
//! ## Lock → Plan → Commit
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    One Ledger Operation                                 │
//! │                                                                         │
//! │  1. LOCK   BEGIN IMMEDIATE (SQLite write lock, waits busy_timeout)     │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  2. READ (same transaction)                                            │
//! │     entry / challan + items + products, each with its `version`        │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  3. PLAN (stockbook-core, pure)                                        │
//! │     convert → validate every line → StockChange { before, after }      │
//! │     any CoreError here → ROLLBACK, returned to caller                  │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  4. WRITE + COMMIT                                                     │
//! │     UPDATE products SET quantity = after WHERE version = expected      │
//! │     + entry / challan / item rows                                      │
//! │           │                                                             │
//! │           ├── all guards hold → COMMIT ✓                               │
//! │           │                                                             │
//! │           └── a guard matched 0 rows, or the lock wait timed out       │
//! │               → ROLLBACK → back off (jittered) → back to 1             │
//! │               (at most `max_conflict_retries` times, then Conflict)    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Holding the write lock from the first read to the commit serializes
//! writers on one database, across every pooled connection and process.
//! The version guards stay as a second line: a plan that somehow read stale
//! rows still cannot overwrite a newer quantity.
//!
//! Plan-phase reads go through the transaction's own connection. The
//! in-memory pool has a single connection, so reading from the pool while
//! a transaction is open would wait on itself.
//!
//! ## Modules
//! - `entries` - create / update / delete single entries
//! - `challans` - save / update / delete challans
//! - `products` - products, baselines, parties, conversions
//! - `audit` - consistency audit and explicit drift repair
//! - `commit` - version-guarded stock writes shared by all of the above

mod audit;
mod challans;
mod commit;
mod entries;
mod products;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use tracing::warn;
use uuid::Uuid;

use stockbook_core::{
    Clock, CoreError, LedgerEntry, Product, DEFAULT_CHALLAN_NUMBER_WIDTH,
};

use crate::error::DbResult;
use crate::pool::DEFAULT_CONFLICT_RETRIES;
use crate::repository::challan::ChallanRepository;
use crate::repository::entry::{self as entry_repo, EntryRepository};
use crate::repository::party::PartyRepository;
use crate::repository::product::{self as product_repo, ProductRepository};

/// First backoff step after a lost race; doubles per retry up to 32×.
const CONFLICT_BACKOFF_MS: u64 = 5;

/// Tunables for ledger operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerSettings {
    /// Re-plans allowed after a lost optimistic write.
    pub max_conflict_retries: u32,
    /// Zero-padding width of challan numbers.
    pub challan_number_width: usize,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        LedgerSettings {
            max_conflict_retries: DEFAULT_CONFLICT_RETRIES,
            challan_number_width: DEFAULT_CHALLAN_NUMBER_WIDTH,
        }
    }
}

/// Owner-scoped ledger operations.
///
/// ## Usage
/// ```rust,ignore
/// let ledger = db.ledger(&owner_id);
///
/// let produced = ledger.create_entry(NewEntry {
///     product_id: pipe.id.clone(),
///     kind: EntryKind::Produce,
///     quantity: 5.0,
///     unit: Unit::Linear,
///     date: None,
///     note: None,
/// }).await?;
///
/// let doc = ledger.save_challan(&customer_id, ChallanHeader::default(), &items).await?;
/// ```
#[derive(Debug, Clone)]
pub struct LedgerService {
    pool: SqlitePool,
    owner_id: String,
    clock: Arc<dyn Clock>,
    settings: LedgerSettings,
    products: ProductRepository,
    entries: EntryRepository,
    challans: ChallanRepository,
    parties: PartyRepository,
}

impl LedgerService {
    pub(crate) fn new(
        pool: SqlitePool,
        owner_id: String,
        clock: Arc<dyn Clock>,
        settings: LedgerSettings,
    ) -> Self {
        LedgerService {
            products: ProductRepository::new(pool.clone()),
            entries: EntryRepository::new(pool.clone()),
            challans: ChallanRepository::new(pool.clone()),
            parties: PartyRepository::new(pool.clone()),
            pool,
            owner_id,
            clock,
            settings,
        }
    }

    /// Owner every operation of this service is scoped to.
    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn settings(&self) -> LedgerSettings {
        self.settings
    }

    /// Runs `attempt` until it commits, fails for a non-conflict reason,
    /// or exhausts the retry budget. Sleeps a jittered, growing interval
    /// between attempts so contending writers spread out.
    async fn retrying<T, F, Fut>(&self, operation: &'static str, mut attempt: F) -> DbResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = DbResult<T>>,
    {
        let mut retries = 0;
        loop {
            match attempt().await {
                Err(err) if err.is_conflict() && retries < self.settings.max_conflict_retries => {
                    let delay = conflict_backoff(retries);
                    retries += 1;
                    warn!(
                        operation,
                        retry = retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Ledger write lost a race, re-planning"
                    );
                    tokio::time::sleep(delay).await;
                }
                result => return result,
            }
        }
    }

    /// Opens a transaction that holds SQLite's write lock from the start.
    async fn begin_write(&self) -> DbResult<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin_with("BEGIN IMMEDIATE").await?)
    }

    async fn require_product(&self, id: &str) -> DbResult<Product> {
        self.products
            .get_by_id(&self.owner_id, id)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(id.to_string()).into())
    }

    async fn require_entry(&self, id: &str) -> DbResult<LedgerEntry> {
        self.entries
            .get_by_id(&self.owner_id, id)
            .await?
            .ok_or_else(|| CoreError::EntryNotFound(id.to_string()).into())
    }

    /// [`require_product`](Self::require_product) on an open transaction.
    async fn locked_product(&self, conn: &mut SqliteConnection, id: &str) -> DbResult<Product> {
        product_repo::fetch(conn, &self.owner_id, id)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(id.to_string()).into())
    }

    async fn locked_entry(&self, conn: &mut SqliteConnection, id: &str) -> DbResult<LedgerEntry> {
        entry_repo::fetch(conn, &self.owner_id, id)
            .await?
            .ok_or_else(|| CoreError::EntryNotFound(id.to_string()).into())
    }
}

/// Backoff before retry number `retry + 1`: a doubling base plus up to the
/// same amount again of random jitter.
fn conflict_backoff(retry: u32) -> Duration {
    let base = CONFLICT_BACKOFF_MS << retry.min(5);
    let jitter = (Uuid::new_v4().as_u128() % u128::from(base)) as u64;
    Duration::from_millis(base + jitter)
}

// =============================================================================
// Test Fixtures
// =============================================================================

#[cfg(test)]
pub(crate) mod fixtures {
    use stockbook_core::{
        ConversionRatios, EntryKind, FixedClock, NewEntry, NewProduct, Party, Product, Unit,
        DEFAULT_OWNER_ID,
    };

    use super::LedgerService;
    use crate::{Database, DbConfig};

    /// Fresh in-memory database with a fixed clock (2026-03-15).
    pub(crate) async fn ledger() -> (Database, LedgerService) {
        let clock = FixedClock::on(2026, 3, 15).unwrap();
        let db = Database::new(DbConfig::in_memory())
            .await
            .unwrap()
            .with_clock(clock);
        let ledger = db.ledger(DEFAULT_OWNER_ID);
        (db, ledger)
    }

    /// Product with 2 packets per linear and 10 pieces per packet.
    pub(crate) async fn product(ledger: &LedgerService, name: &str, pieces: f64) -> Product {
        ledger
            .create_product(NewProduct {
                name: name.to_string(),
                size: None,
                ratios: ConversionRatios::new(2.0, 10.0),
                initial_stock: pieces,
                initial_unit: Unit::Piece,
            })
            .await
            .unwrap()
    }

    pub(crate) async fn customer(ledger: &LedgerService, name: &str) -> Party {
        ledger.create_party(name).await.unwrap()
    }

    pub(crate) fn new_entry(product_id: &str, kind: EntryKind, quantity: f64, unit: Unit) -> NewEntry {
        NewEntry {
            product_id: product_id.to_string(),
            kind,
            quantity,
            unit,
            date: None,
            note: None,
        }
    }

    pub(crate) async fn quantity(ledger: &LedgerService, product_id: &str) -> f64 {
        ledger.get_product(product_id).await.unwrap().quantity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_backoff_grows_and_stays_bounded() {
        for retry in 0..10 {
            let base = CONFLICT_BACKOFF_MS << retry.min(5);
            let delay = conflict_backoff(retry).as_millis() as u64;
            assert!(delay >= base && delay < base * 2, "retry {retry}: {delay}ms");
        }
        assert!(conflict_backoff(20) < Duration::from_millis(CONFLICT_BACKOFF_MS * 64));
    }
}
