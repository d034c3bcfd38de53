//! # Batch Delivery Engine
//!
//! Saves, edits and deletes challans. Every line of a challan owns exactly
//! one deliver entry; all lines move stock together or not at all.
//!
//! ## Save
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  save_challan(customer, header, [A × 2 pkt, B × 1 linear, A × 5 pcs])  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  plan: convert every line, check each product cumulatively             │
//! │        (A: 20 + 5 = 25 pieces against A's quantity)                    │
//! │       │  any line fails → error naming that product, nothing written  │
//! │       ▼                                                                 │
//! │  one transaction:                                                      │
//! │    products A, B  ← planned quantities (version-guarded)               │
//! │    challan_counters ← +1 → "0008"                                      │
//! │    challans       ← header, totals                                     │
//! │    ledger_entries ← 3 deliver rows with challan_id                     │
//! │    challan_items  ← 3 rows (entry_id, frozen pieces, ratio snapshot)   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Edit / Delete
//! An edit returns every original line to its product's pool, validates the
//! new lines against that pool, then replaces all member entries and items.
//! A delete returns every original line and removes entries, items and the
//! header. Original lines are returned with their stored piece counts.

use std::collections::{BTreeSet, HashMap};

use sqlx::SqliteConnection;
use tracing::{debug, info};
use uuid::Uuid;

use stockbook_core::challan::{self, ChallanPlan};
use stockbook_core::numbering::{format_challan_number, parse_challan_number};
use stockbook_core::validation::{validate_challan_items, validate_text};
use stockbook_core::{
    Challan, ChallanDocument, ChallanHeader, ChallanItem, ChallanItemInput, CoreError, EntryKind,
    LedgerEntry, Product,
};

use super::commit::apply_changes;
use super::LedgerService;
use crate::error::{DbError, DbResult};
use crate::repository::{challan as challan_repo, entry, product as product_repo};

/// Default page size for challan listings.
const DEFAULT_CHALLAN_LIMIT: u32 = 200;

impl LedgerService {
    /// Issues a new challan to `customer_id`, deducting every line.
    ///
    /// ## Errors
    /// * `CustomerNotFound` - unknown customer
    /// * `EmptyChallan` / `TooManyItems` - bad item list
    /// * `ProductNotFound` / `InsufficientStock` - naming the offending product
    pub async fn save_challan(
        &self,
        customer_id: &str,
        header: ChallanHeader,
        items: &[ChallanItemInput],
    ) -> DbResult<ChallanDocument> {
        validate_header(&header)?;
        validate_challan_items(items)?;
        self.require_customer(customer_id).await?;

        debug!(customer_id = %customer_id, lines = items.len(), "Saving challan");

        self.retrying("save_challan", || {
            self.try_save_challan(customer_id, &header, items)
        })
        .await
    }

    async fn try_save_challan(
        &self,
        customer_id: &str,
        header: &ChallanHeader,
        items: &[ChallanItemInput],
    ) -> DbResult<ChallanDocument> {
        let mut tx = self.begin_write().await?;
        let products = self.load_products(&mut tx, &[], items).await?;
        let plan = challan::plan_save(items, &products)?;

        let now = self.clock.now();
        let challan_id = Uuid::new_v4().to_string();
        let date = header.date.unwrap_or_else(|| self.clock.today());

        apply_changes(&mut tx, &self.owner_id, &plan.changes, now).await?;

        let sequence = challan_repo::next_sequence(&mut tx, &self.owner_id).await?;
        let challan = Challan {
            id: challan_id,
            owner_id: self.owner_id.clone(),
            sequence_number: sequence,
            challan_number: format_challan_number(sequence, self.settings.challan_number_width),
            customer_id: customer_id.to_string(),
            challan_date: date,
            address: header.address.clone(),
            transport: header.transport.clone(),
            notes: header.notes.clone(),
            total_pieces: plan.total_pieces,
            item_count: plan.lines.len() as i64,
            created_at: now,
            updated_at: now,
            version: 0,
        };
        challan_repo::insert(&mut tx, &challan).await?;

        let items = self.write_lines(&mut tx, &challan, &plan).await?;
        tx.commit().await?;

        info!(
            id = %challan.id,
            number = %challan.challan_number,
            lines = items.len(),
            total_pieces = challan.total_pieces,
            "Challan saved"
        );
        Ok(ChallanDocument { challan, items })
    }

    /// Replaces a challan's header and lines.
    ///
    /// The customer and number never change. `header.date = None` keeps the
    /// existing date; the other header fields are replaced as given.
    pub async fn update_challan(
        &self,
        challan_id: &str,
        header: ChallanHeader,
        items: &[ChallanItemInput],
    ) -> DbResult<ChallanDocument> {
        validate_header(&header)?;
        validate_challan_items(items)?;

        debug!(challan_id = %challan_id, lines = items.len(), "Updating challan");

        self.retrying("update_challan", || {
            self.try_update_challan(challan_id, &header, items)
        })
        .await
    }

    async fn try_update_challan(
        &self,
        challan_id: &str,
        header: &ChallanHeader,
        items: &[ChallanItemInput],
    ) -> DbResult<ChallanDocument> {
        let mut tx = self.begin_write().await?;
        let current = self.locked_challan(&mut tx, challan_id).await?;
        let original = challan_repo::fetch_items(&mut tx, &current.id).await?;
        let products = self.load_products(&mut tx, &original, items).await?;
        let plan = challan::plan_update(&original, items, &products)?;

        let now = self.clock.now();
        let challan = Challan {
            challan_date: header.date.unwrap_or(current.challan_date),
            address: header.address.clone(),
            transport: header.transport.clone(),
            notes: header.notes.clone(),
            total_pieces: plan.total_pieces,
            item_count: plan.lines.len() as i64,
            updated_at: now,
            version: current.version + 1,
            ..current.clone()
        };

        apply_changes(&mut tx, &self.owner_id, &plan.changes, now).await?;
        if !challan_repo::update_header(&mut tx, &challan, current.version).await? {
            return Err(DbError::conflict("Challan", challan_id));
        }
        challan_repo::delete_items(&mut tx, &challan.id).await?;
        let removed = entry::delete_for_challan(&mut tx, &challan.id).await?;
        let items = self.write_lines(&mut tx, &challan, &plan).await?;
        tx.commit().await?;

        info!(
            id = %challan.id,
            number = %challan.challan_number,
            replaced = removed,
            lines = items.len(),
            total_pieces = challan.total_pieces,
            "Challan updated"
        );
        Ok(ChallanDocument { challan, items })
    }

    /// Deletes a challan, returning every line's pieces to stock.
    ///
    /// The number is not reused.
    pub async fn delete_challan(&self, challan_id: &str) -> DbResult<()> {
        debug!(challan_id = %challan_id, "Deleting challan");
        self.retrying("delete_challan", || self.try_delete_challan(challan_id))
            .await
    }

    async fn try_delete_challan(&self, challan_id: &str) -> DbResult<()> {
        let mut tx = self.begin_write().await?;
        let current = self.locked_challan(&mut tx, challan_id).await?;
        let original = challan_repo::fetch_items(&mut tx, &current.id).await?;
        let products = self.load_products(&mut tx, &original, &[]).await?;
        let changes = challan::plan_delete(&original, &products)?;

        let now = self.clock.now();
        apply_changes(&mut tx, &self.owner_id, &changes, now).await?;
        challan_repo::delete_items(&mut tx, &current.id).await?;
        let removed = entry::delete_for_challan(&mut tx, &current.id).await?;
        if !challan_repo::delete(&mut tx, &self.owner_id, &current.id, current.version).await? {
            return Err(DbError::conflict("Challan", challan_id));
        }
        tx.commit().await?;

        info!(
            id = %current.id,
            number = %current.challan_number,
            entries_removed = removed,
            "Challan deleted"
        );
        Ok(())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// A challan with its items in document order.
    pub async fn get_challan(&self, challan_id: &str) -> DbResult<ChallanDocument> {
        let challan = self.require_challan(challan_id).await?;
        let items = self.challans.items(&challan.id).await?;
        Ok(ChallanDocument { challan, items })
    }

    /// Looks a challan up by its displayed number (`"0012"`, `"12"`, `"DC-0012"`).
    pub async fn get_challan_by_number(&self, number: &str) -> DbResult<ChallanDocument> {
        let sequence = parse_challan_number(number)?;
        let challan = self
            .challans
            .get_by_sequence(&self.owner_id, sequence)
            .await?
            .ok_or_else(|| CoreError::ChallanNotFound(number.trim().to_string()))?;
        let items = self.challans.items(&challan.id).await?;
        Ok(ChallanDocument { challan, items })
    }

    /// Challan headers, newest first, optionally for one customer.
    pub async fn list_challans(&self, customer_id: Option<&str>) -> DbResult<Vec<Challan>> {
        self.challans
            .list(&self.owner_id, customer_id, DEFAULT_CHALLAN_LIMIT)
            .await
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn require_challan(&self, id: &str) -> DbResult<Challan> {
        self.challans
            .get_by_id(&self.owner_id, id)
            .await?
            .ok_or_else(|| CoreError::ChallanNotFound(id.to_string()).into())
    }

    async fn locked_challan(&self, conn: &mut SqliteConnection, id: &str) -> DbResult<Challan> {
        challan_repo::fetch(conn, &self.owner_id, id)
            .await?
            .ok_or_else(|| CoreError::ChallanNotFound(id.to_string()).into())
    }

    async fn require_customer(&self, id: &str) -> DbResult<()> {
        if self.parties.exists(&self.owner_id, id).await? {
            Ok(())
        } else {
            Err(CoreError::CustomerNotFound(id.to_string()).into())
        }
    }

    /// Loads every product referenced by the original or requested lines.
    async fn load_products(
        &self,
        conn: &mut SqliteConnection,
        original: &[ChallanItem],
        items: &[ChallanItemInput],
    ) -> DbResult<HashMap<String, Product>> {
        let ids: BTreeSet<&str> = original
            .iter()
            .map(|item| item.product_id.as_str())
            .chain(items.iter().map(|item| item.product_id.as_str()))
            .collect();
        let ids: Vec<String> = ids.into_iter().map(str::to_string).collect();
        product_repo::fetch_many(conn, &self.owner_id, &ids).await
    }

    /// Inserts one deliver entry and one item per planned line.
    async fn write_lines(
        &self,
        conn: &mut SqliteConnection,
        challan: &Challan,
        plan: &ChallanPlan,
    ) -> DbResult<Vec<ChallanItem>> {
        let mut items = Vec::with_capacity(plan.lines.len());

        for (position, line) in plan.lines.iter().enumerate() {
            let member = LedgerEntry {
                id: Uuid::new_v4().to_string(),
                owner_id: self.owner_id.clone(),
                product_id: line.product_id.clone(),
                kind: EntryKind::Deliver,
                quantity: line.quantity,
                unit: line.unit,
                quantity_in_pieces: line.quantity_in_pieces,
                entry_date: challan.challan_date,
                note: format!("Challan {}", challan.challan_number),
                challan_id: Some(challan.id.clone()),
                created_at: challan.updated_at,
                updated_at: challan.updated_at,
                version: 0,
            };
            entry::insert(conn, &member).await?;

            let item = ChallanItem {
                id: Uuid::new_v4().to_string(),
                challan_id: challan.id.clone(),
                position: position as i64,
                product_id: line.product_id.clone(),
                entry_id: member.id,
                quantity: line.quantity,
                unit: line.unit,
                quantity_in_pieces: line.quantity_in_pieces,
                packets_per_linear: line.ratios.packets_per_linear,
                pieces_per_packet: line.ratios.pieces_per_packet,
            };
            challan_repo::insert_item(conn, &item).await?;
            items.push(item);
        }

        Ok(items)
    }
}

fn validate_header(header: &ChallanHeader) -> DbResult<()> {
    validate_text("address", header.address.as_deref()).map_err(CoreError::from)?;
    validate_text("transport", header.transport.as_deref()).map_err(CoreError::from)?;
    validate_text("notes", header.notes.as_deref()).map_err(CoreError::from)?;
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::fixtures::{self, new_entry, quantity};
    use crate::{Database, DbConfig};
    use stockbook_core::{EntryFilter, Unit, DEFAULT_OWNER_ID};

    fn line(product_id: &str, quantity: f64, unit: Unit) -> ChallanItemInput {
        ChallanItemInput {
            product_id: product_id.to_string(),
            quantity,
            unit,
        }
    }

    #[tokio::test]
    async fn test_save_deducts_and_links_entries() {
        let (_db, ledger) = fixtures::ledger().await;
        let pipe = fixtures::product(&ledger, "Pipe", 100.0).await;
        let elbow = fixtures::product(&ledger, "Elbow", 40.0).await;
        let customer = fixtures::customer(&ledger, "Sharma Traders").await;

        let doc = ledger
            .save_challan(
                &customer.id,
                ChallanHeader {
                    transport: Some("Tempo MH-12".to_string()),
                    ..Default::default()
                },
                &[line(&pipe.id, 2.0, Unit::Packet), line(&elbow.id, 1.0, Unit::Linear)],
            )
            .await
            .unwrap();

        assert_eq!(doc.challan.challan_number, "0001");
        assert_eq!(doc.challan.total_pieces, 40.0);
        assert_eq!(doc.challan.item_count, 2);
        assert_eq!(doc.challan.challan_date.to_string(), "2026-03-15");
        assert_eq!(quantity(&ledger, &pipe.id).await, 80.0);
        assert_eq!(quantity(&ledger, &elbow.id).await, 20.0);

        let members = ledger
            .list_entries(&EntryFilter {
                challan_id: Some(doc.challan.id.clone()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(members.len(), 2);
        assert!(members.iter().all(|e| e.kind == EntryKind::Deliver));
        for item in &doc.items {
            assert!(members.iter().any(|e| e.id == item.entry_id));
        }

        let fetched = ledger.get_challan(&doc.challan.id).await.unwrap();
        assert_eq!(fetched.items, doc.items);
        assert_eq!(fetched.items[1].ratios_snapshot().packets_per_linear, 2.0);
    }

    #[tokio::test]
    async fn test_failing_line_changes_nothing() {
        let (_db, ledger) = fixtures::ledger().await;
        let pipe = fixtures::product(&ledger, "Pipe", 100.0).await;
        let elbow = fixtures::product(&ledger, "Elbow", 5.0).await;
        let cap = fixtures::product(&ledger, "Cap", 100.0).await;
        let customer = fixtures::customer(&ledger, "Sharma Traders").await;

        let err = ledger
            .save_challan(
                &customer.id,
                ChallanHeader::default(),
                &[
                    line(&pipe.id, 10.0, Unit::Piece),
                    line(&elbow.id, 6.0, Unit::Piece),
                    line(&cap.id, 10.0, Unit::Piece),
                ],
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err.as_domain(),
            Some(CoreError::InsufficientStock { product, .. }) if product == "Elbow"
        ));
        assert_eq!(quantity(&ledger, &pipe.id).await, 100.0);
        assert_eq!(quantity(&ledger, &elbow.id).await, 5.0);
        assert_eq!(quantity(&ledger, &cap.id).await, 100.0);
        assert!(ledger.list_challans(None).await.unwrap().is_empty());
        assert!(ledger
            .list_entries(&EntryFilter::default())
            .await
            .unwrap()
            .is_empty());

        // The failed save did not consume a number.
        let doc = ledger
            .save_challan(&customer.id, ChallanHeader::default(), &[line(&pipe.id, 1.0, Unit::Piece)])
            .await
            .unwrap();
        assert_eq!(doc.challan.sequence_number, 1);
    }

    #[tokio::test]
    async fn test_save_rejects_unknown_customer_and_empty_items() {
        let (_db, ledger) = fixtures::ledger().await;
        let pipe = fixtures::product(&ledger, "Pipe", 100.0).await;
        let customer = fixtures::customer(&ledger, "Sharma Traders").await;

        let err = ledger
            .save_challan("nobody", ChallanHeader::default(), &[line(&pipe.id, 1.0, Unit::Piece)])
            .await
            .unwrap_err();
        assert_eq!(
            err.as_domain(),
            Some(&CoreError::CustomerNotFound("nobody".to_string()))
        );

        let err = ledger
            .save_challan(&customer.id, ChallanHeader::default(), &[])
            .await
            .unwrap_err();
        assert_eq!(err.as_domain(), Some(&CoreError::EmptyChallan));
    }

    #[tokio::test]
    async fn test_numbers_are_sequential_and_unique() {
        let (_db, ledger) = fixtures::ledger().await;
        let pipe = fixtures::product(&ledger, "Pipe", 1000.0).await;
        let customer = fixtures::customer(&ledger, "Sharma Traders").await;
        let items = [line(&pipe.id, 1.0, Unit::Piece)];

        let save = || ledger.save_challan(&customer.id, ChallanHeader::default(), &items);
        let (a, b, c, d, e) = tokio::join!(save(), save(), save(), save(), save());

        let mut numbers: Vec<String> = [a, b, c, d, e]
            .into_iter()
            .map(|doc| doc.unwrap().challan.challan_number)
            .collect();
        numbers.sort();
        assert_eq!(numbers, vec!["0001", "0002", "0003", "0004", "0005"]);
        assert_eq!(quantity(&ledger, &pipe.id).await, 995.0);

        // Deleting the latest does not hand its number out again.
        let latest = ledger.get_challan_by_number("DC-0005").await.unwrap();
        ledger.delete_challan(&latest.challan.id).await.unwrap();
        let next = ledger
            .save_challan(&customer.id, ChallanHeader::default(), &items)
            .await
            .unwrap();
        assert_eq!(next.challan.challan_number, "0006");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_saves_on_file_database_all_commit() {
        let path = std::env::temp_dir().join(format!("stockbook-{}.db", Uuid::new_v4()));
        let db = Database::new(DbConfig::new(&path).max_connections(5))
            .await
            .unwrap();
        let ledger = db.ledger(DEFAULT_OWNER_ID);
        let pipe = fixtures::product(&ledger, "Pipe", 100.0).await;
        let customer = fixtures::customer(&ledger, "Sharma Traders").await;

        // Ten savers on five connections, exactly enough stock for all of them.
        let handles: Vec<_> = (0..10)
            .map(|_| {
                let ledger = ledger.clone();
                let customer_id = customer.id.clone();
                let items = vec![line(&pipe.id, 10.0, Unit::Piece)];
                tokio::spawn(async move {
                    ledger
                        .save_challan(&customer_id, ChallanHeader::default(), &items)
                        .await
                })
            })
            .collect();

        let mut sequences = Vec::new();
        for handle in handles {
            let doc = handle.await.unwrap().unwrap();
            sequences.push(doc.challan.sequence_number);
        }
        sequences.sort();
        assert_eq!(sequences, (1..=10).collect::<Vec<i64>>());
        assert_eq!(quantity(&ledger, &pipe.id).await, 0.0);
        assert!(ledger.audit().await.unwrap().is_consistent());

        // One more is a plain stock shortage, not a conflict.
        let err = ledger
            .save_challan(&customer.id, ChallanHeader::default(), &[line(&pipe.id, 1.0, Unit::Piece)])
            .await
            .unwrap_err();
        assert!(!err.is_conflict());
        assert!(matches!(
            err.as_domain(),
            Some(CoreError::InsufficientStock { .. })
        ));

        db.close().await;
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
        }
    }

    #[tokio::test]
    async fn test_edit_uses_original_lines_as_pool() {
        let (_db, ledger) = fixtures::ledger().await;
        let pipe = fixtures::product(&ledger, "Pipe", 100.0).await;
        let elbow = fixtures::product(&ledger, "Elbow", 30.0).await;
        let customer = fixtures::customer(&ledger, "Sharma Traders").await;

        let doc = ledger
            .save_challan(
                &customer.id,
                ChallanHeader::default(),
                &[line(&pipe.id, 30.0, Unit::Piece), line(&elbow.id, 20.0, Unit::Piece)],
            )
            .await
            .unwrap();
        assert_eq!(quantity(&ledger, &pipe.id).await, 70.0);
        assert_eq!(quantity(&ledger, &elbow.id).await, 10.0);

        // Elbow goes to 30: more than the 10 on hand, within its pool of 30.
        let edited = ledger
            .update_challan(
                &doc.challan.id,
                ChallanHeader {
                    notes: Some("revised".to_string()),
                    ..Default::default()
                },
                &[line(&pipe.id, 1.0, Unit::Packet), line(&elbow.id, 30.0, Unit::Piece)],
            )
            .await
            .unwrap();

        assert_eq!(quantity(&ledger, &pipe.id).await, 90.0);
        assert_eq!(quantity(&ledger, &elbow.id).await, 0.0);
        assert_eq!(edited.challan.challan_number, doc.challan.challan_number);
        assert_eq!(edited.challan.total_pieces, 40.0);
        assert_eq!(edited.challan.notes.as_deref(), Some("revised"));

        // Old member entries are gone, new ones carry the new pieces.
        let members = ledger
            .list_entries(&EntryFilter {
                challan_id: Some(doc.challan.id.clone()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(members.len(), 2);
        assert!(doc
            .items
            .iter()
            .all(|old| members.iter().all(|e| e.id != old.entry_id)));
        let total: f64 = members.iter().map(|e| e.quantity_in_pieces).sum();
        assert_eq!(total, 40.0);
    }

    #[tokio::test]
    async fn test_failed_edit_changes_nothing() {
        let (_db, ledger) = fixtures::ledger().await;
        let pipe = fixtures::product(&ledger, "Pipe", 50.0).await;
        let customer = fixtures::customer(&ledger, "Sharma Traders").await;

        let doc = ledger
            .save_challan(&customer.id, ChallanHeader::default(), &[line(&pipe.id, 30.0, Unit::Piece)])
            .await
            .unwrap();

        let err = ledger
            .update_challan(
                &doc.challan.id,
                ChallanHeader::default(),
                &[line(&pipe.id, 40.0, Unit::Piece), line(&pipe.id, 11.0, Unit::Piece)],
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_domain(),
            Some(CoreError::InsufficientStock { requested, .. }) if *requested == 51.0
        ));

        assert_eq!(quantity(&ledger, &pipe.id).await, 20.0);
        let unchanged = ledger.get_challan(&doc.challan.id).await.unwrap();
        assert_eq!(unchanged.challan, doc.challan);
        assert_eq!(unchanged.items, doc.items);
    }

    #[tokio::test]
    async fn test_delete_restores_stock_and_removes_members() {
        let (_db, ledger) = fixtures::ledger().await;
        let pipe = fixtures::product(&ledger, "Pipe", 80.0).await;
        let customer = fixtures::customer(&ledger, "Sharma Traders").await;

        let doc = ledger
            .save_challan(
                &customer.id,
                ChallanHeader::default(),
                &[line(&pipe.id, 20.0, Unit::Piece), line(&pipe.id, 1.0, Unit::Packet)],
            )
            .await
            .unwrap();
        assert_eq!(quantity(&ledger, &pipe.id).await, 50.0);

        ledger.delete_challan(&doc.challan.id).await.unwrap();

        assert_eq!(quantity(&ledger, &pipe.id).await, 80.0);
        assert!(ledger
            .list_entries(&EntryFilter::default())
            .await
            .unwrap()
            .is_empty());
        let err = ledger.get_challan(&doc.challan.id).await.unwrap_err();
        assert!(err.as_domain().is_some_and(CoreError::is_not_found));
    }

    #[tokio::test]
    async fn test_member_entries_are_locked_to_their_challan() {
        let (_db, ledger) = fixtures::ledger().await;
        let pipe = fixtures::product(&ledger, "Pipe", 80.0).await;
        let customer = fixtures::customer(&ledger, "Sharma Traders").await;
        let doc = ledger
            .save_challan(&customer.id, ChallanHeader::default(), &[line(&pipe.id, 20.0, Unit::Piece)])
            .await
            .unwrap();

        let member = &doc.items[0].entry_id;
        let err = ledger.delete_entry(member).await.unwrap_err();
        assert!(matches!(
            err.as_domain(),
            Some(CoreError::EntryOwnedByChallan { .. })
        ));
        let err = ledger
            .update_entry(
                member,
                stockbook_core::EntryPatch {
                    quantity: Some(1.0),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_domain(),
            Some(CoreError::EntryOwnedByChallan { .. })
        ));
        assert_eq!(quantity(&ledger, &pipe.id).await, 60.0);
    }

    #[tokio::test]
    async fn test_invariant_after_mixed_operations() {
        let (_db, ledger) = fixtures::ledger().await;
        let pipe = fixtures::product(&ledger, "Pipe", 25.0).await;
        let elbow = fixtures::product(&ledger, "Elbow", 0.0).await;
        let customer = fixtures::customer(&ledger, "Sharma Traders").await;

        let produced = ledger
            .create_entry(new_entry(&pipe.id, EntryKind::Produce, 4.0, Unit::Linear))
            .await
            .unwrap();
        ledger
            .create_entry(new_entry(&elbow.id, EntryKind::Produce, 7.0, Unit::Packet))
            .await
            .unwrap();
        let doc = ledger
            .save_challan(
                &customer.id,
                ChallanHeader::default(),
                &[line(&pipe.id, 3.0, Unit::Packet), line(&elbow.id, 15.0, Unit::Piece)],
            )
            .await
            .unwrap();
        ledger
            .update_entry(
                &produced.id,
                stockbook_core::EntryPatch {
                    quantity: Some(5.0),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        ledger
            .update_challan(
                &doc.challan.id,
                ChallanHeader::default(),
                &[line(&elbow.id, 2.0, Unit::Packet)],
            )
            .await
            .unwrap();

        for product in [&pipe, &elbow] {
            let current = ledger.get_product(&product.id).await.unwrap();
            let totals = ledger.product_totals(&product.id).await.unwrap();
            assert!(
                (current.quantity - (current.previous_stock + totals.net_pieces())).abs() < 1e-9,
                "{} drifted",
                current.name
            );
        }
        assert_eq!(quantity(&ledger, &pipe.id).await, 125.0);
        assert_eq!(quantity(&ledger, &elbow.id).await, 50.0);
        assert!(ledger.audit().await.unwrap().is_consistent());
    }
}
