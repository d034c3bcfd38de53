//! # Consistency Audit
//!
//! Checks every stored number the ledger derives against the rows it is
//! derived from:
//!
//! | Check                  | Stored                 | Recomputed from                      |
//! |------------------------|------------------------|--------------------------------------|
//! | `QuantityDrift`        | `products.quantity`    | `previous_stock` + Σ entry pieces    |
//! | `OrphanedEntry`        | `ledger_entries`       | existence of its product             |
//! | `ChallanItemMismatch`  | `challan_items`        | its member delivery entry            |
//! | `ChallanTotalMismatch` | `challans.total_pieces`| Σ item pieces                        |
//!
//! The audit only reports. [`LedgerService::repair_drift`] is the one
//! explicit correction, run per product by an operator.

use std::collections::HashMap;

use tracing::{info, warn};

use stockbook_core::audit::{self, ConsistencyIssue, ConsistencyReport};
use stockbook_core::{EntryKind, ProductTotals, StockChange, QUANTITY_EPSILON};

use super::commit::apply_changes;
use super::LedgerService;
use crate::error::DbResult;
use crate::repository::challan::ItemEntryLink;
use crate::repository::entry;

impl LedgerService {
    /// Runs every consistency check for this owner.
    pub async fn audit(&self) -> DbResult<ConsistencyReport> {
        let mut report = ConsistencyReport::default();

        let products = self.products.list(&self.owner_id).await?;
        let totals = self.entries.totals_by_product(&self.owner_id).await?;
        for product in &products {
            let product_totals = totals.get(&product.id).copied().unwrap_or_default();
            report
                .issues
                .extend(audit::check_product(product, &product_totals));
        }
        report.products_checked = products.len() as i64;

        for orphan in self.entries.orphaned(&self.owner_id).await? {
            report.issues.push(ConsistencyIssue::OrphanedEntry {
                entry_id: orphan.id,
                product_id: orphan.product_id,
            });
        }
        report.entries_checked = self.entries.count(&self.owner_id).await?;

        let links = self.challans.item_entry_links(&self.owner_id).await?;
        report
            .issues
            .extend(links.iter().filter_map(check_item_link));

        let mut line_pieces: HashMap<&str, Vec<f64>> = HashMap::new();
        for link in &links {
            line_pieces
                .entry(link.challan_id.as_str())
                .or_default()
                .push(link.item_pieces);
        }
        let challans = self.challans.list_all(&self.owner_id).await?;
        for challan in &challans {
            let pieces = line_pieces.remove(challan.id.as_str()).unwrap_or_default();
            report.issues.extend(audit::check_challan_total(
                &challan.id,
                challan.total_pieces,
                pieces,
            ));
        }
        report.challans_checked = challans.len() as i64;

        for issue in &report.issues {
            warn!(?issue, "Ledger inconsistency");
        }
        info!(
            products = report.products_checked,
            entries = report.entries_checked,
            challans = report.challans_checked,
            issues = report.issues.len(),
            "Audit finished"
        );

        Ok(report)
    }

    /// Resets a product's quantity to what its ledger adds up to.
    ///
    /// The recomputed value is clamped at zero. Returns the applied change;
    /// `before == after` when there was nothing to repair.
    pub async fn repair_drift(&self, product_id: &str) -> DbResult<StockChange> {
        self.retrying("repair_drift", || self.try_repair_drift(product_id))
            .await
    }

    async fn try_repair_drift(&self, product_id: &str) -> DbResult<StockChange> {
        let mut tx = self.begin_write().await?;
        let product = self.locked_product(&mut tx, product_id).await?;
        let totals: ProductTotals = entry::fetch_totals(&mut tx, product_id).await?;
        let expected = audit::expected_quantity(product.previous_stock, &totals).max(0.0);

        let change = StockChange {
            product_id: product.id.clone(),
            expected_version: product.version,
            before: product.quantity,
            after: expected,
        };
        if (change.before - change.after).abs() <= QUANTITY_EPSILON {
            return Ok(change);
        }

        apply_changes(&mut tx, &self.owner_id, std::slice::from_ref(&change), self.clock.now())
            .await?;
        tx.commit().await?;

        warn!(
            product_id = %product.id,
            product = %product.display_name(),
            stored = change.before,
            repaired = change.after,
            "Quantity drift repaired"
        );
        Ok(change)
    }
}

/// Compares a challan item with the delivery entry it generated.
fn check_item_link(link: &ItemEntryLink) -> Option<ConsistencyIssue> {
    let reason = match (&link.entry_product_id, link.entry_pieces, link.entry_kind) {
        (None, _, _) => "entry missing".to_string(),
        (Some(product_id), _, _) if *product_id != link.item_product_id => {
            format!("entry is for product {product_id}")
        }
        (_, _, Some(kind)) if kind != EntryKind::Deliver => {
            format!("entry is a {} entry", kind.as_str())
        }
        (_, Some(pieces), _) if (pieces - link.item_pieces).abs() > QUANTITY_EPSILON => {
            format!("entry has {pieces} pieces, item has {}", link.item_pieces)
        }
        _ if link.entry_challan_id.as_deref() != Some(link.challan_id.as_str()) => {
            "entry belongs to another challan".to_string()
        }
        _ => return None,
    };

    Some(ConsistencyIssue::ChallanItemMismatch {
        challan_id: link.challan_id.clone(),
        item_id: link.item_id.clone(),
        entry_id: link.entry_id.clone(),
        reason,
    })
}
