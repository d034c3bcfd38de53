//! # Transaction Processor
//!
//! Create, edit and delete single ledger entries, moving the product's
//! stored quantity in the same transaction.
//!
//! ## Edit Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Product P: quantity 100, existing deliver entry E of 30 pieces        │
//! │                                                                         │
//! │  update_entry(E, quantity = 40)                                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  revert E:    100 + 30 = 130        (pool the edit is checked against) │
//! │  re-apply:    130 − 40 =  90        (40 ≤ 130 ✓)                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  one transaction:                                                      │
//! │    UPDATE products SET quantity = 90  WHERE version = v(P)             │
//! │    UPDATE ledger_entries SET ...      WHERE version = v(E)             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Entries generated by a challan are rejected here with
//! `EntryOwnedByChallan`; they change only through the challan.

use tracing::{debug, info};
use uuid::Uuid;

use stockbook_core::ledger::{self, EntryPlan};
use stockbook_core::validation::{validate_entry_filter, validate_entry_quantity, validate_text};
use stockbook_core::{
    CoreError, EntryFilter, EntryPatch, LedgerEntry, NewEntry, ProductTotals, ValidationError,
};

use super::commit::apply_changes;
use super::LedgerService;
use crate::error::{DbError, DbResult};
use crate::repository::entry;

impl LedgerService {
    /// Records a produce or deliver event and moves stock by its piece count.
    ///
    /// ## Errors
    /// * `ProductNotFound` - unknown product for this owner
    /// * `InsufficientStock` - delivery exceeds the quantity on hand
    /// * `InvalidQuantity` / `InvalidConversionFactors` - bad input or ratios
    pub async fn create_entry(&self, input: NewEntry) -> DbResult<LedgerEntry> {
        require_id("product_id", &input.product_id)?;
        validate_entry_quantity(input.quantity)?;
        validate_text("note", input.note.as_deref()).map_err(CoreError::from)?;

        debug!(
            product_id = %input.product_id,
            kind = %input.kind,
            quantity = input.quantity,
            unit = %input.unit,
            "Creating entry"
        );

        self.retrying("create_entry", || self.try_create_entry(&input))
            .await
    }

    async fn try_create_entry(&self, input: &NewEntry) -> DbResult<LedgerEntry> {
        let mut tx = self.begin_write().await?;
        let product = self.locked_product(&mut tx, &input.product_id).await?;
        let EntryPlan {
            quantity_in_pieces,
            changes,
        } = ledger::plan_create(&product, input.kind, input.quantity, input.unit)?;

        let now = self.clock.now();
        let entry = LedgerEntry {
            id: Uuid::new_v4().to_string(),
            owner_id: self.owner_id.clone(),
            product_id: product.id.clone(),
            kind: input.kind,
            quantity: input.quantity,
            unit: input.unit,
            quantity_in_pieces,
            entry_date: input.date.unwrap_or_else(|| self.clock.today()),
            note: input.note.clone().unwrap_or_default(),
            challan_id: None,
            created_at: now,
            updated_at: now,
            version: 0,
        };

        apply_changes(&mut tx, &self.owner_id, &changes, now).await?;
        entry::insert(&mut tx, &entry).await?;
        tx.commit().await?;

        info!(
            id = %entry.id,
            product_id = %entry.product_id,
            kind = %entry.kind,
            pieces = entry.quantity_in_pieces,
            "Entry created"
        );
        Ok(entry)
    }

    /// Edits an entry: reverts its old effect, then applies the new one.
    ///
    /// A patch that only touches `date` / `note` leaves stock alone.
    /// Moving the entry to another product reverts on the old product and
    /// applies on the new one, converting with the new product's ratios.
    pub async fn update_entry(&self, entry_id: &str, patch: EntryPatch) -> DbResult<LedgerEntry> {
        if let Some(quantity) = patch.quantity {
            validate_entry_quantity(quantity)?;
        }
        if let Some(product_id) = &patch.product_id {
            require_id("product_id", product_id)?;
        }
        validate_text("note", patch.note.as_deref()).map_err(CoreError::from)?;

        debug!(entry_id = %entry_id, touches_stock = patch.touches_stock(), "Updating entry");

        self.retrying("update_entry", || self.try_update_entry(entry_id, &patch))
            .await
    }

    async fn try_update_entry(&self, entry_id: &str, patch: &EntryPatch) -> DbResult<LedgerEntry> {
        let mut tx = self.begin_write().await?;
        let current = self.locked_entry(&mut tx, entry_id).await?;
        ensure_standalone(&current)?;

        let now = self.clock.now();
        let mut updated = LedgerEntry {
            entry_date: patch.date.unwrap_or(current.entry_date),
            note: patch.note.clone().unwrap_or_else(|| current.note.clone()),
            updated_at: now,
            version: current.version + 1,
            ..current.clone()
        };

        let changes = if patch.touches_stock() {
            let owner = self.locked_product(&mut tx, &current.product_id).await?;
            let target = match &patch.product_id {
                Some(id) if *id != current.product_id => {
                    Some(self.locked_product(&mut tx, id).await?)
                }
                _ => None,
            };

            updated.kind = patch.kind.unwrap_or(current.kind);
            updated.quantity = patch.quantity.unwrap_or(current.quantity);
            updated.unit = patch.unit.unwrap_or(current.unit);

            let plan = ledger::plan_update(
                &current,
                &owner,
                target.as_ref(),
                updated.kind,
                updated.quantity,
                updated.unit,
            )?;

            if let Some(target) = &target {
                updated.product_id = target.id.clone();
            }
            updated.quantity_in_pieces = plan.quantity_in_pieces;
            plan.changes
        } else {
            Vec::new()
        };

        apply_changes(&mut tx, &self.owner_id, &changes, now).await?;
        if !entry::update(&mut tx, &updated, current.version).await? {
            return Err(DbError::conflict("LedgerEntry", entry_id));
        }
        tx.commit().await?;

        info!(
            id = %updated.id,
            product_id = %updated.product_id,
            old_pieces = current.signed_pieces(),
            new_pieces = updated.signed_pieces(),
            "Entry updated"
        );
        Ok(updated)
    }

    /// Deletes an entry after returning its effect to the product.
    pub async fn delete_entry(&self, entry_id: &str) -> DbResult<()> {
        debug!(entry_id = %entry_id, "Deleting entry");
        self.retrying("delete_entry", || self.try_delete_entry(entry_id))
            .await
    }

    async fn try_delete_entry(&self, entry_id: &str) -> DbResult<()> {
        let mut tx = self.begin_write().await?;
        let current = self.locked_entry(&mut tx, entry_id).await?;
        ensure_standalone(&current)?;

        let owner = self.locked_product(&mut tx, &current.product_id).await?;
        let change = ledger::plan_delete(&current, &owner)?;

        let now = self.clock.now();
        apply_changes(&mut tx, &self.owner_id, std::slice::from_ref(&change), now).await?;
        if !entry::delete(&mut tx, &self.owner_id, entry_id, current.version).await? {
            return Err(DbError::conflict("LedgerEntry", entry_id));
        }
        tx.commit().await?;

        info!(
            id = %entry_id,
            product_id = %current.product_id,
            reverted_pieces = current.signed_pieces(),
            "Entry deleted"
        );
        Ok(())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub async fn get_entry(&self, entry_id: &str) -> DbResult<LedgerEntry> {
        self.require_entry(entry_id).await
    }

    /// Lists entries matching `filter`, newest first.
    pub async fn list_entries(&self, filter: &EntryFilter) -> DbResult<Vec<LedgerEntry>> {
        validate_entry_filter(filter).map_err(CoreError::from)?;
        self.entries.list(&self.owner_id, filter).await
    }

    /// Produced / delivered piece totals for a product, from stored values only.
    pub async fn product_totals(&self, product_id: &str) -> DbResult<ProductTotals> {
        let product = self.require_product(product_id).await?;
        self.entries.totals_for_product(&product.id).await
    }
}

fn ensure_standalone(entry: &LedgerEntry) -> DbResult<()> {
    match &entry.challan_id {
        Some(challan_id) => Err(CoreError::EntryOwnedByChallan {
            entry_id: entry.id.clone(),
            challan_id: challan_id.clone(),
        }
        .into()),
        None => Ok(()),
    }
}

fn require_id(field: &str, id: &str) -> DbResult<()> {
    if id.trim().is_empty() {
        return Err(CoreError::from(ValidationError::Required {
            field: field.to_string(),
        })
        .into());
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
