//! # Stock Planning for Single Entries
//!
//! Pure computation of what an entry create/update/delete does to stock.
//!
//! ## Two-Phase Operations
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                 Plan (this module)  →  Commit (stockbook-db)            │
//! │                                                                         │
//! │  plan_create:  convert → check sufficiency → new quantity               │
//! │                                                                         │
//! │  plan_update:  1. revert old effect on the old product                 │
//! │                2. convert new quantity with the TARGET product's ratios │
//! │                3. check sufficiency against the REVERTED quantity      │
//! │                4. apply new effect                                      │
//! │                                                                         │
//! │  plan_delete:  revert old effect                                        │
//! │                                                                         │
//! │  Output: StockChange { product, expected_version, before, after }      │
//! │  The commit writes `after` only if the row still has                   │
//! │  `expected_version`; otherwise the whole plan is recomputed.           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Reverting before re-applying is mandatory. Applying the new delta first
//! would double-count the entry and can falsely reject an edit as
//! insufficient.
//!
//! Taking back a production run is checked like a delivery: once its pieces
//! have gone out on other entries, deleting, shrinking or moving it fails
//! with `InsufficientStock` instead of pushing the product below zero.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::types::{EntryKind, LedgerEntry, Product};
use crate::units::{to_pieces, Unit};
use crate::QUANTITY_EPSILON;

// =============================================================================
// Stock Change
// =============================================================================

/// Absolute quantity change for one product, guarded by its version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockChange {
    pub product_id: String,
    pub expected_version: i64,
    pub before: f64,
    pub after: f64,
}

impl StockChange {
    /// Net movement in pieces.
    pub fn delta(&self) -> f64 {
        self.after - self.before
    }
}

/// Result of planning a single-entry operation.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryPlan {
    /// Frozen conversion to store on the entry.
    pub quantity_in_pieces: f64,
    /// One change per affected product (two when an edit moves products).
    pub changes: Vec<StockChange>,
}

// =============================================================================
// Primitive Helpers
// =============================================================================

/// Adds `signed_pieces` to `quantity`, clamping float residue at zero.
#[inline]
pub fn apply_signed(quantity: f64, signed_pieces: f64) -> f64 {
    (quantity + signed_pieces).max(0.0)
}

/// Fails with `InsufficientStock` when `requested` exceeds `available`.
///
/// A tolerance of [`QUANTITY_EPSILON`] absorbs float residue from unit
/// conversion, so delivering exactly what is on hand always succeeds.
pub fn ensure_available(product: &Product, available: f64, requested: f64) -> CoreResult<()> {
    if requested > available + QUANTITY_EPSILON {
        return Err(CoreError::InsufficientStock {
            product: product.display_name(),
            available,
            requested,
        });
    }
    Ok(())
}

// =============================================================================
// Planning
// =============================================================================

/// Plans a new entry against `product`.
pub fn plan_create(
    product: &Product,
    kind: EntryKind,
    quantity: f64,
    unit: Unit,
) -> CoreResult<EntryPlan> {
    let pieces = to_pieces(quantity, unit, &product.ratios())?;

    if kind == EntryKind::Deliver {
        ensure_available(product, product.quantity, pieces)?;
    }

    Ok(EntryPlan {
        quantity_in_pieces: pieces,
        changes: vec![StockChange {
            product_id: product.id.clone(),
            expected_version: product.version,
            before: product.quantity,
            after: apply_signed(product.quantity, kind.sign() * pieces),
        }],
    })
}

/// Plans an edit of `entry`.
///
/// `owner` is the product the entry currently references. `target` is the
/// product it should reference after the edit; pass `None` to keep it.
pub fn plan_update(
    entry: &LedgerEntry,
    owner: &Product,
    target: Option<&Product>,
    kind: EntryKind,
    quantity: f64,
    unit: Unit,
) -> CoreResult<EntryPlan> {
    if owner.id != entry.product_id {
        return Err(CoreError::ProductNotFound(entry.product_id.clone()));
    }

    match target {
        Some(target) if target.id != owner.id => {
            ensure_revertible(entry, owner)?;
            let pieces = to_pieces(quantity, unit, &target.ratios())?;
            if kind == EntryKind::Deliver {
                ensure_available(target, target.quantity, pieces)?;
            }
            Ok(EntryPlan {
                quantity_in_pieces: pieces,
                changes: vec![
                    StockChange {
                        product_id: owner.id.clone(),
                        expected_version: owner.version,
                        before: owner.quantity,
                        after: apply_signed(owner.quantity, -entry.signed_pieces()),
                    },
                    StockChange {
                        product_id: target.id.clone(),
                        expected_version: target.version,
                        before: target.quantity,
                        after: apply_signed(target.quantity, kind.sign() * pieces),
                    },
                ],
            })
        }
        _ => {
            let pieces = to_pieces(quantity, unit, &owner.ratios())?;
            let net = kind.sign() * pieces - entry.signed_pieces();
            if net < 0.0 {
                if kind == EntryKind::Deliver {
                    ensure_revertible(entry, owner)?;
                    let reverted = owner.quantity - entry.signed_pieces();
                    ensure_available(owner, reverted, pieces)?;
                } else {
                    ensure_available(owner, owner.quantity, -net)?;
                }
            }
            Ok(EntryPlan {
                quantity_in_pieces: pieces,
                changes: vec![StockChange {
                    product_id: owner.id.clone(),
                    expected_version: owner.version,
                    before: owner.quantity,
                    after: apply_signed(owner.quantity, net),
                }],
            })
        }
    }
}

/// Plans the removal of `entry` from `owner`.
pub fn plan_delete(entry: &LedgerEntry, owner: &Product) -> CoreResult<StockChange> {
    ensure_revertible(entry, owner)?;
    Ok(StockChange {
        product_id: owner.id.clone(),
        expected_version: owner.version,
        before: owner.quantity,
        after: apply_signed(owner.quantity, -entry.signed_pieces()),
    })
}

/// A produce entry can only be taken back while its pieces are still on hand.
fn ensure_revertible(entry: &LedgerEntry, owner: &Product) -> CoreResult<()> {
    if entry.kind == EntryKind::Produce {
        ensure_available(owner, owner.quantity, entry.quantity_in_pieces)?;
    }
    Ok(())
}

/// Plans a baseline edit: `quantity` moves by the same amount as `previous_stock`.
pub fn plan_baseline(product: &Product, new_previous_stock: f64) -> CoreResult<StockChange> {
    let shift = new_previous_stock - product.previous_stock;
    if shift < 0.0 {
        ensure_available(product, product.quantity, -shift)?;
    }
    Ok(StockChange {
        product_id: product.id.clone(),
        expected_version: product.version,
        before: product.quantity,
        after: apply_signed(product.quantity, shift),
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};

    pub(crate) fn product(id: &str, quantity: f64) -> Product {
        let now = Utc::now();
        Product {
            id: id.to_string(),
            owner_id: "owner".to_string(),
            name: format!("Product {}", id),
            size: None,
            quantity,
            previous_stock: 0.0,
            packets_per_linear: 2.0,
            pieces_per_packet: 10.0,
            created_at: now,
            updated_at: now,
            version: 3,
        }
    }

    pub(crate) fn entry(product_id: &str, kind: EntryKind, pieces: f64) -> LedgerEntry {
        let now = Utc::now();
        LedgerEntry {
            id: "e-1".to_string(),
            owner_id: "owner".to_string(),
            product_id: product_id.to_string(),
            kind,
            quantity: pieces,
            unit: Unit::Piece,
            quantity_in_pieces: pieces,
            entry_date: NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
            note: String::new(),
            challan_id: None,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    #[test]
    fn test_produce_then_deliver() {
        let mut p = product("a", 0.0);

        let plan = plan_create(&p, EntryKind::Produce, 5.0, Unit::Linear).unwrap();
        assert_eq!(plan.quantity_in_pieces, 100.0);
        assert_eq!(plan.changes[0].after, 100.0);
        p.quantity = plan.changes[0].after;

        let plan = plan_create(&p, EntryKind::Deliver, 3.0, Unit::Packet).unwrap();
        assert_eq!(plan.quantity_in_pieces, 30.0);
        assert_eq!(plan.changes[0].after, 70.0);
        assert_eq!(plan.changes[0].expected_version, 3);
    }

    #[test]
    fn test_insufficient_stock_reports_amounts() {
        let p = product("a", 20.0);
        let err = plan_create(&p, EntryKind::Deliver, 25.0, Unit::Piece).unwrap_err();
        assert_eq!(
            err,
            CoreError::InsufficientStock {
                product: "Product a".to_string(),
                available: 20.0,
                requested: 25.0,
            }
        );
    }

    #[test]
    fn test_deliver_exact_stock_with_float_residue() {
        let mut p = product("a", 0.3);
        p.pieces_per_packet = 0.1;
        let plan = plan_create(&p, EntryKind::Deliver, 3.0, Unit::Packet).unwrap();
        assert!(plan.changes[0].after >= 0.0);
        assert!(plan.changes[0].after < 1e-9);
    }

    #[test]
    fn test_edit_returns_original_to_pool_first() {
        // quantity 100 after an existing 30-piece delivery; edit to 40 → 90.
        let p = product("a", 100.0);
        let e = entry("a", EntryKind::Deliver, 30.0);
        let plan = plan_update(&e, &p, None, EntryKind::Deliver, 40.0, Unit::Piece).unwrap();
        assert_eq!(plan.changes.len(), 1);
        assert_eq!(plan.changes[0].after, 90.0);
    }

    #[test]
    fn test_edit_validates_against_reverted_quantity() {
        let p = product("a", 100.0);
        let e = entry("a", EntryKind::Deliver, 30.0);
        assert!(plan_update(&e, &p, None, EntryKind::Deliver, 130.0, Unit::Piece).is_ok());
        let err = plan_update(&e, &p, None, EntryKind::Deliver, 131.0, Unit::Piece).unwrap_err();
        assert!(matches!(err, CoreError::InsufficientStock { available, .. } if available == 130.0));
    }

    #[test]
    fn test_edit_produce_to_deliver() {
        let p = product("a", 50.0);
        let e = entry("a", EntryKind::Produce, 20.0);
        // revert: 30, then deliver 10 → 20
        let plan = plan_update(&e, &p, None, EntryKind::Deliver, 1.0, Unit::Packet).unwrap();
        assert_eq!(plan.changes[0].after, 20.0);
    }

    #[test]
    fn test_edit_moves_entry_to_other_product() {
        let a = product("a", 70.0);
        let b = product("b", 5.0);
        let e = entry("a", EntryKind::Deliver, 30.0);

        let plan = plan_update(&e, &a, Some(&b), EntryKind::Deliver, 5.0, Unit::Piece).unwrap();
        assert_eq!(plan.changes.len(), 2);
        assert_eq!(plan.changes[0].product_id, "a");
        assert_eq!(plan.changes[0].after, 100.0);
        assert_eq!(plan.changes[1].product_id, "b");
        assert_eq!(plan.changes[1].after, 0.0);

        // Target is checked against its own stock, not the reverted source.
        assert!(plan_update(&e, &a, Some(&b), EntryKind::Deliver, 6.0, Unit::Piece).is_err());
    }

    #[test]
    fn test_edit_uses_target_ratios() {
        let a = product("a", 0.0);
        let mut b = product("b", 0.0);
        b.pieces_per_packet = 12.0;
        let e = entry("a", EntryKind::Produce, 0.0);
        let plan = plan_update(&e, &a, Some(&b), EntryKind::Produce, 2.0, Unit::Packet).unwrap();
        assert_eq!(plan.quantity_in_pieces, 24.0);
    }

    #[test]
    fn test_delete_reverts_entry() {
        let p = product("a", 30.0);
        let produce = entry("a", EntryKind::Produce, 25.0);
        assert_eq!(plan_delete(&produce, &p).unwrap().after, 5.0);

        let deliver = entry("a", EntryKind::Deliver, 25.0);
        assert_eq!(plan_delete(&deliver, &p).unwrap().after, 55.0);
    }

    #[test]
    fn test_delete_rejects_produce_already_delivered() {
        // produced 100, delivered 90: only 10 of the run is left to take back.
        let p = product("a", 10.0);
        let produce = entry("a", EntryKind::Produce, 100.0);
        let err = plan_delete(&produce, &p).unwrap_err();
        assert_eq!(
            err,
            CoreError::InsufficientStock {
                product: "Product a".to_string(),
                available: 10.0,
                requested: 100.0,
            }
        );
    }

    #[test]
    fn test_edit_cannot_shrink_produce_below_delivered() {
        let p = product("a", 10.0);
        let e = entry("a", EntryKind::Produce, 100.0);

        let err = plan_update(&e, &p, None, EntryKind::Produce, 50.0, Unit::Piece).unwrap_err();
        assert!(matches!(err, CoreError::InsufficientStock { requested, .. } if requested == 50.0));

        // Shrinking by exactly what is on hand is fine.
        let plan = plan_update(&e, &p, None, EntryKind::Produce, 90.0, Unit::Piece).unwrap();
        assert_eq!(plan.changes[0].after, 0.0);

        // Growing a run never needs stock.
        let plan = plan_update(&e, &p, None, EntryKind::Produce, 120.0, Unit::Piece).unwrap();
        assert_eq!(plan.changes[0].after, 30.0);
    }

    #[test]
    fn test_edit_cannot_move_delivered_produce_away() {
        let a = product("a", 10.0);
        let b = product("b", 0.0);
        let e = entry("a", EntryKind::Produce, 100.0);

        let err = plan_update(&e, &a, Some(&b), EntryKind::Produce, 100.0, Unit::Piece).unwrap_err();
        assert!(matches!(err, CoreError::InsufficientStock { ref product, .. } if product == "Product a"));
    }

    #[test]
    fn test_baseline_shift() {
        let mut p = product("a", 40.0);
        p.previous_stock = 10.0;
        assert_eq!(plan_baseline(&p, 25.0).unwrap().after, 55.0);
        assert_eq!(plan_baseline(&p, 0.0).unwrap().after, 30.0);

        p.quantity = 5.0;
        assert!(plan_baseline(&p, 0.0).is_err());
    }
}
