//! # Challan Planning
//!
//! Pure computation of the stock effect of saving, editing and deleting a
//! challan (a batch of deliveries for one customer).
//!
//! ## Availability Pool
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Editing an existing challan                          │
//! │                                                                         │
//! │  Product P: quantity = 50 (after the challan deducted 30)              │
//! │  Original lines for P: 20 + 10 pieces                                  │
//! │                                                                         │
//! │  pool(P) = quantity + Σ original pieces for P = 50 + 30 = 80           │
//! │                                                                         │
//! │  New lines for P: 45 + 35 pieces → requested(P) = 80 ≤ 80 ✓            │
//! │  after(P) = pool − requested = 0                                       │
//! │                                                                         │
//! │  Original pieces come from the STORED lines, never reconverted.        │
//! │  Every product is validated before any change is emitted.              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::{BTreeMap, HashMap};

use crate::error::{CoreError, CoreResult};
use crate::ledger::{apply_signed, ensure_available, StockChange};
use crate::types::{ChallanItem, ChallanItemInput, Product};
use crate::units::{to_pieces, ConversionRatios, Unit};
use crate::validation::validate_challan_items;

/// A validated challan line, converted with the product's current ratios.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedLine {
    pub product_id: String,
    pub quantity: f64,
    pub unit: Unit,
    pub quantity_in_pieces: f64,
    pub ratios: ConversionRatios,
}

/// Result of planning a challan save or edit.
#[derive(Debug, Clone, PartialEq)]
pub struct ChallanPlan {
    /// Lines in request order.
    pub lines: Vec<PlannedLine>,
    /// One change per touched product, ordered by product id.
    pub changes: Vec<StockChange>,
    pub total_pieces: f64,
}

/// Plans a fresh challan. Availability is each product's current quantity.
pub fn plan_save(
    items: &[ChallanItemInput],
    products: &HashMap<String, Product>,
) -> CoreResult<ChallanPlan> {
    plan_against_pool(items, &[], products)
}

/// Plans an edit that replaces `original` lines with `items`.
///
/// Every original line for a product is returned to that product's pool
/// before the new lines are validated, so a challan never competes with
/// itself for stock.
pub fn plan_update(
    original: &[ChallanItem],
    items: &[ChallanItemInput],
    products: &HashMap<String, Product>,
) -> CoreResult<ChallanPlan> {
    plan_against_pool(items, original, products)
}

/// Plans the deletion of a challan: every original line is returned to stock.
pub fn plan_delete(
    original: &[ChallanItem],
    products: &HashMap<String, Product>,
) -> CoreResult<Vec<StockChange>> {
    let returned = returned_pieces(original);
    returned
        .iter()
        .map(|(product_id, pieces)| {
            let product = lookup(products, product_id)?;
            Ok(StockChange {
                product_id: product.id.clone(),
                expected_version: product.version,
                before: product.quantity,
                after: apply_signed(product.quantity, *pieces),
            })
        })
        .collect()
}

fn plan_against_pool(
    items: &[ChallanItemInput],
    original: &[ChallanItem],
    products: &HashMap<String, Product>,
) -> CoreResult<ChallanPlan> {
    validate_challan_items(items)?;

    let returned = returned_pieces(original);

    let mut lines = Vec::with_capacity(items.len());
    let mut requested: BTreeMap<&str, f64> = BTreeMap::new();

    for item in items {
        let product = lookup(products, &item.product_id)?;
        let ratios = product.ratios();
        let pieces = to_pieces(item.quantity, item.unit, &ratios)?;

        let pool = product.quantity + returned.get(product.id.as_str()).copied().unwrap_or(0.0);
        let total = requested.entry(product.id.as_str()).or_insert(0.0);
        *total += pieces;
        ensure_available(product, pool, *total)?;

        lines.push(PlannedLine {
            product_id: product.id.clone(),
            quantity: item.quantity,
            unit: item.unit,
            quantity_in_pieces: pieces,
            ratios,
        });
    }

    let mut touched: BTreeMap<&str, ()> = BTreeMap::new();
    for id in returned.keys().copied().chain(requested.keys().copied()) {
        touched.insert(id, ());
    }

    let mut changes = Vec::with_capacity(touched.len());
    for id in touched.keys() {
        let product = lookup(products, id)?;
        let back = returned.get(id).copied().unwrap_or(0.0);
        let out = requested.get(id).copied().unwrap_or(0.0);
        changes.push(StockChange {
            product_id: product.id.clone(),
            expected_version: product.version,
            before: product.quantity,
            after: apply_signed(product.quantity + back, -out),
        });
    }

    let total_pieces = lines.iter().map(|l| l.quantity_in_pieces).sum();

    Ok(ChallanPlan {
        lines,
        changes,
        total_pieces,
    })
}

/// Sums stored pieces per product over all original lines.
fn returned_pieces(original: &[ChallanItem]) -> BTreeMap<&str, f64> {
    let mut returned = BTreeMap::new();
    for item in original {
        *returned.entry(item.product_id.as_str()).or_insert(0.0) += item.quantity_in_pieces;
    }
    returned
}

fn lookup<'a>(products: &'a HashMap<String, Product>, id: &str) -> CoreResult<&'a Product> {
    products
        .get(id)
        .ok_or_else(|| CoreError::ProductNotFound(id.to_string()))
}

// =============================================================================
// Unit Tests
// =============================================================================
