//! # Consistency Audit
//!
//! Detection of drift between a product's stored quantity and its ledger.
//!
//! ```text
//! expected = previous_stock + Σ produce.quantity_in_pieces − Σ deliver.quantity_in_pieces
//! drift    = stored − expected
//! ```
//!
//! Findings are reported, never auto-corrected: a drift is a symptom of a
//! bug elsewhere, and silently resetting the number hides it.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::types::{Product, ProductTotals};
use crate::QUANTITY_EPSILON;

/// One consistency problem found by the audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConsistencyIssue {
    /// Stored quantity disagrees with the ledger total.
    QuantityDrift {
        product_id: String,
        product_name: String,
        stored: f64,
        expected: f64,
    },
    /// Entry references a product that no longer exists.
    OrphanedEntry { entry_id: String, product_id: String },
    /// Challan line whose delivery entry is missing or disagrees with it.
    ChallanItemMismatch {
        challan_id: String,
        item_id: String,
        entry_id: String,
        reason: String,
    },
    /// Stored challan total disagrees with the sum of its lines.
    ChallanTotalMismatch {
        challan_id: String,
        stored: f64,
        expected: f64,
    },
}

impl ConsistencyIssue {
    /// Product id this issue can be repaired on, if any.
    pub fn drifted_product(&self) -> Option<&str> {
        match self {
            ConsistencyIssue::QuantityDrift { product_id, .. } => Some(product_id),
            _ => None,
        }
    }
}

/// Full audit output.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ConsistencyReport {
    pub products_checked: i64,
    pub entries_checked: i64,
    pub challans_checked: i64,
    pub issues: Vec<ConsistencyIssue>,
}

impl ConsistencyReport {
    pub fn is_consistent(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Quantity the ledger says `product` should have.
pub fn expected_quantity(previous_stock: f64, totals: &ProductTotals) -> f64 {
    previous_stock + totals.net_pieces()
}

/// Returns a drift issue when stored and expected differ beyond tolerance.
pub fn check_product(product: &Product, totals: &ProductTotals) -> Option<ConsistencyIssue> {
    let expected = expected_quantity(product.previous_stock, totals);
    if (product.quantity - expected).abs() > QUANTITY_EPSILON {
        Some(ConsistencyIssue::QuantityDrift {
            product_id: product.id.clone(),
            product_name: product.display_name(),
            stored: product.quantity,
            expected,
        })
    } else {
        None
    }
}

/// Returns a total mismatch issue for a challan.
pub fn check_challan_total(
    challan_id: &str,
    stored: f64,
    line_pieces: impl IntoIterator<Item = f64>,
) -> Option<ConsistencyIssue> {
    let expected: f64 = line_pieces.into_iter().sum();
    if (stored - expected).abs() > QUANTITY_EPSILON {
        Some(ConsistencyIssue::ChallanTotalMismatch {
            challan_id: challan_id.to_string(),
            stored,
            expected,
        })
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::tests::product;

    fn totals(produced: f64, delivered: f64) -> ProductTotals {
        ProductTotals {
            produced_pieces: produced,
            delivered_pieces: delivered,
            entry_count: 2,
        }
    }

    #[test]
    fn test_consistent_product() {
        let mut p = product("a", 80.0);
        p.previous_stock = 10.0;
        assert!(check_product(&p, &totals(100.0, 30.0)).is_none());
    }

    #[test]
    fn test_drift_detected() {
        let p = product("a", 100.0);
        let issue = check_product(&p, &totals(100.0, 30.0)).unwrap();
        assert_eq!(issue.drifted_product(), Some("a"));
        assert!(matches!(
            issue,
            ConsistencyIssue::QuantityDrift { expected, stored, .. } if expected == 70.0 && stored == 100.0
        ));
    }

    #[test]
    fn test_challan_total() {
        assert!(check_challan_total("c", 30.0, [10.0, 20.0]).is_none());
        assert!(check_challan_total("c", 31.0, [10.0, 20.0]).is_some());
    }

    #[test]
    fn test_report_serializes_tagged() {
        let report = ConsistencyReport {
            issues: vec![ConsistencyIssue::OrphanedEntry {
                entry_id: "e".into(),
                product_id: "p".into(),
            }],
            ..Default::default()
        };
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"type\":\"orphaned_entry\""));
        assert!(!report.is_consistent());
    }
}
