//! # Domain Types
//!
//! Core domain types used throughout Stockbook.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │◄──│  LedgerEntry    │──►│    Challan      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  quantity (pcs) │   │  kind           │   │  challan_number │       │
//! │  │  previous_stock │   │  quantity, unit │   │  customer_id    │       │
//! │  │  ratios         │   │  qty_in_pieces  │   │  total_pieces   │       │
//! │  │  version        │   │  challan_id?    │   │  items[]        │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  Invariant per product:                                                │
//! │    quantity == previous_stock + Σ produce pieces − Σ deliver pieces    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Frozen Conversion
//! `quantity_in_pieces` on entries and challan items is computed once, with
//! the product's ratios at that moment, and never recomputed. Changing a
//! product's ratios later must not rewrite stock history.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::units::{ConversionRatios, Unit};

// =============================================================================
// Product
// =============================================================================

/// A stock-bearing product variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Owner (user / business) this product belongs to.
    pub owner_id: String,

    /// Display name. Never used as a join key.
    pub name: String,

    /// Display size (e.g. "20mm"). Never used as a join key.
    pub size: Option<String>,

    /// Current stock in pieces. The single source of truth for "on hand".
    pub quantity: f64,

    /// Stock that existed before ledger tracking began, in pieces.
    pub previous_stock: f64,

    pub packets_per_linear: f64,
    pub pieces_per_packet: f64,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,

    /// Bumped on every write; used for conditional updates.
    pub version: i64,
}

impl Product {
    #[inline]
    pub fn ratios(&self) -> ConversionRatios {
        ConversionRatios::new(self.packets_per_linear, self.pieces_per_packet)
    }

    /// Label used in user-facing messages ("Pipe 20mm").
    pub fn display_name(&self) -> String {
        match self.size.as_deref() {
            Some(size) if !size.trim().is_empty() => format!("{} {}", self.name, size.trim()),
            _ => self.name.clone(),
        }
    }
}

/// Input for creating a product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub size: Option<String>,
    pub ratios: ConversionRatios,
    /// Baseline stock, expressed in `initial_unit`.
    pub initial_stock: f64,
    #[serde(default)]
    pub initial_unit: Unit,
}

/// Display and packaging details that can change without touching stock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductDetails {
    pub name: String,
    pub size: Option<String>,
    pub ratios: ConversionRatios,
}

// =============================================================================
// Party
// =============================================================================

/// A customer a challan can be issued to. Only its existence matters here.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Party {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Ledger Entry
// =============================================================================

/// Direction of a stock-affecting event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// Manufactured stock added to the product.
    Produce,
    /// Stock shipped out of the product.
    Deliver,
}

impl EntryKind {
    /// Sign of this kind's effect on stock.
    #[inline]
    pub fn sign(&self) -> f64 {
        match self {
            EntryKind::Produce => 1.0,
            EntryKind::Deliver => -1.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Produce => "produce",
            EntryKind::Deliver => "deliver",
        }
    }
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One stock-affecting event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct LedgerEntry {
    pub id: String,
    pub owner_id: String,
    pub product_id: String,
    pub kind: EntryKind,
    /// Quantity as entered, in `unit`.
    pub quantity: f64,
    pub unit: Unit,
    /// Frozen at entry time with the product's ratios at that time.
    pub quantity_in_pieces: f64,
    #[ts(as = "String")]
    pub entry_date: NaiveDate,
    pub note: String,
    /// Set only for deliveries generated by a challan.
    pub challan_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    pub version: i64,
}

impl LedgerEntry {
    /// Signed effect of this entry on its product's stock, in pieces.
    #[inline]
    pub fn signed_pieces(&self) -> f64 {
        self.kind.sign() * self.quantity_in_pieces
    }
}

/// Input for creating a single ledger entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEntry {
    pub product_id: String,
    pub kind: EntryKind,
    pub quantity: f64,
    pub unit: Unit,
    /// Defaults to today's date from the ledger clock.
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub note: Option<String>,
}

/// Replacement fields for an entry edit. `None` keeps the current value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntryPatch {
    pub product_id: Option<String>,
    pub kind: Option<EntryKind>,
    pub quantity: Option<f64>,
    pub unit: Option<Unit>,
    pub date: Option<NaiveDate>,
    pub note: Option<String>,
}

impl EntryPatch {
    /// Returns true when the patch changes the entry's stock effect.
    pub fn touches_stock(&self) -> bool {
        self.product_id.is_some()
            || self.kind.is_some()
            || self.quantity.is_some()
            || self.unit.is_some()
    }
}

/// Filter for listing entries. Empty filter lists everything for the owner.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntryFilter {
    pub product_id: Option<String>,
    pub kind: Option<EntryKind>,
    pub challan_id: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub limit: Option<u32>,
}

/// Stored piece totals for a product. Never reconverted from current ratios.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductTotals {
    pub produced_pieces: f64,
    pub delivered_pieces: f64,
    pub entry_count: i64,
}

impl ProductTotals {
    /// Net effect of all entries in pieces.
    pub fn net_pieces(&self) -> f64 {
        self.produced_pieces - self.delivered_pieces
    }
}

// =============================================================================
// Challan
// =============================================================================

/// A customer-facing delivery document bundling several deliveries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Challan {
    pub id: String,
    pub owner_id: String,
    /// Per-owner monotonically increasing sequence.
    pub sequence_number: i64,
    /// Zero-padded display form of `sequence_number`.
    pub challan_number: String,
    pub customer_id: String,
    #[ts(as = "String")]
    pub challan_date: NaiveDate,
    pub address: Option<String>,
    pub transport: Option<String>,
    pub notes: Option<String>,
    pub total_pieces: f64,
    pub item_count: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    pub version: i64,
}

/// One line of a challan with its frozen conversion and ratio snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ChallanItem {
    pub id: String,
    pub challan_id: String,
    pub position: i64,
    pub product_id: String,
    /// The delivery entry this line generated.
    pub entry_id: String,
    pub quantity: f64,
    pub unit: Unit,
    pub quantity_in_pieces: f64,
    pub packets_per_linear: f64,
    pub pieces_per_packet: f64,
}

impl ChallanItem {
    /// Ratios as they were when the line was saved.
    #[inline]
    pub fn ratios_snapshot(&self) -> ConversionRatios {
        ConversionRatios::new(self.packets_per_linear, self.pieces_per_packet)
    }
}

/// Header fields of a challan. Opaque to the ledger.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChallanHeader {
    /// Defaults to today's date from the ledger clock.
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub transport: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// A requested challan line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallanItemInput {
    pub product_id: String,
    pub quantity: f64,
    pub unit: Unit,
}

/// A challan together with its ordered items.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ChallanDocument {
    pub challan: Challan,
    pub items: Vec<ChallanItem>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_kind_sign() {
        assert_eq!(EntryKind::Produce.sign(), 1.0);
        assert_eq!(EntryKind::Deliver.sign(), -1.0);
    }

    #[test]
    fn test_patch_touches_stock() {
        assert!(!EntryPatch::default().touches_stock());
        let note_only = EntryPatch {
            note: Some("fixed typo".into()),
            ..Default::default()
        };
        assert!(!note_only.touches_stock());
        let qty = EntryPatch {
            quantity: Some(4.0),
            ..Default::default()
        };
        assert!(qty.touches_stock());
    }

    #[test]
    fn test_product_totals_net() {
        let totals = ProductTotals {
            produced_pieces: 100.0,
            delivered_pieces: 30.0,
            entry_count: 2,
        };
        assert_eq!(totals.net_pieces(), 70.0);
    }
}
