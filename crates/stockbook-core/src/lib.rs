//! # stockbook-core: Pure Ledger Logic for Stockbook
//!
//! This crate is the **heart** of Stockbook. It contains the stock ledger's
//! rules as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Stockbook Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │        Callers (CRUD routes, PDF challans, dashboards)          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │          stockbook-db (LedgerService, repositories)             │   │
//! │  │      reads rows → asks this crate for a plan → commits it       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ stockbook-core (THIS CRATE) ★                   │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐  │   │
//! │  │   │  units  │ │ ledger  │ │ challan │ │  audit  │ │  types  │  │   │
//! │  │   │ convert │ │ revert/ │ │  pools  │ │  drift  │ │ Product │  │   │
//! │  │   │         │ │  apply  │ │         │ │         │ │ Entry   │  │   │
//! │  │   └─────────┘ └─────────┘ └─────────┘ └─────────┘ └─────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO LOGGING • PURE FUNCTIONS            │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`units`] - Unit converter (piece / packet / linear)
//! - [`types`] - Domain types (Product, LedgerEntry, Challan, ...)
//! - [`ledger`] - Stock planning for single entries
//! - [`challan`] - Stock planning for challans (availability pools)
//! - [`audit`] - Ledger consistency checks
//! - [`numbering`] - Challan number formatting/parsing
//! - [`clock`] - Injected time source
//! - [`validation`] - Input validation
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use stockbook_core::units::{to_pieces, ConversionRatios, Unit};
//!
//! // 2 packets per linear, 10 pieces per packet
//! let ratios = ConversionRatios::new(2.0, 10.0);
//!
//! // 5 linear = 100 pieces
//! assert_eq!(to_pieces(5.0, Unit::Linear, &ratios).unwrap(), 100.0);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod audit;
pub mod challan;
pub mod clock;
pub mod error;
pub mod ledger;
pub mod numbering;
pub mod types;
pub mod units;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use audit::{ConsistencyIssue, ConsistencyReport};
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{CoreError, CoreResult, ValidationError};
pub use ledger::StockChange;
pub use types::*;
pub use units::{ConversionRatios, Unit};

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Owner id used by single-user deployments and the seed binary.
pub const DEFAULT_OWNER_ID: &str = "00000000-0000-0000-0000-000000000001";

/// Float tolerance in pieces for sufficiency checks and drift detection.
///
/// Unit conversion multiplies by fractional ratios, so exact comparisons
/// would reject deliveries of exactly the stock on hand.
pub const QUANTITY_EPSILON: f64 = 1e-6;

/// Maximum lines on a single challan.
pub const MAX_CHALLAN_ITEMS: usize = 100;

/// Default zero-padding width for challan numbers ("0001").
pub const DEFAULT_CHALLAN_NUMBER_WIDTH: usize = 4;
