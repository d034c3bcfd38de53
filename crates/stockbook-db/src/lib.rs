//! # stockbook-db: Database Layer and Ledger Services
//!
//! SQLite storage for the stock ledger, and the [`LedgerService`] that is
//! the only code path allowed to move stock.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Stockbook Data Flow                              │
//! │                                                                         │
//! │  Caller (seed / reconcile / an embedding app)                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   stockbook-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │ LedgerService │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │  (ledger/)    │───►│ product.rs    │    │  (embedded)  │  │   │
//! │  │   │               │    │ entry.rs      │    │              │  │   │
//! │  │   │ plan (core) → │    │ challan.rs    │    │ 001_initial  │  │   │
//! │  │   │ commit (tx)   │    │ party.rs      │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │          │                                                      │   │
//! │  │          ▼                                                      │   │
//! │  │   stockbook-core: units, planning, audit checks (pure)         │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  │   ~/.local/share/stockbook/stockbook.db                         │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`config`] - TOML / environment configuration
//! - [`repository`] - Row access (products, entries, challans, parties)
//! - [`ledger`] - Transaction processor, challan engine, consistency audit
//!
//! ## Usage
//!
//! ```rust,ignore
//! use stockbook_db::{Database, StockbookConfig};
//!
//! let config = StockbookConfig::load(None)?;
//! let db = Database::new(config.to_db_config()).await?;
//!
//! let ledger = db.ledger(DEFAULT_OWNER_ID);
//! let doc = ledger.save_challan(&customer_id, ChallanHeader::default(), &items).await?;
//! println!("Issued challan {}", doc.challan.challan_number);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod ledger;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::StockbookConfig;
pub use error::{DbError, DbResult};
pub use ledger::{LedgerService, LedgerSettings};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::challan::ChallanRepository;
pub use repository::entry::EntryRepository;
pub use repository::party::PartyRepository;
pub use repository::product::ProductRepository;

use tracing_subscriber::EnvFilter;

/// Installs the global `tracing` subscriber.
///
/// `RUST_LOG` wins over `filter` when set. Calling this twice is harmless.
pub fn init_tracing(filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init();
}
