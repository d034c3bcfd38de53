//! # Repository Module
//!
//! Database repository implementations for Stockbook.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Reads vs. Ledger Writes                              │
//! │                                                                         │
//! │  Report / CRUD caller                                                  │
//! │       │                                                                 │
//! │       │  db.products().list(owner)          ← public reads on the pool │
//! │       │  db.entries().list(owner, filter)                              │
//! │       ▼                                                                 │
//! │  XxxRepository { pool }                                                │
//! │                                                                         │
//! │  LedgerService (crate::ledger)                                         │
//! │       │                                                                 │
//! │       │  product::apply_change(&mut tx, ..) ← pub(crate) writes that   │
//! │       │  entry::insert(&mut tx, ..)           take the open transaction │
//! │       ▼                                                                 │
//! │  SQLite (one transaction per ledger operation)                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Anything that moves stock is only reachable through the ledger service,
//! so a product quantity can never change without its ledger rows.
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`](product::ProductRepository) - Products and conditional stock writes
//! - [`EntryRepository`](entry::EntryRepository) - Ledger entries and stored totals
//! - [`ChallanRepository`](challan::ChallanRepository) - Challans, items and numbering
//! - [`PartyRepository`](party::PartyRepository) - Customer existence

pub mod challan;
pub mod entry;
pub mod party;
pub mod product;
