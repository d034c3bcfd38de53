//! # Error Types
//!
//! Domain-specific error types for stockbook-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  stockbook-core errors (this file)                                     │
//! │  ├── CoreError        - Reference, business-rule and conversion errors │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  stockbook-db errors (separate crate)                                  │
//! │  └── DbError          - Storage failures, conflicts, wraps CoreError   │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → caller (CRUD layer)     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Categories
//! - **Validation**: `InvalidQuantity`, `InvalidConversionFactors`, `Validation`
//! - **Business rule**: `InsufficientStock`, `ProductInUse`, `EntryOwnedByChallan`
//! - **Reference**: `ProductNotFound`, `EntryNotFound`, `ChallanNotFound`, `CustomerNotFound`
//!
//! All of them are caller-correctable. None of them is ever retried.

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core ledger errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    /// Product (stock-bearing entity) cannot be found for this owner.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Ledger entry cannot be found for this owner.
    #[error("Ledger entry not found: {0}")]
    EntryNotFound(String),

    /// Challan cannot be found for this owner.
    #[error("Challan not found: {0}")]
    ChallanNotFound(String),

    /// Customer referenced by a challan does not exist.
    #[error("Customer not found: {0}")]
    CustomerNotFound(String),

    /// Not enough stock on hand for a delivery.
    ///
    /// ## User Workflow
    /// ```text
    /// Deliver 3 packets of "Pipe 20mm" (= 30 pieces)
    ///      │
    ///      ▼
    /// Check stock: available = 25 pieces
    ///      │
    ///      ▼
    /// InsufficientStock { product: "Pipe 20mm", available: 25, requested: 30 }
    ///      │
    ///      ▼
    /// UI shows: "Insufficient stock for Pipe 20mm: available 25 pieces, requested 30 pieces"
    /// ```
    #[error("Insufficient stock for {product}: available {available} pieces, requested {requested} pieces")]
    InsufficientStock {
        product: String,
        available: f64,
        requested: f64,
    },

    /// Quantity is negative or not a number.
    #[error("Invalid quantity: {value}")]
    InvalidQuantity { value: f64 },

    /// Ratios needed for a packet/linear conversion are not strictly positive.
    #[error(
        "Invalid conversion factors: packets_per_linear={packets_per_linear}, pieces_per_packet={pieces_per_packet}"
    )]
    InvalidConversionFactors {
        packets_per_linear: f64,
        pieces_per_packet: f64,
    },

    /// Product cannot be deleted while ledger history references it.
    #[error("Product {product_id} is referenced by {references} ledger records")]
    ProductInUse { product_id: String, references: i64 },

    /// Entry belongs to a challan and can only change through that challan.
    #[error("Ledger entry {entry_id} belongs to challan {challan_id}")]
    EntryOwnedByChallan { entry_id: String, challan_id: String },

    /// Challan was submitted without items.
    #[error("Challan must contain at least one item")]
    EmptyChallan,

    /// Challan has more items than allowed.
    #[error("Challan cannot have more than {max} items")]
    TooManyItems { max: usize },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Returns true for stale or unknown ids (404-equivalent for callers).
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CoreError::ProductNotFound(_)
                | CoreError::EntryNotFound(_)
                | CoreError::ChallanNotFound(_)
                | CoreError::CustomerNotFound(_)
        )
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when user input doesn't meet requirements.
/// Used for early validation before any stock is planned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID, malformed challan number).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Date range is inverted.
    #[error("{field} range is invalid: {reason}")]
    InvalidRange { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_stock_message() {
        let err = CoreError::InsufficientStock {
            product: "Pipe 20mm".to_string(),
            available: 20.0,
            requested: 25.0,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for Pipe 20mm: available 20 pieces, requested 25 pieces"
        );
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "name".to_string(),
        };
        assert_eq!(err.to_string(), "name is required");

        let err = ValidationError::TooLong {
            field: "note".to_string(),
            max: 500,
        };
        assert_eq!(err.to_string(), "note must be at most 500 characters");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "customer_id".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }

    #[test]
    fn test_not_found_classification() {
        assert!(CoreError::ChallanNotFound("x".into()).is_not_found());
        assert!(!CoreError::EmptyChallan.is_not_found());
    }
}
