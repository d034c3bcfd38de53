//! # Validation Module
//!
//! Input validation run before any stock is planned.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Caller (CRUD route / form)                                   │
//! │  └── Basic format checks, immediate user feedback                      │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── Names, notes, ids, quantities                                     │
//! │  └── Challan item counts                                               │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK (quantity >= 0)                                             │
//! │  ├── UNIQUE (owner_id, sequence_number)                                │
//! │  └── Foreign keys (entries → products, items → challans)               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::NaiveDate;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::types::{ChallanItemInput, EntryFilter};
use crate::MAX_CHALLAN_ITEMS;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

const MAX_NAME_LEN: usize = 200;
const MAX_TEXT_LEN: usize = 1000;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a product or party name.
///
/// ## Example
/// ```rust
/// use stockbook_core::validation::validate_name;
///
/// assert!(validate_name("name", "PVC Pipe").is_ok());
/// assert!(validate_name("name", "  ").is_err());
/// ```
pub fn validate_name(field: &str, name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if name.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_NAME_LEN,
        });
    }

    Ok(())
}

/// Validates optional free text (notes, address, transport).
pub fn validate_text(field: &str, text: Option<&str>) -> ValidationResult<()> {
    match text {
        Some(t) if t.chars().count() > MAX_TEXT_LEN => Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_TEXT_LEN,
        }),
        _ => Ok(()),
    }
}

/// Validates a UUID string format.
///
/// ## Example
/// ```rust
/// use stockbook_core::validation::validate_uuid;
///
/// assert!(validate_uuid("product_id", "550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("product_id", "not-a-uuid").is_err());
/// ```
pub fn validate_uuid(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a quantity entered on an entry or challan line.
///
/// Negative and NaN values are `InvalidQuantity`; zero is rejected because an
/// entry that moves no stock has no place in the ledger.
pub fn validate_entry_quantity(quantity: f64) -> CoreResult<()> {
    if quantity.is_nan() || quantity.is_infinite() || quantity < 0.0 {
        return Err(CoreError::InvalidQuantity { value: quantity });
    }
    if quantity == 0.0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        }
        .into());
    }
    Ok(())
}

/// Validates a baseline stock value (zero allowed).
pub fn validate_stock_baseline(quantity: f64) -> CoreResult<()> {
    if quantity.is_nan() || quantity.is_infinite() || quantity < 0.0 {
        return Err(CoreError::InvalidQuantity { value: quantity });
    }
    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Validates the shape of a challan item list before any lookups.
pub fn validate_challan_items(items: &[ChallanItemInput]) -> CoreResult<()> {
    if items.is_empty() {
        return Err(CoreError::EmptyChallan);
    }
    if items.len() > MAX_CHALLAN_ITEMS {
        return Err(CoreError::TooManyItems {
            max: MAX_CHALLAN_ITEMS,
        });
    }
    for item in items {
        if item.product_id.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "product_id".to_string(),
            }
            .into());
        }
        validate_entry_quantity(item.quantity)?;
    }
    Ok(())
}

/// Validates an entry listing filter.
pub fn validate_entry_filter(filter: &EntryFilter) -> ValidationResult<()> {
    validate_date_range(filter.from, filter.to)
}

fn validate_date_range(from: Option<NaiveDate>, to: Option<NaiveDate>) -> ValidationResult<()> {
    if let (Some(from), Some(to)) = (from, to) {
        if from > to {
            return Err(ValidationError::InvalidRange {
                field: "date".to_string(),
                reason: format!("{} is after {}", from, to),
            });
        }
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::Unit;

    fn item(qty: f64) -> ChallanItemInput {
        ChallanItemInput {
            product_id: "p-1".to_string(),
            quantity: qty,
            unit: Unit::Piece,
        }
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("name", "PVC Pipe").is_ok());
        assert!(validate_name("name", "").is_err());
        assert!(validate_name("name", &"A".repeat(300)).is_err());
    }

    #[test]
    fn test_validate_text() {
        assert!(validate_text("note", None).is_ok());
        assert!(validate_text("note", Some("")).is_ok());
        assert!(validate_text("note", Some(&"x".repeat(1001))).is_err());
    }

    #[test]
    fn test_validate_entry_quantity() {
        assert!(validate_entry_quantity(1.5).is_ok());
        assert!(matches!(
            validate_entry_quantity(-2.0),
            Err(CoreError::InvalidQuantity { .. })
        ));
        assert!(matches!(
            validate_entry_quantity(0.0),
            Err(CoreError::Validation(ValidationError::MustBePositive { .. }))
        ));
        assert!(validate_entry_quantity(f64::NAN).is_err());
        assert!(validate_stock_baseline(0.0).is_ok());
    }

    #[test]
    fn test_validate_challan_items() {
        assert_eq!(validate_challan_items(&[]), Err(CoreError::EmptyChallan));
        assert!(validate_challan_items(&[item(3.0)]).is_ok());
        assert!(validate_challan_items(&[item(3.0), item(-1.0)]).is_err());

        let too_many: Vec<_> = (0..=MAX_CHALLAN_ITEMS).map(|_| item(1.0)).collect();
        assert!(matches!(
            validate_challan_items(&too_many),
            Err(CoreError::TooManyItems { .. })
        ));
    }

    #[test]
    fn test_validate_uuid() {
        assert!(validate_uuid("id", "550e8400-e29b-41d4-a716-446655440000").is_ok());
        assert!(validate_uuid("id", "").is_err());
        assert!(validate_uuid("id", "123").is_err());
    }

    #[test]
    fn test_validate_entry_filter() {
        let d = |day| NaiveDate::from_ymd_opt(2026, 3, day).unwrap();
        let ok = EntryFilter {
            from: Some(d(1)),
            to: Some(d(31)),
            ..Default::default()
        };
        assert!(validate_entry_filter(&ok).is_ok());
        let inverted = EntryFilter {
            from: Some(d(20)),
            to: Some(d(2)),
            ..Default::default()
        };
        assert!(validate_entry_filter(&inverted).is_err());
    }
}
