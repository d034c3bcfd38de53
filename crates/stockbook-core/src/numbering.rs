//! # Challan Numbering
//!
//! Display formatting and parsing of per-owner challan sequence numbers.
//! Allocation itself is an atomic counter in the database; this module only
//! turns sequences into strings and back.

use crate::error::{CoreResult, ValidationError};

/// Formats a sequence number zero-padded to `width` digits.
///
/// ## Example
/// ```rust
/// use stockbook_core::numbering::format_challan_number;
///
/// assert_eq!(format_challan_number(12, 4), "0012");
/// assert_eq!(format_challan_number(12345, 4), "12345");
/// ```
pub fn format_challan_number(sequence: i64, width: usize) -> String {
    format!("{:0width$}", sequence, width = width)
}

/// Parses the numeric suffix of a displayed challan number.
///
/// Accepts `"0012"`, `"12"` and prefixed forms such as `"DC-0012"` or
/// `"DC/2026/0012"`.
pub fn parse_challan_number(input: &str) -> CoreResult<i64> {
    let trimmed = input.trim();
    let digits: String = trimmed
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();

    let invalid = |reason: &str| ValidationError::InvalidFormat {
        field: "challan_number".to_string(),
        reason: reason.to_string(),
    };

    if digits.is_empty() {
        return Err(invalid("must end with a number").into());
    }

    let sequence: i64 = digits
        .parse()
        .map_err(|_| invalid("number is too large"))?;

    if sequence == 0 {
        return Err(invalid("sequence starts at 1").into());
    }

    Ok(sequence)
}
