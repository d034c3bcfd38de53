//! # Unit Converter
//!
//! Conversion among the three measurement units a product is counted in.
//!
//! ## Unit Ladder
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Measurement Units                                │
//! │                                                                         │
//! │   1 linear ──(× packets_per_linear)──► packets                          │
//! │   1 packet ──(× pieces_per_packet)───► pieces                           │
//! │                                                                         │
//! │   Example: packets_per_linear = 2, pieces_per_packet = 10              │
//! │     5 linear = 10 packets = 100 pieces                                 │
//! │     3 packet =              30 pieces                                  │
//! │                                                                         │
//! │   Stock is ALWAYS stored in pieces (the base unit).                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! This module is the only place conversion happens. The transaction
//! processor and the challan engine both call into it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};

// =============================================================================
// Unit
// =============================================================================

/// Unit a quantity was entered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    /// Base unit. Stock is stored in pieces.
    #[default]
    Piece,
    /// `pieces_per_packet` pieces.
    Packet,
    /// `packets_per_linear` packets.
    Linear,
}

impl Unit {
    /// Database / wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Unit::Piece => "piece",
            Unit::Packet => "packet",
            Unit::Linear => "linear",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Unit {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "piece" | "pieces" | "pcs" => Ok(Unit::Piece),
            "packet" | "packets" | "pkt" => Ok(Unit::Packet),
            "linear" | "line" => Ok(Unit::Linear),
            other => Err(ValidationError::InvalidFormat {
                field: "unit".to_string(),
                reason: format!("unknown unit '{}', expected piece, packet or linear", other),
            }
            .into()),
        }
    }
}

// =============================================================================
// Conversion Ratios
// =============================================================================

/// The two product-specific ratios used to convert between units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ConversionRatios {
    pub packets_per_linear: f64,
    pub pieces_per_packet: f64,
}

impl ConversionRatios {
    pub const fn new(packets_per_linear: f64, pieces_per_packet: f64) -> Self {
        ConversionRatios {
            packets_per_linear,
            pieces_per_packet,
        }
    }

    /// Pieces in one unit of `unit`.
    ///
    /// Only the ratios that `unit` actually needs are checked, so a product
    /// with no linear packaging can still be counted in pieces and packets.
    pub fn pieces_per(&self, unit: Unit) -> CoreResult<f64> {
        match unit {
            Unit::Piece => Ok(1.0),
            Unit::Packet => {
                self.require_positive(self.pieces_per_packet)?;
                Ok(self.pieces_per_packet)
            }
            Unit::Linear => {
                self.require_positive(self.packets_per_linear)?;
                self.require_positive(self.pieces_per_packet)?;
                Ok(self.packets_per_linear * self.pieces_per_packet)
            }
        }
    }

    /// Returns true when both ratios are strictly positive.
    pub fn is_complete(&self) -> bool {
        is_positive(self.packets_per_linear) && is_positive(self.pieces_per_packet)
    }

    fn require_positive(&self, ratio: f64) -> CoreResult<()> {
        if is_positive(ratio) {
            Ok(())
        } else {
            Err(CoreError::InvalidConversionFactors {
                packets_per_linear: self.packets_per_linear,
                pieces_per_packet: self.pieces_per_packet,
            })
        }
    }
}

fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

fn require_quantity(quantity: f64) -> CoreResult<()> {
    if quantity.is_nan() || quantity.is_infinite() || quantity < 0.0 {
        return Err(CoreError::InvalidQuantity { value: quantity });
    }
    Ok(())
}

// =============================================================================
// Conversion Functions
// =============================================================================

/// Converts `quantity` expressed in `unit` to pieces.
///
/// ## Example
/// ```rust
/// use stockbook_core::units::{to_pieces, ConversionRatios, Unit};
///
/// let ratios = ConversionRatios::new(2.0, 10.0);
/// assert_eq!(to_pieces(5.0, Unit::Linear, &ratios).unwrap(), 100.0);
/// assert_eq!(to_pieces(3.0, Unit::Packet, &ratios).unwrap(), 30.0);
/// assert!(to_pieces(-1.0, Unit::Piece, &ratios).is_err());
/// ```
pub fn to_pieces(quantity: f64, unit: Unit, ratios: &ConversionRatios) -> CoreResult<f64> {
    require_quantity(quantity)?;
    Ok(quantity * ratios.pieces_per(unit)?)
}

/// Converts a piece count back to `unit`.
pub fn from_pieces(pieces: f64, unit: Unit, ratios: &ConversionRatios) -> CoreResult<f64> {
    require_quantity(pieces)?;
    Ok(pieces / ratios.pieces_per(unit)?)
}

/// Converts between any two units (read-only helper for display callers).
pub fn convert(
    quantity: f64,
    from: Unit,
    to: Unit,
    ratios: &ConversionRatios,
) -> CoreResult<f64> {
    let pieces = to_pieces(quantity, from, ratios)?;
    from_pieces(pieces, to, ratios)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const RATIOS: ConversionRatios = ConversionRatios::new(2.0, 10.0);

    #[test]
    fn test_to_pieces() {
        assert_eq!(to_pieces(7.0, Unit::Piece, &RATIOS).unwrap(), 7.0);
        assert_eq!(to_pieces(3.0, Unit::Packet, &RATIOS).unwrap(), 30.0);
        assert_eq!(to_pieces(5.0, Unit::Linear, &RATIOS).unwrap(), 100.0);
    }

    #[test]
    fn test_round_trip_within_tolerance() {
        let ratios = ConversionRatios::new(3.0, 7.0);
        for unit in [Unit::Piece, Unit::Packet, Unit::Linear] {
            for q in [0.0, 1.0, 2.5, 13.37, 1000.0] {
                let pieces = to_pieces(q, unit, &ratios).unwrap();
                let back = from_pieces(pieces, unit, &ratios).unwrap();
                assert!((back - q).abs() < 1e-9, "{unit}: {q} -> {back}");
            }
        }
    }

    #[test]
    fn test_invalid_quantity() {
        assert!(matches!(
            to_pieces(-1.0, Unit::Piece, &RATIOS),
            Err(CoreError::InvalidQuantity { .. })
        ));
        assert!(matches!(
            to_pieces(f64::NAN, Unit::Packet, &RATIOS),
            Err(CoreError::InvalidQuantity { .. })
        ));
    }

    #[test]
    fn test_invalid_ratios_only_fail_when_needed() {
        let no_linear = ConversionRatios::new(0.0, 12.0);
        assert_eq!(to_pieces(2.0, Unit::Packet, &no_linear).unwrap(), 24.0);
        assert!(matches!(
            to_pieces(2.0, Unit::Linear, &no_linear),
            Err(CoreError::InvalidConversionFactors { .. })
        ));

        let broken = ConversionRatios::new(2.0, -1.0);
        assert_eq!(to_pieces(4.0, Unit::Piece, &broken).unwrap(), 4.0);
        assert!(to_pieces(1.0, Unit::Packet, &broken).is_err());
        assert!(from_pieces(10.0, Unit::Linear, &broken).is_err());
    }

    #[test]
    fn test_convert_between_units() {
        assert_eq!(convert(5.0, Unit::Linear, Unit::Packet, &RATIOS).unwrap(), 10.0);
        assert_eq!(convert(40.0, Unit::Piece, Unit::Linear, &RATIOS).unwrap(), 2.0);
    }

    #[test]
    fn test_unit_parsing() {
        assert_eq!("Packet".parse::<Unit>().unwrap(), Unit::Packet);
        assert_eq!("pcs".parse::<Unit>().unwrap(), Unit::Piece);
        assert_eq!("linear".parse::<Unit>().unwrap(), Unit::Linear);
        assert!("crate".parse::<Unit>().is_err());
    }
}
