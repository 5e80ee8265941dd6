//! Units of measure and recipe-to-inventory conversion.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Physical family a unit belongs to. Conversion is only defined within a family.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitFamily {
    Mass,
    Volume,
    Count,
}

/// Supported units of measure.
///
/// The serialized form is the short token (`g`, `kg`, `ml`, `l`, `unit`, `piece`),
/// which is also what the database stores.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Unit {
    #[serde(rename = "g", alias = "gram", alias = "grams")]
    Gram,
    #[serde(rename = "kg", alias = "kilogram", alias = "kilograms")]
    Kilogram,
    #[serde(rename = "ml", alias = "mL", alias = "milliliter", alias = "millilitre")]
    Milliliter,
    #[serde(rename = "l", alias = "L", alias = "liter", alias = "litre")]
    Liter,
    #[serde(rename = "unit", alias = "units", alias = "u")]
    Each,
    #[serde(rename = "piece", alias = "pieces", alias = "pc", alias = "pcs")]
    Piece,
}

impl Unit {
    pub const ALL: [Unit; 6] = [
        Unit::Gram,
        Unit::Kilogram,
        Unit::Milliliter,
        Unit::Liter,
        Unit::Each,
        Unit::Piece,
    ];

    pub fn family(self) -> UnitFamily {
        match self {
            Unit::Gram | Unit::Kilogram => UnitFamily::Mass,
            Unit::Milliliter | Unit::Liter => UnitFamily::Volume,
            Unit::Each | Unit::Piece => UnitFamily::Count,
        }
    }

    /// Multiplier to the family's base unit (g, ml, unit).
    fn base_factor(self) -> f64 {
        match self {
            Unit::Gram | Unit::Milliliter | Unit::Each | Unit::Piece => 1.0,
            Unit::Kilogram | Unit::Liter => 1000.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Unit::Gram => "g",
            Unit::Kilogram => "kg",
            Unit::Milliliter => "ml",
            Unit::Liter => "l",
            Unit::Each => "unit",
            Unit::Piece => "piece",
        }
    }

    /// Express `quantity` of `self` in `target`.
    pub fn convert(self, quantity: f64, target: Unit) -> Result<f64, UnitError> {
        if self.family() != target.family() {
            return Err(UnitError::Incompatible {
                from: self,
                to: target,
            });
        }
        Ok(quantity * self.base_factor() / target.base_factor())
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Unit {
    type Err = UnitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim().to_ascii_lowercase();
        let unit = match token.as_str() {
            "g" | "gram" | "grams" => Unit::Gram,
            "kg" | "kilogram" | "kilograms" => Unit::Kilogram,
            "ml" | "milliliter" | "millilitre" => Unit::Milliliter,
            "l" | "liter" | "litre" => Unit::Liter,
            "unit" | "units" | "u" => Unit::Each,
            "piece" | "pieces" | "pc" | "pcs" => Unit::Piece,
            _ => return Err(UnitError::Unknown(s.to_string())),
        };
        Ok(unit)
    }
}

/// Unit conversion failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UnitError {
    /// The token does not name a supported unit.
    #[error("unknown unit: {0:?}")]
    Unknown(String),

    /// Source and target units belong to different families.
    #[error("cannot convert {from} to {to}: incompatible unit families")]
    Incompatible { from: Unit, to: Unit },
}

/// Express `quantity` (in `source`, or already in `target` when `None`) in the
/// inventory unit `target`.
pub fn to_inventory_unit(quantity: f64, source: Option<Unit>, target: Unit) -> Result<f64, UnitError> {
    match source {
        None => Ok(quantity),
        Some(source) => source.convert(quantity, target),
    }
}
