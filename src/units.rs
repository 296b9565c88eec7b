//! Units of measure for ingredient prices

use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;

/// Unit an ingredient is priced in.
///
/// Quantities inside recipes are always written in grams, millilitres or
/// pieces, so a price per kilogram or per litre has to be scaled down before
/// it is multiplied by a recipe quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Kg,
    G,
    L,
    Ml,
    Pz,
    Unit,
}

impl Unit {
    /// Factor applied to `price_per_unit × quantity`.
    pub fn quantity_factor(self) -> f64 {
        match self {
            Unit::Kg | Unit::L => 0.001,
            Unit::G | Unit::Ml | Unit::Pz | Unit::Unit => 1.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Unit::Kg => "kg",
            Unit::G => "g",
            Unit::L => "l",
            Unit::Ml => "ml",
            Unit::Pz => "pz",
            Unit::Unit => "unit",
        }
    }
}

impl FromStr for Unit {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kg" => Ok(Unit::Kg),
            "g" => Ok(Unit::G),
            "l" | "lt" => Ok(Unit::L),
            "ml" => Ok(Unit::Ml),
            "pz" | "pcs" => Ok(Unit::Pz),
            "unit" | "u" => Ok(Unit::Unit),
            other => Err(ParseError::UnknownUnit(other.to_string())),
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
