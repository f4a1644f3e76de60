// Copyright (c) 2018-2019  Ministerio de Fomento
//                          Instituto de Ciencias de la Construcción Eduardo Torroja (IETcc-CSIC)

// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:

// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.

// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

// Author(s): Rafael Villar Burke <pachi@ietcc.csic.es>

/*!
Number and unit pair
=====================

`EngineNumber` pairs an exact decimal value with a free-form unit label.
Unlike `RenNren` (a fixed renewable/non-renewable pair of `f32`s) this is a
single scalar with a dynamic unit string, since the engine's unit vocabulary
is open-ended (composite rates like `kg/unit` are constructed at runtime).
*/

use std::fmt;
use std::ops::{Add, Div, Mul, Sub};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// A decimal value tagged with a unit label.
///
/// An empty unit string denotes a dimensionless quantity. Units are
/// free-form labels drawn from the closed vocabulary documented at the crate
/// root: mass (`kg`, `mt`), count (`unit`, `units`), time (`year`, `years`),
/// intensity (`tCO2e`, `kwh`), percentage (`%`), and composite rates written
/// as `A / B` or the synthesized `<unit>eachyear` form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EngineNumber {
    /// Exact decimal value
    pub value: Decimal,
    /// Unit label; empty means dimensionless
    pub units: EngineUnit,
}

/// Interned-by-value unit label. A thin wrapper rather than a bare `String`
/// so comparisons and composite-unit synthesis live in one place.
pub type EngineUnit = UnitLabel;

/// A unit label, stored as an owned string.
///
/// Kept as its own type (rather than passing `&str`/`String` around
/// everywhere) so `EngineNumber::mul`/`div` can synthesize composite labels
/// like `kg/unit` without the caller needing to know the joining rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct UnitLabel(pub String);

impl UnitLabel {
    /// The dimensionless unit (empty label).
    pub fn none() -> Self {
        UnitLabel(String::new())
    }

    /// Construct from any string-like value.
    pub fn new<T: Into<String>>(s: T) -> Self {
        UnitLabel(s.into())
    }

    /// True for the dimensionless unit.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Build the composite rate label for `self / other`, e.g. `kg` over
    /// `unit` becomes `kg/unit`.
    pub fn composite_over(&self, other: &UnitLabel) -> UnitLabel {
        UnitLabel(format!("{}/{}", self.0, other.0))
    }

    /// Build the synthesized `<unit>eachyear` annual-delta label.
    pub fn each_year(&self) -> UnitLabel {
        UnitLabel(format!("{}eachyear", self.0))
    }

    /// True if this label ends in the `eachyear` suffix.
    pub fn is_each_year(&self) -> bool {
        self.0.ends_with("eachyear")
    }

    /// Strip the `eachyear` suffix, returning the base unit.
    pub fn strip_each_year(&self) -> UnitLabel {
        if self.is_each_year() {
            UnitLabel(self.0[..self.0.len() - "eachyear".len()].to_string())
        } else {
            self.clone()
        }
    }

    /// True for the percentage unit.
    pub fn is_percentage(&self) -> bool {
        self.0 == "%"
    }

    /// As a plain `&str`.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnitLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for UnitLabel {
    fn from(s: &str) -> Self {
        UnitLabel(s.to_string())
    }
}

impl From<String> for UnitLabel {
    fn from(s: String) -> Self {
        UnitLabel(s)
    }
}

impl From<&String> for UnitLabel {
    fn from(s: &String) -> Self {
        UnitLabel(s.clone())
    }
}

impl EngineNumber {
    /// Construct a new tagged value.
    pub fn new<U: Into<UnitLabel>>(value: Decimal, units: U) -> Self {
        EngineNumber {
            value,
            units: units.into(),
        }
    }

    /// Zero in the given unit.
    pub fn zero<U: Into<UnitLabel>>(units: U) -> Self {
        EngineNumber::new(Decimal::ZERO, units)
    }

    /// Dimensionless zero.
    pub fn dimensionless_zero() -> Self {
        EngineNumber::zero(UnitLabel::none())
    }

    /// True iff the decimal value is non-zero (used by logical primitives).
    pub fn is_truthy(&self) -> bool {
        !self.value.is_zero()
    }

    /// Dimensionless 0/1 value, used for comparisons and logical ops.
    pub fn boolean(b: bool) -> Self {
        EngineNumber::new(if b { Decimal::ONE } else { Decimal::ZERO }, UnitLabel::none())
    }

    /// Add, preserving the unit when both sides agree or one side is
    /// dimensionless; composite otherwise follows the same disagreement
    /// rule as multiply (spec §4.1: "higher layers invoke the unit
    /// converter when a specific target unit is required" — this layer does
    /// not attempt reconciliation on its own).
    pub fn add(&self, other: &EngineNumber) -> EngineNumber {
        let units = Self::combine_additive_units(&self.units, &other.units);
        EngineNumber::new(self.value + other.value, units)
    }

    /// Subtract, same unit-combination rule as `add`.
    pub fn sub(&self, other: &EngineNumber) -> EngineNumber {
        let units = Self::combine_additive_units(&self.units, &other.units);
        EngineNumber::new(self.value - other.value, units)
    }

    /// Multiply. Same-unit operands do not cancel to dimensionless here —
    /// that would require algebraic simplification, which spec §4.1
    /// explicitly leaves to higher layers; instead a composite `A/` style
    /// label is synthesized when operands disagree, and the non-empty
    /// unit is preserved when the other side is dimensionless.
    pub fn mul(&self, other: &EngineNumber) -> EngineNumber {
        let units = Self::combine_multiplicative_units(&self.units, &other.units);
        EngineNumber::new(self.value * other.value, units)
    }

    /// Divide. Division by zero is an `ArithmeticError`.
    pub fn div(&self, other: &EngineNumber) -> Result<EngineNumber> {
        if other.value.is_zero() {
            return Err(EngineError::ArithmeticError(format!(
                "division by zero ({} / {})",
                self.value, other.value
            )));
        }
        let units = if self.units == other.units {
            UnitLabel::none()
        } else if other.units.is_empty() {
            self.units.clone()
        } else if self.units.is_empty() {
            other.units.composite_over(&self.units).inverse_of_dimensionless(&other.units)
        } else {
            self.units.composite_over(&other.units)
        };
        Ok(EngineNumber::new(self.value / other.value, units))
    }

    fn combine_additive_units(a: &UnitLabel, b: &UnitLabel) -> UnitLabel {
        if a == b {
            a.clone()
        } else if a.is_empty() {
            b.clone()
        } else if b.is_empty() {
            a.clone()
        } else {
            a.composite_over(b)
        }
    }

    fn combine_multiplicative_units(a: &UnitLabel, b: &UnitLabel) -> UnitLabel {
        if a.is_empty() && b.is_empty() {
            UnitLabel::none()
        } else if a.is_empty() {
            b.clone()
        } else if b.is_empty() {
            a.clone()
        } else if a == b {
            a.clone()
        } else {
            a.composite_over(b)
        }
    }
}

impl UnitLabel {
    fn inverse_of_dimensionless(&self, _divisor_hint: &UnitLabel) -> UnitLabel {
        // Dividing a dimensionless value by a unit-bearing one yields an
        // inverse rate; kept as a distinct composite label rather than a
        // synthesized "1/unit" so display stays readable.
        UnitLabel(format!("1/{}", self.0.trim_start_matches('/')))
    }
}

impl Add for EngineNumber {
    type Output = EngineNumber;
    fn add(self, rhs: EngineNumber) -> EngineNumber {
        EngineNumber::add(&self, &rhs)
    }
}

impl Sub for EngineNumber {
    type Output = EngineNumber;
    fn sub(self, rhs: EngineNumber) -> EngineNumber {
        EngineNumber::sub(&self, &rhs)
    }
}

impl Mul for EngineNumber {
    type Output = EngineNumber;
    fn mul(self, rhs: EngineNumber) -> EngineNumber {
        EngineNumber::mul(&self, &rhs)
    }
}

impl Div for EngineNumber {
    type Output = Result<EngineNumber>;
    fn div(self, rhs: EngineNumber) -> Result<EngineNumber> {
        EngineNumber::div(&self, &rhs)
    }
}

impl fmt::Display for EngineNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.units.is_empty() {
            write!(f, "{}", self.value)
        } else {
            write!(f, "{} {}", self.value, self.units)
        }
    }
}
