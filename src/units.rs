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

/*!
Unit conversion
===============

Reconciles value-based (kg, mt), unit-count, percentage and intensity-based
quantities using a state provider for the context-dependent factors
(amortized unit volume, ghg/energy intensity).

Percentage and `eachyear` handling (rules 8 and 9) are call-site concerns —
they depend on a "current stream value" or "this is an annual delta" framing
that only the calling operation knows — so they live as separate helpers
(`resolve_percentage`, `strip_each_year`) rather than inside `convert`, which
only implements the context-free family-to-family rules 1 through 7.
*/

use rust_decimal::Decimal;

use crate::error::{EngineError, Result};
use crate::number::{EngineNumber, UnitLabel};
use crate::stream::StreamName;

/// Context a unit conversion may need: population, volume, intensities and
/// the amortized per-unit mass, plus the running totals operations may want
/// to read back (ghg/energy consumption, years elapsed).
pub trait StateGetter: std::fmt::Debug {
    /// Current equipment population, in a count unit.
    fn population(&self) -> EngineNumber;
    /// Current sales volume, in a mass unit.
    fn volume(&self) -> EngineNumber;
    /// Mass installed per unit of equipment, kg/unit.
    fn amortized_unit_volume(&self) -> EngineNumber;
    /// GHG intensity of the substance, tCO2e/kg.
    fn substance_consumption(&self) -> EngineNumber;
    /// Energy intensity of the substance, kwh/kg.
    fn energy_intensity(&self) -> EngineNumber;
    /// Years elapsed since the scenario began.
    fn years_elapsed(&self) -> EngineNumber;
    /// Total GHG consumption, tCO2e.
    fn ghg_consumption(&self) -> EngineNumber;
    /// Total energy consumption, kwh.
    fn energy_consumption(&self) -> EngineNumber;
}

/// A `StateGetter` that wraps a base getter and lets a handful of fields be
/// overridden per call, for transient computations (e.g. evaluating "what
/// would consumption be if volume were X") without mutating engine state.
#[derive(Debug)]
pub struct OverridingStateGetter<'a> {
    base: &'a dyn StateGetter,
    population: Option<EngineNumber>,
    volume: Option<EngineNumber>,
    substance_consumption: Option<EngineNumber>,
    energy_intensity: Option<EngineNumber>,
    ghg_consumption: Option<EngineNumber>,
}

impl<'a> OverridingStateGetter<'a> {
    /// Wrap `base` with no overrides set.
    pub fn new(base: &'a dyn StateGetter) -> Self {
        OverridingStateGetter {
            base,
            population: None,
            volume: None,
            substance_consumption: None,
            energy_intensity: None,
            ghg_consumption: None,
        }
    }

    /// Override the population field for this getter.
    pub fn with_population(mut self, value: EngineNumber) -> Self {
        self.population = Some(value);
        self
    }

    /// Override the volume field for this getter.
    pub fn with_volume(mut self, value: EngineNumber) -> Self {
        self.volume = Some(value);
        self
    }

    /// Override the substance consumption (ghg intensity) field.
    pub fn with_substance_consumption(mut self, value: EngineNumber) -> Self {
        self.substance_consumption = Some(value);
        self
    }

    /// Override the energy intensity field.
    pub fn with_energy_intensity(mut self, value: EngineNumber) -> Self {
        self.energy_intensity = Some(value);
        self
    }

    /// Override the ghg consumption field.
    pub fn with_ghg_consumption(mut self, value: EngineNumber) -> Self {
        self.ghg_consumption = Some(value);
        self
    }

    /// Set an override by stream name: `sales` maps to volume, `equipment`
    /// to population, `consumption` to ghg consumption. Any other stream
    /// name is rejected.
    pub fn set_total(&mut self, stream: StreamName, value: EngineNumber) -> Result<()> {
        match stream {
            StreamName::sales => self.volume = Some(value),
            StreamName::equipment => self.population = Some(value),
            StreamName::consumption => self.ghg_consumption = Some(value),
            other => {
                return Err(EngineError::ConfigurationError(format!(
                    "set_total does not support stream \"{}\"",
                    other
                )))
            }
        }
        Ok(())
    }
}

impl<'a> StateGetter for OverridingStateGetter<'a> {
    fn population(&self) -> EngineNumber {
        self.population.clone().unwrap_or_else(|| self.base.population())
    }

    fn volume(&self) -> EngineNumber {
        self.volume.clone().unwrap_or_else(|| self.base.volume())
    }

    fn amortized_unit_volume(&self) -> EngineNumber {
        self.base.amortized_unit_volume()
    }

    fn substance_consumption(&self) -> EngineNumber {
        self.substance_consumption
            .clone()
            .unwrap_or_else(|| self.base.substance_consumption())
    }

    fn energy_intensity(&self) -> EngineNumber {
        self.energy_intensity
            .clone()
            .unwrap_or_else(|| self.base.energy_intensity())
    }

    fn years_elapsed(&self) -> EngineNumber {
        self.base.years_elapsed()
    }

    fn ghg_consumption(&self) -> EngineNumber {
        self.ghg_consumption
            .clone()
            .unwrap_or_else(|| self.base.ghg_consumption())
    }

    fn energy_consumption(&self) -> EngineNumber {
        self.base.energy_consumption()
    }
}

const KG_PER_MT: i64 = 1000;

fn is_mass(u: &str) -> bool {
    u == "kg" || u == "mt"
}

fn is_count(u: &str) -> bool {
    u == "unit" || u == "units"
}

/// Reconciles values across unit families using a `StateGetter` for the
/// context-dependent conversion factors.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnitConverter;

impl UnitConverter {
    /// Convert `source` into `target` units, applying the precedence rules
    /// of spec section 4.2 (1 through 7). Percentage and `eachyear` values
    /// must be resolved by the caller first (see module docs).
    pub fn convert(target: &UnitLabel, source: &EngineNumber, state: &dyn StateGetter) -> Result<EngineNumber> {
        // 1. identical units: pass through
        if source.units == *target {
            return Ok(source.clone());
        }
        // 2. empty target: strip units
        if target.is_empty() {
            return Ok(EngineNumber::new(source.value, UnitLabel::none()));
        }

        let from = source.units.as_str();
        let to = target.as_str();

        // 3. mass family
        if is_mass(from) && is_mass(to) {
            let value = match (from, to) {
                ("kg", "mt") => source.value / Decimal::from(KG_PER_MT),
                ("mt", "kg") => source.value * Decimal::from(KG_PER_MT),
                _ => source.value,
            };
            return Ok(EngineNumber::new(value, target.clone()));
        }

        // 4. count family identity
        if is_count(from) && is_count(to) {
            return Ok(EngineNumber::new(source.value, target.clone()));
        }

        // 5. mass <-> count via amortized unit volume
        if (is_mass(from) && is_count(to)) || (is_count(from) && is_mass(to)) {
            let auv = state.amortized_unit_volume();
            if auv.value.is_zero() {
                return Err(EngineError::UnitMismatch {
                    from: from.to_string(),
                    to: to.to_string(),
                });
            }
            // normalize source to kg, then to target mass unit if needed
            let kg_value = if is_mass(from) {
                Self::convert(&UnitLabel::new("kg"), source, state)?.value
            } else {
                source.value * auv.value
            };
            if is_count(to) {
                return Ok(EngineNumber::new(kg_value / auv.value, target.clone()));
            }
            let mass_kg = EngineNumber::new(kg_value, "kg");
            return Self::convert(target, &mass_kg, state);
        }

        // 6. mass <-> tCO2e via substance consumption (tCO2e/kg)
        if (is_mass(from) && to == "tCO2e") || (from == "tCO2e" && is_mass(to)) {
            let rate = state.substance_consumption();
            if from == "tCO2e" {
                if rate.value.is_zero() {
                    return Err(EngineError::UnitMismatch {
                        from: from.to_string(),
                        to: to.to_string(),
                    });
                }
                let kg_value = source.value / rate.value;
                let mass_kg = EngineNumber::new(kg_value, "kg");
                return Self::convert(target, &mass_kg, state);
            } else {
                let kg_value = Self::convert(&UnitLabel::new("kg"), source, state)?.value;
                return Ok(EngineNumber::new(kg_value * rate.value, target.clone()));
            }
        }

        // 7. mass <-> kwh via energy intensity (kwh/kg)
        if (is_mass(from) && to == "kwh") || (from == "kwh" && is_mass(to)) {
            let rate = state.energy_intensity();
            if from == "kwh" {
                if rate.value.is_zero() {
                    return Err(EngineError::UnitMismatch {
                        from: from.to_string(),
                        to: to.to_string(),
                    });
                }
                let kg_value = source.value / rate.value;
                let mass_kg = EngineNumber::new(kg_value, "kg");
                return Self::convert(target, &mass_kg, state);
            } else {
                let kg_value = Self::convert(&UnitLabel::new("kg"), source, state)?.value;
                return Ok(EngineNumber::new(kg_value * rate.value, target.clone()));
            }
        }

        Err(EngineError::UnitMismatch {
            from: from.to_string(),
            to: to.to_string(),
        })
    }

    /// Resolve a percentage value against a context-supplied base (spec
    /// rule 8): `base * (value / 100)`, in the base's units.
    pub fn resolve_percentage(value: &EngineNumber, base: &EngineNumber) -> EngineNumber {
        let fraction = value.value / Decimal::from(100);
        EngineNumber::new(base.value * fraction, base.units.clone())
    }

    /// Strip an `eachyear` suffix (spec rule 9), leaving the caller to treat
    /// the resulting value as an annual delta.
    pub fn strip_each_year(value: &EngineNumber) -> EngineNumber {
        EngineNumber::new(value.value, value.units.strip_each_year())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal as D;
    use std::str::FromStr;

    #[derive(Debug)]
    struct FixedState {
        amortized_unit_volume: EngineNumber,
        substance_consumption: EngineNumber,
        energy_intensity: EngineNumber,
    }

    impl StateGetter for FixedState {
        fn population(&self) -> EngineNumber {
            EngineNumber::zero("units")
        }
        fn volume(&self) -> EngineNumber {
            EngineNumber::zero("kg")
        }
        fn amortized_unit_volume(&self) -> EngineNumber {
            self.amortized_unit_volume.clone()
        }
        fn substance_consumption(&self) -> EngineNumber {
            self.substance_consumption.clone()
        }
        fn energy_intensity(&self) -> EngineNumber {
            self.energy_intensity.clone()
        }
        fn years_elapsed(&self) -> EngineNumber {
            EngineNumber::zero("years")
        }
        fn ghg_consumption(&self) -> EngineNumber {
            EngineNumber::zero("tCO2e")
        }
        fn energy_consumption(&self) -> EngineNumber {
            EngineNumber::zero("kwh")
        }
    }

    fn state() -> FixedState {
        FixedState {
            amortized_unit_volume: EngineNumber::new(D::from(5), "kg/unit"),
            substance_consumption: EngineNumber::new(D::from(5), "tCO2e/kg"),
            energy_intensity: EngineNumber::new(D::from_str("1.5").unwrap(), "kwh/kg"),
        }
    }

    #[test]
    fn kg_mt_round_trip_is_identity() {
        let s = state();
        let original = EngineNumber::new(D::from(2500), "kg");
        let as_mt = UnitConverter::convert(&UnitLabel::new("mt"), &original, &s).unwrap();
        assert_eq!(as_mt.value, D::from_str("2.5").unwrap());
        let back = UnitConverter::convert(&UnitLabel::new("kg"), &as_mt, &s).unwrap();
        assert_eq!(back.value, original.value);
    }

    #[test]
    fn mass_count_round_trip_is_identity() {
        let s = state();
        let original = EngineNumber::new(D::from(100), "kg");
        let counts = UnitConverter::convert(&UnitLabel::new("units"), &original, &s).unwrap();
        assert_eq!(counts.value, D::from(20));
        let back = UnitConverter::convert(&UnitLabel::new("kg"), &counts, &s).unwrap();
        assert_eq!(back.value, original.value);
    }

    #[test]
    fn zero_amortized_volume_is_unit_mismatch() {
        let s = FixedState {
            amortized_unit_volume: EngineNumber::zero("kg/unit"),
            ..state()
        };
        let original = EngineNumber::new(D::from(100), "kg");
        assert!(matches!(
            UnitConverter::convert(&UnitLabel::new("units"), &original, &s),
            Err(EngineError::UnitMismatch { .. })
        ));
    }

    #[test]
    fn mass_to_tco2e_uses_substance_consumption() {
        let s = state();
        let kg = EngineNumber::new(D::from(100), "kg");
        let tco2e = UnitConverter::convert(&UnitLabel::new("tCO2e"), &kg, &s).unwrap();
        assert_eq!(tco2e.value, D::from(500));
    }

    #[test]
    fn percentage_resolves_against_base() {
        let base = EngineNumber::new(D::from(200), "kg");
        let pct = EngineNumber::new(D::from(10), "%");
        let resolved = UnitConverter::resolve_percentage(&pct, &base);
        assert_eq!(resolved.value, D::from(20));
        assert_eq!(resolved.units.as_str(), "kg");
    }

    #[test]
    fn empty_target_strips_units() {
        let s = state();
        let kg = EngineNumber::new(D::from(5), "kg");
        let stripped = UnitConverter::convert(&UnitLabel::none(), &kg, &s).unwrap();
        assert!(stripped.units.is_empty());
    }
}
