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
Stream keeper
=============

Maps `(application, substance)` pairs to their streams and parameterization,
enforces the registration invariant (`ensure_substance` before any access),
and rolls equipment forward at year boundaries.
*/

use std::collections::BTreeMap;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::number::EngineNumber;
use crate::stream::{StreamName, StreamParameterization};
use crate::units::{StateGetter, UnitConverter};

/// Composite key identifying a substance tracked within an application.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SubstanceInApplicationId {
    /// Application name
    pub application: String,
    /// Substance name
    pub substance: String,
}

impl SubstanceInApplicationId {
    /// Build a new key.
    pub fn new<A: Into<String>, S: Into<String>>(application: A, substance: S) -> Self {
        SubstanceInApplicationId {
            application: application.into(),
            substance: substance.into(),
        }
    }
}

/// The stored (non-derived) streams for one substance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Streams {
    manufacture: EngineNumber,
    import: EngineNumber,
    export: EngineNumber,
    recycle: EngineNumber,
    equipment: EngineNumber,
    prior_equipment: EngineNumber,
}

impl Streams {
    fn new() -> Self {
        Streams {
            manufacture: EngineNumber::zero(StreamName::manufacture.default_unit()),
            import: EngineNumber::zero(StreamName::import.default_unit()),
            export: EngineNumber::zero(StreamName::export.default_unit()),
            recycle: EngineNumber::zero(StreamName::recycle.default_unit()),
            equipment: EngineNumber::zero(StreamName::equipment.default_unit()),
            prior_equipment: EngineNumber::zero(StreamName::priorEquipment.default_unit()),
        }
    }

    /// The current value of a stored stream, used to resolve `%` writes
    /// against (spec 4.2 rule 8). Only ever called with a stored stream name
    /// — derived streams are rejected by `is_stored()` before this is reached.
    fn current(&self, name: StreamName) -> EngineNumber {
        match name {
            StreamName::manufacture => self.manufacture.clone(),
            StreamName::import => self.import.clone(),
            StreamName::export => self.export.clone(),
            StreamName::recycle => self.recycle.clone(),
            StreamName::equipment => self.equipment.clone(),
            StreamName::priorEquipment => self.prior_equipment.clone(),
            StreamName::sales | StreamName::consumption | StreamName::energy => {
                unreachable!("derived streams are rejected by is_stored() above")
            }
        }
    }
}

/// A `StateGetter` built purely from a substance's own parameterization,
/// sufficient for the mass/count/ghg/energy conversions `StreamKeeper`
/// itself needs to perform. Population, sales volume and running totals are
/// not meaningful at this layer — those require engine-wide context — so
/// they are reported as zero; the engine's own `StateGetter` (see
/// `engine.rs`) is used instead whenever an operation needs them.
#[derive(Debug)]
struct LocalState<'a> {
    param: &'a StreamParameterization,
}

impl<'a> StateGetter for LocalState<'a> {
    fn population(&self) -> EngineNumber {
        EngineNumber::zero("units")
    }
    fn volume(&self) -> EngineNumber {
        EngineNumber::zero("kg")
    }
    fn amortized_unit_volume(&self) -> EngineNumber {
        self.param.initial_charge_manufacture.clone()
    }
    fn substance_consumption(&self) -> EngineNumber {
        self.param.ghg_intensity.clone()
    }
    fn energy_intensity(&self) -> EngineNumber {
        self.param.energy_intensity.clone()
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

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SubstanceRecord {
    streams: Streams,
    parameterization: StreamParameterization,
    /// Unconsumed recharge mass for the current year (kg), lazily computed
    /// from `priorEquipment x rechargePopulation x rechargeIntensity` the
    /// first time a sales subcomponent is written in counts. Spec 4.8's
    /// "recharge on top" mass is apportioned across same-year sales
    /// subcomponent writes by handing the whole budget to whichever
    /// subcomponent is written first and leaving later ones unaugmented.
    recharge_budget: Option<EngineNumber>,
}

/// Owns every registered substance's streams and parameterization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamKeeper {
    substances: BTreeMap<SubstanceInApplicationId, SubstanceRecord>,
}

impl StreamKeeper {
    /// An empty keeper.
    pub fn new() -> Self {
        StreamKeeper::default()
    }

    /// Register a substance if it isn't already known; idempotent.
    pub fn ensure_substance(&mut self, application: &str, substance: &str) {
        let id = SubstanceInApplicationId::new(application, substance);
        if !self.substances.contains_key(&id) {
            debug!("registering substance {}/{}", application, substance);
            self.substances.insert(
                id,
                SubstanceRecord {
                    streams: Streams::new(),
                    parameterization: StreamParameterization::default(),
                    recharge_budget: None,
                },
            );
        }
    }

    /// True iff the substance has been registered.
    pub fn has_substance(&self, application: &str, substance: &str) -> bool {
        self.substances
            .contains_key(&SubstanceInApplicationId::new(application, substance))
    }

    /// All registered (application, substance) pairs, in a stable order.
    pub fn get_registered_substances(&self) -> Vec<SubstanceInApplicationId> {
        self.substances.keys().cloned().collect()
    }

    fn record(&self, application: &str, substance: &str) -> Result<&SubstanceRecord> {
        self.substances
            .get(&SubstanceInApplicationId::new(application, substance))
            .ok_or_else(|| EngineError::UnknownSubstance {
                application: application.to_string(),
                substance: substance.to_string(),
            })
    }

    fn record_mut(&mut self, application: &str, substance: &str) -> Result<&mut SubstanceRecord> {
        self.substances
            .get_mut(&SubstanceInApplicationId::new(application, substance))
            .ok_or_else(|| EngineError::UnknownSubstance {
                application: application.to_string(),
                substance: substance.to_string(),
            })
    }

    /// Read access to a substance's parameterization.
    pub fn parameterization(&self, application: &str, substance: &str) -> Result<&StreamParameterization> {
        Ok(&self.record(application, substance)?.parameterization)
    }

    /// Mutable access to a substance's parameterization.
    pub fn parameterization_mut(
        &mut self,
        application: &str,
        substance: &str,
    ) -> Result<&mut StreamParameterization> {
        Ok(&mut self.record_mut(application, substance)?.parameterization)
    }

    /// Read a stream, computing derived streams (`sales`, `consumption`,
    /// `energy`) on demand.
    pub fn get_stream(&self, application: &str, substance: &str, name: StreamName) -> Result<EngineNumber> {
        let record = self.record(application, substance)?;
        let state = LocalState {
            param: &record.parameterization,
        };
        match name {
            StreamName::manufacture => Ok(record.streams.manufacture.clone()),
            StreamName::import => Ok(record.streams.import.clone()),
            StreamName::export => Ok(record.streams.export.clone()),
            StreamName::recycle => Ok(record.streams.recycle.clone()),
            StreamName::equipment => Ok(record.streams.equipment.clone()),
            StreamName::priorEquipment => Ok(record.streams.prior_equipment.clone()),
            StreamName::sales => {
                let manufacture_kg = UnitConverter::convert(&"kg".into(), &record.streams.manufacture, &state)?;
                let import_kg = UnitConverter::convert(&"kg".into(), &record.streams.import, &state)?;
                Ok(manufacture_kg.add(&import_kg))
            }
            StreamName::consumption => {
                let sales = self.get_stream(application, substance, StreamName::sales)?;
                let sales_kg = UnitConverter::convert(&"kg".into(), &sales, &state)?;
                Ok(sales_kg.mul(&record.parameterization.ghg_intensity))
            }
            StreamName::energy => {
                let sales = self.get_stream(application, substance, StreamName::sales)?;
                let sales_kg = UnitConverter::convert(&"kg".into(), &sales, &state)?;
                Ok(sales_kg.mul(&record.parameterization.energy_intensity))
            }
        }
    }

    /// Write a stream, replacing its prior value (not accumulating).
    ///
    /// When `name` is a sales subcomponent (`manufacture`/`import`) and
    /// `value`'s units are a count, the write expands through the
    /// substance's initial charge into mass (spec 4.3
    /// `setStreamForSalesWithUnits`). When `value`'s units are `%`, the
    /// write multiplies the current stream value by that percentage (spec
    /// 4.2 rule 8) instead of going through `UnitConverter::convert`, which
    /// has no family for `%` on its own.
    pub fn set_stream(
        &mut self,
        application: &str,
        substance: &str,
        name: StreamName,
        value: EngineNumber,
    ) -> Result<()> {
        if !name.is_stored() {
            return Err(EngineError::UnknownStream {
                substance: substance.to_string(),
                stream: name.to_string(),
            });
        }
        let record = self.record_mut(application, substance)?;
        let is_count_value = value.units.as_str() == "unit" || value.units.as_str() == "units";

        let resolved = if name.is_sales_subcomponent() && is_count_value {
            let charge = record.parameterization.get_initial_charge(name)?;
            if charge.value.is_zero() {
                return Err(EngineError::ZeroInitialCharge {
                    substance: substance.to_string(),
                    stream: name.to_string(),
                });
            }
            let base_mass = value.value * charge.value;
            let recharge_topup = Self::take_recharge_budget(record);
            EngineNumber::new(base_mass + recharge_topup, "kg")
        } else if value.units.is_percentage() {
            let current = record.streams.current(name);
            UnitConverter::resolve_percentage(&value, &current)
        } else {
            let state = LocalState {
                param: &record.parameterization,
            };
            UnitConverter::convert(&name.default_unit(), &value, &state)?
        };

        match name {
            StreamName::manufacture => record.streams.manufacture = resolved,
            StreamName::import => record.streams.import = resolved,
            StreamName::export => record.streams.export = resolved,
            StreamName::recycle => record.streams.recycle = resolved,
            StreamName::equipment => record.streams.equipment = resolved,
            StreamName::priorEquipment => record.streams.prior_equipment = resolved,
            StreamName::sales | StreamName::consumption | StreamName::energy => unreachable!(
                "derived streams are rejected by is_stored() above"
            ),
        }

        if !value.units.is_percentage() {
            record.parameterization.last_specified_units = value.units;
        }
        Ok(())
    }

    /// Roll `equipment` into `priorEquipment` for every registered
    /// substance, reset the within-year recycled accumulator, and clear the
    /// recharge-on-top budget so it is recomputed from this year's
    /// `Recharge` operation.
    pub fn increment_year(&mut self) {
        for record in self.substances.values_mut() {
            record.streams.prior_equipment = record.streams.equipment;
            record.streams.recycle = EngineNumber::zero(StreamName::recycle.default_unit());
            record.recharge_budget = None;
        }
    }

    /// Lazily compute (if needed) and consume this year's recharge-on-top
    /// mass budget for a substance, returning whatever was left.
    fn take_recharge_budget(record: &mut SubstanceRecord) -> rust_decimal::Decimal {
        if record.recharge_budget.is_none() {
            let population_share = UnitConverter::resolve_percentage(
                &record.parameterization.recharge_population,
                &record.streams.prior_equipment,
            );
            let mass = EngineNumber::new(
                population_share.value * record.parameterization.recharge_intensity.value,
                "kg",
            );
            record.recharge_budget = Some(mass);
        }
        let budget = record.recharge_budget.as_mut().expect("just populated above");
        let taken = budget.value;
        budget.value = rust_decimal::Decimal::ZERO;
        taken
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn unregistered_access_is_unknown_substance() {
        let keeper = StreamKeeper::new();
        assert!(matches!(
            keeper.get_stream("refrigeration", "HFC-134a", StreamName::manufacture),
            Err(EngineError::UnknownSubstance { .. })
        ));
    }

    #[test]
    fn ensure_substance_is_idempotent_and_zeroed() {
        let mut keeper = StreamKeeper::new();
        keeper.ensure_substance("refrigeration", "HFC-134a");
        keeper.ensure_substance("refrigeration", "HFC-134a");
        assert_eq!(keeper.get_registered_substances().len(), 1);
        let m = keeper
            .get_stream("refrigeration", "HFC-134a", StreamName::manufacture)
            .unwrap();
        assert_eq!(m.value, Decimal::ZERO);
        assert_eq!(m.units.as_str(), "kg");
    }

    #[test]
    fn sales_is_sum_of_manufacture_and_import() {
        let mut keeper = StreamKeeper::new();
        keeper.ensure_substance("refrigeration", "HFC-134a");
        keeper
            .set_stream(
                "refrigeration",
                "HFC-134a",
                StreamName::manufacture,
                EngineNumber::new(Decimal::from(100), "kg"),
            )
            .unwrap();
        keeper
            .set_stream(
                "refrigeration",
                "HFC-134a",
                StreamName::import,
                EngineNumber::new(Decimal::from(50), "kg"),
            )
            .unwrap();
        let sales = keeper
            .get_stream("refrigeration", "HFC-134a", StreamName::sales)
            .unwrap();
        assert_eq!(sales.value, Decimal::from(150));
    }

    #[test]
    fn count_write_expands_through_initial_charge() {
        let mut keeper = StreamKeeper::new();
        keeper.ensure_substance("refrigeration", "HFC-134a");
        keeper
            .parameterization_mut("refrigeration", "HFC-134a")
            .unwrap()
            .initial_charge_manufacture = EngineNumber::new(Decimal::from(5), "kg/unit");
        keeper
            .set_stream(
                "refrigeration",
                "HFC-134a",
                StreamName::manufacture,
                EngineNumber::new(Decimal::from(20), "units"),
            )
            .unwrap();
        let m = keeper
            .get_stream("refrigeration", "HFC-134a", StreamName::manufacture)
            .unwrap();
        assert_eq!(m.value, Decimal::from(100));
        assert_eq!(m.units.as_str(), "kg");
    }

    #[test]
    fn zero_initial_charge_rejects_count_write() {
        let mut keeper = StreamKeeper::new();
        keeper.ensure_substance("refrigeration", "HFC-134a");
        keeper
            .parameterization_mut("refrigeration", "HFC-134a")
            .unwrap()
            .initial_charge_manufacture = EngineNumber::zero("kg/unit");
        let result = keeper.set_stream(
            "refrigeration",
            "HFC-134a",
            StreamName::manufacture,
            EngineNumber::new(Decimal::from(20), "units"),
        );
        assert!(matches!(result, Err(EngineError::ZeroInitialCharge { .. })));
    }

    #[test]
    fn percentage_write_multiplies_current_stream_value() {
        let mut keeper = StreamKeeper::new();
        keeper.ensure_substance("refrigeration", "HFC-134a");
        keeper
            .set_stream(
                "refrigeration",
                "HFC-134a",
                StreamName::manufacture,
                EngineNumber::new(Decimal::from(100), "kg"),
            )
            .unwrap();
        keeper
            .set_stream(
                "refrigeration",
                "HFC-134a",
                StreamName::manufacture,
                EngineNumber::new(Decimal::from(10), "%"),
            )
            .unwrap();
        let m = keeper
            .get_stream("refrigeration", "HFC-134a", StreamName::manufacture)
            .unwrap();
        assert_eq!(m.value, Decimal::from(10));
        assert_eq!(m.units.as_str(), "kg");
    }

    #[test]
    fn percentage_write_does_not_update_last_specified_units() {
        let mut keeper = StreamKeeper::new();
        keeper.ensure_substance("refrigeration", "HFC-134a");
        keeper
            .set_stream(
                "refrigeration",
                "HFC-134a",
                StreamName::manufacture,
                EngineNumber::new(Decimal::from(100), "kg"),
            )
            .unwrap();
        keeper
            .set_stream(
                "refrigeration",
                "HFC-134a",
                StreamName::manufacture,
                EngineNumber::new(Decimal::from(10), "%"),
            )
            .unwrap();
        let after = keeper
            .parameterization("refrigeration", "HFC-134a")
            .unwrap()
            .last_specified_units
            .clone();
        assert_eq!(after.as_str(), "kg");
    }

    #[test]
    fn increment_year_rolls_equipment_and_resets_recycle() {
        let mut keeper = StreamKeeper::new();
        keeper.ensure_substance("refrigeration", "HFC-134a");
        keeper
            .set_stream(
                "refrigeration",
                "HFC-134a",
                StreamName::equipment,
                EngineNumber::new(Decimal::from(20_000), "units"),
            )
            .unwrap();
        keeper
            .set_stream(
                "refrigeration",
                "HFC-134a",
                StreamName::recycle,
                EngineNumber::new(Decimal::from(10), "kg"),
            )
            .unwrap();
        keeper.increment_year();
        let prior = keeper
            .get_stream("refrigeration", "HFC-134a", StreamName::priorEquipment)
            .unwrap();
        assert_eq!(prior.value, Decimal::from(20_000));
        let recycle = keeper
            .get_stream("refrigeration", "HFC-134a", StreamName::recycle)
            .unwrap();
        assert_eq!(recycle.value, Decimal::ZERO);
    }
}
