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
Streams and stream parameterization
====================================

The closed vocabulary of stream names a substance can carry, and the
per-substance parameterization (intensities, initial charges, recharge,
retirement, recovery, displacement) that the converter and operations read
and write.
*/

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::error::{EngineError, Result};
use crate::number::{EngineNumber, UnitLabel};

/// The closed set of stream names a substance can carry.
///
/// `Sales`, `Consumption` and `Energy` are never stored — they are always
/// computed on demand from the stored streams and the parameterization.
#[allow(non_camel_case_types)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
pub enum StreamName {
    /// Virgin material produced domestically.
    manufacture,
    /// Virgin material brought in from outside the scenario boundary.
    import,
    /// Material shipped out of the scenario boundary.
    export,
    /// Recovered material re-entering sales as non-virgin mass.
    recycle,
    /// Installed equipment population.
    equipment,
    /// Snapshot of `equipment` at the end of the previous year.
    priorEquipment,
    /// Derived: manufacture + import.
    sales,
    /// Derived: sales x ghgIntensity.
    consumption,
    /// Derived: sales x energyIntensity.
    energy,
}

impl StreamName {
    /// Base (stored) streams: everything except the three derived ones.
    pub fn is_stored(self) -> bool {
        !matches!(
            self,
            StreamName::sales | StreamName::consumption | StreamName::energy
        )
    }

    /// Default unit for a freshly created stream of this name.
    pub fn default_unit(self) -> UnitLabel {
        match self {
            StreamName::manufacture
            | StreamName::import
            | StreamName::export
            | StreamName::recycle
            | StreamName::sales => UnitLabel::new("kg"),
            StreamName::equipment | StreamName::priorEquipment => UnitLabel::new("units"),
            StreamName::consumption => UnitLabel::new("tCO2e"),
            StreamName::energy => UnitLabel::new("kwh"),
        }
    }

    /// Sales subcomponents writable via `setStreamForSalesWithUnits`.
    pub fn is_sales_subcomponent(self) -> bool {
        matches!(self, StreamName::manufacture | StreamName::import)
    }
}

/// Per-substance configuration read and written by operations, distinct
/// from the mass/count streams themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamParameterization {
    /// Greenhouse-gas intensity of sales, tCO2e / kg.
    pub ghg_intensity: EngineNumber,
    /// Energy intensity of sales, kwh / kg.
    pub energy_intensity: EngineNumber,
    /// Mass installed per new unit of equipment for manufacture, kg/unit.
    pub initial_charge_manufacture: EngineNumber,
    /// Mass installed per new unit of equipment for import, kg/unit.
    pub initial_charge_import: EngineNumber,
    /// Fraction of prior-year equipment recharged this year, %.
    pub recharge_population: EngineNumber,
    /// Mass used per recharge event, kg/unit.
    pub recharge_intensity: EngineNumber,
    /// Fraction of end-of-life/serviced material recovered, %.
    pub recovery_rate: EngineNumber,
    /// Fraction of recovered material that survives reprocessing, %.
    pub yield_rate: EngineNumber,
    /// Fraction of prior-year equipment retired this year, %.
    pub retirement_rate: EngineNumber,
    /// Fraction of displaced mass credited to the displacement target, %.
    pub displacement_rate: EngineNumber,
    /// The last non-percentage unit a stream write used for this substance.
    pub last_specified_units: UnitLabel,
}

impl StreamParameterization {
    /// Volume-weighted average initial charge across manufacture and import,
    /// used when the `sales` stream needs a single initial-charge figure.
    ///
    /// Falls back to the manufacture-side charge when both legs are zero
    /// (there is no sales volume to weight by).
    pub fn initial_charge_sales(&self, manufacture_kg: rust_decimal::Decimal, import_kg: rust_decimal::Decimal) -> EngineNumber {
        let total = manufacture_kg + import_kg;
        if total.is_zero() {
            return self.initial_charge_manufacture.clone();
        }
        let weighted = (self.initial_charge_manufacture.value * manufacture_kg
            + self.initial_charge_import.value * import_kg)
            / total;
        EngineNumber::new(weighted, self.initial_charge_manufacture.units.clone())
    }

    /// Get the `initial_charge` for a sales subcomponent stream name.
    pub fn get_initial_charge(&self, stream: StreamName) -> Result<EngineNumber> {
        match stream {
            StreamName::manufacture => Ok(self.initial_charge_manufacture.clone()),
            StreamName::import => Ok(self.initial_charge_import.clone()),
            other => Err(EngineError::ConfigurationError(format!(
                "initial charge is only defined for manufacture/import, got {}",
                other
            ))),
        }
    }

    /// Set the `initial_charge` for a sales subcomponent stream name.
    pub fn set_initial_charge(&mut self, stream: StreamName, value: EngineNumber) -> Result<()> {
        match stream {
            StreamName::manufacture => self.initial_charge_manufacture = value,
            StreamName::import => self.initial_charge_import = value,
            other => {
                return Err(EngineError::ConfigurationError(format!(
                    "initial charge is only defined for manufacture/import, got {}",
                    other
                )))
            }
        }
        Ok(())
    }
}

impl Default for StreamParameterization {
    fn default() -> Self {
        StreamParameterization {
            ghg_intensity: EngineNumber::zero(UnitLabel::new("tCO2e/kg")),
            energy_intensity: EngineNumber::zero(UnitLabel::new("kwh/kg")),
            initial_charge_manufacture: EngineNumber::new(rust_decimal::Decimal::ONE, "kg/unit"),
            initial_charge_import: EngineNumber::new(rust_decimal::Decimal::ONE, "kg/unit"),
            recharge_population: EngineNumber::zero(UnitLabel::new("%")),
            recharge_intensity: EngineNumber::zero(UnitLabel::new("kg/unit")),
            recovery_rate: EngineNumber::zero(UnitLabel::new("%")),
            yield_rate: EngineNumber::zero(UnitLabel::new("%")),
            retirement_rate: EngineNumber::zero(UnitLabel::new("%")),
            displacement_rate: EngineNumber::new(rust_decimal::Decimal::from(100), "%"),
            last_specified_units: UnitLabel::new("kg"),
        }
    }
}
