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
Result records
===============

The output shape the engine emits at the end of each simulated year, one
record per registered (application, substance) pair.
*/

use serde::{Deserialize, Serialize};

use crate::number::EngineNumber;

/// Export-side figures expressed via the substance's initial charge, kept
/// separate from the main stream fields since they describe a derived
/// equivalence rather than a stored quantity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeSupplement {
    /// Export mass expressed in equipment-count terms via `initialCharge`.
    pub export_initial_charge_value: EngineNumber,
    /// GHG consumption attributable to the export stream.
    pub export_initial_charge_consumption: EngineNumber,
}

/// One year's outcome for a single (application, substance) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineResult {
    /// Simulated year.
    pub year: i32,
    /// Application name.
    pub application: String,
    /// Substance name.
    pub substance: String,
    /// Virgin material manufactured domestically.
    pub manufacture: EngineNumber,
    /// Virgin material imported.
    pub import: EngineNumber,
    /// Material exported.
    pub export: EngineNumber,
    /// Recovered material re-entering sales.
    pub recycle: EngineNumber,
    /// Installed equipment population at year end.
    pub population: EngineNumber,
    /// New equipment added this year.
    pub population_new: EngineNumber,
    /// GHG consumption attributable to domestic manufacture.
    pub domestic_consumption: EngineNumber,
    /// GHG consumption attributable to imports.
    pub import_consumption: EngineNumber,
    /// GHG consumption attributable to exports.
    pub export_consumption: EngineNumber,
    /// GHG consumption attributable to recycled material.
    pub recycle_consumption: EngineNumber,
    /// GHG emissions attributable to this year's recharge servicing.
    pub recharge_emissions: EngineNumber,
    /// GHG emissions attributable to this year's retired equipment.
    pub eol_emissions: EngineNumber,
    /// Energy consumption for this year's sales.
    pub energy_consumption: EngineNumber,
    /// Export-side figures expressed via `initialCharge`.
    pub trade_supplement: TradeSupplement,
}

/// All `EngineResult`s for a single simulated year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineResults {
    /// The year these results describe.
    pub year: i32,
    /// One record per registered (application, substance) pair.
    pub results: Vec<EngineResult>,
}

impl EngineResults {
    /// Find the result for a specific (application, substance) pair, if
    /// present.
    pub fn find(&self, application: &str, substance: &str) -> Option<&EngineResult> {
        self.results
            .iter()
            .find(|r| r.application == application && r.substance == substance)
    }
}
