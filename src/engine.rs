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
Engine orchestrator
====================

Owns the stream keeper, scope, and variable chain for one scenario run, drives
the year loop, and applies the stream/parameter mutators that `Operation`s
call through. A single `Engine` evaluates a single scenario trial; Monte-Carlo
trials are run sequentially by the host with a fresh `Engine` each time.
*/

use std::collections::HashSet;
use std::fmt;

use log::{debug, warn};
use rust_decimal::Decimal;

use crate::error::{EngineError, Result};
use crate::number::{EngineNumber, UnitLabel};
use crate::result::{EngineResult, EngineResults, TradeSupplement};
use crate::stream::{StreamName, StreamParameterization};
use crate::units::{StateGetter, UnitConverter};
use crate::variables::{ContextLevel, Scope, VariableManager};
use crate::year_matcher::YearMatcher;
use crate::keeper::{StreamKeeper, SubstanceInApplicationId};

/// Host-injectable source of randomness for Monte-Carlo trials.
///
/// No operation in this engine currently draws from it; it is a typed seam
/// so a host can wire one in without an API break once a stochastic
/// operation is added.
pub trait RandomSource: fmt::Debug {
    /// A uniform random value in [0, 1).
    fn next_f64(&mut self) -> f64;
}

/// A `StateGetter` backed by the engine's live scope, streams and
/// parameterization — used wherever an operation needs the context-dependent
/// conversion factors (amortized unit volume, intensities, running totals).
#[derive(Debug)]
struct EngineStateGetter<'a> {
    engine: &'a Engine,
}

impl<'a> EngineStateGetter<'a> {
    fn current(&self, name: StreamName) -> EngineNumber {
        self.engine.get_stream(name).unwrap_or_else(|_| EngineNumber::zero(name.default_unit()))
    }
}

impl<'a> StateGetter for EngineStateGetter<'a> {
    fn population(&self) -> EngineNumber {
        self.current(StreamName::equipment)
    }

    fn volume(&self) -> EngineNumber {
        self.current(StreamName::sales)
    }

    fn amortized_unit_volume(&self) -> EngineNumber {
        let (app, sub) = match self.engine.current_pair() {
            Ok(pair) => pair,
            Err(_) => return EngineNumber::zero("kg/unit"),
        };
        let param = match self.engine.streams.parameterization(app, sub) {
            Ok(p) => p,
            Err(_) => return EngineNumber::zero("kg/unit"),
        };
        let manufacture = self.current(StreamName::manufacture);
        let import = self.current(StreamName::import);
        param.initial_charge_sales(manufacture.value, import.value)
    }

    fn substance_consumption(&self) -> EngineNumber {
        let (app, sub) = match self.engine.current_pair() {
            Ok(pair) => pair,
            Err(_) => return EngineNumber::zero("tCO2e/kg"),
        };
        self.engine
            .streams
            .parameterization(app, sub)
            .map(|p| p.ghg_intensity.clone())
            .unwrap_or_else(|_| EngineNumber::zero("tCO2e/kg"))
    }

    fn energy_intensity(&self) -> EngineNumber {
        let (app, sub) = match self.engine.current_pair() {
            Ok(pair) => pair,
            Err(_) => return EngineNumber::zero("kwh/kg"),
        };
        self.engine
            .streams
            .parameterization(app, sub)
            .map(|p| p.energy_intensity.clone())
            .unwrap_or_else(|_| EngineNumber::zero("kwh/kg"))
    }

    fn years_elapsed(&self) -> EngineNumber {
        EngineNumber::new(Decimal::from(self.engine.current_year - self.engine.start_year), "years")
    }

    fn ghg_consumption(&self) -> EngineNumber {
        self.current(StreamName::consumption)
    }

    fn energy_consumption(&self) -> EngineNumber {
        self.current(StreamName::energy)
    }
}

/// Drives one scenario trial: owns the stream keeper, the current scope, the
/// lexical variable chain, and the current year.
pub struct Engine {
    scope: Scope,
    variable_frames: Vec<VariableManager>,
    streams: StreamKeeper,
    current_year: i32,
    start_year: i32,
    enabled_streams: HashSet<(String, String, StreamName)>,
    /// Mass (kg) contributed to `manufacture`/`import` by count-unit writes
    /// executed during the current year, keyed per (substance, stream) and
    /// reset at `increment_year`. Drives the equipment-growth term in
    /// `get_results` independently of the persisted stream totals, so a year
    /// with no count-unit sales write contributes no new equipment even
    /// though the stream readback still reports its last written value, and
    /// a mass-denominated sales write (no head-count of its own) never
    /// implies new equipment on its own. `Set` replaces a stream's entry
    /// (matching its own replace-not-add semantics); `Change` accumulates
    /// into it.
    sales_growth_this_year: std::collections::HashMap<(SubstanceInApplicationId, StreamName), Decimal>,
    rng: Option<Box<dyn RandomSource>>,
}

impl Engine {
    /// A fresh engine starting at `start_year`, with empty scope and state.
    pub fn new(start_year: i32) -> Self {
        Engine {
            scope: Scope::new(),
            variable_frames: vec![VariableManager::new()],
            streams: StreamKeeper::new(),
            current_year: start_year,
            start_year,
            enabled_streams: HashSet::new(),
            sales_growth_this_year: std::collections::HashMap::new(),
            rng: None,
        }
    }

    /// Install a random source for operations that draw from it.
    pub fn set_random_source(&mut self, rng: Box<dyn RandomSource>) {
        self.rng = Some(rng);
    }

    /// The year currently being simulated.
    pub fn current_year(&self) -> i32 {
        self.current_year
    }

    /// The current scope.
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    fn current_pair(&self) -> Result<(&str, &str)> {
        let app = self.scope.application().ok_or_else(|| {
            EngineError::ConfigurationError("no application set in scope".to_string())
        })?;
        let sub = self.scope.substance().ok_or_else(|| {
            EngineError::ConfigurationError("no substance set in scope".to_string())
        })?;
        Ok((app, sub))
    }

    fn state_getter(&self) -> EngineStateGetter<'_> {
        EngineStateGetter { engine: self }
    }

    fn substance_id(&self) -> Result<SubstanceInApplicationId> {
        let (app, sub) = self.current_pair()?;
        Ok(SubstanceInApplicationId::new(app, sub))
    }

    // ---- scope mutators ----------------------------------------------

    /// Enter a stanza, resetting application and substance, and the
    /// variable frames narrower than stanza.
    pub fn set_stanza<T: Into<String>>(&mut self, stanza: T) -> Result<()> {
        self.scope = self.scope.with_stanza(stanza);
        self.variable_frames.truncate(1);
        let frame = self.variable_frames[0].get_with_level(ContextLevel::Stanza)?;
        self.variable_frames.push(frame);
        Ok(())
    }

    /// Enter an application, resetting substance, requiring a stanza.
    pub fn set_application<T: Into<String>>(&mut self, application: T) -> Result<()> {
        self.scope = self.scope.with_application(application)?;
        self.variable_frames.truncate(2);
        let frame = self.variable_frames[1].get_with_level(ContextLevel::Application)?;
        self.variable_frames.push(frame);
        Ok(())
    }

    /// Enter a substance, requiring an application, and register it.
    pub fn set_substance<T: Into<String>>(&mut self, substance: T) -> Result<()> {
        self.scope = self.scope.with_substance(substance)?;
        self.variable_frames.truncate(3);
        let frame = self.variable_frames[2].get_with_level(ContextLevel::Substance)?;
        self.variable_frames.push(frame);
        let (app, sub) = self.current_pair()?;
        self.streams.ensure_substance(app, sub);
        Ok(())
    }

    // ---- variables ------------------------------------------------------

    /// Define a variable at the current scope level.
    pub fn define_variable(&mut self, name: &str, value: EngineNumber) -> Result<()> {
        self.variable_frames
            .last_mut()
            .expect("at least the global frame")
            .define_variable(name, value)
    }

    /// Read a variable via the scope chain.
    pub fn get_variable(&self, name: &str) -> Result<EngineNumber> {
        self.variable_frames
            .last()
            .expect("at least the global frame")
            .get_variable(name)
    }

    /// Write a variable via the scope chain.
    pub fn set_variable(&mut self, name: &str, value: EngineNumber) -> Result<()> {
        self.variable_frames
            .last_mut()
            .expect("at least the global frame")
            .set_variable(name, value)
    }

    // ---- stream I/O -------------------------------------------------

    /// Read a stream of the current scope's substance.
    pub fn get_stream(&self, name: StreamName) -> Result<EngineNumber> {
        let (app, sub) = self.current_pair()?;
        self.streams.get_stream(app, sub, name)
    }

    fn is_count_units(units: &UnitLabel) -> bool {
        units.as_str() == "unit" || units.as_str() == "units"
    }

    /// Only a count-unit write on a sales subcomponent implies new equipment
    /// entering service (spec scenario 1 vs. 6): a mass-denominated write is
    /// "just sales," with no head-count of its own to carry into population.
    ///
    /// `Set` replaces `stream`'s contribution outright — a second `set` of
    /// the same stream in the same year must not sum with the first, since
    /// `Set` itself replaces rather than accumulates.
    fn record_sales_growth_set(&mut self, name: StreamName, mass_value: Decimal) -> Result<()> {
        let id = self.substance_id()?;
        self.sales_growth_this_year.insert((id, name), mass_value);
        Ok(())
    }

    /// `Change` accumulates `stream`'s contribution across multiple calls in
    /// the same year.
    fn record_sales_growth_change(&mut self, name: StreamName, mass_delta: Decimal) -> Result<()> {
        let id = self.substance_id()?;
        *self
            .sales_growth_this_year
            .entry((id, name))
            .or_insert(Decimal::ZERO) += mass_delta;
        Ok(())
    }

    /// Write a stream of the current scope's substance, replacing its value;
    /// a no-op when `matcher` excludes the current year.
    pub fn set_stream(&mut self, name: StreamName, value: EngineNumber, matcher: YearMatcher) -> Result<EngineNumber> {
        if !matcher.get_in_range(self.current_year) {
            warn!("set {} is outside its active years for {}", name, self.current_year);
            return self.get_stream(name);
        }
        let is_count_write = name.is_sales_subcomponent() && Self::is_count_units(&value.units);
        let (app, sub) = self.current_pair()?;
        let app = app.to_string();
        let sub = sub.to_string();
        self.streams.set_stream(&app, &sub, name, value)?;
        let resolved = self.streams.get_stream(&app, &sub, name)?;
        if is_count_write {
            self.record_sales_growth_set(name, resolved.value)?;
        }
        Ok(resolved)
    }

    /// Add `delta` to a stream's current value, converting units first; a
    /// no-op when `matcher` excludes the current year.
    pub fn change_stream(&mut self, name: StreamName, delta: EngineNumber, matcher: YearMatcher) -> Result<EngineNumber> {
        if !matcher.get_in_range(self.current_year) {
            warn!("change {} is outside its active years for {}", name, self.current_year);
            return self.get_stream(name);
        }
        let current = self.get_stream(name)?;
        let annual_delta = if delta.units.is_each_year() {
            UnitConverter::strip_each_year(&delta)
        } else {
            delta
        };
        let is_count_write = name.is_sales_subcomponent() && Self::is_count_units(&annual_delta.units);
        let state = self.state_getter();
        let converted = UnitConverter::convert(&current.units, &annual_delta, &state)?;
        let new_value = current.add(&converted);
        let (app, sub) = self.current_pair()?;
        let app = app.to_string();
        let sub = sub.to_string();
        self.streams.set_stream(&app, &sub, name, new_value)?;
        if is_count_write {
            self.record_sales_growth_change(name, converted.value)?;
        }
        Ok(new_value)
    }

    fn effective_initial_charge(&self, name: StreamName) -> Result<EngineNumber> {
        let (app, sub) = self.current_pair()?;
        self.streams.parameterization(app, sub)?.get_initial_charge(name)
    }

    fn recharge_mass_on_top(&self) -> Result<Decimal> {
        let (app, sub) = self.current_pair()?;
        let param = self.streams.parameterization(app, sub)?;
        let prior_equipment = self.streams.get_stream(app, sub, StreamName::priorEquipment)?;
        let population_share = UnitConverter::resolve_percentage(&param.recharge_population, &prior_equipment);
        Ok(population_share.value * param.recharge_intensity.value)
    }

    /// Cap a stream to `limit`; when the limit is given in counts on a sales
    /// subcomponent, folds in this year's recharge-on-top mass (spec 4.7/4.8
    /// and example 2). Excess beyond the limit is optionally displaced to
    /// the same stream of `displace_target`, a substance name.
    pub fn cap_stream(
        &mut self,
        name: StreamName,
        limit: EngineNumber,
        displace_target: Option<&str>,
        matcher: YearMatcher,
    ) -> Result<EngineNumber> {
        if !matcher.get_in_range(self.current_year) {
            warn!("cap {} is outside its active years for {}", name, self.current_year);
            return self.get_stream(name);
        }
        let current = self.get_stream(name)?;
        let effective_limit_mass = self.effective_limit_mass(name, &limit)?;
        if current.value <= effective_limit_mass {
            return Ok(current);
        }
        let excess = current.value - effective_limit_mass;
        let limited = EngineNumber::new(effective_limit_mass, current.units.clone());
        let new_value = self.set_stream(name, limited, YearMatcher::unbounded())?;
        if let Some(target) = displace_target {
            self.displace(name, excess, target)?;
        }
        Ok(new_value)
    }

    /// Floor a stream to `limit`, the mirror of `cap_stream`: raises values
    /// below the limit and optionally subtracts the shortfall from
    /// `displace_target`.
    pub fn floor_stream(
        &mut self,
        name: StreamName,
        limit: EngineNumber,
        displace_target: Option<&str>,
        matcher: YearMatcher,
    ) -> Result<EngineNumber> {
        if !matcher.get_in_range(self.current_year) {
            warn!("floor {} is outside its active years for {}", name, self.current_year);
            return self.get_stream(name);
        }
        let current = self.get_stream(name)?;
        let effective_limit_mass = self.effective_limit_mass(name, &limit)?;
        if current.value >= effective_limit_mass {
            return Ok(current);
        }
        let shortfall = effective_limit_mass - current.value;
        let raised = EngineNumber::new(effective_limit_mass, current.units.clone());
        let new_value = self.set_stream(name, raised, YearMatcher::unbounded())?;
        if let Some(target) = displace_target {
            self.displace(name, -shortfall, target)?;
        }
        Ok(new_value)
    }

    fn effective_limit_mass(&self, name: StreamName, limit: &EngineNumber) -> Result<Decimal> {
        let is_count_limit = limit.units.as_str() == "unit" || limit.units.as_str() == "units";
        if name.is_sales_subcomponent() && is_count_limit {
            let charge = self.effective_initial_charge(name)?;
            let recharge_mass = self.recharge_mass_on_top()?;
            Ok(limit.value * charge.value + recharge_mass)
        } else {
            let state = self.state_getter();
            let current = self.get_stream(name)?;
            Ok(UnitConverter::convert(&current.units, limit, &state)?.value)
        }
    }

    /// `amount_kg` positive displaces (reduces) `name` on `target_substance`
    /// by converting through each side's own unit volume; negative amounts
    /// add mass back (used by `floor_stream`'s shortfall).
    fn displace(&mut self, name: StreamName, amount_kg: Decimal, target_substance: &str) -> Result<()> {
        let (app, _) = self.current_pair()?;
        let app = app.to_string();
        let source_auv = self.effective_initial_charge(name)?;
        if source_auv.value.is_zero() {
            return Ok(());
        }
        let counts = amount_kg / source_auv.value;
        let target_param = self.streams.parameterization(&app, target_substance)?;
        let target_auv = target_param.get_initial_charge(name)?;
        let added_mass = counts * target_auv.value;
        let target_current = self.streams.get_stream(&app, target_substance, name)?;
        let target_new = EngineNumber::new(target_current.value + added_mass, "kg");
        self.streams.set_stream(&app, target_substance, name, target_new)?;
        Ok(())
    }

    /// Specify recovered volume and yield for the current substance; credits
    /// `recycle` with `volume x yield%` and optionally displaces virgin
    /// sales of `displace_target` (a substance name) proportionally across
    /// manufacture/import. Multiple calls within a year are additive.
    pub fn recover(
        &mut self,
        volume: EngineNumber,
        yield_rate: EngineNumber,
        displace_target: Option<&str>,
        matcher: YearMatcher,
    ) -> Result<EngineNumber> {
        if !matcher.get_in_range(self.current_year) {
            warn!("recover is outside its active years for {}", self.current_year);
            return self.get_stream(StreamName::recycle);
        }
        let state = self.state_getter();
        let volume_kg = UnitConverter::convert(&"kg".into(), &volume, &state)?;
        let fraction = yield_rate.value / Decimal::from(100);
        let recycled_mass = volume_kg.value * fraction;
        let new_value = self.change_stream(StreamName::recycle, EngineNumber::new(recycled_mass, "kg"), YearMatcher::unbounded())?;
        if let Some(target) = displace_target {
            self.displace_virgin_sales(recycled_mass, target)?;
        }
        Ok(new_value)
    }

    fn displace_virgin_sales(&mut self, amount_kg: Decimal, target_substance: &str) -> Result<()> {
        let (app, _) = self.current_pair()?;
        let app = app.to_string();
        let manufacture = self.streams.get_stream(&app, target_substance, StreamName::manufacture)?;
        let import = self.streams.get_stream(&app, target_substance, StreamName::import)?;
        let total = manufacture.value + import.value;
        if total.is_zero() {
            return Ok(());
        }
        let manu_share = amount_kg * manufacture.value / total;
        let import_share = amount_kg * import.value / total;
        let new_manufacture = (manufacture.value - manu_share).max(Decimal::ZERO);
        let new_import = (import.value - import_share).max(Decimal::ZERO);
        self.streams.set_stream(&app, target_substance, StreamName::manufacture, EngineNumber::new(new_manufacture, "kg"))?;
        self.streams.set_stream(&app, target_substance, StreamName::import, EngineNumber::new(new_import, "kg"))?;
        Ok(())
    }

    /// Move `volume` of `from_stream` out of the current substance and into
    /// the same stream of `to_substance`.
    pub fn replace(&mut self, volume: EngineNumber, from_stream: StreamName, to_substance: &str, matcher: YearMatcher) -> Result<EngineNumber> {
        if !matcher.get_in_range(self.current_year) {
            warn!("replace is outside its active years for {}", self.current_year);
            return self.get_stream(from_stream);
        }
        let (app, _) = self.current_pair()?;
        let app = app.to_string();
        let state = self.state_getter();
        let volume_mass = UnitConverter::convert(&"kg".into(), &volume, &state)?;
        self.change_stream(from_stream, EngineNumber::new(-volume_mass.value, "kg"), YearMatcher::unbounded())?;
        let current_to = self.streams.get_stream(&app, to_substance, from_stream)?;
        let new_to = EngineNumber::new(current_to.value + volume_mass.value, "kg");
        self.streams.set_stream(&app, to_substance, from_stream, new_to)?;
        Ok(new_to)
    }

    /// Mark `stream` as eligible for subsequent writes on the current
    /// substance; a no-op when `matcher` excludes the current year.
    pub fn enable(&mut self, stream: StreamName, matcher: YearMatcher) -> Result<()> {
        if !matcher.get_in_range(self.current_year) {
            warn!("enable {} is outside its active years for {}", stream, self.current_year);
            return Ok(());
        }
        let (app, sub) = self.current_pair()?;
        self.enabled_streams.insert((app.to_string(), sub.to_string(), stream));
        Ok(())
    }

    /// Whether `stream` has been enabled for the current substance.
    pub fn is_enabled(&self, stream: StreamName) -> bool {
        match self.current_pair() {
            Ok((app, sub)) => self.enabled_streams.contains(&(app.to_string(), sub.to_string(), stream)),
            Err(_) => false,
        }
    }

    /// Set `rechargePopulation`/`rechargeIntensity` for the current
    /// substance; a no-op when `matcher` excludes the current year.
    pub fn recharge(&mut self, population: EngineNumber, intensity: EngineNumber, matcher: YearMatcher) -> Result<()> {
        if !matcher.get_in_range(self.current_year) {
            warn!("recharge is outside its active years for {}", self.current_year);
            return Ok(());
        }
        let (app, sub) = self.current_pair()?;
        let (app, sub) = (app.to_string(), sub.to_string());
        let param = self.streams.parameterization_mut(&app, &sub)?;
        param.recharge_population = population;
        param.recharge_intensity = intensity;
        Ok(())
    }

    /// Set `retirementRate` for the current substance; a no-op when
    /// `matcher` excludes the current year.
    pub fn retire(&mut self, rate: EngineNumber, matcher: YearMatcher) -> Result<()> {
        if !matcher.get_in_range(self.current_year) {
            warn!("retire is outside its active years for {}", self.current_year);
            return Ok(());
        }
        let (app, sub) = self.current_pair()?;
        let (app, sub) = (app.to_string(), sub.to_string());
        self.streams.parameterization_mut(&app, &sub)?.retirement_rate = rate;
        Ok(())
    }

    /// Set `initialCharge[stream]` for the current substance; a no-op when
    /// `matcher` excludes the current year.
    pub fn set_initial_charge(&mut self, stream: StreamName, value: EngineNumber, matcher: YearMatcher) -> Result<()> {
        if !matcher.get_in_range(self.current_year) {
            warn!("initial charge {} is outside its active years for {}", stream, self.current_year);
            return Ok(());
        }
        let (app, sub) = self.current_pair()?;
        let (app, sub) = (app.to_string(), sub.to_string());
        self.streams.parameterization_mut(&app, &sub)?.set_initial_charge(stream, value)
    }

    /// Normalize a composite `<numerator>/<mass>` rate to its per-kg form,
    /// the canonical denomination `ghgIntensity`/`energyIntensity` are
    /// stored in (mass streams themselves are always kept in kg). A rate
    /// given per `mt` is scaled by `1/1000`; per `kg` it passes through.
    fn normalize_per_kg_rate(numerator: &str, value: &EngineNumber) -> Result<EngineNumber> {
        let mut parts = value.units.as_str().splitn(2, '/');
        let num = parts.next().unwrap_or("");
        let denom = parts.next().unwrap_or("");
        if num != numerator {
            return Err(EngineError::ConfigurationError(format!(
                "equals expects {}/kg or {}/mt, got {}",
                numerator, numerator, value.units
            )));
        }
        let scaled = match denom {
            "kg" => value.value,
            "mt" => value.value / Decimal::from(1000),
            other => {
                return Err(EngineError::ConfigurationError(format!(
                    "equals expects {}/kg or {}/mt, got {}/{}",
                    numerator, numerator, numerator, other
                )))
            }
        };
        Ok(EngineNumber::new(scaled, format!("{}/kg", numerator)))
    }

    /// Write `ghgIntensity` or `energyIntensity` for the current substance,
    /// inferred from `value`'s units (`tCO2e/{kg,mt}` or `kwh/{kg,mt}`
    /// respectively); either denomination normalizes to the canonical
    /// per-kg rate before being stored.
    pub fn apply_equals(&mut self, value: EngineNumber) -> Result<()> {
        let (app, sub) = self.current_pair()?;
        let (app, sub) = (app.to_string(), sub.to_string());
        let numerator = value.units.as_str().split('/').next().unwrap_or("");
        let normalized = match numerator {
            "tCO2e" => Self::normalize_per_kg_rate("tCO2e", &value)?,
            "kwh" => Self::normalize_per_kg_rate("kwh", &value)?,
            other => {
                return Err(EngineError::ConfigurationError(format!(
                    "equals expects a tCO2e or kwh rate, got {}",
                    other
                )))
            }
        };
        let param = self.streams.parameterization_mut(&app, &sub)?;
        match numerator {
            "tCO2e" => param.ghg_intensity = normalized,
            "kwh" => param.energy_intensity = normalized,
            _ => unreachable!("validated above"),
        }
        Ok(())
    }

    /// Read-through accessors for the substance's own parameterization.
    pub fn get_initial_charge(&self, stream: StreamName) -> Result<EngineNumber> {
        self.effective_initial_charge(stream)
    }

    /// Current `ghgIntensity`.
    pub fn get_equals_ghg_intensity(&self) -> Result<EngineNumber> {
        let (app, sub) = self.current_pair()?;
        Ok(self.streams.parameterization(app, sub)?.ghg_intensity.clone())
    }

    /// Current `energyIntensity`.
    pub fn get_equals_energy_intensity(&self) -> Result<EngineNumber> {
        let (app, sub) = self.current_pair()?;
        Ok(self.streams.parameterization(app, sub)?.energy_intensity.clone())
    }

    /// Current `rechargePopulation`.
    pub fn get_recharge_volume(&self) -> Result<EngineNumber> {
        let (app, sub) = self.current_pair()?;
        Ok(self.streams.parameterization(app, sub)?.recharge_population.clone())
    }

    /// Current `rechargeIntensity`.
    pub fn get_recharge_intensity(&self) -> Result<EngineNumber> {
        let (app, sub) = self.current_pair()?;
        Ok(self.streams.parameterization(app, sub)?.recharge_intensity.clone())
    }

    /// Current `retirementRate`.
    pub fn get_retirement_rate(&self) -> Result<EngineNumber> {
        let (app, sub) = self.current_pair()?;
        Ok(self.streams.parameterization(app, sub)?.retirement_rate.clone())
    }

    /// Convert `value` into `target` units using the engine's live state.
    pub fn convert(&self, target: &UnitLabel, value: &EngineNumber) -> Result<EngineNumber> {
        let state = self.state_getter();
        UnitConverter::convert(target, value, &state)
    }

    // ---- year advance & results --------------------------------------

    /// Advance to the next year: rolls `equipment` into `priorEquipment` for
    /// every registered substance, resets within-year accumulators, and
    /// clears this year's sales-growth tracking.
    pub fn increment_year(&mut self) {
        debug!("advancing from year {} to {}", self.current_year, self.current_year + 1);
        self.streams.increment_year();
        self.sales_growth_this_year.clear();
        self.current_year += 1;
    }

    /// Materialize `EngineResult`s for every registered substance at the
    /// current year, resolving equipment evolution (spec 4.8) along the way.
    pub fn get_results(&mut self) -> Result<EngineResults> {
        let ids = self.streams.get_registered_substances();
        let mut results = Vec::with_capacity(ids.len());
        for id in ids {
            let result = self.get_result_for(&id.application, &id.substance)?;
            results.push(result);
        }
        Ok(EngineResults {
            year: self.current_year,
            results,
        })
    }

    fn get_result_for(&mut self, app: &str, sub: &str) -> Result<EngineResult> {
        let prior_equipment = self.streams.get_stream(app, sub, StreamName::priorEquipment)?;
        let manufacture = self.streams.get_stream(app, sub, StreamName::manufacture)?;
        let import = self.streams.get_stream(app, sub, StreamName::import)?;
        let export = self.streams.get_stream(app, sub, StreamName::export)?;
        let recycle = self.streams.get_stream(app, sub, StreamName::recycle)?;
        let param = self.streams.parameterization(app, sub)?.clone();

        let retired = UnitConverter::resolve_percentage(&param.retirement_rate, &prior_equipment);
        let id = SubstanceInApplicationId::new(app, sub);
        let sales_growth_mass = self
            .sales_growth_this_year
            .get(&(id.clone(), StreamName::manufacture))
            .copied()
            .unwrap_or(Decimal::ZERO)
            + self
                .sales_growth_this_year
                .get(&(id, StreamName::import))
                .copied()
                .unwrap_or(Decimal::ZERO);
        let initial_charge_sales = param.initial_charge_sales(manufacture.value, import.value);
        let new_equipment_count = if sales_growth_mass.is_zero() || initial_charge_sales.value.is_zero() {
            Decimal::ZERO
        } else {
            sales_growth_mass / initial_charge_sales.value
        };
        let population = prior_equipment.value - retired.value + new_equipment_count;
        self.streams.set_stream(app, sub, StreamName::equipment, EngineNumber::new(population, "units"))?;

        let recharge_mass = {
            let population_share = UnitConverter::resolve_percentage(&param.recharge_population, &prior_equipment);
            population_share.value * param.recharge_intensity.value
        };
        let eol_mass = retired.value * initial_charge_sales.value;

        let domestic_consumption = EngineNumber::new(manufacture.value * param.ghg_intensity.value, "tCO2e");
        let import_consumption = EngineNumber::new(import.value * param.ghg_intensity.value, "tCO2e");
        let export_consumption = EngineNumber::new(export.value * param.ghg_intensity.value, "tCO2e");
        let recycle_consumption = EngineNumber::new(recycle.value * param.ghg_intensity.value, "tCO2e");
        let recharge_emissions = EngineNumber::new(recharge_mass * param.ghg_intensity.value, "tCO2e");
        let eol_emissions = EngineNumber::new(eol_mass * param.ghg_intensity.value, "tCO2e");
        let sales_mass = manufacture.value + import.value;
        let energy_consumption = EngineNumber::new(sales_mass * param.energy_intensity.value, "kwh");

        let export_initial_charge_value = if initial_charge_sales.value.is_zero() {
            EngineNumber::zero("units")
        } else {
            EngineNumber::new(export.value / initial_charge_sales.value, "units")
        };
        let export_initial_charge_consumption = EngineNumber::new(export.value * param.ghg_intensity.value, "tCO2e");

        Ok(EngineResult {
            year: self.current_year,
            application: app.to_string(),
            substance: sub.to_string(),
            manufacture,
            import,
            export,
            recycle,
            population: EngineNumber::new(population, "units"),
            population_new: EngineNumber::new(new_equipment_count, "units"),
            domestic_consumption,
            import_consumption,
            export_consumption,
            recycle_consumption,
            recharge_emissions,
            eol_emissions,
            energy_consumption,
            trade_supplement: TradeSupplement {
                export_initial_charge_value,
                export_initial_charge_consumption,
            },
        })
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("scope", &self.scope)
            .field("current_year", &self.current_year)
            .field("start_year", &self.start_year)
            .field("streams", &self.streams)
            .field("rng", &self.rng.is_some())
            .finish()
    }
}
