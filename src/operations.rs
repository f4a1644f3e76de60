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
Operation set
=============

The closed set of operations a compiled program is built from, as a tagged
enum rather than a trait-object hierarchy — the set is known in full at
compile time, so a match in `execute` gives exhaustiveness checking instead of
indirect dispatch.
*/

use crate::error::Result;
use crate::machine::Machine;
use crate::number::{EngineNumber, UnitLabel};
use crate::stream::StreamName;
use crate::year_matcher::YearMatcher;

/// Comparison operators evaluated by `Operation::Comparison`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    /// `==`
    Equals,
    /// `!=`
    NotEquals,
    /// `>`
    GreaterThan,
    /// `<`
    LessThan,
    /// `>=`
    GreaterThanOrEqual,
    /// `<=`
    LessThanOrEqual,
}

/// Logical operators evaluated by `Operation::Logical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    /// True iff both operands are truthy.
    And,
    /// True iff either operand is truthy.
    Or,
    /// True iff exactly one operand is truthy.
    Xor,
}

/// A node in a compiled operation tree. Every variant's `execute` evaluates
/// its sub-operations (which push/pop on the machine's stack as needed) and
/// leaves exactly one resulting `EngineNumber` on top of the stack, so
/// operations compose as an expression tree even when they carry side
/// effects on engine state.
#[derive(Debug, Clone)]
pub enum Operation {
    /// Push a literal value.
    PreCalculated(EngineNumber),
    /// `left + right`.
    Addition(Box<Operation>, Box<Operation>),
    /// `left - right`.
    Subtraction(Box<Operation>, Box<Operation>),
    /// `left * right`.
    Multiplication(Box<Operation>, Box<Operation>),
    /// `left / right`.
    Division(Box<Operation>, Box<Operation>),
    /// Evaluate both operands and compare them.
    Comparison(Box<Operation>, Box<Operation>, ComparisonOp),
    /// Evaluate both operands and combine them logically.
    Logical(Box<Operation>, Box<Operation>, LogicalOp),
    /// Evaluate `cond`; execute exactly one of `then`/`els`.
    Conditional(Box<Operation>, Box<Operation>, Box<Operation>),
    /// Evaluate `operand`, then convert it to `target` units.
    ChangeUnits(Box<Operation>, UnitLabel),
    /// Evaluate `operand` and clamp it to `[lower, upper]`; either bound may
    /// be absent to disable that side. When `lower_only` is set, the upper
    /// bound is never applied even when present, so a call site can carry an
    /// upper expression for documentation/reuse without it taking effect.
    Limit(Box<Operation>, Option<Box<Operation>>, Option<Box<Operation>>, bool),
    /// Evaluate `value`, define it as `name` in the current scope, and
    /// leave it on the stack.
    DefineVariable(String, Box<Operation>),
    /// Push the value of `name` from the scope chain.
    GetVariable(String),
    /// Push a stream's value, optionally converted to `target`.
    GetStream(StreamName, Option<UnitLabel>),
    /// Evaluate `value` and write it to `stream`, replacing its prior value.
    Set(StreamName, Box<Operation>, YearMatcher),
    /// Evaluate `delta` and add it to `stream`'s current value.
    Change(StreamName, Box<Operation>, YearMatcher),
    /// Evaluate `limit` and cap `stream` to it, optionally displacing excess
    /// into the same stream of another substance.
    Cap(StreamName, Box<Operation>, Option<String>, YearMatcher),
    /// Evaluate `limit` and floor `stream` to it, optionally displacing the
    /// shortfall out of the same stream of another substance.
    Floor(StreamName, Box<Operation>, Option<String>, YearMatcher),
    /// Evaluate `population` and `intensity` and set the substance's
    /// recharge parameterization.
    Recharge(Box<Operation>, Box<Operation>, YearMatcher),
    /// Evaluate `rate` and set the substance's retirement rate.
    Retire(Box<Operation>, YearMatcher),
    /// Evaluate `volume` and `yield_rate`, credit `recycle`, and optionally
    /// displace virgin sales of another substance.
    Recover(Box<Operation>, Box<Operation>, Option<String>, YearMatcher),
    /// Evaluate `volume` and move it from `from_stream` of the current
    /// substance to the same stream of `to_substance`.
    Replace(Box<Operation>, StreamName, String, YearMatcher),
    /// Mark `stream` eligible for subsequent writes.
    Enable(StreamName, YearMatcher),
    /// Evaluate `value` and set `initialCharge[stream]`.
    InitialCharge(StreamName, Box<Operation>, YearMatcher),
    /// Evaluate `value` and set `ghgIntensity` or `energyIntensity`
    /// depending on its units.
    Equals(Box<Operation>),
}

impl Operation {
    /// Execute this operation against `machine`, leaving its result on top
    /// of the stack.
    pub fn execute(&self, machine: &mut Machine) -> Result<()> {
        match self {
            Operation::PreCalculated(value) => {
                machine.push(value.clone());
                Ok(())
            }
            Operation::Addition(left, right) => {
                left.execute(machine)?;
                right.execute(machine)?;
                machine.add()
            }
            Operation::Subtraction(left, right) => {
                left.execute(machine)?;
                right.execute(machine)?;
                machine.subtract()
            }
            Operation::Multiplication(left, right) => {
                left.execute(machine)?;
                right.execute(machine)?;
                machine.multiply()
            }
            Operation::Division(left, right) => {
                left.execute(machine)?;
                right.execute(machine)?;
                machine.divide()
            }
            Operation::Comparison(left, right, op) => {
                left.execute(machine)?;
                right.execute(machine)?;
                match op {
                    ComparisonOp::Equals => machine.equals(),
                    ComparisonOp::NotEquals => machine.not_equals(),
                    ComparisonOp::GreaterThan => machine.greater_than(),
                    ComparisonOp::LessThan => machine.less_than(),
                    ComparisonOp::GreaterThanOrEqual => machine.greater_than_or_equal(),
                    ComparisonOp::LessThanOrEqual => machine.less_than_or_equal(),
                }
            }
            Operation::Logical(left, right, op) => {
                left.execute(machine)?;
                right.execute(machine)?;
                match op {
                    LogicalOp::And => machine.and(),
                    LogicalOp::Or => machine.or(),
                    LogicalOp::Xor => machine.xor(),
                }
            }
            Operation::Conditional(cond, then, els) => {
                cond.execute(machine)?;
                let value = machine.pop()?;
                if value.is_truthy() {
                    then.execute(machine)
                } else {
                    els.execute(machine)
                }
            }
            Operation::ChangeUnits(operand, target) => {
                operand.execute(machine)?;
                let value = machine.pop()?;
                let converted = if value.units.is_empty() {
                    EngineNumber::new(value.value, target.clone())
                } else if value.units == *target {
                    value
                } else {
                    machine.engine_mut().convert(target, &value)?
                };
                machine.push(converted);
                Ok(())
            }
            Operation::Limit(operand, lower, upper, lower_only) => {
                operand.execute(machine)?;
                let mut value = machine.pop()?;
                if let Some(lower) = lower {
                    lower.execute(machine)?;
                    let bound = machine.pop()?;
                    if value.value < bound.value {
                        value = EngineNumber::new(bound.value, value.units.clone());
                    }
                }
                if let Some(upper) = upper {
                    if *lower_only {
                        upper.execute(machine)?;
                        machine.pop()?;
                    } else {
                        upper.execute(machine)?;
                        let bound = machine.pop()?;
                        if value.value > bound.value {
                            value = EngineNumber::new(bound.value, value.units.clone());
                        }
                    }
                }
                machine.push(value);
                Ok(())
            }
            Operation::DefineVariable(name, value) => {
                value.execute(machine)?;
                let resolved = machine.pop()?;
                machine.engine_mut().define_variable(name, resolved)?;
                machine.push(resolved);
                Ok(())
            }
            Operation::GetVariable(name) => {
                let value = machine.engine().get_variable(name)?;
                machine.push(value);
                Ok(())
            }
            Operation::GetStream(name, target) => {
                let value = machine.engine().get_stream(*name)?;
                let result = match target {
                    Some(target) => machine.engine().convert(target, &value)?,
                    None => value,
                };
                machine.push(result);
                Ok(())
            }
            Operation::Set(stream, value, during) => {
                value.execute(machine)?;
                let resolved = machine.pop()?;
                let written = machine.engine_mut().set_stream(*stream, resolved, *during)?;
                machine.push(written);
                Ok(())
            }
            Operation::Change(stream, delta, during) => {
                delta.execute(machine)?;
                let resolved = machine.pop()?;
                let written = machine.engine_mut().change_stream(*stream, resolved, *during)?;
                machine.push(written);
                Ok(())
            }
            Operation::Cap(stream, limit, displacement, during) => {
                limit.execute(machine)?;
                let resolved = machine.pop()?;
                let written = machine
                    .engine_mut()
                    .cap_stream(*stream, resolved, displacement.as_deref(), *during)?;
                machine.push(written);
                Ok(())
            }
            Operation::Floor(stream, limit, displacement, during) => {
                limit.execute(machine)?;
                let resolved = machine.pop()?;
                let written = machine
                    .engine_mut()
                    .floor_stream(*stream, resolved, displacement.as_deref(), *during)?;
                machine.push(written);
                Ok(())
            }
            Operation::Recharge(population, intensity, during) => {
                population.execute(machine)?;
                let population_value = machine.pop()?;
                intensity.execute(machine)?;
                let intensity_value = machine.pop()?;
                machine
                    .engine_mut()
                    .recharge(population_value.clone(), intensity_value, *during)?;
                machine.push(population_value);
                Ok(())
            }
            Operation::Retire(rate, during) => {
                rate.execute(machine)?;
                let rate_value = machine.pop()?;
                machine.engine_mut().retire(rate_value.clone(), *during)?;
                machine.push(rate_value);
                Ok(())
            }
            Operation::Recover(volume, yield_rate, displacement, during) => {
                volume.execute(machine)?;
                let volume_value = machine.pop()?;
                yield_rate.execute(machine)?;
                let yield_value = machine.pop()?;
                let recycled = machine
                    .engine_mut()
                    .recover(volume_value, yield_value, displacement.as_deref(), *during)?;
                machine.push(recycled);
                Ok(())
            }
            Operation::Replace(volume, from_stream, to_substance, during) => {
                volume.execute(machine)?;
                let volume_value = machine.pop()?;
                let written = machine
                    .engine_mut()
                    .replace(volume_value, *from_stream, to_substance, *during)?;
                machine.push(written);
                Ok(())
            }
            Operation::Enable(stream, during) => {
                machine.engine_mut().enable(*stream, *during)?;
                machine.push(EngineNumber::boolean(true));
                Ok(())
            }
            Operation::InitialCharge(stream, value, during) => {
                value.execute(machine)?;
                let resolved = machine.pop()?;
                machine
                    .engine_mut()
                    .set_initial_charge(*stream, resolved.clone(), *during)?;
                machine.push(resolved);
                Ok(())
            }
            Operation::Equals(value) => {
                value.execute(machine)?;
                let resolved = machine.pop()?;
                machine.engine_mut().apply_equals(resolved.clone())?;
                machine.push(resolved);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;
    use rust_decimal::Decimal;

    fn engine_with_substance() -> Engine {
        let mut engine = Engine::new(2025);
        engine.set_stanza("default").unwrap();
        engine.set_application("refrigeration").unwrap();
        engine.set_substance("HFC-134a").unwrap();
        engine
    }

    fn lit(v: i64, u: &str) -> Box<Operation> {
        Box::new(Operation::PreCalculated(EngineNumber::new(Decimal::from(v), u)))
    }

    #[test]
    fn conditional_runs_exactly_one_branch() {
        let mut engine = engine_with_substance();
        let mut machine = Machine::new(&mut engine);
        let op = Operation::Conditional(
            lit(1, ""),
            Box::new(Operation::PreCalculated(EngineNumber::new(Decimal::from(10), "kg"))),
            Box::new(Operation::PreCalculated(EngineNumber::new(Decimal::from(99), "kg"))),
        );
        op.execute(&mut machine).unwrap();
        assert_eq!(machine.get_result().unwrap().value, Decimal::from(10));
    }

    #[test]
    fn set_then_get_stream_round_trips() {
        let mut engine = engine_with_substance();
        let mut machine = Machine::new(&mut engine);
        Operation::Set(StreamName::manufacture, lit(100, "kg"), YearMatcher::unbounded())
            .execute(&mut machine)
            .unwrap();
        Operation::GetStream(StreamName::manufacture, None).execute(&mut machine).unwrap();
        assert_eq!(machine.get_result().unwrap().value, Decimal::from(100));
    }

    #[test]
    fn limit_clamps_to_bounds() {
        let mut engine = engine_with_substance();
        let mut machine = Machine::new(&mut engine);
        let op = Operation::Limit(lit(50, "kg"), Some(lit(0, "kg")), Some(lit(10, "kg")), false);
        op.execute(&mut machine).unwrap();
        assert_eq!(machine.get_result().unwrap().value, Decimal::from(10));
    }

    #[test]
    fn limit_with_lower_only_ignores_upper_bound() {
        let mut engine = engine_with_substance();
        let mut machine = Machine::new(&mut engine);
        let op = Operation::Limit(lit(50, "kg"), Some(lit(0, "kg")), Some(lit(10, "kg")), true);
        op.execute(&mut machine).unwrap();
        assert_eq!(machine.get_result().unwrap().value, Decimal::from(50));
    }

    #[test]
    fn limit_with_lower_only_still_applies_lower_bound() {
        let mut engine = engine_with_substance();
        let mut machine = Machine::new(&mut engine);
        let op = Operation::Limit(lit(-5, "kg"), Some(lit(0, "kg")), Some(lit(10, "kg")), true);
        op.execute(&mut machine).unwrap();
        assert_eq!(machine.get_result().unwrap().value, Decimal::from(0));
    }

    #[test]
    fn define_variable_then_get_variable() {
        let mut engine = engine_with_substance();
        let mut machine = Machine::new(&mut engine);
        Operation::DefineVariable("x".to_string(), lit(7, "kg")).execute(&mut machine).unwrap();
        machine.pop().unwrap();
        Operation::GetVariable("x".to_string()).execute(&mut machine).unwrap();
        assert_eq!(machine.get_result().unwrap().value, Decimal::from(7));
    }

    #[test]
    fn equals_routes_by_units() {
        let mut engine = engine_with_substance();
        {
            let mut machine = Machine::new(&mut engine);
            Operation::Equals(Box::new(Operation::PreCalculated(EngineNumber::new(Decimal::from(5), "tCO2e/kg"))))
                .execute(&mut machine)
                .unwrap();
        }
        assert_eq!(engine.get_equals_ghg_intensity().unwrap().value, Decimal::from(5));
    }
}
