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
Push-down evaluator
====================

A single-threaded, non-suspending stack machine that interprets an
`Operation` tree. Arithmetic/comparison/logical primitives pop their
operands right-to-left (the left operand was pushed first) and push a
single result.
*/

use crate::engine::Engine;
use crate::error::{EngineError, Result};
use crate::number::EngineNumber;

/// The value stack plus a handle back to the engine being mutated.
///
/// Owned exclusively by the enclosing `Operation::execute` call for its
/// duration — there is no suspension point, so no other code can observe
/// the stack mid-evaluation.
#[derive(Debug)]
pub struct Machine<'e> {
    stack: Vec<EngineNumber>,
    engine: &'e mut Engine,
}

impl<'e> Machine<'e> {
    /// Start a fresh, empty-stack evaluation against `engine`.
    pub fn new(engine: &'e mut Engine) -> Self {
        Machine {
            stack: Vec::new(),
            engine,
        }
    }

    /// Mutable access to the engine this machine is evaluating against.
    pub fn engine_mut(&mut self) -> &mut Engine {
        self.engine
    }

    /// Read-only access to the engine.
    pub fn engine(&self) -> &Engine {
        self.engine
    }

    /// Push a value onto the stack.
    pub fn push(&mut self, value: EngineNumber) {
        self.stack.push(value);
    }

    /// Pop the top value off the stack.
    pub fn pop(&mut self) -> Result<EngineNumber> {
        self.stack.pop().ok_or_else(|| {
            EngineError::ArithmeticError("popped an empty evaluator stack".to_string())
        })
    }

    /// Peek at the top of the stack without removing it.
    pub fn get_result(&self) -> Result<EngineNumber> {
        self.stack
            .last()
            .cloned()
            .ok_or_else(|| EngineError::ArithmeticError("evaluator stack is empty".to_string()))
    }

    fn binary<F>(&mut self, f: F) -> Result<()>
    where
        F: FnOnce(&EngineNumber, &EngineNumber) -> Result<EngineNumber>,
    {
        let right = self.pop()?;
        let left = self.pop()?;
        let result = f(&left, &right)?;
        self.push(result);
        Ok(())
    }

    /// `left + right`
    pub fn add(&mut self) -> Result<()> {
        self.binary(|l, r| Ok(l.add(r)))
    }

    /// `left - right`
    pub fn subtract(&mut self) -> Result<()> {
        self.binary(|l, r| Ok(l.sub(r)))
    }

    /// `left * right`
    pub fn multiply(&mut self) -> Result<()> {
        self.binary(|l, r| Ok(l.mul(r)))
    }

    /// `left / right`, failing on division by zero.
    pub fn divide(&mut self) -> Result<()> {
        self.binary(|l, r| l.div(r))
    }

    /// `left == right`, dimensionless 0/1.
    pub fn equals(&mut self) -> Result<()> {
        self.binary(|l, r| Ok(EngineNumber::boolean(l.value == r.value)))
    }

    /// `left != right`, dimensionless 0/1.
    pub fn not_equals(&mut self) -> Result<()> {
        self.binary(|l, r| Ok(EngineNumber::boolean(l.value != r.value)))
    }

    /// `left > right`, dimensionless 0/1.
    pub fn greater_than(&mut self) -> Result<()> {
        self.binary(|l, r| Ok(EngineNumber::boolean(l.value > r.value)))
    }

    /// `left < right`, dimensionless 0/1.
    pub fn less_than(&mut self) -> Result<()> {
        self.binary(|l, r| Ok(EngineNumber::boolean(l.value < r.value)))
    }

    /// `left >= right`, dimensionless 0/1.
    pub fn greater_than_or_equal(&mut self) -> Result<()> {
        self.binary(|l, r| Ok(EngineNumber::boolean(l.value >= r.value)))
    }

    /// `left <= right`, dimensionless 0/1.
    pub fn less_than_or_equal(&mut self) -> Result<()> {
        self.binary(|l, r| Ok(EngineNumber::boolean(l.value <= r.value)))
    }

    /// `left AND right`, truthy iff both operands are non-zero.
    pub fn and(&mut self) -> Result<()> {
        self.binary(|l, r| Ok(EngineNumber::boolean(l.is_truthy() && r.is_truthy())))
    }

    /// `left OR right`, truthy iff either operand is non-zero.
    pub fn or(&mut self) -> Result<()> {
        self.binary(|l, r| Ok(EngineNumber::boolean(l.is_truthy() || r.is_truthy())))
    }

    /// `left XOR right`, truthy iff exactly one operand is non-zero.
    pub fn xor(&mut self) -> Result<()> {
        self.binary(|l, r| Ok(EngineNumber::boolean(l.is_truthy() ^ r.is_truthy())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;
    use rust_decimal::Decimal;

    fn num(v: i64) -> EngineNumber {
        EngineNumber::new(Decimal::from(v), "kg")
    }

    #[test]
    fn arithmetic_pops_right_to_left() {
        let mut engine = Engine::new(2025);
        let mut m = Machine::new(&mut engine);
        m.push(num(10)); // left, pushed first
        m.push(num(3)); // right, pushed second
        m.subtract().unwrap();
        assert_eq!(m.get_result().unwrap().value, Decimal::from(7));
    }

    #[test]
    fn division_by_zero_is_arithmetic_error() {
        let mut engine = Engine::new(2025);
        let mut m = Machine::new(&mut engine);
        m.push(num(10));
        m.push(num(0));
        assert!(matches!(m.divide(), Err(EngineError::ArithmeticError(_))));
    }

    #[test]
    fn logical_ops_are_dimensionless_booleans() {
        let mut engine = Engine::new(2025);
        let mut m = Machine::new(&mut engine);
        m.push(num(1));
        m.push(num(0));
        m.xor().unwrap();
        let r = m.get_result().unwrap();
        assert!(r.units.is_empty());
        assert_eq!(r.value, Decimal::ONE);
    }
}
