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
Variables and scope
====================

A lexically scoped variable chain, keyed by context level, and the `Scope`
triple (stanza, application, substance) that tracks where the engine
currently is in the source program.
*/

use std::collections::HashMap;

use crate::error::{EngineError, Result};
use crate::number::EngineNumber;

/// The four nesting levels a variable (or scope field) can live at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ContextLevel {
    /// Outermost level, shared by the whole scenario.
    Global = 0,
    /// A single stanza (e.g. `default`, a named policy).
    Stanza = 1,
    /// A single application within a stanza.
    Application = 2,
    /// A single substance within an application.
    Substance = 3,
}

impl ContextLevel {
    /// Build a level from its numeric value; only 0..=3 are valid.
    pub fn from_u8(v: u8) -> Result<Self> {
        match v {
            0 => Ok(ContextLevel::Global),
            1 => Ok(ContextLevel::Stanza),
            2 => Ok(ContextLevel::Application),
            3 => Ok(ContextLevel::Substance),
            other => Err(EngineError::InvalidContextLevel(other)),
        }
    }
}

/// A chain of variable frames, one per context level from global down to
/// the current level.
///
/// Reading searches from the current level outward to global. Setting an
/// existing variable edits the frame that defines it (possibly an outer,
/// shadowed one). Defining always creates a fresh binding at the current
/// level, shadowing any same-named outer binding; redefining at the same
/// level is a hard error.
#[derive(Debug, Clone)]
pub struct VariableManager {
    frames: Vec<HashMap<String, EngineNumber>>,
}

impl VariableManager {
    /// A manager with a single, empty global frame.
    pub fn new() -> Self {
        VariableManager {
            frames: vec![HashMap::new()],
        }
    }

    /// The level of the innermost (current) frame.
    pub fn level(&self) -> ContextLevel {
        // frames.len() - 1 is always in 0..=3 by construction.
        ContextLevel::from_u8((self.frames.len() - 1) as u8).expect("frame depth stays in range")
    }

    /// Derive a child manager with a fresh innermost frame at `level`,
    /// sharing all frames outer to it.
    ///
    /// `level` must be exactly one deeper than the current level (the chain
    /// is built incrementally as scope narrows); any other value is an
    /// `InvalidContextLevel` error.
    pub fn get_with_level(&self, level: ContextLevel) -> Result<VariableManager> {
        let current = self.frames.len();
        if level as usize != current {
            return Err(EngineError::InvalidContextLevel(level as u8));
        }
        let mut frames = self.frames.clone();
        frames.push(HashMap::new());
        Ok(VariableManager { frames })
    }

    /// Define a variable at the current (innermost) level. Fails if a
    /// binding for `name` already exists at this exact level.
    pub fn define_variable(&mut self, name: &str, value: EngineNumber) -> Result<()> {
        let top = self.frames.last_mut().expect("at least one frame");
        if top.contains_key(name) {
            return Err(EngineError::Redefinition {
                name: name.to_string(),
            });
        }
        top.insert(name.to_string(), value);
        Ok(())
    }

    /// Set an existing variable, searching outward from the current level.
    /// Fails if no frame defines `name`.
    pub fn set_variable(&mut self, name: &str, value: EngineNumber) -> Result<()> {
        for frame in self.frames.iter_mut().rev() {
            if let Some(slot) = frame.get_mut(name) {
                *slot = value;
                return Ok(());
            }
        }
        Err(EngineError::UndefinedVariable {
            name: name.to_string(),
        })
    }

    /// Read a variable, searching outward from the current level.
    pub fn get_variable(&self, name: &str) -> Result<EngineNumber> {
        for frame in self.frames.iter().rev() {
            if let Some(value) = frame.get(name) {
                return Ok(value.clone());
            }
        }
        Err(EngineError::UndefinedVariable {
            name: name.to_string(),
        })
    }
}

impl Default for VariableManager {
    fn default() -> Self {
        VariableManager::new()
    }
}

/// The (stanza, application, substance) triple identifying where the engine
/// currently is in the source program.
///
/// Fields are hierarchical: a substance requires an application, an
/// application requires a stanza. Narrowing (`with_application`,
/// `with_substance`) preserves wider fields; widening resets narrower
/// fields to `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope {
    stanza: Option<String>,
    application: Option<String>,
    substance: Option<String>,
}

impl Scope {
    /// An empty scope (no stanza, application, or substance set).
    pub fn new() -> Self {
        Scope::default()
    }

    /// The current stanza, if set.
    pub fn stanza(&self) -> Option<&str> {
        self.stanza.as_deref()
    }

    /// The current application, if set.
    pub fn application(&self) -> Option<&str> {
        self.application.as_deref()
    }

    /// The current substance, if set.
    pub fn substance(&self) -> Option<&str> {
        self.substance.as_deref()
    }

    /// Set the stanza, resetting application and substance (widening the
    /// focus of the scope always clears everything narrower).
    pub fn with_stanza<T: Into<String>>(&self, stanza: T) -> Scope {
        Scope {
            stanza: Some(stanza.into()),
            application: None,
            substance: None,
        }
    }

    /// Set the application, requiring a stanza to already be present, and
    /// resetting substance.
    pub fn with_application<T: Into<String>>(&self, application: T) -> Result<Scope> {
        if self.stanza.is_none() {
            return Err(EngineError::ScopeHierarchy(
                "cannot set application without a stanza".to_string(),
            ));
        }
        Ok(Scope {
            stanza: self.stanza.clone(),
            application: Some(application.into()),
            substance: None,
        })
    }

    /// Set the substance, requiring an application to already be present.
    pub fn with_substance<T: Into<String>>(&self, substance: T) -> Result<Scope> {
        if self.application.is_none() {
            return Err(EngineError::ScopeHierarchy(
                "cannot set substance without an application".to_string(),
            ));
        }
        Ok(Scope {
            stanza: self.stanza.clone(),
            application: self.application.clone(),
            substance: Some(substance.into()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn n(v: i64) -> EngineNumber {
        EngineNumber::new(Decimal::from(v), "kg")
    }

    #[test]
    fn shadowing_does_not_mutate_outer() {
        let mut global = VariableManager::new();
        global.define_variable("x", n(1)).unwrap();

        let mut stanza = global.get_with_level(ContextLevel::Stanza).unwrap();
        stanza.define_variable("x", n(2)).unwrap();

        assert_eq!(stanza.get_variable("x").unwrap().value, Decimal::from(2));
        assert_eq!(global.get_variable("x").unwrap().value, Decimal::from(1));
    }

    #[test]
    fn set_edits_nearest_defining_frame() {
        let mut global = VariableManager::new();
        global.define_variable("y", n(1)).unwrap();
        let mut stanza = global.get_with_level(ContextLevel::Stanza).unwrap();
        // y is not redefined here, so set_variable must reach through to global.
        stanza.set_variable("y", n(99)).unwrap();
        assert_eq!(stanza.get_variable("y").unwrap().value, Decimal::from(99));
    }

    #[test]
    fn redefinition_at_same_level_fails() {
        let mut global = VariableManager::new();
        global.define_variable("z", n(1)).unwrap();
        assert!(matches!(
            global.define_variable("z", n(2)),
            Err(EngineError::Redefinition { .. })
        ));
    }

    #[test]
    fn undefined_variable_errors() {
        let global = VariableManager::new();
        assert!(matches!(
            global.get_variable("missing"),
            Err(EngineError::UndefinedVariable { .. })
        ));
    }

    #[test]
    fn scope_hierarchy_is_enforced() {
        let scope = Scope::new();
        assert!(matches!(
            scope.with_application("refrigeration"),
            Err(EngineError::ScopeHierarchy(_))
        ));
        let scope = scope.with_stanza("default");
        let scope = scope.with_application("refrigeration").unwrap();
        let scope = scope.with_substance("HFC-134a").unwrap();
        assert_eq!(scope.stanza(), Some("default"));
        assert_eq!(scope.application(), Some("refrigeration"));
        assert_eq!(scope.substance(), Some("HFC-134a"));
    }

    #[test]
    fn widening_resets_narrower_fields() {
        let scope = Scope::new()
            .with_stanza("default")
            .with_application("refrigeration")
            .unwrap()
            .with_substance("HFC-134a")
            .unwrap();
        let widened = scope.with_stanza("policy-a");
        assert_eq!(widened.application(), None);
        assert_eq!(widened.substance(), None);
    }
}
