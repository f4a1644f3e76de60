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

// Author(s): Rafael Villar Burke <pachi@ietcc.csic.es>,
//            Daniel Jiménez González <dani@ietcc.csic.es>,
//            Marta Sorribes Gil <msorribes@ietcc.csic.es>

/*!
Error handling
==============

Error handling types and helpers for the simulation engine.
*/

use std::fmt;

/// Engine-wide result alias.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors raised by the simulation engine.
///
/// All errors are deterministic and fatal to the current scenario/trial run;
/// the engine never retries an operation after one of these is raised, and
/// they propagate unchanged from the innermost operation that detects them.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Stream access for an (application, substance) pair that was never
    /// registered with `ensure_substance`.
    UnknownSubstance {
        /// Application name
        application: String,
        /// Substance name
        substance: String,
    },
    /// A stream name outside the closed vocabulary for the requested operation.
    UnknownStream {
        /// Substance the stream was requested on
        substance: String,
        /// The offending stream name
        stream: String,
    },
    /// A count-unit write to a sales subcomponent whose initial charge is zero.
    ZeroInitialCharge {
        /// Substance the write targeted
        substance: String,
        /// Stream the write targeted (manufacture or import)
        stream: String,
    },
    /// A unit conversion was requested across incompatible families with no
    /// defined bridge.
    UnitMismatch {
        /// Unit actually present on the value
        from: String,
        /// Unit the caller required
        to: String,
    },
    /// Division by zero or another invalid arithmetic operation.
    ArithmeticError(String),
    /// Read or write of a variable name not defined in the current scope chain.
    UndefinedVariable {
        /// The undefined name
        name: String,
    },
    /// A `define_variable` at a level where the name is already bound.
    Redefinition {
        /// The name that was redefined
        name: String,
    },
    /// `get_with_level` called with a level outside {0,1,2,3}.
    InvalidContextLevel(u8),
    /// A `Scope` was built or narrowed without the outer field its narrower
    /// field requires (a substance needs an application, an application
    /// needs a stanza).
    ScopeHierarchy(String),
    /// An invalid stream name was used in a parameterization setter, e.g.
    /// `initial_charge` for a stream other than manufacture/import.
    ConfigurationError(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use EngineError::*;
        match self {
            UnknownSubstance {
                application,
                substance,
            } => write!(
                f,
                "unregistered substance \"{}\" in application \"{}\"",
                substance, application
            ),
            UnknownStream { substance, stream } => write!(
                f,
                "unknown stream \"{}\" for substance \"{}\"",
                stream, substance
            ),
            ZeroInitialCharge { substance, stream } => write!(
                f,
                "zero initial charge for stream \"{}\" of substance \"{}\"",
                stream, substance
            ),
            UnitMismatch { from, to } => {
                write!(f, "cannot convert from units \"{}\" to \"{}\"", from, to)
            }
            ArithmeticError(msg) => write!(f, "arithmetic error: {}", msg),
            UndefinedVariable { name } => write!(f, "undefined variable \"{}\"", name),
            Redefinition { name } => {
                write!(f, "variable \"{}\" redefined at the same scope level", name)
            }
            InvalidContextLevel(level) => write!(f, "invalid context level: {}", level),
            ScopeHierarchy(msg) => write!(f, "scope hierarchy violation: {}", msg),
            ConfigurationError(msg) => write!(f, "invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for EngineError {}
