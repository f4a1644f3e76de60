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
substance-flow-engine
======================

A year-by-year simulation engine for refrigerant/substance flow accounting:
equipment populations, virgin and recycled sales, and greenhouse-gas/energy
consumption across scenarios, applications and substances.

This crate implements the engine core only — grammar/parsing, scenario
orchestration, result serialization, CLI handling and Monte-Carlo randomness
are host/collaborator concerns (see `engine::RandomSource` for the one typed
seam this crate exposes for the last of those).
*/

#![deny(missing_docs)]

#[cfg(test)]
#[macro_use]
extern crate pretty_assertions;

#[macro_use]
extern crate serde_derive;

pub mod engine;
pub mod error;
pub mod keeper;
pub mod machine;
pub mod number;
pub mod operations;
pub mod result;
pub mod stream;
pub mod units;
pub mod variables;
pub mod year_matcher;

pub use engine::Engine;
pub use error::{EngineError, Result};
pub use keeper::{StreamKeeper, SubstanceInApplicationId};
pub use machine::Machine;
pub use number::{EngineNumber, UnitLabel};
pub use operations::{ComparisonOp, LogicalOp, Operation};
pub use result::{EngineResult, EngineResults, TradeSupplement};
pub use stream::{StreamName, StreamParameterization};
pub use units::{OverridingStateGetter, StateGetter, UnitConverter};
pub use variables::{ContextLevel, Scope, VariableManager};
pub use year_matcher::YearMatcher;

/// Version number
pub static VERSION: &str = env!("CARGO_PKG_VERSION");
