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
Year matcher
============

An inclusive, closed year range used to gate when a declarative operation
applies within a year-by-year run.
*/

use serde::{Deserialize, Serialize};

/// Inclusive range predicate over simulation years.
///
/// Either end may be omitted to mean unbounded on that side. Reversed
/// endpoints (`start > end`) are normalized on construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearMatcher {
    start: Option<i32>,
    end: Option<i32>,
}

impl YearMatcher {
    /// Build a matcher from optional bounds, normalizing reversed endpoints.
    pub fn new(start: Option<i32>, end: Option<i32>) -> Self {
        match (start, end) {
            (Some(a), Some(b)) if a > b => YearMatcher {
                start: Some(b),
                end: Some(a),
            },
            _ => YearMatcher { start, end },
        }
    }

    /// A matcher that always applies.
    pub fn unbounded() -> Self {
        YearMatcher {
            start: None,
            end: None,
        }
    }

    /// A matcher that only applies in a single year.
    pub fn exact(year: i32) -> Self {
        YearMatcher::new(Some(year), Some(year))
    }

    /// True iff `year` falls within the inclusive range.
    pub fn get_in_range(&self, year: i32) -> bool {
        let after_start = self.start.map_or(true, |s| year >= s);
        let before_end = self.end.map_or(true, |e| year <= e);
        after_start && before_end
    }
}

impl Default for YearMatcher {
    fn default() -> Self {
        YearMatcher::unbounded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbounded_matches_everything() {
        let m = YearMatcher::unbounded();
        assert!(m.get_in_range(-1000));
        assert!(m.get_in_range(3000));
    }

    #[test]
    fn reversed_endpoints_are_normalized() {
        let m = YearMatcher::new(Some(2030), Some(2020));
        assert!(m.get_in_range(2025));
        assert!(!m.get_in_range(2019));
        assert!(!m.get_in_range(2031));
    }

    #[test]
    fn one_sided_bounds() {
        let lower_only = YearMatcher::new(Some(2025), None);
        assert!(!lower_only.get_in_range(2024));
        assert!(lower_only.get_in_range(2025));
        assert!(lower_only.get_in_range(9999));

        let upper_only = YearMatcher::new(None, Some(2025));
        assert!(upper_only.get_in_range(-9999));
        assert!(upper_only.get_in_range(2025));
        assert!(!upper_only.get_in_range(2026));
    }
}
