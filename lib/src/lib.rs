/*! A byte-string pattern-matching engine.

Patterns are prepared once and matched many times. Preparation parses the
pattern into a byte-oriented HIR, builds a Glushkov position automaton
over it, proves which literal substrings are mandatory for any match, and
picks a matching strategy; every derived table is computed eagerly and
stored immutably inside the returned [`Regex`], so match calls are pure
functions of the prepared pattern and the input bytes and can run
concurrently without locking.

Most patterns never reach the general backtracking evaluator: pure
literals and enumerable literal sets are searched with vectorized
primitives, patterns with a provably mandatory substring scan for it
first and only verify around the occurrences, and alternation-heavy
patterns run on a bit-parallel automaton.

```
use fastre::Regex;

let re = Regex::new("(foo|bar)test")?;
assert!(re.is_match(b"== bartest =="));

let m = re.find(b"== bartest ==").unwrap();
assert_eq!(m.range(), 3..10);
assert_eq!(m.as_bytes(), b"bartest");
# Ok::<(), fastre::Error>(())
```
*/

pub use crate::errors::Error;

mod automaton;
mod bitnfa;
mod errors;
mod eval;
mod hir;
mod literals;
mod parser;
mod scan;
mod strategy;

#[cfg(test)]
mod tests;

use std::ops::Range;

use crate::eval::CaptureSlots;
use crate::hir::Hir;
use crate::parser::Parser;
use crate::strategy::Strategy;

/// Configures and builds a [`Regex`].
#[derive(Default)]
pub struct RegexBuilder {
    case_insensitive: bool,
    dot_matches_new_line: bool,
}

impl RegexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Match letters case-insensitively.
    pub fn case_insensitive(mut self, yes: bool) -> Self {
        self.case_insensitive = yes;
        self
    }

    /// Let `.` match any byte, including newlines.
    pub fn dot_matches_new_line(mut self, yes: bool) -> Self {
        self.dot_matches_new_line = yes;
        self
    }

    /// Prepares `pattern` for matching.
    pub fn build(&self, pattern: &str) -> Result<Regex, Error> {
        let hir = Parser::new()
            .case_insensitive(self.case_insensitive)
            .dot_matches_new_line(self.dot_matches_new_line)
            .parse(pattern)?;
        let automaton = automaton::Automaton::build(&hir)?;
        let strategy = Strategy::select(&hir, &automaton)?;
        Ok(Regex { hir, strategy })
    }
}

/// A prepared pattern.
///
/// All analysis happens in [`Regex::new`]; the resulting value is
/// immutable and can be shared across threads.
pub struct Regex {
    hir: Hir,
    strategy: Strategy,
}

impl Regex {
    /// Prepares `pattern` with the default configuration. See
    /// [`RegexBuilder`] for the configurable variant.
    pub fn new(pattern: &str) -> Result<Self, Error> {
        RegexBuilder::new().build(pattern)
    }

    /// Returns true if the pattern matches anywhere in `haystack`.
    pub fn is_match(&self, haystack: &[u8]) -> bool {
        self.strategy.find(&self.hir, haystack, 0).is_some()
    }

    /// Returns true if the pattern matches the whole of `input`, as if it
    /// were anchored at both ends.
    pub fn matches(&self, input: &[u8]) -> bool {
        self.strategy.matches(&self.hir, input)
    }

    /// Returns the leftmost match in `haystack`.
    pub fn find<'h>(&self, haystack: &'h [u8]) -> Option<Match<'h>> {
        self.find_at(haystack, 0)
    }

    /// Returns an iterator over the non-overlapping matches in
    /// `haystack`, left to right.
    pub fn find_iter<'r, 'h>(&'r self, haystack: &'h [u8]) -> Matches<'r, 'h> {
        Matches { regex: self, haystack, at: 0 }
    }

    /// Returns the leftmost match together with its capture-group spans.
    ///
    /// Group 0 is the overall match. This always runs the evaluator over
    /// the match to recover the group spans, so prefer [`Regex::find`]
    /// when the groups are not needed.
    pub fn captures<'h>(&self, haystack: &'h [u8]) -> Option<Captures<'h>> {
        let m = self.find(haystack)?;
        let (_, slots) = eval::captures_at(&self.hir, haystack, m.start)?;
        Some(Captures { haystack, slots })
    }

    /// Name of the strategy picked at preparation time. Diagnostic only;
    /// the set of names is not part of the stable interface.
    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    fn find_at<'h>(&self, haystack: &'h [u8], at: usize) -> Option<Match<'h>> {
        let (start, end) = self.strategy.find(&self.hir, haystack, at)?;
        Some(Match { haystack, start, end })
    }
}

/// A single match in a haystack.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Match<'h> {
    haystack: &'h [u8],
    start: usize,
    end: usize,
}

impl<'h> Match<'h> {
    #[inline]
    pub fn start(&self) -> usize {
        self.start
    }

    #[inline]
    pub fn end(&self) -> usize {
        self.end
    }

    #[inline]
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    #[inline]
    pub fn as_bytes(&self) -> &'h [u8] {
        &self.haystack[self.start..self.end]
    }
}

/// Iterator over the non-overlapping matches in a haystack. Each search
/// resumes past the previous match end; an empty match advances by one
/// byte so the iterator always makes progress.
pub struct Matches<'r, 'h> {
    regex: &'r Regex,
    haystack: &'h [u8],
    at: usize,
}

impl<'r, 'h> Iterator for Matches<'r, 'h> {
    type Item = Match<'h>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.at > self.haystack.len() {
            return None;
        }
        let m = self.regex.find_at(self.haystack, self.at)?;
        self.at = if m.is_empty() { m.end + 1 } else { m.end };
        Some(m)
    }
}

/// Capture-group spans of a single match.
pub struct Captures<'h> {
    haystack: &'h [u8],
    slots: CaptureSlots,
}

impl<'h> Captures<'h> {
    /// The span of capture group `i`, if the group participated in the
    /// match. Group 0 is the overall match.
    pub fn get(&self, i: usize) -> Option<Match<'h>> {
        let start = (*self.slots.get(i * 2)?)?;
        let end = (*self.slots.get(i * 2 + 1)?)?;
        Some(Match { haystack: self.haystack, start, end })
    }

    /// Number of capture groups, including group 0.
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len() / 2
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
