/*! Strategy dispatcher.

Inspects the pattern shape, the position automaton and the extracted
literals once, at preparation time, and picks how match calls will run.
The decision ladder, most to least specialized:

1. The pattern is exactly one literal: Shift-Or search, no verification.
2. The pattern's language is a small enumerable set of literals (an
   alternation of literals, or a full multi-path expansion): Teddy
   search, no verification beyond Teddy's own byte compare.
3. The pattern is a single repetition of one byte or one class: run
   scanning.
4. A mandatory literal of length >= 4 exists: scan for the literal,
   then verify candidates with the evaluator inside a bounded lookback
   window. Patterns containing an unbounded greedy any-repeat are
   excluded, the window cannot bound their match starts.
5. The automaton is alternation-shaped and exact and fits the
   bit-parallel state budget: BitNFA locates the match, the evaluator
   refines the end position.
6. Otherwise: the general evaluator, unaided.
*/

use bstr::ByteSlice;
use log::debug;
use regex_syntax::hir::HirKind;

use crate::automaton::Automaton;
use crate::bitnfa::{BitNfa, MAX_STATES};
use crate::errors::Error;
use crate::eval;
use crate::hir::{class_to_bytes, Hir};
use crate::literals;
use crate::scan::classscan::ClassScanner;
use crate::scan::runscan;
use crate::scan::shiftor::ShiftOr;
use crate::scan::teddy::Teddy;

/// Shortest mandatory literal worth prefiltering with. Anything shorter
/// produces too many candidate positions to amortize the verification.
const MIN_PREFILTER_LEN: usize = 4;

/// How far behind a literal hit the verifier looks for the match start.
const LOOKBACK: usize = 64;

/// Automata with more states than this, or more alternations, count as
/// alternation-shaped.
const ALTERNATION_STATES: usize = 16;
const ALTERNATION_COUNT: usize = 3;

pub(crate) enum Strategy {
    /// The pattern is exactly this literal.
    Literal(ShiftOr),
    /// The pattern's language is exactly this set of literals.
    LiteralSet(Teddy),
    /// The pattern is a repetition of a single byte.
    ByteRun(RunBounds, u8),
    /// The pattern is a repetition of a single class.
    ClassRun(RunBounds, ClassScanner),
    /// Scan for a mandatory literal, verify candidates with the
    /// evaluator inside the lookback window.
    Prefiltered(ShiftOr),
    /// Bit-parallel automaton locates the match, the evaluator refines
    /// the reported end so preference order is preserved.
    BitParallel(BitNfa),
    /// Plain backtracking over every start position.
    Evaluator,
}

/// Repetition bounds of a run strategy.
pub(crate) struct RunBounds {
    min: u32,
    max: Option<u32>,
    greedy: bool,
}

impl Strategy {
    /// Decides the strategy for `hir`. Called once per pattern.
    pub fn select(hir: &Hir, automaton: &Automaton) -> Result<Self, Error> {
        if let Some(bytes) = hir.as_literal_bytes() {
            if let Some(searcher) = ShiftOr::new(bytes) {
                debug!("strategy: literal {:?}", bytes.as_bstr());
                return Ok(Self::Literal(searcher));
            }
        }

        let literals = literals::extract(automaton, hir);

        // An alternation of literals, or a pattern whose multi-path
        // expansion succeeded, is *equivalent* to its literal set; the
        // set search needs no further verification.
        let set: Option<Vec<Vec<u8>>> = hir.alternation_literals().or_else(
            || {
                literals
                    .expanded
                    .as_ref()
                    .map(|set| set.iter().map(|lit| lit.to_vec()).collect())
            },
        );
        match set.as_deref() {
            Some([lit]) => {
                if let Some(searcher) = ShiftOr::new(lit) {
                    debug!("strategy: literal {:?}", lit.as_bstr());
                    return Ok(Self::Literal(searcher));
                }
            }
            Some(set) => {
                if let Some(searcher) = Teddy::new(set) {
                    debug!("strategy: literal set of {}", set.len());
                    return Ok(Self::LiteralSet(searcher));
                }
            }
            None => {}
        }

        if let Some(strategy) = run_strategy(hir) {
            debug!("strategy: run scan");
            return Ok(strategy);
        }

        if !hir.contains_greedy_any_repeat() {
            if let Some(best) = &literals.best {
                if best.bytes.len() >= MIN_PREFILTER_LEN {
                    if let Some(searcher) = ShiftOr::new(&best.bytes) {
                        debug!(
                            "strategy: prefilter with {:?} ({:?}, \
                             dominator length {})",
                            best.bytes.as_bstr(),
                            best.source,
                            literals.dominator_len,
                        );
                        return Ok(Self::Prefiltered(searcher));
                    }
                }
            }
        }

        let alternation_shaped = automaton.num_positions() > ALTERNATION_STATES
            || hir.alternation_count() > ALTERNATION_COUNT;
        if alternation_shaped
            && automaton.is_exact()
            && automaton.num_positions() <= MAX_STATES
        {
            debug!("strategy: bit-parallel automaton");
            return Ok(Self::BitParallel(BitNfa::compile(automaton)?));
        }

        debug!("strategy: general evaluator");
        Ok(Self::Evaluator)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Literal(_) => "literal",
            Self::LiteralSet(_) => "literal-set",
            Self::ByteRun(..) => "byte-run",
            Self::ClassRun(..) => "class-run",
            Self::Prefiltered(_) => "prefilter",
            Self::BitParallel(_) => "bitnfa",
            Self::Evaluator => "evaluator",
        }
    }

    /// Leftmost match at or after `from`, as a `(start, end)` pair. All
    /// strategies agree with the evaluator on which match is reported.
    pub fn find(
        &self,
        hir: &Hir,
        haystack: &[u8],
        from: usize,
    ) -> Option<(usize, usize)> {
        if from > haystack.len() {
            return None;
        }
        match self {
            Self::Literal(searcher) => searcher
                .find(haystack, from)
                .map(|start| (start, start + searcher.len())),
            Self::LiteralSet(searcher) => {
                searcher.find(haystack, from).map(|(start, idx)| {
                    (start, start + searcher.literals()[idx].len())
                })
            }
            Self::ByteRun(bounds, byte) => find_run(
                haystack,
                from,
                bounds,
                |hay, at| runscan::find_byte(*byte, hay, at),
                |hay, at| runscan::run_end(*byte, hay, at),
            ),
            Self::ClassRun(bounds, scanner) => find_run(
                haystack,
                from,
                bounds,
                |hay, at| scanner.find(hay, at),
                |hay, at| scanner.run_end(hay, at),
            ),
            Self::Prefiltered(searcher) => {
                let mut at = from;
                loop {
                    let hit = searcher.find(haystack, at)?;
                    // The match may start before the literal, but not
                    // further back than the lookback window.
                    let window = hit.saturating_sub(LOOKBACK).max(from);
                    for start in window..=hit {
                        if let Some(end) = eval::find_at(hir, haystack, start)
                        {
                            return Some((start, end));
                        }
                    }
                    at = hit + 1;
                }
            }
            Self::BitParallel(nfa) => {
                // The automaton carries no look assertions (it would not
                // be exact otherwise), so searching a suffix slice is
                // equivalent to searching in place.
                let (start, end) = nfa.find(&haystack[from..])?;
                let start = from + start;
                let end = eval::find_at(hir, haystack, start)
                    .unwrap_or(from + end);
                Some((start, end))
            }
            Self::Evaluator => eval::find(hir, haystack, from),
        }
    }

    /// Returns true if the pattern matches the whole of `input`.
    pub fn matches(&self, hir: &Hir, input: &[u8]) -> bool {
        match self {
            Self::BitParallel(nfa) => nfa.matches(input),
            _ => eval::matches(hir, input),
        }
    }
}

/// Recognizes patterns that are one repetition of a single byte or a
/// single class, like `a+`, `a{2,5}` or `[a-z]*`.
fn run_strategy(hir: &Hir) -> Option<Strategy> {
    let rep = match hir.kind() {
        HirKind::Repetition(rep) => rep,
        _ => return None,
    };
    let bounds =
        RunBounds { min: rep.min, max: rep.max, greedy: rep.greedy };
    match rep.sub.kind() {
        HirKind::Literal(lit) if lit.0.len() == 1 => {
            Some(Strategy::ByteRun(bounds, lit.0[0]))
        }
        HirKind::Class(class) => {
            let class = class_to_bytes(class)?;
            Some(Strategy::ClassRun(bounds, ClassScanner::new(&class)))
        }
        _ => None,
    }
}

/// Leftmost run of at least `bounds.min` repeated elements. The reported
/// end honors greediness, so the result matches what backtracking over
/// the same repetition reports.
fn find_run(
    haystack: &[u8],
    from: usize,
    bounds: &RunBounds,
    find: impl Fn(&[u8], usize) -> Option<usize>,
    run_end: impl Fn(&[u8], usize) -> usize,
) -> Option<(usize, usize)> {
    let take = |len: usize| {
        if bounds.greedy {
            bounds.max.map_or(len, |max| len.min(max as usize))
        } else {
            bounds.min as usize
        }
    };
    if bounds.min == 0 {
        // Nullable repetitions match (possibly empty) at the first
        // position tried.
        let len = run_end(haystack, from) - from;
        return Some((from, from + take(len)));
    }
    let mut at = from;
    while let Some(start) = find(haystack, at) {
        let end = run_end(haystack, start);
        let len = end - start;
        if len >= bounds.min as usize {
            return Some((start, start + take(len)));
        }
        // Every start inside a too-short run fails too.
        at = end + 1;
        if at > haystack.len() {
            break;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::Strategy;
    use crate::automaton::Automaton;
    use crate::hir::Hir;
    use crate::parser::Parser;

    fn select(pattern: &str) -> (Hir, Strategy) {
        let hir = Parser::new().parse(pattern).unwrap();
        let automaton = Automaton::build(&hir).unwrap();
        let strategy = Strategy::select(&hir, &automaton).unwrap();
        (hir, strategy)
    }

    fn name(pattern: &str) -> &'static str {
        select(pattern).1.name()
    }

    #[test]
    fn selection() {
        assert_eq!(name("foobar"), "literal");
        assert_eq!(name("Tom|Sawyer|Huckleberry|Finn"), "literal-set");
        assert_eq!(name("doc[il1]ment"), "literal-set");
        assert_eq!(name("(foo|bar)test"), "literal-set");
        assert_eq!(name("a+"), "byte-run");
        assert_eq!(name("[a-z]*"), "class-run");
        assert_eq!(name("[a-z]+test"), "prefilter");
        assert_eq!(name("[a-z]+[0-9]+"), "evaluator");
        // An unbounded greedy any-repeat disables prefiltering.
        assert_eq!(name("test.*more"), "evaluator");
    }

    #[test]
    fn alternation_shaped_patterns_use_the_bit_parallel_automaton() {
        // Too many branches to expand, no shared literal of length 4.
        assert_eq!(
            name("(ax|bx|cx|dx|ex|fx|gx|hx|ix|jx|kx|lx|mx|nx|ox|px|qx)"),
            "bitnfa"
        );
        // Counted repetitions make the automaton inexact, so this
        // alternation-heavy pattern still runs on the evaluator.
        assert_eq!(name("(a|b)(c|d)(e|f)(g|h)x{2,3}"), "evaluator");
    }

    #[test]
    fn greedy_any_repeat_matches_far_ahead_of_the_literal() {
        // The match start lies well outside any lookback window, so the
        // mandatory "test" literal must not be used as a prefilter even
        // though `.` leaves a newline hole in default mode.
        let (hir, strategy) = select("x.*test");
        assert_eq!(strategy.name(), "evaluator");
        let mut hay = b"x".to_vec();
        hay.extend_from_slice(&[b'a'; 100]);
        hay.extend_from_slice(b"test");
        assert_eq!(strategy.find(&hir, &hay, 0), Some((0, 105)));
    }

    #[test]
    fn region_literal_prefilter() {
        // 17 branches defeat expansion; the shared suffix is recovered
        // by region analysis and is long enough to prefilter with.
        let branches: Vec<String> =
            (b'a'..=b'q').map(|c| format!("{}ting", c as char)).collect();
        let pattern = branches.join("|");
        let (hir, strategy) = select(&pattern);
        assert_eq!(strategy.name(), "prefilter");
        assert_eq!(strategy.find(&hir, b"++qting++", 0), Some((2, 7)));
        assert_eq!(strategy.find(&hir, b"++sting++", 0), None);
    }

    #[test]
    fn strategies_report_evaluator_matches() {
        for (pattern, hay, expected) in [
            ("foobar", "..foobar..", Some((2, 8))),
            ("doc[il1]ment", "a doc1ment", Some((2, 10))),
            ("(foo|bar)test", "** bartest", Some((3, 10))),
            ("a+", "xxaaab", Some((2, 5))),
            ("a+?", "xxaaab", Some((2, 3))),
            ("a{2,3}", "xaaaaax", Some((1, 4))),
            ("[a-z]*", "123abc", Some((0, 0))),
            ("[a-z]+test", "00 footest 11", Some((3, 10))),
            ("[a-z]+test", "no occurrence", None),
        ] {
            let (hir, strategy) = select(pattern);
            assert_eq!(
                strategy.find(&hir, hay.as_bytes(), 0),
                expected,
                "pattern {}",
                pattern
            );
        }
    }
}
