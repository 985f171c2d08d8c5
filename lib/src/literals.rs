/*! Literal extraction.

Proves which byte substrings are mandatory for any match, so the matcher
can scan for them with a cheap search before running the full pattern.
Three analyses feed one result:

1. Dominator analysis over the position automaton: a position every
   accepting path must pass through. The longest consecutive run of
   dominators carrying concrete byte symbols is a mandatory substring.
2. Region analysis: when the dominator run is short, a backward walk from
   the accept states (and a forward walk from the start) recovers a
   suffix/prefix shared by every alternation branch.
3. Multi-path expansion: small classes and alternations of literals are
   expanded into an enumerated set of alternative substrings.

A wrong literal causes false negatives, so every analysis degrades to
"no literal" whenever it cannot prove mandatoriness.
*/

use itertools::Itertools;
use smallvec::SmallVec;

use crate::automaton::{Automaton, PosSet, Symbol};
use crate::hir::{class_to_bytes, Hir};

/// Maximum number of literals produced by multi-path expansion.
pub(crate) const MAX_LITERALS: usize = 16;

/// Maximum length of an extracted literal, in bytes.
pub(crate) const MAX_LITERAL_LEN: usize = 64;

/// Classes with more bytes than this are not expanded.
pub(crate) const MAX_CLASS_EXPANSION: usize = 11;

/// Dominator runs at least this long skip the region-analysis fallback.
const REGION_FALLBACK_THRESHOLD: usize = 16;

pub(crate) type LiteralBytes = SmallVec<[u8; 16]>;

/// Which analysis produced a literal.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum Source {
    Dominator,
    Region,
}

/// A single mandatory literal.
///
/// Mandatory by construction: both producing analyses only report a
/// substring when every accepting path consumes it.
#[derive(Clone, PartialEq, Eq, Debug)]
pub(crate) struct Literal {
    pub bytes: LiteralBytes,
    pub source: Source,
}

/// The result of literal extraction for one pattern.
#[derive(Clone, PartialEq, Eq, Debug)]
pub(crate) struct Literals {
    /// The best single mandatory literal, if any.
    pub best: Option<Literal>,
    /// Enumerated alternative substrings from multi-path expansion, if the
    /// pattern could be fully expanded. Unlike `best`, these are only
    /// collectively exhaustive when the expansion covered every path, and
    /// the dispatcher must still apply the dominance-length check before
    /// trusting them.
    pub expanded: Option<Vec<LiteralBytes>>,
    /// Length of the dominator-analysis literal, kept for that check.
    pub dominator_len: usize,
}

/// Extracts mandatory literals from a pattern.
pub(crate) fn extract(automaton: &Automaton, hir: &Hir) -> Literals {
    let dominator = dominator_literal(automaton);
    let dominator_len = dominator.len();

    let mut best = if dominator.is_empty() {
        None
    } else {
        Some(Literal { bytes: dominator, source: Source::Dominator })
    };

    if dominator_len < REGION_FALLBACK_THRESHOLD {
        let region = region_literal(automaton);
        if region.len() > dominator_len {
            best = Some(Literal { bytes: region, source: Source::Region });
        }
    }

    Literals { best, expanded: expand(hir), dominator_len }
}

/// Returns the set of positions every accepting path must pass through.
pub(crate) fn dominators(automaton: &Automaton) -> PosSet {
    let mut result = PosSet::new();
    for v in 1..automaton.num_positions() {
        if is_dominator(automaton, v) {
            result.insert(v);
        }
    }
    result
}

/// A position dominates if a search from the start that is forbidden from
/// entering it cannot reach any accept state.
fn is_dominator(automaton: &Automaton, v: usize) -> bool {
    let mut visited = PosSet::new();
    visited.insert(v);
    visited.insert(0);
    let mut queue = vec![0];
    while let Some(current) = queue.pop() {
        if current != v && automaton.accept().contains(current) {
            return false;
        }
        for next in automaton.follow(current).iter() {
            if !visited.contains(next) {
                visited.insert(next);
                queue.push(next);
            }
        }
    }
    true
}

/// The longest consecutive run of dominator positions carrying concrete,
/// non-self-looping byte symbols. Runs of equal length keep the earliest.
fn dominator_literal(automaton: &Automaton) -> LiteralBytes {
    let doms = dominators(automaton);

    let mut best = LiteralBytes::new();
    let mut current = LiteralBytes::new();
    let mut prev_pos = 0;

    for pos in doms.iter() {
        let byte = match automaton.symbol(pos) {
            Symbol::Byte(b) if !automaton.has_self_loop(pos) => b,
            _ => {
                if current.len() > best.len() {
                    best = current.clone();
                }
                current.clear();
                continue;
            }
        };
        if !current.is_empty() && pos != prev_pos + 1 {
            // Gap in position numbering breaks the run.
            if current.len() > best.len() {
                best = current.clone();
            }
            current.clear();
        }
        if current.len() < MAX_LITERAL_LEN {
            current.push(byte);
        }
        prev_pos = pos;
    }
    if current.len() > best.len() {
        best = current;
    }
    best
}

/// Recovers a substring shared by every alternation branch, as the longer
/// of the common suffix (walking backward from the accept states) and the
/// common prefix (walking forward from the start).
fn region_literal(automaton: &Automaton) -> LiteralBytes {
    let suffix = common_suffix(automaton);
    let prefix = common_prefix(automaton);
    if prefix.len() > suffix.len() {
        prefix
    } else {
        suffix
    }
}

/// Single byte consumed when entering any position of `frontier`, if they
/// all agree and none of them self-loops.
fn frontier_byte(automaton: &Automaton, frontier: &PosSet) -> Option<u8> {
    let mut byte = None;
    for pos in frontier.iter() {
        match automaton.symbol(pos) {
            Symbol::Byte(b) if !automaton.has_self_loop(pos) => {
                match byte {
                    None => byte = Some(b),
                    Some(prev) if prev == b => {}
                    Some(_) => return None,
                }
            }
            _ => return None,
        }
    }
    byte
}

fn common_suffix(automaton: &Automaton) -> LiteralBytes {
    // A nullable pattern matches the empty string, which has no suffix.
    if automaton.accept().contains(0) {
        return LiteralBytes::new();
    }

    // Reverse adjacency, computed once for the walk.
    let n = automaton.num_positions();
    let mut preds = vec![PosSet::new(); n];
    for from in 0..n {
        for to in automaton.follow(from).iter() {
            preds[to].insert(from);
        }
    }

    let mut suffix = LiteralBytes::new();
    let mut frontier = *automaton.accept();
    while suffix.len() < MAX_LITERAL_LEN {
        let byte = match frontier_byte(automaton, &frontier) {
            Some(byte) => byte,
            None => break,
        };
        suffix.push(byte);
        let mut next = PosSet::new();
        for pos in frontier.iter() {
            next.union_with(&preds[pos]);
        }
        if next.contains(0) {
            // Some match is exactly the bytes collected so far; nothing
            // earlier is mandatory.
            break;
        }
        frontier = next;
    }
    suffix.reverse();
    suffix
}

fn common_prefix(automaton: &Automaton) -> LiteralBytes {
    if automaton.accept().contains(0) {
        return LiteralBytes::new();
    }

    let mut prefix = LiteralBytes::new();
    let mut frontier = *automaton.follow(0);
    while prefix.len() < MAX_LITERAL_LEN {
        let byte = match frontier_byte(automaton, &frontier) {
            Some(byte) => byte,
            None => break,
        };
        prefix.push(byte);
        if frontier.intersects(automaton.accept()) {
            break;
        }
        let mut next = PosSet::new();
        for pos in frontier.iter() {
            next.union_with(automaton.follow(pos));
        }
        frontier = next;
    }
    prefix
}

/// Multi-path expansion.
///
/// Succeeds only when the whole pattern is a concatenation of literals,
/// small byte classes and alternations of expandable subpatterns, so the
/// resulting set enumerates every possible match. Anything else (in
/// particular any repetition) abandons the expansion.
fn expand(hir: &Hir) -> Option<Vec<LiteralBytes>> {
    let factors = expansion_factors(hir.inner())?;
    let count: usize = factors
        .iter()
        .map(|choices| choices.len())
        .try_fold(1usize, |acc, n| {
            let total = acc.checked_mul(n)?;
            (total <= MAX_LITERALS).then_some(total)
        })?;
    if count == 0 {
        return None;
    }

    let mut literals = Vec::with_capacity(count);
    for parts in factors.iter().multi_cartesian_product() {
        let mut literal = LiteralBytes::new();
        for part in parts {
            literal.extend_from_slice(part);
        }
        if literal.is_empty() || literal.len() > MAX_LITERAL_LEN {
            return None;
        }
        literals.push(literal);
    }
    if literals.is_empty() {
        return None;
    }
    Some(literals)
}

/// Decomposes the pattern into a sequence of choice sets whose cartesian
/// product is exactly the pattern's language.
fn expansion_factors(
    hir: &regex_syntax::hir::Hir,
) -> Option<Vec<Vec<Vec<u8>>>> {
    use regex_syntax::hir::HirKind;
    match hir.kind() {
        HirKind::Empty => Some(vec![]),
        HirKind::Literal(lit) => Some(vec![vec![lit.0.to_vec()]]),
        HirKind::Class(class) => {
            let class = class_to_bytes(class)?;
            let mut bytes = Vec::new();
            for range in class.ranges() {
                for b in range.start()..=range.end() {
                    bytes.push(vec![b]);
                    if bytes.len() > MAX_CLASS_EXPANSION {
                        return None;
                    }
                }
            }
            if bytes.is_empty() {
                return None;
            }
            Some(vec![bytes])
        }
        HirKind::Capture(cap) => expansion_factors(&cap.sub),
        HirKind::Concat(subs) => {
            let mut factors = Vec::new();
            for sub in subs {
                factors.extend(expansion_factors(sub)?);
            }
            Some(factors)
        }
        HirKind::Alternation(branches) => {
            // Each branch expands independently; the whole alternation
            // becomes a single choice set over the branch expansions.
            let mut choices = Vec::new();
            for branch in branches {
                let factors = expansion_factors(branch)?;
                let mut branch_literals = vec![Vec::new()];
                for choice_set in factors {
                    let mut next = Vec::new();
                    for prefix in &branch_literals {
                        for choice in &choice_set {
                            let mut literal = prefix.clone();
                            literal.extend_from_slice(choice);
                            next.push(literal);
                        }
                    }
                    branch_literals = next;
                    if branch_literals.len() > MAX_LITERALS {
                        return None;
                    }
                }
                choices.extend(branch_literals);
                if choices.len() > MAX_LITERALS {
                    return None;
                }
            }
            Some(vec![choices])
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{dominators, extract, Literals, Source};
    use crate::automaton::Automaton;
    use crate::parser::Parser;

    fn run(pattern: &str) -> Literals {
        let hir = Parser::new().parse(pattern).unwrap();
        let automaton = Automaton::build(&hir).unwrap();
        extract(&automaton, &hir)
    }

    #[test]
    fn dominator_run() {
        let lits = run("[a-z]+test");
        let best = lits.best.unwrap();
        assert_eq!(best.bytes.as_slice(), b"test");
        assert_eq!(best.source, Source::Dominator);
        assert_eq!(lits.dominator_len, 4);
    }

    #[test]
    fn alternation_keeps_only_shared_bytes() {
        // Neither "foo" nor "bar" is mandatory; "test" is.
        let lits = run("(foo|bar)test");
        let best = lits.best.unwrap();
        assert_eq!(best.bytes.as_slice(), b"test");
        assert_eq!(lits.dominator_len, 4);
        // Expansion enumerates whole-match alternatives, which are longer
        // than the dominator run. The dispatcher's dominance check rejects
        // them for prefiltering.
        let mut expanded = lits.expanded.unwrap();
        expanded.sort();
        assert_eq!(expanded[0].as_slice(), b"bartest");
        assert_eq!(expanded[1].as_slice(), b"footest");
    }

    #[test]
    fn region_suffix() {
        let lits = run("(running|jumping|walking)");
        let best = lits.best.unwrap();
        assert_eq!(best.bytes.as_slice(), b"ing");
        assert_eq!(best.source, Source::Region);
        assert_eq!(lits.dominator_len, 0);
    }

    #[test]
    fn region_prefix() {
        let lits = run("(prefix_a|prefix_bb|prefix_ccc)");
        let best = lits.best.unwrap();
        assert_eq!(best.bytes.as_slice(), b"prefix_");
        assert_eq!(best.source, Source::Region);
    }

    #[test]
    fn shared_suffix_via_dominators() {
        let lits = run("(runn|jump|walk)ing");
        let best = lits.best.unwrap();
        assert_eq!(best.bytes.as_slice(), b"ing");
    }

    #[test]
    fn expansion_of_small_class() {
        let lits = run("doc[il1]ment");
        let mut expanded = lits.expanded.unwrap();
        expanded.sort();
        assert_eq!(expanded[0].as_slice(), b"doc1ment");
        assert_eq!(expanded[1].as_slice(), b"dociment");
        assert_eq!(expanded[2].as_slice(), b"doclment");
    }

    #[test]
    fn expansion_abandoned() {
        // A 26-byte class is past the expansion cap.
        assert_eq!(run("[a-z]x").expanded, None);
        // Repetitions are never expanded.
        assert_eq!(run("ab?c").expanded, None);
        assert_eq!(run("[0-3]+x").expanded, None);
        // Too many combinations.
        assert_eq!(run("[0-9][0-9]x").expanded, None);
    }

    #[test]
    fn no_literal_is_a_valid_answer() {
        let lits = run("[a-z]+[0-9]+");
        assert_eq!(lits.best, None);
        assert_eq!(lits.dominator_len, 0);
    }

    #[test]
    fn nullable_pattern_has_no_mandatory_literal() {
        let lits = run("(abcdef)?");
        assert_eq!(lits.best, None);
    }

    #[test]
    fn dominators_of_linear_pattern() {
        let hir = Parser::new().parse("abc").unwrap();
        let automaton = Automaton::build(&hir).unwrap();
        let doms = dominators(&automaton);
        assert!(doms.contains(1) && doms.contains(2) && doms.contains(3));
    }

    #[test]
    fn dominators_of_alternation() {
        let hir = Parser::new().parse("(ab|cd)x").unwrap();
        let automaton = Automaton::build(&hir).unwrap();
        let doms = dominators(&automaton);
        // Only the shared tail dominates.
        assert!(!doms.contains(1));
        assert!(!doms.contains(3));
        assert!(doms.contains(5));
    }
}
