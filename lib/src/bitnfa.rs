/*! Bit-parallel NFA simulation.

Encodes the position automaton's active-state set as a 128-bit word and
advances it with shift/mask/AND operations per input byte. Most Glushkov
edges go forward by a small amount (consecutive positions in the
pattern), so a transition `from -> from + k` with `k <= 7` is represented
by setting bit `from` in a per-span mask; one shift per span moves every
such state at once. The rare edges that go backward, self-loop or span
more than 7 are handled through an exception path: the source state is
flagged and its successors stored as an explicit mask.

After combining typical and exception successors, the candidate set is
ANDed with a per-byte reachability mask so only states whose symbol
matches the consumed byte survive. This keeps class symbols exact rather
than approximating them as any-byte.
*/

use crate::automaton::Automaton;
use crate::errors::Error;

/// Maximum number of states the bit-parallel representation can hold.
pub(crate) const MAX_STATES: usize = 128;

/// Number of forward spans covered by the shift-mask table.
const MAX_SHIFT: usize = 8;

/// A compiled bit-parallel automaton.
///
/// Built once per pattern, immutable afterwards; safe to share across
/// concurrent matches.
pub(crate) struct BitNfa {
    /// Per-span transition masks. Bit `s` in `shift_masks[k]` means state
    /// `s` has an edge to state `s + k`.
    shift_masks: [u128; MAX_SHIFT],
    /// States reachable on each byte value.
    reach: [u128; 256],
    /// States at which a match may end. Bit 0 is set for nullable
    /// patterns.
    accept: u128,
    /// States with at least one backward or long-span edge.
    exception: u128,
    /// Successors of each exception state.
    exception_successors: [u128; MAX_STATES],
}

impl BitNfa {
    /// Compiles the position automaton into bit-parallel form.
    ///
    /// Fails when the automaton has more than [`MAX_STATES`] positions.
    /// The caller is responsible for only compiling exact automata; an
    /// over-approximating one would accept inputs the pattern rejects.
    pub fn compile(automaton: &Automaton) -> Result<Self, Error> {
        let n = automaton.num_positions();
        if n > MAX_STATES {
            return Err(Error::TooManyStates { max: MAX_STATES });
        }

        let mut nfa = Self {
            shift_masks: [0; MAX_SHIFT],
            reach: [0; 256],
            accept: 0,
            exception: 0,
            exception_successors: [0; MAX_STATES],
        };

        for from in 0..n {
            for to in automaton.follow(from).iter() {
                if to > from && to - from < MAX_SHIFT {
                    nfa.shift_masks[to - from] |= 1 << from;
                } else {
                    nfa.exception |= 1 << from;
                    nfa.exception_successors[from] |= 1 << to;
                }
            }
        }

        // State 0 consumes nothing, so it has no reachability entry and
        // dies after the first step.
        for state in 1..n {
            for byte in 0..=u8::MAX {
                if automaton.symbol_matches(state, byte) {
                    nfa.reach[byte as usize] |= 1 << state;
                }
            }
        }

        for state in automaton.accept().iter() {
            nfa.accept |= 1 << state;
        }

        Ok(nfa)
    }

    /// Advances the active-state set by one input byte.
    #[inline]
    fn step(&self, states: u128, byte: u8) -> u128 {
        let mut succ = 0;
        for span in 0..MAX_SHIFT {
            succ |= (states & self.shift_masks[span]) << span;
        }
        let mut exceptions = states & self.exception;
        while exceptions != 0 {
            let state = exceptions.trailing_zeros() as usize;
            succ |= self.exception_successors[state];
            exceptions &= exceptions - 1;
        }
        succ & self.reach[byte as usize]
    }

    /// Returns true if the whole input matches the pattern.
    pub fn matches(&self, input: &[u8]) -> bool {
        let mut states: u128 = 1;
        for &byte in input {
            states = self.step(states, byte);
            if states == 0 {
                return false;
            }
        }
        states & self.accept != 0
    }

    /// Leftmost search: returns the span of the first match, preferring
    /// the longest end for a given start.
    pub fn find(&self, haystack: &[u8]) -> Option<(usize, usize)> {
        for start in 0..=haystack.len() {
            if self.accept & 1 != 0 {
                return Some((start, start));
            }
            let mut states: u128 = 1;
            let mut end = None;
            for (offset, &byte) in haystack[start..].iter().enumerate() {
                states = self.step(states, byte);
                if states == 0 {
                    break;
                }
                if states & self.accept != 0 {
                    end = Some(start + offset + 1);
                }
            }
            if let Some(end) = end {
                return Some((start, end));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::BitNfa;
    use crate::automaton::Automaton;
    use crate::errors::Error;
    use crate::parser::Parser;

    fn compile(pattern: &str) -> BitNfa {
        let hir = Parser::new().parse(pattern).unwrap();
        let automaton = Automaton::build(&hir).unwrap();
        assert!(automaton.is_exact());
        BitNfa::compile(&automaton).unwrap()
    }

    #[test]
    fn alternation() {
        let nfa = compile("foo|bar|baz|qux");
        assert!(nfa.matches(b"foo"));
        assert!(nfa.matches(b"qux"));
        assert!(!nfa.matches(b"fox"));
        assert!(!nfa.matches(b"fooo"));
        assert!(!nfa.matches(b""));
        assert_eq!(nfa.find(b"xxbarxx"), Some((2, 5)));
        assert_eq!(nfa.find(b"nothing here"), None);
    }

    #[test]
    fn backward_edges() {
        // The loop-back edge of `+` is a backward transition, exercised
        // through the exception path.
        let nfa = compile("(ab|cd)+");
        assert!(nfa.matches(b"ab"));
        assert!(nfa.matches(b"abcdab"));
        assert!(!nfa.matches(b"abc"));
        assert_eq!(nfa.find(b"xxabxx"), Some((2, 4)));
    }

    #[test]
    fn long_span_edges() {
        // The branch to `x` spans more than 7 positions from the start.
        let nfa = compile("(abcdefghij|x)z");
        assert!(nfa.matches(b"xz"));
        assert!(nfa.matches(b"abcdefghijz"));
        assert!(!nfa.matches(b"z"));
    }

    #[test]
    fn classes_are_exact() {
        let nfa = compile("[a-c]x|[0-9]y");
        assert!(nfa.matches(b"bx"));
        assert!(nfa.matches(b"7y"));
        assert!(!nfa.matches(b"dx"));
        assert!(!nfa.matches(b"ay"));
    }

    #[test]
    fn nullable() {
        let nfa = compile("(foo|bar)*");
        assert!(nfa.matches(b""));
        assert!(nfa.matches(b"foobar"));
        assert!(!nfa.matches(b"foox"));
        assert_eq!(nfa.find(b"zzz"), Some((0, 0)));
    }

    #[test]
    fn state_cap() {
        let pattern = "a".repeat(200);
        let hir = Parser::new().parse(&pattern).unwrap();
        let automaton = Automaton::build(&hir).unwrap();
        assert!(matches!(
            BitNfa::compile(&automaton),
            Err(Error::TooManyStates { max: 128 })
        ));
    }
}
