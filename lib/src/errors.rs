use thiserror::Error;

/// Errors returned while preparing a pattern.
///
/// All of them are detectable from the pattern alone and are surfaced once,
/// at preparation time. Match and search calls never fail, they simply
/// return "no match".
#[derive(Error, Debug)]
pub enum Error {
    /// The pattern contains a syntax error.
    #[error("syntax error: {0}")]
    Syntax(String),

    /// The pattern produces more positions than the automaton can hold.
    ///
    /// Truncating the automaton would corrupt the dominator analysis, so
    /// oversized patterns are rejected instead.
    #[error("pattern too large (more than {max} positions)")]
    TooManyPositions {
        /// The maximum number of positions allowed.
        max: usize,
    },

    /// The pattern requires more states than the bit-parallel automaton
    /// supports.
    #[error("pattern too large for bit-parallel automaton (more than {max} states)")]
    TooManyStates {
        /// The maximum number of states allowed.
        max: usize,
    },

    /// The pattern uses a feature that can't be compiled into the position
    /// automaton (for example, a non-byte-oriented character class).
    #[error("unsupported pattern construct: {0}")]
    Unsupported(String),
}
