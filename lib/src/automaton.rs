/*! Glushkov position automaton.

Builds a position automaton directly from the HIR, without subset
construction. Each symbol-bearing leaf in the pattern gets one position,
numbered starting at 1; position 0 is the implicit start state. The
automaton records, per position, the set of positions that can follow it,
plus the set of accepting positions. Repetitions contribute their leaves
once, with a loop-back edge instead of unrolled copies, which makes the
automaton linear in pattern size.
*/

use regex_syntax::hir::{ClassBytes, HirKind};

use crate::errors::Error;
use crate::hir::{class_to_bytes, Hir};

/// Maximum number of positions in the automaton.
///
/// Patterns that exceed this cap are rejected at preparation time.
pub(crate) const MAX_POSITIONS: usize = 512;

/// A fixed-capacity set of automaton positions.
///
/// Backed by a 512-bit bitmap, so union/intersection over whole sets are a
/// handful of word operations. Copyable on purpose, the analyses below pass
/// these around freely.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct PosSet {
    bits: [u64; MAX_POSITIONS / 64],
}

impl PosSet {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn insert(&mut self, pos: usize) {
        debug_assert!(pos < MAX_POSITIONS);
        self.bits[pos / 64] |= 1 << (pos % 64);
    }

    #[inline]
    pub fn contains(&self, pos: usize) -> bool {
        debug_assert!(pos < MAX_POSITIONS);
        self.bits[pos / 64] & (1 << (pos % 64)) != 0
    }

    pub fn union_with(&mut self, other: &PosSet) {
        for (word, other_word) in self.bits.iter_mut().zip(other.bits.iter())
        {
            *word |= other_word;
        }
    }

    pub fn intersects(&self, other: &PosSet) -> bool {
        self.bits
            .iter()
            .zip(other.bits.iter())
            .any(|(a, b)| a & b != 0)
    }

    pub fn iter(&self) -> PosSetIter {
        PosSetIter { bits: self.bits, word: 0 }
    }
}

impl std::fmt::Debug for PosSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

pub(crate) struct PosSetIter {
    bits: [u64; MAX_POSITIONS / 64],
    word: usize,
}

impl Iterator for PosSetIter {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        while self.word < self.bits.len() {
            let bits = self.bits[self.word];
            if bits != 0 {
                let bit = bits.trailing_zeros() as usize;
                self.bits[self.word] &= bits - 1;
                return Some(self.word * 64 + bit);
            }
            self.word += 1;
        }
        None
    }
}

/// The symbol consumed when entering a position.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum Symbol {
    /// A single concrete byte.
    Byte(u8),
    /// Any byte whatsoever.
    Any,
    /// A byte class, by index into [`Automaton::class`].
    Class(u16),
}

/// The position automaton for a pattern.
///
/// Built once per pattern and read-only thereafter; every later analysis
/// (literal extraction, BitNFA compilation) consumes it without mutation.
pub(crate) struct Automaton {
    /// Symbol for each position. `symbols[0]` belongs to the start state
    /// and is never consumed; it is [`Symbol::Any`] by convention.
    symbols: Vec<Symbol>,
    /// Successor sets. `follow[0]` is the first-set of the whole pattern.
    follow: Vec<PosSet>,
    /// Positions at which a match may end. Includes the start state when
    /// the pattern is nullable.
    accept: PosSet,
    /// Interned byte classes referenced by [`Symbol::Class`].
    classes: Vec<ClassBytes>,
    /// True if the automaton accepts exactly the pattern's language.
    ///
    /// Counted repetitions other than `?`, `*` and `+` are represented by
    /// a single loop-back edge, and look-around assertions are dropped, so
    /// in those cases the automaton over-approximates the language. That
    /// is sound for literal extraction (every true match is still an
    /// accepting path) but not for direct matching, so the over-approximate
    /// automaton is never handed to the bit-parallel matcher.
    exact: bool,
}

/// Intermediate result for one subtree during construction.
#[derive(Clone)]
struct Frag {
    nullable: bool,
    first: PosSet,
    last: PosSet,
}

impl Frag {
    fn empty() -> Self {
        Self { nullable: true, first: PosSet::new(), last: PosSet::new() }
    }
}

impl Automaton {
    /// Builds the position automaton for `hir`.
    ///
    /// Fails only when the pattern has more than [`MAX_POSITIONS`]
    /// symbol-bearing leaves, or contains a class that can't be reduced to
    /// bytes.
    pub fn build(hir: &Hir) -> Result<Self, Error> {
        let mut automaton = Self {
            symbols: vec![Symbol::Any],
            follow: vec![PosSet::new()],
            accept: PosSet::new(),
            classes: Vec::new(),
            exact: true,
        };
        let frag = automaton.compile(hir.inner())?;
        automaton.follow[0] = frag.first;
        automaton.accept = frag.last;
        if frag.nullable {
            automaton.accept.insert(0);
        }
        Ok(automaton)
    }

    /// Number of positions, including the start state.
    #[inline]
    pub fn num_positions(&self) -> usize {
        self.symbols.len()
    }

    #[inline]
    pub fn symbol(&self, pos: usize) -> Symbol {
        self.symbols[pos]
    }

    /// Successors of `pos`. `follow(0)` is the first-set.
    #[inline]
    pub fn follow(&self, pos: usize) -> &PosSet {
        &self.follow[pos]
    }

    #[inline]
    pub fn accept(&self) -> &PosSet {
        &self.accept
    }

    #[inline]
    pub fn class(&self, id: u16) -> &ClassBytes {
        &self.classes[id as usize]
    }

    #[inline]
    pub fn is_exact(&self) -> bool {
        self.exact
    }

    /// Returns true if `pos` has an edge back to itself.
    #[inline]
    pub fn has_self_loop(&self, pos: usize) -> bool {
        self.follow[pos].contains(pos)
    }

    /// Returns true if entering `pos` consumes `byte`.
    pub fn symbol_matches(&self, pos: usize, byte: u8) -> bool {
        match self.symbols[pos] {
            Symbol::Byte(b) => b == byte,
            Symbol::Any => true,
            Symbol::Class(id) => self
                .class(id)
                .ranges()
                .iter()
                .any(|r| r.start() <= byte && byte <= r.end()),
        }
    }

    fn new_position(&mut self, symbol: Symbol) -> Result<usize, Error> {
        if self.symbols.len() == MAX_POSITIONS {
            return Err(Error::TooManyPositions { max: MAX_POSITIONS });
        }
        self.symbols.push(symbol);
        self.follow.push(PosSet::new());
        Ok(self.symbols.len() - 1)
    }

    fn intern_class(&mut self, class: ClassBytes) -> Result<Symbol, Error> {
        // Single-byte and full-range classes reduce to simpler symbols.
        if let [range] = class.ranges() {
            if range.start() == range.end() {
                return Ok(Symbol::Byte(range.start()));
            }
            if range.start() == 0 && range.end() == u8::MAX {
                return Ok(Symbol::Any);
            }
        }
        let id = match self.classes.iter().position(|c| *c == class) {
            Some(id) => id,
            None => {
                self.classes.push(class);
                self.classes.len() - 1
            }
        };
        Ok(Symbol::Class(id as u16))
    }

    /// Adds an edge from every position in `from` to every position in
    /// `to`.
    fn link(&mut self, from: &PosSet, to: &PosSet) {
        for pos in from.iter() {
            self.follow[pos].union_with(to);
        }
    }

    fn compile(
        &mut self,
        hir: &regex_syntax::hir::Hir,
    ) -> Result<Frag, Error> {
        match hir.kind() {
            HirKind::Empty => Ok(Frag::empty()),
            HirKind::Literal(lit) => {
                let mut frag = Frag::empty();
                let mut prev: Option<usize> = None;
                for byte in lit.0.iter() {
                    let pos = self.new_position(Symbol::Byte(*byte))?;
                    match prev {
                        Some(prev) => self.follow[prev].insert(pos),
                        None => frag.first.insert(pos),
                    }
                    prev = Some(pos);
                }
                if let Some(last) = prev {
                    frag.nullable = false;
                    frag.last.insert(last);
                }
                Ok(frag)
            }
            HirKind::Class(class) => {
                let class = class_to_bytes(class).ok_or_else(|| {
                    Error::Unsupported(
                        "non byte-oriented character class".to_string(),
                    )
                })?;
                if class.ranges().is_empty() {
                    return Err(Error::Unsupported(
                        "empty character class".to_string(),
                    ));
                }
                let symbol = self.intern_class(class)?;
                let pos = self.new_position(symbol)?;
                let mut frag = Frag::empty();
                frag.nullable = false;
                frag.first.insert(pos);
                frag.last.insert(pos);
                Ok(frag)
            }
            HirKind::Look(_) => {
                // Assertions don't consume a position. Dropping them makes
                // the automaton over-approximate the language, which is
                // fine for extraction but rules out direct matching.
                self.exact = false;
                Ok(Frag::empty())
            }
            HirKind::Capture(cap) => self.compile(&cap.sub),
            HirKind::Concat(subs) => {
                let mut result = Frag::empty();
                for sub in subs {
                    let frag = self.compile(sub)?;
                    self.link(&result.last, &frag.first);
                    if result.nullable {
                        result.first.union_with(&frag.first);
                    }
                    if frag.nullable {
                        result.last.union_with(&frag.last);
                    } else {
                        result.last = frag.last;
                    }
                    result.nullable &= frag.nullable;
                }
                Ok(result)
            }
            HirKind::Alternation(subs) => {
                let mut result =
                    Frag { nullable: false, ..Frag::empty() };
                for sub in subs {
                    let frag = self.compile(sub)?;
                    result.nullable |= frag.nullable;
                    result.first.union_with(&frag.first);
                    result.last.union_with(&frag.last);
                }
                Ok(result)
            }
            HirKind::Repetition(rep) => {
                let mut frag = self.compile(&rep.sub)?;
                if rep.min == 0 {
                    frag.nullable = true;
                }
                if rep.max != Some(1) {
                    // One copy of the body with a loop-back edge. For
                    // bounds other than ?, * and + this accepts more
                    // repetitions than the pattern allows.
                    let first = frag.first;
                    self.link(&frag.last, &first);
                    if !matches!(
                        (rep.min, rep.max),
                        (0, None) | (1, None)
                    ) {
                        self.exact = false;
                    }
                }
                Ok(frag)
            }
        }
    }
}
