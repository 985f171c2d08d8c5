use regex_syntax::hir::{Class, ClassBytes, ClassBytesRange, HirKind};

/// High level intermediate representation (HIR) for a regular expression.
///
/// This is a thin wrapper around [`regex_syntax::hir::Hir`] that implements
/// the shape queries used while deciding how a pattern is going to be
/// matched (whether it contains unbounded greedy repetitions, how many
/// alternations it has, whether it can be reduced to a set of literals,
/// etc.)
#[derive(Clone, Eq, PartialEq, Debug)]
pub(crate) struct Hir {
    inner: regex_syntax::hir::Hir,
}

impl From<regex_syntax::hir::Hir> for Hir {
    fn from(inner: regex_syntax::hir::Hir) -> Self {
        Self { inner }
    }
}

impl Hir {
    #[inline]
    pub fn kind(&self) -> &HirKind {
        self.inner.kind()
    }

    #[inline]
    pub fn inner(&self) -> &regex_syntax::hir::Hir {
        &self.inner
    }

    /// If the whole pattern can be reduced to a literal sequence of bytes,
    /// returns the bytes.
    pub fn as_literal_bytes(&self) -> Option<&[u8]> {
        match self.inner.kind() {
            HirKind::Literal(literal) => Some(literal.0.as_ref()),
            _ => None,
        }
    }

    /// Returns true if this HIR is either a simple literal or an alternation
    /// of simple literals.
    ///
    /// For example, `f`, `foo` and `(foo|bar|baz)` are alternation literals.
    /// This also includes capture groups that contain an alternation of
    /// literals.
    pub fn is_alternation_literal(&self) -> bool {
        if self.inner.properties().is_alternation_literal()
            && !matches!(self.inner.kind(), HirKind::Concat(_))
        {
            return true;
        }
        match self.inner.kind() {
            HirKind::Capture(cap) => {
                cap.sub.properties().is_alternation_literal()
                    && !matches!(cap.sub.kind(), HirKind::Concat(_))
            }
            _ => false,
        }
    }

    /// Returns the byte strings that form this alternation of literals, or
    /// `None` if [`Hir::is_alternation_literal`] is false.
    pub fn alternation_literals(&self) -> Option<Vec<Vec<u8>>> {
        if !self.is_alternation_literal() {
            return None;
        }
        let mut hir = self.inner.kind();
        if let HirKind::Capture(cap) = hir {
            hir = cap.sub.kind();
        }
        match hir {
            HirKind::Literal(lit) => Some(vec![lit.0.to_vec()]),
            HirKind::Alternation(branches) => {
                let mut literals = Vec::with_capacity(branches.len());
                for branch in branches {
                    match branch.kind() {
                        HirKind::Literal(lit) => literals.push(lit.0.to_vec()),
                        _ => return None,
                    }
                }
                Some(literals)
            }
            _ => None,
        }
    }

    /// Returns true if the pattern contains an unbounded greedy repetition
    /// of a class matching any byte (i.e. `.*` or `.+`, with or without the
    /// `s` flag).
    ///
    /// Prefiltering with a bounded lookback window is unsound for these
    /// patterns, because the true match start may lie arbitrarily far
    /// before the literal. The newline hole left by `.` in default mode
    /// doesn't change that, so both forms of the class count as "any".
    pub fn contains_greedy_any_repeat(&self) -> bool {
        fn walk(hir: &regex_syntax::hir::Hir) -> bool {
            match hir.kind() {
                HirKind::Repetition(rep) => {
                    (rep.max.is_none()
                        && rep.greedy
                        && (any_byte(rep.sub.kind())
                            || any_byte_except_newline(rep.sub.kind())))
                        || walk(&rep.sub)
                }
                HirKind::Concat(subs) | HirKind::Alternation(subs) => {
                    subs.iter().any(walk)
                }
                HirKind::Capture(cap) => walk(&cap.sub),
                _ => false,
            }
        }
        walk(&self.inner)
    }

    /// Returns the number of alternation nodes in the pattern.
    pub fn alternation_count(&self) -> usize {
        fn walk(hir: &regex_syntax::hir::Hir) -> usize {
            match hir.kind() {
                HirKind::Alternation(subs) => {
                    1 + subs.iter().map(walk).sum::<usize>()
                }
                HirKind::Concat(subs) => subs.iter().map(walk).sum(),
                HirKind::Capture(cap) => walk(&cap.sub),
                HirKind::Repetition(rep) => walk(&rep.sub),
                _ => 0,
            }
        }
        walk(&self.inner)
    }

    /// Returns the highest capture group index in the pattern, or 0 if the
    /// pattern has no capture groups.
    pub fn max_capture_index(&self) -> u32 {
        fn walk(hir: &regex_syntax::hir::Hir) -> u32 {
            match hir.kind() {
                HirKind::Capture(cap) => cap.index.max(walk(&cap.sub)),
                HirKind::Concat(subs) | HirKind::Alternation(subs) => {
                    subs.iter().map(walk).max().unwrap_or(0)
                }
                HirKind::Repetition(rep) => walk(&rep.sub),
                _ => 0,
            }
        }
        walk(&self.inner)
    }
}

/// Returns true if `hir_kind` is a byte class containing all possible bytes.
///
/// For example `.` in a pattern that uses the `s` flag (i.e.
/// `dot_matches_new_line` is true).
pub(crate) fn any_byte(hir_kind: &HirKind) -> bool {
    match hir_kind {
        HirKind::Class(Class::Bytes(class)) => match class.ranges() {
            [range] => range.start() == 0 && range.end() == u8::MAX,
            _ => false,
        },
        _ => false,
    }
}

/// Returns true if `hir_kind` is a byte class containing all possible bytes
/// except newline.
///
/// For example `.` in a pattern that doesn't use the `s` flag (i.e.
/// `dot_matches_new_line` is false).
pub(crate) fn any_byte_except_newline(hir_kind: &HirKind) -> bool {
    match hir_kind {
        HirKind::Class(Class::Bytes(class)) => {
            // Two ranges, one covering 0x00-0x09 and one covering
            // 0x0B-0xFF. Only 0x0A (ASCII line-feed) is excluded.
            let all_bytes_except_newline = ClassBytes::new([
                ClassBytesRange::new(0x00, 0x09),
                ClassBytesRange::new(0x0B, 0xFF),
            ]);
            all_bytes_except_newline.eq(class)
        }
        _ => false,
    }
}

/// Converts a class from the HIR into a byte class.
///
/// The parser is configured to produce byte-oriented classes, but a class
/// can still show up in Unicode form when the HIR was built by hand. Ranges
/// that fit in a single byte are converted, anything above `0xFF` is
/// rejected.
pub(crate) fn class_to_bytes(class: &Class) -> Option<ClassBytes> {
    match class {
        Class::Bytes(class) => Some(class.clone()),
        Class::Unicode(class) => {
            let mut ranges = Vec::with_capacity(class.ranges().len());
            for range in class.ranges() {
                if range.end() as u32 > 0xFF {
                    return None;
                }
                ranges.push(ClassBytesRange::new(
                    range.start() as u8,
                    range.end() as u8,
                ));
            }
            Some(ClassBytes::new(ranges))
        }
    }
}
