/*! Backtracking evaluator.

Walks the HIR directly against the input, trying alternatives in pattern
order. This is the universal fallback: every pattern the parser accepts
can be evaluated here, at the cost of backtracking-dependent runtime.
The accelerated strategies exist to keep common patterns off this path,
and to narrow it down to candidate positions when they can't replace it
entirely.

Evaluation is continuation-passing: each node consumes some input and
invokes a continuation with the new offset; returning `false` from the
continuation makes the node try its next alternative. This keeps
preference order (leftmost, then pattern order, greedy/lazy as written)
without materializing a backtracking stack.
*/

use regex_syntax::hir::{Class, HirKind, Look, Repetition};

use crate::hir::Hir;

/// A capture-group span, reported when the evaluator was invoked.
pub(crate) type CaptureSlots = Vec<Option<usize>>;

type Cont<'e, 'h> = dyn FnMut(&mut Evaluator<'h>, usize) -> bool + 'e;

pub(crate) struct Evaluator<'h> {
    haystack: &'h [u8],
    slots: CaptureSlots,
}

/// Returns true if the whole input matches the pattern.
pub(crate) fn matches(hir: &Hir, input: &[u8]) -> bool {
    let mut eval = Evaluator::new(hir, input);
    let len = input.len();
    eval.eval(hir.inner(), 0, &mut |_, end| end == len)
}

/// Tries to match starting exactly at `start`. Returns the match end, in
/// preference order.
pub(crate) fn find_at(
    hir: &Hir,
    haystack: &[u8],
    start: usize,
) -> Option<usize> {
    let mut eval = Evaluator::new(hir, haystack);
    eval.find_at(hir, start)
}

/// Leftmost search, trying every start position at or after `from`.
pub(crate) fn find(
    hir: &Hir,
    haystack: &[u8],
    from: usize,
) -> Option<(usize, usize)> {
    let mut eval = Evaluator::new(hir, haystack);
    for start in from..=haystack.len() {
        if let Some(end) = eval.find_at(hir, start) {
            return Some((start, end));
        }
    }
    None
}

/// Like [`find_at`], additionally reporting capture-group slots. Slot
/// `2 * i` holds the start of group `i`, slot `2 * i + 1` its end; group 0
/// is the overall match.
pub(crate) fn captures_at(
    hir: &Hir,
    haystack: &[u8],
    start: usize,
) -> Option<(usize, CaptureSlots)> {
    let mut eval = Evaluator::new(hir, haystack);
    let end = eval.find_at(hir, start)?;
    let mut slots = eval.slots;
    slots[0] = Some(start);
    slots[1] = Some(end);
    Some((end, slots))
}

impl<'h> Evaluator<'h> {
    fn new(hir: &Hir, haystack: &'h [u8]) -> Self {
        let groups = hir.max_capture_index() as usize + 1;
        Self { haystack, slots: vec![None; groups * 2] }
    }

    fn find_at(&mut self, hir: &Hir, start: usize) -> Option<usize> {
        let mut found = None;
        self.eval(hir.inner(), start, &mut |_, end| {
            found = Some(end);
            true
        });
        found
    }

    fn eval(
        &mut self,
        hir: &regex_syntax::hir::Hir,
        at: usize,
        k: &mut Cont<'_, 'h>,
    ) -> bool {
        match hir.kind() {
            HirKind::Empty => k(self, at),
            HirKind::Literal(lit) => {
                if self.haystack[at..].starts_with(&lit.0) {
                    k(self, at + lit.0.len())
                } else {
                    false
                }
            }
            HirKind::Class(class) => {
                match self.haystack.get(at) {
                    Some(&byte) if class_matches(class, byte) => {
                        k(self, at + 1)
                    }
                    _ => false,
                }
            }
            HirKind::Look(look) => self.look_matches(*look, at) && k(self, at),
            HirKind::Capture(cap) => {
                let slot = cap.index as usize * 2;
                let saved = (self.slots[slot], self.slots[slot + 1]);
                self.slots[slot] = Some(at);
                let matched = self.eval(&cap.sub, at, &mut |me, end| {
                    let prev_end = me.slots[slot + 1];
                    me.slots[slot + 1] = Some(end);
                    if k(me, end) {
                        true
                    } else {
                        me.slots[slot + 1] = prev_end;
                        false
                    }
                });
                if !matched {
                    self.slots[slot] = saved.0;
                    self.slots[slot + 1] = saved.1;
                }
                matched
            }
            HirKind::Concat(subs) => self.eval_concat(subs, at, k),
            HirKind::Alternation(subs) => {
                for sub in subs {
                    if self.eval(sub, at, &mut *k) {
                        return true;
                    }
                }
                false
            }
            HirKind::Repetition(rep) => self.eval_repeat(rep, at, 0, k),
        }
    }

    fn eval_concat(
        &mut self,
        subs: &[regex_syntax::hir::Hir],
        at: usize,
        k: &mut Cont<'_, 'h>,
    ) -> bool {
        match subs.split_first() {
            None => k(self, at),
            Some((head, rest)) => self.eval(head, at, &mut |me, next| {
                me.eval_concat(rest, next, &mut *k)
            }),
        }
    }

    fn eval_repeat(
        &mut self,
        rep: &Repetition,
        at: usize,
        done: u32,
        k: &mut Cont<'_, 'h>,
    ) -> bool {
        let may_stop = done >= rep.min;
        let may_continue = rep.max.map_or(true, |max| done < max);
        if rep.greedy {
            if may_continue
                && self.eval(&rep.sub, at, &mut |me, next| {
                    if next == at {
                        // The body matched without consuming input;
                        // further iterations can't make progress, so any
                        // remaining required repetitions also match empty.
                        k(me, next)
                    } else {
                        me.eval_repeat(rep, next, done + 1, &mut *k)
                    }
                })
            {
                return true;
            }
            may_stop && k(self, at)
        } else {
            if may_stop && k(self, at) {
                return true;
            }
            may_continue
                && self.eval(&rep.sub, at, &mut |me, next| {
                    if next == at {
                        k(me, next)
                    } else {
                        me.eval_repeat(rep, next, done + 1, &mut *k)
                    }
                })
        }
    }

    fn look_matches(&self, look: Look, at: usize) -> bool {
        let hay = self.haystack;
        let prev = at.checked_sub(1).and_then(|i| hay.get(i).copied());
        let next = hay.get(at).copied();
        match look {
            Look::Start => at == 0,
            Look::End => at == hay.len(),
            Look::StartLF => prev.map_or(true, |b| b == b'\n'),
            Look::EndLF => next.map_or(true, |b| b == b'\n'),
            Look::StartCRLF => {
                prev.map_or(true, |b| {
                    b == b'\n' || (b == b'\r' && next != Some(b'\n'))
                })
            }
            Look::EndCRLF => {
                next.map_or(true, |b| {
                    b == b'\r' || (b == b'\n' && prev != Some(b'\r'))
                })
            }
            Look::WordAscii | Look::WordUnicode => {
                is_word(prev) != is_word(next)
            }
            Look::WordAsciiNegate | Look::WordUnicodeNegate => {
                is_word(prev) == is_word(next)
            }
            Look::WordStartAscii | Look::WordStartUnicode => {
                !is_word(prev) && is_word(next)
            }
            Look::WordEndAscii | Look::WordEndUnicode => {
                is_word(prev) && !is_word(next)
            }
            Look::WordStartHalfAscii | Look::WordStartHalfUnicode => {
                !is_word(prev)
            }
            Look::WordEndHalfAscii | Look::WordEndHalfUnicode => {
                !is_word(next)
            }
        }
    }
}

fn class_matches(class: &Class, byte: u8) -> bool {
    match class {
        Class::Bytes(class) => class
            .ranges()
            .iter()
            .any(|r| r.start() <= byte && byte <= r.end()),
        Class::Unicode(class) => class.ranges().iter().any(|r| {
            (r.start() as u32) <= byte as u32 && (byte as u32) <= r.end() as u32
        }),
    }
}

fn is_word(byte: Option<u8>) -> bool {
    byte.map_or(false, |b| b.is_ascii_alphanumeric() || b == b'_')
}
