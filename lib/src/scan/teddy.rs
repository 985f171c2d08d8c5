/*! Multi-literal search (Teddy).

Searches for 2 to 16 literals at once. Each literal is assigned to one of
up to 8 buckets; the buckets' first-byte nibbles are projected into two
16-entry tables so a pair of `pshufb` lookups yields, per input lane, a
bitmap of buckets whose signature matches. The bucket test is a cheap
admissible filter, not a proof: every candidate lane is verified
byte-by-byte against the full literals, in literal order, so the first
literal listed wins at any given position.

Dispatch by literal count:
- 2..=4: no bucketing, one broadcast-compare per literal.
- 5..=8: one bucket per literal ("slim").
- 9..=16: two interleaved groups of 8 buckets ("fat").
*/

#[cfg(target_arch = "x86_64")]
use super::{simd_tier, SimdTier};

/// Maximum number of literals a single matcher can search for.
pub(crate) const MAX_TEDDY_LITERALS: usize = 16;

/// Literal counts at or below this use the direct-compare path.
const MAX_DIRECT_LITERALS: usize = 4;

const BUCKETS: usize = 8;

pub(crate) struct Teddy {
    literals: Vec<Vec<u8>>,
    /// First bytes of all literals, for the scalar skip loop.
    first_bytes: [bool; 256],
    kind: Kind,
}

enum Kind {
    Direct,
    Slim(NibbleMasks),
    Fat(NibbleMasks, NibbleMasks),
}

/// Per-nibble bucket bitmaps for one group of up to 8 buckets.
#[derive(Default)]
struct NibbleMasks {
    lo: [u8; 16],
    hi: [u8; 16],
}

impl NibbleMasks {
    fn add(&mut self, bucket: usize, first_byte: u8) {
        debug_assert!(bucket < BUCKETS);
        self.hi[(first_byte >> 4) as usize] |= 1 << bucket;
        self.lo[(first_byte & 0x0F) as usize] |= 1 << bucket;
    }
}

impl Teddy {
    /// Builds a matcher for `literals`. Returns `None` unless there are
    /// 2 to [`MAX_TEDDY_LITERALS`] non-empty literals; a single literal
    /// is better served by a dedicated single-literal search.
    pub fn new(literals: &[impl AsRef<[u8]>]) -> Option<Self> {
        if literals.len() < 2 || literals.len() > MAX_TEDDY_LITERALS {
            return None;
        }
        let literals: Vec<Vec<u8>> =
            literals.iter().map(|l| l.as_ref().to_vec()).collect();
        if literals.iter().any(|l| l.is_empty()) {
            return None;
        }

        let mut first_bytes = [false; 256];
        for lit in &literals {
            first_bytes[lit[0] as usize] = true;
        }

        let kind = if literals.len() <= MAX_DIRECT_LITERALS {
            Kind::Direct
        } else if literals.len() <= BUCKETS {
            let mut masks = NibbleMasks::default();
            for (idx, lit) in literals.iter().enumerate() {
                masks.add(idx, lit[0]);
            }
            Kind::Slim(masks)
        } else {
            let mut group_a = NibbleMasks::default();
            let mut group_b = NibbleMasks::default();
            for (idx, lit) in literals.iter().enumerate() {
                if idx < BUCKETS {
                    group_a.add(idx, lit[0]);
                } else {
                    group_b.add(idx - BUCKETS, lit[0]);
                }
            }
            Kind::Fat(group_a, group_b)
        };

        Some(Self { literals, first_bytes, kind })
    }

    #[inline]
    pub fn literals(&self) -> &[Vec<u8>] {
        &self.literals
    }

    /// Finds the leftmost occurrence of any literal at or after `from`.
    /// Returns the position and the index of the matched literal; when
    /// several literals match at the same position, the lowest index
    /// wins.
    pub fn find(
        &self,
        haystack: &[u8],
        from: usize,
    ) -> Option<(usize, usize)> {
        #[cfg(target_arch = "x86_64")]
        if simd_tier() >= SimdTier::Sse {
            return unsafe {
                match &self.kind {
                    Kind::Direct => self.find_direct(haystack, from),
                    Kind::Slim(masks) => {
                        self.find_slim(haystack, from, masks)
                    }
                    Kind::Fat(a, b) => self.find_fat(haystack, from, a, b),
                }
            };
        }
        self.find_scalar(haystack, from)
    }

    fn find_scalar(
        &self,
        haystack: &[u8],
        from: usize,
    ) -> Option<(usize, usize)> {
        for i in from..haystack.len() {
            if !self.first_bytes[haystack[i] as usize] {
                continue;
            }
            for (idx, lit) in self.literals.iter().enumerate() {
                if haystack[i..].starts_with(lit) {
                    return Some((i, idx));
                }
            }
        }
        None
    }

    /// Verifies all literals at `at`, lowest index first, restricted to
    /// buckets present in `bits` (bucket of literal `idx` is
    /// `(idx + bucket_offset) % 8`, with `bucket_offset` folded into the
    /// caller's bitmaps).
    fn verify(
        &self,
        haystack: &[u8],
        at: usize,
        bits_for: impl Fn(usize) -> u8,
    ) -> Option<(usize, usize)> {
        for (idx, lit) in self.literals.iter().enumerate() {
            let bucket = idx % BUCKETS;
            if bits_for(idx) & (1 << bucket) != 0
                && haystack[at..].starts_with(lit)
            {
                return Some((at, idx));
            }
        }
        None
    }

    #[cfg(target_arch = "x86_64")]
    #[target_feature(enable = "sse2")]
    unsafe fn find_direct(
        &self,
        haystack: &[u8],
        from: usize,
    ) -> Option<(usize, usize)> {
        use std::arch::x86_64::*;

        let mut firsts = [_mm_setzero_si128(); MAX_DIRECT_LITERALS];
        for (k, lit) in self.literals.iter().enumerate() {
            firsts[k] = _mm_set1_epi8(lit[0] as i8);
        }

        let mut i = from;
        while i + 16 <= haystack.len() {
            let chunk =
                _mm_loadu_si128(haystack.as_ptr().add(i) as *const __m128i);
            let mut masks = [0u32; MAX_DIRECT_LITERALS];
            let mut any = 0u32;
            for k in 0..self.literals.len() {
                let eq = _mm_cmpeq_epi8(chunk, firsts[k]);
                masks[k] = _mm_movemask_epi8(eq) as u32;
                any |= masks[k];
            }
            while any != 0 {
                let j = any.trailing_zeros() as usize;
                for (idx, lit) in self.literals.iter().enumerate() {
                    if masks[idx] & (1 << j) != 0
                        && haystack[i + j..].starts_with(lit)
                    {
                        return Some((i + j, idx));
                    }
                }
                any &= any - 1;
            }
            i += 16;
        }
        self.find_scalar(haystack, i)
    }

    #[cfg(target_arch = "x86_64")]
    #[target_feature(enable = "ssse3")]
    unsafe fn find_slim(
        &self,
        haystack: &[u8],
        from: usize,
        masks: &NibbleMasks,
    ) -> Option<(usize, usize)> {
        use std::arch::x86_64::*;

        let hi_lut = _mm_loadu_si128(masks.hi.as_ptr() as *const __m128i);
        let lo_lut = _mm_loadu_si128(masks.lo.as_ptr() as *const __m128i);
        let nibble = _mm_set1_epi8(0x0F);

        let mut i = from;
        while i + 16 <= haystack.len() {
            let chunk =
                _mm_loadu_si128(haystack.as_ptr().add(i) as *const __m128i);
            let hi = _mm_and_si128(_mm_srli_epi16(chunk, 4), nibble);
            let lo = _mm_and_si128(chunk, nibble);
            let cand = _mm_and_si128(
                _mm_shuffle_epi8(hi_lut, hi),
                _mm_shuffle_epi8(lo_lut, lo),
            );
            let zeros = _mm_cmpeq_epi8(cand, _mm_setzero_si128());
            let mut nonzero =
                !(_mm_movemask_epi8(zeros) as u32) & 0xFFFF;
            if nonzero != 0 {
                let mut lanes = [0u8; 16];
                _mm_storeu_si128(lanes.as_mut_ptr() as *mut __m128i, cand);
                while nonzero != 0 {
                    let j = nonzero.trailing_zeros() as usize;
                    let bits = lanes[j];
                    if let Some(found) =
                        self.verify(haystack, i + j, |_| bits)
                    {
                        return Some(found);
                    }
                    nonzero &= nonzero - 1;
                }
            }
            i += 16;
        }
        self.find_scalar(haystack, i)
    }

    #[cfg(target_arch = "x86_64")]
    #[target_feature(enable = "ssse3")]
    unsafe fn find_fat(
        &self,
        haystack: &[u8],
        from: usize,
        group_a: &NibbleMasks,
        group_b: &NibbleMasks,
    ) -> Option<(usize, usize)> {
        use std::arch::x86_64::*;

        let hi_a = _mm_loadu_si128(group_a.hi.as_ptr() as *const __m128i);
        let lo_a = _mm_loadu_si128(group_a.lo.as_ptr() as *const __m128i);
        let hi_b = _mm_loadu_si128(group_b.hi.as_ptr() as *const __m128i);
        let lo_b = _mm_loadu_si128(group_b.lo.as_ptr() as *const __m128i);
        let nibble = _mm_set1_epi8(0x0F);

        let mut i = from;
        while i + 16 <= haystack.len() {
            let chunk =
                _mm_loadu_si128(haystack.as_ptr().add(i) as *const __m128i);
            let hi = _mm_and_si128(_mm_srli_epi16(chunk, 4), nibble);
            let lo = _mm_and_si128(chunk, nibble);
            let cand_a = _mm_and_si128(
                _mm_shuffle_epi8(hi_a, hi),
                _mm_shuffle_epi8(lo_a, lo),
            );
            let cand_b = _mm_and_si128(
                _mm_shuffle_epi8(hi_b, hi),
                _mm_shuffle_epi8(lo_b, lo),
            );
            let zeros = _mm_cmpeq_epi8(
                _mm_or_si128(cand_a, cand_b),
                _mm_setzero_si128(),
            );
            let mut nonzero =
                !(_mm_movemask_epi8(zeros) as u32) & 0xFFFF;
            if nonzero != 0 {
                let mut lanes_a = [0u8; 16];
                let mut lanes_b = [0u8; 16];
                _mm_storeu_si128(
                    lanes_a.as_mut_ptr() as *mut __m128i,
                    cand_a,
                );
                _mm_storeu_si128(
                    lanes_b.as_mut_ptr() as *mut __m128i,
                    cand_b,
                );
                while nonzero != 0 {
                    let j = nonzero.trailing_zeros() as usize;
                    let (a, b) = (lanes_a[j], lanes_b[j]);
                    if let Some(found) =
                        self.verify(haystack, i + j, |idx| {
                            if idx < BUCKETS {
                                a
                            } else {
                                b
                            }
                        })
                    {
                        return Some(found);
                    }
                    nonzero &= nonzero - 1;
                }
            }
            i += 16;
        }
        self.find_scalar(haystack, i)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::Teddy;

    #[test]
    fn direct_path() {
        let teddy =
            Teddy::new(&[b"Tom" as &[u8], b"Sawyer", b"Huckleberry", b"Finn"])
                .unwrap();
        assert_eq!(teddy.find(b"say Huckleberry", 0), Some((4, 2)));
        assert_eq!(teddy.find(b"Finn and Tom", 0), Some((0, 3)));
        assert_eq!(teddy.find(b"Finn and Tom", 1), Some((9, 0)));
        assert_eq!(teddy.find(b"NoMatch", 0), None);
    }

    #[test]
    fn slim_path() {
        let lits: Vec<&[u8]> =
            vec![b"alpha", b"bravo", b"charlie", b"delta", b"echo", b"golf"];
        let teddy = Teddy::new(&lits).unwrap();
        let hay = b"................charlie...echo..";
        assert_eq!(teddy.find(hay, 0), Some((16, 2)));
        assert_eq!(teddy.find(hay, 17), Some((26, 4)));
        assert_eq!(teddy.find(b"no codewords at all here", 0), None);
    }

    #[test]
    fn fat_path() {
        let lits: Vec<Vec<u8>> = (0..12)
            .map(|i| format!("word{:02}", i).into_bytes())
            .collect();
        let teddy = Teddy::new(&lits).unwrap();
        let hay = b"...word11...word03...";
        assert_eq!(teddy.find(hay, 0), Some((3, 11)));
        assert_eq!(teddy.find(hay, 4), Some((12, 3)));
        assert_eq!(teddy.find(b"word99 wordle", 0), None);
    }

    #[test]
    fn preference_order_at_same_position() {
        let teddy = Teddy::new(&[b"foo" as &[u8], b"foobar"]).unwrap();
        assert_eq!(teddy.find(b"..foobar..", 0), Some((2, 0)));
        let teddy = Teddy::new(&[b"foobar" as &[u8], b"foo"]).unwrap();
        assert_eq!(teddy.find(b"..foobar..", 0), Some((2, 0)));
    }

    #[test]
    fn vector_and_scalar_agree() {
        let lits: Vec<&[u8]> =
            vec![b"needle", b"pin", b"tack", b"nail", b"spike"];
        let teddy = Teddy::new(&lits).unwrap();
        let mut hay = vec![b'.'; 200];
        hay.splice(50..50, b"pin".iter().copied());
        hay.splice(150..150, b"spike".iter().copied());
        let mut at = 0;
        let mut seen = Vec::new();
        while let Some((pos, idx)) = teddy.find(&hay, at) {
            assert_eq!(teddy.find_scalar(&hay, at), Some((pos, idx)));
            seen.push((pos, idx));
            at = pos + 1;
        }
        assert_eq!(seen, vec![(50, 1), (150, 4)]);
    }

    #[test]
    fn rejects_out_of_range_sets() {
        assert!(Teddy::new(&[b"one" as &[u8]]).is_none());
        let too_many: Vec<Vec<u8>> =
            (0..17).map(|i| format!("lit{}", i).into_bytes()).collect();
        assert!(Teddy::new(&too_many).is_none());
        assert!(Teddy::new(&[b"ok" as &[u8], b""]).is_none());
    }
}
