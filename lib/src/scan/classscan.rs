/*! Character-class scanning.

Finds the next byte belonging to a byte class. Two vector techniques,
chosen per class when the scanner is built:

- Dense classes made of a few contiguous ranges use vectorized
  greater/less comparisons; the resulting match mask is exact.
- Sparse classes use nibble lookup tables (Shufti): the class is
  projected onto its high and low nibbles, two `pshufb` lookups are
  ANDed, and positions passing the filter are verified against an exact
  256-entry membership table. The nibble filter over-approximates the
  class, so when it admits too many non-members a third table over the
  middle nibble (bits 2..5) is ANDed in to cut false positives before
  the exact check.
*/

use regex_syntax::hir::ClassBytes;

#[cfg(target_arch = "x86_64")]
use super::{simd_tier, SimdTier};

/// Classes covering more than this share of the ASCII range use the
/// range-compare path.
const DENSE_THRESHOLD_PERCENT: u32 = 40;

/// Range-compare scanning is only worthwhile for this many ranges.
const MAX_DENSE_RANGES: usize = 4;

/// The middle-nibble refinement kicks in when the two-table filter's
/// false-positive share exceeds this.
const DOUBLE_NIBBLE_FP_PERCENT: u32 = 80;

/// Table entries use the sign bit so the candidate mask comes straight
/// out of a byte movemask.
const MATCH_BIT: u8 = 0x80;

pub(crate) struct ClassScanner {
    membership: [bool; 256],
    ranges: Vec<(u8, u8)>,
    hi_nibble: [u8; 16],
    lo_nibble: [u8; 16],
    mid_nibble: [u8; 16],
    dense: bool,
    double: bool,
}

impl ClassScanner {
    pub fn new(class: &ClassBytes) -> Self {
        let mut membership = [false; 256];
        let mut ranges = Vec::with_capacity(class.ranges().len());
        let mut hi_nibble = [0u8; 16];
        let mut lo_nibble = [0u8; 16];
        let mut mid_nibble = [0u8; 16];

        for range in class.ranges() {
            ranges.push((range.start(), range.end()));
            for byte in range.start()..=range.end() {
                membership[byte as usize] = true;
                hi_nibble[(byte >> 4) as usize] |= MATCH_BIT;
                lo_nibble[(byte & 0x0F) as usize] |= MATCH_BIT;
                mid_nibble[((byte >> 2) & 0x0F) as usize] |= MATCH_BIT;
            }
        }

        let ascii_members = (0usize..128).filter(|&b| membership[b]).count();
        let density = ascii_members as u32 * 100 / 128;
        let dense = density > DENSE_THRESHOLD_PERCENT
            && ranges.len() <= MAX_DENSE_RANGES;

        let filter_pass = |b: usize| {
            hi_nibble[b >> 4] != 0 && lo_nibble[b & 0x0F] != 0
        };
        let single_pass = (0usize..256).filter(|&b| filter_pass(b)).count();
        let members = (0usize..256).filter(|&b| membership[b]).count();
        let false_positives = single_pass - members;
        let double = !dense
            && single_pass > 0
            && false_positives as u32 * 100 / single_pass as u32
                > DOUBLE_NIBBLE_FP_PERCENT;

        Self {
            membership,
            ranges,
            hi_nibble,
            lo_nibble,
            mid_nibble,
            dense,
            double,
        }
    }

    /// First class member at or after `from`.
    pub fn find(&self, haystack: &[u8], from: usize) -> Option<usize> {
        #[cfg(target_arch = "x86_64")]
        {
            match (simd_tier(), self.dense) {
                (SimdTier::Avx2, true) => unsafe {
                    return self.find_range_avx2(haystack, from);
                },
                (SimdTier::Avx2, false) => unsafe {
                    return self.find_shufti_avx2(haystack, from);
                },
                (SimdTier::Sse, true) => unsafe {
                    return self.find_range_sse(haystack, from);
                },
                (SimdTier::Sse, false) => unsafe {
                    return self.find_shufti_sse(haystack, from);
                },
                (SimdTier::None, _) => {}
            }
        }
        self.find_scalar(haystack, from)
    }

    /// First non-member index at or after `from`, or the haystack length.
    pub fn run_end(&self, haystack: &[u8], from: usize) -> usize {
        #[cfg(target_arch = "x86_64")]
        if self.dense {
            // Only the range masks are exact; the nibble filter would
            // report false positives as members.
            match simd_tier() {
                SimdTier::Avx2 => unsafe {
                    return self.run_end_range_avx2(haystack, from);
                },
                SimdTier::Sse => unsafe {
                    return self.run_end_range_sse(haystack, from);
                },
                SimdTier::None => {}
            }
        }
        self.run_end_scalar(haystack, from)
    }

    fn find_scalar(&self, haystack: &[u8], from: usize) -> Option<usize> {
        haystack[from..]
            .iter()
            .position(|&b| self.membership[b as usize])
            .map(|i| from + i)
    }

    fn run_end_scalar(&self, haystack: &[u8], from: usize) -> usize {
        haystack[from..]
            .iter()
            .position(|&b| !self.membership[b as usize])
            .map_or(haystack.len(), |i| from + i)
    }

    #[cfg(target_arch = "x86_64")]
    #[target_feature(enable = "sse2")]
    unsafe fn range_mask_sse(
        &self,
        v: std::arch::x86_64::__m128i,
    ) -> u32 {
        use std::arch::x86_64::*;

        let sign = _mm_set1_epi8(0x80u8 as i8);
        let ones = _mm_set1_epi8(-1);
        // Toggle the sign bit so unsigned compares can use signed ops.
        let x = _mm_xor_si128(v, sign);
        let mut ok = _mm_setzero_si128();
        for &(lo, hi) in &self.ranges {
            let l = _mm_set1_epi8((lo ^ 0x80) as i8);
            let h = _mm_set1_epi8((hi ^ 0x80) as i8);
            let ge = _mm_xor_si128(_mm_cmpgt_epi8(l, x), ones);
            let le = _mm_xor_si128(_mm_cmpgt_epi8(x, h), ones);
            ok = _mm_or_si128(ok, _mm_and_si128(ge, le));
        }
        _mm_movemask_epi8(ok) as u32
    }

    #[cfg(target_arch = "x86_64")]
    #[target_feature(enable = "sse2")]
    unsafe fn find_range_sse(
        &self,
        haystack: &[u8],
        from: usize,
    ) -> Option<usize> {
        use std::arch::x86_64::*;

        let mut i = from;
        while i + 16 <= haystack.len() {
            let v =
                _mm_loadu_si128(haystack.as_ptr().add(i) as *const __m128i);
            let mask = self.range_mask_sse(v);
            if mask != 0 {
                return Some(i + mask.trailing_zeros() as usize);
            }
            i += 16;
        }
        self.find_scalar(haystack, i)
    }

    #[cfg(target_arch = "x86_64")]
    #[target_feature(enable = "sse2")]
    unsafe fn run_end_range_sse(
        &self,
        haystack: &[u8],
        from: usize,
    ) -> usize {
        use std::arch::x86_64::*;

        let mut i = from;
        while i + 16 <= haystack.len() {
            let v =
                _mm_loadu_si128(haystack.as_ptr().add(i) as *const __m128i);
            let mask = self.range_mask_sse(v);
            if mask != 0xFFFF {
                return i + (!mask).trailing_zeros() as usize;
            }
            i += 16;
        }
        self.run_end_scalar(haystack, i)
    }

    #[cfg(target_arch = "x86_64")]
    #[target_feature(enable = "ssse3")]
    unsafe fn find_shufti_sse(
        &self,
        haystack: &[u8],
        from: usize,
    ) -> Option<usize> {
        use std::arch::x86_64::*;

        let hi_lut =
            _mm_loadu_si128(self.hi_nibble.as_ptr() as *const __m128i);
        let lo_lut =
            _mm_loadu_si128(self.lo_nibble.as_ptr() as *const __m128i);
        let mid_lut =
            _mm_loadu_si128(self.mid_nibble.as_ptr() as *const __m128i);
        let nibble = _mm_set1_epi8(0x0F);

        let mut i = from;
        while i + 16 <= haystack.len() {
            let v =
                _mm_loadu_si128(haystack.as_ptr().add(i) as *const __m128i);
            let hi = _mm_and_si128(_mm_srli_epi16(v, 4), nibble);
            let lo = _mm_and_si128(v, nibble);
            let mut cand = _mm_and_si128(
                _mm_shuffle_epi8(hi_lut, hi),
                _mm_shuffle_epi8(lo_lut, lo),
            );
            if self.double {
                let mid = _mm_and_si128(_mm_srli_epi16(v, 2), nibble);
                cand =
                    _mm_and_si128(cand, _mm_shuffle_epi8(mid_lut, mid));
            }
            let mut mask = _mm_movemask_epi8(cand) as u32;
            while mask != 0 {
                let j = mask.trailing_zeros() as usize;
                if self.membership[haystack[i + j] as usize] {
                    return Some(i + j);
                }
                mask &= mask - 1;
            }
            i += 16;
        }
        self.find_scalar(haystack, i)
    }

    #[cfg(target_arch = "x86_64")]
    #[target_feature(enable = "avx2")]
    unsafe fn find_range_avx2(
        &self,
        haystack: &[u8],
        from: usize,
    ) -> Option<usize> {
        use std::arch::x86_64::*;

        let sign = _mm256_set1_epi8(0x80u8 as i8);
        let ones = _mm256_set1_epi8(-1);
        let mut i = from;
        while i + 32 <= haystack.len() {
            let v = _mm256_loadu_si256(
                haystack.as_ptr().add(i) as *const __m256i
            );
            let x = _mm256_xor_si256(v, sign);
            let mut ok = _mm256_setzero_si256();
            for &(lo, hi) in &self.ranges {
                let l = _mm256_set1_epi8((lo ^ 0x80) as i8);
                let h = _mm256_set1_epi8((hi ^ 0x80) as i8);
                let ge = _mm256_xor_si256(_mm256_cmpgt_epi8(l, x), ones);
                let le = _mm256_xor_si256(_mm256_cmpgt_epi8(x, h), ones);
                ok = _mm256_or_si256(ok, _mm256_and_si256(ge, le));
            }
            let mask = _mm256_movemask_epi8(ok) as u32;
            if mask != 0 {
                return Some(i + mask.trailing_zeros() as usize);
            }
            i += 32;
        }
        self.find_scalar(haystack, i)
    }

    #[cfg(target_arch = "x86_64")]
    #[target_feature(enable = "avx2")]
    unsafe fn run_end_range_avx2(
        &self,
        haystack: &[u8],
        from: usize,
    ) -> usize {
        use std::arch::x86_64::*;

        let sign = _mm256_set1_epi8(0x80u8 as i8);
        let ones = _mm256_set1_epi8(-1);
        let mut i = from;
        while i + 32 <= haystack.len() {
            let v = _mm256_loadu_si256(
                haystack.as_ptr().add(i) as *const __m256i
            );
            let x = _mm256_xor_si256(v, sign);
            let mut ok = _mm256_setzero_si256();
            for &(lo, hi) in &self.ranges {
                let l = _mm256_set1_epi8((lo ^ 0x80) as i8);
                let h = _mm256_set1_epi8((hi ^ 0x80) as i8);
                let ge = _mm256_xor_si256(_mm256_cmpgt_epi8(l, x), ones);
                let le = _mm256_xor_si256(_mm256_cmpgt_epi8(x, h), ones);
                ok = _mm256_or_si256(ok, _mm256_and_si256(ge, le));
            }
            let mask = _mm256_movemask_epi8(ok) as u32;
            if mask != u32::MAX {
                return i + (!mask).trailing_zeros() as usize;
            }
            i += 32;
        }
        self.run_end_scalar(haystack, i)
    }

    #[cfg(target_arch = "x86_64")]
    #[target_feature(enable = "avx2")]
    unsafe fn find_shufti_avx2(
        &self,
        haystack: &[u8],
        from: usize,
    ) -> Option<usize> {
        use std::arch::x86_64::*;

        let hi_lut = _mm256_broadcastsi128_si256(_mm_loadu_si128(
            self.hi_nibble.as_ptr() as *const __m128i,
        ));
        let lo_lut = _mm256_broadcastsi128_si256(_mm_loadu_si128(
            self.lo_nibble.as_ptr() as *const __m128i,
        ));
        let mid_lut = _mm256_broadcastsi128_si256(_mm_loadu_si128(
            self.mid_nibble.as_ptr() as *const __m128i,
        ));
        let nibble = _mm256_set1_epi8(0x0F);

        let mut i = from;
        while i + 32 <= haystack.len() {
            let v = _mm256_loadu_si256(
                haystack.as_ptr().add(i) as *const __m256i
            );
            let hi = _mm256_and_si256(_mm256_srli_epi16(v, 4), nibble);
            let lo = _mm256_and_si256(v, nibble);
            let mut cand = _mm256_and_si256(
                _mm256_shuffle_epi8(hi_lut, hi),
                _mm256_shuffle_epi8(lo_lut, lo),
            );
            if self.double {
                let mid = _mm256_and_si256(_mm256_srli_epi16(v, 2), nibble);
                cand = _mm256_and_si256(
                    cand,
                    _mm256_shuffle_epi8(mid_lut, mid),
                );
            }
            let mut mask = _mm256_movemask_epi8(cand) as u32;
            while mask != 0 {
                let j = mask.trailing_zeros() as usize;
                if self.membership[haystack[i + j] as usize] {
                    return Some(i + j);
                }
                mask &= mask - 1;
            }
            i += 32;
        }
        self.find_scalar(haystack, i)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use regex_syntax::hir::{ClassBytes, ClassBytesRange};

    use super::ClassScanner;

    fn scanner(ranges: &[(u8, u8)]) -> ClassScanner {
        let class = ClassBytes::new(
            ranges.iter().map(|&(s, e)| ClassBytesRange::new(s, e)),
        );
        ClassScanner::new(&class)
    }

    #[test]
    fn dense_ranges() {
        // \w-style class: dense enough for the range-compare path.
        let s = scanner(&[
            (b'0', b'9'),
            (b'A', b'Z'),
            (b'_', b'_'),
            (b'a', b'z'),
        ]);
        assert!(s.dense);
        let hay = b"--- --- Hello_world ---";
        assert_eq!(s.find(hay, 0), Some(8));
        assert_eq!(s.find_scalar(hay, 0), Some(8));
        assert_eq!(s.run_end(hay, 8), 19);
        assert_eq!(s.run_end_scalar(hay, 8), 19);
        assert_eq!(s.find(hay, 19), None);
    }

    #[test]
    fn sparse_set() {
        let s = scanner(&[
            (b'a', b'a'),
            (b'e', b'e'),
            (b'i', b'i'),
            (b'o', b'o'),
            (b'u', b'u'),
        ]);
        assert!(!s.dense);
        let hay = b"xyz xyz exyz";
        assert_eq!(s.find(hay, 0), Some(8));
        assert_eq!(s.find_scalar(hay, 0), Some(8));
        assert_eq!(s.find(hay, 9), None);
        assert_eq!(s.find(b"e", 0), Some(0));
        assert_eq!(s.find(b"x", 0), None);
    }

    #[test]
    fn widely_spread_set_uses_refinement() {
        let s = scanner(&[
            (0x01, 0x01),
            (0x12, 0x12),
            (0x23, 0x23),
            (0x34, 0x34),
            (0x45, 0x45),
            (0x56, 0x56),
        ]);
        assert!(s.double);
        let mut hay = vec![0u8; 40];
        hay[33] = 0x23;
        assert_eq!(s.find(&hay, 0), Some(33));
        assert_eq!(s.find_scalar(&hay, 0), Some(33));
        // 0x32 passes the hi/lo nibble filter but is not a member.
        hay[20] = 0x32;
        assert_eq!(s.find(&hay, 0), Some(33));
    }

    #[test]
    fn vector_and_scalar_agree_on_long_input() {
        let s = scanner(&[(b'0', b'9'), (b'a', b'f')]);
        let hay: Vec<u8> =
            (0..300).map(|i| if i % 97 == 0 { b'7' } else { b'g' }).collect();
        let mut at = 0;
        while let Some(pos) = s.find(&hay, at) {
            assert_eq!(Some(pos), s.find_scalar(&hay, at));
            at = pos + 1;
        }
        assert_eq!(s.find_scalar(&hay, at), None);
    }
}
