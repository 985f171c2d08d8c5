/*! Single-byte run scanning.

Used for patterns that reduce to a repetition of one byte (`a+`, `a*`).
Finding the run start is delegated to `memchr`; measuring the run length
uses a broadcast-compare loop with a scalar tail.
*/

use memchr::memchr;

#[cfg(target_arch = "x86_64")]
use super::{simd_tier, SimdTier};

/// First occurrence of `byte` at or after `from`.
#[inline]
pub(crate) fn find_byte(
    byte: u8,
    haystack: &[u8],
    from: usize,
) -> Option<usize> {
    memchr(byte, haystack.get(from..)?).map(|i| from + i)
}

/// Index of the first byte at or after `from` that differs from `byte`,
/// or the haystack length if the run extends to the end.
pub(crate) fn run_end(byte: u8, haystack: &[u8], from: usize) -> usize {
    #[cfg(target_arch = "x86_64")]
    {
        match simd_tier() {
            SimdTier::Avx2 => unsafe {
                return run_end_avx2(byte, haystack, from);
            },
            SimdTier::Sse => unsafe {
                return run_end_sse2(byte, haystack, from);
            },
            SimdTier::None => {}
        }
    }
    run_end_scalar(byte, haystack, from)
}

fn run_end_scalar(byte: u8, haystack: &[u8], from: usize) -> usize {
    haystack[from..]
        .iter()
        .position(|&b| b != byte)
        .map_or(haystack.len(), |i| from + i)
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "sse2")]
unsafe fn run_end_sse2(byte: u8, haystack: &[u8], from: usize) -> usize {
    use std::arch::x86_64::*;

    let needle = _mm_set1_epi8(byte as i8);
    let mut i = from;
    while i + 16 <= haystack.len() {
        let chunk =
            _mm_loadu_si128(haystack.as_ptr().add(i) as *const __m128i);
        let eq = _mm_cmpeq_epi8(chunk, needle);
        let mask = _mm_movemask_epi8(eq) as u32;
        if mask != 0xFFFF {
            return i + (!mask).trailing_zeros() as usize;
        }
        i += 16;
    }
    run_end_scalar(byte, haystack, i)
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
unsafe fn run_end_avx2(byte: u8, haystack: &[u8], from: usize) -> usize {
    use std::arch::x86_64::*;

    let needle = _mm256_set1_epi8(byte as i8);
    let mut i = from;
    while i + 32 <= haystack.len() {
        let chunk =
            _mm256_loadu_si256(haystack.as_ptr().add(i) as *const __m256i);
        let eq = _mm256_cmpeq_epi8(chunk, needle);
        let mask = _mm256_movemask_epi8(eq) as u32;
        if mask != u32::MAX {
            return i + (!mask).trailing_zeros() as usize;
        }
        i += 32;
    }
    run_end_scalar(byte, haystack, i)
}
