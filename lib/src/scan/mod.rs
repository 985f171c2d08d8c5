/*! SIMD scanning primitives.

Vectorized searches used by the accelerated strategies: exact literal
search ([`shiftor`]), multi-literal search ([`teddy`]), character-class
scanning ([`classscan`]) and single-byte run scanning ([`runscan`]).

Every primitive carries a pure scalar fallback. The instruction-set tier
is probed once per process and cached; all vector code paths are selected
through [`simd_tier`] so the scalar path is always reachable for testing.
*/

use lazy_static::lazy_static;

pub(crate) mod classscan;
pub(crate) mod runscan;
pub(crate) mod shiftor;
pub(crate) mod teddy;

/// Vector capability of the running CPU.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub(crate) enum SimdTier {
    /// Scalar only.
    None,
    /// 16-byte vectors (SSE2 + SSSE3 for the nibble shuffles).
    Sse,
    /// 32-byte vectors.
    Avx2,
}

lazy_static! {
    static ref SIMD_TIER: SimdTier = probe();
}

/// Returns the cached vector capability tier.
#[inline]
pub(crate) fn simd_tier() -> SimdTier {
    *SIMD_TIER
}

#[cfg(target_arch = "x86_64")]
fn probe() -> SimdTier {
    if is_x86_feature_detected!("avx2") {
        SimdTier::Avx2
    } else if is_x86_feature_detected!("ssse3") {
        SimdTier::Sse
    } else {
        SimdTier::None
    }
}

#[cfg(not(target_arch = "x86_64"))]
fn probe() -> SimdTier {
    SimdTier::None
}
