/*! Bit-parallel exact literal search (Shift-Or).

One 64-bit mask per byte value records, with a cleared bit `i`, that the
byte occurs at offset `i` of the literal. The running state shifts left
one bit per input byte and ORs the byte's mask; bit `len - 1` clearing
means the literal ends at the current byte. Supports literals up to 64
bytes.

When the state carries no partial match, the scan skips ahead with
`memchr` on the literal's first byte instead of stepping byte-wise. The
shift register only has to run while a candidate prefix is alive, which
keeps throughput close to plain `memchr` on literal-free input.
*/

use memchr::memchr;

/// Maximum literal length the 64-bit state supports.
pub(crate) const MAX_PATTERN_LEN: usize = 64;

pub(crate) struct ShiftOr {
    masks: [u64; 256],
    len: usize,
    first: u8,
}

impl ShiftOr {
    /// Builds a searcher for `literal`. Returns `None` for the empty
    /// literal and literals longer than [`MAX_PATTERN_LEN`].
    pub fn new(literal: &[u8]) -> Option<Self> {
        if literal.is_empty() || literal.len() > MAX_PATTERN_LEN {
            return None;
        }
        let mut masks = [!0u64; 256];
        for (i, &byte) in literal.iter().enumerate() {
            masks[byte as usize] &= !(1 << i);
        }
        Some(Self { masks, len: literal.len(), first: literal[0] })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Start offset of the first occurrence at or after `from`.
    pub fn find(&self, haystack: &[u8], from: usize) -> Option<usize> {
        let done = 1u64 << (self.len - 1);
        let mut state = !0u64;
        let mut i = from;
        while i < haystack.len() {
            if state == !0 {
                // No partial match alive; jump to the next possible
                // literal start.
                i = memchr(self.first, &haystack[i..]).map(|d| i + d)?;
            }
            state = (state << 1) | self.masks[haystack[i] as usize];
            if state & done == 0 {
                return Some(i + 1 - self.len);
            }
            i += 1;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::ShiftOr;

    #[test]
    fn basic_search() {
        let searcher = ShiftOr::new(b"test").unwrap();
        assert_eq!(searcher.find(b"a test here", 0), Some(2));
        assert_eq!(searcher.find(b"a test here", 3), None);
        assert_eq!(searcher.find(b"testtest", 1), Some(4));
        assert_eq!(searcher.find(b"no match", 0), None);
        assert_eq!(searcher.find(b"", 0), None);
    }

    #[test]
    fn overlapping_prefixes() {
        let searcher = ShiftOr::new(b"aab").unwrap();
        assert_eq!(searcher.find(b"aaab", 0), Some(1));
        let searcher = ShiftOr::new(b"abab").unwrap();
        assert_eq!(searcher.find(b"abaabab", 0), Some(3));
    }

    #[test]
    fn single_byte_and_max_len() {
        let searcher = ShiftOr::new(b"x").unwrap();
        assert_eq!(searcher.find(b"aaxa", 0), Some(2));

        let long = vec![b'q'; 64];
        let searcher = ShiftOr::new(&long).unwrap();
        let mut hay = vec![b'.'; 10];
        hay.extend_from_slice(&long);
        assert_eq!(searcher.find(&hay, 0), Some(10));

        assert!(ShiftOr::new(&vec![b'q'; 65]).is_none());
        assert!(ShiftOr::new(b"").is_none());
    }
}
