//! Popcount and Tanimoto arithmetic over packed byte fingerprints
//!
//! All functions operate on whole storage windows. Padding bytes are zero
//! by construction (see [`crate::arena`]), so they never change a count and
//! no masking happens during a scan.
//!
//! ## Dispatch
//!
//! - x86_64 with POPCNT: 8 bytes per step through `_popcnt64`
//! - everywhere else: 8 bytes per step through `u64::count_ones`
//! - tails shorter than a word go through a 256-entry byte table

#[cfg(target_arch = "x86_64")]
use std::arch::x86_64::*;

/// Number of set bits in every possible byte value.
pub const BYTE_POPCOUNT: [u8; 256] = build_byte_table();

const fn build_byte_table() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        table[i] = (i as u8).count_ones() as u8;
        i += 1;
    }
    table
}

#[inline(always)]
fn load_u64(chunk: &[u8]) -> u64 {
    let mut word = [0u8; 8];
    word.copy_from_slice(chunk);
    u64::from_ne_bytes(word)
}

/// Number of set bits in `fp`.
#[inline]
pub fn popcount(fp: &[u8]) -> u32 {
    let chunks = fp.chunks_exact(8);
    let tail = chunks.remainder();

    let mut total = 0u32;
    for chunk in chunks {
        total += load_u64(chunk).count_ones();
    }
    for &byte in tail {
        total += BYTE_POPCOUNT[byte as usize] as u32;
    }
    total
}

/// Number of bits set in both `a` and `b`.
///
/// # Panics
/// Panics if the inputs differ in length.
#[inline]
pub fn intersect_popcount(a: &[u8], b: &[u8]) -> u32 {
    intersect_and_union_popcount(a, b).0
}

/// Number of bits set in either `a` or `b`.
///
/// # Panics
/// Panics if the inputs differ in length.
#[inline]
pub fn union_popcount(a: &[u8], b: &[u8]) -> u32 {
    intersect_and_union_popcount(a, b).1
}

/// `(popcount(a & b), popcount(a | b))` computed in a single pass.
///
/// # Panics
/// Panics if the inputs differ in length.
#[inline]
pub fn intersect_and_union_popcount(a: &[u8], b: &[u8]) -> (u32, u32) {
    assert_eq!(a.len(), b.len(), "fingerprints must have the same length");

    #[cfg(target_arch = "x86_64")]
    {
        if a.len() >= 8 && is_x86_feature_detected!("popcnt") {
            return unsafe { intersect_and_union_popcnt_x86(a, b) };
        }
    }

    intersect_and_union_portable(a, b)
}

/// Word-at-a-time variant of [`intersect_and_union_popcount`] that never
/// uses the hardware instruction.
///
/// # Panics
/// Panics if the inputs differ in length.
pub fn intersect_and_union_portable(a: &[u8], b: &[u8]) -> (u32, u32) {
    assert_eq!(a.len(), b.len(), "fingerprints must have the same length");
    let chunks_a = a.chunks_exact(8);
    let chunks_b = b.chunks_exact(8);
    let tail_a = chunks_a.remainder();
    let tail_b = chunks_b.remainder();

    let mut intersect = 0u32;
    let mut union = 0u32;
    for (chunk_a, chunk_b) in chunks_a.zip(chunks_b) {
        let wa = load_u64(chunk_a);
        let wb = load_u64(chunk_b);
        intersect += (wa & wb).count_ones();
        union += (wa | wb).count_ones();
    }
    for (&x, &y) in tail_a.iter().zip(tail_b) {
        intersect += BYTE_POPCOUNT[(x & y) as usize] as u32;
        union += BYTE_POPCOUNT[(x | y) as usize] as u32;
    }
    (intersect, union)
}

/// Hardware popcnt over 64-bit words.
///
/// # Safety
/// The CPU must support POPCNT and `a.len() == b.len()`.
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "popcnt")]
unsafe fn intersect_and_union_popcnt_x86(a: &[u8], b: &[u8]) -> (u32, u32) {
    let chunks_a = a.chunks_exact(8);
    let chunks_b = b.chunks_exact(8);
    let tail_a = chunks_a.remainder();
    let tail_b = chunks_b.remainder();

    let mut intersect = 0u64;
    let mut union = 0u64;
    for (chunk_a, chunk_b) in chunks_a.zip(chunks_b) {
        let wa = load_u64(chunk_a);
        let wb = load_u64(chunk_b);
        intersect += _popcnt64((wa & wb) as i64) as u64;
        union += _popcnt64((wa | wb) as i64) as u64;
    }
    for (&x, &y) in tail_a.iter().zip(tail_b) {
        intersect += BYTE_POPCOUNT[(x & y) as usize] as u64;
        union += BYTE_POPCOUNT[(x | y) as usize] as u64;
    }
    (intersect as u32, union as u32)
}

/// Tanimoto score from precomputed counts.
///
/// A zero union (both fingerprints empty) scores 0.0.
#[inline(always)]
pub fn tanimoto_from_counts(intersect: u32, union: u32) -> f64 {
    if union == 0 {
        0.0
    } else {
        intersect as f64 / union as f64
    }
}

/// Tanimoto similarity `|A ∩ B| / |A ∪ B|` of two equal-length fingerprints.
///
/// Two all-zero fingerprints score 0.0.
///
/// # Panics
/// Panics if the inputs differ in length.
#[inline]
pub fn tanimoto(a: &[u8], b: &[u8]) -> f64 {
    let (intersect, union) = intersect_and_union_popcount(a, b);
    tanimoto_from_counts(intersect, union)
}

/// Tanimoto score when both popcounts are already known.
///
/// Only the intersection is counted; the union follows from
/// `|A| + |B| - |A ∩ B|`.
#[inline]
pub fn tanimoto_with_popcounts(a: &[u8], b: &[u8], popcount_a: u32, popcount_b: u32) -> f64 {
    let intersect = intersect_popcount(a, b);
    tanimoto_from_counts(intersect, popcount_a + popcount_b - intersect)
}

/// True when every bit set in `query` is also set in `target`.
///
/// # Panics
/// Panics if the inputs differ in length.
pub fn contains(query: &[u8], target: &[u8]) -> bool {
    assert_eq!(query.len(), target.len(), "fingerprints must have the same length");
    query.iter().zip(target).all(|(&q, &t)| q & t == q)
}

/// Upper bound on the Tanimoto score between fingerprints with the given popcounts.
#[inline]
pub fn max_tanimoto_for_popcounts(popcount_a: u32, popcount_b: u32) -> f64 {
    let (lo, hi) = if popcount_a <= popcount_b {
        (popcount_a, popcount_b)
    } else {
        (popcount_b, popcount_a)
    };
    tanimoto_from_counts(lo, hi)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_table() {
        assert_eq!(BYTE_POPCOUNT[0], 0);
        assert_eq!(BYTE_POPCOUNT[0xff], 8);
        assert_eq!(BYTE_POPCOUNT[0b1010_0001], 3);
    }

    #[test]
    fn test_popcount_word_and_tail() {
        let fp = [0xffu8; 11];
        assert_eq!(popcount(&fp), 88);
        assert_eq!(popcount(&[]), 0);
    }

    #[test]
    fn test_portable_matches_dispatch() {
        let a: Vec<u8> = (0..37u32).map(|i| (i * 37 % 251) as u8).collect();
        let b: Vec<u8> = (0..37u32).map(|i| (i * 91 % 253) as u8).collect();
        assert_eq!(
            intersect_and_union_popcount(&a, &b),
            intersect_and_union_portable(&a, &b)
        );
    }

    #[test]
    fn test_tanimoto_worked_example() {
        let a = [0b1111_0000u8];
        let b = [0b1100_0000u8];
        let c = [0b0000_1111u8];
        assert_eq!(tanimoto(&a, &a), 1.0);
        assert_eq!(tanimoto(&a, &b), 0.5);
        assert_eq!(tanimoto(&a, &c), 0.0);
    }

    #[test]
    fn test_tanimoto_zero_union() {
        assert_eq!(tanimoto(&[0, 0, 0], &[0, 0, 0]), 0.0);
        assert_eq!(tanimoto_from_counts(0, 0), 0.0);
    }

    #[test]
    fn test_tanimoto_with_popcounts_agrees() {
        let a = [0x0fu8, 0xf0, 0x33, 0x01, 0, 0, 0, 0, 0x80];
        let b = [0x0cu8, 0xff, 0x00, 0x01, 0, 0, 0, 0, 0x00];
        let direct = tanimoto(&a, &b);
        let via_counts = tanimoto_with_popcounts(&a, &b, popcount(&a), popcount(&b));
        assert_eq!(direct, via_counts);
    }

    #[test]
    fn test_contains() {
        assert!(contains(&[0b0100_0001], &[0b1100_0011]));
        assert!(!contains(&[0b0100_0001], &[0b1000_0011]));
        assert!(contains(&[0], &[0]));
    }

    #[test]
    fn test_max_tanimoto_bound() {
        assert_eq!(max_tanimoto_for_popcounts(2, 4), 0.5);
        assert_eq!(max_tanimoto_for_popcounts(4, 2), 0.5);
        assert_eq!(max_tanimoto_for_popcounts(0, 0), 0.0);
    }

    #[test]
    #[should_panic(expected = "same length")]
    fn test_length_mismatch_panics() {
        tanimoto(&[1, 2], &[1]);
    }
}
