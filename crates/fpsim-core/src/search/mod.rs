//! Tanimoto similarity search
//!
//! Three families of search, each in three shapes:
//!
//! | family    | single query (`_fp`) | query arena | arena vs itself (`_symmetric`) |
//! |-----------|----------------------|-------------|--------------------------------|
//! | count     | ✓                    | ✓           | ✓ + partial                    |
//! | threshold | ✓                    | ✓           | ✓ + partial                    |
//! | k-nearest | ✓                    | ✓           | ✓                              |
//!
//! Symmetric searches score each unordered pair once, walking only
//! `target >= query`. The partial variants work on a caller-chosen
//! `queries × targets` rectangle and add into an existing buffer, so an
//! N×N comparison can be split across independent calls.
//!
//! When the target arena carries a popcount index, only targets whose
//! popcount can reach the threshold are visited.

pub mod count;
pub mod knearest;
pub mod threshold;

use std::ops::Range;

use crate::align::{align_fingerprint, AlignedFingerprint};
use crate::arena::{padding_is_zero, FingerprintArena};
use crate::error::{FpSimError, Result};
use crate::popcount::{popcount, tanimoto, tanimoto_with_popcounts};

pub use count::{
    count_tanimoto_hits, count_tanimoto_hits_fp, count_tanimoto_hits_symmetric,
    partial_count_tanimoto_hits_symmetric,
};
pub use knearest::{
    finalize_knearest, knearest_tanimoto_search, knearest_tanimoto_search_fp,
    knearest_tanimoto_search_symmetric, KnearestAccumulator,
};
pub use threshold::{
    fill_lower_triangle, partial_threshold_tanimoto_search_symmetric,
    threshold_tanimoto_search, threshold_tanimoto_search_fp,
    threshold_tanimoto_search_symmetric,
};

/// A standalone query fingerprint: packed bytes plus their bit width.
#[derive(Debug, Clone, Copy)]
pub struct QueryFingerprint<'q> {
    bytes: &'q [u8],
    num_bits: usize,
}

impl<'q> QueryFingerprint<'q> {
    /// Wrap `bytes` holding a `num_bits`-bit fingerprint.
    pub fn new(bytes: &'q [u8], num_bits: usize) -> Self {
        Self { bytes, num_bits }
    }

    /// Packed bytes
    pub fn bytes(&self) -> &'q [u8] {
        self.bytes
    }

    /// Width in bits
    pub fn num_bits(&self) -> usize {
        self.num_bits
    }

    /// Copy into the target's stride, after checking it fits.
    pub(crate) fn align_to(&self, target: &FingerprintArena) -> Result<AlignedFingerprint> {
        if self.num_bits != target.num_bits() {
            return Err(FpSimError::bits(self.num_bits, target.num_bits()));
        }
        let len = self.bytes.len();
        if len < target.fingerprint_bytes() || len > target.storage_size() {
            return Err(FpSimError::bytes(len, target.fingerprint_bytes()));
        }
        if !padding_is_zero(self.bytes, self.num_bits) {
            return Err(FpSimError::InvalidArgument(format!(
                "query fingerprint has bits set past bit {}",
                self.num_bits
            )));
        }
        align_fingerprint(self.bytes, target.alignment(), target.storage_size())
    }
}

pub(crate) fn check_threshold(threshold: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(FpSimError::InvalidArgument(format!(
            "threshold must be between 0.0 and 1.0, got {}",
            threshold
        )));
    }
    Ok(())
}

pub(crate) fn check_arenas(query: &FingerprintArena, target: &FingerprintArena) -> Result<()> {
    if query.num_bits() != target.num_bits() {
        return Err(FpSimError::bits(query.num_bits(), target.num_bits()));
    }
    if query.storage_size() != target.storage_size() {
        return Err(FpSimError::bytes(query.storage_size(), target.storage_size()));
    }
    Ok(())
}

/// Clamp a caller-supplied range to `0..len`.
pub(crate) fn clamp_range(range: Range<usize>, len: usize) -> Range<usize> {
    let end = range.end.min(len);
    if end < range.end {
        tracing::warn!("Range end {} clamped to arena length {}", range.end, len);
    }
    range.start.min(end)..end
}

/// Inclusive popcount band a target must fall in to score `>= threshold`
/// against a query with `query_popcount` bits set. Bounds are widened to
/// whole popcounts; the exact score check happens per row.
pub(crate) fn popcount_band(query_popcount: u32, threshold: f64, max_popcount: u32) -> (u32, u32) {
    if threshold <= 0.0 {
        return (0, max_popcount);
    }
    if query_popcount == 0 {
        // Every score against an empty query is 0.0.
        return (1, 0);
    }
    let q = query_popcount as f64;
    let lo = (q * threshold).floor() as u32;
    let hi = ((q / threshold).ceil() as u32).min(max_popcount);
    (lo, hi)
}

/// Call `visit(row, score)` for every row of `target` in `rows` scoring
/// `>= threshold` against `query`, in increasing row order.
pub(crate) fn scan_threshold<F>(
    query: &[u8],
    target: &FingerprintArena,
    rows: Range<usize>,
    threshold: f64,
    mut visit: F,
) where
    F: FnMut(usize, f64),
{
    match target.popcount_index() {
        Some(index) => {
            let query_popcount = popcount(query);
            let (lo, hi) = popcount_band(query_popcount, threshold, index.max_popcount());
            for p in lo..=hi {
                let band = index.rows_with_popcount(p);
                for row in band.start.max(rows.start)..band.end.min(rows.end) {
                    let score =
                        tanimoto_with_popcounts(query, target.fingerprint(row), query_popcount, p);
                    if score >= threshold {
                        visit(row, score);
                    }
                }
            }
        }
        None => {
            for row in rows {
                let score = tanimoto(query, target.fingerprint(row));
                if score >= threshold {
                    visit(row, score);
                }
            }
        }
    }
}
