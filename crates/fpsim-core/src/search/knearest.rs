//! k-nearest search
//!
//! Runs in two phases. Accumulation offers every qualifying target to a
//! per-row heap that never holds more than `k` candidates. Finalization
//! sorts each row by decreasing score and trims it to `k`.
//!
//! Ties are broken by target index: of two equal scores the lower index
//! ranks first, both when choosing who survives at the cutoff and in the
//! final order.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::ops::Range;

use super::{check_arenas, check_threshold, scan_threshold, QueryFingerprint};
use crate::arena::FingerprintArena;
use crate::error::{FpSimError, Result};
use crate::popcount::{max_tanimoto_for_popcounts, popcount, tanimoto, tanimoto_with_popcounts};
use crate::results::{Hit, SearchResults};

/// Heap entry ordered so that the worst candidate is the maximum.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    score: f64,
    index: usize,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        // Lower score is worse; on equal scores the higher index is worse.
        other
            .score
            .total_cmp(&self.score)
            .then_with(|| self.index.cmp(&other.index))
    }
}

#[derive(Debug, Clone, Default)]
struct BoundedHeap {
    heap: BinaryHeap<Candidate>,
}

impl BoundedHeap {
    #[inline]
    fn offer(&mut self, k: usize, index: usize, score: f64) {
        let candidate = Candidate { score, index };
        if self.heap.len() < k {
            self.heap.push(candidate);
        } else if let Some(mut worst) = self.heap.peek_mut() {
            if candidate < *worst {
                *worst = candidate;
            }
        }
    }

    fn worst_score(&self, k: usize) -> Option<f64> {
        if self.heap.len() < k {
            return None;
        }
        self.heap.peek().map(|c| c.score)
    }
}

/// Bounded per-row candidate store for the accumulation phase.
#[derive(Debug, Clone)]
pub struct KnearestAccumulator {
    k: usize,
    rows: Vec<BoundedHeap>,
}

impl KnearestAccumulator {
    /// Accumulator for `num_rows` queries keeping at most `k` hits each.
    pub fn new(num_rows: usize, k: usize) -> Self {
        Self {
            k,
            rows: vec![BoundedHeap::default(); num_rows],
        }
    }

    /// Capacity per row
    pub fn k(&self) -> usize {
        self.k
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True if there are no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Offer `(index, score)` to `row`. Once the row holds `k` candidates
    /// the worst one is evicted if the new candidate ranks higher.
    ///
    /// # Panics
    /// Panics if `row >= self.len()`.
    #[inline]
    pub fn offer(&mut self, row: usize, index: usize, score: f64) {
        self.rows[row].offer(self.k, index, score);
    }

    /// Score of the k-th best candidate of `row`, once `row` holds `k`.
    pub fn cutoff(&self, row: usize) -> Option<f64> {
        self.rows.get(row).and_then(|heap| heap.worst_score(self.k))
    }

    /// Move the surviving candidates into `results`, unsorted.
    ///
    /// Row `i` of the accumulator is appended to row `offset + i`.
    /// Follow with [`finalize_knearest`].
    pub fn drain_into(self, results: &mut SearchResults<'_>, offset: usize) -> Result<()> {
        if offset + self.rows.len() > results.len() {
            return Err(FpSimError::IndexOutOfRange {
                index: (offset + self.rows.len()) as isize,
                len: results.len(),
            });
        }
        for (i, heap) in self.rows.into_iter().enumerate() {
            let hits = results.row_hits_mut(offset + i);
            hits.extend(heap.heap.into_iter().map(|c| Hit::new(c.index, c.score)));
        }
        Ok(())
    }
}

/// Sort rows `rows` by decreasing score (lower index first on ties) and keep at most `k` hits.
pub fn finalize_knearest(results: &mut SearchResults<'_>, k: usize, rows: Range<usize>) -> Result<()> {
    if rows.start > rows.end || rows.end > results.len() {
        return Err(FpSimError::IndexOutOfRange {
            index: rows.end as isize,
            len: results.len(),
        });
    }
    for row in rows {
        let hits = results.row_hits_mut(row);
        hits.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.index.cmp(&b.index))
        });
        hits.truncate(k);
    }
    Ok(())
}

/// Offer every target of `target` scoring `>= threshold` to row `row`.
///
/// With a popcount index, bands are visited from the highest reachable
/// score downwards and the walk stops once no band can beat the current
/// k-th candidate.
fn accumulate_query(
    query: &[u8],
    target: &FingerprintArena,
    threshold: f64,
    acc: &mut KnearestAccumulator,
    row: usize,
) {
    if acc.k == 0 {
        return;
    }
    let Some(index) = target.popcount_index() else {
        for j in 0..target.len() {
            let score = tanimoto(query, target.fingerprint(j));
            if score >= threshold {
                acc.offer(row, j, score);
            }
        }
        return;
    };

    let q = popcount(query);
    let max = index.max_popcount();
    let mut down = Some(q.min(max));
    let mut up = q + 1;
    loop {
        let next_down = down.map(|p| (p, max_tanimoto_for_popcounts(p, q)));
        let next_up = (up <= max).then(|| (up, max_tanimoto_for_popcounts(up, q)));
        let (p, bound) = match (next_down, next_up) {
            (None, None) => break,
            (Some(d), Some(u)) if u.1 > d.1 => {
                up += 1;
                u
            }
            (Some(d), _) => {
                down = d.0.checked_sub(1);
                d
            }
            (None, Some(u)) => {
                up += 1;
                u
            }
        };
        if bound < threshold {
            break;
        }
        if matches!(acc.cutoff(row), Some(cutoff) if bound < cutoff) {
            break;
        }
        for j in index.rows_with_popcount(p) {
            let score = tanimoto_with_popcounts(query, target.fingerprint(j), q, p);
            if score >= threshold {
                acc.offer(row, j, score);
            }
        }
    }
}

/// The `k` best targets scoring `>= threshold` against a single query.
///
/// The returned container has exactly one row, sorted by decreasing score.
pub fn knearest_tanimoto_search_fp<'t>(
    query: &QueryFingerprint<'_>,
    target: &'t FingerprintArena,
    k: usize,
    threshold: f64,
) -> Result<SearchResults<'t>> {
    check_threshold(threshold)?;
    let aligned = query.align_to(target)?;

    let mut acc = KnearestAccumulator::new(1, k);
    accumulate_query(aligned.fingerprint(), target, threshold, &mut acc, 0);

    let mut results = SearchResults::new(1, target.ids());
    acc.drain_into(&mut results, 0)?;
    finalize_knearest(&mut results, k, 0..1)?;
    Ok(results)
}

/// Per query row, the `k` best targets scoring `>= threshold`, sorted by decreasing score.
pub fn knearest_tanimoto_search<'t>(
    query: &FingerprintArena,
    target: &'t FingerprintArena,
    k: usize,
    threshold: f64,
) -> Result<SearchResults<'t>> {
    check_arenas(query, target)?;
    check_threshold(threshold)?;
    tracing::debug!(
        "k-nearest search of {} queries against {} targets (k {}, threshold {})",
        query.len(),
        target.len(),
        k,
        threshold
    );

    let mut acc = KnearestAccumulator::new(query.len(), k);
    for row in 0..query.len() {
        accumulate_query(query.fingerprint(row), target, threshold, &mut acc, row);
    }

    let mut results = SearchResults::new(query.len(), target.ids());
    acc.drain_into(&mut results, 0)?;
    finalize_knearest(&mut results, k, 0..query.len())?;
    Ok(results)
}

/// k-nearest search of an arena against itself.
///
/// Each pair `(i, j)`, `j >= i`, is scored once and offered to both rows.
/// A row's own fingerprint is one of its candidates.
pub fn knearest_tanimoto_search_symmetric<'t>(
    arena: &'t FingerprintArena,
    k: usize,
    threshold: f64,
) -> Result<SearchResults<'t>> {
    check_threshold(threshold)?;
    let n = arena.len();
    tracing::debug!(
        "Symmetric k-nearest search over {} rows (k {}, threshold {})",
        n,
        k,
        threshold
    );

    let mut acc = KnearestAccumulator::new(n, k);
    if k > 0 {
        for i in 0..n {
            scan_threshold(arena.fingerprint(i), arena, i..n, threshold, |j, score| {
                acc.offer(i, j, score);
                if j != i {
                    acc.offer(j, i, score);
                }
            });
        }
    }

    let mut results = SearchResults::new(n, arena.ids());
    acc.drain_into(&mut results, 0)?;
    finalize_knearest(&mut results, k, 0..n)?;
    Ok(results)
}
