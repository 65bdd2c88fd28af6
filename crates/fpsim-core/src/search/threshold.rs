//! Threshold search: every target at or above a score

use std::ops::Range;

use super::{check_arenas, check_threshold, clamp_range, scan_threshold, QueryFingerprint};
use crate::arena::FingerprintArena;
use crate::error::{FpSimError, Result};
use crate::results::{Hit, SearchResults};

/// All targets scoring `>= threshold` against a single query.
///
/// The returned container has exactly one row.
pub fn threshold_tanimoto_search_fp<'t>(
    query: &QueryFingerprint<'_>,
    target: &'t FingerprintArena,
    threshold: f64,
) -> Result<SearchResults<'t>> {
    check_threshold(threshold)?;
    let aligned = query.align_to(target)?;

    let mut results = SearchResults::new(1, target.ids());
    scan_threshold(aligned.fingerprint(), target, 0..target.len(), threshold, |row, score| {
        results.push(0, row, score)
    });
    Ok(results)
}

/// Per query row, every target scoring `>= threshold`, in target order.
pub fn threshold_tanimoto_search<'t>(
    query: &FingerprintArena,
    target: &'t FingerprintArena,
    threshold: f64,
) -> Result<SearchResults<'t>> {
    check_arenas(query, target)?;
    check_threshold(threshold)?;
    tracing::debug!(
        "Threshold search of {} queries against {} targets (threshold {})",
        query.len(),
        target.len(),
        threshold
    );

    let mut results = SearchResults::new(query.len(), target.ids());
    for row in 0..query.len() {
        scan_threshold(query.fingerprint(row), target, 0..target.len(), threshold, |index, score| {
            results.push(row, index, score)
        });
    }
    Ok(results)
}

/// Threshold search of an arena against itself.
///
/// Each pair is scored once. Row `i` receives the hits `j >= i` (itself
/// included when its self-score qualifies); with `include_lower_triangle`
/// the hits are then mirrored so every row holds its full neighbourhood.
pub fn threshold_tanimoto_search_symmetric<'t>(
    arena: &'t FingerprintArena,
    threshold: f64,
    include_lower_triangle: bool,
) -> Result<SearchResults<'t>> {
    let n = arena.len();
    tracing::debug!(
        "Symmetric threshold search over {} rows (threshold {}, lower triangle: {})",
        n,
        threshold,
        include_lower_triangle
    );

    let mut results = SearchResults::new(n, arena.ids());
    partial_threshold_tanimoto_search_symmetric(&mut results, arena, threshold, 0..n, 0..n)?;
    if include_lower_triangle {
        fill_lower_triangle(&mut results)?;
    }
    Ok(results)
}

/// Append the upper-triangle hits of one `queries × targets` rectangle.
///
/// Pairs `(i, j)` with `j >= i` inside the rectangle are scored and stored
/// in row `i`. Existing hits are kept, so calls over disjoint rectangles
/// build up the matrix. Range ends past the arena are clamped.
///
/// `results` must have one row per arena row, and its target ids (if any)
/// must name every arena row.
pub fn partial_threshold_tanimoto_search_symmetric(
    results: &mut SearchResults<'_>,
    arena: &FingerprintArena,
    threshold: f64,
    queries: Range<usize>,
    targets: Range<usize>,
) -> Result<()> {
    check_threshold(threshold)?;
    let n = arena.len();
    if results.len() != n {
        return Err(FpSimError::InvalidArgument(format!(
            "results have {} rows but the arena has {}",
            results.len(),
            n
        )));
    }
    if let Some(ids) = results.target_ids() {
        if ids.len() != n {
            return Err(FpSimError::InvalidArgument(format!(
                "results carry {} target ids but the arena has {} rows",
                ids.len(),
                n
            )));
        }
    }
    let queries = clamp_range(queries, n);
    let targets = clamp_range(targets, n);
    tracing::trace!(
        "Symmetric threshold search over queries {:?} x targets {:?}",
        queries,
        targets
    );

    scan_upper_triangle(arena, threshold, queries, targets, |i, j, score| {
        results.push(i, j, score)
    });
    Ok(())
}

/// Call `visit(i, j, score)` for every qualifying pair `j >= i` of the
/// already clamped rectangle, row by row.
pub(crate) fn scan_upper_triangle<F>(
    arena: &FingerprintArena,
    threshold: f64,
    queries: Range<usize>,
    targets: Range<usize>,
    mut visit: F,
) where
    F: FnMut(usize, usize, f64),
{
    for i in queries {
        let rows = targets.start.max(i)..targets.end;
        if rows.is_empty() {
            continue;
        }
        scan_threshold(arena.fingerprint(i), arena, rows, threshold, |j, score| {
            visit(i, j, score)
        });
    }
}

/// Upper-triangle hits of rows `queries` against every row, one `Vec` per query row.
pub(crate) fn upper_triangle_rows(
    arena: &FingerprintArena,
    threshold: f64,
    queries: Range<usize>,
) -> Vec<Vec<Hit>> {
    let start = queries.start;
    let mut rows = vec![Vec::new(); queries.len()];
    scan_upper_triangle(arena, threshold, queries, 0..arena.len(), |i, j, score| {
        rows[i - start].push(Hit::new(j, score))
    });
    rows
}

/// Mirror every upper-triangle hit `(i, j, score)`, `j > i`, into row `j` as `(i, score)`.
///
/// Scores are copied, not recomputed. The call is not idempotent: it
/// expects upper-triangle hits only, and fails without touching `results`
/// if any row already holds a hit below the diagonal (for example after a
/// previous fill).
pub fn fill_lower_triangle(results: &mut SearchResults<'_>) -> Result<()> {
    let n = results.len();
    let mut mirrored = Vec::new();
    for i in 0..n {
        for hit in results.row_hits(i) {
            if hit.index >= n {
                return Err(FpSimError::IndexOutOfRange {
                    index: hit.index as isize,
                    len: n,
                });
            }
            if hit.index < i {
                return Err(FpSimError::InvalidArgument(format!(
                    "row {} already holds lower-triangle hit {}",
                    i, hit.index
                )));
            }
            if hit.index > i {
                mirrored.push((hit.index, i, hit.score));
            }
        }
    }
    for (row, index, score) in mirrored {
        results.push(row, index, score);
    }
    Ok(())
}
