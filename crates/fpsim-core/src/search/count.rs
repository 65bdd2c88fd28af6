//! Count targets at or above a threshold

use std::ops::Range;

use super::{check_arenas, check_threshold, clamp_range, scan_threshold, QueryFingerprint};
use crate::arena::FingerprintArena;
use crate::error::{FpSimError, Result};

/// Number of targets scoring `>= threshold` against a single query.
pub fn count_tanimoto_hits_fp(
    query: &QueryFingerprint<'_>,
    target: &FingerprintArena,
    threshold: f64,
) -> Result<usize> {
    check_threshold(threshold)?;
    let aligned = query.align_to(target)?;

    let mut count = 0;
    scan_threshold(aligned.fingerprint(), target, 0..target.len(), threshold, |_, _| {
        count += 1
    });
    Ok(count)
}

/// Per query row, the number of targets scoring `>= threshold`.
pub fn count_tanimoto_hits(
    query: &FingerprintArena,
    target: &FingerprintArena,
    threshold: f64,
) -> Result<Vec<usize>> {
    check_arenas(query, target)?;
    check_threshold(threshold)?;
    tracing::debug!(
        "Counting hits for {} queries against {} targets (threshold {})",
        query.len(),
        target.len(),
        threshold
    );

    let counts = (0..query.len())
        .map(|row| {
            let mut count = 0;
            scan_threshold(query.fingerprint(row), target, 0..target.len(), threshold, |_, _| {
                count += 1
            });
            count
        })
        .collect();
    Ok(counts)
}

/// Per row, the number of rows of the same arena scoring `>= threshold`.
///
/// A row counts itself when its self-score reaches the threshold.
pub fn count_tanimoto_hits_symmetric(arena: &FingerprintArena, threshold: f64) -> Result<Vec<usize>> {
    let n = arena.len();
    let mut counts = vec![0; n];
    partial_count_tanimoto_hits_symmetric(&mut counts, arena, threshold, 0..n, 0..n)?;
    Ok(counts)
}

/// Add the symmetric counts of one `queries × targets` rectangle to `counts`.
///
/// Only pairs `(i, j)` with `j >= i` inside the rectangle are scored; each
/// hit increments both `counts[i]` and `counts[j]` (once on the diagonal).
/// Range ends past the arena are clamped. Calls over rectangles that
/// together cover the upper triangle once produce the full counts.
///
/// `counts` must have room for the largest row touched. Calls sharing one
/// buffer must not run concurrently; give each task its own buffer and sum.
pub fn partial_count_tanimoto_hits_symmetric(
    counts: &mut [usize],
    arena: &FingerprintArena,
    threshold: f64,
    queries: Range<usize>,
    targets: Range<usize>,
) -> Result<()> {
    check_threshold(threshold)?;
    let n = arena.len();
    let queries = clamp_range(queries, n);
    let targets = clamp_range(targets, n);
    if queries.end > counts.len() || targets.end > counts.len() {
        return Err(FpSimError::InvalidArgument(format!(
            "counts buffer of {} entries is too small for rows up to {}",
            counts.len(),
            queries.end.max(targets.end)
        )));
    }
    tracing::trace!(
        "Symmetric count over queries {:?} x targets {:?}",
        queries,
        targets
    );

    for i in queries {
        let rows = targets.start.max(i)..targets.end;
        if rows.is_empty() {
            continue;
        }
        scan_threshold(arena.fingerprint(i), arena, rows, threshold, |j, _| {
            counts[i] += 1;
            if j != i {
                counts[j] += 1;
            }
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::ArenaBuilder;
    use crate::config::ArenaOptions;

    fn worked_example(options: ArenaOptions) -> FingerprintArena {
        let mut builder = ArenaBuilder::with_options(8, options);
        builder.add_with_id("A", &[0b1111_0000]).unwrap();
        builder.add_with_id("B", &[0b1100_0000]).unwrap();
        builder.add_with_id("C", &[0b0000_1111]).unwrap();
        builder.build().unwrap()
    }

    #[test]
    fn test_count_fp_worked_example() {
        for options in [ArenaOptions::default(), ArenaOptions::unordered()] {
            let arena = worked_example(options);
            let query = QueryFingerprint::new(&[0b1111_0000], 8);
            assert_eq!(count_tanimoto_hits_fp(&query, &arena, 0.5).unwrap(), 2);
            assert_eq!(count_tanimoto_hits_fp(&query, &arena, 0.0).unwrap(), 3);
            assert_eq!(count_tanimoto_hits_fp(&query, &arena, 1.0).unwrap(), 1);
        }
    }

    #[test]
    fn test_count_arena() {
        let targets = worked_example(ArenaOptions::default());
        let queries = worked_example(ArenaOptions::unordered());
        let counts = count_tanimoto_hits(&queries, &targets, 0.5).unwrap();
        // A hits A and B; B hits A and B; C hits only C.
        assert_eq!(counts, vec![2, 2, 1]);
    }

    #[test]
    fn test_count_size_mismatch() {
        let targets = worked_example(ArenaOptions::default());
        let mut other = ArenaBuilder::new(16);
        other.add(&[1, 0]).unwrap();
        let other = other.build().unwrap();
        assert!(matches!(
            count_tanimoto_hits(&other, &targets, 0.5),
            Err(FpSimError::SizeMismatch { unit: "bits", query: 16, target: 8 })
        ));
        let query = QueryFingerprint::new(&[1, 0], 16);
        assert!(count_tanimoto_hits_fp(&query, &targets, 0.5).is_err());
    }

    #[test]
    fn test_symmetric_counts_match_asymmetric() {
        let arena = worked_example(ArenaOptions::default());
        for threshold in [0.0, 0.4, 0.5, 0.9] {
            assert_eq!(
                count_tanimoto_hits_symmetric(&arena, threshold).unwrap(),
                count_tanimoto_hits(&arena, &arena, threshold).unwrap()
            );
        }
    }

    #[test]
    fn test_partial_tiles_accumulate() {
        let arena = worked_example(ArenaOptions::unordered());
        let full = count_tanimoto_hits_symmetric(&arena, 0.3).unwrap();

        let mut counts = vec![0; 3];
        for (queries, targets) in [(0..2, 0..2), (0..2, 2..3), (2..3, 2..3), (2..3, 0..2)] {
            partial_count_tanimoto_hits_symmetric(&mut counts, &arena, 0.3, queries, targets)
                .unwrap();
        }
        assert_eq!(counts, full);
    }

    #[test]
    fn test_partial_validates_before_writing() {
        let arena = worked_example(ArenaOptions::default());
        let mut counts = vec![7; 2];
        assert!(partial_count_tanimoto_hits_symmetric(&mut counts, &arena, 0.5, 0..3, 0..3).is_err());
        assert_eq!(counts, vec![7, 7]);
        assert!(partial_count_tanimoto_hits_symmetric(&mut counts, &arena, 2.0, 0..1, 0..1).is_err());
    }

    #[test]
    fn test_partial_clamps_range() {
        let arena = worked_example(ArenaOptions::default());
        let mut counts = vec![0; 3];
        partial_count_tanimoto_hits_symmetric(&mut counts, &arena, 0.5, 0..100, 0..100).unwrap();
        assert_eq!(counts, count_tanimoto_hits_symmetric(&arena, 0.5).unwrap());
    }
}
