//! Rayon tiling of the symmetric searches
//!
//! The query range is cut into bands of `band_size` rows and no two tasks
//! ever write to the same memory. Threshold bands produce only their own
//! rows, which are concatenated in band order. Count bands accumulate into
//! one buffer per rayon split, summed at the end. Work runs on whatever
//! rayon pool the caller is inside.

use rayon::prelude::*;

use crate::arena::FingerprintArena;
use crate::error::{FpSimError, Result};
use crate::results::{Hit, SearchResults};
use crate::search::threshold::upper_triangle_rows;
use crate::search::{check_threshold, fill_lower_triangle, partial_count_tanimoto_hits_symmetric};

fn query_bands(n: usize, band_size: usize) -> Result<Vec<(usize, usize)>> {
    if band_size == 0 {
        return Err(FpSimError::InvalidArgument(
            "band size must be at least 1".to_string(),
        ));
    }
    Ok((0..n)
        .step_by(band_size)
        .map(|start| (start, (start + band_size).min(n)))
        .collect())
}

/// [`crate::count_tanimoto_hits_symmetric`] split into bands of `band_size` query rows.
pub fn count_tanimoto_hits_symmetric_parallel(
    arena: &FingerprintArena,
    threshold: f64,
    band_size: usize,
) -> Result<Vec<usize>> {
    check_threshold(threshold)?;
    let n = arena.len();
    let bands = query_bands(n, band_size)?;
    tracing::debug!(
        "Parallel symmetric count over {} rows in {} bands (threshold {})",
        n,
        bands.len(),
        threshold
    );

    bands
        .into_par_iter()
        .try_fold(
            || vec![0; n],
            |mut counts, (start, end)| {
                partial_count_tanimoto_hits_symmetric(&mut counts, arena, threshold, start..end, 0..n)?;
                Ok::<_, FpSimError>(counts)
            },
        )
        .try_reduce(
            || vec![0; n],
            |mut total, counts| {
                total.iter_mut().zip(counts).for_each(|(t, c)| *t += c);
                Ok(total)
            },
        )
}

/// [`crate::threshold_tanimoto_search_symmetric`] split into bands of `band_size` query rows.
///
/// Row order and hit order match the single-threaded search.
pub fn threshold_tanimoto_search_symmetric_parallel<'t>(
    arena: &'t FingerprintArena,
    threshold: f64,
    include_lower_triangle: bool,
    band_size: usize,
) -> Result<SearchResults<'t>> {
    check_threshold(threshold)?;
    let n = arena.len();
    let bands = query_bands(n, band_size)?;
    tracing::debug!(
        "Parallel symmetric threshold search over {} rows in {} bands (threshold {})",
        n,
        bands.len(),
        threshold
    );

    let band_rows: Vec<Vec<Vec<Hit>>> = bands
        .into_par_iter()
        .map(|(start, end)| upper_triangle_rows(arena, threshold, start..end))
        .collect();

    let rows: Vec<Vec<Hit>> = band_rows.into_iter().flatten().collect();
    let mut results = SearchResults::from_rows(rows, arena.ids());
    if include_lower_triangle {
        fill_lower_triangle(&mut results)?;
    }
    Ok(results)
}
