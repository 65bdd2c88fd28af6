//! # fpsim-core
//!
//! Tanimoto similarity search over packed fixed-width bit fingerprints.
//!
//! ## Features
//!
//! - **Arena**: contiguous, aligned, zero-padded store of N fingerprints with
//!   optional ids, optionally sorted by popcount with a popcount index
//! - **Similarity core**: hardware `popcnt` on x86_64 with a portable
//!   word-at-a-time fallback
//! - **Search**: count, threshold and k-nearest, each for a single query, a
//!   query arena, or an arena against itself
//! - **Tiling**: partial symmetric searches over caller-chosen rectangles,
//!   with rayon helpers behind the `parallel` feature
//! - **Results**: sparse per-query rows of `(index, score)` hits with id
//!   resolution and in-place reordering
//!
//! ## Example
//!
//! ```
//! use fpsim_core::{ArenaBuilder, QueryFingerprint, threshold_tanimoto_search_fp};
//!
//! let mut builder = ArenaBuilder::new(8);
//! builder.add_with_id("A", &[0b1111_0000])?;
//! builder.add_with_id("B", &[0b1100_0000])?;
//! builder.add_with_id("C", &[0b0000_1111])?;
//! let arena = builder.build()?;
//!
//! let query = QueryFingerprint::new(&[0b1111_0000], 8);
//! let results = threshold_tanimoto_search_fp(&query, &arena, 0.5)?;
//! assert_eq!(results.get(0)?.len(), 2);
//! # Ok::<(), fpsim_core::FpSimError>(())
//! ```
//!
//! The library logs through `tracing` and never installs a subscriber.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod align;
pub mod arena;
pub mod config;
pub mod error;
pub mod hex;
pub mod popcount;
pub mod results;
pub mod search;

// Rayon tiling of the symmetric searches
#[cfg(feature = "parallel")]
pub mod parallel;

// Re-exports
pub use align::{align_fingerprint, AlignedFingerprint};
pub use arena::{ArenaBuilder, FingerprintArena, PopcountIndex};
pub use config::{storage_size_for, ArenaOptions, DEFAULT_ALIGNMENT};
pub use error::{FpSimError, Result};
pub use popcount::{
    contains, intersect_popcount, popcount, tanimoto, union_popcount,
};
pub use results::{Hit, ResultOrdering, SearchResult, SearchResults};
pub use search::{
    count_tanimoto_hits, count_tanimoto_hits_fp, count_tanimoto_hits_symmetric,
    fill_lower_triangle, finalize_knearest, knearest_tanimoto_search,
    knearest_tanimoto_search_fp, knearest_tanimoto_search_symmetric,
    partial_count_tanimoto_hits_symmetric, partial_threshold_tanimoto_search_symmetric,
    threshold_tanimoto_search, threshold_tanimoto_search_fp, threshold_tanimoto_search_symmetric,
    KnearestAccumulator, QueryFingerprint,
};

#[cfg(feature = "parallel")]
pub use parallel::{
    count_tanimoto_hits_symmetric_parallel, threshold_tanimoto_search_symmetric_parallel,
};
