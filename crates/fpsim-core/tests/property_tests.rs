//! Property-based tests using proptest
//!
//! These tests check the search laws against a brute-force scan for
//! arbitrary fingerprint sets.

use fpsim_core::*;
use proptest::prelude::*;

const NUM_BYTES: usize = 4;
const NUM_BITS: usize = NUM_BYTES * 8;

// ============================================================================
// Strategies & helpers
// ============================================================================

fn fingerprint_strategy() -> impl Strategy<Value = Vec<u8>> {
    // Sparse and dense fingerprints both show up, plus the all-zero one.
    prop_oneof![
        prop::collection::vec(any::<u8>(), NUM_BYTES),
        prop::collection::vec(any::<u8>(), NUM_BYTES)
            .prop_map(|fp: Vec<u8>| fp.iter().map(|b| b & 0x11).collect::<Vec<u8>>()),
        Just(vec![0u8; NUM_BYTES]),
    ]
}

fn fingerprints_strategy(max: usize) -> impl Strategy<Value = Vec<Vec<u8>>> {
    prop::collection::vec(fingerprint_strategy(), 0..max)
}

fn threshold_strategy() -> impl Strategy<Value = f64> {
    prop_oneof![Just(0.0), Just(1.0), 0.0f64..=1.0]
}

fn build(fps: &[Vec<u8>], options: ArenaOptions) -> FingerprintArena {
    let mut builder = ArenaBuilder::with_options(NUM_BITS, options);
    for (i, fp) in fps.iter().enumerate() {
        builder.add_with_id(format!("fp{}", i), fp).unwrap();
    }
    builder.build().unwrap()
}

/// Brute-force `(index, score)` pairs of `arena` scoring `>= threshold`.
fn brute_force(query: &[u8], arena: &FingerprintArena, threshold: f64) -> Vec<(usize, f64)> {
    (0..arena.len())
        .map(|j| (j, tanimoto(query, &arena.fingerprint(j)[..NUM_BYTES])))
        .filter(|&(_, score)| score >= threshold)
        .collect()
}

fn sorted_by_index(mut hits: Vec<(usize, f64)>) -> Vec<(usize, f64)> {
    hits.sort_by_key(|&(index, _)| index);
    hits
}

// ============================================================================
// Score Properties
// ============================================================================

proptest! {
    // Property: scores lie in [0, 1] and are symmetric
    #[test]
    fn test_score_bounds_and_symmetry(a in fingerprint_strategy(), b in fingerprint_strategy()) {
        let ab = tanimoto(&a, &b);
        let ba = tanimoto(&b, &a);
        prop_assert!((0.0..=1.0).contains(&ab), "score out of range: {}", ab);
        prop_assert_eq!(ab, ba);
    }

    // Property: self-score is 1.0 unless the fingerprint is empty
    #[test]
    fn test_self_score(a in fingerprint_strategy()) {
        let expected = if popcount(&a) == 0 { 0.0 } else { 1.0 };
        prop_assert_eq!(tanimoto(&a, &a), expected);
    }

    // Property: |A ∩ B| + |A ∪ B| == |A| + |B|
    #[test]
    fn test_popcount_identity(a in fingerprint_strategy(), b in fingerprint_strategy()) {
        prop_assert_eq!(
            intersect_popcount(&a, &b) + union_popcount(&a, &b),
            popcount(&a) + popcount(&b)
        );
    }

    // Property: containment implies intersect == |query|
    #[test]
    fn test_contains_matches_popcounts(a in fingerprint_strategy(), b in fingerprint_strategy()) {
        prop_assert_eq!(contains(&a, &b), intersect_popcount(&a, &b) == popcount(&a));
    }
}

// ============================================================================
// Alignment Properties
// ============================================================================

proptest! {
    // Property: aligned copies keep the original bytes and zero the rest
    #[test]
    fn test_alignment_recoverable(
        fp in prop::collection::vec(any::<u8>(), 1..40),
        shift in 0u32..7,
        extra in 0usize..16
    ) {
        let alignment = 1usize << shift;
        let storage_size = fp.len() + extra;
        let aligned = align_fingerprint(&fp, alignment, storage_size).unwrap();
        let start = aligned.start_padding();
        let bytes = aligned.as_bytes();

        prop_assert_eq!(bytes.len() % alignment, 0);
        prop_assert_eq!(aligned.fingerprint().as_ptr() as usize % alignment, 0);
        prop_assert_eq!(&bytes[start..start + fp.len()], &fp[..]);
        prop_assert!(bytes[..start].iter().all(|&b| b == 0));
        prop_assert!(bytes[start + fp.len()..].iter().all(|&b| b == 0));
        prop_assert_eq!(aligned.fingerprint().len(), storage_size);
    }
}

// ============================================================================
// Search Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    // Property: threshold search returns exactly the brute-force hits
    #[test]
    fn test_threshold_equals_brute_force(
        fps in fingerprints_strategy(24),
        query in fingerprint_strategy(),
        threshold in threshold_strategy()
    ) {
        for options in [ArenaOptions::default(), ArenaOptions::unordered()] {
            let arena = build(&fps, options);
            let q = QueryFingerprint::new(&query, NUM_BITS);
            let results = threshold_tanimoto_search_fp(&q, &arena, threshold).unwrap();
            let hits = results.get(0).unwrap().get_indices_and_scores();
            prop_assert_eq!(sorted_by_index(hits), brute_force(&query, &arena, threshold));
        }
    }

    // Property: count equals the size of the threshold result
    #[test]
    fn test_count_equals_threshold_size(
        fps in fingerprints_strategy(24),
        queries in fingerprints_strategy(6),
        threshold in threshold_strategy()
    ) {
        let targets = build(&fps, ArenaOptions::default());
        let queries = build(&queries, ArenaOptions::unordered());
        let counts = count_tanimoto_hits(&queries, &targets, threshold).unwrap();
        let results = threshold_tanimoto_search(&queries, &targets, threshold).unwrap();
        let sizes: Vec<usize> = results.iter().map(|row| row.len()).collect();
        prop_assert_eq!(counts, sizes);
    }

    // Property: symmetric search with the lower triangle equals arena-vs-itself
    #[test]
    fn test_symmetry_law(
        fps in fingerprints_strategy(20),
        threshold in threshold_strategy()
    ) {
        let arena = build(&fps, ArenaOptions::default());
        let symmetric = threshold_tanimoto_search_symmetric(&arena, threshold, true).unwrap();
        let asymmetric = threshold_tanimoto_search(&arena, &arena, threshold).unwrap();
        for (s, a) in symmetric.iter().zip(asymmetric.iter()) {
            prop_assert_eq!(
                sorted_by_index(s.get_indices_and_scores()),
                sorted_by_index(a.get_indices_and_scores())
            );
        }

        let counts = count_tanimoto_hits_symmetric(&arena, threshold).unwrap();
        let sizes: Vec<usize> = symmetric.iter().map(|row| row.len()).collect();
        prop_assert_eq!(counts, sizes);
    }

    // Property: tiling the upper triangle reproduces the full symmetric counts
    #[test]
    fn test_tiled_counts(
        fps in fingerprints_strategy(20),
        threshold in threshold_strategy(),
        tile in 1usize..8
    ) {
        let arena = build(&fps, ArenaOptions::default());
        let n = arena.len();
        let mut counts = vec![0; n];
        for qs in (0..n).step_by(tile) {
            for ts in (qs..n).step_by(tile) {
                partial_count_tanimoto_hits_symmetric(
                    &mut counts, &arena, threshold, qs..qs + tile, ts..ts + tile,
                ).unwrap();
            }
        }
        prop_assert_eq!(counts, count_tanimoto_hits_symmetric(&arena, threshold).unwrap());
    }

    // Property: k-nearest is the top k of the threshold result
    #[test]
    fn test_knearest_is_top_k(
        fps in fingerprints_strategy(24),
        query in fingerprint_strategy(),
        k in 0usize..8,
        threshold in threshold_strategy()
    ) {
        for options in [ArenaOptions::default(), ArenaOptions::unordered()] {
            let arena = build(&fps, options);
            let q = QueryFingerprint::new(&query, NUM_BITS);

            let mut expected = brute_force(&query, &arena, threshold);
            expected.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
            expected.truncate(k);

            let results = knearest_tanimoto_search_fp(&q, &arena, k, threshold).unwrap();
            prop_assert_eq!(results.get(0).unwrap().get_indices_and_scores(), expected);
        }
    }

    // Property: symmetric k-nearest agrees with arena-vs-itself
    #[test]
    fn test_symmetric_knearest(
        fps in fingerprints_strategy(16),
        k in 0usize..5,
        threshold in threshold_strategy()
    ) {
        let arena = build(&fps, ArenaOptions::default());
        let symmetric = knearest_tanimoto_search_symmetric(&arena, k, threshold).unwrap();
        let asymmetric = knearest_tanimoto_search(&arena, &arena, k, threshold).unwrap();
        prop_assert_eq!(
            symmetric.iter_indices().collect::<Vec<_>>(),
            asymmetric.iter_indices().collect::<Vec<_>>()
        );
    }

    // Property: ids follow their rows through popcount reordering
    #[test]
    fn test_reorder_keeps_ids(fps in fingerprints_strategy(24)) {
        let arena = build(&fps, ArenaOptions::default());
        for (id, fp) in arena.iter() {
            let original: usize = id.unwrap()[2..].parse().unwrap();
            prop_assert_eq!(&fp[..NUM_BYTES], &fps[original][..]);
            prop_assert!(fp[NUM_BYTES..].iter().all(|&b| b == 0));
        }
        for row in 1..arena.len() {
            prop_assert!(arena.popcount(row - 1) <= arena.popcount(row));
        }
    }
}
