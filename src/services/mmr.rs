//! Maximal Marginal Relevance selection.
//!
//! Re-ranks a similarity-ordered candidate pool so the final selection
//! balances relevance to the query against redundancy with passages already
//! chosen:
//!
//! score(c) = λ × sim(query, c) − (1 − λ) × max(sim(c, s) for s in selected)
//!
//! λ = 1.0 reproduces plain relevance ranking, λ = 0.0 picks purely for
//! diversity. Selection is pure and deterministic: ties go to the candidate
//! that appeared earlier in the pool.

use crate::models::EmbeddedPassage;

/// Cosine similarity of two vectors; 0.0 when either has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let denom = magnitude(a) * magnitude(b);
    if denom == 0.0 { 0.0 } else { dot / denom }
}

fn magnitude(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Select `min(k, pool.len())` entries from `pool` by iterative greedy MMR.
///
/// `pool` is expected in descending similarity order as returned by the
/// index; each entry is picked at most once. The result is in selection
/// order. `lambda_mult` is expected in `[0, 1]`.
pub fn select(
    query: &[f32],
    pool: Vec<EmbeddedPassage>,
    k: usize,
    lambda_mult: f32,
) -> Vec<EmbeddedPassage> {
    let order = select_indices(query, &pool, k, lambda_mult);

    let mut slots: Vec<Option<EmbeddedPassage>> = pool.into_iter().map(Some).collect();
    order
        .into_iter()
        .filter_map(|idx| slots[idx].take())
        .collect()
}

/// Pool positions chosen by MMR, in selection order.
pub fn select_indices(
    query: &[f32],
    pool: &[EmbeddedPassage],
    k: usize,
    lambda_mult: f32,
) -> Vec<usize> {
    let target = k.min(pool.len());
    if target == 0 {
        return Vec::new();
    }

    let relevance: Vec<f32> = pool
        .iter()
        .map(|c| cosine_similarity(query, &c.vector))
        .collect();

    // Max similarity of each candidate to anything selected so far.
    let mut penalty = vec![0.0f32; pool.len()];
    let mut remaining: Vec<usize> = (0..pool.len()).collect();
    let mut selected = Vec::with_capacity(target);

    while selected.len() < target && !remaining.is_empty() {
        let mut best: Option<(usize, f32)> = None;

        for (slot, &idx) in remaining.iter().enumerate() {
            let diversity = if selected.is_empty() { 0.0 } else { penalty[idx] };
            let score = lambda_mult * relevance[idx] - (1.0 - lambda_mult) * diversity;

            // strict comparison keeps the earliest candidate on ties
            if best.is_none_or(|(_, top)| score > top) {
                best = Some((slot, score));
            }
        }

        let Some((slot, _)) = best else {
            break;
        };
        let chosen = remaining.remove(slot);
        selected.push(chosen);

        for &idx in &remaining {
            let sim = cosine_similarity(&pool[idx].vector, &pool[chosen].vector);
            if selected.len() == 1 || sim > penalty[idx] {
                penalty[idx] = sim;
            }
        }
    }

    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Passage;
    use proptest::prelude::*;

    fn pool(vectors: &[&[f32]]) -> Vec<EmbeddedPassage> {
        vectors
            .iter()
            .enumerate()
            .map(|(i, v)| {
                EmbeddedPassage::new(Passage::new(i as u32, format!("p{i}"), 0), v.to_vec())
            })
            .collect()
    }

    fn ids(selected: &[EmbeddedPassage]) -> Vec<u32> {
        selected.iter().map(|c| c.passage.id).collect()
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-2.0, 0.0]) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_vector_similarity_is_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[0.0, 0.0]), 0.0);
    }

    #[test]
    fn test_empty_pool() {
        assert!(select(&[1.0, 0.0], Vec::new(), 5, 0.7).is_empty());
    }

    #[test]
    fn test_k_zero_selects_nothing() {
        let candidates = pool(&[&[1.0, 0.0]]);
        assert!(select(&[1.0, 0.0], candidates, 0, 0.7).is_empty());
    }

    #[test]
    fn test_pool_smaller_than_k() {
        let candidates = pool(&[&[1.0, 0.0], &[0.0, 1.0]]);
        let selected = select(&[1.0, 0.0], candidates, 5, 0.7);
        assert_eq!(selected.len(), 2);
    }

    #[test]
    fn test_lambda_one_is_relevance_order() {
        let query = [1.0, 0.0];
        // deliberately not in similarity order
        let candidates = pool(&[&[0.2, 1.0], &[1.0, 0.1], &[1.0, 0.5], &[1.0, 0.0]]);
        let selected = select(&query, candidates, 3, 1.0);
        assert_eq!(ids(&selected), vec![3, 1, 2]);
    }

    #[test]
    fn test_near_duplicates_are_not_both_selected() {
        let query = [1.0, 0.0, 0.0];
        let candidates = pool(&[&[0.9, 0.1, 0.0], &[0.9, 0.1, 0.0001], &[0.8, -0.6, 0.0]]);
        let selected = select(&query, candidates, 2, 0.5);

        assert_eq!(ids(&selected), vec![0, 2]);
    }

    #[test]
    fn test_ties_prefer_earlier_candidate() {
        let candidates = pool(&[&[1.0, 0.0], &[1.0, 0.0], &[1.0, 0.0]]);
        let selected = select(&[1.0, 0.0], candidates, 3, 1.0);
        assert_eq!(ids(&selected), vec![0, 1, 2]);
    }

    #[test]
    fn test_duplicate_entries_selected_at_most_once_each() {
        let candidates = pool(&[&[1.0, 0.0], &[1.0, 0.0]]);
        let selected = select(&[1.0, 0.0], candidates, 2, 0.0);
        assert_eq!(ids(&selected), vec![0, 1]);
    }

    #[test]
    fn test_lambda_zero_prefers_dissimilar() {
        let query = [1.0, 0.0];
        let candidates = pool(&[&[1.0, 0.0], &[0.99, 0.1], &[0.0, 1.0]]);
        let selected = select(&query, candidates, 2, 0.0);
        // first pick: every penalty is zero, so the tie goes to the first entry
        assert_eq!(ids(&selected), vec![0, 2]);
    }

    fn arb_pool() -> impl Strategy<Value = Vec<Vec<f32>>> {
        prop::collection::vec(prop::collection::vec(-1.0f32..1.0, 4), 0..12)
    }

    proptest! {
        #[test]
        fn prop_selection_size(
            vectors in arb_pool(),
            query in prop::collection::vec(-1.0f32..1.0, 4),
            k in 0usize..15,
            lambda in 0.0f32..=1.0,
        ) {
            let refs: Vec<&[f32]> = vectors.iter().map(Vec::as_slice).collect();
            let candidates = pool(&refs);
            let n = candidates.len();
            let selected = select(&query, candidates, k, lambda);

            prop_assert_eq!(selected.len(), k.min(n));
            let mut seen = ids(&selected);
            seen.sort_unstable();
            seen.dedup();
            prop_assert_eq!(seen.len(), k.min(n));
        }

        #[test]
        fn prop_deterministic(
            vectors in arb_pool(),
            query in prop::collection::vec(-1.0f32..1.0, 4),
            k in 1usize..10,
            lambda in 0.0f32..=1.0,
        ) {
            let refs: Vec<&[f32]> = vectors.iter().map(Vec::as_slice).collect();
            let first = select(&query, pool(&refs), k, lambda);
            let second = select(&query, pool(&refs), k, lambda);
            prop_assert_eq!(ids(&first), ids(&second));
        }

        #[test]
        fn prop_lambda_one_matches_stable_sort(
            vectors in arb_pool(),
            query in prop::collection::vec(-1.0f32..1.0, 4),
            k in 1usize..10,
        ) {
            let refs: Vec<&[f32]> = vectors.iter().map(Vec::as_slice).collect();
            let candidates = pool(&refs);

            let mut expected: Vec<(u32, f32)> = candidates
                .iter()
                .map(|c| (c.passage.id, cosine_similarity(&query, &c.vector)))
                .collect();
            expected.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
            let expected: Vec<u32> = expected.into_iter().take(k).map(|(id, _)| id).collect();

            let selected = select(&query, candidates, k, 1.0);
            prop_assert_eq!(ids(&selected), expected);
        }
    }
}
