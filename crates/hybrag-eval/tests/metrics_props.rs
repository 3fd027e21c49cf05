use std::sync::Arc;

use proptest::prelude::*;

use hybrag_core::types::{Chunk, SharedChunk};
use hybrag_eval::{mean_reciprocal_rank, GroundTruth};

fn list(sources: &[u8]) -> Vec<SharedChunk> {
    sources
        .iter()
        .enumerate()
        .map(|(i, s)| Arc::new(Chunk { chunk_id: format!("{s}-{i}"), source_id: format!("doc{s}"), title: String::new(), content: String::new(), token_count: 0 }))
        .collect()
}

proptest! {
    #[test]
    fn mrr_is_bounded_and_order_independent(cases in prop::collection::vec((0u8..6, prop::collection::vec(0u8..6, 0..8)), 1..12)) {
        let gts: Vec<GroundTruth> = cases.iter().map(|(gt, _)| GroundTruth::Document(format!("doc{gt}"))).collect();
        let results: Vec<Vec<SharedChunk>> = cases.iter().map(|(_, l)| list(l)).collect();
        let mrr = mean_reciprocal_rank(&gts, &results);
        prop_assert!((0.0..=1.0).contains(&mrr));

        let rev_gts: Vec<GroundTruth> = gts.iter().rev().cloned().collect();
        let rev_results: Vec<Vec<SharedChunk>> = results.iter().rev().cloned().collect();
        prop_assert!((mean_reciprocal_rank(&rev_gts, &rev_results) - mrr).abs() < 1e-12);
    }
}
