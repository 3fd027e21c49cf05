//! Weighted Reciprocal Rank Fusion with a rank-preservation rule.
//!
//! ```text
//! fused(c) = w_dense / (k + rank_dense(c)) + w_sparse / (k + rank_sparse(c))
//! ```
//!
//! Ranks are 1-based positions in each input list; a term is omitted when the
//! chunk is absent from that list. Because only ranks are used, the rankers'
//! raw scores (cosine vs. BM25) never need to be normalized against each other.
//! Small `k` favours rank-1 dominance, large `k` flattens the curve.
//!
//! After sorting, the top `preserve_top_dense` dense hits are moved to the
//! front in dense-rank order, so the strongest semantic match is never pushed
//! out by a fusion tie or a breadth-favouring `k`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use hybrag_core::config::RetrievalSettings;
use hybrag_core::types::{Fused, Ranked, SharedChunk};
use hybrag_core::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionParams {
    pub k_const: f64,
    pub weight_dense: f64,
    pub weight_sparse: f64,
    pub preserve_top_dense: usize,
}

impl Default for FusionParams {
    fn default() -> Self { Self { k_const: 60.0, weight_dense: 1.0, weight_sparse: 1.0, preserve_top_dense: 1 } }
}

impl From<&RetrievalSettings> for FusionParams {
    fn from(s: &RetrievalSettings) -> Self {
        Self { k_const: s.rrf_k, weight_dense: s.weight_dense, weight_sparse: s.weight_sparse, preserve_top_dense: s.preserve_top_dense }
    }
}

#[derive(Debug, Clone)]
pub struct RrfFusion {
    params: FusionParams,
}

impl RrfFusion {
    /// Rejects `k_const <= 0` and negative or non-finite weights.
    pub fn new(params: FusionParams) -> Result<Self> {
        if !(params.k_const.is_finite() && params.k_const > 0.0) {
            tracing::error!(k_const = params.k_const, "rejecting RRF constant");
            return Err(Error::InvalidConfig(format!("RRF k_const must be > 0, got {}", params.k_const)));
        }
        for (name, w) in [("weight_dense", params.weight_dense), ("weight_sparse", params.weight_sparse)] {
            if !(w.is_finite() && w >= 0.0) {
                tracing::error!(weight = w, name, "rejecting RRF weight");
                return Err(Error::InvalidConfig(format!("RRF {name} must be a non-negative number, got {w}")));
            }
        }
        Ok(Self { params })
    }

    /// Equal weights, dense rank-1 preserved.
    pub fn with_k(k_const: f64) -> Result<Self> { Self::new(FusionParams { k_const, ..FusionParams::default() }) }

    pub fn params(&self) -> &FusionParams { &self.params }

    pub fn fuse(&self, dense: &[Ranked], sparse: &[Ranked], top_n: Option<usize>) -> Vec<Fused> {
        let FusionParams { k_const, weight_dense, weight_sparse, preserve_top_dense } = self.params;

        // Insertion order (dense first, then sparse) is the deterministic tie-break.
        let mut entries: Vec<(SharedChunk, f64)> = Vec::with_capacity(dense.len() + sparse.len());
        let mut slot: HashMap<&str, usize> = HashMap::with_capacity(dense.len() + sparse.len());
        for (list, weight) in [(dense, weight_dense), (sparse, weight_sparse)] {
            let mut seen: HashSet<&str> = HashSet::with_capacity(list.len());
            for (idx, hit) in list.iter().enumerate() {
                let id = hit.chunk.chunk_id.as_str();
                if !seen.insert(id) { continue; }
                let contribution = weight / (k_const + (idx + 1) as f64);
                match slot.get(id) {
                    Some(&i) => entries[i].1 += contribution,
                    None => {
                        slot.insert(id, entries.len());
                        entries.push((Arc::clone(&hit.chunk), contribution));
                    }
                }
            }
        }

        let mut order: Vec<usize> = (0..entries.len()).collect();
        order.sort_by(|&a, &b| entries[b].1.total_cmp(&entries[a].1).then(a.cmp(&b)));

        let mut preserved: Vec<usize> = Vec::with_capacity(preserve_top_dense);
        for hit in dense {
            if preserved.len() >= preserve_top_dense { break; }
            if let Some(&i) = slot.get(hit.chunk.chunk_id.as_str()) {
                if !preserved.contains(&i) { preserved.push(i); }
            }
        }

        let limit = top_n.unwrap_or(usize::MAX);
        preserved
            .iter()
            .copied()
            .chain(order.into_iter().filter(|i| !preserved.contains(i)))
            .take(limit)
            .map(|i| Fused { chunk: Arc::clone(&entries[i].0), score: entries[i].1 })
            .collect()
    }
}
