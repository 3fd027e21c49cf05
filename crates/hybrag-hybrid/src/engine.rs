use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use hybrag_core::config::RetrievalSettings;
use hybrag_core::traits::Ranker;
use hybrag_core::types::{Fused, Ranked, SharedChunk};
use hybrag_core::{Error, Result};

use crate::fusion::{FusionParams, RrfFusion};

/// Hybrid retrieval orchestrator: queries both rank sources with an
/// over-fetch depth and fuses them into the final top-N.
///
/// Both rankers must be built before they are handed over; every call
/// checks readiness first and fails with `Error::IndexNotReady` instead of
/// returning a one-sided ranking.
pub struct HybridRetriever {
    dense: Arc<dyn Ranker>,
    sparse: Arc<dyn Ranker>,
    fusion: RrfFusion,
    over_fetch_depth: usize,
    final_n: usize,
}

/// Per-stage latency in milliseconds. In the concurrent variant `total_ms`
/// is wall-clock time, which is less than the sum of the stages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StageTiming {
    pub dense_ms: f64,
    pub sparse_ms: f64,
    pub fusion_ms: f64,
    pub total_ms: f64,
}

/// A fused hit with its per-source breakdown. A `None` score or rank means
/// the chunk was not retrieved by that source at all, which is distinct from
/// a source scoring it zero.
#[derive(Debug, Clone, Serialize)]
pub struct DetailedHit {
    pub chunk: SharedChunk,
    pub rrf_score: f64,
    pub dense_score: Option<f32>,
    pub dense_rank: Option<usize>,
    pub sparse_score: Option<f32>,
    pub sparse_rank: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DetailedRetrieval {
    pub query: String,
    pub hits: Vec<DetailedHit>,
    pub dense_candidates: usize,
    pub sparse_candidates: usize,
    pub timing: StageTiming,
}

impl HybridRetriever {
    pub fn new(dense: Arc<dyn Ranker>, sparse: Arc<dyn Ranker>, settings: &RetrievalSettings) -> Result<Self> {
        settings.validate()?;
        let fusion = RrfFusion::new(FusionParams::from(settings))?;
        Ok(Self { dense, sparse, fusion, over_fetch_depth: settings.over_fetch_depth, final_n: settings.final_n })
    }

    pub fn fusion(&self) -> &RrfFusion { &self.fusion }

    pub fn final_n(&self) -> usize { self.final_n }

    pub fn over_fetch_depth(&self) -> usize { self.over_fetch_depth }

    pub fn ensure_ready(&self) -> Result<()> {
        for ranker in [&self.dense, &self.sparse] {
            if !ranker.is_ready() { return Err(Error::IndexNotReady(ranker.kind())); }
        }
        Ok(())
    }

    pub fn retrieve(&self, query: &str) -> Result<Vec<Fused>> { self.retrieve_n(query, self.over_fetch_depth, self.final_n) }

    pub fn retrieve_n(&self, query: &str, over_fetch_depth: usize, final_n: usize) -> Result<Vec<Fused>> { self.fused_with(query, &self.fusion, over_fetch_depth, final_n) }

    /// Fuses with an explicit engine, e.g. a different `k_const` for ablation.
    pub fn fused_with(&self, query: &str, fusion: &RrfFusion, over_fetch_depth: usize, final_n: usize) -> Result<Vec<Fused>> {
        self.ensure_ready()?;
        let dense = self.dense.search(query, over_fetch_depth)?;
        let sparse = self.sparse.search(query, over_fetch_depth)?;
        let fused = fusion.fuse(&dense, &sparse, Some(final_n));
        tracing::debug!(query, dense = dense.len(), sparse = sparse.len(), fused = fused.len(), "hybrid retrieval");
        Ok(fused)
    }

    pub fn dense_only(&self, query: &str, k: usize) -> Result<Vec<Ranked>> { self.dense.search(query, k) }

    pub fn sparse_only(&self, query: &str, k: usize) -> Result<Vec<Ranked>> { self.sparse.search(query, k) }

    /// Sequential retrieval with per-source scores and per-stage latency.
    pub fn retrieve_detailed(&self, query: &str) -> Result<DetailedRetrieval> {
        self.ensure_ready()?;
        let start = Instant::now();
        let t = Instant::now();
        let dense = self.dense.search(query, self.over_fetch_depth)?;
        let dense_ms = elapsed_ms(t);
        let t = Instant::now();
        let sparse = self.sparse.search(query, self.over_fetch_depth)?;
        let sparse_ms = elapsed_ms(t);
        Ok(self.assemble(query, &dense, &sparse, dense_ms, sparse_ms, start))
    }

    /// Same as [`Self::retrieve_detailed`] but runs both rankers in parallel
    /// on tokio's blocking pool.
    pub async fn retrieve_detailed_concurrent(&self, query: &str) -> Result<DetailedRetrieval> {
        self.ensure_ready()?;
        let start = Instant::now();
        let (dense, sparse) = tokio::join!(
            timed_search(Arc::clone(&self.dense), query.to_string(), self.over_fetch_depth),
            timed_search(Arc::clone(&self.sparse), query.to_string(), self.over_fetch_depth),
        );
        let (dense, dense_ms) = dense?;
        let (sparse, sparse_ms) = sparse?;
        Ok(self.assemble(query, &dense, &sparse, dense_ms, sparse_ms, start))
    }

    fn assemble(&self, query: &str, dense: &[Ranked], sparse: &[Ranked], dense_ms: f64, sparse_ms: f64, start: Instant) -> DetailedRetrieval {
        let t = Instant::now();
        let fused = self.fusion.fuse(dense, sparse, Some(self.final_n));
        let fusion_ms = elapsed_ms(t);

        let dense_lookup = rank_lookup(dense);
        let sparse_lookup = rank_lookup(sparse);
        let hits = fused
            .into_iter()
            .map(|f| {
                let d = dense_lookup.get(f.chunk.chunk_id.as_str()).copied();
                let s = sparse_lookup.get(f.chunk.chunk_id.as_str()).copied();
                DetailedHit {
                    rrf_score: f.score,
                    dense_rank: d.map(|(rank, _)| rank),
                    dense_score: d.map(|(_, score)| score),
                    sparse_rank: s.map(|(rank, _)| rank),
                    sparse_score: s.map(|(_, score)| score),
                    chunk: f.chunk,
                }
            })
            .collect();
        let timing = StageTiming { dense_ms, sparse_ms, fusion_ms, total_ms: elapsed_ms(start) };
        tracing::debug!(query, ?timing, "detailed retrieval");
        DetailedRetrieval { query: query.to_string(), hits, dense_candidates: dense.len(), sparse_candidates: sparse.len(), timing }
    }
}

async fn timed_search(ranker: Arc<dyn Ranker>, query: String, k: usize) -> Result<(Vec<Ranked>, f64)> {
    tokio::task::spawn_blocking(move || -> Result<(Vec<Ranked>, f64)> {
        let t = Instant::now();
        let hits = ranker.search(&query, k)?;
        Ok((hits, elapsed_ms(t)))
    })
    .await
    .map_err(|e| Error::Operation(format!("ranker task failed: {e}")))?
}

/// chunk_id -> (1-based rank, raw score), first occurrence wins.
fn rank_lookup(hits: &[Ranked]) -> HashMap<&str, (usize, f32)> {
    let mut lookup = HashMap::with_capacity(hits.len());
    for (idx, h) in hits.iter().enumerate() { lookup.entry(h.chunk.chunk_id.as_str()).or_insert((idx + 1, h.score)); }
    lookup
}

fn elapsed_ms(t: Instant) -> f64 { t.elapsed().as_secs_f64() * 1000.0 }
