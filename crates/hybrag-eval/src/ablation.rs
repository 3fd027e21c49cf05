use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use hybrag_core::corpus::write_json;
use hybrag_core::types::{QaRecord, SharedChunk};
use hybrag_core::{Error, Result};
use hybrag_hybrid::{FusionParams, HybridRetriever, RrfFusion};

use crate::metrics::{mean_reciprocal_rank, GroundTruth};

/// A restricted retrieval configuration under comparison.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Strategy {
    DenseOnly,
    SparseOnly,
    Fused { k_const: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AblationConfig {
    pub name: String,
    pub strategy: Strategy,
}

impl AblationConfig {
    pub fn new(name: impl Into<String>, strategy: Strategy) -> Self { Self { name: name.into(), strategy } }
}

/// `dense_only`, `sparse_only`, then one `hybrid_k{k}` per constant.
pub fn default_configs(k_values: &[f64]) -> Vec<AblationConfig> {
    let mut configs = vec![AblationConfig::new("dense_only", Strategy::DenseOnly), AblationConfig::new("sparse_only", Strategy::SparseOnly)];
    configs.extend(k_values.iter().map(|&k| AblationConfig::new(format!("hybrid_k{k}"), Strategy::Fused { k_const: k })));
    configs
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MethodResult {
    pub mrr: f64,
    pub n_evaluated: usize,
    pub n_failed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub name: String,
    pub mrr: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AblationAnalysis {
    pub best_method: String,
    pub best_mrr: f64,
    pub worst_method: String,
    pub worst_mrr: f64,
    /// `"dense"` when dense-only strictly beats sparse-only, else `"sparse"`.
    pub dense_vs_sparse: String,
    pub best_single_mrr: f64,
    pub best_fused_mrr: f64,
    /// 0 when the best single-source MRR is 0.
    pub hybrid_improvement_pct: f64,
    pub recommendation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AblationReport {
    pub timestamp: DateTime<Utc>,
    pub num_questions: usize,
    pub methods: BTreeMap<String, MethodResult>,
    /// Descending MRR, configuration order on ties.
    pub leaderboard: Vec<LeaderboardEntry>,
    pub analysis: Option<AblationAnalysis>,
}

/// Every arm is cut at the retriever's `final_n` so MRR is compared at one depth.
pub struct AblationStudy<'a> {
    retriever: &'a HybridRetriever,
}

impl<'a> AblationStudy<'a> {
    pub fn new(retriever: &'a HybridRetriever) -> Self { Self { retriever } }

    /// Runs every configuration over every question. A question whose
    /// retrieval fails is logged, counted in `n_failed` and left out of that
    /// configuration's MRR.
    pub fn run(&self, configs: &[AblationConfig], questions: &[QaRecord]) -> Result<AblationReport> {
        self.retriever.ensure_ready()?;
        let base = *self.retriever.fusion().params();
        let mut methods = BTreeMap::new();
        let mut order = Vec::with_capacity(configs.len());

        for config in configs {
            let fusion = match config.strategy {
                Strategy::Fused { k_const } => Some(RrfFusion::new(FusionParams { k_const, ..base })?),
                Strategy::DenseOnly | Strategy::SparseOnly => None,
            };
            if methods.contains_key(&config.name) {
                return Err(Error::InvalidConfig(format!("duplicate ablation config name: {}", config.name)));
            }

            let pb = crate::progress_bar(questions.len(), &config.name);
            let mut ground_truths = Vec::with_capacity(questions.len());
            let mut results = Vec::with_capacity(questions.len());
            let mut n_failed = 0usize;
            for record in questions {
                match self.retrieve(config.strategy, fusion.as_ref(), &record.question) {
                    Ok(chunks) => {
                        ground_truths.push(GroundTruth::from(record));
                        results.push(chunks);
                    }
                    Err(e) => {
                        tracing::warn!(method = %config.name, question = %record.question, error = %e, "retrieval failed; excluding question");
                        n_failed += 1;
                    }
                }
                pb.inc(1);
            }
            pb.finish_and_clear();

            let mrr = mean_reciprocal_rank(&ground_truths, &results);
            tracing::info!(method = %config.name, mrr, n_evaluated = results.len(), n_failed, "ablation method done");
            methods.insert(config.name.clone(), MethodResult { mrr, n_evaluated: results.len(), n_failed });
            order.push((config.name.clone(), config.strategy, mrr));
        }

        let mut leaderboard: Vec<LeaderboardEntry> = order.iter().map(|(name, _, mrr)| LeaderboardEntry { name: name.clone(), mrr: *mrr }).collect();
        leaderboard.sort_by(|a, b| b.mrr.total_cmp(&a.mrr));

        Ok(AblationReport { timestamp: Utc::now(), num_questions: questions.len(), methods, leaderboard, analysis: analyze(&order) })
    }

    fn retrieve(&self, strategy: Strategy, fusion: Option<&RrfFusion>, query: &str) -> Result<Vec<SharedChunk>> {
        let depth = self.retriever.final_n();
        let chunks = match (strategy, fusion) {
            (Strategy::DenseOnly, _) => self.retriever.dense_only(query, depth)?.into_iter().map(|r| r.chunk).collect(),
            (Strategy::SparseOnly, _) => self.retriever.sparse_only(query, depth)?.into_iter().map(|r| r.chunk).collect(),
            (Strategy::Fused { .. }, Some(fusion)) => self
                .retriever
                .fused_with(query, fusion, self.retriever.over_fetch_depth(), depth)?
                .into_iter()
                .map(|f| f.chunk)
                .collect(),
            (Strategy::Fused { .. }, None) => return Err(Error::Operation("fused strategy without a fusion engine".to_string())),
        };
        Ok(chunks)
    }
}

fn analyze(order: &[(String, Strategy, f64)]) -> Option<AblationAnalysis> {
    let (first_name, _, first_mrr) = order.first()?;
    let (mut best, mut worst) = ((first_name, *first_mrr), (first_name, *first_mrr));
    for (name, _, mrr) in order {
        if *mrr > best.1 { best = (name, *mrr); }
        if *mrr < worst.1 { worst = (name, *mrr); }
    }

    let best_of = |pred: fn(&Strategy) -> bool| order.iter().filter(|(_, s, _)| pred(s)).map(|(_, _, m)| *m).fold(0.0_f64, f64::max);
    let dense = best_of(|s| matches!(s, Strategy::DenseOnly));
    let sparse = best_of(|s| matches!(s, Strategy::SparseOnly));
    let best_single = dense.max(sparse);
    let best_fused = best_of(|s| matches!(s, Strategy::Fused { .. }));
    let improvement = if best_single > 0.0 { (best_fused - best_single) / best_single * 100.0 } else { 0.0 };

    Some(AblationAnalysis {
        best_method: best.0.clone(),
        best_mrr: best.1,
        worst_method: worst.0.clone(),
        worst_mrr: worst.1,
        dense_vs_sparse: if dense > sparse { "dense" } else { "sparse" }.to_string(),
        best_single_mrr: best_single,
        best_fused_mrr: best_fused,
        hybrid_improvement_pct: (improvement * 100.0).round() / 100.0,
        recommendation: format!("Use {} for optimal performance", best.0),
    })
}

pub fn save_report(path: &Path, report: &AblationReport) -> Result<()> {
    write_json(path, report)?;
    tracing::info!(path = %path.display(), "ablation report saved");
    Ok(())
}
