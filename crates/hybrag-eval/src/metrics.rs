//! Reciprocal-rank metrics and similarity-score aggregation.
//!
//! Ranking quality is judged at the document level by default: a QA record
//! names the document its question came from, and any chunk of that document
//! counts as a hit. The ranked chunk list is collapsed to one entry per
//! document (first occurrence) before the rank is read off.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use hybrag_core::traits::SimilarityScorer;
use hybrag_core::types::{QaRecord, SharedChunk};

/// What a ranked list is matched against.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "level", content = "id", rename_all = "snake_case")]
pub enum GroundTruth {
    Document(String),
    Chunk(String),
}

impl GroundTruth {
    pub fn id(&self) -> &str {
        match self {
            Self::Document(id) | Self::Chunk(id) => id,
        }
    }

    /// 1-based rank of the first match in `chunks`, or `None`.
    pub fn rank_in(&self, chunks: &[SharedChunk]) -> Option<usize> {
        match self {
            Self::Document(source_id) => document_rank(source_id, chunks),
            Self::Chunk(chunk_id) => chunks.iter().position(|c| &c.chunk_id == chunk_id).map(|i| i + 1),
        }
    }
}

impl From<&QaRecord> for GroundTruth {
    fn from(record: &QaRecord) -> Self { Self::Document(record.source_id.clone()) }
}

/// Source ids of `chunks` in first-occurrence order.
pub fn document_order(chunks: &[SharedChunk]) -> Vec<&str> {
    let mut seen = HashSet::with_capacity(chunks.len());
    chunks.iter().map(|c| c.source_id.as_str()).filter(|s| seen.insert(*s)).collect()
}

pub fn document_rank(source_id: &str, chunks: &[SharedChunk]) -> Option<usize> {
    document_order(chunks).iter().position(|s| *s == source_id).map(|i| i + 1)
}

pub fn reciprocal_rank(ground_truth: &GroundTruth, chunks: &[SharedChunk]) -> f64 {
    ground_truth.rank_in(chunks).map_or(0.0, |rank| 1.0 / rank as f64)
}

/// Mean over queries; a query with no match contributes 0. Ground truths
/// without a matching result list count as misses. Zero queries yield 0.
pub fn mean_reciprocal_rank(ground_truths: &[GroundTruth], results: &[Vec<SharedChunk>]) -> f64 {
    if ground_truths.is_empty() { return 0.0; }
    if ground_truths.len() != results.len() {
        tracing::warn!(ground_truths = ground_truths.len(), results = results.len(), "MRR inputs differ in length");
    }
    let sum: f64 = ground_truths.iter().zip(results).map(|(gt, chunks)| reciprocal_rank(gt, chunks)).sum();
    sum / ground_truths.len() as f64
}

pub fn score_each(scorer: &dyn SimilarityScorer, references: &[String], hypotheses: &[String]) -> Vec<f64> {
    references.iter().zip(hypotheses).map(|(r, h)| scorer.score(r, h)).collect()
}

/// Mean of per-question scores; zero when nothing was scored.
pub fn mean_score(scores: &[f64]) -> f64 {
    if scores.is_empty() { 0.0 } else { scores.iter().sum::<f64>() / scores.len() as f64 }
}

/// ROUGE-L F-measure over lower-cased alphanumeric word tokens.
#[derive(Debug, Clone, Copy, Default)]
pub struct RougeL;

impl SimilarityScorer for RougeL {
    fn name(&self) -> &str { "rouge_l" }

    fn score(&self, reference: &str, hypothesis: &str) -> f64 {
        let r = words(reference);
        let h = words(hypothesis);
        if r.is_empty() || h.is_empty() { return 0.0; }
        let lcs = lcs_len(&r, &h) as f64;
        if lcs == 0.0 { return 0.0; }
        let precision = lcs / h.len() as f64;
        let recall = lcs / r.len() as f64;
        2.0 * precision * recall / (precision + recall)
    }
}

fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()).map(str::to_lowercase).collect()
}

fn lcs_len(a: &[String], b: &[String]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut cur = vec![0usize; b.len() + 1];
    for x in a {
        for (j, y) in b.iter().enumerate() {
            cur[j + 1] = if x == y { prev[j] + 1 } else { cur[j].max(prev[j + 1]) };
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rouge_l_identical_and_disjoint() {
        assert!((RougeL.score("The cat sat", "the cat sat") - 1.0).abs() < 1e-12);
        assert_eq!(RougeL.score("alpha beta", "gamma delta"), 0.0);
        assert_eq!(RougeL.score("", "anything"), 0.0);
    }

    #[test]
    fn rouge_l_partial_overlap() {
        // LCS = "police killed gunman" (3); P = 3/4, R = 3/4
        let s = RougeL.score("police killed the gunman", "police kill killed gunman");
        assert!((s - 0.75).abs() < 1e-12, "{s}");
    }

    #[test]
    fn scores_align_with_pairs_and_average() {
        let refs = vec!["the cat sat".to_string(), "alpha beta".to_string()];
        let hyps = vec!["the cat sat".to_string(), "gamma delta".to_string()];
        let scores = score_each(&RougeL, &refs, &hyps);
        assert_eq!(scores.len(), 2);
        assert!((scores[0] - 1.0).abs() < 1e-12);
        assert_eq!(scores[1], 0.0);
        assert!((mean_score(&scores) - 0.5).abs() < 1e-12);
        assert_eq!(mean_score(&[]), 0.0);
    }
}
