//! Per-question failure categorization and the aggregate error report.
//!
//! Categories are checked in precedence order: a retrieval miss wins over a
//! degraded rank, which wins over a short answer.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use hybrag_core::types::{QaRecord, SharedChunk};
use hybrag_core::Result;
use hybrag_hybrid::generate::truncate_chars;
use hybrag_hybrid::RagService;

use crate::metrics::document_order;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    RetrievalMiss,
    RankDegraded,
    LowAnswerQuality,
    Success,
}

impl ErrorCategory {
    pub const ALL: [Self; 4] = [Self::RetrievalMiss, Self::RankDegraded, Self::LowAnswerQuality, Self::Success];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::RetrievalMiss => "RETRIEVAL_MISS",
            Self::RankDegraded => "RANK_DEGRADED",
            Self::LowAnswerQuality => "LOW_ANSWER_QUALITY",
            Self::Success => "SUCCESS",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// The verdict for one question plus the data it was decided on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Categorization {
    pub category: ErrorCategory,
    pub reason: String,
    pub ground_truth: String,
    /// Retrieved source ids, collapsed to first occurrence per document.
    pub retrieved_sources: Vec<String>,
    /// Document-level rank of the ground truth, if retrieved.
    pub rank: Option<usize>,
}

pub fn categorize(ground_truth_source: &str, retrieved: &[SharedChunk], generated_answer: &str, min_answer_chars: usize) -> Categorization {
    let retrieved_sources: Vec<String> = document_order(retrieved).into_iter().map(str::to_string).collect();
    let rank = retrieved_sources.iter().position(|s| s == ground_truth_source).map(|i| i + 1);
    let (category, reason) = match rank {
        None => (ErrorCategory::RetrievalMiss, "Ground truth document not in top-K retrieved".to_string()),
        Some(r) if r > 1 => (ErrorCategory::RankDegraded, format!("Ground truth found at rank {r}, not #1")),
        Some(_) if generated_answer.trim().chars().count() < min_answer_chars => (ErrorCategory::LowAnswerQuality, "Generated answer too short".to_string()),
        Some(_) => (ErrorCategory::Success, "Correct retrieval and reasonable answer".to_string()),
    };
    Categorization { category, reason, ground_truth: ground_truth_source.to_string(), retrieved_sources, rank }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionResult {
    pub question_id: usize,
    pub question: String,
    pub question_type: String,
    pub generated_answer: String,
    #[serde(flatten)]
    pub categorization: Categorization,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CategoryStat {
    pub count: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorSummary {
    pub total_questions: usize,
    pub n_evaluated: usize,
    pub n_failed: usize,
    pub categories: BTreeMap<ErrorCategory, CategoryStat>,
    pub success_rate: f64,
    pub retrieval_accuracy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeBreakdown {
    pub error_count: usize,
    pub sample_errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReport {
    pub timestamp: DateTime<Utc>,
    pub summary: ErrorSummary,
    pub errors_by_question_type: BTreeMap<String, TypeBreakdown>,
    pub recommendations: Vec<String>,
    pub detailed_results: Vec<QuestionResult>,
}

const SAMPLE_ERRORS: usize = 3;

pub struct ErrorAnalyzer<'a> {
    rag: &'a RagService,
    min_answer_chars: usize,
}

impl<'a> ErrorAnalyzer<'a> {
    pub fn new(rag: &'a RagService, min_answer_chars: usize) -> Self { Self { rag, min_answer_chars } }

    /// Answers every question through the RAG service and categorizes it.
    /// Questions whose answering fails are counted, not fatal.
    pub fn analyze(&self, questions: &[QaRecord]) -> Result<ErrorReport> {
        self.rag.retriever().ensure_ready()?;
        let pb = crate::progress_bar(questions.len(), "errors");
        let mut results = Vec::with_capacity(questions.len());
        let mut n_failed = 0usize;
        for (question_id, record) in questions.iter().enumerate() {
            match self.rag.answer(&record.question) {
                Ok(answer) => {
                    let categorization = categorize(&record.source_id, &answer.retrieved, &answer.answer, self.min_answer_chars);
                    tracing::debug!(question_id, category = %categorization.category, "categorized");
                    results.push(QuestionResult {
                        question_id,
                        question: truncate_chars(&record.question, 100).to_string(),
                        question_type: record.question_type_or_unknown().to_string(),
                        generated_answer: truncate_chars(&answer.answer, 200).to_string(),
                        categorization,
                    });
                }
                Err(e) => {
                    tracing::warn!(question_id, error = %e, "answering failed; excluding question");
                    n_failed += 1;
                }
            }
            pb.inc(1);
        }
        pb.finish_and_clear();
        Ok(build_report(results, n_failed))
    }
}

/// Aggregates categorized questions. Percentages are over evaluated
/// questions and are 0 when nothing was evaluated.
pub fn build_report(mut results: Vec<QuestionResult>, n_failed: usize) -> ErrorReport {
    let evaluated = results.len();
    let mut counts: BTreeMap<ErrorCategory, usize> = ErrorCategory::ALL.iter().map(|c| (*c, 0)).collect();
    let mut by_type: BTreeMap<String, TypeBreakdown> = BTreeMap::new();
    for r in &results {
        *counts.entry(r.categorization.category).or_default() += 1;
        if r.categorization.category != ErrorCategory::Success {
            let entry = by_type.entry(r.question_type.clone()).or_insert_with(|| TypeBreakdown { error_count: 0, sample_errors: Vec::new() });
            entry.error_count += 1;
            if entry.sample_errors.len() < SAMPLE_ERRORS { entry.sample_errors.push(truncate_chars(&r.question, 50).to_string()); }
        }
    }

    let count = |c: ErrorCategory| counts.get(&c).copied().unwrap_or(0);
    let pct = |n: usize| if evaluated == 0 { 0.0 } else { round2(n as f64 / evaluated as f64 * 100.0) };
    let summary = ErrorSummary {
        total_questions: evaluated + n_failed,
        n_evaluated: evaluated,
        n_failed,
        categories: counts.iter().map(|(c, n)| (*c, CategoryStat { count: *n, percentage: pct(*n) })).collect(),
        success_rate: pct(count(ErrorCategory::Success)),
        retrieval_accuracy: pct(evaluated - count(ErrorCategory::RetrievalMiss)),
    };
    let recommendations = recommendations(&counts, evaluated);
    results.sort_by_key(|r| r.question_id);
    ErrorReport { timestamp: Utc::now(), summary, errors_by_question_type: by_type, recommendations, detailed_results: results }
}

fn recommendations(counts: &BTreeMap<ErrorCategory, usize>, evaluated: usize) -> Vec<String> {
    if evaluated == 0 { return vec!["No questions could be evaluated.".to_string()]; }
    let rate = |c: ErrorCategory| counts.get(&c).copied().unwrap_or(0) as f64 / evaluated as f64;
    let mut out = Vec::new();
    if rate(ErrorCategory::RetrievalMiss) > 0.3 {
        out.push("HIGH RETRIEVAL MISS RATE: Consider increasing top-K, improving embeddings, or adding query expansion".to_string());
    }
    if rate(ErrorCategory::RankDegraded) > 0.2 {
        out.push("RANK DEGRADATION: RRF weights may need tuning, or consider re-ranking model".to_string());
    }
    if rate(ErrorCategory::LowAnswerQuality) > 0.1 {
        out.push("ANSWER QUALITY: Consider using larger LLM or improving prompt engineering".to_string());
    }
    if out.is_empty() { out.push("System performing well. Consider edge case testing.".to_string()); }
    out
}

fn round2(x: f64) -> f64 { (x * 100.0).round() / 100.0 }
