//! hybrag-eval
//!
//! Offline evaluation of the hybrid retriever: reciprocal-rank metrics,
//! strategy ablation, per-question error categorization, full RAG evaluation
//! runs and synthetic QA dataset generation.

pub mod ablation;
pub mod errors;
pub mod metrics;
pub mod qa;
pub mod runner;

pub use ablation::{default_configs, AblationConfig, AblationReport, AblationStudy, Strategy};
pub use errors::{categorize, Categorization, ErrorAnalyzer, ErrorCategory, ErrorReport};
pub use metrics::{document_rank, mean_reciprocal_rank, reciprocal_rank, GroundTruth, RougeL};
pub use qa::{is_quality_question, DiverseSampler, QaGenerator};
pub use runner::{EvaluationReport, EvaluationRunner};

use indicatif::{ProgressBar, ProgressStyle};

pub(crate) fn progress_bar(len: usize, label: &str) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::default_bar().template("{msg:>12} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} questions") {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb.set_message(label.to_string());
    pb
}
