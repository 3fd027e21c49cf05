use crate::error::Result;
use crate::types::{Ranked, SourceKind};

/// A rank source: `query -> ordered list of (chunk, raw_score)`.
///
/// Implementations return at most `k` results sorted by score descending,
/// so that the 1-based rank of an entry equals its position. Searching
/// before the index is built must fail with `Error::IndexNotReady`.
pub trait Ranker: Send + Sync {
    fn kind(&self) -> SourceKind;
    fn is_ready(&self) -> bool;
    fn search(&self, query: &str, k: usize) -> Result<Vec<Ranked>>;
}

pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Decoding parameters a generation backend should honour.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub max_new_tokens: usize,
    pub num_beams: usize,
    pub early_stopping: bool,
    pub do_sample: bool,
    pub top_k: Option<usize>,
    pub top_p: Option<f32>,
}

impl GenerationParams {
    pub fn with_max_new_tokens(mut self, max_new_tokens: usize) -> Self {
        self.max_new_tokens = max_new_tokens;
        self
    }
}

pub trait Generator: Send + Sync {
    fn generate(&self, prompt: &str, params: &GenerationParams) -> anyhow::Result<String>;
}

/// Text similarity between a reference and a hypothesis, in `[0, 1]`.
pub trait SimilarityScorer: Send + Sync {
    fn name(&self) -> &str;
    fn score(&self, reference: &str, hypothesis: &str) -> f64;
}
