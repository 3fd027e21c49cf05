//! Domain types shared by the rankers, the fusion engine and evaluation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub type ChunkId = String;

/// A bounded slice of a source document, the atomic unit of retrieval.
///
/// - `chunk_id`: unique within one corpus build
/// - `source_id`: originating document (canonical URL or relative path),
///   used for document-level rank collapsing
/// - `title`: display label of the source document
/// - `content`: the text payload of the chunk
/// - `token_count`: whitespace-delimited tokens in `content`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: ChunkId,
    #[serde(alias = "url")]
    pub source_id: String,
    pub title: String,
    pub content: String,
    pub token_count: usize,
}

/// The corpus is read-only after the build step, so chunks are shared by
/// reference between both rankers and the evaluation code.
pub type SharedChunk = Arc<Chunk>;

/// Metadata handed to the Chunker alongside the document text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMeta {
    pub source_id: String,
    pub title: String,
}

impl DocumentMeta {
    pub fn new(source_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self { source_id: source_id.into(), title: title.into() }
    }
}

/// Indicates which ranker produced a result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Dense,
    Sparse,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dense => f.write_str("dense"),
            Self::Sparse => f.write_str("sparse"),
        }
    }
}

/// One entry of a single ranker's output. `score` is ranker-specific
/// (cosine similarity, BM25, ...) and not comparable across rankers.
#[derive(Debug, Clone)]
pub struct Ranked {
    pub chunk: SharedChunk,
    pub score: f32,
}

impl Ranked {
    pub fn new(chunk: SharedChunk, score: f32) -> Self { Self { chunk, score } }
}

/// One entry of the fused ranking. `score` is comparable across all fused chunks.
#[derive(Debug, Clone)]
pub struct Fused {
    pub chunk: SharedChunk,
    pub score: f64,
}

/// Evaluation ground truth, generated once from the corpus and read-only after.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaRecord {
    pub question: String,
    #[serde(alias = "answer", default)]
    pub reference_answer: String,
    pub chunk_id: ChunkId,
    #[serde(alias = "url")]
    pub source_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub ground_truth_context: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_type: Option<String>,
}

impl QaRecord {
    pub fn question_type_or_unknown(&self) -> &str { self.question_type.as_deref().unwrap_or("unknown") }
}
