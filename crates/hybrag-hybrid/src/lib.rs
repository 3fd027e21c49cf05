//! hybrag-hybrid
//!
//! Reciprocal-rank fusion of the dense and sparse rank sources, the hybrid
//! retrieval orchestrator built on it, and the answer-construction layer
//! (generation strategies and the RAG service).

pub mod engine;
pub mod fusion;
pub mod generate;
pub mod rag;

pub use engine::{DetailedHit, DetailedRetrieval, HybridRetriever, StageTiming};
pub use fusion::{FusionParams, RrfFusion};
pub use generate::{build_context, ExtractiveGenerator, GenerationStrategy};
pub use rag::{Answer, DetailedAnswer, RagService};
