//! hybrag-vector
//!
//! Dense rank source: an exact (flat) inner-product index over L2-normalized
//! chunk embeddings, plus the offline hashing embedder used when no neural
//! model is wired in.

pub mod embed;
pub mod flat;

pub use embed::{l2_normalize, HashingEmbedder};
pub use flat::FlatVectorIndex;
