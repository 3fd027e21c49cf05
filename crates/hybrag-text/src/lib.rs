//! hybrag-text
//!
//! Sparse rank source: a Tantivy BM25 index over the chunk corpus,
//! exposed through the `Ranker` trait.

pub mod index;
pub mod tantivy_utils;

pub use index::TantivyRanker;
