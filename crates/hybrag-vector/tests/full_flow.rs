use std::sync::Arc;

use hybrag_core::traits::{Embedder, Ranker};
use hybrag_core::types::{Chunk, SharedChunk, SourceKind};
use hybrag_core::Error;
use hybrag_vector::{FlatVectorIndex, HashingEmbedder};

fn chunk(id: &str, content: &str) -> SharedChunk {
    Arc::new(Chunk { chunk_id: id.to_string(), source_id: format!("doc-{id}"), title: id.to_string(), content: content.to_string(), token_count: content.split_whitespace().count() })
}

fn corpus() -> Vec<SharedChunk> {
    vec![
        chunk("stoic", "stoicism virtue reason nature philosophy"),
        chunk("bread", "sourdough bread flour water starter"),
        chunk("net", "packet routing tcp networking"),
    ]
}

#[test]
fn search_before_build_is_not_ready() {
    let index = FlatVectorIndex::new(Box::new(HashingEmbedder::default()));
    assert!(!index.is_ready());
    assert!(matches!(index.search("anything", 3), Err(Error::IndexNotReady(SourceKind::Dense))));
}

#[test]
fn nearest_chunk_ranks_first_and_scores_descend() {
    let mut index = FlatVectorIndex::new(Box::new(HashingEmbedder::default()));
    index.build(&corpus()).expect("build");
    assert_eq!(index.len(), 3);
    let hits = index.search("Stoicism philosophy of virtue", 3).expect("search");
    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0].chunk.chunk_id, "stoic");
    assert!(hits[0].score > 0.3);
    for pair in hits.windows(2) { assert!(pair[0].score >= pair[1].score); }
    assert!(index.search("bread", 0).expect("k=0").is_empty());
    assert_eq!(index.search("bread", 1).expect("k=1").len(), 1);
}

#[test]
fn build_is_one_shot() {
    let mut index = FlatVectorIndex::new(Box::new(HashingEmbedder::new(16)));
    index.build(&corpus()).expect("build");
    assert!(index.build(&corpus()).is_err());
}

struct WrongDim;
impl Embedder for WrongDim {
    fn dim(&self) -> usize { 8 }
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> { Ok(texts.iter().map(|_| vec![1.0; 4]).collect()) }
}

#[test]
fn dimension_mismatch_is_reported() {
    let mut index = FlatVectorIndex::new(Box::new(WrongDim));
    assert!(matches!(index.build(&corpus()), Err(Error::Operation(_))));
}
