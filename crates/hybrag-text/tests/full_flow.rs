use std::sync::Arc;

use hybrag_core::traits::Ranker;
use hybrag_core::types::{Chunk, SharedChunk, SourceKind};
use hybrag_core::Error;
use hybrag_text::TantivyRanker;

fn chunk(id: &str, source: &str, content: &str) -> SharedChunk {
    Arc::new(Chunk {
        chunk_id: id.to_string(),
        source_id: source.to_string(),
        title: source.to_string(),
        content: content.to_string(),
        token_count: content.split_whitespace().count(),
    })
}

fn corpus() -> Vec<SharedChunk> {
    vec![
        chunk("c1", "fire", "Firecraft basics: building a fire with flint and dry tinder. Fire needs oxygen."),
        chunk("c2", "water", "Purifying water by boiling kills most pathogens in drinking water."),
        chunk("c3", "net", "Computer networking connects computers over cables and radio links."),
        chunk("c4", "fire", "Keeping a campfire burning overnight requires dense hardwood logs."),
    ]
}

#[test]
fn search_before_build_is_not_ready() {
    let ranker = TantivyRanker::in_ram().expect("ranker");
    assert!(!ranker.is_ready());
    let err = ranker.search("fire", 5).unwrap_err();
    assert!(matches!(err, Error::IndexNotReady(SourceKind::Sparse)));
}

#[test]
fn tantivy_full_flow() {
    let mut ranker = TantivyRanker::in_ram().expect("ranker");
    ranker.build(&corpus()).expect("build");
    assert!(ranker.is_ready());
    assert_eq!(ranker.kind(), SourceKind::Sparse);

    let hits = ranker.search("How do I build a fire?", 10).expect("search");
    assert!(!hits.is_empty());
    assert_eq!(hits[0].chunk.chunk_id, "c1", "most fire mentions ranks first");
    for pair in hits.windows(2) { assert!(pair[0].score >= pair[1].score); }
    assert!(hits.iter().all(|h| h.score > 0.0));
    assert!(hits.iter().all(|h| h.chunk.chunk_id != "c3"));

    // stemming: "computers" matches "computer"
    let net = ranker.search("computer", 10).expect("search");
    assert_eq!(net.first().map(|h| h.chunk.chunk_id.as_str()), Some("c3"));
}

#[test]
fn unmatched_and_zero_k_queries_are_empty() {
    let mut ranker = TantivyRanker::in_ram().expect("ranker");
    ranker.build(&corpus()).expect("build");
    assert!(ranker.search("quantum chromodynamics", 10).expect("search").is_empty());
    assert!(ranker.search("the of and", 10).expect("stopwords only").is_empty());
    assert!(ranker.search("fire", 0).expect("k=0").is_empty());
    assert_eq!(ranker.search("fire", 1).expect("k=1").len(), 1);
}

#[test]
fn punctuation_does_not_fail_queries() {
    let mut ranker = TantivyRanker::in_ram().expect("ranker");
    ranker.build(&corpus()).expect("build");
    let hits = ranker.search("What's boiling water for? (purify!)", 5).expect("lenient parse");
    assert_eq!(hits.first().map(|h| h.chunk.chunk_id.as_str()), Some("c2"));
}

#[test]
fn build_is_one_shot_and_on_disk_works() {
    let tmp = tempfile::tempdir().expect("tmp");
    let mut ranker = TantivyRanker::in_dir(tmp.path().join("tantivy")).expect("ranker");
    ranker.build(&corpus()).expect("build");
    assert!(ranker.build(&corpus()).is_err());
    assert!(!ranker.search("campfire", 3).expect("search").is_empty());
}
