use std::sync::Arc;

use hybrag_core::config::{GenerationSettings, RetrievalSettings, StrategyKind};
use hybrag_core::traits::{GenerationParams, Generator, Ranker};
use hybrag_core::types::{Chunk, Ranked, SharedChunk, SourceKind};
use hybrag_core::{Error, Result};
use hybrag_hybrid::{ExtractiveGenerator, HybridRetriever, RagService, RrfFusion};
use hybrag_text::TantivyRanker;
use hybrag_vector::{FlatVectorIndex, HashingEmbedder};

fn chunk(id: &str, source: &str, content: &str) -> SharedChunk {
    Arc::new(Chunk { chunk_id: id.to_string(), source_id: source.to_string(), title: source.to_string(), content: content.to_string(), token_count: content.split_whitespace().count() })
}

/// Fixed ranking regardless of the query.
struct StaticRanker {
    kind: SourceKind,
    ready: bool,
    hits: Vec<Ranked>,
}

impl StaticRanker {
    fn new(kind: SourceKind, hits: Vec<(&str, f32)>) -> Arc<Self> {
        Arc::new(Self { kind, ready: true, hits: hits.into_iter().map(|(id, s)| Ranked::new(chunk(id, id, id), s)).collect() })
    }

    fn not_ready(kind: SourceKind) -> Arc<Self> { Arc::new(Self { kind, ready: false, hits: Vec::new() }) }
}

impl Ranker for StaticRanker {
    fn kind(&self) -> SourceKind { self.kind }
    fn is_ready(&self) -> bool { self.ready }
    fn search(&self, _query: &str, k: usize) -> Result<Vec<Ranked>> {
        if !self.ready { return Err(Error::IndexNotReady(self.kind)); }
        Ok(self.hits.iter().take(k).cloned().collect())
    }
}

fn ids<'a>(chunks: impl IntoIterator<Item = &'a SharedChunk>) -> Vec<&'a str> { chunks.into_iter().map(|c| c.chunk_id.as_str()).collect() }

fn abc_retriever() -> HybridRetriever {
    let dense = StaticRanker::new(SourceKind::Dense, vec![("A", 0.9), ("B", 0.8)]);
    let sparse = StaticRanker::new(SourceKind::Sparse, vec![("B", 10.0), ("C", 5.0)]);
    HybridRetriever::new(dense, sparse, &RetrievalSettings::default()).expect("retriever")
}

#[test]
fn fused_ranking_preserves_dense_rank_one() {
    let retriever = abc_retriever();
    let fused = retriever.retrieve("anything").expect("retrieve");
    assert_eq!(ids(fused.iter().map(|f| &f.chunk)), vec!["A", "B", "C"]);
    assert!((fused[1].score - (1.0 / 62.0 + 1.0 / 61.0)).abs() < 1e-12);
}

#[test]
fn unready_source_fails_instead_of_degrading() {
    let ready = StaticRanker::new(SourceKind::Sparse, vec![("B", 1.0)]);
    let retriever = HybridRetriever::new(StaticRanker::not_ready(SourceKind::Dense), ready, &RetrievalSettings::default()).expect("retriever");
    let err = retriever.retrieve("q").expect_err("not ready");
    assert!(err.is_not_ready());
    assert!(matches!(err, Error::IndexNotReady(SourceKind::Dense)));
    assert!(matches!(retriever.retrieve_detailed("q"), Err(Error::IndexNotReady(SourceKind::Dense))));

    let dense = StaticRanker::new(SourceKind::Dense, vec![("A", 1.0)]);
    let retriever = HybridRetriever::new(dense, StaticRanker::not_ready(SourceKind::Sparse), &RetrievalSettings::default()).expect("retriever");
    assert!(matches!(retriever.retrieve("q"), Err(Error::IndexNotReady(SourceKind::Sparse))));
}

#[test]
fn empty_sources_give_empty_result() {
    let retriever = HybridRetriever::new(StaticRanker::new(SourceKind::Dense, vec![]), StaticRanker::new(SourceKind::Sparse, vec![]), &RetrievalSettings::default()).expect("retriever");
    assert!(retriever.retrieve("nothing matches").expect("retrieve").is_empty());
}

#[test]
fn invalid_settings_are_rejected() {
    let settings = RetrievalSettings { rrf_k: 0.0, ..RetrievalSettings::default() };
    let res = HybridRetriever::new(StaticRanker::new(SourceKind::Dense, vec![]), StaticRanker::new(SourceKind::Sparse, vec![]), &settings);
    assert!(matches!(res, Err(Error::InvalidConfig(_))));
}

#[test]
fn detailed_retrieval_distinguishes_absent_from_zero() {
    let dense = StaticRanker::new(SourceKind::Dense, vec![("A", 0.9), ("Z", 0.0)]);
    let sparse = StaticRanker::new(SourceKind::Sparse, vec![("B", 10.0), ("C", 5.0)]);
    let retriever = HybridRetriever::new(dense, sparse, &RetrievalSettings::default()).expect("retriever");
    let detailed = retriever.retrieve_detailed("q").expect("detailed");
    assert_eq!(detailed.dense_candidates, 2);
    assert_eq!(detailed.sparse_candidates, 2);
    let a = detailed.hits.iter().find(|h| h.chunk.chunk_id == "A").expect("A");
    assert_eq!(a.dense_rank, Some(1));
    assert_eq!(a.sparse_score, None);
    let z = detailed.hits.iter().find(|h| h.chunk.chunk_id == "Z").expect("Z");
    assert_eq!(z.dense_score, Some(0.0));
    assert_eq!(z.dense_rank, Some(2));
    let c = detailed.hits.iter().find(|h| h.chunk.chunk_id == "C").expect("C");
    assert_eq!(c.sparse_rank, Some(2));
    assert_eq!(c.dense_rank, None);
    assert!(detailed.timing.total_ms >= detailed.timing.fusion_ms);
}

#[tokio::test]
async fn concurrent_detailed_matches_sequential() {
    let retriever = abc_retriever();
    let sequential = retriever.retrieve_detailed("q").expect("sequential");
    let concurrent = retriever.retrieve_detailed_concurrent("q").await.expect("concurrent");
    let seq: Vec<_> = sequential.hits.iter().map(|h| (h.chunk.chunk_id.clone(), h.rrf_score)).collect();
    let con: Vec<_> = concurrent.hits.iter().map(|h| (h.chunk.chunk_id.clone(), h.rrf_score)).collect();
    assert_eq!(seq, con);
    assert!(concurrent.timing.total_ms >= 0.0);
}

#[test]
fn single_source_and_custom_fusion_paths() {
    let retriever = abc_retriever();
    assert_eq!(ids(retriever.dense_only("q", 1).expect("dense").iter().map(|r| &r.chunk)), vec!["A"]);
    assert_eq!(ids(retriever.sparse_only("q", 5).expect("sparse").iter().map(|r| &r.chunk)), vec!["B", "C"]);
    let k30 = RrfFusion::with_k(30.0).expect("fusion");
    let fused = retriever.fused_with("q", &k30, 100, 2).expect("fused");
    assert_eq!(fused.len(), 2);
    assert!((fused[0].score - 1.0 / 31.0).abs() < 1e-12);
}

struct EchoGenerator;
impl Generator for EchoGenerator {
    fn generate(&self, prompt: &str, _params: &GenerationParams) -> anyhow::Result<String> { Ok(format!("  {}  ", prompt.len())) }
}

#[test]
fn rag_service_answers_with_retrieved_context() {
    let service = RagService::new(abc_retriever(), Arc::new(EchoGenerator), &GenerationSettings::default());
    let answer = service.answer("What is A?").expect("answer");
    assert_eq!(ids(&answer.retrieved), vec!["A", "B", "C"]);
    assert!(!answer.answer.starts_with(' '));
    assert!(answer.answer.parse::<usize>().is_ok());

    let detailed = service.answer_detailed("What is A?").expect("detailed");
    assert_eq!(detailed.hits.len(), 3);
    assert!(detailed.generation_ms >= 0.0);
}

fn homestead_corpus() -> Vec<SharedChunk> {
    vec![
        chunk("fire-1", "fire", "Building a fire needs dry tinder, kindling and a flint striker. Fire needs oxygen."),
        chunk("water-1", "water", "Boiling water for one minute purifies it of most pathogens."),
        chunk("garden-1", "garden", "Compost improves garden soil structure and feeds vegetable beds."),
        chunk("net-1", "network", "Mesh radio networking links cabins without cables."),
    ]
}

#[test]
fn real_rankers_fuse_end_to_end() {
    let corpus = homestead_corpus();
    let mut sparse = TantivyRanker::in_ram().expect("tantivy");
    sparse.build(&corpus).expect("sparse build");
    let mut dense = FlatVectorIndex::new(Box::new(HashingEmbedder::default()));
    dense.build(&corpus).expect("dense build");

    let settings = RetrievalSettings { final_n: 3, ..RetrievalSettings::default() };
    let retriever = HybridRetriever::new(Arc::new(dense), Arc::new(sparse), &settings).expect("retriever");
    let fused = retriever.retrieve("boiling water pathogens").expect("retrieve");
    assert!(!fused.is_empty() && fused.len() <= 3);
    assert_eq!(fused[0].chunk.chunk_id, "water-1");

    let generation = GenerationSettings { strategy: StrategyKind::Instruction, max_context_chars: 2000 };
    let service = RagService::new(retriever, Arc::new(ExtractiveGenerator), &generation);
    let answer = service.answer("How do I purify water?").expect("answer");
    assert!(!answer.retrieved.is_empty());
    assert!(answer.answer.ends_with('.'));
}
