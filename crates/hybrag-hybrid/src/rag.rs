use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use hybrag_core::config::GenerationSettings;
use hybrag_core::traits::Generator;
use hybrag_core::types::SharedChunk;
use hybrag_core::Result;

use crate::engine::{DetailedHit, HybridRetriever, StageTiming};
use crate::generate::{build_context, GenerationStrategy};

/// Retrieval-augmented answering: hybrid retrieval, context packing and one
/// call into the generation backend.
pub struct RagService {
    retriever: HybridRetriever,
    generator: Arc<dyn Generator>,
    strategy: GenerationStrategy,
    max_context_chars: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub query: String,
    pub answer: String,
    pub retrieved: Vec<SharedChunk>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DetailedAnswer {
    pub query: String,
    pub answer: String,
    pub hits: Vec<DetailedHit>,
    pub timing: StageTiming,
    pub generation_ms: f64,
}

impl RagService {
    pub fn new(retriever: HybridRetriever, generator: Arc<dyn Generator>, settings: &GenerationSettings) -> Self {
        Self { retriever, generator, strategy: settings.strategy.into(), max_context_chars: settings.max_context_chars }
    }

    pub fn retriever(&self) -> &HybridRetriever { &self.retriever }

    pub fn strategy(&self) -> GenerationStrategy { self.strategy }

    pub fn answer(&self, query: &str) -> Result<Answer> {
        let retrieved: Vec<SharedChunk> = self.retriever.retrieve(query)?.into_iter().map(|f| f.chunk).collect();
        let answer = self.generate(query, &retrieved)?;
        Ok(Answer { query: query.to_string(), answer, retrieved })
    }

    pub fn answer_detailed(&self, query: &str) -> Result<DetailedAnswer> {
        let detailed = self.retriever.retrieve_detailed(query)?;
        let chunks: Vec<SharedChunk> = detailed.hits.iter().map(|h| Arc::clone(&h.chunk)).collect();
        let t = Instant::now();
        let answer = self.generate(query, &chunks)?;
        let generation_ms = t.elapsed().as_secs_f64() * 1000.0;
        Ok(DetailedAnswer { query: detailed.query, answer, hits: detailed.hits, timing: detailed.timing, generation_ms })
    }

    fn generate(&self, query: &str, chunks: &[SharedChunk]) -> Result<String> {
        let context = build_context(chunks, self.max_context_chars);
        let prompt = self.strategy.build_prompt(query, &context);
        let answer = self.generator.generate(&prompt, &self.strategy.generate_params())?;
        tracing::debug!(query, context_chars = context.len(), answer_chars = answer.len(), "generated answer");
        Ok(answer.trim().to_string())
    }
}
