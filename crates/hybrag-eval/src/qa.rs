//! Synthetic QA dataset generation for retrieval evaluation.
//!
//! Chunks are drawn round-robin across source documents so one long article
//! cannot dominate the dataset, then a generation backend writes one question
//! (and, for instruction models, a reference answer) per chunk.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use hybrag_core::traits::Generator;
use hybrag_core::types::{QaRecord, SharedChunk};
use hybrag_core::Result;
use hybrag_hybrid::generate::truncate_chars;
use hybrag_hybrid::GenerationStrategy;

const MIN_QUESTION_CHARS: usize = 10;
const QUESTION_INDICATORS: [&str; 15] = ["?", "what", "who", "where", "when", "why", "how", "which", "is ", "are ", "was ", "were ", "do ", "does ", "did "];
const INTERROGATIVES: [&str; 7] = ["what", "who", "where", "when", "why", "how", "which"];

/// Round-robin over per-document chunk pools, each drained in a seeded
/// random order. A pool leaves the rotation once it is empty.
#[derive(Debug)]
pub struct DiverseSampler {
    pools: Vec<Vec<SharedChunk>>,
    rotation: VecDeque<usize>,
}

impl DiverseSampler {
    pub fn new(corpus: &[SharedChunk], seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut slot: HashMap<&str, usize> = HashMap::new();
        let mut pools: Vec<Vec<SharedChunk>> = Vec::new();
        for chunk in corpus {
            let idx = *slot.entry(chunk.source_id.as_str()).or_insert_with(|| {
                pools.push(Vec::new());
                pools.len() - 1
            });
            pools[idx].push(Arc::clone(chunk));
        }
        for pool in &mut pools { pool.shuffle(&mut rng); }
        let mut order: Vec<usize> = (0..pools.len()).collect();
        order.shuffle(&mut rng);
        Self { pools, rotation: order.into() }
    }

    pub fn documents_remaining(&self) -> usize { self.rotation.len() }
}

impl Iterator for DiverseSampler {
    type Item = SharedChunk;

    fn next(&mut self) -> Option<SharedChunk> {
        let idx = self.rotation.pop_front()?;
        let chunk = self.pools[idx].pop()?;
        if !self.pools[idx].is_empty() { self.rotation.push_back(idx); }
        Some(chunk)
    }
}

pub fn is_quality_question(question: &str) -> bool {
    if question.trim().is_empty() || question.chars().count() < MIN_QUESTION_CHARS { return false; }
    let lower = question.to_lowercase();
    QUESTION_INDICATORS.iter().any(|ind| lower.contains(ind))
}

/// Leading interrogative word, `"other"` when there is none.
pub fn question_type(question: &str) -> String {
    let first = question.split_whitespace().next().unwrap_or("").trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase();
    INTERROGATIVES.iter().find(|w| **w == first).map_or("other", |w| *w).to_string()
}

pub struct QaGenerator {
    generator: Arc<dyn Generator>,
    strategy: GenerationStrategy,
    seed: u64,
}

impl QaGenerator {
    pub fn new(generator: Arc<dyn Generator>, strategy: GenerationStrategy, seed: u64) -> Self { Self { generator, strategy, seed } }

    /// Returns the accepted records and the number of chunks that failed
    /// generation or the quality filter.
    pub fn generate_dataset(&self, corpus: &[SharedChunk], num_samples: usize) -> (Vec<QaRecord>, usize) {
        let selected: Vec<SharedChunk> = DiverseSampler::new(corpus, self.seed).take(num_samples).collect();
        let pb = crate::progress_bar(selected.len(), "gen-qa");
        let mut records = Vec::with_capacity(selected.len());
        let mut failed = 0usize;
        for chunk in &selected {
            match self.generate_single(chunk) {
                Ok(record) if is_quality_question(&record.question) => records.push(record),
                Ok(record) => {
                    tracing::debug!(chunk_id = %chunk.chunk_id, question = %record.question, "filtered low-quality question");
                    failed += 1;
                }
                Err(e) => {
                    tracing::warn!(chunk_id = %chunk.chunk_id, error = %e, "question generation failed");
                    failed += 1;
                }
            }
            pb.inc(1);
        }
        pb.finish_and_clear();
        tracing::info!(generated = records.len(), failed, "QA dataset generated");
        (records, failed)
    }

    pub fn generate_single(&self, chunk: &SharedChunk) -> Result<QaRecord> {
        let context = truncate_chars(&chunk.content, 1500);
        let base = self.strategy.generate_params();
        let raw = self.generator.generate(&self.strategy.question_prompt(&chunk.title, context), &base.clone().with_max_new_tokens(self.question_budget()))?;
        let mut question = if self.strategy.supports_instruction_prompting() { raw.trim().to_string() } else { raw.lines().next().unwrap_or("").trim().to_string() };
        if !question.is_empty() && !question.ends_with('?') {
            question.truncate(question.trim_end_matches(['.', '!']).len());
            question.push('?');
        }

        let reference_answer = match self.strategy.answer_prompt(&question, context) {
            Some(prompt) => self.generator.generate(&prompt, &base.with_max_new_tokens(100))?.trim().to_string(),
            None => truncate_chars(context, 300).to_string(),
        };

        Ok(QaRecord {
            question_type: Some(question_type(&question)),
            question,
            reference_answer,
            chunk_id: chunk.chunk_id.clone(),
            source_id: chunk.source_id.clone(),
            title: chunk.title.clone(),
            ground_truth_context: chunk.content.clone(),
        })
    }

    fn question_budget(&self) -> usize { if self.strategy.supports_instruction_prompting() { 64 } else { 50 } }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_filter() {
        assert!(is_quality_question("What is stoicism?"));
        assert!(is_quality_question("Explain the role of virtue?"));
        assert!(!is_quality_question("Why?"));
        assert!(!is_quality_question("Stoic virtue ethics summary"));
        assert!(!is_quality_question("          "));
    }

    #[test]
    fn question_types_follow_leading_word() {
        assert_eq!(question_type("What is it?"), "what");
        assert_eq!(question_type("\"How\" does it work?"), "how");
        assert_eq!(question_type("Is it true?"), "other");
        assert_eq!(question_type(""), "other");
    }
}
