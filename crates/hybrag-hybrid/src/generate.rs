//! Prompt construction and decoding parameters per generation backend family.
//!
//! The generation model itself is an external collaborator behind
//! [`Generator`]; this module only decides what to send it.

use serde::{Deserialize, Serialize};

use hybrag_core::config::StrategyKind;
use hybrag_core::traits::{GenerationParams, Generator};
use hybrag_core::types::SharedChunk;

const MAX_NEW_TOKENS: usize = 150;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStrategy {
    /// Seq2seq, instruction-tuned models: explicit task phrasing, beam search.
    Instruction,
    /// Causal language models: a document to complete, sampled decoding.
    CausalCompletion,
}

impl From<StrategyKind> for GenerationStrategy {
    fn from(kind: StrategyKind) -> Self {
        match kind {
            StrategyKind::Instruction => Self::Instruction,
            StrategyKind::CausalCompletion => Self::CausalCompletion,
        }
    }
}

impl GenerationStrategy {
    pub fn supports_instruction_prompting(self) -> bool { matches!(self, Self::Instruction) }

    pub fn build_prompt(self, query: &str, context: &str) -> String {
        match self {
            Self::Instruction => format!("Answer the question based on the context below.\n\nContext:\n{context}\n\nQuestion: {query}\n\nAnswer:"),
            Self::CausalCompletion => format!("Use the following context to answer the question.\n\nContext:\n{context}\n\nQuestion: {query}\nAnswer:"),
        }
    }

    pub fn generate_params(self) -> GenerationParams {
        match self {
            Self::Instruction => GenerationParams { max_new_tokens: MAX_NEW_TOKENS, num_beams: 5, early_stopping: true, do_sample: false, top_k: None, top_p: None },
            Self::CausalCompletion => GenerationParams { max_new_tokens: MAX_NEW_TOKENS, num_beams: 1, early_stopping: false, do_sample: true, top_k: Some(50), top_p: Some(0.95) },
        }
    }

    /// Prompt asking the model to write a question about `context`.
    pub fn question_prompt(self, title: &str, context: &str) -> String {
        match self {
            Self::Instruction => format!("Generate a factual question that can be answered using this text about {title}:\n\n{}\n\nQuestion:", truncate_chars(context, 800)),
            Self::CausalCompletion => format!("Text: {}\n\nWrite a question about the text above:\nQuestion:", truncate_chars(context, 800)),
        }
    }

    /// Prompt for a reference answer. Causal models are not trusted to answer
    /// their own questions, so they get `None` and the caller falls back to a
    /// context excerpt.
    pub fn answer_prompt(self, question: &str, context: &str) -> Option<String> {
        match self {
            Self::Instruction => Some(format!("Answer the question based on the context.\n\nContext: {}\nQuestion: {question}\nAnswer:", truncate_chars(context, 600))),
            Self::CausalCompletion => None,
        }
    }
}

/// Packs whole chunks, in rank order, while the running length stays below
/// `max_chars`; stops at the first chunk that does not fit.
pub fn build_context(chunks: &[SharedChunk], max_chars: usize) -> String {
    let mut parts: Vec<&str> = Vec::new();
    let mut current_len = 0usize;
    for chunk in chunks {
        let len = chunk.content.chars().count();
        if current_len + len >= max_chars { break; }
        parts.push(&chunk.content);
        current_len += len;
    }
    parts.join("\n\n")
}

/// Longest prefix of `s` with at most `max_chars` characters.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Model-free reference generator: answers with the first sentence of the
/// prompt's context block, capped at `max_new_tokens` words. Useful for
/// offline smoke runs of the evaluation tooling.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractiveGenerator;

impl ExtractiveGenerator {
    fn context_block(prompt: &str) -> &str {
        // Earliest marker wins so chunk text that happens to contain one is kept.
        let body = ["Context:", "Text:", ":\n\n"]
            .iter()
            .filter_map(|marker| prompt.find(marker).map(|i| (i, i + marker.len())))
            .min()
            .map_or(prompt, |(_, start)| &prompt[start..]);
        let end = ["\nQuestion:", "\n\nWrite a question"].iter().filter_map(|m| body.find(m)).min().unwrap_or(body.len());
        body[..end].trim()
    }
}

impl Generator for ExtractiveGenerator {
    fn generate(&self, prompt: &str, params: &GenerationParams) -> anyhow::Result<String> {
        let block = Self::context_block(prompt);
        let sentence_end = block.find(['.', '!', '?']).map_or(block.len(), |i| i + 1);
        let words: Vec<&str> = block[..sentence_end].split_whitespace().take(params.max_new_tokens).collect();
        Ok(words.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hybrag_core::types::Chunk;
    use std::sync::Arc;

    fn chunk(content: &str) -> SharedChunk {
        Arc::new(Chunk { chunk_id: content.to_string(), source_id: "s".to_string(), title: "t".to_string(), content: content.to_string(), token_count: 1 })
    }

    #[test]
    fn prompts_differ_by_strategy() {
        let i = GenerationStrategy::Instruction.build_prompt("Why?", "ctx");
        let c = GenerationStrategy::CausalCompletion.build_prompt("Why?", "ctx");
        assert!(i.starts_with("Answer the question based on the context below."));
        assert!(i.ends_with("Question: Why?\n\nAnswer:"));
        assert!(c.starts_with("Use the following context"));
        assert!(c.ends_with("Question: Why?\nAnswer:"));
        assert!(GenerationStrategy::Instruction.generate_params().num_beams > 1);
        assert!(GenerationStrategy::CausalCompletion.generate_params().do_sample);
        assert!(GenerationStrategy::CausalCompletion.answer_prompt("q", "c").is_none());
    }

    #[test]
    fn context_stops_at_first_chunk_that_overflows() {
        let chunks = vec![chunk("aaaa"), chunk("bbbb"), chunk("cc")];
        assert_eq!(build_context(&chunks, 9), "aaaa\n\nbbbb");
        assert_eq!(build_context(&chunks, 8), "aaaa");
        assert_eq!(build_context(&chunks, 4), "");
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }

    #[test]
    fn extractive_generator_answers_from_context() {
        let prompt = GenerationStrategy::CausalCompletion.build_prompt("What is it?", "Stoicism is a school of philosophy. It was founded in Athens.");
        let params = GenerationStrategy::CausalCompletion.generate_params();
        assert_eq!(ExtractiveGenerator.generate(&prompt, &params).expect("generate"), "Stoicism is a school of philosophy.");
        let short = params.with_max_new_tokens(2);
        assert_eq!(ExtractiveGenerator.generate(&prompt, &short).expect("generate"), "Stoicism is");
    }

    #[test]
    fn extractive_generator_reads_question_prompts() {
        let params = GenerationStrategy::Instruction.generate_params();
        for strategy in [GenerationStrategy::Instruction, GenerationStrategy::CausalCompletion] {
            let prompt = strategy.question_prompt("Stoic ethics", "Virtue is the only good. Context: externals are indifferent.");
            let out = ExtractiveGenerator.generate(&prompt, &params).expect("generate");
            assert_eq!(out, "Virtue is the only good.");
        }
    }
}
