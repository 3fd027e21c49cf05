use std::hash::{Hash, Hasher};

use anyhow::Result;
use twox_hash::XxHash64;

use hybrag_core::traits::Embedder;

pub const DEFAULT_DIM: usize = 384;

/// Feature-hashing embedder: each lower-cased alphanumeric token is hashed
/// into one of `dim` buckets with a hash-derived sign, then the vector is
/// L2-normalized. Deterministic and model-free, so indexes can be built
/// offline and in tests.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dim: usize,
}

impl Default for HashingEmbedder {
    fn default() -> Self { Self { dim: DEFAULT_DIM } }
}

impl HashingEmbedder {
    pub fn new(dim: usize) -> Self { Self { dim: dim.max(1) } }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        for token in text.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()) {
            let mut hasher = XxHash64::with_seed(0);
            token.to_lowercase().hash(&mut hasher);
            let h = hasher.finish();
            let idx = usize::try_from(h % self.dim as u64).unwrap_or(0);
            let sign = if (h >> 63) == 0 { 1.0 } else { -1.0 };
            v[idx] += sign;
        }
        l2_normalize(&mut v);
        v
    }
}

impl Embedder for HashingEmbedder {
    fn dim(&self) -> usize { self.dim }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> { Ok(texts.iter().map(|t| self.embed_text(t)).collect()) }
}

/// Scales `v` to unit length in place; the zero vector is left untouched.
pub fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 1e-12 { for x in v.iter_mut() { *x /= norm; } }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashing_embedder_shapes_and_determinism() {
        let embedder = HashingEmbedder::new(64);
        let embs = embedder.embed_batch(&["hello world".to_string(), "Hello, WORLD!".to_string()]).expect("embed_batch");
        assert_eq!(embs[0].len(), 64);
        let norm: f32 = embs[0].iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");
        for (a, b) in embs[0].iter().zip(embs[1].iter()) { assert!((a - b).abs() <= 1e-6); }
    }

    #[test]
    fn empty_text_embeds_to_zero() {
        let v = HashingEmbedder::new(8).embed_text("   ");
        assert!(v.iter().all(|x| *x == 0.0));
    }
}
