use std::cmp::Ordering;
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};

use hybrag_core::traits::{Embedder, Ranker};
use hybrag_core::types::{Ranked, SharedChunk, SourceKind};
use hybrag_core::{Error, Result};

use crate::embed::l2_normalize;

const EMBED_BATCH: usize = 64;

/// Exact inner-product search over normalized embeddings (cosine similarity).
///
/// Results are sorted by similarity descending; equal scores keep corpus order.
pub struct FlatVectorIndex {
    embedder: Box<dyn Embedder>,
    corpus: Vec<SharedChunk>,
    vectors: Vec<Vec<f32>>,
    built: bool,
}

impl FlatVectorIndex {
    pub fn new(embedder: Box<dyn Embedder>) -> Self { Self { embedder, corpus: Vec::new(), vectors: Vec::new(), built: false } }

    pub fn len(&self) -> usize { self.vectors.len() }

    pub fn is_empty(&self) -> bool { self.vectors.is_empty() }

    /// Embeds the whole corpus. One-time: a second call is rejected.
    pub fn build(&mut self, corpus: &[SharedChunk]) -> Result<()> {
        if self.built { return Err(Error::Operation("dense index already built".to_string())); }
        let dim = self.embedder.dim();
        let pb = ProgressBar::new(corpus.len() as u64);
        if let Ok(style) = ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%)") {
            pb.set_style(style.progress_chars("#>-"));
        }
        let mut vectors = Vec::with_capacity(corpus.len());
        for batch in corpus.chunks(EMBED_BATCH) {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let embeddings = self.embedder.embed_batch(&texts)?;
            if embeddings.len() != batch.len() {
                return Err(Error::Operation(format!("embedder returned {} vectors for {} texts", embeddings.len(), batch.len())));
            }
            for mut e in embeddings {
                check_dim(dim, e.len())?;
                l2_normalize(&mut e);
                vectors.push(e);
            }
            pb.inc(batch.len() as u64);
        }
        pb.finish_and_clear();
        self.corpus = corpus.iter().map(Arc::clone).collect();
        self.vectors = vectors;
        self.built = true;
        tracing::info!(chunks = self.corpus.len(), dim, "dense index built");
        Ok(())
    }
}

impl Ranker for FlatVectorIndex {
    fn kind(&self) -> SourceKind { SourceKind::Dense }

    fn is_ready(&self) -> bool { self.built }

    fn search(&self, query: &str, k: usize) -> Result<Vec<Ranked>> {
        if !self.built { return Err(Error::IndexNotReady(SourceKind::Dense)); }
        if k == 0 || self.vectors.is_empty() { return Ok(vec![]); }
        let mut q = self.embedder.embed_batch(&[query.to_string()])?.pop().ok_or_else(|| Error::Operation("embedder returned no query vector".to_string()))?;
        check_dim(self.embedder.dim(), q.len())?;
        l2_normalize(&mut q);
        let mut scored: Vec<(usize, f32)> = self.vectors.iter().enumerate().map(|(i, v)| (i, dot(&q, v))).collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal).then(a.0.cmp(&b.0)));
        scored.truncate(k);
        Ok(scored.into_iter().map(|(i, score)| Ranked::new(Arc::clone(&self.corpus[i]), score)).collect())
    }
}

fn check_dim(expected: usize, got: usize) -> Result<()> {
    if expected == got { Ok(()) } else { Err(Error::Operation(format!("embedding dimension {got} does not match index dimension {expected}"))) }
}

fn dot(a: &[f32], b: &[f32]) -> f32 { a.iter().zip(b).map(|(x, y)| x * y).sum() }
