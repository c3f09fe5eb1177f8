use std::hash::{Hash, Hasher};
use twox_hash::XxHash64;

use ncertqa_core::error::RetrievalError;
use ncertqa_core::traits::Embedder;
use ncertqa_text::Analyzer;

pub const DEFAULT_DIM: usize = 384;
const MAX_TOKENS: usize = 512;

/// Deterministic bag-of-terms embedder: every analyzed unigram and bigram is
/// hashed into one of `dim` buckets, and the bucket counts are L2-normalised.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    id: String,
    dim: usize,
    analyzer: Analyzer,
}

impl HashingEmbedder {
    pub fn new(dim: usize, stemming: bool) -> Self {
        let dim = dim.max(1);
        Self { id: format!("hash:xxh64:d{dim}"), dim, analyzer: Analyzer::new(stemming) }
    }

    pub fn analyzer(&self) -> &Analyzer {
        &self.analyzer
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut tokens = self.analyzer.tokens(text);
        tokens.truncate(MAX_TOKENS);
        let bigrams = tokens.windows(2).map(|w| w.join(" "));
        let mut v = vec![0f32; self.dim];
        for term in tokens.iter().cloned().chain(bigrams) {
            let mut hasher = XxHash64::with_seed(0);
            term.hash(&mut hasher);
            let idx = (hasher.finish() % self.dim as u64) as usize;
            v[idx] += 1.0;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIM, false)
    }
}

impl Embedder for HashingEmbedder {
    fn id(&self) -> &str {
        &self.id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn max_len(&self) -> usize {
        MAX_TOKENS
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RetrievalError> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}
