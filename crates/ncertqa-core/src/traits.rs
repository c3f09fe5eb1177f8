use std::sync::Arc;

use crate::error::RetrievalError;
use crate::types::{Chunk, IndexInfo, IndexKind, QueryVector};

pub trait Embedder: Send + Sync {
    /// Stable identifier for the model (e.g. `hash:xxh64:d384`).
    fn id(&self) -> &str;
    /// Embedding dimensionality.
    fn dim(&self) -> usize;
    /// Maximum number of tokens considered per input.
    fn max_len(&self) -> usize;
    /// Compute L2-normalised embeddings for a batch of texts.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RetrievalError>;
}

/// A built, read-only index over an ordered chunk slice.
///
/// Candidates are positions into the slice the index was built from.
pub trait Indexer: Send + Sync {
    fn kind(&self) -> IndexKind;
    fn info(&self) -> IndexInfo;
    /// Number of index entries, one per chunk.
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    /// Turn query text into a vector using the same rules as the build.
    fn vectorize(&self, text: &str) -> Result<QueryVector, RetrievalError>;
    /// One similarity per candidate, in candidate order. Higher is better.
    fn score(&self, query: &QueryVector, candidates: &[usize]) -> Result<Vec<f32>, RetrievalError>;
}

/// Builds an [`Indexer`]. Building the same chunks twice yields identical indexes.
pub trait IndexBuilder: Send + Sync {
    fn build(&self, chunks: &[Arc<Chunk>]) -> Result<Box<dyn Indexer>, RetrievalError>;
}
