use std::sync::Arc;
use tracing::info;

use ncertqa_core::error::RetrievalError;
use ncertqa_core::traits::{Embedder, IndexBuilder, Indexer};
use ncertqa_core::types::{Chunk, IndexInfo, IndexKind, QueryVector};

const BATCH_SIZE: usize = 64;

pub struct DenseBuilder {
    embedder: Arc<dyn Embedder>,
}

impl DenseBuilder {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder }
    }

    pub fn build_index(&self, chunks: &[Arc<Chunk>]) -> Result<DenseIndexer, RetrievalError> {
        let dim = self.embedder.dim();
        let mut rows = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(BATCH_SIZE) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let embs = self.embedder.embed_batch(&texts)?;
            if embs.len() != texts.len() {
                return Err(RetrievalError::Embedding(format!(
                    "embedder returned {} vectors for {} texts",
                    embs.len(),
                    texts.len()
                )));
            }
            for v in embs {
                check_dim(&v, dim)?;
                rows.push(v);
            }
        }
        info!(chunks = rows.len(), dim, embedder = self.embedder.id(), "dense index built");
        Ok(DenseIndexer { embedder: Arc::clone(&self.embedder), rows })
    }
}

impl IndexBuilder for DenseBuilder {
    fn build(&self, chunks: &[Arc<Chunk>]) -> Result<Box<dyn Indexer>, RetrievalError> {
        Ok(Box::new(self.build_index(chunks)?))
    }
}

/// Cosine similarity over normalised embeddings.
pub struct DenseIndexer {
    embedder: Arc<dyn Embedder>,
    rows: Vec<Vec<f32>>,
}

impl Indexer for DenseIndexer {
    fn kind(&self) -> IndexKind {
        IndexKind::Dense
    }

    fn info(&self) -> IndexInfo {
        IndexInfo {
            kind: IndexKind::Dense,
            tokenizer: self.embedder.id().to_string(),
            entries: self.rows.len(),
            dimensions: self.embedder.dim(),
        }
    }

    fn len(&self) -> usize {
        self.rows.len()
    }

    fn vectorize(&self, text: &str) -> Result<QueryVector, RetrievalError> {
        let mut embs = self.embedder.embed_batch(&[text.to_string()])?;
        let v = embs.pop().ok_or_else(|| RetrievalError::Embedding("embedder returned no vector".into()))?;
        check_dim(&v, self.embedder.dim())?;
        Ok(QueryVector::Dense(v))
    }

    fn score(&self, query: &QueryVector, candidates: &[usize]) -> Result<Vec<f32>, RetrievalError> {
        let QueryVector::Dense(q) = query else {
            return Err(RetrievalError::QueryVectorMismatch { indexer: "dense", got: query.kind_name() });
        };
        candidates
            .iter()
            .map(|&pos| {
                let row = self
                    .rows
                    .get(pos)
                    .ok_or(RetrievalError::CandidateOutOfRange { position: pos, len: self.rows.len() })?;
                Ok(dot(row, q))
            })
            .collect()
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn check_dim(v: &[f32], dim: usize) -> Result<(), RetrievalError> {
    if v.len() == dim {
        Ok(())
    } else {
        Err(RetrievalError::Embedding(format!("expected {dim} dimensions, got {}", v.len())))
    }
}
