//! TF-IDF vector space index.
//!
//! Weights follow the smoothed formulation: raw term count times
//! `ln((1 + n) / (1 + df)) + 1`, each row L2-normalised, so cosine similarity
//! is a plain dot product. The vocabulary keeps the `max_features` most
//! frequent terms across the corpus (ties by term) and assigns ids in term
//! order, which makes rebuilding the same chunks produce identical vectors.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info};

use ncertqa_core::error::RetrievalError;
use ncertqa_core::traits::{IndexBuilder, Indexer};
use ncertqa_core::types::{Chunk, IndexInfo, IndexKind, QueryVector, SparseVector};

use crate::analyzer::Analyzer;

#[derive(Debug, Clone)]
pub struct TfIdfBuilder {
    pub max_features: usize,
    pub ngram_max: usize,
    pub stemming: bool,
}

impl Default for TfIdfBuilder {
    fn default() -> Self {
        Self { max_features: 10_000, ngram_max: 2, stemming: false }
    }
}

impl TfIdfBuilder {
    pub fn new(max_features: usize, ngram_max: usize, stemming: bool) -> Self {
        Self { max_features, ngram_max, stemming }
    }

    pub fn build_index(&self, chunks: &[Arc<Chunk>]) -> TfIdfIndexer {
        let analyzer = Analyzer::new(self.stemming);
        let docs: Vec<HashMap<String, u32>> =
            chunks.iter().map(|c| count_terms(analyzer.terms(&c.text, self.ngram_max))).collect();

        let mut totals: HashMap<&str, (u64, u32)> = HashMap::new();
        for doc in &docs {
            for (term, count) in doc {
                let entry = totals.entry(term.as_str()).or_insert((0, 0));
                entry.0 += u64::from(*count);
                entry.1 += 1;
            }
        }
        let distinct = totals.len();

        let mut ranked: Vec<(&str, u64, u32)> = totals.into_iter().map(|(t, (total, df))| (t, total, df)).collect();
        ranked.sort_unstable_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked.truncate(self.max_features);
        ranked.sort_unstable_by(|a, b| a.0.cmp(b.0));

        let n = docs.len() as f32;
        let mut vocab = HashMap::with_capacity(ranked.len());
        let mut idf = Vec::with_capacity(ranked.len());
        for (id, (term, _, df)) in ranked.into_iter().enumerate() {
            vocab.insert(term.to_string(), id as u32);
            idf.push(((1.0 + n) / (1.0 + df as f32)).ln() + 1.0);
        }

        let rows: Vec<SparseVector> = docs.iter().map(|doc| weigh(doc, &vocab, &idf)).collect();
        let empty_rows = rows.iter().filter(|r| r.is_empty()).count();
        if empty_rows > 0 {
            debug!(empty_rows, "chunks with no indexed terms");
        }
        info!(chunks = rows.len(), vocabulary = vocab.len(), distinct_terms = distinct, "tf-idf index built");

        TfIdfIndexer { analyzer, ngram_max: self.ngram_max, vocab, idf, rows }
    }
}

impl IndexBuilder for TfIdfBuilder {
    fn build(&self, chunks: &[Arc<Chunk>]) -> Result<Box<dyn Indexer>, RetrievalError> {
        Ok(Box::new(self.build_index(chunks)))
    }
}

#[derive(Debug)]
pub struct TfIdfIndexer {
    analyzer: Analyzer,
    ngram_max: usize,
    vocab: HashMap<String, u32>,
    idf: Vec<f32>,
    rows: Vec<SparseVector>,
}

impl TfIdfIndexer {
    pub fn vocabulary_len(&self) -> usize {
        self.vocab.len()
    }

    pub fn term_id(&self, term: &str) -> Option<u32> {
        self.vocab.get(term).copied()
    }

    /// Row vector for the chunk at `pos`.
    pub fn row(&self, pos: usize) -> Option<&SparseVector> {
        self.rows.get(pos)
    }

    pub fn vectorize_text(&self, text: &str) -> SparseVector {
        let counts = count_terms(self.analyzer.terms(text, self.ngram_max));
        weigh(&counts, &self.vocab, &self.idf)
    }
}

impl Indexer for TfIdfIndexer {
    fn kind(&self) -> IndexKind {
        IndexKind::TfIdf
    }

    fn info(&self) -> IndexInfo {
        IndexInfo {
            kind: IndexKind::TfIdf,
            tokenizer: self.analyzer.name(),
            entries: self.rows.len(),
            dimensions: self.vocab.len(),
        }
    }

    fn len(&self) -> usize {
        self.rows.len()
    }

    fn vectorize(&self, text: &str) -> Result<QueryVector, RetrievalError> {
        Ok(QueryVector::Sparse(self.vectorize_text(text)))
    }

    fn score(&self, query: &QueryVector, candidates: &[usize]) -> Result<Vec<f32>, RetrievalError> {
        let QueryVector::Sparse(q) = query else {
            return Err(RetrievalError::QueryVectorMismatch { indexer: "tfidf", got: query.kind_name() });
        };
        candidates
            .iter()
            .map(|&pos| {
                let row = self
                    .rows
                    .get(pos)
                    .ok_or(RetrievalError::CandidateOutOfRange { position: pos, len: self.rows.len() })?;
                Ok(row.dot(q))
            })
            .collect()
    }
}

fn count_terms(terms: Vec<String>) -> HashMap<String, u32> {
    let mut counts = HashMap::new();
    for term in terms {
        *counts.entry(term).or_insert(0) += 1;
    }
    counts
}

fn weigh(counts: &HashMap<String, u32>, vocab: &HashMap<String, u32>, idf: &[f32]) -> SparseVector {
    // BTreeMap keeps the input order independent of hash iteration
    let weights: BTreeMap<u32, f32> = counts
        .iter()
        .filter_map(|(term, &count)| vocab.get(term).map(|&id| (id, count as f32 * idf[id as usize])))
        .collect();
    SparseVector::from_weights(weights.into_iter().collect())
}
