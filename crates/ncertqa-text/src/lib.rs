//! ncertqa-text
//!
//! Lexical side of retrieval: a tantivy text analyzer used for tokenization
//! and a TF-IDF indexer over unigram and bigram terms. No on-disk tantivy
//! index is created; scoring stays in memory.

pub mod analyzer;
pub mod tfidf;

pub use analyzer::Analyzer;
pub use tfidf::{TfIdfBuilder, TfIdfIndexer};
