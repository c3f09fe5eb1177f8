//! ncertqa-embed
//!
//! Dense retrieval without model weights: a feature-hashing embedder and a
//! cosine indexer over its vectors. Any other [`Embedder`] can be plugged into
//! [`DenseBuilder`].
//!
//! [`Embedder`]: ncertqa_core::traits::Embedder

pub mod dense;
pub mod hashing;

pub use dense::{DenseBuilder, DenseIndexer};
pub use hashing::HashingEmbedder;
