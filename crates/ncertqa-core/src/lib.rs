//! ncertqa-core
//!
//! Domain types, error taxonomy, indexer traits, configuration and the
//! in-memory corpus store shared by the indexing and retrieval crates.

pub mod config;
pub mod corpus;
pub mod error;
pub mod traits;
pub mod types;

pub use corpus::{CorpusStats, CorpusStore};
pub use error::{ConfigError, Error, IngestionError, ParseError, Rejection, Result, RetrievalError};
pub use types::{Chunk, ChunkId, Filters, Grade, IndexInfo, IndexKind, Language, QueryVector, Role, SearchHit, SparseVector, Subject, Turn};
