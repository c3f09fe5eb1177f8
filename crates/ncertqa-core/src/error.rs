use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// A chunk record that was skipped during ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rejection {
    /// File the record came from, or `"<memory>"`.
    pub origin: String,
    /// 1-based line number within `origin`.
    pub line: Option<usize>,
    pub id: Option<String>,
    pub reason: String,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.origin)?;
        if let Some(line) = self.line {
            write!(f, ":{line}")?;
        }
        if let Some(id) = &self.id {
            write!(f, " [{id}]")?;
        }
        write!(f, ": {}", self.reason)
    }
}

#[derive(Debug, Error)]
pub enum IngestionError {
    #[error("failed to read chunk source {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corpus is empty after ingestion ({} records rejected)", .rejected.len())]
    EmptyCorpus { rejected: Vec<Rejection> },
}

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("index has not been built")]
    IndexNotBuilt,

    #[error("{indexer} index cannot score a {got} query vector")]
    QueryVectorMismatch { indexer: &'static str, got: &'static str },

    #[error("indexer returned {got} scores for {expected} candidates")]
    ScoreCountMismatch { expected: usize, got: usize },

    #[error("candidate position {position} is outside an index of {len} entries")]
    CandidateOutOfRange { position: usize, len: usize },

    #[error("non-finite score for chunk {chunk_id}")]
    NonFiniteScore { chunk_id: String },

    #[error("embedding failed: {0}")]
    Embedding(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to load configuration: {0}")]
    Load(#[from] figment::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind}: {value:?}")]
pub struct ParseError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseError {
    pub fn invalid(kind: &'static str, value: impl Into<String>) -> Self {
        Self { kind, value: value.into() }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Ingestion(#[from] IngestionError),

    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

pub type Result<T> = std::result::Result<T, Error>;
