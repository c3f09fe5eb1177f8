//! ncertqa-retrieval
//!
//! Query side of the system: filtered top-K retrieval over an atomically
//! swappable index snapshot, conversation context merging, citations and
//! confidence. [`QaEngine`] ties them together for applications.

pub mod citation;
pub mod confidence;
pub mod context;
pub mod engine;
pub mod retriever;
pub mod snapshot;

pub use citation::{Citation, CitationFormatter};
pub use confidence::{Confidence, ConfidenceEstimator, ConfidenceLevel};
pub use context::{compose_question, ContextMerger, Conversation};
pub use engine::{EngineStats, QaEngine, ResponseMetadata, RetrievalResponse};
pub use retriever::{RetrievalResult, Retriever};
pub use snapshot::{IndexSnapshot, SnapshotHandle};
