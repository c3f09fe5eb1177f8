//! Immutable (corpus, index) pairs and the handle readers fetch them from.
//!
//! A rebuild constructs the next snapshot without holding any lock and then
//! replaces the current `Arc` under a short write lock. Readers clone the
//! `Arc` once per request, so a query never mixes two generations.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

use ncertqa_core::corpus::CorpusStore;
use ncertqa_core::error::RetrievalError;
use ncertqa_core::traits::{IndexBuilder, Indexer};

pub struct IndexSnapshot {
    corpus: Arc<CorpusStore>,
    index: Box<dyn Indexer>,
    generation: u64,
    build_time: Duration,
}

impl IndexSnapshot {
    pub fn build(corpus: Arc<CorpusStore>, builder: &dyn IndexBuilder, generation: u64) -> Result<Self, RetrievalError> {
        let started = Instant::now();
        let index = builder.build(corpus.chunks())?;
        if index.len() != corpus.len() {
            return Err(RetrievalError::ScoreCountMismatch { expected: corpus.len(), got: index.len() });
        }
        let build_time = started.elapsed();
        info!(
            generation,
            chunks = corpus.len(),
            index = %index.kind(),
            elapsed_ms = build_time.as_millis() as u64,
            "index snapshot built"
        );
        Ok(Self { corpus, index, generation, build_time })
    }

    pub fn corpus(&self) -> &CorpusStore {
        &self.corpus
    }

    pub fn index(&self) -> &dyn Indexer {
        self.index.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn build_time(&self) -> Duration {
        self.build_time
    }
}

impl std::fmt::Debug for IndexSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexSnapshot")
            .field("generation", &self.generation)
            .field("chunks", &self.corpus.len())
            .field("index", &self.index.info())
            .finish()
    }
}

#[derive(Default)]
pub struct SnapshotHandle {
    current: RwLock<Option<Arc<IndexSnapshot>>>,
    next_generation: AtomicU64,
}

impl SnapshotHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// The snapshot serving requests right now.
    pub fn current(&self) -> Result<Arc<IndexSnapshot>, RetrievalError> {
        self.current.read().as_ref().cloned().ok_or(RetrievalError::IndexNotBuilt)
    }

    /// Build a snapshot for `corpus` and make it current. The previous snapshot
    /// stays alive for readers still holding it.
    pub fn rebuild(&self, corpus: Arc<CorpusStore>, builder: &dyn IndexBuilder) -> Result<Arc<IndexSnapshot>, RetrievalError> {
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let snapshot = Arc::new(IndexSnapshot::build(corpus, builder, generation)?);
        let mut current = self.current.write();
        // a slower rebuild that started earlier must not replace a newer one
        if current.as_ref().map_or(true, |old| old.generation < generation) {
            *current = Some(Arc::clone(&snapshot));
        }
        Ok(snapshot)
    }

    pub fn generation(&self) -> Option<u64> {
        self.current.read().as_ref().map(|s| s.generation)
    }
}
