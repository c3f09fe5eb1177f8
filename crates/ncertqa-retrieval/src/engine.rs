//! Engine facade used by applications: question in, ranked and cited
//! retrieval response out.

use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use ncertqa_core::config::{IndexConfig, Settings};
use ncertqa_core::corpus::{CorpusStats, CorpusStore};
use ncertqa_core::error::Result;
use ncertqa_core::traits::IndexBuilder;
use ncertqa_core::types::{Filters, Grade, IndexInfo, IndexKind, Language, SearchHit, Subject, Turn};
use ncertqa_embed::{DenseBuilder, HashingEmbedder};
use ncertqa_text::TfIdfBuilder;

use crate::citation::{Citation, CitationFormatter};
use crate::confidence::{Confidence, ConfidenceEstimator, ConfidenceLevel};
use crate::context::{ContextMerger, Conversation};
use crate::retriever::Retriever;
use crate::snapshot::{IndexSnapshot, SnapshotHandle};

#[derive(Debug, Clone, Serialize)]
pub struct ResponseMetadata {
    pub grade: Option<Grade>,
    pub subject: Option<Subject>,
    pub language: Option<Language>,
    pub num_sources: usize,
    pub candidates: usize,
    pub index: IndexInfo,
    pub generation: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RetrievalResponse {
    /// Question after merging recent turns. Image text is expected to be
    /// attached beforehand with [`compose_question`](crate::compose_question).
    pub effective_query: String,
    pub hits: Vec<SearchHit>,
    pub citations: Vec<Citation>,
    pub confidence: Confidence,
    /// The hit is a best-effort match below the score threshold.
    pub fallback: bool,
    pub metadata: ResponseMetadata,
}

impl RetrievalResponse {
    pub fn is_no_answer(&self) -> bool {
        self.confidence.level == ConfidenceLevel::NoAnswer
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    pub corpus: CorpusStats,
    pub index: IndexInfo,
    pub generation: u64,
    pub build_ms: u64,
}

pub struct QaEngine {
    settings: Settings,
    builder: Box<dyn IndexBuilder>,
    snapshots: SnapshotHandle,
    merger: ContextMerger,
    citations: CitationFormatter,
    estimator: ConfidenceEstimator,
}

impl QaEngine {
    /// Load the configured chunk directory and build the configured index.
    pub fn from_settings(settings: Settings) -> Result<Self> {
        let corpus = CorpusStore::load(&[&settings.data.chunks_dir])?;
        Self::new(settings, corpus)
    }

    pub fn new(settings: Settings, corpus: CorpusStore) -> Result<Self> {
        settings.validate()?;
        let engine = Self {
            builder: builder_for(&settings.index),
            snapshots: SnapshotHandle::new(),
            merger: ContextMerger::from(&settings.context),
            citations: CitationFormatter::from(&settings.citation),
            estimator: ConfidenceEstimator::from(&settings.confidence),
            settings,
        };
        engine.snapshots.rebuild(Arc::new(corpus), engine.builder.as_ref())?;
        Ok(engine)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn snapshot(&self) -> Result<Arc<IndexSnapshot>> {
        Ok(self.snapshots.current()?)
    }

    pub fn retrieve(&self, question: &str, filters: &Filters, history: &[Turn]) -> Result<RetrievalResponse> {
        self.retrieve_top_k(question, filters, history, self.settings.retrieval.top_k)
    }

    pub fn retrieve_top_k(
        &self,
        question: &str,
        filters: &Filters,
        history: &[Turn],
        top_k: usize,
    ) -> Result<RetrievalResponse> {
        let snapshot = self.snapshots.current()?;
        let effective_query = self.merger.merge(question, history, self.settings.context.max_turns);
        let retrieval = &self.settings.retrieval;

        let result = Retriever::new(Arc::clone(&snapshot))
            .with_fallback(retrieval.best_effort_fallback)
            .retrieve(&effective_query, filters, top_k, retrieval.min_score)?;

        let mut confidence = self.estimator.estimate(&result.hits);
        if result.fallback {
            confidence = confidence.capped(ConfidenceLevel::Low);
        }
        let citations = self.citations.format_hits(&result.hits);
        debug!(
            generation = snapshot.generation(),
            hits = result.hits.len(),
            confidence = %confidence.level,
            "question answered from index"
        );

        Ok(RetrievalResponse {
            metadata: ResponseMetadata {
                grade: filters.grade,
                subject: filters.subject,
                language: filters.language,
                num_sources: citations.len(),
                candidates: result.candidates,
                index: snapshot.index().info(),
                generation: snapshot.generation(),
            },
            effective_query,
            hits: result.hits,
            citations,
            confidence,
            fallback: result.fallback,
        })
    }

    /// Answer one chat message and record the exchange. Unanswered questions
    /// are left out of the conversation.
    pub fn ask(&self, conversation: &mut Conversation, question: &str, filters: &Filters) -> Result<RetrievalResponse> {
        let response = self.retrieve(question, filters, conversation.turns())?;
        let reply = if response.is_no_answer() {
            None
        } else {
            response.citations.first().map(|c| c.excerpt.clone())
        };
        conversation.record(question, reply);
        Ok(response)
    }

    /// Reload chunk files and swap in a freshly built snapshot. Returns the
    /// new generation. On failure the current snapshot keeps serving.
    pub fn rebuild<P: AsRef<Path>>(&self, paths: &[P]) -> Result<u64> {
        let corpus = CorpusStore::load(paths)?;
        self.rebuild_from(corpus)
    }

    pub fn rebuild_from(&self, corpus: CorpusStore) -> Result<u64> {
        let snapshot = self.snapshots.rebuild(Arc::new(corpus), self.builder.as_ref())?;
        info!(generation = snapshot.generation(), chunks = snapshot.corpus().len(), "snapshot swapped");
        Ok(snapshot.generation())
    }

    pub fn stats(&self) -> Result<EngineStats> {
        let snapshot = self.snapshots.current()?;
        Ok(EngineStats {
            corpus: snapshot.corpus().stats(),
            index: snapshot.index().info(),
            generation: snapshot.generation(),
            build_ms: snapshot.build_time().as_millis() as u64,
        })
    }
}

/// The index variant selected by `index.kind`.
pub fn builder_for(config: &IndexConfig) -> Box<dyn IndexBuilder> {
    match config.kind {
        IndexKind::TfIdf => Box::new(TfIdfBuilder::new(config.max_features, config.ngram_max, config.stemming)),
        IndexKind::Dense => Box::new(DenseBuilder::new(Arc::new(HashingEmbedder::new(
            config.embedding_dim,
            config.stemming,
        )))),
    }
}
