use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

use ncertqa_core::error::RetrievalError;
use ncertqa_core::types::{Filters, SearchHit};

use crate::snapshot::IndexSnapshot;

#[derive(Debug, Clone, Default, Serialize)]
pub struct RetrievalResult {
    /// Ordered by score descending, then chunk id ascending.
    pub hits: Vec<SearchHit>,
    /// Number of chunks in the filtered scope.
    pub candidates: usize,
    /// True when `hits` holds the best-effort match instead of threshold matches.
    pub fallback: bool,
}

impl RetrievalResult {
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn top_score(&self) -> Option<f32> {
        self.hits.first().map(|h| h.score)
    }
}

/// Filter, score and rank over one snapshot.
pub struct Retriever {
    snapshot: Arc<IndexSnapshot>,
    best_effort_fallback: bool,
}

impl Retriever {
    pub fn new(snapshot: Arc<IndexSnapshot>) -> Self {
        Self { snapshot, best_effort_fallback: false }
    }

    /// When nothing clears `min_score`, return the single best positive match.
    pub fn with_fallback(mut self, enabled: bool) -> Self {
        self.best_effort_fallback = enabled;
        self
    }

    pub fn snapshot(&self) -> &IndexSnapshot {
        &self.snapshot
    }

    pub fn retrieve(
        &self,
        query: &str,
        filters: &Filters,
        top_k: usize,
        min_score: f32,
    ) -> Result<RetrievalResult, RetrievalError> {
        let query = query.trim();
        if query.is_empty() || top_k == 0 {
            return Ok(RetrievalResult::default());
        }
        let corpus = self.snapshot.corpus();
        let index = self.snapshot.index();

        let positions = corpus.filter_positions(filters);
        if positions.is_empty() {
            warn!(?filters, "no chunks in filter scope");
            return Ok(RetrievalResult::default());
        }

        let vector = index.vectorize(query)?;
        let scores = index.score(&vector, &positions)?;
        if scores.len() != positions.len() {
            return Err(RetrievalError::ScoreCountMismatch { expected: positions.len(), got: scores.len() });
        }

        let mut ranked: Vec<(usize, f32)> = Vec::with_capacity(positions.len());
        for (&pos, &score) in positions.iter().zip(&scores) {
            if !score.is_finite() {
                let chunk_id = corpus.get(pos).map(|c| c.id.clone()).unwrap_or_default();
                return Err(RetrievalError::NonFiniteScore { chunk_id });
            }
            ranked.push((pos, score));
        }
        // positions follow chunk id order, so they break ties by id
        ranked.sort_unstable_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        let best = ranked.first().copied();

        ranked.truncate(top_k);
        ranked.retain(|&(_, score)| score > 0.0 && score >= min_score);

        let mut fallback = false;
        if ranked.is_empty() && self.best_effort_fallback {
            if let Some((pos, score)) = best.filter(|&(_, score)| score > 0.0) {
                debug!(score, "no match above threshold, using best available chunk");
                ranked.push((pos, score));
                fallback = true;
            }
        }

        let kind = index.kind();
        let hits: Vec<SearchHit> = ranked
            .into_iter()
            .filter_map(|(pos, score)| {
                corpus.get(pos).map(|chunk| SearchHit { chunk: Arc::clone(chunk), score, source: kind })
            })
            .collect();

        debug!(
            query,
            candidates = positions.len(),
            returned = hits.len(),
            top_score = best.map_or(0.0, |(_, s)| s),
            "retrieval finished"
        );
        Ok(RetrievalResult { hits, candidates: positions.len(), fallback })
    }
}
