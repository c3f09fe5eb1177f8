use serde::Serialize;
use std::fmt;

use ncertqa_core::config::ConfidenceConfig;
use ncertqa_core::types::SearchHit;

/// Ordered from least to most confident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    NoAnswer,
    Low,
    Medium,
    High,
}

impl ConfidenceLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            ConfidenceLevel::NoAnswer => "no_answer",
            ConfidenceLevel::Low => "low",
            ConfidenceLevel::Medium => "medium",
            ConfidenceLevel::High => "high",
        }
    }
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Confidence {
    pub level: ConfidenceLevel,
    /// Mean of the retained scores, clamped to `[0, 1]`.
    pub score: f32,
}

impl Confidence {
    pub const NONE: Confidence = Confidence { level: ConfidenceLevel::NoAnswer, score: 0.0 };

    /// Lower the level to at most `max`.
    pub fn capped(self, max: ConfidenceLevel) -> Self {
        Self { level: self.level.min(max), ..self }
    }
}

#[derive(Debug, Clone)]
pub struct ConfidenceEstimator {
    high_threshold: f32,
    low_threshold: f32,
    high_min_results: usize,
}

impl Default for ConfidenceEstimator {
    fn default() -> Self {
        Self::from(&ConfidenceConfig::default())
    }
}

impl From<&ConfidenceConfig> for ConfidenceEstimator {
    fn from(config: &ConfidenceConfig) -> Self {
        Self {
            high_threshold: config.high_threshold,
            low_threshold: config.low_threshold,
            high_min_results: config.high_min_results,
        }
    }
}

impl ConfidenceEstimator {
    pub fn estimate(&self, hits: &[SearchHit]) -> Confidence {
        let scores: Vec<f32> = hits.iter().map(|h| h.score).collect();
        self.estimate_scores(&scores)
    }

    /// `scores` must be ordered best first, as retrieval returns them.
    pub fn estimate_scores(&self, scores: &[f32]) -> Confidence {
        let Some(&top) = scores.first() else {
            return Confidence::NONE;
        };
        let level = if top >= self.high_threshold && scores.len() >= self.high_min_results {
            ConfidenceLevel::High
        } else if top >= self.low_threshold {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        };
        let mean = scores.iter().sum::<f32>() / scores.len() as f32;
        Confidence { level, score: mean.clamp(0.0, 1.0) }
    }
}
