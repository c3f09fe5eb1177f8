//! Configuration loader and path helpers.
//!
//! Figment merges built-in defaults, `config.toml`, `config.<env>.toml` (picked
//! by `RUST_ENV`) and `APP_*` environment variables, where `__` separates
//! nested keys (`APP_RETRIEVAL__TOP_K=3`). Relative paths resolve against the
//! directory the configuration was loaded from.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::types::IndexKind;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Directory (or single file) holding `*.jsonl` chunk files.
    pub chunks_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self { chunks_dir: PathBuf::from("./chunks") }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub kind: IndexKind,
    /// Vocabulary cap for the TF-IDF indexer.
    pub max_features: usize,
    /// 1 for unigrams only, 2 to add bigrams.
    pub ngram_max: usize,
    pub stemming: bool,
    /// Dimensionality of the hashing embedder used by the dense indexer.
    pub embedding_dim: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self { kind: IndexKind::TfIdf, max_features: 10_000, ngram_max: 2, stemming: false, embedding_dim: 384 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub min_score: f32,
    /// Return the single best positive match when nothing clears `min_score`.
    pub best_effort_fallback: bool,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 5, min_score: 0.1, best_effort_fallback: false }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceConfig {
    pub high_threshold: f32,
    pub low_threshold: f32,
    /// Minimum number of results for a `high` judgment.
    pub high_min_results: usize,
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self { high_threshold: 0.5, low_threshold: 0.2, high_min_results: 1 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Prior question/answer pairs folded into the query.
    pub max_turns: usize,
    pub max_turn_chars: usize,
    /// Upper bound for the whole effective query.
    pub max_chars: usize,
    pub include_assistant: bool,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self { max_turns: 2, max_turn_chars: 300, max_chars: 1000, include_assistant: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CitationConfig {
    pub excerpt_chars: usize,
}

impl Default for CitationConfig {
    fn default() -> Self {
        Self { excerpt_chars: 200 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), json: false }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub data: DataConfig,
    pub index: IndexConfig,
    pub retrieval: RetrievalConfig,
    pub confidence: ConfidenceConfig,
    pub context: ContextConfig,
    pub citation: CitationConfig,
    pub log: LogConfig,
}

impl Settings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| -> Result<(), ConfigError> { Err(ConfigError::Invalid(msg)) };
        let r = &self.retrieval;
        let c = &self.confidence;
        if r.top_k == 0 {
            return invalid("retrieval.top_k must be at least 1".into());
        }
        if !(0.0..=1.0).contains(&r.min_score) {
            return invalid(format!("retrieval.min_score must be within [0, 1], got {}", r.min_score));
        }
        for (name, value) in [("confidence.low_threshold", c.low_threshold), ("confidence.high_threshold", c.high_threshold)] {
            if !(0.0..=1.0).contains(&value) {
                return invalid(format!("{name} must be within [0, 1], got {value}"));
            }
        }
        if c.low_threshold > c.high_threshold {
            return invalid(format!(
                "confidence.low_threshold ({}) exceeds confidence.high_threshold ({})",
                c.low_threshold, c.high_threshold
            ));
        }
        if !(1..=2).contains(&self.index.ngram_max) {
            return invalid(format!("index.ngram_max must be 1 or 2, got {}", self.index.ngram_max));
        }
        if self.index.max_features == 0 || self.index.embedding_dim == 0 {
            return invalid("index.max_features and index.embedding_dim must be positive".into());
        }
        if self.context.max_chars == 0 {
            return invalid("context.max_chars must be positive".into());
        }
        if self.citation.excerpt_chars == 0 {
            return invalid("citation.excerpt_chars must be positive".into());
        }
        Ok(())
    }
}

pub struct Config {
    figment: Figment,
    base_dir: PathBuf,
}

impl Config {
    /// Load from the current directory using `RUST_ENV` (default `dev`).
    pub fn load() -> Result<Self, ConfigError> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        Self::load_for_env(Path::new("."), &env_name)
    }

    pub fn load_for_env(base_dir: &Path, env_name: &str) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(base_dir.join("config.toml")));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file(base_dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(base_dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(base_dir.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));
        Ok(Self { figment, base_dir: base_dir.to_path_buf() })
    }

    /// Load an explicit file on top of the defaults, still honouring `APP_*`.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.is_file() {
            return Err(ConfigError::Invalid(format!("config file not found: {}", path.display())));
        }
        let figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("APP_").split("__"));
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
        Ok(Self { figment, base_dir })
    }

    pub fn get<T>(&self, key: &str) -> Result<T, ConfigError>
    where
        T: serde::de::DeserializeOwned,
    {
        Ok(self.figment.extract_inner(key)?)
    }

    /// Extract, resolve paths and validate.
    pub fn settings(&self) -> Result<Settings, ConfigError> {
        let mut settings: Settings = self.figment.extract()?;
        settings.data.chunks_dir = resolve_with_base(&self.base_dir, settings.data.chunks_dir.to_string_lossy());
        settings.validate()?;
        Ok(settings)
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        Settings::default().validate().expect("defaults validate");
    }

    #[test]
    fn inverted_thresholds_are_rejected() {
        let mut s = Settings::default();
        s.confidence.low_threshold = 0.8;
        s.confidence.high_threshold = 0.3;
        assert!(matches!(s.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn zero_top_k_is_rejected() {
        let mut s = Settings::default();
        s.retrieval.top_k = 0;
        assert!(s.validate().is_err());
    }

    #[test]
    fn relative_paths_resolve_against_base() {
        let base = Path::new("/srv/ncert");
        assert_eq!(resolve_with_base(base, "chunks"), PathBuf::from("/srv/ncert/chunks"));
        assert_eq!(resolve_with_base(base, "/data/chunks"), PathBuf::from("/data/chunks"));
    }
}
