//! Domain types shared by the corpus store, the indexers and the retriever.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::ParseError;

pub type ChunkId = String;

/// School grade (class) covered by the corpus, 5 through 10.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Grade(u8);

impl Grade {
    pub const MIN: u8 = 5;
    pub const MAX: u8 = 10;

    pub fn new(value: u8) -> Result<Self, ParseError> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(ParseError::invalid("grade", value.to_string()))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn all() -> impl Iterator<Item = Grade> {
        (Self::MIN..=Self::MAX).map(Grade)
    }
}

impl TryFrom<u8> for Grade {
    type Error = ParseError;
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Grade> for u8 {
    fn from(grade: Grade) -> Self {
        grade.0
    }
}

/// Accepts `"7"`, `"class 7"`, `"Class7"`, `"grade 7"`.
impl FromStr for Grade {
    type Err = ParseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        let rest = lower
            .strip_prefix("class")
            .or_else(|| lower.strip_prefix("grade"))
            .unwrap_or(&lower)
            .trim_start_matches(|c: char| c.is_whitespace() || c == '_' || c == '-');
        let value: u8 = rest.parse().map_err(|_| ParseError::invalid("grade", s))?;
        Self::new(value).map_err(|_| ParseError::invalid("grade", s))
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Subject {
    Math,
    Science,
    SocialScience,
    English,
    Hindi,
}

impl Subject {
    pub const ALL: [Subject; 5] = [
        Subject::Math,
        Subject::Science,
        Subject::SocialScience,
        Subject::English,
        Subject::Hindi,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Subject::Math => "Math",
            Subject::Science => "Science",
            Subject::SocialScience => "Social Science",
            Subject::English => "English",
            Subject::Hindi => "Hindi",
        }
    }
}

impl FromStr for Subject {
    type Err = ParseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| c.is_alphanumeric())
            .flat_map(char::to_lowercase)
            .collect();
        match key.as_str() {
            "math" | "maths" | "mathematics" => Ok(Subject::Math),
            "science" | "sci" => Ok(Subject::Science),
            "socialscience" | "social" | "sst" => Ok(Subject::SocialScience),
            "english" | "eng" => Ok(Subject::English),
            "hindi" => Ok(Subject::Hindi),
            _ => Err(ParseError::invalid("subject", s)),
        }
    }
}

impl TryFrom<String> for Subject {
    type Error = ParseError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Subject> for String {
    fn from(subject: Subject) -> Self {
        subject.name().to_string()
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Language of a chunk or of the requested answer.
///
/// `Unknown` is what the ingestion language detector emits when it cannot
/// decide; such chunks only match an explicit `Unknown` filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Language {
    English,
    Hindi,
    Urdu,
    Tamil,
    Telugu,
    Bengali,
    Marathi,
    Gujarati,
    Kannada,
    Malayalam,
    Unknown,
}

impl Language {
    pub const SUPPORTED: [Language; 10] = [
        Language::English,
        Language::Hindi,
        Language::Urdu,
        Language::Tamil,
        Language::Telugu,
        Language::Bengali,
        Language::Marathi,
        Language::Gujarati,
        Language::Kannada,
        Language::Malayalam,
    ];

    /// ISO 639-1 code, or `"unknown"`.
    pub fn code(self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Hindi => "hi",
            Language::Urdu => "ur",
            Language::Tamil => "ta",
            Language::Telugu => "te",
            Language::Bengali => "bn",
            Language::Marathi => "mr",
            Language::Gujarati => "gu",
            Language::Kannada => "kn",
            Language::Malayalam => "ml",
            Language::Unknown => "unknown",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Hindi => "Hindi",
            Language::Urdu => "Urdu",
            Language::Tamil => "Tamil",
            Language::Telugu => "Telugu",
            Language::Bengali => "Bengali",
            Language::Marathi => "Marathi",
            Language::Gujarati => "Gujarati",
            Language::Kannada => "Kannada",
            Language::Malayalam => "Malayalam",
            Language::Unknown => "Unknown",
        }
    }
}

impl FromStr for Language {
    type Err = ParseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase();
        if key == "unknown" {
            return Ok(Language::Unknown);
        }
        Self::SUPPORTED
            .into_iter()
            .find(|lang| lang.code() == key || lang.name().eq_ignore_ascii_case(&key))
            .ok_or_else(|| ParseError::invalid("language", s))
    }
}

impl TryFrom<String> for Language {
    type Error = ParseError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Language> for String {
    fn from(language: Language) -> Self {
        language.code().to_string()
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A passage of textbook text that is independently indexed.
///
/// - `id`: unique across the corpus
/// - `page`/`source_file`: always present, used verbatim in citations
/// - `text`: never empty once the corpus store has accepted the chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub text: String,
    pub grade: Grade,
    pub subject: Subject,
    pub chapter: String,
    pub page: u32,
    pub source_file: String,
    pub language: Language,
}

/// Optional grade/subject/language restriction of a query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filters {
    pub grade: Option<Grade>,
    pub subject: Option<Subject>,
    pub language: Option<Language>,
}

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grade(mut self, grade: Grade) -> Self {
        self.grade = Some(grade);
        self
    }

    pub fn subject(mut self, subject: Subject) -> Self {
        self.subject = Some(subject);
        self
    }

    pub fn language(mut self, language: Language) -> Self {
        self.language = Some(language);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.grade.is_none() && self.subject.is_none() && self.language.is_none()
    }

    pub fn matches(&self, chunk: &Chunk) -> bool {
        self.grade.map_or(true, |g| g == chunk.grade)
            && self.subject.map_or(true, |s| s == chunk.subject)
            && self.language.map_or(true, |l| l == chunk.language)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl FromStr for Role {
    type Err = ParseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "user" | "student" => Ok(Role::User),
            "assistant" | "bot" => Ok(Role::Assistant),
            _ => Err(ParseError::invalid("role", s)),
        }
    }
}

/// One prior message of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self { role: Role::User, text: text.into() }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self { role: Role::Assistant, text: text.into() }
    }
}

/// Which indexer variant produced a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    TfIdf,
    Dense,
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IndexKind::TfIdf => "tfidf",
            IndexKind::Dense => "dense",
        })
    }
}

/// L2-normalised sparse term-weight vector, entries sorted by term id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparseVector {
    entries: Vec<(u32, f32)>,
}

impl SparseVector {
    /// Builds a vector from arbitrary `(term, weight)` pairs, summing duplicates
    /// and normalising to unit length.
    pub fn from_weights(mut weights: Vec<(u32, f32)>) -> Self {
        weights.sort_unstable_by_key(|(term, _)| *term);
        let mut entries: Vec<(u32, f32)> = Vec::with_capacity(weights.len());
        for (term, weight) in weights {
            if let Some((last, acc)) = entries.last_mut() {
                if *last == term {
                    *acc += weight;
                    continue;
                }
            }
            entries.push((term, weight));
        }
        entries.retain(|(_, w)| *w != 0.0);
        let norm = entries.iter().map(|(_, w)| w * w).sum::<f32>().sqrt();
        if norm > 0.0 {
            for (_, w) in &mut entries {
                *w /= norm;
            }
        }
        Self { entries }
    }

    pub fn entries(&self) -> &[(u32, f32)] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dot(&self, other: &SparseVector) -> f32 {
        let (mut i, mut j, mut acc) = (0, 0, 0.0f32);
        while i < self.entries.len() && j < other.entries.len() {
            let (a, wa) = self.entries[i];
            let (b, wb) = other.entries[j];
            match a.cmp(&b) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    acc += wa * wb;
                    i += 1;
                    j += 1;
                }
            }
        }
        acc
    }
}

/// A vectorized query, in the representation of the indexer that produced it.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryVector {
    Sparse(SparseVector),
    Dense(Vec<f32>),
}

impl QueryVector {
    pub fn kind_name(&self) -> &'static str {
        match self {
            QueryVector::Sparse(_) => "sparse",
            QueryVector::Dense(_) => "dense",
        }
    }
}

/// Summary of a built index, for logs and `stats`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexInfo {
    pub kind: IndexKind,
    pub tokenizer: String,
    pub entries: usize,
    pub dimensions: usize,
}

/// A ranked chunk. `score` is higher-is-better; `source` labels the indexer.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub chunk: Arc<Chunk>,
    pub score: f32,
    pub source: IndexKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grade_parses_class_prefixes() {
        assert_eq!("class 5".parse::<Grade>().unwrap().get(), 5);
        assert_eq!("Class10".parse::<Grade>().unwrap().get(), 10);
        assert_eq!(" 7 ".parse::<Grade>().unwrap().get(), 7);
        assert!("class 4".parse::<Grade>().is_err());
        assert!("eleven".parse::<Grade>().is_err());
    }

    #[test]
    fn subject_and_language_aliases() {
        assert_eq!("Maths".parse::<Subject>().unwrap(), Subject::Math);
        assert_eq!("social science".parse::<Subject>().unwrap(), Subject::SocialScience);
        assert_eq!("hi".parse::<Language>().unwrap(), Language::Hindi);
        assert_eq!("Malayalam".parse::<Language>().unwrap(), Language::Malayalam);
        assert!("physics".parse::<Subject>().is_err());
        assert!("klingon".parse::<Language>().is_err());
    }

    #[test]
    fn sparse_vector_is_normalised_and_merges_duplicates() {
        let v = SparseVector::from_weights(vec![(3, 1.0), (1, 2.0), (3, 1.0)]);
        assert_eq!(v.entries().len(), 2);
        let norm: f32 = v.entries().iter().map(|(_, w)| w * w).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
        assert!((v.dot(&v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn empty_filters_match_everything() {
        let chunk = Chunk {
            id: "x".into(),
            text: "t".into(),
            grade: Grade::new(6).unwrap(),
            subject: Subject::Hindi,
            chapter: String::new(),
            page: 1,
            source_file: "f.pdf".into(),
            language: Language::Hindi,
        };
        assert!(Filters::new().matches(&chunk));
        assert!(!Filters::new().grade(Grade::new(7).unwrap()).matches(&chunk));
        assert!(Filters::new().subject(Subject::Hindi).language(Language::Hindi).matches(&chunk));
    }
}
