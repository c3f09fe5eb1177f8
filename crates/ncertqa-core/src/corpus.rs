//! In-memory corpus of textbook chunks loaded from JSON Lines files.
//!
//! Each line is one record, either with a nested `metadata` object (what the
//! ingestion pipeline writes) or with the metadata fields at the top level.
//! Bad records are skipped, logged and kept in a rejection report; loading
//! only fails when nothing usable is left.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{IngestionError, Rejection};
use crate::types::{Chunk, Filters, Grade, Language, Subject};

const MEMORY_ORIGIN: &str = "<memory>";

#[derive(Debug, Default, Deserialize)]
struct RawMetadata {
    grade: Option<GradeValue>,
    subject: Option<String>,
    chapter: Option<String>,
    #[serde(alias = "page_no", alias = "pageNo")]
    page: Option<u32>,
    #[serde(alias = "sourceFile")]
    source_file: Option<String>,
    language: Option<String>,
}

impl RawMetadata {
    /// Field-wise merge where `self` wins.
    fn or(self, other: RawMetadata) -> RawMetadata {
        RawMetadata {
            grade: self.grade.or(other.grade),
            subject: self.subject.or(other.subject),
            chapter: self.chapter.or(other.chapter),
            page: self.page.or(other.page),
            source_file: self.source_file.or(other.source_file),
            language: self.language.or(other.language),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GradeValue {
    Number(u8),
    Text(String),
}

#[derive(Debug, Deserialize)]
struct RawRecord {
    id: String,
    text: String,
    #[serde(default)]
    metadata: Option<RawMetadata>,
    #[serde(flatten)]
    flat: RawMetadata,
}

impl RawRecord {
    fn into_chunk(self, fallback_grade: Option<Grade>) -> Result<Chunk, String> {
        let id = self.id.trim().to_string();
        if id.is_empty() {
            return Err("empty id".into());
        }
        let text = self.text.trim().to_string();
        if text.is_empty() {
            return Err("empty text".into());
        }
        let meta = self.metadata.unwrap_or_default().or(self.flat);
        let grade = match meta.grade {
            Some(GradeValue::Number(n)) => Grade::new(n).map_err(|e| e.to_string())?,
            Some(GradeValue::Text(s)) => s.parse().map_err(|e: crate::error::ParseError| e.to_string())?,
            None => fallback_grade.ok_or("missing grade")?,
        };
        let subject: Subject = meta
            .subject
            .ok_or("missing subject")?
            .parse()
            .map_err(|e: crate::error::ParseError| e.to_string())?;
        let page = meta.page.ok_or("missing page number")?;
        let source_file = meta.source_file.map(|s| s.trim().to_string()).unwrap_or_default();
        if source_file.is_empty() {
            return Err("missing source file".into());
        }
        let language = match meta.language.as_deref().map(str::trim) {
            Some(l) if !l.is_empty() => l.parse::<Language>().unwrap_or_else(|_| {
                warn!(id = %id, language = l, "unrecognised language, using unknown");
                Language::Unknown
            }),
            _ => Language::Unknown,
        };
        Ok(Chunk {
            id,
            text,
            grade,
            subject,
            chapter: meta.chapter.unwrap_or_default().trim().to_string(),
            page,
            source_file,
            language,
        })
    }
}

/// Infer a grade from names like `class 5_chunks.jsonl` or `Class-10.jsonl`.
pub fn grade_from_file_name(path: &Path) -> Option<Grade> {
    let name = path.file_name()?.to_string_lossy().to_lowercase();
    let start = name.find("class").map(|i| i + "class".len())?;
    let digits: String = name[start..]
        .trim_start_matches(|c: char| c == ' ' || c == '_' || c == '-')
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    Grade::new(digits.parse().ok()?).ok()
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CorpusStats {
    pub chunks: usize,
    pub per_grade: BTreeMap<Grade, usize>,
    pub per_subject: BTreeMap<Subject, usize>,
    pub per_language: BTreeMap<Language, usize>,
    pub rejected: usize,
}

/// Immutable chunk collection, sorted by id, with grade/subject/language
/// posting lists for filtering.
#[derive(Debug, Default)]
pub struct CorpusStore {
    chunks: Vec<Arc<Chunk>>,
    by_grade: BTreeMap<Grade, Vec<usize>>,
    by_subject: BTreeMap<Subject, Vec<usize>>,
    by_language: BTreeMap<Language, Vec<usize>>,
    rejected: Vec<Rejection>,
}

impl CorpusStore {
    /// Read chunk files. Directories are walked for `*.jsonl` files in path order.
    pub fn load<P: AsRef<Path>>(sources: &[P]) -> Result<Self, IngestionError> {
        let files = collect_files(sources)?;
        let mut accepted: Vec<Chunk> = Vec::new();
        let mut rejected: Vec<Rejection> = Vec::new();
        let mut seen: HashMap<String, String> = HashMap::new();

        for file in &files {
            let content = fs::read_to_string(file).map_err(|source| IngestionError::Io { path: file.clone(), source })?;
            let origin = file.display().to_string();
            let fallback_grade = grade_from_file_name(file);
            let before = accepted.len();
            for (idx, line) in content.lines().enumerate() {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let line_no = idx + 1;
                let parsed = serde_json::from_str::<RawRecord>(line)
                    .map_err(|e| (None, format!("malformed record: {e}")))
                    .and_then(|raw| {
                        let id = raw.id.clone();
                        raw.into_chunk(fallback_grade).map_err(|reason| (Some(id), reason))
                    });
                match parsed {
                    Ok(chunk) => match seen.get(&chunk.id) {
                        Some(first) => rejected.push(Rejection {
                            origin: origin.clone(),
                            line: Some(line_no),
                            id: Some(chunk.id),
                            reason: format!("duplicate id, first seen in {first}"),
                        }),
                        None => {
                            seen.insert(chunk.id.clone(), format!("{origin}:{line_no}"));
                            accepted.push(chunk);
                        }
                    },
                    Err((id, reason)) => rejected.push(Rejection { origin: origin.clone(), line: Some(line_no), id, reason }),
                }
            }
            info!(file = %origin, chunks = accepted.len() - before, "loaded chunk file");
        }

        Self::finish(accepted, rejected)
    }

    /// Validate in-memory chunks with the same rules as [`CorpusStore::load`].
    pub fn from_chunks(chunks: Vec<Chunk>) -> Result<Self, IngestionError> {
        let mut accepted = Vec::with_capacity(chunks.len());
        let mut rejected = Vec::new();
        let mut seen: HashMap<String, usize> = HashMap::new();
        for (idx, mut chunk) in chunks.into_iter().enumerate() {
            chunk.id = chunk.id.trim().to_string();
            chunk.text = chunk.text.trim().to_string();
            let problem = if chunk.id.is_empty() {
                Some("empty id".to_string())
            } else if chunk.text.is_empty() {
                Some("empty text".to_string())
            } else if chunk.source_file.trim().is_empty() {
                Some("missing source file".to_string())
            } else {
                seen.get(&chunk.id).map(|first| format!("duplicate id, first seen at record {first}"))
            };
            match problem {
                Some(reason) => rejected.push(Rejection {
                    origin: MEMORY_ORIGIN.to_string(),
                    line: Some(idx + 1),
                    id: Some(chunk.id),
                    reason,
                }),
                None => {
                    seen.insert(chunk.id.clone(), idx + 1);
                    accepted.push(chunk);
                }
            }
        }
        Self::finish(accepted, rejected)
    }

    fn finish(mut accepted: Vec<Chunk>, rejected: Vec<Rejection>) -> Result<Self, IngestionError> {
        for r in &rejected {
            warn!(rejection = %r, "skipped chunk record");
        }
        if accepted.is_empty() {
            return Err(IngestionError::EmptyCorpus { rejected });
        }
        accepted.sort_by(|a, b| a.id.cmp(&b.id));

        let mut store = CorpusStore { rejected, ..Default::default() };
        for (pos, chunk) in accepted.into_iter().enumerate() {
            store.by_grade.entry(chunk.grade).or_default().push(pos);
            store.by_subject.entry(chunk.subject).or_default().push(pos);
            store.by_language.entry(chunk.language).or_default().push(pos);
            store.chunks.push(Arc::new(chunk));
        }
        info!(chunks = store.chunks.len(), rejected = store.rejected.len(), "corpus ready");
        Ok(store)
    }

    /// Positions of chunks matching every provided filter, ascending (i.e. by id).
    pub fn filter_positions(&self, filters: &Filters) -> Vec<usize> {
        let lists: Vec<&Vec<usize>> = [
            filters.grade.map(|g| self.by_grade.get(&g)),
            filters.subject.map(|s| self.by_subject.get(&s)),
            filters.language.map(|l| self.by_language.get(&l)),
        ]
        .into_iter()
        .flatten()
        .map(|list| list.unwrap_or(&EMPTY))
        .collect();

        match lists.iter().min_by_key(|l| l.len()) {
            None => (0..self.chunks.len()).collect(),
            Some(shortest) => shortest
                .iter()
                .copied()
                .filter(|&pos| filters.matches(&self.chunks[pos]))
                .collect(),
        }
    }

    /// Chunks matching every provided filter; no filter yields the whole corpus.
    pub fn filter(&self, filters: &Filters) -> Vec<&Arc<Chunk>> {
        self.filter_positions(filters).into_iter().map(|pos| &self.chunks[pos]).collect()
    }

    pub fn chunks(&self) -> &[Arc<Chunk>] {
        &self.chunks
    }

    pub fn get(&self, pos: usize) -> Option<&Arc<Chunk>> {
        self.chunks.get(pos)
    }

    pub fn find(&self, id: &str) -> Option<&Arc<Chunk>> {
        self.chunks
            .binary_search_by(|c| c.id.as_str().cmp(id))
            .ok()
            .map(|pos| &self.chunks[pos])
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn rejected(&self) -> &[Rejection] {
        &self.rejected
    }

    pub fn stats(&self) -> CorpusStats {
        CorpusStats {
            chunks: self.chunks.len(),
            per_grade: self.by_grade.iter().map(|(k, v)| (*k, v.len())).collect(),
            per_subject: self.by_subject.iter().map(|(k, v)| (*k, v.len())).collect(),
            per_language: self.by_language.iter().map(|(k, v)| (*k, v.len())).collect(),
            rejected: self.rejected.len(),
        }
    }
}

static EMPTY: Vec<usize> = Vec::new();

fn collect_files<P: AsRef<Path>>(sources: &[P]) -> Result<Vec<PathBuf>, IngestionError> {
    let mut files = Vec::new();
    for source in sources {
        let source = source.as_ref();
        if source.is_dir() {
            let mut found: Vec<PathBuf> = walkdir::WalkDir::new(source)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .map(|e| e.into_path())
                .filter(|p| p.extension().and_then(|s| s.to_str()) == Some("jsonl"))
                .collect();
            found.sort();
            if found.is_empty() {
                warn!(dir = %source.display(), "no .jsonl chunk files found");
            }
            files.extend(found);
        } else if source.is_file() {
            files.push(source.to_path_buf());
        } else {
            return Err(IngestionError::Io {
                path: source.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file or directory"),
            });
        }
    }
    Ok(files)
}
