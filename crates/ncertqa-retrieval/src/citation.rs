use serde::Serialize;
use std::fmt;

use ncertqa_core::config::CitationConfig;
use ncertqa_core::types::{Chunk, SearchHit};

const ELLIPSIS: &str = "...";

/// User-facing reference to the textbook page a retrieved chunk came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Citation {
    /// The chunk's source file, verbatim.
    pub source: String,
    /// Readable label derived from `source`.
    pub title: String,
    pub chapter: String,
    pub page: u32,
    pub excerpt: String,
    pub chunk_id: String,
    pub score: f32,
}

impl fmt::Display for Citation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.title)?;
        if !self.chapter.is_empty() {
            write!(f, ", {}", self.chapter)?;
        }
        write!(f, ", page {}", self.page)
    }
}

#[derive(Debug, Clone)]
pub struct CitationFormatter {
    excerpt_chars: usize,
}

impl Default for CitationFormatter {
    fn default() -> Self {
        Self::from(&CitationConfig::default())
    }
}

impl From<&CitationConfig> for CitationFormatter {
    fn from(config: &CitationConfig) -> Self {
        Self::new(config.excerpt_chars)
    }
}

impl CitationFormatter {
    pub fn new(excerpt_chars: usize) -> Self {
        Self { excerpt_chars: excerpt_chars.max(1) }
    }

    pub fn format(&self, chunk: &Chunk, score: f32) -> Citation {
        Citation {
            source: chunk.source_file.clone(),
            title: title_from_source(&chunk.source_file),
            chapter: chunk.chapter.clone(),
            page: chunk.page,
            excerpt: self.excerpt(&chunk.text),
            chunk_id: chunk.id.clone(),
            score,
        }
    }

    pub fn format_hits(&self, hits: &[SearchHit]) -> Vec<Citation> {
        hits.iter().map(|h| self.format(&h.chunk, h.score)).collect()
    }

    pub fn excerpt(&self, text: &str) -> String {
        let normalized = normalize_whitespace(text);
        let (mut cut, truncated) = truncate_at_word(&normalized, self.excerpt_chars);
        if truncated {
            cut.push_str(ELLIPSIS);
        }
        cut
    }
}

/// `class5_science-ch2.pdf` becomes `Class5 Science Ch2`.
pub fn title_from_source(source: &str) -> String {
    let file = source.rsplit(['/', '\\']).next().unwrap_or(source);
    let stem = match file.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file,
    };
    let title = stem
        .split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ");
    if title.is_empty() {
        source.to_string()
    } else {
        title
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub(crate) fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cut `text` to at most `max_chars` characters, preferring the last word
/// boundary. Returns the cut text and whether anything was removed.
pub(crate) fn truncate_at_word(text: &str, max_chars: usize) -> (String, bool) {
    let Some((byte_end, next)) = text.char_indices().nth(max_chars) else {
        return (text.to_string(), false);
    };
    let head = &text[..byte_end];
    if next.is_whitespace() {
        return (head.trim_end().to_string(), true);
    }
    let cut = match head.rfind(char::is_whitespace) {
        Some(ws) if ws > 0 => &head[..ws],
        // a single long word
        _ => head,
    };
    (cut.trim_end().to_string(), true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_kept_whole() {
        let f = CitationFormatter::new(50);
        assert_eq!(f.excerpt("  Plants   make\nfood. "), "Plants make food.");
    }

    #[test]
    fn long_text_is_cut_between_words() {
        let f = CitationFormatter::new(20);
        let e = f.excerpt("Photosynthesis happens in the leaves of green plants");
        assert_eq!(e, "Photosynthesis...");
        let e = f.excerpt("Leaves are green because of chlorophyll");
        assert_eq!(e, "Leaves are green...");
    }

    #[test]
    fn single_long_word_is_hard_cut() {
        let (cut, truncated) = truncate_at_word("antidisestablishmentarianism", 10);
        assert_eq!(cut, "antidisest");
        assert!(truncated);
    }

    #[test]
    fn cut_counts_characters_not_bytes() {
        let (cut, truncated) = truncate_at_word("प्रकाश संश्लेषण पौधों में", 8);
        assert!(truncated);
        assert_eq!(cut, "प्रकाश");
    }

    #[test]
    fn titles_come_from_file_names() {
        assert_eq!(title_from_source("class5_science.pdf"), "Class5 Science");
        assert_eq!(title_from_source("books/hindi-vasant-ch2.pdf"), "Hindi Vasant Ch2");
        assert_eq!(title_from_source(".pdf"), ".pdf");
        assert_eq!(title_from_source("NCERT Maths"), "NCERT Maths");
    }
}
