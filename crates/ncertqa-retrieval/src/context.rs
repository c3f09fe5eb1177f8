//! Folding recent conversation turns into the query text.
//!
//! Plain concatenation: the current question first, then earlier turns from
//! the most recent backwards, until the character budget is spent. Follow-up
//! questions like "where does it occur?" pick up the terms of the previous
//! exchange this way without any coreference resolution.

use ncertqa_core::config::ContextConfig;
use ncertqa_core::types::{Role, Turn};

use crate::citation::{normalize_whitespace, truncate_at_word};

#[derive(Debug, Clone)]
pub struct ContextMerger {
    max_turn_chars: usize,
    max_chars: usize,
    include_assistant: bool,
}

impl Default for ContextMerger {
    fn default() -> Self {
        Self::from(&ContextConfig::default())
    }
}

impl From<&ContextConfig> for ContextMerger {
    fn from(config: &ContextConfig) -> Self {
        Self {
            max_turn_chars: config.max_turn_chars,
            max_chars: config.max_chars.max(1),
            include_assistant: config.include_assistant,
        }
    }
}

impl ContextMerger {
    /// Effective query for `current` given the chronological `recent` turns.
    /// Only turns from the last `max_turns` user questions onwards are
    /// considered.
    pub fn merge(&self, current: &str, recent: &[Turn], max_turns: usize) -> String {
        let current = normalize_whitespace(current);
        if current.is_empty() {
            return current;
        }
        let (current, truncated) = truncate_at_word(&current, self.max_chars);
        if truncated {
            return current;
        }

        let window = window_start(recent, max_turns);
        let mut merged = current;
        let mut used = merged.chars().count();
        for turn in recent[window..].iter().rev() {
            if turn.role == Role::Assistant && !self.include_assistant {
                continue;
            }
            let (text, _) = truncate_at_word(&normalize_whitespace(&turn.text), self.max_turn_chars);
            if text.is_empty() {
                continue;
            }
            let needed = text.chars().count() + 1;
            if used + needed > self.max_chars {
                break;
            }
            merged.push(' ');
            merged.push_str(&text);
            used += needed;
        }
        merged
    }
}

/// Index of the `max_turns`-th user turn counted from the end, or 0 when
/// there are fewer.
fn window_start(recent: &[Turn], max_turns: usize) -> usize {
    if max_turns == 0 {
        return recent.len();
    }
    let mut users = 0;
    for (i, turn) in recent.iter().enumerate().rev() {
        if turn.role == Role::User {
            users += 1;
            if users == max_turns {
                return i;
            }
        }
    }
    0
}

/// Chat history kept between questions, oldest first.
///
/// Only exchanges that produced an answer are recorded, so a canned
/// "no answer" reply never leaks into later queries.
#[derive(Debug, Clone)]
pub struct Conversation {
    turns: Vec<Turn>,
    max_len: usize,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new(20)
    }
}

impl Conversation {
    /// History capped at `max_len` turns; older turns are dropped first.
    pub fn new(max_len: usize) -> Self {
        Self { turns: Vec::new(), max_len: max_len.max(2) }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    /// Record a question and its reply. Without a reply nothing is kept.
    pub fn record(&mut self, question: &str, reply: Option<String>) {
        let Some(reply) = reply else { return };
        self.turns.push(Turn::user(question));
        self.turns.push(Turn::assistant(reply));
        if self.turns.len() > self.max_len {
            let excess = self.turns.len() - self.max_len;
            self.turns.drain(..excess);
        }
    }
}

/// Attach OCR text from an uploaded image to the typed message, separated by
/// a blank line. Either part may be missing.
pub fn compose_question(message: &str, image_text: Option<&str>) -> String {
    let message = message.trim();
    match image_text.map(str::trim).filter(|t| !t.is_empty()) {
        Some(image) if message.is_empty() => image.to_string(),
        Some(image) => format!("{message}\n\n{image}"),
        None => message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn merger(max_turn_chars: usize, max_chars: usize, include_assistant: bool) -> ContextMerger {
        ContextMerger::from(&ContextConfig { max_turns: 2, max_turn_chars, max_chars, include_assistant })
    }

    fn history() -> Vec<Turn> {
        vec![
            Turn::user("What is a fraction?"),
            Turn::assistant("A fraction is part of a whole."),
            Turn::user("What is photosynthesis?"),
            Turn::assistant("Plants make food using sunlight."),
        ]
    }

    #[test]
    fn most_recent_turns_follow_the_question() {
        let m = merger(300, 1000, true);
        assert_eq!(
            m.merge("Where does it occur?", &history(), 1),
            "Where does it occur? Plants make food using sunlight. What is photosynthesis?"
        );
    }

    #[test]
    fn assistant_turns_can_be_excluded() {
        let m = merger(300, 1000, false);
        assert_eq!(
            m.merge("Where does it occur?", &history(), 2),
            "Where does it occur? What is photosynthesis? What is a fraction?"
        );
    }

    #[test]
    fn older_turns_are_dropped_first() {
        let m = merger(300, 60, true);
        let merged = m.merge("Where does it occur?", &history(), 2);
        assert_eq!(merged, "Where does it occur? Plants make food using sunlight.");
        assert!(merged.chars().count() <= 60);
    }

    #[test]
    fn long_turns_are_cut_at_words() {
        let m = merger(12, 1000, true);
        assert_eq!(m.merge("Why?", &[Turn::user("Explain the water cycle please")], 2), "Why? Explain the");
    }

    #[test]
    fn current_question_always_survives() {
        let m = merger(300, 10, true);
        assert_eq!(m.merge("Explain the water cycle", &history(), 2), "Explain");
        assert_eq!(m.merge("Why rain?", &history(), 2), "Why rain?");
        assert_eq!(m.merge("   ", &history(), 2), "");
    }

    #[test]
    fn no_history_returns_question() {
        assert_eq!(ContextMerger::default().merge(" What  is soil? ", &[], 2), "What is soil?");
        assert_eq!(ContextMerger::default().merge("What is soil?", &history(), 0), "What is soil?");
    }

    #[test]
    fn window_counts_user_questions_not_turn_pairs() {
        let m = merger(300, 1000, true);
        let asked = vec![Turn::user("soil"), Turn::user("rocks"), Turn::user("minerals")];
        assert_eq!(m.merge("Why?", &asked, 2), "Why? minerals rocks");
        assert_eq!(m.merge("Why?", &asked, 5), "Why? minerals rocks soil");

        let mixed = vec![
            Turn::user("soil"),
            Turn::assistant("Soil is loose earth."),
            Turn::user("rocks"),
            Turn::user("minerals"),
            Turn::assistant("Minerals form rocks."),
        ];
        assert_eq!(m.merge("Why?", &mixed, 1), "Why? Minerals form rocks. minerals");
    }

    #[test]
    fn conversation_skips_unanswered_exchanges() {
        let mut c = Conversation::new(4);
        c.record("What is quantum computing?", None);
        assert!(c.is_empty());

        c.record("What is soil?", Some("Soil is loose earth.".into()));
        c.record("What are rocks?", Some("Rocks are made of minerals.".into()));
        c.record("What is sand?", Some("Sand is tiny rock grains.".into()));
        assert_eq!(c.len(), 4);
        assert_eq!(c.turns()[0].text, "What are rocks?");
        assert_eq!(c.turns()[3].role, Role::Assistant);

        c.clear();
        assert!(c.is_empty());
    }

    #[test]
    fn image_text_is_appended_after_a_blank_line() {
        assert_eq!(compose_question("Solve this", Some("2x + 3 = 7")), "Solve this\n\n2x + 3 = 7");
        assert_eq!(compose_question("", Some("2x + 3 = 7")), "2x + 3 = 7");
        assert_eq!(compose_question("Solve this", Some("  ")), "Solve this");
        assert_eq!(compose_question("Solve this", None), "Solve this");
    }
}
