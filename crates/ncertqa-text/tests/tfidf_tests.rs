use std::sync::Arc;

use ncertqa_core::error::RetrievalError;
use ncertqa_core::traits::{IndexBuilder, Indexer};
use ncertqa_core::types::{Chunk, Grade, IndexKind, Language, QueryVector, Subject};
use ncertqa_text::TfIdfBuilder;

fn corpus() -> Vec<Arc<Chunk>> {
    let texts = [
        ("c5-sci-p15-c1", "Photosynthesis is the process by which green plants make their food using sunlight, water and carbon dioxide."),
        ("c5-sci-p16-c1", "Leaves contain chlorophyll, the green pigment that traps sunlight for photosynthesis."),
        ("c6-math-p3-c1", "A fraction represents a part of a whole. The numerator is written above the denominator."),
        ("c7-sst-p40-c2", "The Mughal emperors built forts and gardens across northern India."),
    ];
    texts
        .iter()
        .map(|(id, text)| {
            Arc::new(Chunk {
                id: id.to_string(),
                text: text.to_string(),
                grade: Grade::new(5).unwrap(),
                subject: Subject::Science,
                chapter: String::new(),
                page: 15,
                source_file: "class5_science.pdf".to_string(),
                language: Language::English,
            })
        })
        .collect()
}

fn scores(index: &dyn Indexer, query: &str) -> Vec<f32> {
    let q = index.vectorize(query).expect("vectorize");
    let all: Vec<usize> = (0..index.len()).collect();
    index.score(&q, &all).expect("score")
}

#[test]
fn relevant_chunks_score_highest() {
    let index = TfIdfBuilder::default().build(&corpus()).expect("build");
    let s = scores(index.as_ref(), "What is photosynthesis?");
    assert!(s[0] > 0.1, "{s:?}");
    assert!(s[1] > 0.0);
    assert_eq!(s[2], 0.0);
    assert_eq!(s[3], 0.0);
    assert!(s.iter().all(|v| (0.0..=1.0 + 1e-6).contains(v)));
}

#[test]
fn bigrams_reward_phrase_matches() {
    let index = TfIdfBuilder::default().build(&corpus()).expect("build");
    let s = scores(index.as_ref(), "green plants");
    assert!(s[0] > s[1], "phrase chunk should outrank single-term chunk: {s:?}");
}

#[test]
fn rebuilding_gives_identical_scores() {
    let chunks = corpus();
    let a = TfIdfBuilder::default().build(&chunks).expect("build");
    let b = TfIdfBuilder::default().build(&chunks).expect("build");
    for q in ["sunlight water", "numerator denominator", "forts"] {
        assert_eq!(scores(a.as_ref(), q), scores(b.as_ref(), q));
    }
    assert_eq!(a.info(), b.info());
}

#[test]
fn identical_text_scores_one() {
    let chunks = corpus();
    let index = TfIdfBuilder::default().build_index(&chunks);
    let q = index.vectorize(&chunks[2].text).unwrap();
    let s = index.score(&q, &[2]).unwrap();
    assert!((s[0] - 1.0).abs() < 1e-5, "{s:?}");
}

#[test]
fn scores_follow_candidate_order() {
    let index = TfIdfBuilder::default().build_index(&corpus());
    let q = index.vectorize("fraction numerator").unwrap();
    let s = index.score(&q, &[3, 2]).unwrap();
    assert_eq!(s.len(), 2);
    assert_eq!(s[0], 0.0);
    assert!(s[1] > 0.0);
}

#[test]
fn candidate_outside_the_index_is_an_error() {
    let index = TfIdfBuilder::default().build_index(&corpus());
    let q = index.vectorize("fraction numerator").unwrap();
    let err = index.score(&q, &[2, 99]).unwrap_err();
    assert!(matches!(err, RetrievalError::CandidateOutOfRange { position: 99, len: 4 }), "{err:?}");
}

#[test]
fn info_reports_tokenizer_and_vocabulary() {
    let index = TfIdfBuilder::new(10_000, 2, true).build_index(&corpus());
    let info = index.info();
    assert_eq!(info.kind, IndexKind::TfIdf);
    assert_eq!(info.entries, 4);
    assert!(info.dimensions > 0);
    assert!(info.tokenizer.contains("+stem"));
    assert!(matches!(index.vectorize("plants").unwrap(), QueryVector::Sparse(_)));
}
