use std::fs;
use tempfile::TempDir;

use ncertqa_core::corpus::CorpusStore;
use ncertqa_core::error::IngestionError;
use ncertqa_core::types::{Filters, Grade, Language, Subject};

const NESTED: &str = r#"{"id": "5__science__p15__c0", "text": "Plants convert sunlight into energy through photosynthesis.", "metadata": {"grade": "5", "subject": "science", "chapter": "Food for plants", "page_no": 15, "source_file": "class5_science.pdf", "language": "en"}}"#;
const FLAT: &str = r#"{"id": "6__math__p3__c0", "text": "A fraction names part of a whole.", "grade": 6, "subject": "Math", "page": 3, "source_file": "class6_math.pdf", "language": "English"}"#;

#[test]
fn load_directory_with_nested_and_flat_records() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    fs::write(dir.join("a_chunks.jsonl"), format!("{NESTED}\n\n{FLAT}\n")).unwrap();

    let store = CorpusStore::load(&[dir]).expect("load");

    assert_eq!(store.len(), 2);
    assert!(store.rejected().is_empty());
    let sci = store.find("5__science__p15__c0").expect("science chunk");
    assert_eq!(sci.grade.get(), 5);
    assert_eq!(sci.subject, Subject::Science);
    assert_eq!(sci.chapter, "Food for plants");
    assert_eq!(sci.page, 15);
    assert_eq!(sci.source_file, "class5_science.pdf");
    assert_eq!(sci.language, Language::English);
    let math = store.find("6__math__p3__c0").expect("math chunk");
    assert_eq!(math.subject, Subject::Math);
    assert_eq!(math.chapter, "");
}

#[test]
fn grade_falls_back_to_file_name() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("class 8_chunks.jsonl");
    fs::write(&path, r#"{"id": "x1", "text": "The Mughal empire", "metadata": {"subject": "social science", "page_no": 40, "source_file": "history8.pdf"}}"#).unwrap();

    let store = CorpusStore::load(&[&path]).expect("load");
    let chunk = store.find("x1").unwrap();
    assert_eq!(chunk.grade.get(), 8);
    assert_eq!(chunk.language, Language::Unknown);
    assert_eq!(store.filter(&Filters::new().grade(Grade::new(8).unwrap())).len(), 1);
}

#[test]
fn bad_records_are_skipped_and_reported() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    let lines = [
        NESTED,
        "{not json",
        r#"{"id": "no-page", "text": "something", "grade": 5, "subject": "science", "source_file": "a.pdf"}"#,
        r#"{"id": "blank", "text": "   ", "grade": 5, "subject": "science", "page": 1, "source_file": "a.pdf"}"#,
        r#"{"id": "bad-subject", "text": "t", "grade": 5, "subject": "astrology", "page": 1, "source_file": "a.pdf"}"#,
    ];
    fs::write(dir.join("one.jsonl"), lines.join("\n")).unwrap();
    fs::write(dir.join("two.jsonl"), NESTED).unwrap();

    let store = CorpusStore::load(&[dir]).expect("load");

    assert_eq!(store.len(), 1);
    let rejected = store.rejected();
    assert_eq!(rejected.len(), 5, "{rejected:?}");
    assert_eq!(rejected[0].line, Some(2));
    assert!(rejected.iter().any(|r| r.reason.contains("missing page")));
    assert!(rejected.iter().any(|r| r.reason.contains("empty text")));
    assert!(rejected.iter().any(|r| r.reason.starts_with("duplicate id")));
    assert!(rejected.iter().any(|r| r.id.as_deref() == Some("bad-subject")));
}

#[test]
fn unrecognised_language_keeps_the_chunk() {
    let tmp = TempDir::new().unwrap();
    let nepali = r#"{"id": "5__science__p16__c0", "text": "Leaves are green.", "grade": 5, "subject": "science", "page": 16, "source_file": "class5_science.pdf", "language": "ne"}"#;
    fs::write(tmp.path().join("c.jsonl"), format!("{NESTED}\n{nepali}\n")).unwrap();

    let store = CorpusStore::load(&[tmp.path()]).expect("load");
    assert_eq!(store.len(), 2);
    assert!(store.rejected().is_empty(), "{:?}", store.rejected());
    assert_eq!(store.find("5__science__p16__c0").unwrap().language, Language::Unknown);
    assert_eq!(store.find("5__science__p15__c0").unwrap().language, Language::English);
}

#[test]
fn empty_corpus_fails_with_rejections() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("bad.jsonl"), "{oops}\n").unwrap();

    match CorpusStore::load(&[tmp.path()]) {
        Err(IngestionError::EmptyCorpus { rejected }) => assert_eq!(rejected.len(), 1),
        other => panic!("expected EmptyCorpus, got {other:?}"),
    }
}

#[test]
fn missing_source_is_an_io_error() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("nope");
    assert!(matches!(CorpusStore::load(&[missing]), Err(IngestionError::Io { .. })));
}

#[test]
fn stats_count_per_grade_and_subject() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("c.jsonl"), format!("{NESTED}\n{FLAT}\n")).unwrap();
    let stats = CorpusStore::load(&[tmp.path()]).unwrap().stats();
    assert_eq!(stats.chunks, 2);
    assert_eq!(stats.per_grade.get(&Grade::new(5).unwrap()), Some(&1));
    assert_eq!(stats.per_subject.get(&Subject::Math), Some(&1));
    assert_eq!(stats.rejected, 0);
}
