use std::sync::Arc;

use ncertqa_core::error::RetrievalError;
use ncertqa_core::traits::{Embedder, IndexBuilder, Indexer};
use ncertqa_core::types::{Chunk, Grade, IndexKind, Language, QueryVector, SparseVector, Subject};
use ncertqa_embed::{DenseBuilder, HashingEmbedder};

fn chunk(id: &str, text: &str) -> Arc<Chunk> {
    Arc::new(Chunk {
        id: id.to_string(),
        text: text.to_string(),
        grade: Grade::new(7).unwrap(),
        subject: Subject::Science,
        chapter: "Heat".to_string(),
        page: 22,
        source_file: "class7_science.pdf".to_string(),
        language: Language::English,
    })
}

fn corpus() -> Vec<Arc<Chunk>> {
    vec![
        chunk("a", "Heat flows from a hotter object to a colder object by conduction."),
        chunk("b", "Sea breeze blows from the sea towards the land during the day."),
        chunk("c", "Woollen clothes keep us warm because wool traps air."),
    ]
}

#[test]
fn matching_chunk_ranks_first() {
    let index = DenseBuilder::new(Arc::new(HashingEmbedder::default())).build(&corpus()).expect("build");
    let q = index.vectorize("conduction of heat").unwrap();
    let s = index.score(&q, &[0, 1, 2]).unwrap();
    assert!(s[0] > s[1] && s[0] > s[2], "{s:?}");
    assert!(s.iter().all(|v| (0.0..=1.0 + 1e-5).contains(v)));
}

#[test]
fn rebuild_is_deterministic() {
    let chunks = corpus();
    let builder = DenseBuilder::new(Arc::new(HashingEmbedder::new(128, false)));
    let a = builder.build(&chunks).unwrap();
    let b = builder.build(&chunks).unwrap();
    let q = a.vectorize("sea breeze").unwrap();
    assert_eq!(a.score(&q, &[0, 1, 2]).unwrap(), b.score(&q, &[0, 1, 2]).unwrap());
    let info = a.info();
    assert_eq!(info.kind, IndexKind::Dense);
    assert_eq!(info.dimensions, 128);
    assert_eq!(info.entries, 3);
}

#[test]
fn sparse_query_is_rejected() {
    let index = DenseBuilder::new(Arc::new(HashingEmbedder::default())).build(&corpus()).unwrap();
    let err = index.score(&QueryVector::Sparse(SparseVector::default()), &[0]).unwrap_err();
    assert!(matches!(err, RetrievalError::QueryVectorMismatch { indexer: "dense", .. }));
}

#[test]
fn candidate_outside_the_index_is_an_error() {
    let index = DenseBuilder::new(Arc::new(HashingEmbedder::default())).build(&corpus()).unwrap();
    let q = index.vectorize("conduction of heat").unwrap();
    let err = index.score(&q, &[0, 3]).unwrap_err();
    assert!(matches!(err, RetrievalError::CandidateOutOfRange { position: 3, len: 3 }), "{err:?}");
}

struct ShortEmbedder;

impl Embedder for ShortEmbedder {
    fn id(&self) -> &str {
        "short"
    }
    fn dim(&self) -> usize {
        4
    }
    fn max_len(&self) -> usize {
        8
    }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RetrievalError> {
        Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
    }
}

#[test]
fn wrong_dimensions_fail_the_build() {
    let result = DenseBuilder::new(Arc::new(ShortEmbedder)).build(&corpus());
    assert!(matches!(result, Err(RetrievalError::Embedding(_))));
}
