//! Property tests for exhaustive cosine search ordering.

use minirag::{Chunk, DocumentMetadata, Page, VectorIndex, cosine_similarity};
use proptest::prelude::*;

const DIM: usize = 16;

/// Generate a non-zero L2-normalized embedding of the given dimension.
fn arb_normalized_embedding(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0f32, dim).prop_filter_map("non-zero embedding", |mut v| {
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm < 1e-8 {
            return None;
        }
        for val in &mut v {
            *val /= norm;
        }
        Some(v)
    })
}

fn chunk(i: usize, text: String, embedding: Vec<f32>) -> Chunk {
    Chunk {
        id: format!("0:doc.md#0/{i}"),
        document_id: "0:doc.md#0".to_string(),
        chunk_index: i,
        text,
        embedding,
        metadata: DocumentMetadata { source: "doc.md".to_string(), page: Page::NotApplicable },
    }
}

fn arb_index() -> impl Strategy<Value = VectorIndex> {
    proptest::collection::vec(("[a-z ]{5,30}", arb_normalized_embedding(DIM)), 1..20).prop_map(
        |items| {
            let chunks = items
                .into_iter()
                .enumerate()
                .map(|(i, (text, embedding))| chunk(i, text, embedding))
                .collect();
            VectorIndex::new("test-model", DIM, chunks).unwrap()
        },
    )
}

/// *For any* index and query, search returns at most `top_k` results ordered
/// by descending cosine similarity, and no unreturned chunk scores higher
/// than the last returned one.
mod prop_search_ordering {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn results_ordered_descending_and_bounded_by_top_k(
            index in arb_index(),
            query in arb_normalized_embedding(DIM),
            top_k in 1usize..25,
        ) {
            let results = index.search(&query, top_k);

            prop_assert_eq!(results.len(), top_k.min(index.len()));
            for pair in results.windows(2) {
                prop_assert!(pair[0].score >= pair[1].score);
            }

            if let Some(last) = results.last() {
                let returned: Vec<&str> = results.iter().map(|r| r.chunk.id.as_str()).collect();
                for c in index.chunks().iter().filter(|c| !returned.contains(&c.id.as_str())) {
                    prop_assert!(cosine_similarity(&c.embedding, &query) <= last.score);
                }
            }
        }

        #[test]
        fn scores_match_cosine_similarity(
            index in arb_index(),
            query in arb_normalized_embedding(DIM),
        ) {
            for result in index.search(&query, index.len()) {
                let expected = cosine_similarity(&result.chunk.embedding, &query);
                prop_assert!((result.score - expected).abs() < 1e-6);
                prop_assert!(result.score >= -1.0 - 1e-5 && result.score <= 1.0 + 1e-5);
            }
        }
    }
}

#[test]
fn ties_keep_insertion_order() {
    let chunks = (0..5).map(|i| chunk(i, format!("copy {i}"), vec![1.0, 0.0])).collect();
    let index = VectorIndex::new("test-model", 2, chunks).unwrap();

    let results = index.search(&[1.0, 0.0], 3);
    let ids: Vec<&str> = results.iter().map(|r| r.chunk.id.as_str()).collect();
    assert_eq!(ids, vec!["0:doc.md#0/0", "0:doc.md#0/1", "0:doc.md#0/2"]);
}

#[test]
fn zero_top_k_and_empty_index_return_nothing() {
    let index = VectorIndex::new("test-model", 2, vec![chunk(0, "a".into(), vec![1.0, 0.0])]).unwrap();
    assert!(index.search(&[1.0, 0.0], 0).is_empty());

    let empty = VectorIndex::new("test-model", 2, Vec::new()).unwrap();
    assert!(empty.search(&[1.0, 0.0], 4).is_empty());
}
