//! Property tests for recursive chunking.

use minirag::RecursiveChunker;
use proptest::prelude::*;

/// Text with a realistic mix of words, line breaks, paragraph breaks and
/// multi-byte characters.
fn arb_text() -> impl Strategy<Value = String> {
    proptest::collection::vec(
        prop_oneof![
            4 => "[a-zé]{1,12}",
            3 => Just(" ".to_string()),
            1 => Just("\n".to_string()),
            1 => Just("\n\n".to_string()),
            1 => "[ü€漢]{1,4}",
        ],
        1..200,
    )
    .prop_map(|parts| parts.concat())
    .prop_filter("has non-whitespace text", |t| !t.trim().is_empty())
}

/// Chunk size and an overlap strictly smaller than it.
fn arb_sizes() -> impl Strategy<Value = (usize, usize)> {
    (2usize..60).prop_flat_map(|size| (Just(size), 0..size))
}

fn chars(s: &str) -> Vec<char> {
    s.chars().collect()
}

mod prop_window_bounds {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn no_chunk_exceeds_chunk_size(text in arb_text(), (size, overlap) in arb_sizes()) {
            let windows = RecursiveChunker::new(size, overlap).split_text(&text);
            prop_assert!(!windows.is_empty());
            for window in &windows {
                prop_assert!(window.chars().count() <= size);
                prop_assert!(!window.is_empty());
            }
        }

        #[test]
        fn consecutive_chunks_share_exactly_the_overlap(
            text in arb_text(),
            (size, overlap) in arb_sizes(),
        ) {
            let windows = RecursiveChunker::new(size, overlap).split_text(&text);
            for pair in windows.windows(2) {
                let (prev, next) = (chars(&pair[0]), chars(&pair[1]));
                prop_assert!(prev.len() > overlap);
                prop_assert_eq!(&prev[prev.len() - overlap..], &next[..overlap]);
            }
        }

        #[test]
        fn chunks_reconstruct_the_text(text in arb_text(), (size, overlap) in arb_sizes()) {
            let windows = RecursiveChunker::new(size, overlap).split_text(&text);
            let mut rebuilt = windows[0].clone();
            for window in &windows[1..] {
                rebuilt.extend(window.chars().skip(overlap));
            }
            prop_assert_eq!(rebuilt, text);
        }

        #[test]
        fn chunking_is_deterministic(text in arb_text(), (size, overlap) in arb_sizes()) {
            let chunker = RecursiveChunker::new(size, overlap);
            prop_assert_eq!(chunker.split_text(&text), chunker.split_text(&text));
        }
    }
}

#[test]
fn paragraphs_are_kept_whole_when_they_fit() {
    let text = "The warranty period is 24 months.\n\nReturns are accepted within 30 days.";
    let windows = RecursiveChunker::new(40, 5).split_text(text);
    assert_eq!(windows[0], "The warranty period is 24 months.\n\n");
    assert!(windows[1].starts_with("hs.\n\nReturns"));
    assert!(windows.last().unwrap().ends_with("30 days."));
}

#[test]
fn long_word_is_hard_cut() {
    let text = "x".repeat(25);
    let windows = RecursiveChunker::new(10, 3).split_text(&text);
    assert_eq!(windows, vec!["x".repeat(10), "x".repeat(10), "x".repeat(10), "x".repeat(4)]);
}
