//! Document chunking.
//!
//! This module provides the [`Chunker`] trait and [`RecursiveChunker`], which
//! cuts text into overlapping windows, preferring paragraph breaks, then
//! line breaks, then word breaks, and only falling back to a hard cut when
//! none of them fit.

use crate::document::{Chunk, Document};

/// Boundaries tried in order of preference.
pub const DEFAULT_SEPARATORS: [&str; 3] = ["\n\n", "\n", " "];

/// A strategy for splitting documents into chunks.
///
/// Implementations produce [`Chunk`]s with text and metadata but no embeddings.
/// Embeddings are attached later when the index is built.
pub trait Chunker: Send + Sync {
    /// Split a document into chunks in reading order.
    ///
    /// Returns an empty `Vec` if the document has no non-whitespace text.
    fn chunk(&self, document: &Document) -> Vec<Chunk>;

    /// Split every document, concatenating the chunks in document order.
    fn chunk_all(&self, documents: &[Document]) -> Vec<Chunk> {
        documents.iter().flat_map(|document| self.chunk(document)).collect()
    }
}

/// Splits text into windows of at most `chunk_size` characters where each
/// window starts exactly `chunk_overlap` characters before the previous one
/// ended.
///
/// The end of each window is placed after the last separator that leaves
/// more than `chunk_overlap` characters in the window, trying separators in
/// order. Sizes are counted in Unicode scalar values, never bytes.
///
/// # Example
///
/// ```rust,ignore
/// use minirag::RecursiveChunker;
///
/// let chunker = RecursiveChunker::new(450, 80);
/// let chunks = chunker.chunk(&document);
/// ```
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl RecursiveChunker {
    /// Create a new `RecursiveChunker` with the default separators.
    ///
    /// # Arguments
    ///
    /// * `chunk_size`: maximum number of characters per chunk
    /// * `chunk_overlap`: number of characters shared by consecutive chunks
    ///
    /// `chunk_overlap` is clamped below `chunk_size` so every window advances.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Replace the separator list. An empty list always hard-cuts.
    pub fn with_separators<I, S>(mut self, separators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.separators =
            separators.into_iter().map(Into::into).filter(|s: &String| !s.is_empty()).collect();
        self
    }

    /// Maximum chunk length in characters.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Characters shared by consecutive chunks.
    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split raw text into window strings.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        // offsets[i] is the byte offset of the i-th character; the final entry is text.len().
        let offsets: Vec<usize> =
            text.char_indices().map(|(i, _)| i).chain(std::iter::once(text.len())).collect();
        let char_count = offsets.len() - 1;

        let mut windows = Vec::new();
        let mut start = 0;
        loop {
            if char_count - start <= self.chunk_size {
                windows.push(text[offsets[start]..].to_string());
                break;
            }

            let end = self.find_cut(text, &offsets, start);
            windows.push(text[offsets[start]..offsets[end]].to_string());
            start = end - self.chunk_overlap;
        }

        windows
    }

    /// Pick the end (exclusive, in characters) of the window starting at `start`.
    fn find_cut(&self, text: &str, offsets: &[usize], start: usize) -> usize {
        let limit = start + self.chunk_size;
        let min_end = start + self.chunk_overlap + 1;

        for separator in &self.separators {
            let sep_chars = separator.chars().count();
            let earliest = min_end.max(start + sep_chars);
            let found = (earliest..=limit)
                .rev()
                .find(|&end| &text[offsets[end - sep_chars]..offsets[end]] == separator.as_str());
            if let Some(end) = found {
                return end;
            }
        }

        limit
    }
}

impl Default for RecursiveChunker {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_CHUNK_SIZE, crate::config::DEFAULT_CHUNK_OVERLAP)
    }
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        self.split_text(&document.text)
            .into_iter()
            .enumerate()
            .map(|(i, text)| Chunk {
                id: format!("{}/{i}", document.id),
                document_id: document.id.clone(),
                chunk_index: i,
                text,
                embedding: Vec::new(),
                metadata: document.metadata.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DocumentMetadata, Page};

    fn doc(text: &str) -> Document {
        Document {
            id: "0:guide.md#0".into(),
            text: text.into(),
            metadata: DocumentMetadata { source: "guide.md".into(), page: Page::NotApplicable },
        }
    }

    #[test]
    fn short_text_is_one_chunk() {
        let chunks = RecursiveChunker::new(450, 80).chunk(&doc("The warranty period is 24 months."));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "The warranty period is 24 months.");
        assert_eq!(chunks[0].id, "0:guide.md#0/0");
        assert_eq!(chunks[0].metadata.source, "guide.md");
    }

    #[test]
    fn whitespace_only_text_yields_nothing() {
        let chunker = RecursiveChunker::new(10, 2);
        assert!(chunker.chunk(&doc("")).is_empty());
        assert!(chunker.chunk(&doc(" \n\n \t")).is_empty());
    }

    #[test]
    fn prefers_paragraph_break() {
        let chunker = RecursiveChunker::new(20, 4);
        let windows = chunker.split_text("aaaa aaaa\n\nbbbb bbbb cccc");
        assert_eq!(windows[0], "aaaa aaaa\n\n");
    }

    #[test]
    fn falls_back_to_line_then_word() {
        let chunker = RecursiveChunker::new(12, 2);
        assert_eq!(chunker.split_text("abcd efg\nhijklmnop")[0], "abcd efg\n");
        assert_eq!(chunker.split_text("abcd efgh ijklmnop")[0], "abcd efgh ");
    }

    #[test]
    fn hard_cuts_without_separators() {
        let chunker = RecursiveChunker::new(5, 2);
        assert_eq!(chunker.split_text("abcdefghij"), vec!["abcde", "defgh", "ghij"]);
    }

    #[test]
    fn separator_too_close_to_start_is_ignored() {
        // The only space sits inside the overlap region, so cutting there
        // would not advance the window.
        let chunker = RecursiveChunker::new(6, 3);
        assert_eq!(chunker.split_text("ab cdefghi")[0], "ab cde");
    }

    #[test]
    fn counts_characters_not_bytes() {
        let chunker = RecursiveChunker::new(4, 1);
        let windows = chunker.split_text("äöüßéèêë");
        assert!(windows.iter().all(|w| w.chars().count() <= 4));
        assert_eq!(windows[0], "äöüß");
        assert_eq!(windows[1], "ßéèê");
    }

    #[test]
    fn custom_separators_replace_defaults() {
        let chunker = RecursiveChunker::new(8, 1).with_separators(["|"]);
        assert_eq!(chunker.split_text("ab|cd ef gh")[0], "ab|");
    }

    #[test]
    fn overlap_is_clamped_below_size() {
        let chunker = RecursiveChunker::new(3, 10);
        assert_eq!(chunker.chunk_overlap(), 2);
        assert_eq!(chunker.split_text("abcdef").len(), 4);
    }

    #[test]
    fn chunk_all_keeps_document_order() {
        let chunker = RecursiveChunker::new(450, 80);
        let mut second = doc("second");
        second.id = "1:other.md#0".into();
        let chunks = chunker.chunk_all(&[doc("first"), second]);
        assert_eq!(chunks.iter().map(|c| c.text.as_str()).collect::<Vec<_>>(), ["first", "second"]);
    }
}
