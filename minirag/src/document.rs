//! Data types for documents, chunks, and search results.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

/// Page reference of a loaded text unit.
///
/// Serialized as the bare page index, or the string `"N/A"` for formats
/// without pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    /// Zero-based page index within the source file.
    Number(usize),
    /// The source format has no notion of pages.
    NotApplicable,
}

const NOT_APPLICABLE: &str = "N/A";

impl fmt::Display for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::NotApplicable => f.write_str(NOT_APPLICABLE),
        }
    }
}

impl Serialize for Page {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Number(n) => serializer.serialize_u64(*n as u64),
            Self::NotApplicable => serializer.serialize_str(NOT_APPLICABLE),
        }
    }
}

impl<'de> Deserialize<'de> for Page {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(usize),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(Self::Number(n)),
            Raw::Text(text) if text == NOT_APPLICABLE => Ok(Self::NotApplicable),
            Raw::Text(text) => {
                Err(de::Error::custom(format!("expected page number or \"N/A\", got \"{text}\"")))
            }
        }
    }
}

/// Where a piece of text came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Original filename of the upload.
    pub source: String,
    /// Page of the source file, if the format has pages.
    pub page: Page,
}

/// A loaded text unit: one page of a PDF or one whole Markdown file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Identifier, unique within one upload batch.
    pub id: String,
    /// The extracted text.
    pub text: String,
    /// Source filename and page.
    pub metadata: DocumentMetadata,
}

/// A bounded window of a [`Document`]'s text, the unit of retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Identifier, `{document_id}/{chunk_index}`.
    pub id: String,
    /// The ID of the parent [`Document`].
    pub document_id: String,
    /// Position of this chunk within its parent document.
    pub chunk_index: usize,
    /// The chunk text.
    pub text: String,
    /// The vector embedding for this chunk's text. Empty until indexed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embedding: Vec<f32>,
    /// Verbatim copy of the parent document's metadata.
    pub metadata: DocumentMetadata,
}

/// A retrieved [`Chunk`] paired with a relevance score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// Cosine similarity to the query (higher is more relevant).
    pub score: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_serializes_as_number_or_na() {
        assert_eq!(serde_json::to_string(&Page::Number(3)).unwrap(), "3");
        assert_eq!(serde_json::to_string(&Page::NotApplicable).unwrap(), "\"N/A\"");
        assert_eq!(serde_json::from_str::<Page>("7").unwrap(), Page::Number(7));
        assert_eq!(serde_json::from_str::<Page>("\"N/A\"").unwrap(), Page::NotApplicable);
        assert!(serde_json::from_str::<Page>("\"seven\"").is_err());
    }

    #[test]
    fn page_display_matches_caption_format() {
        assert_eq!(Page::Number(0).to_string(), "0");
        assert_eq!(Page::NotApplicable.to_string(), "N/A");
    }
}
