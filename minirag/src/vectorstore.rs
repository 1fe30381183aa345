//! In-memory vector index with exhaustive cosine similarity search.
//!
//! A [`VectorIndex`] is built once per upload batch and never mutated
//! afterwards; a new batch produces a new index. Search is a linear scan,
//! which is plenty for the few thousand chunks a session holds.

use serde::{Deserialize, Serialize};

use crate::document::{Chunk, SearchResult};

/// Version of the serialized index layout.
pub const INDEX_FORMAT_VERSION: u32 = 1;

/// Embedded chunks plus the embedding space they live in.
///
/// Every chunk carries exactly one vector of length [`dimensions`](Self::dimensions).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorIndex {
    format_version: u32,
    embedding_model: String,
    dimensions: usize,
    chunks: Vec<Chunk>,
}

impl VectorIndex {
    /// Create an index from chunks whose embeddings are already attached.
    ///
    /// # Errors
    ///
    /// Returns a description of the first chunk whose embedding length does
    /// not match `dimensions`.
    pub fn new(
        embedding_model: impl Into<String>,
        dimensions: usize,
        chunks: Vec<Chunk>,
    ) -> Result<Self, String> {
        let index = Self {
            format_version: INDEX_FORMAT_VERSION,
            embedding_model: embedding_model.into(),
            dimensions,
            chunks,
        };
        index.validate()?;
        Ok(index)
    }

    /// Check the layout version and that every vector has the index's dimension.
    pub fn validate(&self) -> Result<(), String> {
        if self.format_version != INDEX_FORMAT_VERSION {
            return Err(format!(
                "unsupported index format version {} (expected {INDEX_FORMAT_VERSION})",
                self.format_version
            ));
        }
        if let Some(chunk) = self.chunks.iter().find(|c| c.embedding.len() != self.dimensions) {
            return Err(format!(
                "chunk '{}' has a {}-dimensional embedding, index expects {}",
                chunk.id,
                chunk.embedding.len(),
                self.dimensions
            ));
        }
        Ok(())
    }

    /// Model that produced the stored vectors.
    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    /// Dimensionality of the stored vectors.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Stored chunks in insertion order.
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Number of stored chunks (and vectors).
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Whether the index holds no chunks.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Return the `top_k` chunks most similar to `embedding`.
    ///
    /// Results are ordered by descending cosine similarity; equal scores keep
    /// insertion order. An empty index or `top_k == 0` yields no results.
    pub fn search(&self, embedding: &[f32], top_k: usize) -> Vec<SearchResult> {
        if top_k == 0 || self.chunks.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(usize, f32)> = self
            .chunks
            .iter()
            .enumerate()
            .map(|(i, chunk)| (i, rank_score(cosine_similarity(&chunk.embedding, embedding))))
            .collect();

        // sort_by is stable, which keeps ties in insertion order.
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(top_k);

        scored
            .into_iter()
            .map(|(i, score)| SearchResult { chunk: self.chunks[i].clone(), score })
            .collect()
    }
}

/// Scores that overflowed to NaN or infinity rank last. Negative zero is
/// folded into zero so `total_cmp` treats them as a tie.
fn rank_score(score: f32) -> f32 {
    if !score.is_finite() {
        f32::NEG_INFINITY
    } else if score == 0.0 {
        0.0
    } else {
        score
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
