//! Error types for the `minirag` crate.

use thiserror::Error;

/// Errors that can occur in RAG operations.
///
/// Every stage of the pipeline reports failures through its own variant so
/// callers can tell a bad upload from an unreachable model service.
#[derive(Debug, Error)]
pub enum RagError {
    /// An uploaded file could not be read or parsed.
    #[error("Failed to load '{source_name}': {message}")]
    Load {
        /// Original filename of the upload.
        source_name: String,
        /// A description of the failure.
        message: String,
    },

    /// The remote embedding service failed or rejected the request.
    #[error("Embedding service error ({provider}): {message}")]
    EmbeddingService {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The remote chat completion service failed or rejected the request.
    #[error("Generation service error ({provider}): {message}")]
    GenerationService {
        /// The chat model provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// Building the vector index failed. No partial index was persisted.
    #[error("Index build failed: {source}")]
    IndexBuild {
        /// The failure that aborted the build.
        #[source]
        source: Box<RagError>,
    },

    /// A persisted index is missing, corrupt, or incompatible.
    #[error("Failed to load index from '{path}': {message}")]
    StoreLoad {
        /// Location of the persisted index.
        path: String,
        /// A description of the failure.
        message: String,
    },

    /// Writing the index to its persisted location failed.
    #[error("Failed to write index to '{path}': {message}")]
    StoreWrite {
        /// Location of the persisted index.
        path: String,
        /// A description of the failure.
        message: String,
    },

    /// A query was issued before any index was built or restored.
    #[error("No documents have been indexed yet")]
    NotIndexed,

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RagError {
    /// Wrap a failure as an [`RagError::IndexBuild`].
    pub fn index_build(source: RagError) -> Self {
        Self::IndexBuild { source: Box::new(source) }
    }

    /// A stable snake_case name for the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Load { .. } => "load",
            Self::EmbeddingService { .. } => "embedding_service",
            Self::GenerationService { .. } => "generation_service",
            Self::IndexBuild { .. } => "index_build",
            Self::StoreLoad { .. } => "store_load",
            Self::StoreWrite { .. } => "store_write",
            Self::NotIndexed => "not_indexed",
            Self::Config(_) => "config",
        }
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_build_keeps_cause() {
        let err = RagError::index_build(RagError::EmbeddingService {
            provider: "OpenAI".into(),
            message: "API returned 401".into(),
        });
        assert_eq!(err.kind(), "index_build");
        assert!(err.to_string().contains("API returned 401"));
        let source = std::error::Error::source(&err).map(|e| e.to_string());
        assert_eq!(source.as_deref(), Some("Embedding service error (OpenAI): API returned 401"));
    }
}
