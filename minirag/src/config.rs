//! Configuration for the RAG pipeline.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Default maximum chunk length in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 450;
/// Default overlap between consecutive chunks in characters.
pub const DEFAULT_CHUNK_OVERLAP: usize = 80;
/// Default number of chunks retrieved per query.
pub const DEFAULT_TOP_K: usize = 4;
/// Default embedding model.
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
/// Default chat completion model.
pub const DEFAULT_CHAT_MODEL: &str = "gpt-3.5-turbo";

/// Configuration parameters for the RAG pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RagConfig {
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Number of overlapping characters between consecutive chunks.
    pub chunk_overlap: usize,
    /// Number of chunks to retrieve when the caller does not specify one.
    pub top_k: usize,
    /// Embedding model identifier sent to the embedding service.
    pub embedding_model: String,
    /// Chat model identifier sent to the completion service.
    pub chat_model: String,
    /// Maximum number of texts sent in one embedding request.
    pub embedding_batch_size: usize,
    /// Timeout applied to every remote call, in seconds.
    pub request_timeout_secs: u64,
    /// Vector size of the embedding model, for models whose size the
    /// OpenAI client does not know.
    pub embedding_dimensions: Option<usize>,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            top_k: DEFAULT_TOP_K,
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            embedding_batch_size: 256,
            request_timeout_secs: 30,
            embedding_dimensions: None,
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// The per-request timeout as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Build a configuration from `MINIRAG_*` environment variables,
    /// falling back to defaults for unset variables.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if a variable is set but cannot be
    /// parsed, or the resulting configuration is invalid.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let mut builder = Self::builder()
            .chunk_size(env_or("MINIRAG_CHUNK_SIZE", defaults.chunk_size)?)
            .chunk_overlap(env_or("MINIRAG_CHUNK_OVERLAP", defaults.chunk_overlap)?)
            .top_k(env_or("MINIRAG_TOP_K", defaults.top_k)?)
            .embedding_batch_size(env_or(
                "MINIRAG_EMBEDDING_BATCH_SIZE",
                defaults.embedding_batch_size,
            )?)
            .request_timeout_secs(env_or(
                "MINIRAG_REQUEST_TIMEOUT_SECS",
                defaults.request_timeout_secs,
            )?);

        if let Ok(model) = std::env::var("MINIRAG_EMBEDDING_MODEL") {
            builder = builder.embedding_model(model);
        }
        if let Ok(model) = std::env::var("MINIRAG_CHAT_MODEL") {
            builder = builder.chat_model(model);
        }
        if std::env::var_os("MINIRAG_EMBEDDING_DIMENSIONS").is_some() {
            builder = builder.embedding_dimensions(env_or("MINIRAG_EMBEDDING_DIMENSIONS", 0)?);
        }

        builder.build()
    }
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| RagError::Config(format!("{key}: cannot parse '{raw}': {e}"))),
        Err(_) => Ok(default),
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the maximum chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the default number of chunks to retrieve.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the embedding model identifier.
    pub fn embedding_model(mut self, model: impl Into<String>) -> Self {
        self.config.embedding_model = model.into();
        self
    }

    /// Set the chat model identifier.
    pub fn chat_model(mut self, model: impl Into<String>) -> Self {
        self.config.chat_model = model.into();
        self
    }

    /// Set the maximum number of texts per embedding request.
    pub fn embedding_batch_size(mut self, size: usize) -> Self {
        self.config.embedding_batch_size = size;
        self
    }

    /// Set the timeout applied to every remote call.
    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    /// Set the vector size of the embedding model.
    pub fn embedding_dimensions(mut self, dims: usize) -> Self {
        self.config.embedding_dimensions = Some(dims);
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if:
    /// - `chunk_size == 0`
    /// - `chunk_overlap >= chunk_size`
    /// - `top_k == 0`
    /// - `embedding_batch_size == 0`
    /// - `request_timeout_secs == 0`
    /// - `embedding_dimensions == Some(0)`
    pub fn build(self) -> Result<RagConfig> {
        let config = self.config;
        if config.chunk_size == 0 {
            return Err(RagError::Config("chunk_size must be greater than zero".to_string()));
        }
        if config.chunk_overlap >= config.chunk_size {
            return Err(RagError::Config(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                config.chunk_overlap, config.chunk_size
            )));
        }
        if config.top_k == 0 {
            return Err(RagError::Config("top_k must be greater than zero".to_string()));
        }
        if config.embedding_batch_size == 0 {
            return Err(RagError::Config(
                "embedding_batch_size must be greater than zero".to_string(),
            ));
        }
        if config.request_timeout_secs == 0 {
            return Err(RagError::Config(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if config.embedding_dimensions == Some(0) {
            return Err(RagError::Config(
                "embedding_dimensions must be greater than zero".to_string(),
            ));
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_settings() {
        let config = RagConfig::builder().build().unwrap();
        assert_eq!(config.chunk_size, 450);
        assert_eq!(config.chunk_overlap, 80);
        assert_eq!(config.top_k, 4);
        assert_eq!(config.embedding_model, "text-embedding-3-small");
        assert_eq!(config.chat_model, "gpt-3.5-turbo");
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn rejects_overlap_not_smaller_than_size() {
        let err = RagConfig::builder().chunk_size(100).chunk_overlap(100).build().unwrap_err();
        assert!(matches!(err, RagError::Config(msg) if msg.contains("chunk_overlap")));
    }

    #[test]
    fn rejects_zero_values() {
        assert!(RagConfig::builder().chunk_size(0).chunk_overlap(0).build().is_err());
        assert!(RagConfig::builder().top_k(0).build().is_err());
        assert!(RagConfig::builder().embedding_batch_size(0).build().is_err());
        assert!(RagConfig::builder().request_timeout_secs(0).build().is_err());
        assert!(RagConfig::builder().embedding_dimensions(0).build().is_err());
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config: RagConfig = serde_json::from_str(r#"{"chunk_size": 300}"#).unwrap();
        assert_eq!(config.chunk_size, 300);
        assert_eq!(config.chunk_overlap, DEFAULT_CHUNK_OVERLAP);
        assert_eq!(config.embedding_dimensions, None);
    }

    #[test]
    fn embedding_dimensions_from_json() {
        let config: RagConfig =
            serde_json::from_str(r#"{"embedding_model": "nomic-embed-text", "embedding_dimensions": 768}"#)
                .unwrap();
        assert_eq!(config.embedding_dimensions, Some(768));
    }
}
