use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use super::{OpenAIConfig, PROVIDER, describe_error_response, describe_send_error};
use crate::config::DEFAULT_EMBEDDING_MODEL;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};

/// Output dimensionality of the OpenAI embedding models we know about.
fn known_dimensions(model: &str) -> Option<usize> {
    match model {
        "text-embedding-3-small" | "text-embedding-ada-002" => Some(1536),
        "text-embedding-3-large" => Some(3072),
        _ => None,
    }
}

fn service_error(message: impl Into<String>) -> RagError {
    RagError::EmbeddingService { provider: PROVIDER.into(), message: message.into() }
}

/// An [`EmbeddingProvider`] backed by the OpenAI embeddings API.
///
/// Calls `POST {base_url}/embeddings`. Response vectors are reordered by
/// their `index` field, and their count and length are checked, before being
/// returned.
///
/// # Example
///
/// ```rust,ignore
/// use minirag::openai::{OpenAIConfig, OpenAIEmbeddingProvider};
///
/// let provider = OpenAIEmbeddingProvider::new(OpenAIConfig::from_env())?;
/// let embedding = provider.embed("hello world").await?;
/// ```
pub struct OpenAIEmbeddingProvider {
    client: reqwest::Client,
    config: OpenAIConfig,
    model: String,
    dimensions: usize,
    /// If set, passed to the API for Matryoshka dimension truncation.
    request_dimensions: Option<usize>,
    batch_size: usize,
}

impl OpenAIEmbeddingProvider {
    /// Create a provider for `text-embedding-3-small` (1536 dimensions).
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmbeddingService`] if the API key is empty or the
    /// HTTP client cannot be built.
    pub fn new(config: OpenAIConfig) -> Result<Self> {
        let client = config.http_client().map_err(service_error)?;
        Ok(Self {
            client,
            config,
            model: DEFAULT_EMBEDDING_MODEL.into(),
            dimensions: 1536,
            request_dimensions: None,
            batch_size: 256,
        })
    }

    /// Set the model name (e.g. `text-embedding-3-large`).
    ///
    /// For models with a known output size this also updates
    /// [`dimensions()`](EmbeddingProvider::dimensions); for others call
    /// [`with_dimensions`](Self::with_dimensions).
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        if let Some(dims) = known_dimensions(&self.model) {
            self.dimensions = dims;
        }
        self
    }

    /// Set the size of the vectors the endpoint returns without asking it to
    /// truncate them. Use this for models outside the OpenAI catalogue.
    pub fn with_expected_dimensions(mut self, dims: usize) -> Self {
        self.dimensions = dims;
        self.request_dimensions = None;
        self
    }

    /// Set the output dimensions (Matryoshka support).
    ///
    /// When set, the API returns embeddings truncated to this size.
    pub fn with_dimensions(mut self, dims: usize) -> Self {
        self.dimensions = dims;
        self.request_dimensions = Some(dims);
        self
    }

    /// Set the maximum number of inputs per request.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    async fn request(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let request_body = EmbeddingRequest {
            model: &self.model,
            input: texts,
            dimensions: self.request_dimensions,
        };

        let response = self
            .client
            .post(self.config.endpoint("embeddings"))
            .bearer_auth(&self.config.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                error!(provider = PROVIDER, error = %e, "embedding request failed");
                service_error(describe_send_error(&e, self.config.timeout))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            error!(provider = PROVIDER, %status, "embedding API error");
            return Err(service_error(describe_error_response(response).await));
        }

        let body: EmbeddingResponse = response.json().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "failed to parse embedding response");
            service_error(format!("failed to parse response: {e}"))
        })?;

        self.order_and_check(body.data, texts.len())
    }

    fn order_and_check(&self, mut data: Vec<EmbeddingData>, expected: usize) -> Result<Vec<Vec<f32>>> {
        if data.len() != expected {
            return Err(service_error(format!(
                "API returned {} embeddings for {expected} inputs",
                data.len()
            )));
        }
        data.sort_by_key(|d| d.index);
        if data.iter().enumerate().any(|(i, d)| d.index != i) {
            return Err(service_error("API returned embeddings with inconsistent indices"));
        }
        if let Some(bad) = data.iter().find(|d| d.embedding.len() != self.dimensions) {
            return Err(service_error(format!(
                "API returned a {}-dimensional embedding, expected {}",
                bad.embedding.len(),
                self.dimensions
            )));
        }
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }
}

// ── OpenAI API request/response types ──────────────────────────────

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

// ── EmbeddingProvider implementation ───────────────────────────────

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!(provider = PROVIDER, text_len = text.len(), "embedding single text");

        let results = self.embed_batch(&[text]).await?;
        results.into_iter().next().ok_or_else(|| service_error("API returned empty response"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut results = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            debug!(
                provider = PROVIDER,
                batch_size = batch.len(),
                model = %self.model,
                "embedding batch"
            );
            results.extend(self.request(batch).await?);
        }
        Ok(results)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> OpenAIEmbeddingProvider {
        OpenAIEmbeddingProvider::new(OpenAIConfig::new("test-key")).unwrap().with_dimensions(2)
    }

    #[test]
    fn missing_key_is_embedding_service_error() {
        let err = OpenAIEmbeddingProvider::new(OpenAIConfig::new("")).err().unwrap();
        assert_eq!(err.kind(), "embedding_service");
    }

    #[test]
    fn with_model_updates_known_dimensions() {
        let p = OpenAIEmbeddingProvider::new(OpenAIConfig::new("k"))
            .unwrap()
            .with_model("text-embedding-3-large");
        assert_eq!(p.dimensions(), 3072);
        assert_eq!(p.model(), "text-embedding-3-large");
    }

    #[test]
    fn expected_dimensions_are_not_requested() {
        let p = OpenAIEmbeddingProvider::new(OpenAIConfig::new("k"))
            .unwrap()
            .with_model("nomic-embed-text")
            .with_expected_dimensions(768);
        assert_eq!(p.dimensions(), 768);
        assert_eq!(p.request_dimensions, None);
    }

    #[test]
    fn response_is_reordered_by_index() {
        let data = vec![
            EmbeddingData { index: 1, embedding: vec![0.0, 1.0] },
            EmbeddingData { index: 0, embedding: vec![1.0, 0.0] },
        ];
        let ordered = provider().order_and_check(data, 2).unwrap();
        assert_eq!(ordered, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn wrong_count_or_dimension_is_rejected() {
        let one = vec![EmbeddingData { index: 0, embedding: vec![1.0, 0.0] }];
        assert!(provider().order_and_check(one, 2).is_err());

        let short = vec![EmbeddingData { index: 0, embedding: vec![1.0] }];
        let err = provider().order_and_check(short, 1).unwrap_err();
        assert!(err.to_string().contains("1-dimensional"));
    }
}
