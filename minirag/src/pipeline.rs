//! RAG pipeline orchestrator.
//!
//! The [`RagPipeline`] coordinates the two phases of the system by composing
//! a [`DocumentLoader`], a [`Chunker`], an [`EmbeddingProvider`], and an
//! [`AnswerGenerator`]:
//!
//! - **indexing**: load → chunk → embed → persist, producing a [`VectorIndex`]
//! - **querying**: embed query → search → generate
//!
//! The pipeline holds no index itself; callers keep the [`VectorIndex`] it
//! returns (see [`RagSession`](crate::RagSession)).
//!
//! # Example
//!
//! ```rust,ignore
//! use minirag::{FileIndexStorage, RagConfig, RagPipeline, UploadedFile};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(my_embedder))
//!     .chat_model(Arc::new(my_model))
//!     .build()?;
//!
//! let storage = FileIndexStorage::new("vectorstore/index.json");
//! let report = pipeline.index_files(&files, &storage).await?;
//! let answer = pipeline.answer(&report.index, "How long is the warranty?", 4).await?;
//! ```

use std::sync::Arc;

use tracing::{error, info};

use crate::chunking::{Chunker, RecursiveChunker};
use crate::config::RagConfig;
use crate::document::{Chunk, Document, SearchResult};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::generator::{Answer, AnswerGenerator, ChatModel, is_refusal};
use crate::loader::{DocumentLoader, LoadFailure, LoadReport, UploadedFile};
#[cfg(feature = "openai")]
use crate::openai::{OpenAIChatModel, OpenAIConfig, OpenAIEmbeddingProvider};
use crate::storage::IndexStorage;
use crate::vectorstore::VectorIndex;

/// Outcome of indexing an upload batch.
#[derive(Debug, Clone)]
pub struct IngestReport {
    /// The freshly built (and persisted) index.
    pub index: VectorIndex,
    /// Number of documents (pages or whole files) that were loaded.
    pub document_count: usize,
    /// Files that failed to load and were left out of the index.
    pub failures: Vec<LoadFailure>,
    /// Files with an unsupported extension.
    pub skipped: Vec<String>,
}

/// The RAG pipeline orchestrator.
///
/// Construct one via [`RagPipeline::builder()`] or [`RagPipeline::openai()`].
pub struct RagPipeline {
    config: RagConfig,
    loader: DocumentLoader,
    chunker: Arc<dyn Chunker>,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    generator: AnswerGenerator,
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Build a pipeline that talks to the OpenAI API, using the models and
    /// timeout from `config`.
    ///
    /// `config.embedding_dimensions` overrides the vector size for embedding
    /// models the client does not know.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmbeddingService`] or [`RagError::GenerationService`]
    /// if the corresponding client cannot be created (for example because the
    /// API key is missing).
    #[cfg(feature = "openai")]
    pub fn openai(config: RagConfig, openai: OpenAIConfig) -> Result<Self> {
        let openai = openai.with_timeout(config.request_timeout());
        let mut embedder = OpenAIEmbeddingProvider::new(openai.clone())?
            .with_model(config.embedding_model.clone())
            .with_batch_size(config.embedding_batch_size);
        if let Some(dims) = config.embedding_dimensions {
            embedder = embedder.with_expected_dimensions(dims);
        }
        let chat = OpenAIChatModel::new(openai)?.with_model(config.chat_model.clone());

        Self::builder()
            .config(config)
            .embedding_provider(Arc::new(embedder))
            .chat_model(Arc::new(chat))
            .build()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a reference to the embedding provider.
    pub fn embedding_provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedding_provider
    }

    /// Return a reference to the document loader.
    pub fn loader(&self) -> &DocumentLoader {
        &self.loader
    }

    /// Load uploads into documents, isolating per-file failures.
    pub fn load(&self, files: &[UploadedFile]) -> LoadReport {
        self.loader.load(files)
    }

    /// Split documents into chunks, in reading order.
    pub fn chunk(&self, documents: &[Document]) -> Vec<Chunk> {
        self.chunker.chunk_all(documents)
    }

    /// Embed every chunk and persist the resulting index, replacing whatever
    /// `storage` held before.
    ///
    /// The build is atomic: if embedding or writing fails, nothing is
    /// persisted and the previous index at `storage` is untouched.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::IndexBuild`] wrapping the embedding or storage
    /// failure.
    pub async fn build(&self, chunks: Vec<Chunk>, storage: &dyn IndexStorage) -> Result<VectorIndex> {
        let index = self.embed_chunks(chunks).await.map_err(|e| {
            error!(error = %e, "embedding failed during index build");
            RagError::index_build(e)
        })?;

        storage.save(&index).map_err(|e| {
            error!(location = %storage.location(), error = %e, "failed to persist index");
            RagError::index_build(e)
        })?;

        info!(chunk_count = index.len(), location = %storage.location(), "built index");
        Ok(index)
    }

    async fn embed_chunks(&self, mut chunks: Vec<Chunk>) -> Result<VectorIndex> {
        let provider = &self.embedding_provider;
        if !chunks.is_empty() {
            let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
            let embeddings = provider.embed_batch(&texts).await?;

            if embeddings.len() != chunks.len() {
                return Err(RagError::EmbeddingService {
                    provider: provider.model().to_string(),
                    message: format!(
                        "received {} embeddings for {} chunks",
                        embeddings.len(),
                        chunks.len()
                    ),
                });
            }
            for (chunk, embedding) in chunks.iter_mut().zip(embeddings) {
                chunk.embedding = embedding;
            }
        }

        VectorIndex::new(provider.model(), provider.dimensions(), chunks).map_err(|message| {
            RagError::EmbeddingService { provider: provider.model().to_string(), message }
        })
    }

    /// Run the whole indexing phase for an upload batch: load → chunk → build.
    ///
    /// Files that fail to load are reported and left out.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Load`] if every loadable file failed (there is
    /// nothing to index), or [`RagError::IndexBuild`] if the build fails.
    pub async fn index_files(
        &self,
        files: &[UploadedFile],
        storage: &dyn IndexStorage,
    ) -> Result<IngestReport> {
        let LoadReport { documents, failures, skipped } = self.load(files);

        if documents.is_empty() {
            if let Some(first) = failures.first() {
                return Err(RagError::Load {
                    source_name: first.source.clone(),
                    message: first.message.clone(),
                });
            }
        }

        let chunks = self.chunk(&documents);
        info!(document_count = documents.len(), chunk_count = chunks.len(), "chunked upload batch");

        let index = self.build(chunks, storage).await?;
        Ok(IngestReport { index, document_count: documents.len(), failures, skipped })
    }

    /// Reload a previously persisted index and check it matches this
    /// pipeline's embedding space.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::StoreLoad`] if nothing is persisted, the data is
    /// corrupt, or it was built with a different model or dimension.
    pub fn load_index(&self, storage: &dyn IndexStorage) -> Result<VectorIndex> {
        let index = storage.load()?;
        let provider = &self.embedding_provider;

        if index.embedding_model() != provider.model() {
            return Err(RagError::StoreLoad {
                path: storage.location(),
                message: format!(
                    "index was built with '{}', current embedding model is '{}'",
                    index.embedding_model(),
                    provider.model()
                ),
            });
        }
        if index.dimensions() != provider.dimensions() {
            return Err(RagError::StoreLoad {
                path: storage.location(),
                message: format!(
                    "index has {}-dimensional vectors, current embedding model produces {}",
                    index.dimensions(),
                    provider.dimensions()
                ),
            });
        }

        info!(chunk_count = index.len(), location = %storage.location(), "restored index");
        Ok(index)
    }

    /// Return the `top_k` chunks most similar to `query`.
    ///
    /// `top_k == 0` or an empty index returns an empty result without
    /// calling the embedding service.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmbeddingService`] if the query cannot be embedded.
    pub async fn retrieve(
        &self,
        index: &VectorIndex,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        if top_k == 0 || index.is_empty() {
            return Ok(Vec::new());
        }

        let query_embedding = self.embedding_provider.embed(query).await.map_err(|e| {
            error!(error = %e, "embedding failed during query");
            e
        })?;

        if query_embedding.len() != index.dimensions() {
            return Err(RagError::EmbeddingService {
                provider: self.embedding_provider.model().to_string(),
                message: format!(
                    "query embedding has {} dimensions, index expects {}",
                    query_embedding.len(),
                    index.dimensions()
                ),
            });
        }

        let results = index.search(&query_embedding, top_k);
        info!(top_k, result_count = results.len(), "retrieved context");
        Ok(results)
    }

    /// Generate an answer to `query` grounded in `results`, in the given order.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::GenerationService`] if the model call fails.
    pub async fn generate(&self, query: &str, results: &[SearchResult]) -> Result<String> {
        let chunks: Vec<&Chunk> = results.iter().map(|r| &r.chunk).collect();
        self.generator.generate(query, &chunks).await
    }

    /// Run the whole querying phase: retrieve → generate.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmbeddingService`] or [`RagError::GenerationService`].
    pub async fn answer(&self, index: &VectorIndex, query: &str, top_k: usize) -> Result<Answer> {
        let retrieved = self.retrieve(index, query, top_k).await?;
        let text = self.generate(query, &retrieved).await?;
        Ok(Answer { refused: is_refusal(&text), text, retrieved })
    }
}

impl std::fmt::Debug for RagPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RagPipeline")
            .field("config", &self.config)
            .field("loader", &self.loader)
            .field("embedding_model", &self.embedding_provider.model())
            .field("generator", &self.generator)
            .finish()
    }
}

/// Builder for constructing a [`RagPipeline`].
///
/// `config`, `embedding_provider` and `chat_model` are required. The chunker
/// defaults to a [`RecursiveChunker`] sized from the config, and the loader
/// to PDF + Markdown.
///
/// # Example
///
/// ```rust,ignore
/// let pipeline = RagPipeline::builder()
///     .config(RagConfig::default())
///     .embedding_provider(Arc::new(embedder))
///     .chat_model(Arc::new(model))
///     .loader(DocumentLoader::new(registry))  // optional
///     .build()?;
/// ```
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    loader: Option<DocumentLoader>,
    chunker: Option<Arc<dyn Chunker>>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    chat_model: Option<Arc<dyn ChatModel>>,
    system_prompt: Option<String>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the document loader.
    pub fn loader(mut self, loader: DocumentLoader) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Set the document chunker.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the chat model used for answer generation.
    pub fn chat_model(mut self, model: Arc<dyn ChatModel>) -> Self {
        self.chat_model = Some(model);
        self
    }

    /// Override the system instruction sent with every question.
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Build the [`RagPipeline`], validating that all required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if any required field is missing.
    pub fn build(self) -> Result<RagPipeline> {
        let config =
            self.config.ok_or_else(|| RagError::Config("config is required".to_string()))?;
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::Config("embedding_provider is required".to_string()))?;
        let chat_model =
            self.chat_model.ok_or_else(|| RagError::Config("chat_model is required".to_string()))?;

        let chunker = self.chunker.unwrap_or_else(|| {
            Arc::new(RecursiveChunker::new(config.chunk_size, config.chunk_overlap))
        });
        let mut generator = AnswerGenerator::new(chat_model);
        if let Some(prompt) = self.system_prompt {
            generator = generator.with_system_prompt(prompt);
        }

        Ok(RagPipeline {
            config,
            loader: self.loader.unwrap_or_default(),
            chunker,
            embedding_provider,
            generator,
        })
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::generator::ChatMessage;

    struct FixedEmbedder;

    #[async_trait]
    impl EmbeddingProvider for FixedEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0, 0.0])
        }

        fn dimensions(&self) -> usize {
            2
        }

        fn model(&self) -> &str {
            "fixed"
        }
    }

    struct SilentModel;

    #[async_trait]
    impl ChatModel for SilentModel {
        async fn complete(&self, _messages: &[ChatMessage], _temperature: f32) -> Result<String> {
            Ok(String::new())
        }

        fn model(&self) -> &str {
            "silent"
        }
    }

    #[test]
    fn builder_requires_each_component() {
        let err = RagPipeline::builder().build().unwrap_err();
        assert!(err.to_string().contains("config is required"));

        let err = RagPipeline::builder().config(RagConfig::default()).build().unwrap_err();
        assert!(err.to_string().contains("embedding_provider is required"));

        let err = RagPipeline::builder()
            .config(RagConfig::default())
            .embedding_provider(Arc::new(FixedEmbedder))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("chat_model is required"));
    }

    #[test]
    fn default_chunker_follows_config() {
        let config = RagConfig::builder().chunk_size(10).chunk_overlap(2).build().unwrap();
        let pipeline = RagPipeline::builder()
            .config(config)
            .embedding_provider(Arc::new(FixedEmbedder))
            .chat_model(Arc::new(SilentModel))
            .build()
            .unwrap();

        let doc = Document {
            id: "0:a.md#0".into(),
            text: "a".repeat(25),
            metadata: crate::document::DocumentMetadata {
                source: "a.md".into(),
                page: crate::document::Page::NotApplicable,
            },
        };
        let chunks = pipeline.chunk(&[doc]);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.text.chars().count() <= 10));
    }

    #[cfg(feature = "openai")]
    #[test]
    fn openai_constructor_rejects_missing_key() {
        let err = RagPipeline::openai(RagConfig::default(), OpenAIConfig::new("")).unwrap_err();
        assert_eq!(err.kind(), "embedding_service");
    }
}
