//! Document question answering over uploaded PDF and Markdown files.
//!
//! This crate provides:
//! - Per-page PDF and whole-file Markdown loading with per-file isolation
//! - Recursive character chunking with exact overlap
//! - An exhaustive cosine-similarity index, persisted as JSON
//! - Grounded answer generation that refuses when the context is insufficient
//! - OpenAI clients for embeddings and chat completions
//!
//! Use [`RagPipeline`] to run the indexing and querying phases, and
//! [`RagSession`] to hold the live index between requests.

pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod generator;
pub mod loader;
#[cfg(feature = "openai")]
pub mod openai;
pub mod pipeline;
pub mod session;
pub mod storage;
pub mod vectorstore;

pub use chunking::{Chunker, DEFAULT_SEPARATORS, RecursiveChunker};
pub use config::{RagConfig, RagConfigBuilder};
pub use document::{Chunk, Document, DocumentMetadata, Page, SearchResult};
pub use embedding::EmbeddingProvider;
pub use error::{RagError, Result};
pub use generator::{
    ANSWER_TEMPERATURE, Answer, AnswerGenerator, ChatMessage, ChatModel, REFUSAL_ANSWER, Role,
    SYSTEM_PROMPT, is_refusal,
};
pub use loader::{
    DocumentLoader, DocumentParser, LoadFailure, LoadReport, ParsedUnit, ParserRegistry,
    PdfParser, TextParser, UploadedFile,
};
#[cfg(feature = "openai")]
pub use openai::{OpenAIChatModel, OpenAIConfig, OpenAIEmbeddingProvider};
pub use pipeline::{IngestReport, RagPipeline, RagPipelineBuilder};
pub use session::{IngestSummary, RagSession};
pub use storage::{FileIndexStorage, IndexStorage, MemoryIndexStorage};
pub use vectorstore::{INDEX_FORMAT_VERSION, VectorIndex, cosine_similarity};
