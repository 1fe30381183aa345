//! A live index plus the pipeline that answers questions against it.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use crate::document::SearchResult;
use crate::error::{RagError, Result};
use crate::generator::Answer;
use crate::loader::{LoadFailure, UploadedFile};
use crate::pipeline::RagPipeline;
use crate::storage::IndexStorage;
use crate::vectorstore::VectorIndex;

/// Summary of a completed ingest.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestSummary {
    pub document_count: usize,
    pub chunk_count: usize,
    pub failures: Vec<LoadFailure>,
    pub skipped: Vec<String>,
}

/// One user's working set: a pipeline, where its index is persisted, and the
/// index currently used for queries.
///
/// Every successful ingest replaces the whole index. A failed ingest leaves
/// the previous index (in memory and on disk) in place. Queries see either
/// the old or the new index, never a partial one.
pub struct RagSession {
    pipeline: Arc<RagPipeline>,
    storage: Arc<dyn IndexStorage>,
    index: RwLock<Option<Arc<VectorIndex>>>,
    ingest_lock: Mutex<()>,
}

impl RagSession {
    pub fn new(pipeline: Arc<RagPipeline>, storage: Arc<dyn IndexStorage>) -> Self {
        Self { pipeline, storage, index: RwLock::new(None), ingest_lock: Mutex::new(()) }
    }

    pub fn pipeline(&self) -> &RagPipeline {
        &self.pipeline
    }

    /// Where this session persists its index.
    pub fn storage_location(&self) -> String {
        self.storage.location()
    }

    /// The index currently used for queries, if any.
    pub async fn index(&self) -> Option<Arc<VectorIndex>> {
        self.index.read().await.clone()
    }

    pub async fn is_indexed(&self) -> bool {
        self.index.read().await.is_some()
    }

    /// Build a new index from `files` and make it current.
    ///
    /// Ingests are serialized so the persisted index always matches the one
    /// in memory.
    pub async fn ingest(&self, files: &[UploadedFile]) -> Result<IngestSummary> {
        let _guard = self.ingest_lock.lock().await;

        let report = self.pipeline.index_files(files, self.storage.as_ref()).await?;
        let summary = IngestSummary {
            document_count: report.document_count,
            chunk_count: report.index.len(),
            failures: report.failures,
            skipped: report.skipped,
        };
        if !summary.failures.is_empty() {
            warn!(failed = summary.failures.len(), "some uploads were not indexed");
        }

        *self.index.write().await = Some(Arc::new(report.index));
        info!(chunk_count = summary.chunk_count, "session index replaced");
        Ok(summary)
    }

    /// Reload the persisted index and make it current. Returns its chunk count.
    ///
    /// On failure the current index, if any, stays in use.
    pub async fn restore(&self) -> Result<usize> {
        let _guard = self.ingest_lock.lock().await;

        let index = self.pipeline.load_index(self.storage.as_ref())?;
        let count = index.len();
        *self.index.write().await = Some(Arc::new(index));
        Ok(count)
    }

    /// Return the `top_k` chunks most relevant to `query`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::NotIndexed`] if nothing has been ingested or restored.
    pub async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<SearchResult>> {
        let index = self.current().await?;
        self.pipeline.retrieve(&index, query, top_k).await
    }

    /// Answer `query` from the current index.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::NotIndexed`] if nothing has been ingested or restored.
    pub async fn ask(&self, query: &str, top_k: usize) -> Result<Answer> {
        let index = self.current().await?;
        self.pipeline.answer(&index, query, top_k).await
    }

    async fn current(&self) -> Result<Arc<VectorIndex>> {
        self.index.read().await.clone().ok_or(RagError::NotIndexed)
    }
}

impl std::fmt::Debug for RagSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RagSession")
            .field("pipeline", &self.pipeline)
            .field("storage", &self.storage.location())
            .finish()
    }
}
