use std::{collections::HashMap, path::PathBuf, sync::Arc};

use minirag::{FileIndexStorage, IndexStorage, MemoryIndexStorage, RagPipeline, RagSession};
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::protocol::SessionId;

const INDEX_FILE_NAME: &str = "index.json";

/// Owns every live session. Each session gets its own index file under
/// `index_dir/<session_id>/`, or in-memory storage when no directory is set.
#[derive(Clone)]
pub struct SessionManager {
    sessions: Arc<RwLock<HashMap<SessionId, Arc<RagSession>>>>,
    pipeline: Arc<RagPipeline>,
    index_dir: Option<PathBuf>,
}

impl SessionManager {
    pub fn new(pipeline: Arc<RagPipeline>, index_dir: Option<PathBuf>) -> Self {
        Self { sessions: Arc::default(), pipeline, index_dir }
    }

    pub async fn create_session(&self) -> SessionId {
        let session_id = Uuid::new_v4().to_string();
        self.insert(&session_id).await;
        session_id
    }

    /// Open a session under a caller-chosen id, reusing it if it is live.
    ///
    /// Returns `None` unless `session_id` is a UUID.
    pub async fn open_session(&self, session_id: &str) -> Option<SessionId> {
        let session_id = Uuid::parse_str(session_id).ok()?.to_string();
        if !self.has_session(&session_id).await {
            self.insert(&session_id).await;
        }
        Some(session_id)
    }

    pub async fn get(&self, session_id: &str) -> Option<Arc<RagSession>> {
        self.sessions.read().await.get(session_id).cloned()
    }

    pub async fn has_session(&self, session_id: &str) -> bool {
        self.sessions.read().await.contains_key(session_id)
    }

    async fn insert(&self, session_id: &str) {
        let storage: Arc<dyn IndexStorage> = match &self.index_dir {
            Some(dir) => Arc::new(FileIndexStorage::new(dir.join(session_id).join(INDEX_FILE_NAME))),
            None => Arc::new(MemoryIndexStorage::new()),
        };
        info!(session_id, location = %storage.location(), "opened session");

        let session = Arc::new(RagSession::new(self.pipeline.clone(), storage));
        self.sessions.write().await.entry(session_id.to_string()).or_insert(session);
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager").field("index_dir", &self.index_dir).finish()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use minirag::{ChatMessage, ChatModel, EmbeddingProvider, RagConfig};

    use super::*;

    struct UnitEmbedder;

    #[async_trait]
    impl EmbeddingProvider for UnitEmbedder {
        async fn embed(&self, _text: &str) -> minirag::Result<Vec<f32>> {
            Ok(vec![1.0])
        }

        fn dimensions(&self) -> usize {
            1
        }

        fn model(&self) -> &str {
            "unit"
        }
    }

    struct EchoModel;

    #[async_trait]
    impl ChatModel for EchoModel {
        async fn complete(&self, messages: &[ChatMessage], _temperature: f32) -> minirag::Result<String> {
            Ok(messages.last().map(|m| m.content.clone()).unwrap_or_default())
        }

        fn model(&self) -> &str {
            "echo"
        }
    }

    fn manager(index_dir: Option<PathBuf>) -> SessionManager {
        let pipeline = RagPipeline::builder()
            .config(RagConfig::default())
            .embedding_provider(Arc::new(UnitEmbedder))
            .chat_model(Arc::new(EchoModel))
            .build()
            .unwrap();
        SessionManager::new(Arc::new(pipeline), index_dir)
    }

    #[tokio::test]
    async fn reopening_a_live_session_reuses_it() {
        let sessions = manager(None);
        let id = sessions.create_session().await;
        let first = sessions.get(&id).await.unwrap();

        assert_eq!(sessions.open_session(&id).await.as_deref(), Some(id.as_str()));
        assert!(Arc::ptr_eq(&first, &sessions.get(&id).await.unwrap()));
    }

    #[tokio::test]
    async fn open_session_requires_a_uuid() {
        let sessions = manager(None);
        assert_eq!(sessions.open_session("../escape").await, None);
        assert!(!sessions.has_session("../escape").await);
    }

    #[tokio::test]
    async fn sessions_store_under_their_own_directory() {
        let dir = tempfile::tempdir().unwrap();
        let sessions = manager(Some(dir.path().to_path_buf()));
        let id = sessions.create_session().await;

        let location = sessions.get(&id).await.unwrap().storage_location();
        assert_eq!(location, dir.path().join(&id).join(INDEX_FILE_NAME).display().to_string());
    }
}
