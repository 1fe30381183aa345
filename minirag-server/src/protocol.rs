use minirag::{Answer, Page, SearchResult};
use serde::{Deserialize, Serialize};

pub type SessionId = String;

pub const MAX_TOP_K: i64 = 8;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionCreateRequest {
    /// Reopen a session whose index was persisted by an earlier process.
    #[serde(default)]
    pub session_id: Option<SessionId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionCreateResponse {
    pub session_id: SessionId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub top_k: Option<i64>,
}

impl QueryRequest {
    /// The requested `top_k` (or `default`), or a message describing why it
    /// is invalid. Non-positive values mean "retrieve nothing".
    pub fn effective_top_k(&self, default: usize) -> Result<usize, String> {
        let default = i64::try_from(default).unwrap_or(MAX_TOP_K).min(MAX_TOP_K);
        match self.top_k.unwrap_or(default) {
            k if k > MAX_TOP_K => Err(format!("top_k must be at most {MAX_TOP_K}, got {k}")),
            k if k <= 0 => Ok(0),
            k => Ok(k as usize),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub text: String,
    pub source: String,
    pub page: Page,
    pub score: f32,
}

impl From<SearchResult> for RetrievedChunk {
    fn from(result: SearchResult) -> Self {
        let SearchResult { chunk, score } = result;
        Self { text: chunk.text, source: chunk.metadata.source, page: chunk.metadata.page, score }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub answer: String,
    pub refused: bool,
    pub results: Vec<RetrievedChunk>,
}

impl From<Answer> for QueryResponse {
    fn from(answer: Answer) -> Self {
        Self {
            answer: answer.text,
            refused: answer.refused,
            results: answer.retrieved.into_iter().map(RetrievedChunk::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreResponse {
    pub chunk_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: String,
    pub message: String,
}
