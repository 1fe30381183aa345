use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use minirag::{IngestSummary, RagError, RagPipeline, RagSession, UploadedFile};
use serde_json::json;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};

use crate::{
    protocol::{
        ErrorBody, QueryRequest, QueryResponse, RestoreResponse, SessionCreateRequest,
        SessionCreateResponse,
    },
    session::SessionManager,
};

/// Upper bound on one upload request.
const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

#[derive(Clone, Debug)]
pub struct AppState {
    pub sessions: SessionManager,
}

impl AppState {
    pub fn new(pipeline: Arc<RagPipeline>, index_dir: Option<PathBuf>) -> Self {
        Self { sessions: SessionManager::new(pipeline, index_dir) }
    }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub index_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".to_string(), port: 8099, index_dir: PathBuf::from("vectorstore") }
    }
}

impl ServerConfig {
    /// Read `MINIRAG_HOST`, `MINIRAG_PORT` and `MINIRAG_INDEX_DIR`, falling
    /// back to the defaults.
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();
        let port = match std::env::var("MINIRAG_PORT") {
            Ok(value) => value.parse::<u16>().with_context(|| format!("invalid MINIRAG_PORT '{value}'"))?,
            Err(_) => defaults.port,
        };
        Ok(Self {
            host: std::env::var("MINIRAG_HOST").unwrap_or(defaults.host),
            port,
            index_dir: std::env::var("MINIRAG_INDEX_DIR").map(PathBuf::from).unwrap_or(defaults.index_dir),
        })
    }
}

pub fn app_router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/api/sessions", post(create_session))
        .route(
            "/api/sessions/{session_id}/documents",
            post(upload_documents).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/api/sessions/{session_id}/restore", post(restore_index))
        .route("/api/sessions/{session_id}/query", post(query))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub async fn run_server(config: ServerConfig, pipeline: RagPipeline) -> anyhow::Result<()> {
    let state = AppState::new(Arc::new(pipeline), Some(config.index_dir.clone()));
    let app = app_router(state);
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| "invalid host/port for minirag server")?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(index_dir = %config.index_dir.display(), "minirag listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

/// An error rendered as `{kind, message}` with a status per kind.
#[derive(Debug)]
pub enum ApiError {
    Rag(RagError),
    UnknownSession(String),
    BadRequest(String),
}

impl From<RagError> for ApiError {
    fn from(err: RagError) -> Self {
        Self::Rag(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

pub fn status_for(err: &RagError) -> StatusCode {
    match err {
        RagError::NotIndexed => StatusCode::CONFLICT,
        RagError::Load { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        RagError::EmbeddingService { .. }
        | RagError::GenerationService { .. }
        | RagError::IndexBuild { .. } => StatusCode::BAD_GATEWAY,
        RagError::StoreLoad { .. } => StatusCode::NOT_FOUND,
        RagError::StoreWrite { .. } | RagError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match self {
            Self::Rag(err) => (status_for(&err), err.kind().to_string(), err.to_string()),
            Self::UnknownSession(id) => {
                (StatusCode::NOT_FOUND, "session_not_found".to_string(), format!("unknown session '{id}'"))
            }
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, "bad_request".to_string(), message),
        };
        if status.is_server_error() {
            error!(%status, kind, message, "request failed");
        } else {
            warn!(%status, kind, message, "request rejected");
        }
        (status, Json(ErrorBody { kind, message })).into_response()
    }
}

async fn session(state: &AppState, session_id: &str) -> Result<Arc<RagSession>, ApiError> {
    state.sessions.get(session_id).await.ok_or_else(|| ApiError::UnknownSession(session_id.to_string()))
}

async fn index() -> impl IntoResponse {
    Html(include_str!("../ui/index.html"))
}

async fn health() -> impl IntoResponse {
    Json(json!({"status":"ok","service":"minirag"}))
}

async fn create_session(
    State(state): State<AppState>,
    body: Option<Json<SessionCreateRequest>>,
) -> Result<Json<SessionCreateResponse>, ApiError> {
    let requested = body.and_then(|Json(request)| request.session_id);
    let session_id = match requested {
        Some(id) => state
            .sessions
            .open_session(&id)
            .await
            .ok_or_else(|| ApiError::BadRequest(format!("session_id '{id}' is not a UUID")))?,
        None => state.sessions.create_session().await,
    };
    Ok(Json(SessionCreateResponse { session_id }))
}

async fn upload_documents(
    Path(session_id): Path<String>,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<IngestSummary>, ApiError> {
    let session = session(&state, &session_id).await?;

    let mut files = Vec::new();
    while let Some(field) =
        multipart.next_field().await.map_err(|e| ApiError::BadRequest(e.body_text()))?
    {
        let Some(name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let bytes = field.bytes().await.map_err(|e| ApiError::BadRequest(e.body_text()))?;
        files.push(UploadedFile::new(name, bytes.to_vec()));
    }
    if files.is_empty() {
        return Err(ApiError::BadRequest("no files uploaded".to_string()));
    }

    info!(session_id, files = files.len(), "ingesting upload");
    let summary = session.ingest(&files).await?;
    Ok(Json(summary))
}

async fn restore_index(
    Path(session_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<RestoreResponse>, ApiError> {
    let session = session(&state, &session_id).await?;
    let chunk_count = session.restore().await?;
    Ok(Json(RestoreResponse { chunk_count }))
}

async fn query(
    Path(session_id): Path<String>,
    State(state): State<AppState>,
    request: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>, ApiError> {
    let session = session(&state, &session_id).await?;
    let Json(request) = request?;

    if request.query.trim().is_empty() {
        return Err(ApiError::BadRequest("query must not be empty".to_string()));
    }
    let top_k = request
        .effective_top_k(session.pipeline().config().top_k)
        .map_err(ApiError::BadRequest)?;

    let answer = session.ask(&request.query, top_k).await?;
    info!(session_id, top_k, refused = answer.refused, "answered query");
    Ok(Json(QueryResponse::from(answer)))
}
