//! Thin HTTP surface over the pipeline.
//!
//! Three endpoints: `POST /chat` runs the full conversational pipeline,
//! `GET /health` reports per-collaborator reachability without touching
//! the pipeline, and `GET /api/entitlements` is the direct holdings
//! lookup (a pure database read, no LLM involved).

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tower_http::cors::CorsLayer;

use crate::config::{AppConfig, APP_VERSION};
use crate::db::{self, repository, DatabaseError};
use crate::llm::ollama::OllamaChatModel;
use crate::llm::OllamaClient;
use crate::pipeline::index::{
    build_entitlement_index, IndexError, OllamaEmbedder, SqliteVectorIndex,
};
use crate::pipeline::rag::memory::SessionStore;
use crate::pipeline::rag::orchestrator::{AssistantPipeline, PipelineOptions};
use crate::pipeline::rag::types::VectorIndex;
use crate::store::SqliteStore;

/// Default dimension for the nomic-style embedding models we deploy with.
const EMBEDDING_DIMENSION: usize = 768;

/// The concretely-wired pipeline served by the binary.
pub type GrantlyPipeline =
    AssistantPipeline<OllamaChatModel, OllamaEmbedder, SqliteVectorIndex, SqliteStore>;

#[derive(Error, Debug)]
pub enum StartupError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("Bind failed on {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },
}

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<GrantlyPipeline>,
    pub ollama: Arc<OllamaClient>,
    pub db_path: PathBuf,
}

/// Wire the collaborators and build the pipeline.
///
/// Opens separate connections for the structured store and the vector
/// index, and (re)builds the vector index at startup when it is empty —
/// a failed build is logged and degraded, not fatal, since semantic
/// retrieval already degrades per request.
pub fn build_state(config: &AppConfig) -> Result<AppState, StartupError> {
    let store_conn = db::open_database(&config.database_path)?;
    let index_conn = db::open_database(&config.database_path)?;

    let embedder = OllamaEmbedder::new(
        &config.ollama_base_url,
        &config.embedding_model,
        EMBEDDING_DIMENSION,
        config.llm_timeout_secs,
    );
    let index = SqliteVectorIndex::new(index_conn);

    if index.count().unwrap_or(0) == 0 {
        let corpus_conn = db::open_database(&config.database_path)?;
        match build_entitlement_index(&corpus_conn, &embedder, &index) {
            Ok(indexed) => tracing::info!(indexed, "Built entitlement vector index"),
            Err(e) => {
                tracing::warn!(error = %e, "Vector index build failed; semantic retrieval will degrade")
            }
        }
    }

    let llm = OllamaClient::new(&config.ollama_base_url, config.llm_timeout_secs)
        .with_model(config.generation_model.clone());

    let pipeline = AssistantPipeline::new(
        llm,
        embedder,
        index,
        SqliteStore::new(store_conn),
        SessionStore::new(config.session_ttl_minutes),
        PipelineOptions {
            semantic_top_n: config.semantic_top_n,
            sql_row_cap: config.sql_row_cap,
        },
    );

    Ok(AppState {
        pipeline: Arc::new(pipeline),
        ollama: Arc::new(OllamaClient::new(
            &config.ollama_base_url,
            config.llm_timeout_secs,
        )),
        db_path: config.database_path.clone(),
    })
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/chat", post(chat))
        .route("/health", get(health))
        .route("/api/entitlements", get(entitlements_by_email))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve until the process is stopped.
pub async fn serve(config: AppConfig, state: AppState) -> Result<(), StartupError> {
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .map_err(|source| StartupError::Bind {
            addr: config.bind_addr.clone(),
            source,
        })?;

    // Idle-session sweeper: memory stays bounded by active conversations.
    let sweeper = Arc::clone(&state.pipeline);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(300));
        loop {
            interval.tick().await;
            let evicted = sweeper.memory().evict_expired();
            if evicted > 0 {
                tracing::debug!(evicted, "Evicted idle sessions");
            }
        }
    });

    tracing::info!(addr = %config.bind_addr, "Grantly listening");
    axum::serve(listener, router(state))
        .await
        .map_err(|source| StartupError::Bind {
            addr: config.bind_addr,
            source,
        })
}

// ═══════════════════════════════════════════
// Error type
// ═══════════════════════════════════════════

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m),
            ApiError::Internal(m) => {
                tracing::error!(error = %m, "Internal API error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal server error occurred.".to_string(),
                )
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

// ═══════════════════════════════════════════
// POST /chat
// ═══════════════════════════════════════════

#[derive(Deserialize)]
pub struct ChatRequest {
    pub query: String,
    pub session_id: Option<String>,
}

#[derive(Serialize)]
pub struct ChatResponse {
    pub reply: String,
    pub session_id: String,
}

async fn chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    if req.query.trim().is_empty() {
        return Err(ApiError::BadRequest("'query' field is required".into()));
    }

    let session_id = req
        .session_id
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let pipeline = Arc::clone(&state.pipeline);
    let query = req.query;
    let reply_session = session_id.clone();

    // The pipeline does blocking I/O (rusqlite + blocking HTTP); keep it
    // off the async workers.
    let reply = tokio::task::spawn_blocking(move || pipeline.submit_query(&reply_session, &query))
        .await
        .map_err(|e| ApiError::Internal(format!("Pipeline task failed: {e}")))?;

    Ok(Json(ChatResponse { reply, session_id }))
}

// ═══════════════════════════════════════════
// GET /health
// ═══════════════════════════════════════════

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub structured_store_ok: bool,
    pub query_interface_ok: bool,
    pub vector_index_ok: bool,
}

async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    let db_path = state.db_path.clone();
    let ollama = Arc::clone(&state.ollama);

    let response = tokio::task::spawn_blocking(move || {
        let structured_store_ok = db::open_database(&db_path)
            .and_then(|conn| db::count_tables(&conn))
            .map(|tables| tables > 0)
            .unwrap_or(false);

        let vector_index_ok = db::open_database(&db_path)
            .ok()
            .map(SqliteVectorIndex::new)
            .and_then(|index| index.count().ok())
            .is_some();

        let query_interface_ok = ollama.list_models().is_ok();

        let status = if structured_store_ok && query_interface_ok && vector_index_ok {
            "ok"
        } else {
            "degraded"
        };

        HealthResponse {
            status,
            version: APP_VERSION,
            structured_store_ok,
            query_interface_ok,
            vector_index_ok,
        }
    })
    .await
    .map_err(|e| ApiError::Internal(format!("Health task failed: {e}")))?;

    Ok(Json(response))
}

// ═══════════════════════════════════════════
// GET /api/entitlements?email=
// ═══════════════════════════════════════════

#[derive(Deserialize)]
pub struct LookupParams {
    pub email: Option<String>,
}

#[derive(Serialize)]
pub struct LookupResponse {
    pub email: String,
    pub employee_id_found: i64,
    pub entitlements: Vec<String>,
}

async fn entitlements_by_email(
    State(state): State<AppState>,
    Query(params): Query<LookupParams>,
) -> Result<Json<LookupResponse>, ApiError> {
    let email = params
        .email
        .filter(|e| !e.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing 'email' query parameter".into()))?;

    let db_path = state.db_path.clone();
    let lookup_email = email.clone();

    let holdings = tokio::task::spawn_blocking(move || {
        let conn = db::open_database(&db_path)?;
        repository::get_holdings_by_email(&conn, &lookup_email)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("Lookup task failed: {e}")))?
    .map_err(|e| ApiError::Internal(e.to_string()))?;

    match holdings {
        Some((employee_id, entitlements)) => Ok(Json(LookupResponse {
            email,
            employee_id_found: employee_id,
            entitlements,
        })),
        None => Err(ApiError::NotFound(format!(
            "Employee not found for email: {email}"
        ))),
    }
}
