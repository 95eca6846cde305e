//! HTTP API v1.
//!
//! Endpoints:
//!
//! - `GET   /v1/retrieval/peek`      — Semantic peek: histogram + snippets
//! - `GET   /v1/retrieval/turn/{id}` — Hydrate one turn to full content
//! - `POST  /v1/chat`                — Send a message, get an SSE stream
//! - `GET   /v1/sessions`            — List sessions
//! - `POST  /v1/sessions`            — Create a session
//! - `GET   /v1/sessions/{id}`       — Get a session with history
//! - `PATCH /v1/sessions/{id}`       — Rename / pin / archive a session

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::sse::{Event as SseEvent, Sse},
    response::Json,
    routing::{get, patch, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tracing::info;

use hindsight_agent::Orchestrator;
use hindsight_core::{
    ConversationId, Error, HydratedTurn, LedgerError, PeekResult, SessionDetail, SessionId,
    SessionLedger, SessionPatch, SessionSummary, TurnId,
};
use hindsight_retrieval::peek::PeekParams;
use hindsight_retrieval::{PeekEngine, TurnHydrator};

// ── State ─────────────────────────────────────────────────────────────────

/// Shared state for the v1 API.
pub struct ApiState {
    pub peek: Arc<PeekEngine>,
    pub hydrator: Arc<TurnHydrator>,
    pub orchestrator: Arc<Orchestrator>,
    pub ledger: Arc<dyn SessionLedger>,
}

pub type SharedApiState = Arc<ApiState>;

// ── Router ────────────────────────────────────────────────────────────────

/// Build the v1 API router. Nest this under "/v1" in the main router.
pub fn v1_router(state: SharedApiState) -> Router {
    Router::new()
        .route("/retrieval/peek", get(peek_handler))
        .route("/retrieval/turn/{id}", get(hydrate_handler))
        .route("/chat", post(chat_handler))
        .route("/sessions", get(list_sessions_handler))
        .route("/sessions", post(create_session_handler))
        .route("/sessions/{id}", get(get_session_handler))
        .route("/sessions/{id}", patch(patch_session_handler))
        .with_state(state)
}

// ── Request / Response types ──────────────────────────────────────────────

#[derive(Deserialize)]
struct PeekQuery {
    query: String,
    #[serde(default)]
    top_k: Option<usize>,
    #[serde(default)]
    top_n_snippets: Option<usize>,
    #[serde(default)]
    bin_days: Option<u32>,
    #[serde(default)]
    start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    conversation_id: Option<ConversationId>,
}

#[derive(Deserialize)]
struct ChatBody {
    /// Existing session ID (omit to create a new session).
    #[serde(default)]
    session_id: Option<SessionId>,
    /// The user's message.
    message: String,
}

#[derive(Deserialize)]
struct ArchivedQuery {
    #[serde(default)]
    include_archived: bool,
}

#[derive(Deserialize)]
struct CreateSessionRequest {
    #[serde(default)]
    title: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct CreateSessionResponse {
    id: SessionId,
    conversation_id: ConversationId,
}

#[derive(Serialize, Deserialize)]
struct SessionListResponse {
    sessions: Vec<SessionSummary>,
    count: usize,
}

#[derive(Serialize, Deserialize)]
struct ErrorResponse {
    error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

/// Map a domain error to an HTTP status + JSON body.
fn error_response(e: Error) -> ApiError {
    let status = match &e {
        Error::InvalidArgument(_) | Error::MalformedToolCall(_) => StatusCode::BAD_REQUEST,
        Error::TurnNotFound(_) => StatusCode::NOT_FOUND,
        Error::Ledger(LedgerError::SessionNotFound(_)) => StatusCode::NOT_FOUND,
        Error::Ledger(LedgerError::SessionArchived(_)) => StatusCode::CONFLICT,
        Error::Ledger(LedgerError::EmptyContent(_)) => StatusCode::BAD_REQUEST,
        e if e.is_upstream_unavailable() => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
}

fn ledger_error(e: LedgerError) -> ApiError {
    error_response(e.into())
}

// ── Retrieval handlers ────────────────────────────────────────────────────

async fn peek_handler(
    State(state): State<SharedApiState>,
    Query(q): Query<PeekQuery>,
) -> Result<Json<PeekResult>, ApiError> {
    let params = PeekParams {
        query: q.query,
        top_k: q.top_k,
        top_n_snippets: q.top_n_snippets,
        bin_days: q.bin_days,
        start_time: q.start_time,
        end_time: q.end_time,
        conversation_id: q.conversation_id,
    };
    let result = state.peek.peek(&params).await.map_err(error_response)?;
    info!(
        total = result.histogram.total,
        matches = result.matches.len(),
        "v1/retrieval/peek"
    );
    Ok(Json(result))
}

async fn hydrate_handler(
    State(state): State<SharedApiState>,
    Path(id): Path<String>,
) -> Result<Json<HydratedTurn>, ApiError> {
    let turn_id = TurnId::parse(&id)
        .map_err(|_| error_response(Error::InvalidArgument(format!("invalid turn id: {id}"))))?;
    let turn = state
        .hydrator
        .hydrate(turn_id)
        .await
        .map_err(error_response)?;
    Ok(Json(turn))
}

// ── Chat (SSE) ────────────────────────────────────────────────────────────

/// `POST /v1/chat` — send a message, receive the orchestration event stream.
async fn chat_handler(
    State(state): State<SharedApiState>,
    Json(payload): Json<ChatBody>,
) -> Result<Sse<impl futures::Stream<Item = Result<SseEvent, Infallible>>>, ApiError> {
    let (session_id, rx) = state
        .orchestrator
        .chat(payload.session_id, payload.message)
        .await
        .map_err(error_response)?;

    info!(session_id = %session_id, "v1/chat SSE stream opened");

    let stream = ReceiverStream::new(rx).map(|event| {
        let name = event.event_type();
        let data = serde_json::to_string(&event).unwrap_or_default();
        Ok(SseEvent::default().event(name).data(data))
    });

    Ok(Sse::new(stream))
}

// ── Session handlers ──────────────────────────────────────────────────────

async fn list_sessions_handler(
    State(state): State<SharedApiState>,
    Query(q): Query<ArchivedQuery>,
) -> Result<Json<SessionListResponse>, ApiError> {
    let sessions = state
        .ledger
        .list_sessions(q.include_archived)
        .await
        .map_err(ledger_error)?;
    let count = sessions.len();
    Ok(Json(SessionListResponse { sessions, count }))
}

async fn create_session_handler(
    State(state): State<SharedApiState>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<CreateSessionResponse>), ApiError> {
    let (id, conversation_id) = state
        .ledger
        .create_session(req.title)
        .await
        .map_err(ledger_error)?;
    Ok((
        StatusCode::CREATED,
        Json(CreateSessionResponse {
            id,
            conversation_id,
        }),
    ))
}

async fn get_session_handler(
    State(state): State<SharedApiState>,
    Path(id): Path<String>,
    Query(q): Query<ArchivedQuery>,
) -> Result<Json<SessionDetail>, ApiError> {
    let session_id = SessionId::parse(&id)
        .map_err(|_| error_response(Error::InvalidArgument(format!("invalid session id: {id}"))))?;
    let detail = state
        .ledger
        .get_session(session_id, q.include_archived)
        .await
        .map_err(ledger_error)?;
    Ok(Json(detail))
}

async fn patch_session_handler(
    State(state): State<SharedApiState>,
    Path(id): Path<String>,
    Json(patch): Json<SessionPatch>,
) -> Result<Json<SessionDetail>, ApiError> {
    let session_id = SessionId::parse(&id)
        .map_err(|_| error_response(Error::InvalidArgument(format!("invalid session id: {id}"))))?;
    if patch.is_empty() {
        return Err(error_response(Error::InvalidArgument(
            "patch must set at least one of title, pinned, archived".into(),
        )));
    }
    let detail = state
        .ledger
        .patch_session(session_id, patch)
        .await
        .map_err(ledger_error)?;
    Ok(Json(detail))
}
