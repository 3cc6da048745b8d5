//! HTTP trigger surface.
//!
//! ## Endpoints
//!
//! - `GET /health`: liveness
//! - `GET /sessions`: stored sessions with previews
//! - `POST /sessions[?session_id=..]`: open a session
//! - `GET /sessions/{id}`: current status and chat history
//! - `POST /sessions/{id}/record`: start a turn
//! - `GET /sessions/{id}/{transcribe,emotion,generate}`: run one stage,
//!   then redirect to the next stage or back to the session
//! - `GET /sessions/{id}/latest`: most recent exchange

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Redirect, Response};
use axum::routing::get;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::error::AttuneError;
use crate::history::DisplayTurn;
use crate::pipeline::Stage;
use crate::service::{AssistantService, SessionSummary, SessionView};

/// Error body: `{"error": "..."}`.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Maps service errors to HTTP responses.
#[derive(Debug)]
pub struct ApiError(pub AttuneError);

impl ApiError {
    fn status(&self) -> StatusCode {
        match self.0 {
            AttuneError::InvalidSession(_) => StatusCode::BAD_REQUEST,
            AttuneError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            AttuneError::SessionBusy(_) | AttuneError::InvalidTransition { .. } => {
                StatusCode::CONFLICT
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<AttuneError> for ApiError {
    fn from(e: AttuneError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!("request failed: {}", self.0);
        }
        (
            status,
            Json(ErrorBody {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

type AppState = Arc<AssistantService>;

#[derive(Debug, Deserialize)]
struct CreateSessionQuery {
    session_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreatedSession {
    pub session_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LatestChat {
    pub chat_history: Option<DisplayTurn>,
}

/// Build the router. Exposed for tests that drive it in-process.
pub fn router(service: Arc<AssistantService>) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/sessions", get(handle_list_sessions).post(handle_create_session))
        .route("/sessions/{id}", get(handle_session))
        .route("/sessions/{id}/record", get(handle_record_get).post(handle_record))
        .route("/sessions/{id}/transcribe", get(handle_transcribe))
        .route("/sessions/{id}/emotion", get(handle_emotion))
        .route("/sessions/{id}/generate", get(handle_generate))
        .route("/sessions/{id}/latest", get(handle_latest))
        .with_state(service)
}

fn session_path(id: &str) -> String {
    format!("/sessions/{id}")
}

async fn handle_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn handle_list_sessions(
    State(service): State<AppState>,
) -> Result<Json<Vec<SessionSummary>>, ApiError> {
    Ok(Json(service.sessions().await?))
}

async fn handle_create_session(
    State(service): State<AppState>,
    Query(query): Query<CreateSessionQuery>,
) -> Result<(StatusCode, Json<CreatedSession>), ApiError> {
    let id = service.open_session(query.session_id.as_deref()).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreatedSession {
            session_id: id.to_string(),
        }),
    ))
}

async fn handle_session(
    State(service): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionView>, ApiError> {
    Ok(Json(service.snapshot(&id).await?))
}

async fn handle_latest(
    State(service): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<LatestChat>, ApiError> {
    Ok(Json(LatestChat {
        chat_history: service.latest_turn(&id).await?,
    }))
}

/// A plain GET of the record route is not a trigger.
async fn handle_record_get(Path(id): Path<String>) -> Redirect {
    Redirect::to(&session_path(&id))
}

async fn handle_record(
    State(service): State<AppState>,
    Path(id): Path<String>,
) -> Result<Redirect, ApiError> {
    run_stage(&service, &id, Stage::Record).await
}

async fn handle_transcribe(
    State(service): State<AppState>,
    Path(id): Path<String>,
) -> Result<Redirect, ApiError> {
    run_stage(&service, &id, Stage::Transcribe).await
}

async fn handle_emotion(
    State(service): State<AppState>,
    Path(id): Path<String>,
) -> Result<Redirect, ApiError> {
    run_stage(&service, &id, Stage::DetectEmotion).await
}

async fn handle_generate(
    State(service): State<AppState>,
    Path(id): Path<String>,
) -> Result<Redirect, ApiError> {
    run_stage(&service, &id, Stage::Generate).await
}

/// Run `stage` and redirect to whatever the session should do next.
async fn run_stage(service: &AssistantService, id: &str, stage: Stage) -> Result<Redirect, ApiError> {
    let outcome = service.trigger(id, stage).await?;
    let target = match outcome.next {
        Some(next) => format!("{}/{}", session_path(id), next.as_str()),
        None => session_path(id),
    };
    Ok(Redirect::to(&target))
}

/// Background HTTP server for the trigger surface.
pub struct AttuneServer {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl AttuneServer {
    /// Bind `{host}:{port}` (port `0` auto-assigns) and serve in a
    /// background task.
    ///
    /// # Errors
    ///
    /// Returns an error if the TCP listener cannot bind.
    pub async fn start(
        service: Arc<AssistantService>,
        host: &str,
        port: u16,
    ) -> crate::error::Result<Self> {
        let app = router(service);

        let bind_addr = format!("{host}:{port}");
        let listener = TcpListener::bind(&bind_addr)
            .await
            .map_err(|e| AttuneError::Config(format!("server bind to {bind_addr} failed: {e}")))?;
        let addr = listener.local_addr()?;

        info!("attune listening on http://{addr}");

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("HTTP server error: {e}");
            }
        });

        Ok(Self { addr, handle })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Abort the server task.
    pub fn shutdown(&self) {
        self.handle.abort();
    }
}

impl Drop for AttuneServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
