//! axum router and HTTP handlers.
//!
//! Routes:
//! - `GET  /api/github/user`  - Authenticated account profile
//! - `GET  /api/github/repos` - Account repositories, most recently updated first
//! - `POST /api/github/push`  - Publish the project into a repository
//! - `GET  /healthz`          - Liveness check

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{error, info, instrument};

use crate::config::Config;
use crate::github::{HostConnector, RemoteAccount, RemoteRepository};
use crate::scan::ProjectScanner;
use crate::sync::{ProjectSynchronizer, PushError, PushReport, PushRequest};

// ---------------------------------------------------------------------------
// Shared application state
// ---------------------------------------------------------------------------

/// State shared by all request handlers. Nothing in it is mutated per request.
pub struct AppState {
    pub config: Arc<Config>,
    pub connector: Arc<dyn HostConnector>,
    pub scanner: ProjectScanner,
}

impl AppState {
    pub fn new(config: Config, connector: Arc<dyn HostConnector>) -> anyhow::Result<Self> {
        let scanner = ProjectScanner::from_config(&config.push)?;
        Ok(Self {
            config: Arc::new(config),
            connector,
            scanner,
        })
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the axum [`Router`] with all HTTP routes and shared state.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/github/user", get(handle_user))
        .route("/api/github/repos", get(handle_repos))
        .route("/api/github/push", post(handle_push))
        .route("/healthz", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind the configured address and serve until interrupted
pub async fn serve(state: Arc<AppState>, listen: &str) -> anyhow::Result<()> {
    use anyhow::Context as _;

    let listen_addr: std::net::SocketAddr = listen
        .parse()
        .with_context(|| format!("invalid listen address: {listen}"))?;

    let listener = tokio::net::TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind HTTP listener on {listen_addr}"))?;

    info!(%listen_addr, "HTTP server listening");

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
        return;
    }
    info!("shutdown signal received");
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /api/github/user`
#[instrument(skip(state))]
async fn handle_user(State(state): State<Arc<AppState>>) -> Result<Json<RemoteAccount>, AppError> {
    let host = state.connector.connect().await?;
    let user = host.authenticated_user().await?;
    Ok(Json(user))
}

/// `GET /api/github/repos`
#[instrument(skip(state))]
async fn handle_repos(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<RemoteRepository>>, AppError> {
    let host = state.connector.connect().await?;
    let repos = host.list_repositories().await?;
    Ok(Json(repos))
}

/// `POST /api/github/push`
///
/// The body is optional; a missing or blank body, or one not sent as JSON,
/// means "use the configured repository name and description".
#[instrument(skip(state, headers, body))]
async fn handle_push(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<PushReport>, AppError> {
    let request = parse_push_request(&headers, &body)?;

    let push_config = &state.config.push;
    let name = request
        .repo_name
        .unwrap_or_else(|| push_config.default_repo_name.clone());
    let description = request
        .description
        .unwrap_or_else(|| push_config.default_description.clone());

    let host = state.connector.connect().await?;
    let report = ProjectSynchronizer::new(host.as_ref(), &state.scanner)
        .lenient_probe(push_config.lenient_probe)
        .push(&name, &description)
        .await?;

    Ok(Json(report))
}

async fn handle_health() -> &'static str {
    "ok"
}

/// `application/json` or a `+json` media type, parameters ignored
fn is_json_content(headers: &HeaderMap) -> bool {
    let Some(content_type) = headers.get(header::CONTENT_TYPE) else {
        return false;
    };
    let Ok(content_type) = content_type.to_str() else {
        return false;
    };

    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence == "application/json"
        || (essence.starts_with("application/") && essence.ends_with("+json"))
}

/// Bodies that are not declared as JSON are ignored and the defaults apply
fn parse_push_request(headers: &HeaderMap, body: &[u8]) -> Result<PushRequest, AppError> {
    if !is_json_content(headers) || body.iter().all(u8::is_ascii_whitespace) {
        return Ok(PushRequest::default());
    }

    serde_json::from_slice(body).map_err(|e| AppError::BadRequest(e.to_string()))
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Application-level error that converts into an HTTP response.
#[derive(Debug)]
pub enum AppError {
    /// The request body could not be understood.
    BadRequest(String),
    /// The upstream call or local work failed; carries the raw message.
    Internal(String),
}

impl AppError {
    fn message(&self) -> &str {
        match self {
            AppError::BadRequest(msg) | AppError::Internal(msg) => msg,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            error!(error = %self.message(), "request failed");
        }

        (status, Json(json!({ "error": self.message() }))).into_response()
    }
}

impl From<crate::github::HostError> for AppError {
    fn from(err: crate::github::HostError) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<PushError> for AppError {
    fn from(err: PushError) -> Self {
        AppError::Internal(err.to_string())
    }
}
