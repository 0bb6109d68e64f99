//! HTTP surface over the session manager.
//!
//! Routes:
//!
//! | Method | Path | Operation |
//! |---|---|---|
//! | `GET` | `/` | service banner |
//! | `GET` | `/health` | liveness probe |
//! | `GET` | `/issues` | list issues of a repository |
//! | `POST` | `/scope-issue` | start a scoping session |
//! | `POST` | `/resolve-issue` | start a resolving session |
//! | `GET` | `/sessions` | all session records, newest first |
//! | `POST` | `/sessions/{session_id}/message` | forward a message |

pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::GlobalConfig;
use crate::orchestrator::session_manager::SessionManager;
use crate::{AppError, Result};

/// Shared state handed to every handler.
pub struct AppState {
    /// Loaded configuration.
    pub config: Arc<GlobalConfig>,
    /// Creation path and queries.
    pub sessions: Arc<SessionManager>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Config(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Gateway(_) | Self::Notifier(_) => StatusCode::BAD_GATEWAY,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::Db(_) | Self::InvalidTransition(_) | Self::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Build the router for `state`.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(routes::banner))
        .route("/health", get(routes::health))
        .route("/issues", get(routes::list_issues))
        .route("/scope-issue", post(routes::scope_issue))
        .route("/resolve-issue", post(routes::resolve_issue))
        .route("/sessions", get(routes::list_sessions))
        .route(
            "/sessions/{session_id}/message",
            post(routes::send_message),
        )
        .with_state(state)
}

/// Bind `config.bind_address:config.http_port` and serve until `ct` is
/// cancelled.
///
/// # Errors
///
/// Returns `AppError::Config` if the address is invalid or cannot be bound.
pub async fn serve(state: Arc<AppState>, ct: CancellationToken) -> Result<()> {
    let bind: SocketAddr = format!("{}:{}", state.config.bind_address, state.config.http_port)
        .parse()
        .map_err(|err| AppError::Config(format!("invalid bind address: {err}")))?;
    let listener = TcpListener::bind(bind)
        .await
        .map_err(|err| AppError::Config(format!("failed to bind http on {bind}: {err}")))?;
    serve_on(listener, state, ct).await
}

/// Serve on an already bound listener until `ct` is cancelled.
///
/// # Errors
///
/// Returns `AppError::Io` if the server fails while running.
pub async fn serve_on(
    listener: TcpListener,
    state: Arc<AppState>,
    ct: CancellationToken,
) -> Result<()> {
    let local = listener
        .local_addr()
        .map_err(|err| AppError::Io(format!("listener address: {err}")))?;
    info!(%local, "http api listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { ct.cancelled().await })
        .await
        .map_err(|err| AppError::Io(format!("http server error: {err}")))?;

    info!("http api shut down");
    Ok(())
}
