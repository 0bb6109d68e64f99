//! Request handlers.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use super::AppState;
use crate::models::issue::Issue;
use crate::models::session::{IssueRef, SessionRecord};
use crate::orchestrator::session_manager::StartedSession;
use crate::Result;

/// `GET /issues` query.
#[derive(Debug, Deserialize)]
pub struct IssuesQuery {
    /// `owner/repo`; the configured default when absent.
    pub repo: Option<String>,
    /// `open`, `closed` or `all`; `open` when absent.
    pub state: Option<String>,
    /// Comma-separated label filter.
    pub labels: Option<String>,
}

/// `POST /scope-issue` body.
#[derive(Debug, Deserialize)]
pub struct ScopeRequest {
    /// Issue number.
    pub issue_number: u64,
    /// Issue title.
    pub issue_title: String,
    /// Issue body.
    #[serde(default)]
    pub issue_body: Option<String>,
    /// `owner/repo`; the configured default when absent.
    #[serde(default)]
    pub repo: Option<String>,
}

/// `POST /resolve-issue` body.
#[derive(Debug, Deserialize)]
pub struct ResolveRequest {
    /// Issue number.
    pub issue_number: u64,
    /// `owner/repo`; the configured default when absent.
    #[serde(default)]
    pub repo: Option<String>,
}

/// `POST /sessions/{session_id}/message` body.
#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    /// Text forwarded to the remote session.
    pub message: String,
}

fn issue_ref(state: &AppState, repo: Option<String>, number: u64) -> Result<IssueRef> {
    let repo = repo
        .filter(|r| !r.trim().is_empty())
        .unwrap_or_else(|| state.config.default_repo.clone());
    IssueRef::new(repo, number)
}

pub(super) async fn banner() -> Json<Value> {
    Json(json!({ "message": "GitHub Issues Devin Integration API" }))
}

pub(super) async fn health() -> &'static str {
    "ok"
}

pub(super) async fn list_issues(
    State(state): State<Arc<AppState>>,
    Query(query): Query<IssuesQuery>,
) -> Result<Json<Vec<Issue>>> {
    let repo = query
        .repo
        .unwrap_or_else(|| state.config.default_repo.clone());
    let issue_state = query.state.as_deref().unwrap_or("open");
    let issues = state
        .sessions
        .list_issues(&repo, issue_state, query.labels.as_deref())
        .await?;
    Ok(Json(issues))
}

pub(super) async fn scope_issue(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ScopeRequest>,
) -> Result<Json<StartedSession>> {
    let issue = issue_ref(&state, request.repo, request.issue_number)?;
    let started = state
        .sessions
        .start_scoping(issue, &request.issue_title, request.issue_body.as_deref())
        .await?;
    Ok(Json(started))
}

pub(super) async fn resolve_issue(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ResolveRequest>,
) -> Result<Json<StartedSession>> {
    let issue = issue_ref(&state, request.repo, request.issue_number)?;
    let started = state.sessions.start_resolving(issue).await?;
    Ok(Json(started))
}

pub(super) async fn list_sessions(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<SessionRecord>>> {
    Ok(Json(state.sessions.list_sessions().await?))
}

pub(super) async fn send_message(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(request): Json<MessageRequest>,
) -> Result<Json<Value>> {
    state
        .sessions
        .send_message(&session_id, &request.message)
        .await?;
    Ok(Json(json!({ "status": "sent", "session_id": session_id })))
}
