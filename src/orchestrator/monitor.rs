//! Per-session polling state machine.
//!
//! A [`SessionMonitor`] drives one remote session from creation (or resume)
//! to a terminal status. Each tick fetches the remote status, checks the
//! wall-clock budget, and then reacts:
//!
//! - `finished`/`expired`: persist `Completed` (with the extracted plan for
//!   scoping sessions), post the result comment, stop.
//! - `blocked`, first time: persist `Blocked` and post one "blocked"
//!   comment, unless a scoping transcript already holds a complete result.
//! - `blocked` again, or anything else: nothing persisted, nothing posted.
//!
//! Whether the blocked comment was already sent is derived from the
//! persisted status, so a monitor resumed after a restart never repeats it.
//! Gateway failures are retried on the next tick; the budget starts when
//! the monitor starts, so a resumed monitor gets a fresh one.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::extractor;
use crate::config::MonitorConfig;
use crate::gateway::RemoteSessionGateway;
use crate::models::session::{IssueRef, ScopingResult, SessionKind, SessionRecord, SessionStatus};
use crate::models::transcript::{RemoteStatus, SessionSnapshot};
use crate::notifier::{comments, Notifier};
use crate::persistence::session_repo::SessionRepo;
use crate::{AppError, Result};

/// Polling cadence and budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorSettings {
    /// Delay between ticks.
    pub poll_interval: Duration,
    /// Budget from monitor start after which the session times out.
    pub max_wait: Duration,
}

impl From<&MonitorConfig> for MonitorSettings {
    fn from(config: &MonitorConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            max_wait: config.max_wait(),
        }
    }
}

/// Collaborators shared by every monitor task.
#[derive(Clone)]
pub struct MonitorContext {
    /// Durable session records.
    pub store: SessionRepo,
    /// Remote agent service.
    pub gateway: Arc<dyn RemoteSessionGateway>,
    /// Issue comment sink.
    pub notifier: Arc<dyn Notifier>,
    /// Cadence and budget.
    pub settings: MonitorSettings,
}

/// How a monitor task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorOutcome {
    /// Remote session reached a terminal status.
    Completed,
    /// Wall-clock budget ran out.
    TimedOut,
    /// Stopped by shutdown or because the record was replaced.
    Cancelled,
    /// Stopped on an unexpected error.
    Failed,
}

/// State machine for one session.
pub struct SessionMonitor {
    ctx: MonitorContext,
    session_id: String,
    issue: IssueRef,
    kind: SessionKind,
    session_url: Option<String>,
    blocked_notified: bool,
    cancel: CancellationToken,
}

impl SessionMonitor {
    /// Prepare a monitor for `record`; nothing runs until [`run`](Self::run).
    #[must_use]
    pub fn new(ctx: MonitorContext, record: &SessionRecord, cancel: CancellationToken) -> Self {
        Self {
            ctx,
            session_id: record.session_id.clone(),
            issue: record.issue.clone(),
            kind: record.kind,
            session_url: record.session_url.clone(),
            blocked_notified: record.status == SessionStatus::Blocked,
            cancel,
        }
    }

    /// Drive the session to completion.
    ///
    /// Never returns an error: anything escaping the loop is logged and
    /// reported on the issue as a best-effort error comment.
    pub async fn run(mut self) -> MonitorOutcome {
        info!(session_id = %self.session_id, kind = self.kind.as_str(), "monitor started");
        match self.drive().await {
            Ok(outcome) => {
                info!(session_id = %self.session_id, ?outcome, "monitor finished");
                outcome
            }
            Err(AppError::NotFound(msg)) => {
                info!(session_id = %self.session_id, %msg, "session record gone; monitor stopping");
                MonitorOutcome::Cancelled
            }
            Err(err) => {
                error!(session_id = %self.session_id, %err, "monitor stopped on error");
                let body = comments::monitor_error(
                    &self.session_id,
                    self.session_url.as_deref(),
                    &err.to_string(),
                );
                self.notify(&body, "error").await;
                MonitorOutcome::Failed
            }
        }
    }

    async fn drive(&mut self) -> Result<MonitorOutcome> {
        let started = Instant::now();

        loop {
            if self.cancel.is_cancelled() {
                return Ok(MonitorOutcome::Cancelled);
            }

            let fetched = self.ctx.gateway.fetch_status(&self.session_id).await;

            // Budget wins over whatever this tick's fetch reported.
            if started.elapsed() >= self.ctx.settings.max_wait {
                return self.time_out().await;
            }

            match fetched {
                Ok(snapshot) => {
                    if let Some(outcome) = self.observe(snapshot).await? {
                        return Ok(outcome);
                    }
                }
                Err(err) => {
                    warn!(session_id = %self.session_id, %err, "status poll failed; retrying next tick");
                }
            }

            tokio::select! {
                () = self.cancel.cancelled() => {
                    debug!(session_id = %self.session_id, "monitor cancelled");
                    return Ok(MonitorOutcome::Cancelled);
                }
                () = tokio::time::sleep(self.ctx.settings.poll_interval) => {}
            }
        }
    }

    /// React to one snapshot; `Some` means monitoring is over.
    async fn observe(&mut self, snapshot: SessionSnapshot) -> Result<Option<MonitorOutcome>> {
        self.refresh_url(snapshot.url.as_deref()).await;

        match snapshot.status {
            RemoteStatus::Finished => {
                info!(
                    session_id = %self.session_id,
                    raw_status = snapshot.raw_status.as_deref().unwrap_or(""),
                    "remote session finished"
                );
                let result = match self.kind {
                    SessionKind::Scoping => extractor::extract_complete(&snapshot.messages),
                    SessionKind::Resolving => None,
                };
                self.complete(result).await.map(Some)
            }
            RemoteStatus::Blocked if self.blocked_notified => {
                debug!(session_id = %self.session_id, "session still blocked");
                Ok(None)
            }
            RemoteStatus::Blocked => {
                if self.kind == SessionKind::Scoping {
                    if let Some(result) = extractor::extract_complete(&snapshot.messages) {
                        info!(session_id = %self.session_id, "blocked session already holds a result");
                        return self.complete(Some(result)).await.map(Some);
                    }
                }

                self.ctx
                    .store
                    .update_status(&self.session_id, SessionStatus::Blocked)
                    .await?;
                self.blocked_notified = true;
                info!(session_id = %self.session_id, "session blocked; may need input");

                let body =
                    comments::blocked(self.kind, &self.session_id, self.session_url.as_deref());
                self.notify(&body, "blocked").await;
                Ok(None)
            }
            RemoteStatus::Active => {
                debug!(
                    session_id = %self.session_id,
                    raw_status = snapshot.raw_status.as_deref().unwrap_or("unknown"),
                    "session active"
                );
                Ok(None)
            }
        }
    }

    /// Persist `Completed` and post the kind-specific final comment.
    ///
    /// `result` is only ever `Some` for scoping sessions.
    async fn complete(&mut self, result: Option<ScopingResult>) -> Result<MonitorOutcome> {
        self.ctx
            .store
            .complete(&self.session_id, result.as_ref())
            .await?;

        let url = self.session_url.as_deref();
        let body = match (self.kind, &result) {
            (SessionKind::Scoping, Some(result)) => {
                info!(session_id = %self.session_id, confidence = result.confidence, "scoping result extracted");
                comments::scoping_result(result, &self.session_id, url)
            }
            (SessionKind::Scoping, None) => {
                info!(session_id = %self.session_id, "no structured scoping result found");
                comments::scoping_without_result(&self.session_id, url)
            }
            (SessionKind::Resolving, _) => comments::resolution_completed(&self.session_id, url),
        };
        self.notify(&body, "completion").await;
        Ok(MonitorOutcome::Completed)
    }

    async fn time_out(&mut self) -> Result<MonitorOutcome> {
        self.ctx
            .store
            .update_status(&self.session_id, SessionStatus::Timeout)
            .await?;
        warn!(
            session_id = %self.session_id,
            budget_secs = self.ctx.settings.max_wait.as_secs(),
            "session monitoring timed out"
        );

        let body = comments::timed_out(
            self.kind,
            &self.session_id,
            self.session_url.as_deref(),
            self.ctx.settings.max_wait.as_secs(),
        );
        self.notify(&body, "timeout").await;
        Ok(MonitorOutcome::TimedOut)
    }

    async fn refresh_url(&mut self, url: Option<&str>) {
        let Some(url) = url.filter(|u| !u.is_empty()) else {
            return;
        };
        if self.session_url.as_deref() == Some(url) {
            return;
        }
        if let Err(err) = self.ctx.store.set_session_url(&self.session_id, url).await {
            warn!(session_id = %self.session_id, %err, "failed to persist session url");
        }
        self.session_url = Some(url.to_owned());
    }

    /// Post a comment; a failure loses the notification but never stops the loop.
    async fn notify(&self, body: &str, what: &str) {
        if let Err(err) = self.ctx.notifier.post_comment(&self.issue, body).await {
            error!(
                session_id = %self.session_id,
                issue = %self.issue,
                notification = what,
                %err,
                "notification lost"
            );
        }
    }
}
