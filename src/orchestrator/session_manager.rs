//! Session creation path and read-side queries.
//!
//! Starting a session creates it remotely, persists the record, posts the
//! "started" comment and hands the record to the [`MonitorSupervisor`].
//! Creation for one issue is serialized, so two concurrent resolve
//! requests cannot both survive the replacement step.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tracing::{error, info, info_span, warn, Instrument};

use super::prompts;
use super::recovery::{self, RecoveryReport};
use super::supervisor::MonitorSupervisor;
use crate::models::issue::Issue;
use crate::models::session::{IssueRef, SessionKind, SessionRecord, SessionStatus};
use crate::notifier::{comments, IssueTracker, Notifier};
use crate::persistence::session_repo::SessionRepo;
use crate::{AppError, Result};

/// Returned to the caller once a session is running and monitored.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StartedSession {
    /// Remote session id.
    pub session_id: String,
    /// Link to the remote session.
    pub session_url: Option<String>,
    /// Initial status.
    pub status: SessionStatus,
}

type IssueLocks = Mutex<HashMap<IssueRef, Arc<tokio::sync::Mutex<()>>>>;

/// Front door for everything that starts or inspects sessions.
pub struct SessionManager {
    store: SessionRepo,
    notifier: Arc<dyn Notifier>,
    issues: Arc<dyn IssueTracker>,
    /// `None` when the remote agent credential is missing.
    supervisor: Option<Arc<MonitorSupervisor>>,
    issue_locks: IssueLocks,
}

impl SessionManager {
    /// Wire the manager; pass `None` for `supervisor` when no remote agent
    /// is configured, which makes every creation fail with `AppError::Config`.
    #[must_use]
    pub fn new(
        store: SessionRepo,
        notifier: Arc<dyn Notifier>,
        issues: Arc<dyn IssueTracker>,
        supervisor: Option<Arc<MonitorSupervisor>>,
    ) -> Self {
        Self {
            store,
            notifier,
            issues,
            supervisor,
            issue_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Monitor registry, if the remote agent is configured.
    #[must_use]
    pub fn supervisor(&self) -> Option<&Arc<MonitorSupervisor>> {
        self.supervisor.as_ref()
    }

    /// Start a scoping session for an issue whose title and body the
    /// caller already knows.
    ///
    /// # Errors
    ///
    /// - `AppError::Config` if the remote agent is not configured; nothing
    ///   else happens in that case.
    /// - `AppError::Gateway` if the remote session cannot be created.
    /// - `AppError::Db` if the record cannot be persisted.
    pub async fn start_scoping(
        &self,
        issue: IssueRef,
        title: &str,
        body: Option<&str>,
    ) -> Result<StartedSession> {
        let supervisor = self.require_remote()?;
        let span = info_span!("start_scoping", issue = %issue);
        self.start(supervisor, SessionKind::Scoping, issue, title, body)
            .instrument(span)
            .await
    }

    /// Start a resolving session; the issue is fetched from the tracker.
    ///
    /// Any unfinished resolving session of the same issue is replaced and
    /// its monitor stopped.
    ///
    /// # Errors
    ///
    /// - `AppError::Config` if the remote agent is not configured.
    /// - `AppError::NotFound` if the issue does not exist.
    /// - `AppError::Notifier` if the issue cannot be fetched.
    /// - `AppError::Gateway` or `AppError::Db` as for [`start_scoping`](Self::start_scoping).
    pub async fn start_resolving(&self, issue: IssueRef) -> Result<StartedSession> {
        let supervisor = self.require_remote()?;
        let span = info_span!("start_resolving", issue = %issue);
        async {
            let details = self.issues.get_issue(&issue).await?;
            self.start(
                supervisor,
                SessionKind::Resolving,
                issue,
                &details.title,
                details.body.as_deref(),
            )
            .await
        }
        .instrument(span)
        .await
    }

    async fn start(
        &self,
        supervisor: &Arc<MonitorSupervisor>,
        kind: SessionKind,
        issue: IssueRef,
        title: &str,
        body: Option<&str>,
    ) -> Result<StartedSession> {
        let lock = self.issue_lock(&issue);
        let _guard = lock.lock().await;

        let prompt = match kind {
            SessionKind::Scoping => prompts::scoping(&issue, title, body),
            SessionKind::Resolving => prompts::resolving(&issue, title, body),
        };
        let created = supervisor.context().gateway.create(&prompt).await?;
        let session_url = Some(created.url).filter(|u| !u.is_empty());
        let record = SessionRecord::new(
            created.session_id,
            issue,
            kind,
            Some(title.to_owned()),
            session_url,
        );

        match kind {
            SessionKind::Scoping => {
                self.store.create(&record).await?;
            }
            SessionKind::Resolving => {
                let replaced = self.store.replace_active_for_issue(&record).await?;
                for session_id in &replaced {
                    supervisor.cancel(session_id);
                    info!(session_id = %session_id, replaced_by = %record.session_id, "replaced resolving session");
                }
            }
        }
        info!(session_id = %record.session_id, kind = kind.as_str(), "session created");

        let body = comments::started(kind, &record.session_id, record.session_url.as_deref());
        if let Err(err) = self.notifier.post_comment(&record.issue, &body).await {
            error!(session_id = %record.session_id, %err, "failed to post start notification");
        }

        supervisor.spawn(&record);

        Ok(StartedSession {
            session_id: record.session_id,
            session_url: record.session_url,
            status: record.status,
        })
    }

    /// Every record, newest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_sessions(&self) -> Result<Vec<SessionRecord>> {
        self.store.list_all().await
    }

    /// Forward a user message into a known session.
    ///
    /// # Errors
    ///
    /// - `AppError::InvalidInput` for an empty message.
    /// - `AppError::Config` if the remote agent is not configured.
    /// - `AppError::NotFound` if no record exists for `session_id`.
    /// - `AppError::Gateway` if the remote service rejects the message.
    pub async fn send_message(&self, session_id: &str, text: &str) -> Result<()> {
        if text.trim().is_empty() {
            return Err(AppError::InvalidInput("message must not be empty".into()));
        }
        let supervisor = self.require_remote()?;
        if self.store.get_by_id(session_id).await?.is_none() {
            return Err(AppError::NotFound(format!("session {session_id} not found")));
        }

        supervisor
            .context()
            .gateway
            .send_message(session_id, text)
            .await?;
        info!(session_id, "message forwarded to session");
        Ok(())
    }

    /// List a repository's issues, excluding pull requests.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidInput` for a malformed repository, or the
    /// tracker's `AppError::Notifier`.
    pub async fn list_issues(
        &self,
        repo: &str,
        state: &str,
        labels: Option<&str>,
    ) -> Result<Vec<Issue>> {
        IssueRef::split_repo(repo)?;
        self.issues.list_issues(repo, state, labels).await
    }

    /// Resume monitoring of every unfinished session.
    ///
    /// Without a configured remote agent nothing can be polled; the
    /// unfinished records stay untouched for a later start.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the session table cannot be read.
    pub async fn recover(&self) -> Result<RecoveryReport> {
        if let Some(supervisor) = &self.supervisor {
            return recovery::resume_monitoring(&self.store, supervisor).await;
        }

        let pending = self.store.list_non_terminal().await?;
        if !pending.is_empty() {
            warn!(
                count = pending.len(),
                "remote agent not configured; unfinished sessions left unmonitored"
            );
        }
        Ok(RecoveryReport::default())
    }

    fn require_remote(&self) -> Result<&Arc<MonitorSupervisor>> {
        self.supervisor
            .as_ref()
            .ok_or_else(|| AppError::Config("remote agent api key is not configured".into()))
    }

    fn issue_lock(&self, issue: &IssueRef) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.issue_locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        Arc::clone(locks.entry(issue.clone()).or_default())
    }
}
