//! Session record model and lifecycle helpers.

use std::fmt::{Display, Formatter};

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::{AppError, Result};

/// External issue thread a session reports to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub struct IssueRef {
    /// Repository in `owner/repo` form.
    pub repo: String,
    /// Issue number within the repository.
    pub issue_number: u64,
}

impl IssueRef {
    /// Build a validated issue reference.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidInput` if `repo` is not `owner/repo`.
    pub fn new(repo: impl Into<String>, issue_number: u64) -> Result<Self> {
        let repo = repo.into();
        Self::split_repo(&repo)?;
        Ok(Self { repo, issue_number })
    }

    /// Split an `owner/repo` string into its two halves.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidInput` unless the value has exactly one
    /// `/` and both halves are valid repository path segments.
    pub fn split_repo(repo: &str) -> Result<(String, String)> {
        let mut parts = repo.split('/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(owner), Some(name), None) if is_repo_segment(owner) && is_repo_segment(name) => {
                Ok((owner.to_owned(), name.to_owned()))
            }
            _ => Err(AppError::InvalidInput(format!(
                "repository must be in format 'owner/repo', got '{repo}'"
            ))),
        }
    }
}

/// `[A-Za-z0-9_.-]+`, excluding the `.` and `..` path segments.
fn is_repo_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

impl Display for IssueRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.repo, self.issue_number)
    }
}

/// What the remote agent was asked to do.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    /// Analyze the issue and report an action plan with a confidence score.
    Scoping,
    /// Implement a fix for the issue.
    Resolving,
}

impl SessionKind {
    /// Status a freshly created record of this kind starts in.
    #[must_use]
    pub fn active_status(self) -> SessionStatus {
        match self {
            Self::Scoping => SessionStatus::Scoping,
            Self::Resolving => SessionStatus::Resolving,
        }
    }

    /// Storage representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scoping => "scoping",
            Self::Resolving => "resolving",
        }
    }

    /// Parse the storage representation.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` for an unknown value.
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "scoping" => Ok(Self::Scoping),
            "resolving" => Ok(Self::Resolving),
            other => Err(AppError::Db(format!("invalid session kind: {other}"))),
        }
    }
}

/// Lifecycle status of a monitored session.
///
/// `Scoping` and `Resolving` are both "active"; they differ only by kind.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Scoping session in progress.
    Scoping,
    /// Resolving session in progress.
    Resolving,
    /// Remote agent is waiting for input; polling continues.
    Blocked,
    /// Remote session finished (or expired).
    Completed,
    /// Wall-clock budget ran out before a terminal remote status.
    Timeout,
}

impl SessionStatus {
    /// Whether no further transition is possible.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Timeout)
    }

    /// Whether the session is still running remotely (not blocked, not terminal).
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, Self::Scoping | Self::Resolving)
    }

    /// Determine whether a lifecycle transition is permitted.
    ///
    /// Terminal states are final and no transition re-enters an active state.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (
                Self::Scoping | Self::Resolving,
                Self::Blocked | Self::Completed | Self::Timeout
            ) | (Self::Blocked, Self::Completed | Self::Timeout)
        )
    }

    /// Storage representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scoping => "scoping",
            Self::Resolving => "resolving",
            Self::Blocked => "blocked",
            Self::Completed => "completed",
            Self::Timeout => "timeout",
        }
    }

    /// Parse the storage representation.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` for an unknown value.
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "scoping" => Ok(Self::Scoping),
            "resolving" => Ok(Self::Resolving),
            "blocked" => Ok(Self::Blocked),
            "completed" => Ok(Self::Completed),
            "timeout" => Ok(Self::Timeout),
            other => Err(AppError::Db(format!("invalid session status: {other}"))),
        }
    }
}

impl Display for SessionStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Complete structured outcome of a scoping session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScopingResult {
    /// Action plan, one step per line.
    pub plan: String,
    /// Confidence in `0..=100`.
    pub confidence: u8,
}

/// Durable monitoring record, one per remote session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct SessionRecord {
    /// Identifier assigned by the remote agent service.
    pub session_id: String,
    /// Issue thread this session reports to; immutable.
    pub issue: IssueRef,
    /// Issue title captured at creation.
    pub issue_title: Option<String>,
    /// Scoping or resolving; immutable.
    pub kind: SessionKind,
    /// Current lifecycle status.
    pub status: SessionStatus,
    /// Link to the remote session, when known.
    pub session_url: Option<String>,
    /// Extracted plan; set together with `confidence_score`.
    pub action_plan: Option<String>,
    /// Extracted confidence in `0..=100`; set together with `action_plan`.
    pub confidence_score: Option<u8>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Refreshed on every status mutation.
    pub updated_at: DateTime<Utc>,
}

impl SessionRecord {
    /// Construct a record in the kind's initial active status.
    #[must_use]
    pub fn new(
        session_id: String,
        issue: IssueRef,
        kind: SessionKind,
        issue_title: Option<String>,
        session_url: Option<String>,
    ) -> Self {
        // Storage keeps microseconds.
        let now = Utc::now().trunc_subsecs(6);
        Self {
            session_id,
            issue,
            issue_title,
            kind,
            status: kind.active_status(),
            session_url,
            action_plan: None,
            confidence_score: None,
            created_at: now,
            updated_at: now,
        }
    }
}
