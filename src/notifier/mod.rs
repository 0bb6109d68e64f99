//! Issue tracker collaborators: comment posting and issue lookup.

pub mod comments;
pub mod github;

use crate::gateway::BoxFuture;
use crate::models::issue::Issue;
use crate::models::session::IssueRef;
use crate::Result;

/// Posts progress comments to an issue thread.
pub trait Notifier: Send + Sync {
    /// Post `body` as a new comment on the issue.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Notifier`](crate::AppError::Notifier) on transport
    /// failure or a non-success HTTP status.
    fn post_comment(&self, issue: &IssueRef, body: &str) -> BoxFuture<'_, Result<()>>;
}

/// Read access to the issue tracker.
pub trait IssueTracker: Send + Sync {
    /// Fetch one issue.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`](crate::AppError::NotFound) if the issue
    /// does not exist and [`AppError::Notifier`](crate::AppError::Notifier)
    /// on any other failure.
    fn get_issue(&self, issue: &IssueRef) -> BoxFuture<'_, Result<Issue>>;

    /// List issues of a repository, excluding pull requests.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::InvalidInput`](crate::AppError::InvalidInput) for a
    /// malformed repository and [`AppError::Notifier`](crate::AppError::Notifier)
    /// on request failure.
    fn list_issues(
        &self,
        repo: &str,
        state: &str,
        labels: Option<&str>,
    ) -> BoxFuture<'_, Result<Vec<Issue>>>;
}
