//! Issue tracker entities returned to API callers.

use serde::{Deserialize, Serialize};

/// Label attached to an issue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IssueLabel {
    /// Label name.
    pub name: String,
    /// Hex color without `#`.
    #[serde(default)]
    pub color: Option<String>,
}

/// User assigned to an issue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IssueAssignee {
    /// Login handle.
    pub login: String,
}

/// Issue as listed by the tracker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Issue {
    /// Issue number.
    pub number: u64,
    /// Title.
    pub title: String,
    /// Markdown body, if any.
    #[serde(default)]
    pub body: Option<String>,
    /// `open` or `closed`.
    pub state: String,
    /// Attached labels.
    #[serde(default)]
    pub labels: Vec<IssueLabel>,
    /// Assigned users.
    #[serde(default)]
    pub assignees: Vec<IssueAssignee>,
    /// Browser link.
    pub html_url: String,
    /// Present when the entry is a pull request rather than an issue.
    #[serde(default, skip_serializing)]
    pub pull_request: Option<serde_json::Value>,
}

impl Issue {
    /// Whether the tracker entry is really a pull request.
    #[must_use]
    pub fn is_pull_request(&self) -> bool {
        self.pull_request.is_some()
    }
}
