//! Remote session status and transcript as observed through the gateway.

use serde::{Deserialize, Serialize};

/// Classification of the remote service's status string.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RemoteStatus {
    /// Still working (also covers absent or unrecognized values).
    Active,
    /// Waiting for user input.
    Blocked,
    /// `finished` or `expired`.
    Finished,
}

impl RemoteStatus {
    /// Map the remote service's `status_enum` literal.
    #[must_use]
    pub fn from_wire(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("finished" | "expired") => Self::Finished,
            Some("blocked") => Self::Blocked,
            _ => Self::Active,
        }
    }
}

/// Who authored a transcript message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthorKind {
    /// The remote agent.
    Agent,
    /// The user or this service.
    User,
    /// Anything else the service reports.
    Other,
}

/// One transcript entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TranscriptMessage {
    /// Message author.
    pub author: AuthorKind,
    /// Message body.
    pub text: String,
}

impl TranscriptMessage {
    /// Message authored by the agent.
    pub fn agent(text: impl Into<String>) -> Self {
        Self {
            author: AuthorKind::Agent,
            text: text.into(),
        }
    }

    /// Message authored by the user.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            author: AuthorKind::User,
            text: text.into(),
        }
    }
}

/// Point-in-time view of a remote session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// Classified status.
    pub status: RemoteStatus,
    /// Raw `status_enum` as reported, for logging.
    pub raw_status: Option<String>,
    /// Ordered transcript.
    pub messages: Vec<TranscriptMessage>,
    /// Link to the remote session.
    pub url: Option<String>,
}

/// Identity of a newly created remote session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreatedSession {
    /// Identifier assigned by the remote service.
    pub session_id: String,
    /// Link to the remote session.
    pub url: String,
}
