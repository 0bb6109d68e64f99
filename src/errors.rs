//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Required credential or collaborator is missing or misconfigured.
    Config(String),
    /// Persistence failure when interacting with `SQLite`.
    Db(String),
    /// Remote agent service unreachable or returned a non-success status.
    Gateway(String),
    /// Issue tracker rejected or failed a request.
    Notifier(String),
    /// Requested entity does not exist.
    NotFound(String),
    /// Caller supplied a malformed value.
    InvalidInput(String),
    /// Session status change not permitted by the lifecycle.
    InvalidTransition(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Db(msg) => write!(f, "db: {msg}"),
            Self::Gateway(msg) => write!(f, "gateway: {msg}"),
            Self::Notifier(msg) => write!(f, "notifier: {msg}"),
            Self::NotFound(msg) => write!(f, "not found: {msg}"),
            Self::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            Self::InvalidTransition(msg) => write!(f, "invalid transition: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::Db(err.to_string())
    }
}
