//! Remote agent session gateway.
//!
//! The [`RemoteSessionGateway`] trait decouples the session monitor and
//! the creation path from the remote agent service's HTTP API, so tests
//! can script remote behavior without a network.

pub mod client;

use std::future::Future;
use std::pin::Pin;

use crate::models::transcript::{CreatedSession, SessionSnapshot};
use crate::Result;

/// Boxed future returned by gateway and notifier trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Interface to the external agent service.
pub trait RemoteSessionGateway: Send + Sync {
    /// Start a new remote session with the given prompt.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Gateway`](crate::AppError::Gateway) if the service
    /// is unreachable or answers with a non-success status.
    fn create(&self, prompt: &str) -> BoxFuture<'_, Result<CreatedSession>>;

    /// Fetch the session's current status and transcript.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Gateway`](crate::AppError::Gateway) on transport or
    /// HTTP failure.
    fn fetch_status(&self, session_id: &str) -> BoxFuture<'_, Result<SessionSnapshot>>;

    /// Post a user message into a running session.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Gateway`](crate::AppError::Gateway) on transport or
    /// HTTP failure.
    fn send_message(&self, session_id: &str, text: &str) -> BoxFuture<'_, Result<()>>;
}
