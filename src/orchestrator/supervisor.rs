//! Registry of running session monitors.
//!
//! Keeps at most one live monitor task per session id. Every monitor gets a
//! child of the process shutdown token, so cancelling the supervisor stops
//! them all; dropping a [`MonitorHandle`] cancels its task.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use super::monitor::{MonitorContext, MonitorOutcome, SessionMonitor};
use crate::models::session::SessionRecord;

/// Control handle for one spawned monitor.
///
/// The entry stays registered until the task has exited, even while a
/// caller is joining it.
pub struct MonitorHandle {
    cancel: CancellationToken,
    exited: CancellationToken,
    join_handle: Option<JoinHandle<MonitorOutcome>>,
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl MonitorHandle {
    fn is_finished(&self) -> bool {
        self.exited.is_cancelled()
    }

    async fn join(mut self) -> MonitorOutcome {
        match self.join_handle.take() {
            Some(handle) => await_outcome(handle).await,
            None => {
                self.exited.cancelled().await;
                MonitorOutcome::Cancelled
            }
        }
    }
}

async fn await_outcome(handle: JoinHandle<MonitorOutcome>) -> MonitorOutcome {
    match handle.await {
        Ok(outcome) => outcome,
        Err(err) => {
            warn!(%err, "monitor task aborted");
            MonitorOutcome::Failed
        }
    }
}

/// Spawns and tracks [`SessionMonitor`] tasks.
pub struct MonitorSupervisor {
    ctx: MonitorContext,
    shutdown: CancellationToken,
    monitors: Mutex<HashMap<String, MonitorHandle>>,
}

impl MonitorSupervisor {
    /// Create a supervisor whose monitors stop when `shutdown` is cancelled.
    #[must_use]
    pub fn new(ctx: MonitorContext, shutdown: CancellationToken) -> Self {
        Self {
            ctx,
            shutdown,
            monitors: Mutex::new(HashMap::new()),
        }
    }

    /// Collaborators handed to every monitor.
    #[must_use]
    pub fn context(&self) -> &MonitorContext {
        &self.ctx
    }

    /// Start monitoring `record` in the background.
    ///
    /// Returns `false` without spawning when the record is already terminal,
    /// a live monitor exists for the same session, or shutdown has begun.
    pub fn spawn(&self, record: &SessionRecord) -> bool {
        if record.status.is_terminal() {
            debug!(session_id = %record.session_id, status = %record.status, "terminal session not monitored");
            return false;
        }
        if self.shutdown.is_cancelled() {
            return false;
        }

        let mut monitors = self.monitors.lock().unwrap_or_else(PoisonError::into_inner);
        monitors.retain(|_, handle| !handle.is_finished());
        if monitors.contains_key(&record.session_id) {
            debug!(session_id = %record.session_id, "monitor already running");
            return false;
        }

        let cancel = self.shutdown.child_token();
        let monitor = SessionMonitor::new(self.ctx.clone(), record, cancel.clone());
        let span = info_span!(
            "session_monitor",
            session_id = %record.session_id,
            issue = %record.issue,
            kind = record.kind.as_str()
        );
        let exited = CancellationToken::new();
        let exit_guard = exited.clone().drop_guard();
        let join_handle = tokio::spawn(
            async move {
                let _exit_guard = exit_guard;
                monitor.run().await
            }
            .instrument(span),
        );

        monitors.insert(
            record.session_id.clone(),
            MonitorHandle {
                cancel,
                exited,
                join_handle: Some(join_handle),
            },
        );
        true
    }

    /// Stop the monitor for `session_id`, if one is registered.
    pub fn cancel(&self, session_id: &str) -> bool {
        let removed = self
            .monitors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(session_id);
        if removed.is_some() {
            info!(session_id, "monitor cancelled");
        }
        removed.is_some()
    }

    /// Whether a monitor task for `session_id` is still running.
    #[must_use]
    pub fn is_monitoring(&self, session_id: &str) -> bool {
        self.monitors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(session_id)
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Session ids with a running monitor.
    #[must_use]
    pub fn active_sessions(&self) -> Vec<String> {
        let monitors = self.monitors.lock().unwrap_or_else(PoisonError::into_inner);
        let mut ids: Vec<String> = monitors
            .iter()
            .filter(|(_, handle)| !handle.is_finished())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Wait for the monitor of `session_id` to finish on its own.
    ///
    /// The entry is deregistered only after the task exits, so a concurrent
    /// `spawn` for the same id is still refused while the join is pending.
    /// `None` if nothing was registered or another caller is already joining.
    pub async fn join(&self, session_id: &str) -> Option<MonitorOutcome> {
        let (join_handle, exited) = {
            let mut monitors = self.monitors.lock().unwrap_or_else(PoisonError::into_inner);
            let entry = monitors.get_mut(session_id)?;
            (entry.join_handle.take(), entry.exited.clone())
        };

        let outcome = match join_handle {
            Some(handle) => Some(await_outcome(handle).await),
            None => {
                exited.cancelled().await;
                None
            }
        };

        let mut monitors = self.monitors.lock().unwrap_or_else(PoisonError::into_inner);
        if monitors.get(session_id).is_some_and(MonitorHandle::is_finished) {
            monitors.remove(session_id);
        }
        outcome
    }

    /// Cancel every monitor and wait for all of them to exit.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let handles: Vec<(String, MonitorHandle)> = self
            .monitors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .collect();

        let count = handles.len();
        for (session_id, handle) in handles {
            let outcome = handle.join().await;
            debug!(%session_id, ?outcome, "monitor stopped");
        }
        info!(count, "session monitors stopped");
    }
}
