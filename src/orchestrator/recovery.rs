//! Startup sweep that resumes monitoring of unfinished sessions.

use tracing::{info, info_span, Instrument};

use super::supervisor::MonitorSupervisor;
use crate::persistence::session_repo::SessionRepo;
use crate::Result;

/// What the sweep found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Sessions that got a new monitor.
    pub resumed: Vec<String>,
    /// Non-terminal sessions that already had one.
    pub already_monitored: Vec<String>,
}

/// Spawn a monitor for every persisted session that is not terminal.
///
/// Resumed monitors start with a fresh wall-clock budget. A session already
/// recorded as `Blocked` keeps its blocked notification suppressed.
///
/// # Errors
///
/// Returns `AppError::Db` if the session table cannot be read.
pub async fn resume_monitoring(
    store: &SessionRepo,
    supervisor: &MonitorSupervisor,
) -> Result<RecoveryReport> {
    async {
        let pending = store.list_non_terminal().await?;
        if pending.is_empty() {
            info!("no unfinished sessions to resume");
            return Ok(RecoveryReport::default());
        }

        let mut report = RecoveryReport::default();
        for record in &pending {
            if supervisor.spawn(record) {
                info!(
                    session_id = %record.session_id,
                    issue = %record.issue,
                    status = %record.status,
                    "resumed session monitor"
                );
                report.resumed.push(record.session_id.clone());
            } else {
                report.already_monitored.push(record.session_id.clone());
            }
        }

        info!(
            resumed = report.resumed.len(),
            skipped = report.already_monitored.len(),
            "startup recovery complete"
        );
        Ok(report)
    }
    .instrument(info_span!("startup_recovery"))
    .await
}
