//! Markdown comment builders for issue notifications.

use crate::models::session::{ScopingResult, SessionKind};

fn session_link(session_id: &str, url: Option<&str>) -> String {
    match url.filter(|u| !u.is_empty()) {
        Some(url) => format!("[`{session_id}`]({url})"),
        None => format!("`{session_id}`"),
    }
}

/// Posted when a session has been created.
#[must_use]
pub fn started(kind: SessionKind, session_id: &str, url: Option<&str>) -> String {
    let link = session_link(session_id, url);
    match kind {
        SessionKind::Scoping => format!(
            "\u{1f916} **Devin AI Analysis Started**\n\n\
             I'm analyzing this issue to provide a detailed action plan and confidence score.\n\n\
             Session: {link}"
        ),
        SessionKind::Resolving => format!(
            "\u{1f680} **Devin AI Resolution Started**\n\n\
             I'm working on resolving this issue. I'll provide updates as I make progress.\n\n\
             Session: {link}"
        ),
    }
}

/// Posted when a scoping session produced a complete plan and score.
#[must_use]
pub fn scoping_result(result: &ScopingResult, session_id: &str, url: Option<&str>) -> String {
    format!(
        "\u{2705} **Devin AI Analysis Complete**\n\n\
         **Confidence Score:** {}%\n\n\
         **Action Plan:**\n{}\n\n\
         Session: {}",
        result.confidence,
        result.plan,
        session_link(session_id, url)
    )
}

/// Posted when a scoping session finished without a parseable result.
#[must_use]
pub fn scoping_without_result(session_id: &str, url: Option<&str>) -> String {
    format!(
        "\u{2139}\u{fe0f} **Devin AI Analysis Finished**\n\n\
         The session completed but no structured action plan and confidence score \
         could be extracted. Please review the session directly: {}",
        session_link(session_id, url)
    )
}

/// Posted when a resolving session finished.
#[must_use]
pub fn resolution_completed(session_id: &str, url: Option<&str>) -> String {
    format!(
        "\u{1f3c1} **Devin AI Resolution Finished**\n\n\
         The resolution session has completed. Check the session and any linked \
         pull request for details: {}",
        session_link(session_id, url)
    )
}

/// Posted once, on the first observation of a blocked session.
#[must_use]
pub fn blocked(kind: SessionKind, session_id: &str, url: Option<&str>) -> String {
    let activity = match kind {
        SessionKind::Scoping => "analysis",
        SessionKind::Resolving => "resolution",
    };
    format!(
        "\u{23f8}\u{fe0f} **Devin AI {activity} is blocked**\n\n\
         The session is waiting and may need input. Reply in the session to unblock it: {}",
        session_link(session_id, url)
    )
}

/// Posted when the monitor's wall-clock budget ran out.
#[must_use]
pub fn timed_out(kind: SessionKind, session_id: &str, url: Option<&str>, budget_secs: u64) -> String {
    let activity = match kind {
        SessionKind::Scoping => "Analysis",
        SessionKind::Resolving => "Resolution",
    };
    format!(
        "\u{231b} **Devin AI {activity} Timed Out**\n\n\
         No final result after {} minute(s) of monitoring. The session may still be \
         running: {}",
        budget_secs / 60,
        session_link(session_id, url)
    )
}

/// Posted when monitoring stopped on an unexpected error.
#[must_use]
pub fn monitor_error(session_id: &str, url: Option<&str>, error: &str) -> String {
    format!(
        "\u{274c} **Devin AI Monitoring Error**\n\n\
         Monitoring of session {} stopped unexpectedly: {error}",
        session_link(session_id, url)
    )
}
