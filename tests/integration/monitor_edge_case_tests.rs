//! Monitor behaviour around budgets, blocked sessions, failures and
//! cancellation, driven directly on seeded records.

use std::time::Duration;

use issue_agent_bridge::models::session::{SessionKind, SessionStatus};
use issue_agent_bridge::models::transcript::{RemoteStatus, SessionSnapshot, TranscriptMessage};
use issue_agent_bridge::orchestrator::monitor::{MonitorOutcome, SessionMonitor};
use tokio_util::sync::CancellationToken;

use super::test_helpers::{
    blocked, blocked_with, fast_settings, finished, plan_message, running, seed, Harness,
    EXPECTED_PLAN,
};

/// The budget check runs after the fetch and wins over its result.
#[tokio::test]
async fn elapsed_budget_beats_blocked_fetch() {
    let mut settings = fast_settings();
    settings.max_wait = Duration::from_millis(30);
    let h = Harness::new(settings).await;
    let record = seed(&h.store, "s-budget", SessionKind::Scoping, SessionStatus::Scoping).await;
    h.gateway.script("s-budget", vec![blocked()]);
    h.gateway.delay_fetches(Duration::from_millis(80));

    let outcome = SessionMonitor::new(h.context(), &record, CancellationToken::new())
        .run()
        .await;

    assert_eq!(outcome, MonitorOutcome::TimedOut);
    assert_eq!(h.record("s-budget").await.status, SessionStatus::Timeout);
    assert_eq!(h.gateway.polls("s-budget"), 1);
    assert_eq!(h.notifier.count_containing("is blocked"), 0);
    assert_eq!(h.notifier.bodies().len(), 1);
}

#[tokio::test]
async fn elapsed_budget_beats_finished_fetch() {
    let mut settings = fast_settings();
    settings.max_wait = Duration::from_millis(30);
    let h = Harness::new(settings).await;
    let record = seed(&h.store, "s-late", SessionKind::Scoping, SessionStatus::Scoping).await;
    h.gateway
        .script("s-late", vec![finished(vec![plan_message("85%")])]);
    h.gateway.delay_fetches(Duration::from_millis(80));

    let outcome = SessionMonitor::new(h.context(), &record, CancellationToken::new())
        .run()
        .await;

    assert_eq!(outcome, MonitorOutcome::TimedOut);
    let stored = h.record("s-late").await;
    assert_eq!(stored.status, SessionStatus::Timeout);
    assert_eq!(stored.action_plan, None);
}

/// A blocked scoping session that already answered is treated as done.
#[tokio::test]
async fn blocked_scoping_with_complete_result_finishes() {
    let h = Harness::new(fast_settings()).await;
    let record = seed(&h.store, "s-early", SessionKind::Scoping, SessionStatus::Scoping).await;
    h.gateway
        .script("s-early", vec![blocked_with(vec![plan_message("60%")])]);

    let outcome = SessionMonitor::new(h.context(), &record, CancellationToken::new())
        .run()
        .await;

    assert_eq!(outcome, MonitorOutcome::Completed);
    let stored = h.record("s-early").await;
    assert_eq!(stored.status, SessionStatus::Completed);
    assert_eq!(stored.confidence_score, Some(60));
    assert_eq!(stored.action_plan.as_deref(), Some(EXPECTED_PLAN));
    assert_eq!(h.notifier.count_containing("is blocked"), 0);
    assert_eq!(h.notifier.count_containing("Analysis Complete"), 1);
}

/// A partial result while blocked is not enough to finish early.
#[tokio::test]
async fn blocked_scoping_with_plan_but_no_score_stays_blocked() {
    let h = Harness::new(fast_settings()).await;
    let record = seed(&h.store, "s-half", SessionKind::Scoping, SessionStatus::Scoping).await;
    let partial = TranscriptMessage::agent("ACTION PLAN:\n1. Investigate");
    h.gateway.script(
        "s-half",
        vec![
            blocked_with(vec![partial.clone()]),
            blocked_with(vec![partial]),
            finished(vec![plan_message("55%")]),
        ],
    );

    let outcome = SessionMonitor::new(h.context(), &record, CancellationToken::new())
        .run()
        .await;

    assert_eq!(outcome, MonitorOutcome::Completed);
    assert_eq!(h.notifier.count_containing("is blocked"), 1);
    assert_eq!(h.record("s-half").await.confidence_score, Some(55));
}

#[tokio::test]
async fn resolving_session_goes_blocked_then_completed() {
    let h = Harness::new(fast_settings()).await;
    let record = seed(&h.store, "s-res", SessionKind::Resolving, SessionStatus::Resolving).await;
    h.gateway.script(
        "s-res",
        vec![running(), blocked(), blocked(), running(), finished(Vec::new())],
    );

    let outcome = SessionMonitor::new(h.context(), &record, CancellationToken::new())
        .run()
        .await;

    assert_eq!(outcome, MonitorOutcome::Completed);
    assert_eq!(h.record("s-res").await.status, SessionStatus::Completed);
    let bodies = h.notifier.bodies();
    assert_eq!(bodies.len(), 2, "blocked + completion, got {bodies:#?}");
    assert!(bodies[0].contains("resolution is blocked"));
    assert!(bodies[1].contains("Resolution Finished"));
}

/// Lost notifications never stop the state machine.
#[tokio::test]
async fn notifier_failures_do_not_stop_monitoring() {
    let h = Harness::new(fast_settings()).await;
    h.notifier.fail_all();
    let record = seed(&h.store, "s-mute", SessionKind::Scoping, SessionStatus::Scoping).await;
    h.gateway.script(
        "s-mute",
        vec![blocked(), finished(vec![plan_message("85%")])],
    );

    let outcome = SessionMonitor::new(h.context(), &record, CancellationToken::new())
        .run()
        .await;

    assert_eq!(outcome, MonitorOutcome::Completed);
    let stored = h.record("s-mute").await;
    assert_eq!(stored.status, SessionStatus::Completed);
    assert_eq!(stored.confidence_score, Some(85));
    assert!(h.notifier.bodies().is_empty());
}

/// Cancellation stops the loop without touching the record or the issue.
#[tokio::test]
async fn cancelled_monitor_leaves_record_untouched() {
    let h = Harness::new(fast_settings()).await;
    let record = seed(&h.store, "s-stop", SessionKind::Scoping, SessionStatus::Scoping).await;
    h.gateway.script("s-stop", vec![running()]);

    assert!(h.supervisor.spawn(&record));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(h.supervisor.is_monitoring("s-stop"));

    h.supervisor.shutdown().await;

    assert!(!h.supervisor.is_monitoring("s-stop"));
    assert!(h.shutdown.is_cancelled());
    assert_eq!(h.record("s-stop").await.status, SessionStatus::Scoping);
    assert!(h.notifier.bodies().is_empty());
    assert!(!h.supervisor.spawn(&record), "no spawning after shutdown");
}

/// A stale in-memory view can never move a terminal record back.
#[tokio::test]
async fn terminal_record_is_never_reopened() {
    let h = Harness::new(fast_settings()).await;
    let stale = seed(&h.store, "s-done", SessionKind::Scoping, SessionStatus::Scoping).await;
    h.store.complete("s-done", None).await.expect("complete");
    h.gateway.script("s-done", vec![blocked()]);

    let outcome = SessionMonitor::new(h.context(), &stale, CancellationToken::new())
        .run()
        .await;

    assert_eq!(outcome, MonitorOutcome::Failed);
    assert_eq!(h.record("s-done").await.status, SessionStatus::Completed);
    assert_eq!(h.notifier.count_containing("is blocked"), 0);
    assert_eq!(h.notifier.count_containing("Monitoring Error"), 1);
}

#[tokio::test]
async fn missing_record_stops_quietly() {
    let h = Harness::new(fast_settings()).await;
    let ghost = seed(&h.store, "s-ghost", SessionKind::Scoping, SessionStatus::Scoping).await;
    let other = issue_agent_bridge::persistence::session_repo::SessionRepo::new(std::sync::Arc::new(
        issue_agent_bridge::persistence::db::connect_memory()
            .await
            .expect("second db"),
    ));
    let mut ctx = h.context();
    ctx.store = other;
    h.gateway.script("s-ghost", vec![finished(Vec::new())]);

    let outcome = SessionMonitor::new(ctx, &ghost, CancellationToken::new())
        .run()
        .await;

    assert_eq!(outcome, MonitorOutcome::Cancelled);
    assert!(h.notifier.bodies().is_empty());
}

/// The remote link reported while polling replaces the stored one.
#[tokio::test]
async fn session_url_is_refreshed_from_polling() {
    let h = Harness::new(fast_settings()).await;
    let record = seed(&h.store, "s-url", SessionKind::Resolving, SessionStatus::Resolving).await;
    h.gateway.script(
        "s-url",
        vec![Ok(SessionSnapshot {
            status: RemoteStatus::Finished,
            raw_status: Some("finished".into()),
            messages: Vec::new(),
            url: Some("https://agent.test/moved/s-url".into()),
        })],
    );

    let outcome = SessionMonitor::new(h.context(), &record, CancellationToken::new())
        .run()
        .await;

    assert_eq!(outcome, MonitorOutcome::Completed);
    let stored = h.record("s-url").await;
    assert_eq!(
        stored.session_url.as_deref(),
        Some("https://agent.test/moved/s-url")
    );
    assert!(h.notifier.bodies()[0].contains("https://agent.test/moved/s-url"));
}

/// A pending join keeps the session registered, so no second monitor starts.
#[tokio::test]
async fn pending_join_blocks_duplicate_spawn() {
    let h = Harness::new(fast_settings()).await;
    let record = seed(&h.store, "s-join", SessionKind::Resolving, SessionStatus::Resolving).await;
    h.gateway.script("s-join", vec![running()]);
    assert!(h.supervisor.spawn(&record));

    let supervisor = std::sync::Arc::clone(&h.supervisor);
    let joiner = tokio::spawn(async move { supervisor.join("s-join").await });
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(!joiner.is_finished());
    assert!(h.supervisor.is_monitoring("s-join"));
    assert!(!h.supervisor.spawn(&record), "second monitor must be refused");

    assert!(h.supervisor.cancel("s-join"));
    let outcome = tokio::time::timeout(Duration::from_secs(5), joiner)
        .await
        .expect("join completes")
        .expect("join task");
    assert_eq!(outcome, Some(MonitorOutcome::Cancelled));
    assert!(!h.supervisor.is_monitoring("s-join"));
    assert_eq!(h.record("s-join").await.status, SessionStatus::Resolving);
}
