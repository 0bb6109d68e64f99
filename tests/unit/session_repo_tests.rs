use std::sync::Arc;

use issue_agent_bridge::models::session::{
    IssueRef, ScopingResult, SessionKind, SessionRecord, SessionStatus,
};
use issue_agent_bridge::persistence::{db, session_repo::SessionRepo};
use issue_agent_bridge::AppError;

async fn repo() -> SessionRepo {
    let db = db::connect_memory().await.expect("db connect");
    SessionRepo::new(Arc::new(db))
}

fn record(session_id: &str, number: u64, kind: SessionKind) -> SessionRecord {
    SessionRecord::new(
        session_id.to_owned(),
        IssueRef::new("google/meridian", number).expect("issue ref"),
        kind,
        Some(format!("Issue {number}")),
        Some(format!("https://agent.test/{session_id}")),
    )
}

#[tokio::test]
async fn in_memory_connect_creates_session_table() {
    let pool = db::connect_memory()
        .await
        .expect("in-memory connect should succeed");

    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM issue_session")
        .fetch_one(&pool)
        .await
        .expect("table should be queryable");
    assert_eq!(row.0, 0);
}

#[tokio::test]
async fn create_and_fetch_round_trips_fields() {
    let repo = repo().await;
    let created = repo
        .create(&record("s-1", 12, SessionKind::Scoping))
        .await
        .expect("create");

    let fetched = repo.get_by_id("s-1").await.expect("fetch").expect("exists");
    assert_eq!(fetched.session_id, "s-1");
    assert_eq!(fetched.issue, created.issue);
    assert_eq!(fetched.kind, SessionKind::Scoping);
    assert_eq!(fetched.status, SessionStatus::Scoping);
    assert_eq!(fetched.issue_title.as_deref(), Some("Issue 12"));
    assert_eq!(fetched.session_url.as_deref(), Some("https://agent.test/s-1"));
    assert_eq!(fetched.created_at, created.created_at);

    assert!(repo.get_by_id("missing").await.expect("fetch").is_none());
}

#[tokio::test]
async fn duplicate_session_id_is_rejected() {
    let repo = repo().await;
    repo.create(&record("s-dup", 1, SessionKind::Scoping))
        .await
        .expect("first insert");

    let again = repo.create(&record("s-dup", 2, SessionKind::Scoping)).await;
    assert!(matches!(again, Err(AppError::Db(_))), "got {again:?}");
}

#[tokio::test]
async fn list_all_is_newest_first() {
    let repo = repo().await;
    for id in ["s-a", "s-b", "s-c"] {
        repo.create(&record(id, 1, SessionKind::Scoping))
            .await
            .expect("create");
    }

    let ids: Vec<String> = repo
        .list_all()
        .await
        .expect("list")
        .into_iter()
        .map(|r| r.session_id)
        .collect();
    assert_eq!(ids, vec!["s-c", "s-b", "s-a"]);
}

#[tokio::test]
async fn list_non_terminal_skips_finished_records() {
    let repo = repo().await;
    repo.create(&record("s-scope", 1, SessionKind::Scoping))
        .await
        .expect("create");
    repo.create(&record("s-block", 2, SessionKind::Resolving))
        .await
        .expect("create");
    repo.create(&record("s-done", 3, SessionKind::Scoping))
        .await
        .expect("create");
    repo.create(&record("s-late", 4, SessionKind::Resolving))
        .await
        .expect("create");

    repo.update_status("s-block", SessionStatus::Blocked)
        .await
        .expect("block");
    repo.complete("s-done", None).await.expect("complete");
    repo.update_status("s-late", SessionStatus::Timeout)
        .await
        .expect("time out");

    let ids: Vec<String> = repo
        .list_non_terminal()
        .await
        .expect("list")
        .into_iter()
        .map(|r| r.session_id)
        .collect();
    assert_eq!(ids, vec!["s-scope", "s-block"]);
}

#[tokio::test]
async fn update_status_refreshes_updated_at() {
    let repo = repo().await;
    let created = repo
        .create(&record("s-1", 1, SessionKind::Resolving))
        .await
        .expect("create");

    let blocked = repo
        .update_status("s-1", SessionStatus::Blocked)
        .await
        .expect("block");
    assert_eq!(blocked.status, SessionStatus::Blocked);
    assert!(blocked.updated_at >= created.updated_at);

    let stored = repo.get_by_id("s-1").await.expect("fetch").expect("exists");
    assert_eq!(stored.status, SessionStatus::Blocked);
    assert_eq!(stored.created_at, created.created_at);
}

#[tokio::test]
async fn terminal_records_refuse_every_transition() {
    let repo = repo().await;
    repo.create(&record("s-1", 1, SessionKind::Scoping))
        .await
        .expect("create");
    repo.update_status("s-1", SessionStatus::Timeout)
        .await
        .expect("time out");

    for next in [
        SessionStatus::Scoping,
        SessionStatus::Blocked,
        SessionStatus::Completed,
    ] {
        let result = repo.update_status("s-1", next).await;
        assert!(
            matches!(result, Err(AppError::InvalidTransition(_))),
            "timeout -> {next} gave {result:?}"
        );
    }
    let completed = repo.complete("s-1", None).await;
    assert!(matches!(completed, Err(AppError::InvalidTransition(_))));

    let stored = repo.get_by_id("s-1").await.expect("fetch").expect("exists");
    assert_eq!(stored.status, SessionStatus::Timeout);
}

#[tokio::test]
async fn updating_missing_record_is_not_found() {
    let repo = repo().await;
    let result = repo.update_status("ghost", SessionStatus::Blocked).await;
    assert!(matches!(result, Err(AppError::NotFound(_))), "got {result:?}");
}

#[tokio::test]
async fn complete_stores_plan_and_score_together() {
    let repo = repo().await;
    repo.create(&record("s-1", 1, SessionKind::Scoping))
        .await
        .expect("create");
    repo.update_status("s-1", SessionStatus::Blocked)
        .await
        .expect("block");

    let result = ScopingResult {
        plan: "1. Reproduce\n2. Fix".into(),
        confidence: 85,
    };
    let completed = repo.complete("s-1", Some(&result)).await.expect("complete");
    assert_eq!(completed.status, SessionStatus::Completed);

    let stored = repo.get_by_id("s-1").await.expect("fetch").expect("exists");
    assert_eq!(stored.action_plan.as_deref(), Some("1. Reproduce\n2. Fix"));
    assert_eq!(stored.confidence_score, Some(85));
}

#[tokio::test]
async fn complete_without_result_leaves_both_fields_empty() {
    let repo = repo().await;
    repo.create(&record("s-1", 1, SessionKind::Resolving))
        .await
        .expect("create");

    repo.complete("s-1", None).await.expect("complete");

    let stored = repo.get_by_id("s-1").await.expect("fetch").expect("exists");
    assert_eq!(stored.status, SessionStatus::Completed);
    assert_eq!(stored.action_plan, None);
    assert_eq!(stored.confidence_score, None);
}

/// The schema itself refuses a plan without a score.
#[tokio::test]
async fn schema_rejects_half_a_result() {
    let pool = db::connect_memory().await.expect("db connect");
    let result = sqlx::query(
        "INSERT INTO issue_session (session_id, repo, issue_number, kind, status,
         action_plan, created_at, updated_at)
         VALUES ('s-x', 'google/meridian', 1, 'scoping', 'completed', 'plan',
         '2026-01-01T00:00:00.000000Z', '2026-01-01T00:00:00.000000Z')",
    )
    .execute(&pool)
    .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn replace_removes_unfinished_records_of_same_kind() {
    let repo = repo().await;
    repo.create(&record("s-old", 5, SessionKind::Resolving))
        .await
        .expect("create");
    repo.create(&record("s-done", 5, SessionKind::Resolving))
        .await
        .expect("create");
    repo.complete("s-done", None).await.expect("complete");
    repo.create(&record("s-scope", 5, SessionKind::Scoping))
        .await
        .expect("create");
    repo.create(&record("s-other", 6, SessionKind::Resolving))
        .await
        .expect("create");

    let replaced = repo
        .replace_active_for_issue(&record("s-new", 5, SessionKind::Resolving))
        .await
        .expect("replace");
    assert_eq!(replaced, vec!["s-old".to_owned()]);

    assert!(repo.get_by_id("s-old").await.expect("fetch").is_none());
    for kept in ["s-done", "s-scope", "s-other", "s-new"] {
        assert!(
            repo.get_by_id(kept).await.expect("fetch").is_some(),
            "{kept} should survive"
        );
    }
}

#[tokio::test]
async fn set_session_url_overwrites_link() {
    let repo = repo().await;
    repo.create(&record("s-1", 1, SessionKind::Scoping))
        .await
        .expect("create");

    repo.set_session_url("s-1", "https://agent.test/moved")
        .await
        .expect("set url");

    let stored = repo.get_by_id("s-1").await.expect("fetch").expect("exists");
    assert_eq!(stored.session_url.as_deref(), Some("https://agent.test/moved"));
}

/// Records survive reopening the on-disk database.
#[tokio::test]
async fn file_database_persists_across_connections() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("nested").join("issues.db");

    {
        let pool = db::connect(&path).await.expect("connect file db");
        let repo = SessionRepo::new(Arc::new(pool.clone()));
        repo.create(&record("s-disk", 9, SessionKind::Scoping))
            .await
            .expect("create");
        repo.update_status("s-disk", SessionStatus::Blocked)
            .await
            .expect("block");
        pool.close().await;
    }

    let pool = db::connect(&path).await.expect("reconnect");
    let repo = SessionRepo::new(Arc::new(pool));
    let pending = repo.list_non_terminal().await.expect("list");
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].status, SessionStatus::Blocked);
}
