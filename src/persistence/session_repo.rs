//! Session record repository for `SQLite` persistence.
//!
//! Every status mutation is a compare-and-swap on the previous status so
//! that a read-modify-write of one record is never interleaved with
//! another writer for the same `session_id`.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};

use crate::models::session::{
    IssueRef, ScopingResult, SessionKind, SessionRecord, SessionStatus,
};
use crate::{AppError, Result};

use super::db::Database;

const NON_TERMINAL: &str = "('scoping','resolving','blocked')";

/// Repository wrapper around `SQLite` for session records.
#[derive(Clone)]
pub struct SessionRepo {
    db: Arc<Database>,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct SessionRow {
    session_id: String,
    repo: String,
    issue_number: i64,
    issue_title: Option<String>,
    kind: String,
    status: String,
    session_url: Option<String>,
    action_plan: Option<String>,
    confidence_score: Option<i64>,
    created_at: String,
    updated_at: String,
}

impl SessionRow {
    /// Convert a database row into the domain model.
    fn into_record(self) -> Result<SessionRecord> {
        let issue_number = u64::try_from(self.issue_number)
            .map_err(|e| AppError::Db(format!("invalid issue_number: {e}")))?;
        let confidence_score = self
            .confidence_score
            .map(u8::try_from)
            .transpose()
            .map_err(|e| AppError::Db(format!("invalid confidence_score: {e}")))?;

        Ok(SessionRecord {
            session_id: self.session_id,
            issue: IssueRef {
                repo: self.repo,
                issue_number,
            },
            issue_title: self.issue_title,
            kind: SessionKind::parse(&self.kind)?,
            status: SessionStatus::parse(&self.status)?,
            session_url: self.session_url,
            action_plan: self.action_plan,
            confidence_score,
            created_at: parse_timestamp(&self.created_at, "created_at")?,
            updated_at: parse_timestamp(&self.updated_at, "updated_at")?,
        })
    }
}

fn parse_timestamp(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::Db(format!("invalid {field}: {e}")))
}

/// Fixed-width RFC 3339 so lexicographic order matches chronological order.
fn timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn issue_number_param(issue: &IssueRef) -> Result<i64> {
    i64::try_from(issue.issue_number)
        .map_err(|e| AppError::InvalidInput(format!("issue number out of range: {e}")))
}

impl SessionRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert a new session record.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the insert fails (including a duplicate
    /// `session_id`).
    pub async fn create(&self, record: &SessionRecord) -> Result<SessionRecord> {
        let mut conn = self.db.acquire().await?;
        insert(&mut conn, record).await?;
        Ok(record.clone())
    }

    /// Insert `record`, removing the issue's other non-terminal records of
    /// the same kind in the same transaction.
    ///
    /// Returns the session ids of the replaced records so their monitors
    /// can be stopped.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the transaction fails.
    pub async fn replace_active_for_issue(&self, record: &SessionRecord) -> Result<Vec<String>> {
        let issue_number = issue_number_param(&record.issue)?;
        let mut tx = self.db.begin().await?;

        let replaced: Vec<(String,)> = sqlx::query_as(&format!(
            "SELECT session_id FROM issue_session \
             WHERE repo = ?1 AND issue_number = ?2 AND kind = ?3 AND status IN {NON_TERMINAL}"
        ))
        .bind(&record.issue.repo)
        .bind(issue_number)
        .bind(record.kind.as_str())
        .fetch_all(&mut *tx)
        .await?;

        for (session_id,) in &replaced {
            sqlx::query("DELETE FROM issue_session WHERE session_id = ?1")
                .bind(session_id)
                .execute(&mut *tx)
                .await?;
        }

        insert(&mut tx, record).await?;
        tx.commit().await?;

        Ok(replaced.into_iter().map(|(id,)| id).collect())
    }

    /// Retrieve a record by its session id.
    ///
    /// Returns `Ok(None)` if the record does not exist.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn get_by_id(&self, session_id: &str) -> Result<Option<SessionRecord>> {
        let row: Option<SessionRow> =
            sqlx::query_as("SELECT * FROM issue_session WHERE session_id = ?1")
                .bind(session_id)
                .fetch_optional(self.db.as_ref())
                .await?;

        row.map(SessionRow::into_record).transpose()
    }

    /// List every record, most recently created first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_all(&self) -> Result<Vec<SessionRecord>> {
        let rows: Vec<SessionRow> = sqlx::query_as(
            "SELECT * FROM issue_session ORDER BY created_at DESC, rowid DESC",
        )
        .fetch_all(self.db.as_ref())
        .await?;

        rows.into_iter().map(SessionRow::into_record).collect()
    }

    /// List records still in `scoping`, `resolving`, or `blocked`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_non_terminal(&self) -> Result<Vec<SessionRecord>> {
        let rows: Vec<SessionRow> = sqlx::query_as(&format!(
            "SELECT * FROM issue_session WHERE status IN {NON_TERMINAL} \
             ORDER BY created_at ASC, rowid ASC"
        ))
        .fetch_all(self.db.as_ref())
        .await?;

        rows.into_iter().map(SessionRow::into_record).collect()
    }

    /// Move a record to `next`, refreshing `updated_at`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the record does not exist,
    /// `AppError::InvalidTransition` if the lifecycle forbids the move or a
    /// concurrent writer changed the status first, and `AppError::Db` on
    /// query failure.
    pub async fn update_status(&self, session_id: &str, next: SessionStatus) -> Result<SessionRecord> {
        let mut current = self.require(session_id).await?;
        ensure_transition(&current, next)?;

        let now = Utc::now().trunc_subsecs(6);
        let result = sqlx::query(
            "UPDATE issue_session SET status = ?1, updated_at = ?2 \
             WHERE session_id = ?3 AND status = ?4",
        )
        .bind(next.as_str())
        .bind(timestamp(now))
        .bind(session_id)
        .bind(current.status.as_str())
        .execute(self.db.as_ref())
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::InvalidTransition(format!(
                "session {session_id} changed status concurrently"
            )));
        }

        current.status = next;
        current.updated_at = now;
        Ok(current)
    }

    /// Mark a record `completed`, storing the extracted result if any.
    ///
    /// The plan and confidence are written in the same statement as the
    /// status so they are set together or not at all.
    ///
    /// # Errors
    ///
    /// Same as [`update_status`](Self::update_status).
    pub async fn complete(
        &self,
        session_id: &str,
        result: Option<&ScopingResult>,
    ) -> Result<SessionRecord> {
        let mut current = self.require(session_id).await?;
        ensure_transition(&current, SessionStatus::Completed)?;

        let now = Utc::now().trunc_subsecs(6);
        let plan = result.map(|r| r.plan.clone());
        let confidence = result.map(|r| i64::from(r.confidence));
        let outcome = sqlx::query(
            "UPDATE issue_session SET status = 'completed', action_plan = ?1, \
             confidence_score = ?2, updated_at = ?3 \
             WHERE session_id = ?4 AND status = ?5",
        )
        .bind(&plan)
        .bind(confidence)
        .bind(timestamp(now))
        .bind(session_id)
        .bind(current.status.as_str())
        .execute(self.db.as_ref())
        .await?;

        if outcome.rows_affected() == 0 {
            return Err(AppError::InvalidTransition(format!(
                "session {session_id} changed status concurrently"
            )));
        }

        current.status = SessionStatus::Completed;
        current.action_plan = plan;
        current.confidence_score = result.map(|r| r.confidence);
        current.updated_at = now;
        Ok(current)
    }

    /// Record the remote session link.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the update fails.
    pub async fn set_session_url(&self, session_id: &str, url: &str) -> Result<()> {
        sqlx::query("UPDATE issue_session SET session_url = ?1 WHERE session_id = ?2")
            .bind(url)
            .bind(session_id)
            .execute(self.db.as_ref())
            .await?;

        Ok(())
    }

    async fn require(&self, session_id: &str) -> Result<SessionRecord> {
        self.get_by_id(session_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("session {session_id} not found")))
    }
}

fn ensure_transition(current: &SessionRecord, next: SessionStatus) -> Result<()> {
    if current.status.can_transition_to(next) {
        Ok(())
    } else {
        Err(AppError::InvalidTransition(format!(
            "session {} cannot move from {} to {next}",
            current.session_id, current.status
        )))
    }
}

async fn insert(conn: &mut sqlx::SqliteConnection, record: &SessionRecord) -> Result<()> {
    let issue_number = issue_number_param(&record.issue)?;
    let confidence = record.confidence_score.map(i64::from);

    sqlx::query(
        "INSERT INTO issue_session (session_id, repo, issue_number, issue_title, kind,
         status, session_url, action_plan, confidence_score, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
    )
    .bind(&record.session_id)
    .bind(&record.issue.repo)
    .bind(issue_number)
    .bind(&record.issue_title)
    .bind(record.kind.as_str())
    .bind(record.status.as_str())
    .bind(&record.session_url)
    .bind(&record.action_plan)
    .bind(confidence)
    .bind(timestamp(record.created_at))
    .bind(timestamp(record.updated_at))
    .execute(conn)
    .await?;

    Ok(())
}
