//! `SQLite` schema bootstrap logic.
//!
//! All definitions use `IF NOT EXISTS` and are safe to re-run on every
//! server startup.

use sqlx::SqlitePool;

use crate::Result;

/// Apply all table definitions to the connected `SQLite` database.
///
/// # Errors
///
/// Returns `AppError::Db` if any DDL statement fails.
pub async fn bootstrap_schema(pool: &SqlitePool) -> Result<()> {
    let ddl = r"
CREATE TABLE IF NOT EXISTS issue_session (
    session_id        TEXT PRIMARY KEY NOT NULL,
    repo              TEXT NOT NULL,
    issue_number      INTEGER NOT NULL,
    issue_title       TEXT,
    kind              TEXT NOT NULL CHECK(kind IN ('scoping','resolving')),
    status            TEXT NOT NULL CHECK(status IN ('scoping','resolving','blocked','completed','timeout')),
    session_url       TEXT,
    action_plan       TEXT,
    confidence_score  INTEGER CHECK(confidence_score IS NULL OR confidence_score BETWEEN 0 AND 100),
    created_at        TEXT NOT NULL,
    updated_at        TEXT NOT NULL,
    CHECK((action_plan IS NULL) = (confidence_score IS NULL))
);

CREATE INDEX IF NOT EXISTS idx_issue_session_issue ON issue_session(repo, issue_number);
CREATE INDEX IF NOT EXISTS idx_issue_session_status ON issue_session(status);
";

    sqlx::raw_sql(ddl).execute(pool).await?;
    Ok(())
}
