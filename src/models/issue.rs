//! Issue thread record.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Slack thread that was opened when an issue was announced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct IssueThread {
    /// GitLab project ID.
    pub project_id: i64,

    /// Project-scoped issue number (`iid`).
    pub issue_num: i64,

    /// Slack `ts` of the announcement message.
    pub thread_ts: String,

    /// Slack channel the announcement was posted to.
    pub channel: String,
}

/// Look up the thread of an issue.
pub async fn get_issue(
    pool: &sqlx::SqlitePool,
    project_id: i64,
    issue_num: i64,
) -> Result<Option<IssueThread>, sqlx::Error> {
    sqlx::query_as::<_, IssueThread>(
        "SELECT project_id, issue_num, thread_ts, channel
         FROM Issue WHERE project_id = ? AND issue_num = ?",
    )
    .bind(project_id)
    .bind(issue_num)
    .fetch_optional(pool)
    .await
}

/// Insert an issue thread, replacing the thread pointer on reopen.
pub async fn upsert_issue(pool: &sqlx::SqlitePool, thread: &IssueThread) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO Issue (project_id, issue_num, thread_ts, channel)
         VALUES (?, ?, ?, ?)
         ON CONFLICT(project_id, issue_num) DO UPDATE SET
           thread_ts = excluded.thread_ts,
           channel = excluded.channel",
    )
    .bind(thread.project_id)
    .bind(thread.issue_num)
    .bind(&thread.thread_ts)
    .bind(&thread.channel)
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_upsert_and_get_issue() {
        let dir = tempdir().unwrap();
        let pool = db::initialize(&dir.path().join("test.db")).await.unwrap();

        let thread = IssueThread {
            project_id: 9,
            issue_num: 12,
            thread_ts: "1700000000.000100".to_string(),
            channel: "C0ISSUES".to_string(),
        };
        upsert_issue(&pool, &thread).await.unwrap();

        assert_eq!(get_issue(&pool, 9, 12).await.unwrap(), Some(thread));
        assert!(get_issue(&pool, 9, 13).await.unwrap().is_none());
        assert!(get_issue(&pool, 10, 12).await.unwrap().is_none());
    }
}
