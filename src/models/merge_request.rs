//! Merge request thread record.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Slack thread that was opened when a merge request was announced.
///
/// Later merge/close notices, comments and pipeline failures reply into it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct MergeRequestThread {
    /// GitLab project ID.
    pub project_id: i64,

    /// Project-scoped MR number (`iid`).
    pub mr_num: i64,

    /// Slack `ts` of the announcement message.
    pub thread_ts: String,

    /// Slack channel the announcement was posted to.
    pub channel: String,
}

/// Look up the thread of an MR.
pub async fn get_merge_request(
    pool: &sqlx::SqlitePool,
    project_id: i64,
    mr_num: i64,
) -> Result<Option<MergeRequestThread>, sqlx::Error> {
    sqlx::query_as::<_, MergeRequestThread>(
        "SELECT project_id, mr_num, thread_ts, channel
         FROM MergeRequest WHERE project_id = ? AND mr_num = ?",
    )
    .bind(project_id)
    .bind(mr_num)
    .fetch_optional(pool)
    .await
}

/// Insert an MR thread, replacing the thread pointer if the MR was seen before.
pub async fn upsert_merge_request(
    pool: &sqlx::SqlitePool,
    thread: &MergeRequestThread,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO MergeRequest (project_id, mr_num, thread_ts, channel)
         VALUES (?, ?, ?, ?)
         ON CONFLICT(project_id, mr_num) DO UPDATE SET
           thread_ts = excluded.thread_ts,
           channel = excluded.channel",
    )
    .bind(thread.project_id)
    .bind(thread.mr_num)
    .bind(&thread.thread_ts)
    .bind(&thread.channel)
    .execute(pool)
    .await?;

    Ok(())
}
