//! User model joining a GitLab account to a Slack account.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A GitLab user, optionally mapped to a Slack member.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct User {
    /// Local part of the GitLab email (before `@`).
    pub email: String,

    /// Slack member ID; empty when the user has no Slack account.
    pub slack_id: String,

    /// GitLab user ID (unique).
    pub gitlab_id: i64,

    /// GitLab display name.
    pub name: String,

    /// Slack avatar URL; empty when unmapped.
    pub avatar_url: String,

    /// Preferred Slack channel; empty when unset.
    pub default_channel: String,
}

impl User {
    /// How the user is referred to in a Slack message.
    ///
    /// Mapped users get a real `<@ID>` mention; others fall back to their
    /// GitLab display name.
    pub fn mention(&self) -> String {
        if self.slack_id.is_empty() {
            self.name.clone()
        } else {
            format!("<@{}>", self.slack_id)
        }
    }
}

const USER_COLUMNS: &str = "email, slack_id, gitlab_id, name, avatar_url, default_channel";

/// Look up a user by email local part.
pub async fn get_user_by_email(
    pool: &sqlx::SqlitePool,
    email: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("SELECT {} FROM User WHERE email = ?", USER_COLUMNS))
        .bind(email)
        .fetch_optional(pool)
        .await
}

/// Look up a user by GitLab ID.
pub async fn get_user_by_gitlab_id(
    pool: &sqlx::SqlitePool,
    gitlab_id: i64,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM User WHERE gitlab_id = ?",
        USER_COLUMNS
    ))
    .bind(gitlab_id)
    .fetch_optional(pool)
    .await
}

/// Upsert a user keyed on GitLab ID.
///
/// The default channel is left untouched on conflict.
pub async fn upsert_user(pool: &sqlx::SqlitePool, user: &User) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO User (gitlab_id, email, slack_id, name, avatar_url)
         VALUES (?, ?, ?, ?, ?)
         ON CONFLICT(gitlab_id) DO UPDATE SET
           email = excluded.email,
           slack_id = excluded.slack_id,
           name = excluded.name,
           avatar_url = excluded.avatar_url",
    )
    .bind(user.gitlab_id)
    .bind(&user.email)
    .bind(&user.slack_id)
    .bind(&user.name)
    .bind(&user.avatar_url)
    .execute(pool)
    .await?;

    Ok(())
}

/// Set the default channel of the user(s) with this email local part.
pub async fn update_user_default_channel(
    pool: &sqlx::SqlitePool,
    email: &str,
    channel: &str,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("UPDATE User SET default_channel = ? WHERE email = ?")
        .bind(channel)
        .bind(email)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}
