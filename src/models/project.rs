//! GitLab project model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A GitLab project known to the relay.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Project {
    /// GitLab project ID.
    pub id: i64,

    /// Path with namespace (e.g., "group/subgroup/repo").
    pub name: String,

    /// Slack channel notifications for this project go to; empty when unset.
    pub default_channel: String,
}

impl Project {
    /// Create a project row without a default channel.
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            default_channel: String::new(),
        }
    }
}

/// Look up a project by GitLab ID.
pub async fn get_project_by_id(
    pool: &sqlx::SqlitePool,
    id: i64,
) -> Result<Option<Project>, sqlx::Error> {
    sqlx::query_as::<_, Project>("SELECT id, name, default_channel FROM Project WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Look up a project by its full namespaced path.
pub async fn get_project_by_path(
    pool: &sqlx::SqlitePool,
    path: &str,
) -> Result<Option<Project>, sqlx::Error> {
    sqlx::query_as::<_, Project>("SELECT id, name, default_channel FROM Project WHERE name = ?")
        .bind(path)
        .fetch_optional(pool)
        .await
}

/// Upsert a project.
///
/// Only the name is refreshed on conflict; the default channel is owned by
/// the admin API and survives resyncs.
pub async fn upsert_project(pool: &sqlx::SqlitePool, project: &Project) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO Project (id, name)
         VALUES (?, ?)
         ON CONFLICT(id) DO UPDATE SET
           name = excluded.name",
    )
    .bind(project.id)
    .bind(&project.name)
    .execute(pool)
    .await?;

    Ok(())
}

/// Set the default channel of the project with exactly this path.
pub async fn update_project_default_channel(
    pool: &sqlx::SqlitePool,
    path: &str,
    channel: &str,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("UPDATE Project SET default_channel = ? WHERE name = ?")
        .bind(channel)
        .bind(path)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

/// Set the default channel of every project whose path starts with `prefix`.
///
/// The match is a literal, case-sensitive string prefix: `foo` also matches
/// `foobar/x`, and `_`/`%` in the prefix are not wildcards.
pub async fn update_group_default_channel(
    pool: &sqlx::SqlitePool,
    prefix: &str,
    channel: &str,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE Project SET default_channel = ? WHERE substr(name, 1, length(?)) = ?",
    )
    .bind(channel)
    .bind(prefix)
    .bind(prefix)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
