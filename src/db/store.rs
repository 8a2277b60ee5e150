//! The storage capability used by the webhook engine, the sync engine and the
//! admin API.
//!
//! Lookups fail with [`AppError::NotFound`] when no row matches and with
//! [`AppError::Database`] for anything else, so callers can treat the former
//! as an expected branch.

use async_trait::async_trait;

use crate::db::pool::DbPool;
use crate::error::AppError;
use crate::models::{self, IssueThread, MergeRequestThread, Project, User};

/// Key-based lookups, idempotent upserts and default-channel updates.
#[async_trait]
pub trait Store: Send + Sync {
    async fn get_project_by_path(&self, path: &str) -> Result<Project, AppError>;
    async fn get_project_by_id(&self, id: i64) -> Result<Project, AppError>;
    async fn get_user_by_email(&self, email: &str) -> Result<User, AppError>;
    async fn get_user_by_id(&self, gitlab_id: i64) -> Result<User, AppError>;
    async fn get_merge_request(
        &self,
        project_id: i64,
        mr_num: i64,
    ) -> Result<MergeRequestThread, AppError>;
    async fn get_issue(&self, project_id: i64, issue_num: i64) -> Result<IssueThread, AppError>;

    async fn update_user_default_channel(&self, email: &str, channel: &str)
        -> Result<(), AppError>;
    async fn update_project_default_channel(
        &self,
        path: &str,
        channel: &str,
    ) -> Result<(), AppError>;
    /// Returns how many projects matched the prefix.
    async fn update_group_default_channel(
        &self,
        prefix: &str,
        channel: &str,
    ) -> Result<u64, AppError>;

    async fn create_user(&self, user: &User) -> Result<(), AppError>;
    async fn create_project(&self, project: &Project) -> Result<(), AppError>;
    async fn create_merge_request(&self, thread: &MergeRequestThread) -> Result<(), AppError>;
    async fn create_issue(&self, thread: &IssueThread) -> Result<(), AppError>;
}

/// Production store backed by the SQLite pool.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

fn found<T>(row: Option<T>, resource: &str, id: impl ToString) -> Result<T, AppError> {
    row.ok_or_else(|| AppError::not_found_with_id(resource, id.to_string()))
}

#[async_trait]
impl Store for SqliteStore {
    async fn get_project_by_path(&self, path: &str) -> Result<Project, AppError> {
        let row = models::project::get_project_by_path(&self.pool, path).await?;
        found(row, "Project", path)
    }

    async fn get_project_by_id(&self, id: i64) -> Result<Project, AppError> {
        let row = models::project::get_project_by_id(&self.pool, id).await?;
        found(row, "Project", id)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<User, AppError> {
        let row = models::user::get_user_by_email(&self.pool, email).await?;
        found(row, "User", email)
    }

    async fn get_user_by_id(&self, gitlab_id: i64) -> Result<User, AppError> {
        let row = models::user::get_user_by_gitlab_id(&self.pool, gitlab_id).await?;
        found(row, "User", gitlab_id)
    }

    async fn get_merge_request(
        &self,
        project_id: i64,
        mr_num: i64,
    ) -> Result<MergeRequestThread, AppError> {
        let row = models::merge_request::get_merge_request(&self.pool, project_id, mr_num).await?;
        found(row, "MergeRequest", format!("{}!{}", project_id, mr_num))
    }

    async fn get_issue(&self, project_id: i64, issue_num: i64) -> Result<IssueThread, AppError> {
        let row = models::issue::get_issue(&self.pool, project_id, issue_num).await?;
        found(row, "Issue", format!("{}#{}", project_id, issue_num))
    }

    async fn update_user_default_channel(
        &self,
        email: &str,
        channel: &str,
    ) -> Result<(), AppError> {
        models::user::update_user_default_channel(&self.pool, email, channel)
            .await
            .map_err(|e| AppError::database_with_op(e.to_string(), "update_user_default_channel"))?;
        Ok(())
    }

    async fn update_project_default_channel(
        &self,
        path: &str,
        channel: &str,
    ) -> Result<(), AppError> {
        models::project::update_project_default_channel(&self.pool, path, channel)
            .await
            .map_err(|e| {
                AppError::database_with_op(e.to_string(), "update_project_default_channel")
            })?;
        Ok(())
    }

    async fn update_group_default_channel(
        &self,
        prefix: &str,
        channel: &str,
    ) -> Result<u64, AppError> {
        models::project::update_group_default_channel(&self.pool, prefix, channel)
            .await
            .map_err(|e| AppError::database_with_op(e.to_string(), "update_group_default_channel"))
    }

    async fn create_user(&self, user: &User) -> Result<(), AppError> {
        Ok(models::user::upsert_user(&self.pool, user).await?)
    }

    async fn create_project(&self, project: &Project) -> Result<(), AppError> {
        Ok(models::project::upsert_project(&self.pool, project).await?)
    }

    async fn create_merge_request(&self, thread: &MergeRequestThread) -> Result<(), AppError> {
        Ok(models::merge_request::upsert_merge_request(&self.pool, thread).await?)
    }

    async fn create_issue(&self, thread: &IssueThread) -> Result<(), AppError> {
        Ok(models::issue::upsert_issue(&self.pool, thread).await?)
    }
}
