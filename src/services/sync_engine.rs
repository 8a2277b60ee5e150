//! Reconciliation sync.
//!
//! Re-fetches users and projects from GitLab and Slack and upserts them into
//! the store:
//! - Users are joined across the two platforms by email local part
//! - Entities that fail to persist are collected and reported together
//! - A background task syncs at startup and then every local midnight

use chrono::{Local, NaiveDateTime, TimeDelta};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::db::Store;
use crate::error::AppError;
use crate::models::{Project, User};
use crate::services::gitlab_client::GitLabApi;
use crate::services::slack_client::{ChatApi, SlackUser};

/// Email local part, the identity users are joined on.
pub fn email_local_part(email: &str) -> &str {
    email.split('@').next().unwrap_or_default()
}

/// Time left until the next local midnight after `now`.
pub fn duration_until_next_midnight(now: NaiveDateTime) -> Duration {
    let next = now
        .date()
        .succ_opt()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or(now + TimeDelta::days(1));
    (next - now).to_std().unwrap_or_default()
}

/// Joins GitLab and Slack accounts into store rows.
pub struct SyncEngine {
    store: Arc<dyn Store>,
    gitlab: Arc<dyn GitLabApi>,
    chat: Arc<dyn ChatApi>,
}

impl SyncEngine {
    /// Create a new sync engine.
    pub fn new(store: Arc<dyn Store>, gitlab: Arc<dyn GitLabApi>, chat: Arc<dyn ChatApi>) -> Self {
        Self {
            store,
            gitlab,
            chat,
        }
    }

    /// Start the background sync loop.
    ///
    /// Syncs immediately, then once at every local midnight until `shutdown`
    /// is cancelled.
    pub fn start_background(self: Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            log::info!("[sync] Running initial sync...");
            self.sync_all().await;

            loop {
                let wait = duration_until_next_midnight(Local::now().naive_local());
                log::debug!("[sync] Next sync in {}s", wait.as_secs());

                tokio::select! {
                    _ = tokio::time::sleep(wait) => {
                        log::info!("[sync] Running daily sync...");
                        self.sync_all().await;
                    }
                    _ = shutdown.cancelled() => break,
                }
            }
            log::info!("[sync] Sync engine stopped");
        })
    }

    /// Sync users then projects, logging each outcome.
    pub async fn sync_all(&self) {
        match self.sync_users().await {
            Ok(count) => log::info!("[sync] {} users synchronized", count),
            Err(e) => log::error!("[sync] User sync failed: {}", e),
        }
        match self.sync_projects().await {
            Ok(count) => log::info!("[sync] {} projects synchronized", count),
            Err(e) => log::error!("[sync] Project sync failed: {}", e),
        }
    }

    /// Upsert every GitLab user, joined to its Slack account when one exists.
    ///
    /// Slack-only accounts are dropped. Returns how many users were stored,
    /// or [`AppError::PartialSync`] with the emails that failed.
    pub async fn sync_users(&self) -> Result<usize, AppError> {
        let gitlab_users = self.gitlab.list_users().await?;
        let slack_users = self.chat.list_users().await?;

        let slack_by_email: HashMap<&str, &SlackUser> = slack_users
            .iter()
            .filter(|u| !u.email.is_empty())
            .map(|u| (email_local_part(&u.email), u))
            .collect();

        let mut failed = Vec::new();
        for gitlab_user in &gitlab_users {
            let email = email_local_part(&gitlab_user.email);
            let slack_user = slack_by_email.get(email);

            let user = User {
                email: email.to_string(),
                slack_id: slack_user.map(|s| s.id.clone()).unwrap_or_default(),
                gitlab_id: gitlab_user.id,
                name: gitlab_user.name.clone(),
                avatar_url: slack_user.map(|s| s.avatar_url.clone()).unwrap_or_default(),
                default_channel: String::new(),
            };

            if let Err(e) = self.store.create_user(&user).await {
                log::warn!("Failed to sync user {}: {}", email, e);
                failed.push(email.to_string());
            }
        }

        finish(gitlab_users.len(), failed)
    }

    /// Upsert every non-archived GitLab project.
    ///
    /// Returns how many projects were stored, or [`AppError::PartialSync`]
    /// with the paths that failed.
    pub async fn sync_projects(&self) -> Result<usize, AppError> {
        let projects = self.gitlab.list_projects().await?;

        let mut failed = Vec::new();
        for gitlab_project in &projects {
            let project = Project::new(gitlab_project.id, gitlab_project.path_with_namespace.clone());
            if let Err(e) = self.store.create_project(&project).await {
                log::warn!("Failed to sync project {}: {}", project.name, e);
                failed.push(project.name);
            }
        }

        finish(projects.len(), failed)
    }
}

fn finish(total: usize, failed: Vec<String>) -> Result<usize, AppError> {
    if failed.is_empty() {
        Ok(total)
    } else {
        Err(AppError::partial_sync(failed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 2, 28)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn test_duration_until_next_midnight() {
        assert_eq!(
            duration_until_next_midnight(at(23, 59, 30)),
            Duration::from_secs(30)
        );
        assert_eq!(
            duration_until_next_midnight(at(0, 0, 0)),
            Duration::from_secs(24 * 3600)
        );
        assert_eq!(
            duration_until_next_midnight(at(12, 0, 0)),
            Duration::from_secs(12 * 3600)
        );
    }

    #[test]
    fn test_email_local_part() {
        assert_eq!(email_local_part("alice@example.com"), "alice");
        assert_eq!(email_local_part("bob"), "bob");
        assert_eq!(email_local_part(""), "");
    }

    #[test]
    fn test_finish_reports_failures_in_order() {
        assert_eq!(finish(3, vec![]).unwrap(), 3);
        let err = finish(3, vec!["b".into(), "a".into()]).unwrap_err();
        assert_eq!(err.to_string(), r#"["b","a"]"#);
    }
}
