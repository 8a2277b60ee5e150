//! In-memory [`Store`] with the same semantics as the SQLite one.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

use crate::db::Store;
use crate::error::AppError;
use crate::models::{IssueThread, MergeRequestThread, Project, User};

#[derive(Debug, Default)]
struct Tables {
    projects: BTreeMap<i64, Project>,
    users: BTreeMap<i64, User>,
    merge_requests: HashMap<(i64, i64), MergeRequestThread>,
    issues: HashMap<(i64, i64), IssueThread>,
}

/// Store kept entirely in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every user row, ordered by GitLab ID.
    pub async fn users(&self) -> Vec<User> {
        self.tables.read().await.users.values().cloned().collect()
    }

    /// Snapshot of every project row, ordered by ID.
    pub async fn projects(&self) -> Vec<Project> {
        self.tables.read().await.projects.values().cloned().collect()
    }

    /// Insert or replace a user row wholesale, default channel included.
    pub async fn put_user(&self, user: User) {
        self.tables.write().await.users.insert(user.gitlab_id, user);
    }

    /// Insert or replace a project row wholesale, default channel included.
    pub async fn put_project(&self, project: Project) {
        self.tables.write().await.projects.insert(project.id, project);
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_project_by_path(&self, path: &str) -> Result<Project, AppError> {
        self.tables
            .read()
            .await
            .projects
            .values()
            .find(|p| p.name == path)
            .cloned()
            .ok_or_else(|| AppError::not_found_with_id("Project", path))
    }

    async fn get_project_by_id(&self, id: i64) -> Result<Project, AppError> {
        self.tables
            .read()
            .await
            .projects
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::not_found_with_id("Project", id.to_string()))
    }

    async fn get_user_by_email(&self, email: &str) -> Result<User, AppError> {
        self.tables
            .read()
            .await
            .users
            .values()
            .find(|u| u.email == email)
            .cloned()
            .ok_or_else(|| AppError::not_found_with_id("User", email))
    }

    async fn get_user_by_id(&self, gitlab_id: i64) -> Result<User, AppError> {
        self.tables
            .read()
            .await
            .users
            .get(&gitlab_id)
            .cloned()
            .ok_or_else(|| AppError::not_found_with_id("User", gitlab_id.to_string()))
    }

    async fn get_merge_request(
        &self,
        project_id: i64,
        mr_num: i64,
    ) -> Result<MergeRequestThread, AppError> {
        self.tables
            .read()
            .await
            .merge_requests
            .get(&(project_id, mr_num))
            .cloned()
            .ok_or_else(|| {
                AppError::not_found_with_id("MergeRequest", format!("{}!{}", project_id, mr_num))
            })
    }

    async fn get_issue(&self, project_id: i64, issue_num: i64) -> Result<IssueThread, AppError> {
        self.tables
            .read()
            .await
            .issues
            .get(&(project_id, issue_num))
            .cloned()
            .ok_or_else(|| {
                AppError::not_found_with_id("Issue", format!("{}#{}", project_id, issue_num))
            })
    }

    async fn update_user_default_channel(
        &self,
        email: &str,
        channel: &str,
    ) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        for user in tables.users.values_mut().filter(|u| u.email == email) {
            user.default_channel = channel.to_string();
        }
        Ok(())
    }

    async fn update_project_default_channel(
        &self,
        path: &str,
        channel: &str,
    ) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        for project in tables.projects.values_mut().filter(|p| p.name == path) {
            project.default_channel = channel.to_string();
        }
        Ok(())
    }

    async fn update_group_default_channel(
        &self,
        prefix: &str,
        channel: &str,
    ) -> Result<u64, AppError> {
        let mut tables = self.tables.write().await;
        let mut updated = 0;
        for project in tables
            .projects
            .values_mut()
            .filter(|p| p.name.starts_with(prefix))
        {
            project.default_channel = channel.to_string();
            updated += 1;
        }
        Ok(updated)
    }

    async fn create_user(&self, user: &User) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        tables
            .users
            .entry(user.gitlab_id)
            .and_modify(|existing| {
                existing.email = user.email.clone();
                existing.slack_id = user.slack_id.clone();
                existing.name = user.name.clone();
                existing.avatar_url = user.avatar_url.clone();
            })
            .or_insert_with(|| User {
                default_channel: String::new(),
                ..user.clone()
            });
        Ok(())
    }

    async fn create_project(&self, project: &Project) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        tables
            .projects
            .entry(project.id)
            .and_modify(|existing| existing.name = project.name.clone())
            .or_insert_with(|| Project::new(project.id, project.name.clone()));
        Ok(())
    }

    async fn create_merge_request(&self, thread: &MergeRequestThread) -> Result<(), AppError> {
        self.tables
            .write()
            .await
            .merge_requests
            .insert((thread.project_id, thread.mr_num), thread.clone());
        Ok(())
    }

    async fn create_issue(&self, thread: &IssueThread) -> Result<(), AppError> {
        self.tables
            .write()
            .await
            .issues
            .insert((thread.project_id, thread.issue_num), thread.clone());
        Ok(())
    }
}
