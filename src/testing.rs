//! Scriptable doubles for the GitLab, Slack and store capabilities.
//!
//! Used by unit and integration tests to drive the webhook engine, the
//! pipeline tracker and the sync engine without network or disk.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;

use crate::db::{MemoryStore, Store};
use crate::error::AppError;
use crate::models::{IssueThread, MergeRequestThread, Project, User};
use crate::services::gitlab_client::{GitLabApi, GitLabPipeline, GitLabProject, GitLabTag, GitLabUser};
use crate::services::slack_client::{ChatApi, OutgoingMessage, PostedMessage, SlackUser};

/// ID reported for every scripted pipeline.
pub const PIPELINE_ID: i64 = 42;

/// URL reported for every scripted pipeline.
pub const PIPELINE_URL: &str = "https://gitlab.example.com/grp/repo/-/pipelines/42";

/// One scripted answer to a pipeline status poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineStep {
    /// No pipeline exists yet.
    Pending,
    /// A pipeline with this status.
    Status(String),
    /// The call fails.
    Error,
}

/// Scriptable [`GitLabApi`].
#[derive(Debug, Default)]
pub struct MockGitLab {
    users: Vec<GitLabUser>,
    projects: Vec<GitLabProject>,
    tags: HashMap<i64, Vec<GitLabTag>>,
    pipeline: Vec<PipelineStep>,
    pipeline_polls: AtomicUsize,
    tag_calls: AtomicUsize,
}

impl MockGitLab {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(mut self, users: Vec<GitLabUser>) -> Self {
        self.users = users;
        self
    }

    pub fn with_projects(mut self, projects: Vec<GitLabProject>) -> Self {
        self.projects = projects;
        self
    }

    pub fn with_tags(mut self, project_id: i64, tags: Vec<GitLabTag>) -> Self {
        self.tags.insert(project_id, tags);
        self
    }

    /// Every poll reports `status`.
    pub fn with_pipeline_status(self, status: &str) -> Self {
        self.with_pipeline_steps(vec![PipelineStep::Status(status.to_string())])
    }

    /// Poll `n` answers step `n`; the last step repeats forever.
    pub fn with_pipeline_steps(mut self, steps: Vec<PipelineStep>) -> Self {
        self.pipeline = steps;
        self
    }

    pub fn pipeline_polls(&self) -> usize {
        self.pipeline_polls.load(Ordering::SeqCst)
    }

    pub fn tag_calls(&self) -> usize {
        self.tag_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GitLabApi for MockGitLab {
    async fn list_users(&self) -> Result<Vec<GitLabUser>, AppError> {
        Ok(self.users.clone())
    }

    async fn list_projects(&self) -> Result<Vec<GitLabProject>, AppError> {
        Ok(self.projects.clone())
    }

    async fn list_tags(&self, project_id: i64) -> Result<Vec<GitLabTag>, AppError> {
        self.tag_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.tags.get(&project_id).cloned().unwrap_or_default())
    }

    async fn get_commit_pipeline_status(
        &self,
        _project_id: i64,
        _sha: &str,
    ) -> Result<Option<GitLabPipeline>, AppError> {
        let poll = self.pipeline_polls.fetch_add(1, Ordering::SeqCst);
        let step = self
            .pipeline
            .get(poll)
            .or_else(|| self.pipeline.last())
            .unwrap_or(&PipelineStep::Pending);

        match step {
            PipelineStep::Pending => Ok(None),
            PipelineStep::Status(status) => Ok(Some(GitLabPipeline {
                id: PIPELINE_ID,
                status: status.clone(),
                web_url: PIPELINE_URL.to_string(),
            })),
            PipelineStep::Error => Err(AppError::network("Request timed out")),
        }
    }
}

/// Scriptable [`ChatApi`] that records every posted message.
#[derive(Debug, Default)]
pub struct MockChat {
    users: Vec<SlackUser>,
    reply_channel: Option<String>,
    fail_with: Option<String>,
    posted: Mutex<Vec<OutgoingMessage>>,
}

impl MockChat {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(mut self, users: Vec<SlackUser>) -> Self {
        self.users = users;
        self
    }

    /// Report this channel ID for every post instead of echoing the request.
    pub fn replying_from(mut self, channel: &str) -> Self {
        self.reply_channel = Some(channel.to_string());
        self
    }

    /// Reject every post with the given Slack error code.
    pub fn failing_with(mut self, code: &str) -> Self {
        self.fail_with = Some(code.to_string());
        self
    }

    pub async fn posted(&self) -> Vec<OutgoingMessage> {
        self.posted.lock().await.clone()
    }

    pub async fn post_count(&self) -> usize {
        self.posted.lock().await.len()
    }
}

/// Timestamp Slack would assign to the `n`th message (1-based).
pub fn message_ts(n: usize) -> String {
    format!("1700000000.{:06}", n)
}

#[async_trait]
impl ChatApi for MockChat {
    async fn list_users(&self) -> Result<Vec<SlackUser>, AppError> {
        Ok(self.users.clone())
    }

    async fn post_message(&self, message: &OutgoingMessage) -> Result<PostedMessage, AppError> {
        let mut posted = self.posted.lock().await;
        posted.push(message.clone());

        if let Some(code) = &self.fail_with {
            return Err(AppError::chat_api(code, "chat.postMessage"));
        }

        Ok(PostedMessage {
            channel: self
                .reply_channel
                .clone()
                .unwrap_or_else(|| message.channel.clone()),
            ts: message_ts(posted.len()),
        })
    }
}

/// [`MemoryStore`] wrapper that counts calls and can fail chosen upserts.
#[derive(Debug, Default)]
pub struct RecordingStore {
    inner: MemoryStore,
    failing_keys: HashSet<String>,
    lookups: AtomicUsize,
    writes: AtomicUsize,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail `create_user` for these emails and `create_project` for these paths.
    pub fn failing_on<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.failing_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn lookup(&self) {
        self.lookups.fetch_add(1, Ordering::SeqCst);
    }

    fn write(&self, key: &str) -> Result<(), AppError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.failing_keys.contains(key) {
            return Err(AppError::database_with_op(
                format!("injected failure for {}", key),
                "upsert",
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Store for RecordingStore {
    async fn get_project_by_path(&self, path: &str) -> Result<Project, AppError> {
        self.lookup();
        self.inner.get_project_by_path(path).await
    }

    async fn get_project_by_id(&self, id: i64) -> Result<Project, AppError> {
        self.lookup();
        self.inner.get_project_by_id(id).await
    }

    async fn get_user_by_email(&self, email: &str) -> Result<User, AppError> {
        self.lookup();
        self.inner.get_user_by_email(email).await
    }

    async fn get_user_by_id(&self, gitlab_id: i64) -> Result<User, AppError> {
        self.lookup();
        self.inner.get_user_by_id(gitlab_id).await
    }

    async fn get_merge_request(
        &self,
        project_id: i64,
        mr_num: i64,
    ) -> Result<MergeRequestThread, AppError> {
        self.lookup();
        self.inner.get_merge_request(project_id, mr_num).await
    }

    async fn get_issue(&self, project_id: i64, issue_num: i64) -> Result<IssueThread, AppError> {
        self.lookup();
        self.inner.get_issue(project_id, issue_num).await
    }

    async fn update_user_default_channel(
        &self,
        email: &str,
        channel: &str,
    ) -> Result<(), AppError> {
        self.write(email)?;
        self.inner.update_user_default_channel(email, channel).await
    }

    async fn update_project_default_channel(
        &self,
        path: &str,
        channel: &str,
    ) -> Result<(), AppError> {
        self.write(path)?;
        self.inner.update_project_default_channel(path, channel).await
    }

    async fn update_group_default_channel(
        &self,
        prefix: &str,
        channel: &str,
    ) -> Result<u64, AppError> {
        self.write(prefix)?;
        self.inner.update_group_default_channel(prefix, channel).await
    }

    async fn create_user(&self, user: &User) -> Result<(), AppError> {
        self.write(&user.email)?;
        self.inner.create_user(user).await
    }

    async fn create_project(&self, project: &Project) -> Result<(), AppError> {
        self.write(&project.name)?;
        self.inner.create_project(project).await
    }

    async fn create_merge_request(&self, thread: &MergeRequestThread) -> Result<(), AppError> {
        self.write("")?;
        self.inner.create_merge_request(thread).await
    }

    async fn create_issue(&self, thread: &IssueThread) -> Result<(), AppError> {
        self.write("")?;
        self.inner.create_issue(thread).await
    }
}
