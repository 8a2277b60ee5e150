//! Webhook event engine.
//!
//! Turns GitLab webhook deliveries into Slack notifications. Every delivery is
//! best effort: a missing user, project or thread, or a failing upstream call,
//! abandons that one event and is only logged.

mod channel;
mod comments;
mod issues;
mod merge_request;
pub mod payload;
pub mod pipeline;
mod tag_push;

pub use channel::{parse_directive, resolve_channel, FALLBACK_CHANNEL};
pub use pipeline::{
    instant_sleeper, tokio_sleeper, PipelineTracker, Sleeper, TrackedCommit, TrackerOutcome,
};

use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;
use tokio_util::task::TaskTracker;

use crate::db::Store;
use crate::error::AppError;
use crate::services::gitlab_client::GitLabApi;
use crate::services::slack_client::ChatApi;

/// Webhook kinds the relay understands, keyed by `X-Gitlab-Event`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    MergeRequest,
    Issue,
    Note,
    TagPush,
}

impl EventKind {
    pub fn from_header(value: &str) -> Option<Self> {
        match value {
            "Merge Request Hook" => Some(Self::MergeRequest),
            "Issue Hook" => Some(Self::Issue),
            "Note Hook" => Some(Self::Note),
            "Tag Push Hook" => Some(Self::TagPush),
            _ => None,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::MergeRequest => "merge request",
            Self::Issue => "issue",
            Self::Note => "comment",
            Self::TagPush => "tag push",
        };
        f.write_str(name)
    }
}

/// Dispatches webhook deliveries and owns detached pipeline trackers.
#[derive(Clone)]
pub struct WebhookHandler {
    store: Arc<dyn Store>,
    gitlab: Arc<dyn GitLabApi>,
    chat: Arc<dyn ChatApi>,
    tracker: PipelineTracker,
    tasks: TaskTracker,
}

impl WebhookHandler {
    pub fn new(store: Arc<dyn Store>, gitlab: Arc<dyn GitLabApi>, chat: Arc<dyn ChatApi>) -> Self {
        Self::with_sleeper(store, gitlab, chat, tokio_sleeper())
    }

    /// Same as [`WebhookHandler::new`] with a custom delay between pipeline polls.
    pub fn with_sleeper(
        store: Arc<dyn Store>,
        gitlab: Arc<dyn GitLabApi>,
        chat: Arc<dyn ChatApi>,
        sleeper: Sleeper,
    ) -> Self {
        let tracker = PipelineTracker::new(store.clone(), gitlab.clone(), chat.clone(), sleeper);
        Self {
            store,
            gitlab,
            chat,
            tracker,
            tasks: TaskTracker::new(),
        }
    }

    /// Detached pipeline trackers. Only tests wait on these.
    pub fn background_tasks(&self) -> &TaskTracker {
        &self.tasks
    }

    /// Handle one delivery. Never fails; outcomes are logged.
    pub async fn handle_event(&self, event_header: &str, payload: &[u8]) {
        let Some(kind) = EventKind::from_header(event_header) else {
            log::info!("Ignoring unsupported event {:?}", event_header);
            return;
        };

        match self.dispatch(kind, payload).await {
            Ok(()) => {}
            Err(err) if err.is_not_found() => {
                log::debug!("Abandoned {} event: {}", kind, err);
            }
            Err(err @ AppError::InvalidInput { .. }) => {
                log::warn!("Dropped {} event: {}", kind, err);
            }
            Err(err) if err.is_unauthorized() => {
                log::error!("Credentials rejected while handling {} event: {}", kind, err);
            }
            Err(err) => {
                log::error!("Failed to handle {} event: {}", kind, err);
            }
        }
    }

    async fn dispatch(&self, kind: EventKind, payload: &[u8]) -> Result<(), AppError> {
        match kind {
            EventKind::MergeRequest => self.on_merge_request(parse(kind, payload)?).await,
            EventKind::Issue => self.on_issue(parse(kind, payload)?).await,
            EventKind::Note => self.on_comment(parse(kind, payload)?).await,
            EventKind::TagPush => self.on_tag_push(parse(kind, payload)?).await,
        }
    }

    /// Start tracking a commit's pipeline without waiting for it.
    fn spawn_tracker(&self, commit: TrackedCommit) {
        let tracker = self.tracker.clone();
        self.tasks.spawn(async move {
            let outcome = tracker.run(commit).await;
            log::debug!("Pipeline tracking finished: {:?}", outcome);
        });
    }
}

fn parse<T: DeserializeOwned>(kind: EventKind, payload: &[u8]) -> Result<T, AppError> {
    serde_json::from_slice(payload).map_err(|e| {
        AppError::invalid_input_field(format!("Malformed {} payload: {}", kind, e), "payload")
    })
}
