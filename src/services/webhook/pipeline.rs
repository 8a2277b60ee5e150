//! Pipeline tracker.
//!
//! After a merge request is announced, the tracker polls the head commit's
//! pipeline until it settles and replies into the merge request thread when
//! it failed. Success, a timeout or any lookup failure ends tracking quietly.

use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;

use crate::db::Store;
use crate::error::AppError;
use crate::services::gitlab_client::{GitLabApi, GitLabPipeline};
use crate::services::slack_client::{ChatApi, OutgoingMessage};

/// Maximum number of status polls per commit.
pub const MAX_ATTEMPTS: u32 = 120;

/// Delay between two polls.
pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Injectable delay between polls.
pub type Sleeper = Arc<dyn Fn(Duration) -> BoxFuture<'static, ()> + Send + Sync>;

/// Sleeps on the tokio timer.
pub fn tokio_sleeper() -> Sleeper {
    Arc::new(|delay| Box::pin(tokio::time::sleep(delay)))
}

/// Returns immediately; lets tests run the full poll budget instantly.
pub fn instant_sleeper() -> Sleeper {
    Arc::new(|_| Box::pin(futures::future::ready(())))
}

/// The commit being watched and the merge request it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedCommit {
    pub project_id: i64,
    pub mr_num: i64,
    pub sha: String,
}

/// How a tracking run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerOutcome {
    Succeeded { attempts: u32 },
    Failed { attempts: u32, alerted: bool },
    GaveUp { attempts: u32 },
}

/// Polls commit pipelines and alerts on failure.
#[derive(Clone)]
pub struct PipelineTracker {
    store: Arc<dyn Store>,
    gitlab: Arc<dyn GitLabApi>,
    chat: Arc<dyn ChatApi>,
    sleeper: Sleeper,
    max_attempts: u32,
    interval: Duration,
}

impl PipelineTracker {
    pub fn new(
        store: Arc<dyn Store>,
        gitlab: Arc<dyn GitLabApi>,
        chat: Arc<dyn ChatApi>,
        sleeper: Sleeper,
    ) -> Self {
        Self {
            store,
            gitlab,
            chat,
            sleeper,
            max_attempts: MAX_ATTEMPTS,
            interval: POLL_INTERVAL,
        }
    }

    /// Poll until the pipeline succeeds, fails or the attempt budget runs out.
    pub async fn run(&self, commit: TrackedCommit) -> TrackerOutcome {
        for attempt in 1..=self.max_attempts {
            match self
                .gitlab
                .get_commit_pipeline_status(commit.project_id, &commit.sha)
                .await
            {
                Ok(Some(pipeline)) if pipeline.is_success() => {
                    log::debug!("Pipeline {} for {} succeeded", pipeline.id, commit.sha);
                    return TrackerOutcome::Succeeded { attempts: attempt };
                }
                Ok(Some(pipeline)) if pipeline.is_failed() => {
                    let alerted = match self.alert(&commit, &pipeline).await {
                        Ok(()) => true,
                        Err(err) if err.is_not_found() => {
                            log::debug!("No thread for failed pipeline {}: {}", pipeline.id, err);
                            false
                        }
                        Err(err) => {
                            log::error!("Failed to alert on pipeline {}: {}", pipeline.id, err);
                            false
                        }
                    };
                    return TrackerOutcome::Failed {
                        attempts: attempt,
                        alerted,
                    };
                }
                Ok(_) => {}
                Err(err) => {
                    log::warn!(
                        "Pipeline poll {}/{} for {} failed: {}",
                        attempt,
                        self.max_attempts,
                        commit.sha,
                        err
                    );
                }
            }

            if attempt < self.max_attempts {
                (self.sleeper)(self.interval).await;
            }
        }

        log::info!(
            "Gave up on pipeline for {} after {} polls",
            commit.sha,
            self.max_attempts
        );
        TrackerOutcome::GaveUp {
            attempts: self.max_attempts,
        }
    }

    async fn alert(&self, commit: &TrackedCommit, pipeline: &GitLabPipeline) -> Result<(), AppError> {
        let thread = self
            .store
            .get_merge_request(commit.project_id, commit.mr_num)
            .await?;

        let text = format!("Pipeline <{}|#{}> failed!", pipeline.web_url, pipeline.id);
        let message = OutgoingMessage::new(thread.channel, text).in_thread(thread.thread_ts);
        self.chat.post_message(&message).await?;
        Ok(())
    }
}
