//! Pipeline tracker tests.
//!
//! The tracker polls a commit's pipeline at most 120 times and alerts only on
//! failure. A sleeper that returns immediately keeps the full poll budget
//! instant; a counting sleeper checks how often the tracker waited.

use futures::future::BoxFuture;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use gitlack::db::Store;
use gitlack::models::{MergeRequestThread, Project, User};
use gitlack::services::webhook::{
    instant_sleeper, PipelineTracker, Sleeper, TrackedCommit, TrackerOutcome, WebhookHandler,
};
use gitlack::testing::{
    message_ts, MockChat, MockGitLab, PipelineStep, RecordingStore, PIPELINE_ID, PIPELINE_URL,
};

const PROJECT_ID: i64 = 10;
const MR_NUM: i64 = 3;

fn commit() -> TrackedCommit {
    TrackedCommit {
        project_id: PROJECT_ID,
        mr_num: MR_NUM,
        sha: "da1560886d4f094c3e6c9ef40349f7d38b5d27d7".to_string(),
    }
}

async fn store_with_thread() -> Arc<RecordingStore> {
    let store = Arc::new(RecordingStore::new());
    store
        .inner()
        .create_merge_request(&MergeRequestThread {
            project_id: PROJECT_ID,
            mr_num: MR_NUM,
            thread_ts: "1699999999.000001".to_string(),
            channel: "C0REVIEW".to_string(),
        })
        .await
        .unwrap();
    store
}

/// Sleeper that records every requested delay and returns immediately.
fn counting_sleeper(count: Arc<AtomicUsize>) -> Sleeper {
    Arc::new(move |delay: Duration| -> BoxFuture<'static, ()> {
        assert_eq!(delay, Duration::from_secs(5));
        count.fetch_add(1, Ordering::SeqCst);
        Box::pin(async {})
    })
}

#[tokio::test]
async fn test_running_forever_gives_up_after_120_polls() {
    let store = store_with_thread().await;
    let gitlab = Arc::new(MockGitLab::new().with_pipeline_status("running"));
    let chat = Arc::new(MockChat::new());
    let sleeps = Arc::new(AtomicUsize::new(0));

    let tracker = PipelineTracker::new(
        store,
        gitlab.clone(),
        chat.clone(),
        counting_sleeper(sleeps.clone()),
    );
    let outcome = tracker.run(commit()).await;

    assert_eq!(outcome, TrackerOutcome::GaveUp { attempts: 120 });
    assert_eq!(gitlab.pipeline_polls(), 120);
    assert_eq!(sleeps.load(Ordering::SeqCst), 119);
    assert_eq!(chat.post_count().await, 0);
}

#[tokio::test]
async fn test_failed_pipeline_alerts_in_thread() {
    let store = store_with_thread().await;
    let gitlab = Arc::new(MockGitLab::new().with_pipeline_status("failed"));
    let chat = Arc::new(MockChat::new());

    let tracker = PipelineTracker::new(store, gitlab.clone(), chat.clone(), instant_sleeper());
    let outcome = tracker.run(commit()).await;

    assert_eq!(
        outcome,
        TrackerOutcome::Failed {
            attempts: 1,
            alerted: true
        }
    );
    assert_eq!(gitlab.pipeline_polls(), 1);

    let posted = chat.posted().await;
    assert_eq!(posted.len(), 1);
    assert_eq!(
        posted[0].text,
        format!("Pipeline <{}|#{}> failed!", PIPELINE_URL, PIPELINE_ID)
    );
    assert_eq!(posted[0].channel, "C0REVIEW");
    assert_eq!(posted[0].thread_ts.as_deref(), Some("1699999999.000001"));
    assert!(posted[0].author.is_none());
    assert!(posted[0].attachment.is_none());
}

#[tokio::test]
async fn test_successful_pipeline_posts_nothing() {
    let store = store_with_thread().await;
    let gitlab = Arc::new(MockGitLab::new().with_pipeline_status("success"));
    let chat = Arc::new(MockChat::new());

    let tracker = PipelineTracker::new(store, gitlab.clone(), chat.clone(), instant_sleeper());
    let outcome = tracker.run(commit()).await;

    assert_eq!(outcome, TrackerOutcome::Succeeded { attempts: 1 });
    assert_eq!(gitlab.pipeline_polls(), 1);
    assert_eq!(chat.post_count().await, 0);
}

#[tokio::test]
async fn test_failure_without_thread_is_silent() {
    let store = Arc::new(RecordingStore::new());
    let gitlab = Arc::new(MockGitLab::new().with_pipeline_status("failed"));
    let chat = Arc::new(MockChat::new());

    let tracker = PipelineTracker::new(store, gitlab, chat.clone(), instant_sleeper());
    let outcome = tracker.run(commit()).await;

    assert_eq!(
        outcome,
        TrackerOutcome::Failed {
            attempts: 1,
            alerted: false
        }
    );
    assert_eq!(chat.post_count().await, 0);
}

#[tokio::test]
async fn test_poll_errors_and_pending_count_as_attempts() {
    let store = store_with_thread().await;
    let gitlab = Arc::new(MockGitLab::new().with_pipeline_steps(vec![
        PipelineStep::Pending,
        PipelineStep::Error,
        PipelineStep::Status("pending".to_string()),
        PipelineStep::Status("running".to_string()),
        PipelineStep::Status("failed".to_string()),
    ]));
    let chat = Arc::new(MockChat::new());

    let tracker = PipelineTracker::new(store, gitlab.clone(), chat.clone(), instant_sleeper());
    let outcome = tracker.run(commit()).await;

    assert_eq!(
        outcome,
        TrackerOutcome::Failed {
            attempts: 5,
            alerted: true
        }
    );
    assert_eq!(gitlab.pipeline_polls(), 5);
    assert_eq!(chat.post_count().await, 1);
}

#[tokio::test]
async fn test_merge_request_open_spawns_tracker() {
    let store = Arc::new(RecordingStore::new());
    store
        .inner()
        .put_project(Project::new(PROJECT_ID, "grp/repo"))
        .await;
    for (id, slack_id) in [(1, "UAUTHOR"), (2, "UREVIEW")] {
        store
            .inner()
            .put_user(User {
                email: slack_id.to_lowercase(),
                slack_id: slack_id.to_string(),
                gitlab_id: id,
                name: slack_id.to_string(),
                ..Default::default()
            })
            .await;
    }

    let gitlab = Arc::new(MockGitLab::new().with_pipeline_steps(vec![
        PipelineStep::Status("running".to_string()),
        PipelineStep::Status("failed".to_string()),
    ]));
    let chat = Arc::new(MockChat::new());
    let handler =
        WebhookHandler::with_sleeper(store, gitlab.clone(), chat.clone(), instant_sleeper());

    let payload = json!({
        "object_attributes": {
            "action": "open",
            "iid": MR_NUM,
            "author_id": 1,
            "assignee_id": 2,
            "last_commit": {"id": "da1560886d4f094c3e6c9ef40349f7d38b5d27d7"}
        },
        "project": {"id": PROJECT_ID, "path_with_namespace": "grp/repo"}
    });
    handler
        .handle_event("Merge Request Hook", &serde_json::to_vec(&payload).unwrap())
        .await;

    handler.background_tasks().close();
    handler.background_tasks().wait().await;

    assert_eq!(gitlab.pipeline_polls(), 2);
    let posted = chat.posted().await;
    assert_eq!(posted.len(), 2);
    assert_eq!(posted[1].channel, "general");
    assert_eq!(posted[1].thread_ts.as_deref(), Some(message_ts(1).as_str()));
    assert!(posted[1].text.ends_with("failed!"));
}
