use super::payload::MergeRequestEvent;
use super::{resolve_channel, TrackedCommit, WebhookHandler};
use crate::error::AppError;
use crate::models::MergeRequestThread;
use crate::services::slack_client::OutgoingMessage;

impl WebhookHandler {
    pub(super) async fn on_merge_request(&self, event: MergeRequestEvent) -> Result<(), AppError> {
        match event.object_attributes.action.as_str() {
            "open" | "reopen" => self.announce_merge_request(&event).await,
            "merge" | "close" => self.close_merge_request(&event).await,
            other => {
                log::info!("Ignoring merge request action {:?}", other);
                Ok(())
            }
        }
    }

    async fn announce_merge_request(&self, event: &MergeRequestEvent) -> Result<(), AppError> {
        let attrs = &event.object_attributes;
        if attrs.author_id == attrs.assignee_id {
            log::info!(
                "Skipping {}!{}: author reviews their own merge request",
                event.project.path_with_namespace,
                attrs.iid
            );
            return Ok(());
        }

        let author = self.store.get_user_by_id(attrs.author_id).await?;
        let assignee = self.store.get_user_by_id(attrs.assignee_id).await?;
        let channel =
            resolve_channel(self.store.as_ref(), &attrs.description, event.project.id, &assignee)
                .await?;

        let text = format!(
            "{} you are assigned to review <{}|{}!{}> by {}\n\
             Title: {}\n\
             Action: request to merge `{}` into `{}`\n",
            assignee.mention(),
            attrs.url,
            event.project.path_with_namespace,
            attrs.iid,
            author.mention(),
            attrs.title,
            attrs.source_branch,
            attrs.target_branch
        );
        let posted = self
            .chat
            .post_message(&OutgoingMessage::new(&channel, text))
            .await?;

        let thread = MergeRequestThread {
            project_id: event.project.id,
            mr_num: attrs.iid,
            thread_ts: posted.ts,
            channel: if posted.channel.is_empty() {
                channel
            } else {
                posted.channel
            },
        };
        self.store.create_merge_request(&thread).await?;

        match attrs.last_commit_sha() {
            Some(sha) => self.spawn_tracker(TrackedCommit {
                project_id: event.project.id,
                mr_num: attrs.iid,
                sha: sha.to_string(),
            }),
            None => log::debug!(
                "No head commit on {}!{}; pipeline not tracked",
                event.project.path_with_namespace,
                attrs.iid
            ),
        }
        Ok(())
    }

    async fn close_merge_request(&self, event: &MergeRequestEvent) -> Result<(), AppError> {
        let attrs = &event.object_attributes;
        let thread = self
            .store
            .get_merge_request(event.project.id, attrs.iid)
            .await?;

        let text = if attrs.action == "merge" {
            "This merge request has been merged."
        } else {
            "This merge request has been closed."
        };
        let message = OutgoingMessage::new(thread.channel, text).in_thread(thread.thread_ts);
        self.chat.post_message(&message).await?;
        Ok(())
    }
}
