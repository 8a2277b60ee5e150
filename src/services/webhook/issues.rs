use super::payload::IssueEvent;
use super::{resolve_channel, WebhookHandler};
use crate::error::AppError;
use crate::models::IssueThread;
use crate::services::slack_client::{Attachment, OutgoingMessage};

impl WebhookHandler {
    pub(super) async fn on_issue(&self, event: IssueEvent) -> Result<(), AppError> {
        match event.object_attributes.action.as_str() {
            "open" | "reopen" => self.announce_issue(&event).await,
            "close" => self.close_issue(&event).await,
            other => {
                log::info!("Ignoring issue action {:?}", other);
                Ok(())
            }
        }
    }

    async fn announce_issue(&self, event: &IssueEvent) -> Result<(), AppError> {
        let attrs = &event.object_attributes;
        let author = self.store.get_user_by_id(attrs.author_id).await?;
        let channel =
            resolve_channel(self.store.as_ref(), &attrs.description, event.project.id, &author)
                .await?;

        let text = format!(
            "{} has opened <{}|{}#{}>",
            author.mention(),
            attrs.url,
            event.project.path_with_namespace,
            attrs.iid
        );
        let message = OutgoingMessage::new(&channel, text)
            .as_author(&author.name, &author.avatar_url)
            .with_attachment(Attachment::new(&attrs.title, &attrs.description));
        let posted = self.chat.post_message(&message).await?;

        let thread = IssueThread {
            project_id: event.project.id,
            issue_num: attrs.iid,
            thread_ts: posted.ts,
            channel: if posted.channel.is_empty() {
                channel
            } else {
                posted.channel
            },
        };
        self.store.create_issue(&thread).await
    }

    async fn close_issue(&self, event: &IssueEvent) -> Result<(), AppError> {
        let thread = self
            .store
            .get_issue(event.project.id, event.object_attributes.iid)
            .await?;

        let message = OutgoingMessage::new(thread.channel, "This issue has been closed.")
            .in_thread(thread.thread_ts);
        self.chat.post_message(&message).await?;
        Ok(())
    }
}
