use super::payload::CommentEvent;
use super::WebhookHandler;
use crate::error::AppError;
use crate::services::slack_client::OutgoingMessage;

impl WebhookHandler {
    pub(super) async fn on_comment(&self, event: CommentEvent) -> Result<(), AppError> {
        let project_id = event.project.id;
        let attrs = &event.object_attributes;

        let (author, channel, thread_ts) = match attrs.noteable_type.as_str() {
            "Issue" => {
                let author = self.store.get_user_by_id(attrs.author_id).await?;
                let thread = self.store.get_issue(project_id, event.issue.iid).await?;
                (author, thread.channel, thread.thread_ts)
            }
            "MergeRequest" => {
                let author = self.store.get_user_by_id(attrs.author_id).await?;
                let thread = self
                    .store
                    .get_merge_request(project_id, event.merge_request.iid)
                    .await?;
                (author, thread.channel, thread.thread_ts)
            }
            other => {
                log::info!("Ignoring comment on unsupported type {:?}", other);
                return Ok(());
            }
        };

        let text = format!("{} has <{}|commented:>\n{}", author.name, attrs.url, attrs.note);
        let message = OutgoingMessage::new(channel, text)
            .as_author(&author.name, &author.avatar_url)
            .in_thread(thread_ts);
        self.chat.post_message(&message).await?;
        Ok(())
    }
}
