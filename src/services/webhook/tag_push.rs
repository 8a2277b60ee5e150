use super::payload::TagPushEvent;
use super::{resolve_channel, WebhookHandler};
use crate::error::AppError;
use crate::services::slack_client::OutgoingMessage;

impl WebhookHandler {
    pub(super) async fn on_tag_push(&self, event: TagPushEvent) -> Result<(), AppError> {
        if event.checkout_sha.is_empty() {
            log::info!(
                "Ignoring tag deletion on {}",
                event.project.path_with_namespace
            );
            return Ok(());
        }

        let author = self.store.get_user_by_id(event.user_id).await?;
        let channel =
            resolve_channel(self.store.as_ref(), &event.message, event.project.id, &author).await?;

        // GitLab lists the most recent tag first.
        let tags = self.gitlab.list_tags(event.project.id).await?;
        let tag = tags.first().ok_or_else(|| {
            AppError::not_found_with_id("Tag", event.project.path_with_namespace.clone())
        })?;

        let text = format!(
            "{} has pushed a new tag: <{}/tags/{}|{}> to `{}`!\n{}\n",
            author.mention(),
            event.project.web_url,
            tag.name,
            tag.name,
            event.project.path_with_namespace,
            tag.release_note()
        );
        self.chat
            .post_message(&OutgoingMessage::new(channel, text))
            .await?;
        Ok(())
    }
}
