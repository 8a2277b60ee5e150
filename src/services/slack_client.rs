//! Slack Web API client.
//!
//! Lists workspace members for reconciliation and posts notifications,
//! optionally as a threaded reply and optionally under another user's name
//! and avatar.

use async_trait::async_trait;
use reqwest::Response;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::services::http::RemoteClient;

/// Member listing stops after this many cursor pages.
pub const MAX_PAGES: u32 = 100;

/// Left-edge color of every attachment.
pub const ATTACHMENT_COLOR: &str = "#FF5511";

/// Slack client configuration.
#[derive(Clone)]
pub struct SlackClientConfig {
    /// Base URL of the Slack host (e.g., `https://slack.com`).
    pub base_url: String,

    /// Bot token.
    pub token: String,

    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl std::fmt::Debug for SlackClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackClientConfig")
            .field("base_url", &self.base_url)
            .field("token", &"[REDACTED]")
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Workspace member, bots and deactivated accounts excluded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlackUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub avatar_url: String,
}

/// Single message attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub color: String,
    pub title: String,
    pub text: String,
}

impl Attachment {
    pub fn new(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            color: ATTACHMENT_COLOR.to_string(),
            title: title.into(),
            text: text.into(),
        }
    }
}

/// Name and avatar a message is posted under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorOverride {
    pub username: String,
    pub icon_url: String,
}

/// A message to post with `chat.postMessage`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub channel: String,
    pub text: String,
    pub author: Option<AuthorOverride>,
    pub attachment: Option<Attachment>,
    pub thread_ts: Option<String>,
}

impl OutgoingMessage {
    pub fn new(channel: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            text: text.into(),
            author: None,
            attachment: None,
            thread_ts: None,
        }
    }

    /// Post under the given display name and avatar.
    pub fn as_author(mut self, username: impl Into<String>, icon_url: impl Into<String>) -> Self {
        self.author = Some(AuthorOverride {
            username: username.into(),
            icon_url: icon_url.into(),
        });
        self
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachment = Some(attachment);
        self
    }

    /// Reply inside the thread started by `ts`.
    pub fn in_thread(mut self, ts: impl Into<String>) -> Self {
        self.thread_ts = Some(ts.into());
        self
    }

    /// Form fields for `chat.postMessage`.
    fn form_fields(&self) -> Result<Vec<(&'static str, String)>, AppError> {
        let mut fields = vec![
            ("channel", self.channel.clone()),
            ("text", self.text.clone()),
        ];
        if let Some(ts) = &self.thread_ts {
            fields.push(("thread_ts", ts.clone()));
        }
        if let Some(author) = &self.author {
            fields.push(("username", author.username.clone()));
            fields.push(("icon_url", author.icon_url.clone()));
        }
        if let Some(attachment) = &self.attachment {
            // Slack expects an array even for a single attachment
            fields.push(("attachments", serde_json::to_string(&[attachment])?));
        }
        Ok(fields)
    }
}

/// Where a posted message landed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostedMessage {
    pub channel: String,
    pub ts: String,
}

/// The Slack operations the relay depends on.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// All human, active workspace members.
    async fn list_users(&self) -> Result<Vec<SlackUser>, AppError>;

    /// Post a message and return its channel and timestamp.
    async fn post_message(&self, message: &OutgoingMessage) -> Result<PostedMessage, AppError>;
}

#[derive(Debug, Default, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(flatten)]
    body: T,
}

#[derive(Debug, Default, Deserialize)]
struct Profile {
    #[serde(default)]
    email: String,
    #[serde(default)]
    image_192: String,
}

#[derive(Debug, Deserialize)]
struct Member {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    is_bot: bool,
    #[serde(default)]
    deleted: bool,
    #[serde(default)]
    profile: Profile,
}

#[derive(Debug, Default, Deserialize)]
struct ResponseMetadata {
    #[serde(default)]
    next_cursor: String,
}

#[derive(Debug, Default, Deserialize)]
struct UsersPage {
    #[serde(default)]
    members: Vec<Member>,
    #[serde(default)]
    response_metadata: ResponseMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct PostResult {
    #[serde(default)]
    channel: String,
    #[serde(default)]
    ts: String,
}

/// Slack Web API client.
#[derive(Debug, Clone)]
pub struct SlackClient {
    http: RemoteClient,
}

impl SlackClient {
    /// Create a new Slack client.
    pub fn new(config: SlackClientConfig) -> Result<Self, AppError> {
        let api_base = format!("{}/api", config.base_url.trim_end_matches('/'));
        let http = RemoteClient::new(
            &api_base,
            "authorization",
            &format!("Bearer {}", config.token),
            config.timeout_secs,
        )?;
        Ok(Self { http })
    }

    /// Unwrap a Web API response.
    ///
    /// Slack answers 200 with `ok: false` when it rejects a call; that is a
    /// [`AppError::ChatApi`]. Non-2xx statuses are transport failures.
    async fn handle_response<T: DeserializeOwned + Default>(
        response: Response,
        method: &str,
    ) -> Result<T, AppError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::network(format!(
                "Slack {} returned {}: {}",
                method,
                status.as_u16(),
                body
            )));
        }

        let envelope: Envelope<T> = response.json().await?;
        if !envelope.ok {
            let code = envelope.error.unwrap_or_else(|| "unknown_error".to_string());
            return Err(AppError::chat_api(code, method));
        }
        Ok(envelope.body)
    }
}

#[async_trait]
impl ChatApi for SlackClient {
    async fn list_users(&self) -> Result<Vec<SlackUser>, AppError> {
        let mut users = Vec::new();
        let mut cursor = String::new();

        for _ in 0..MAX_PAGES {
            let mut params = vec![("limit", "100")];
            if !cursor.is_empty() {
                params.push(("cursor", cursor.as_str()));
            }

            let response = self.http.get("/users.list", &params).await?;
            let page: UsersPage = Self::handle_response(response, "users.list").await?;

            users.extend(
                page.members
                    .into_iter()
                    .filter(|m| !m.is_bot && !m.deleted)
                    .map(|m| SlackUser {
                        id: m.id,
                        name: m.name,
                        email: m.profile.email,
                        avatar_url: m.profile.image_192,
                    }),
            );

            if page.response_metadata.next_cursor.is_empty() {
                return Ok(users);
            }
            cursor = page.response_metadata.next_cursor;
        }

        log::warn!("Slack kept paginating users.list past {} pages; stopping", MAX_PAGES);
        Ok(users)
    }

    async fn post_message(&self, message: &OutgoingMessage) -> Result<PostedMessage, AppError> {
        let form = message.form_fields()?;
        let response = self.http.post_form("/chat.postMessage", &form).await?;
        let posted: PostResult = Self::handle_response(response, "chat.postMessage").await?;

        log::debug!("Posted message {} to {}", posted.ts, posted.channel);
        Ok(PostedMessage {
            channel: posted.channel,
            ts: posted.ts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> SlackClient {
        SlackClient::new(SlackClientConfig {
            base_url: server.uri(),
            token: "xoxb-test".to_string(),
            timeout_secs: 5,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_list_users_skips_bots_and_follows_cursor() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/users.list"))
            .and(header("authorization", "Bearer xoxb-test"))
            .and(query_param("cursor", "page2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "members": [
                    {"id": "U3", "name": "carol", "profile": {"email": "carol@x.io", "image_192": "https://img/3"}}
                ],
                "response_metadata": {"next_cursor": ""}
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/api/users.list"))
            .and(query_param("limit", "100"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "members": [
                    {"id": "U1", "name": "alice", "profile": {"email": "alice@x.io", "image_192": "https://img/1"}},
                    {"id": "B1", "name": "bot", "is_bot": true, "profile": {}},
                    {"id": "U2", "name": "gone", "deleted": true, "profile": {"email": "gone@x.io"}}
                ],
                "response_metadata": {"next_cursor": "page2"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let users = client_for(&server).list_users().await.unwrap();
        let ids: Vec<&str> = users.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(ids, vec!["U1", "U3"]);
        assert_eq!(users[0].email, "alice@x.io");
        assert_eq!(users[1].avatar_url, "https://img/3");
    }

    #[tokio::test]
    async fn test_post_message_sends_form_fields() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/chat.postMessage"))
            .and(body_string_contains("channel=general"))
            .and(body_string_contains("thread_ts=1700000000.000100"))
            .and(body_string_contains("username=alice"))
            .and(body_string_contains("attachments="))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "channel": "C123",
                "ts": "1700000001.000200"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let message = OutgoingMessage::new("general", "hello")
            .as_author("alice", "https://img/1")
            .with_attachment(Attachment::new("Title", "Body"))
            .in_thread("1700000000.000100");

        let posted = client_for(&server).post_message(&message).await.unwrap();
        assert_eq!(posted.channel, "C123");
        assert_eq!(posted.ts, "1700000001.000200");
    }

    #[tokio::test]
    async fn test_rejected_call_is_chat_api_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/chat.postMessage"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"ok": false, "error": "invalid_auth"})),
            )
            .mount(&server)
            .await;

        let err = client_for(&server)
            .post_message(&OutgoingMessage::new("general", "hi"))
            .await
            .unwrap_err();
        assert!(err.is_unauthorized());
        assert!(matches!(err, AppError::ChatApi { ref code, .. } if code == "invalid_auth"));
    }

    #[tokio::test]
    async fn test_server_error_is_network_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/users.list"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .mount(&server)
            .await;

        let err = client_for(&server).list_users().await.unwrap_err();
        assert!(matches!(err, AppError::Network { .. }));
    }

    #[test]
    fn test_attachment_serializes_as_array() {
        let message = OutgoingMessage::new("C1", "t").with_attachment(Attachment::new("a", "b"));
        let fields = message.form_fields().unwrap();
        let (_, attachments) = fields.iter().find(|(k, _)| *k == "attachments").unwrap();
        assert_eq!(
            attachments,
            r##"[{"color":"#FF5511","title":"a","text":"b"}]"##
        );
        assert!(fields.iter().all(|(k, _)| *k != "thread_ts"));
    }
}
