//! GitLab API client.
//!
//! Provides the GitLab API v4 calls the relay needs: user and project listings
//! for reconciliation, tag listings for tag-push announcements and commit
//! pipeline status for the pipeline tracker.

use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::services::http::RemoteClient;

/// Listing loops stop after this many pages even if GitLab keeps returning
/// a next page.
pub const MAX_PAGES: u32 = 100;

/// GitLab API client configuration.
#[derive(Clone)]
pub struct GitLabClientConfig {
    /// Base URL of the GitLab instance (e.g., `https://gitlab.com`).
    pub base_url: String,

    /// Personal access token for authentication.
    pub token: String,

    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl std::fmt::Debug for GitLabClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitLabClientConfig")
            .field("base_url", &self.base_url)
            .field("token", &"[REDACTED]")
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Default for GitLabClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://gitlab.com".to_string(),
            token: String::new(),
            timeout_secs: 30,
        }
    }
}

/// GitLab user as returned by `GET /users`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitLabUser {
    pub id: i64,

    /// Only visible to admin tokens; empty otherwise.
    #[serde(default)]
    pub email: String,

    pub name: String,
}

/// GitLab project as returned by `GET /projects?simple=true`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitLabProject {
    pub id: i64,
    pub path_with_namespace: String,
}

/// Release attached to a tag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitLabRelease {
    #[serde(default)]
    pub description: Option<String>,
}

/// Repository tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitLabTag {
    pub name: String,

    #[serde(default)]
    pub release: Option<GitLabRelease>,
}

impl GitLabTag {
    /// Release note text, empty when the tag has no release.
    pub fn release_note(&self) -> &str {
        self.release
            .as_ref()
            .and_then(|r| r.description.as_deref())
            .unwrap_or_default()
    }
}

/// Pipeline summary attached to a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitLabPipeline {
    pub id: i64,
    pub status: String,
    #[serde(default)]
    pub web_url: String,
}

impl GitLabPipeline {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }

    pub fn is_failed(&self) -> bool {
        self.status == "failed"
    }
}

/// Single commit with its latest pipeline.
#[derive(Debug, Clone, Deserialize)]
struct GitLabCommit {
    #[serde(default)]
    last_pipeline: Option<GitLabPipeline>,
}

/// The GitLab operations the relay depends on.
#[async_trait]
pub trait GitLabApi: Send + Sync {
    /// All active users.
    async fn list_users(&self) -> Result<Vec<GitLabUser>, AppError>;

    /// All non-archived projects.
    async fn list_projects(&self) -> Result<Vec<GitLabProject>, AppError>;

    /// Tags of a project, most recent first.
    async fn list_tags(&self, project_id: i64) -> Result<Vec<GitLabTag>, AppError>;

    /// Latest pipeline of a commit; `None` until a pipeline exists.
    async fn get_commit_pipeline_status(
        &self,
        project_id: i64,
        sha: &str,
    ) -> Result<Option<GitLabPipeline>, AppError>;
}

/// GitLab API client.
#[derive(Debug, Clone)]
pub struct GitLabClient {
    http: RemoteClient,
}

impl GitLabClient {
    /// Create a new GitLab client.
    pub fn new(config: GitLabClientConfig) -> Result<Self, AppError> {
        let api_base = format!("{}/api/v4", config.base_url.trim_end_matches('/'));
        let http = RemoteClient::new(
            &api_base,
            "private-token",
            &config.token,
            config.timeout_secs,
        )?;
        Ok(Self { http })
    }

    /// Read the `X-Next-Page` header; empty or missing means last page.
    fn next_page(response: &Response) -> Option<u32> {
        response
            .headers()
            .get("x-next-page")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse().ok())
    }

    /// Handle API response errors.
    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: Response,
        endpoint: &str,
    ) -> Result<T, AppError> {
        let status = response.status();

        if status.is_success() {
            response
                .json::<T>()
                .await
                .map_err(|e| AppError::internal(format!("Failed to parse response: {}", e)))
        } else {
            let status_code = status.as_u16();
            let body = response.text().await.unwrap_or_default();
            let body_message = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| {
                    // GitLab returns errors as {"message": "..."} or {"error": "..."}
                    v.get("message").or_else(|| v.get("error")).map(|m| match m.as_str() {
                        Some(s) => s.to_string(),
                        None => m.to_string(),
                    })
                });

            let message = match (status, &body_message) {
                (StatusCode::UNAUTHORIZED, _) => "GitLab token expired or revoked".to_string(),
                (StatusCode::FORBIDDEN, _) => "Access denied".to_string(),
                (StatusCode::NOT_FOUND, _) => "Resource not found".to_string(),
                (StatusCode::TOO_MANY_REQUESTS, _) => "Rate limit exceeded".to_string(),
                (_, Some(msg)) => msg.clone(),
                _ => format!("Request failed ({}): {}", status_code, body),
            };

            Err(AppError::gitlab_api_full(message, status_code, endpoint))
        }
    }

    /// Fetch every page of a listing endpoint, at most [`MAX_PAGES`] pages.
    async fn get_all_pages<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>, AppError> {
        let mut all_data = Vec::new();
        let mut page = 1u32;

        for _ in 0..MAX_PAGES {
            let page_str = page.to_string();
            let mut params: Vec<(&str, &str)> = query.to_vec();
            params.push(("per_page", "100"));
            params.push(("page", &page_str));

            let response = self.http.get(endpoint, &params).await?;
            let next = Self::next_page(&response);
            let data = self.handle_response::<Vec<T>>(response, endpoint).await?;
            all_data.extend(data);

            match next {
                Some(n) => page = n,
                None => return Ok(all_data),
            }
        }

        log::warn!(
            "GitLab kept paginating {} past {} pages; stopping",
            endpoint,
            MAX_PAGES
        );
        Ok(all_data)
    }
}

#[async_trait]
impl GitLabApi for GitLabClient {
    async fn list_users(&self) -> Result<Vec<GitLabUser>, AppError> {
        self.get_all_pages("/users", &[("active", "true")]).await
    }

    async fn list_projects(&self) -> Result<Vec<GitLabProject>, AppError> {
        self.get_all_pages("/projects", &[("archived", "false"), ("simple", "true")])
            .await
    }

    async fn list_tags(&self, project_id: i64) -> Result<Vec<GitLabTag>, AppError> {
        let endpoint = format!("/projects/{}/repository/tags", project_id);
        let response = self.http.get(&endpoint, &[("order_by", "updated")]).await?;
        self.handle_response(response, &endpoint).await
    }

    async fn get_commit_pipeline_status(
        &self,
        project_id: i64,
        sha: &str,
    ) -> Result<Option<GitLabPipeline>, AppError> {
        let endpoint = format!("/projects/{}/repository/commits/{}", project_id, sha);
        let no_query: [(&str, &str); 0] = [];
        let response = self.http.get(&endpoint, &no_query).await?;
        let commit: GitLabCommit = self.handle_response(response, &endpoint).await?;
        Ok(commit.last_pipeline)
    }
}
