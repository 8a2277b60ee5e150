//! HTTP routes: the GitLab webhook endpoint and the administrative API.
//!
//! Administrative responses are `{"ok": true, ...}` on success and
//! `{"ok": false, "error": "..."}` otherwise.

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::db::Store;
use crate::error::AppError;
use crate::services::sync_engine::SyncEngine;
use crate::services::webhook::WebhookHandler;

/// Header GitLab names the event kind in.
pub const EVENT_HEADER: &str = "x-gitlab-event";

/// Shared state for the axum routes.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub webhook: WebhookHandler,
    pub sync: Arc<SyncEngine>,
}

// ── Error handling ───────────────────────────────────────────────────────────

/// Wrapper to make AppError usable as an axum error response.
struct ApiErr(AppError);

impl IntoResponse for ApiErr {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            AppError::NotFound { resource, .. } => {
                (StatusCode::NOT_FOUND, format!("{} not found", resource))
            }
            AppError::InvalidInput { message, .. } => (StatusCode::BAD_REQUEST, message.clone()),
            AppError::PartialSync { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.0.to_string())
            }
            other => {
                log::error!("[api] {}", other);
                (StatusCode::INTERNAL_SERVER_ERROR, "Server error".to_string())
            }
        };
        (status, Json(json!({ "ok": false, "error": message }))).into_response()
    }
}

impl From<AppError> for ApiErr {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

type ApiResult = Result<Json<Value>, ApiErr>;

#[derive(Debug, Deserialize)]
struct ChannelQuery {
    #[serde(default)]
    default_channel: String,
}

impl ChannelQuery {
    fn require(self) -> Result<String, AppError> {
        if self.default_channel.is_empty() {
            return Err(AppError::invalid_input_field(
                format!("Invalid \"default_channel\": {:?}", self.default_channel),
                "default_channel",
            ));
        }
        Ok(self.default_channel)
    }
}

// ── Routes ───────────────────────────────────────────────────────────────────

/// Build the full router.
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/", post(webhook).layer(DefaultBodyLimit::disable()))
        .route("/api/user", post(sync_users))
        .route("/api/user/{email}", get(get_user).put(update_user))
        .route("/api/group/{*namespace}", put(update_group))
        .route("/api/project", post(sync_projects))
        .route("/api/project/{*path}", get(get_project).put(update_project))
        .with_state(state)
}

/// GitLab does not act on the response, so every delivery is acknowledged.
///
/// Issue and MR descriptions can push a payload past axum's 2 MiB default,
/// so this route has no body limit.
async fn webhook(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Json<Value> {
    let event = headers
        .get(EVENT_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    state.webhook.handle_event(event, &body).await;
    Json(json!({ "ok": true }))
}

async fn get_user(State(state): State<AppState>, Path(email): Path<String>) -> ApiResult {
    let user = state.store.get_user_by_email(&email).await?;
    Ok(Json(json!({ "ok": true, "user": user })))
}

async fn update_user(
    State(state): State<AppState>,
    Path(email): Path<String>,
    Query(query): Query<ChannelQuery>,
) -> ApiResult {
    let channel = query.require()?;
    state.store.get_user_by_email(&email).await?;
    state
        .store
        .update_user_default_channel(&email, &channel)
        .await?;

    log::info!("[api] User {} now defaults to {}", email, channel);
    Ok(Json(json!({
        "ok": true,
        "message": format!("User: {} updated", email),
    })))
}

async fn sync_users(State(state): State<AppState>) -> ApiResult {
    state.sync.sync_users().await?;
    Ok(Json(json!({
        "ok": true,
        "message": "All users are synchronized",
    })))
}

async fn update_group(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
    Query(query): Query<ChannelQuery>,
) -> ApiResult {
    let channel = query.require()?;
    let updated = state
        .store
        .update_group_default_channel(&namespace, &channel)
        .await?;

    log::info!(
        "[api] {} projects under {} now default to {}",
        updated,
        namespace,
        channel
    );
    Ok(Json(json!({
        "ok": true,
        "message": format!("Group: {} updated", namespace),
        "updated": updated,
    })))
}

async fn get_project(State(state): State<AppState>, Path(path): Path<String>) -> ApiResult {
    let project = state.store.get_project_by_path(&path).await?;
    Ok(Json(json!({ "ok": true, "project": project })))
}

async fn update_project(
    State(state): State<AppState>,
    Path(path): Path<String>,
    Query(query): Query<ChannelQuery>,
) -> ApiResult {
    let channel = query.require()?;
    state.store.get_project_by_path(&path).await?;
    state
        .store
        .update_project_default_channel(&path, &channel)
        .await?;

    log::info!("[api] Project {} now defaults to {}", path, channel);
    Ok(Json(json!({
        "ok": true,
        "message": format!("Project: {} updated", path),
    })))
}

async fn sync_projects(State(state): State<AppState>) -> ApiResult {
    state.sync.sync_projects().await?;
    Ok(Json(json!({
        "ok": true,
        "message": "All projects are synchronized",
    })))
}
