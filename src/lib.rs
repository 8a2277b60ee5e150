//! Gitlack - relays GitLab webhook events into Slack threads.
//!
//! This is the main library for the `gitlack` server: it wires the SQLite
//! store, the GitLab and Slack clients, the webhook engine and the
//! reconciliation sync behind one axum server.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
#[cfg(any(test, feature = "testing"))]
#[doc(hidden)]
pub mod testing;

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use config::Config;
use db::{SqliteStore, Store};
use error::AppError;
use services::api::AppState;
use services::{ChatApi, GitLabApi, GitLabClient, SlackClient, SyncEngine, WebhookHandler};

/// Run the server until Ctrl-C.
pub async fn run(config: Config) -> Result<(), AppError> {
    config.validate()?;
    log::debug!("Starting with {:?}", config);

    let pool = db::initialize(&config.database_path).await?;
    let store: Arc<dyn Store> = Arc::new(SqliteStore::new(pool));
    let gitlab: Arc<dyn GitLabApi> = Arc::new(GitLabClient::new(config.gitlab_config())?);
    let chat: Arc<dyn ChatApi> = Arc::new(SlackClient::new(config.slack_config())?);

    let shutdown = CancellationToken::new();
    let sync = Arc::new(SyncEngine::new(store.clone(), gitlab.clone(), chat.clone()));
    let sync_task = sync.clone().start_background(shutdown.clone());

    let state = AppState {
        store: store.clone(),
        webhook: WebhookHandler::new(store, gitlab, chat),
        sync,
    };

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => log::info!("Received Ctrl+C, shutting down"),
            Err(e) => log::error!("Failed to listen for Ctrl+C: {}", e),
        }
        signal_token.cancel();
    });

    let served = services::server::serve(config.server_addr, state, shutdown.clone()).await;
    shutdown.cancel();
    if let Err(e) = sync_task.await {
        log::warn!("Sync task ended abnormally: {}", e);
    }
    served
}
