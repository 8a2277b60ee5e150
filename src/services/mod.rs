//! Business logic services.
//!
//! This module contains the platform adapters for GitLab and Slack, the
//! webhook event engine, reconciliation sync and the HTTP surface.
//!
//! Services depend on the `Store`, `GitLabApi` and `ChatApi` traits rather than
//! concrete clients so they can be tested against in-memory doubles.

pub mod api;
pub mod gitlab_client;
pub mod http;
pub mod server;
pub mod slack_client;
pub mod sync_engine;
pub mod webhook;

pub use gitlab_client::{GitLabApi, GitLabClient};
pub use slack_client::{ChatApi, SlackClient};
pub use sync_engine::SyncEngine;
pub use webhook::WebhookHandler;
