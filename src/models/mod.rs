//! Data models for the application.
//!
//! These models represent the rows stored in the local SQLite database.
//! All models derive Serialize for the admin API and FromRow for SQLx queries.

pub mod issue;
pub mod merge_request;
pub mod project;
pub mod user;

// Re-exports for convenient access
pub use issue::IssueThread;
pub use merge_request::MergeRequestThread;
pub use project::Project;
pub use user::User;
