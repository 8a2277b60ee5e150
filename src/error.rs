//! Application error types.
//!
//! One error enum is shared by the store, the platform adapters, the event
//! engine and the HTTP layer. The HTTP layer maps variants to status codes.

use thiserror::Error;

/// Application-level errors.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {message}")]
    Database {
        message: String,
        operation: Option<String>,
    },

    /// GitLab API request failed.
    #[error("GitLab API error: {message}")]
    GitLabApi {
        message: String,
        status_code: Option<u16>,
        endpoint: Option<String>,
    },

    /// Slack accepted the request but rejected the call (`ok: false`).
    #[error("Slack API error: {code}")]
    ChatApi {
        code: String,
        method: Option<String>,
    },

    /// Network request failed.
    #[error("Network error: {message}")]
    Network { message: String },

    /// Requested resource not found.
    #[error("Not found: {resource}")]
    NotFound {
        resource: String,
        id: Option<String>,
    },

    /// Invalid input provided.
    #[error("Invalid input: {message}")]
    InvalidInput {
        message: String,
        field: Option<String>,
    },

    /// Some entities of a sync run could not be persisted.
    ///
    /// The message is the JSON array of the identifiers that failed.
    #[error("{}", failed_to_json(.failed))]
    PartialSync { failed: Vec<String> },

    /// Startup configuration is missing or malformed.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Internal application error.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

fn failed_to_json(failed: &[String]) -> String {
    serde_json::to_string(failed).unwrap_or_else(|_| format!("{:?}", failed))
}

impl AppError {
    /// Create a database error with optional operation context.
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
            operation: None,
        }
    }

    /// Create a database error with operation context.
    pub fn database_with_op(message: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
            operation: Some(operation.into()),
        }
    }

    /// Create a GitLab API error with status code and endpoint.
    pub fn gitlab_api_full(
        message: impl Into<String>,
        status_code: u16,
        endpoint: impl Into<String>,
    ) -> Self {
        Self::GitLabApi {
            message: message.into(),
            status_code: Some(status_code),
            endpoint: Some(endpoint.into()),
        }
    }

    /// Create a Slack API rejection for the given Web API method.
    pub fn chat_api(code: impl Into<String>, method: impl Into<String>) -> Self {
        Self::ChatApi {
            code: code.into(),
            method: Some(method.into()),
        }
    }

    /// Create a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create a not found error with ID.
    pub fn not_found_with_id(resource: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: Some(id.into()),
        }
    }

    /// Create an invalid input error with field name.
    pub fn invalid_input_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a partial sync failure listing the identifiers that failed.
    pub fn partial_sync(failed: Vec<String>) -> Self {
        Self::PartialSync { failed }
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether this is the expected "no such row" outcome of a lookup.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Whether Slack or GitLab rejected the credentials.
    pub fn is_unauthorized(&self) -> bool {
        match self {
            Self::GitLabApi { status_code, .. } => *status_code == Some(401),
            Self::ChatApi { code, .. } => {
                matches!(code.as_str(), "invalid_auth" | "not_authed" | "account_inactive")
            }
            _ => false,
        }
    }
}

// Conversions from common error types

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::database(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::network("Request timed out")
        } else if err.is_connect() {
            Self::network("Failed to connect to server")
        } else if err.is_decode() {
            Self::internal(format!("Failed to parse response: {}", err))
        } else {
            Self::network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::internal(format!("JSON error: {}", err))
    }
}

impl From<crate::db::DbError> for AppError {
    fn from(err: crate::db::DbError) -> Self {
        Self::database(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gitlab_api_error_full() {
        let err = AppError::gitlab_api_full("Not Found", 404, "/projects/1/repository/tags");
        assert_eq!(err.to_string(), "GitLab API error: Not Found");
        match err {
            AppError::GitLabApi {
                status_code,
                endpoint,
                ..
            } => {
                assert_eq!(status_code, Some(404));
                assert_eq!(endpoint.as_deref(), Some("/projects/1/repository/tags"));
            }
            other => panic!("unexpected variant: {:?}", other),
        }
    }

    #[test]
    fn test_not_found_with_id() {
        let err = AppError::not_found_with_id("User", "42");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Not found: User");
    }

    #[test]
    fn test_partial_sync_message_is_json_array() {
        let err = AppError::partial_sync(vec!["group/a".into(), "group/b".into()]);
        assert_eq!(err.to_string(), r#"["group/a","group/b"]"#);
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_unauthorized_detection() {
        assert!(AppError::chat_api("invalid_auth", "chat.postMessage").is_unauthorized());
        assert!(!AppError::chat_api("channel_not_found", "chat.postMessage").is_unauthorized());
        assert!(AppError::gitlab_api_full("Unauthorized", 401, "/users").is_unauthorized());
        assert!(!AppError::network("connection reset").is_unauthorized());
    }

    #[test]
    fn test_display_impl() {
        let err = AppError::chat_api("channel_not_found", "chat.postMessage");
        assert_eq!(format!("{}", err), "Slack API error: channel_not_found");
        assert_eq!(
            AppError::database_with_op("locked", "update_user_default_channel").to_string(),
            "Database error: locked"
        );
    }
}
