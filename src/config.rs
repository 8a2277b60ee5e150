//! Command-line and environment configuration.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::error::AppError;
use crate::services::gitlab_client::GitLabClientConfig;
use crate::services::slack_client::SlackClientConfig;

/// Relay GitLab webhook events into Slack threads.
#[derive(Clone, Parser)]
#[command(name = "gitlack")]
#[command(version)]
pub struct Config {
    /// Enable debug logging
    #[arg(long, env = "DEBUG")]
    pub debug: bool,

    /// Slack URL scheme
    #[arg(long, env = "SLACK_SCHEME", default_value = "https")]
    pub slack_scheme: String,

    /// Slack domain
    #[arg(long, env = "SLACK_DOMAIN", default_value = "slack.com")]
    pub slack_domain: String,

    /// Slack bot token
    #[arg(long, env = "SLACK_TOKEN", hide_env_values = true)]
    pub slack_token: Option<String>,

    /// GitLab URL scheme
    #[arg(long, env = "GITLAB_SCHEME", default_value = "https")]
    pub gitlab_scheme: String,

    /// GitLab domain
    #[arg(long, env = "GITLAB_DOMAIN", default_value = "gitlab.com")]
    pub gitlab_domain: String,

    /// GitLab personal access token
    #[arg(long, env = "GITLAB_TOKEN", hide_env_values = true)]
    pub gitlab_token: Option<String>,

    /// Address the HTTP server listens on
    #[arg(long, env = "SERVER_ADDR", default_value = "0.0.0.0:5000")]
    pub server_addr: SocketAddr,

    /// SQLite database file
    #[arg(long, env = "DATABASE_PATH", default_value = "db/gitlack.db")]
    pub database_path: PathBuf,

    /// Timeout for GitLab and Slack requests, in seconds
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |token: &Option<String>| token.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("Config")
            .field("debug", &self.debug)
            .field("slack_scheme", &self.slack_scheme)
            .field("slack_domain", &self.slack_domain)
            .field("slack_token", &redact(&self.slack_token))
            .field("gitlab_scheme", &self.gitlab_scheme)
            .field("gitlab_domain", &self.gitlab_domain)
            .field("gitlab_token", &redact(&self.gitlab_token))
            .field("server_addr", &self.server_addr)
            .field("database_path", &self.database_path)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

fn present(token: &Option<String>) -> Option<&str> {
    token.as_deref().filter(|t| !t.is_empty())
}

impl Config {
    /// Check that every required flag was given.
    pub fn validate(&self) -> Result<(), AppError> {
        let mut missing = Vec::new();
        if present(&self.slack_token).is_none() {
            missing.push("--slack-token");
        }
        if present(&self.gitlab_token).is_none() {
            missing.push("--gitlab-token");
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(AppError::configuration(format!(
                "missing required flags: {}",
                missing.join(", ")
            )))
        }
    }

    pub fn gitlab_config(&self) -> GitLabClientConfig {
        GitLabClientConfig {
            base_url: format!("{}://{}", self.gitlab_scheme, self.gitlab_domain),
            token: present(&self.gitlab_token).unwrap_or_default().to_string(),
            timeout_secs: self.request_timeout_secs,
        }
    }

    pub fn slack_config(&self) -> SlackClientConfig {
        SlackClientConfig {
            base_url: format!("{}://{}", self.slack_scheme, self.slack_domain),
            token: present(&self.slack_token).unwrap_or_default().to_string(),
            timeout_secs: self.request_timeout_secs,
        }
    }

    /// Default `tracing` filter directive.
    pub fn log_level(&self) -> &'static str {
        if self.debug {
            "debug"
        } else {
            "info"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        let mut argv = vec!["gitlack"];
        argv.extend_from_slice(args);
        Config::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults_and_derived_urls() {
        let config = parse(&["--slack-token", "xoxb-1", "--gitlab-token", "glpat-1"]);
        assert!(config.validate().is_ok());
        assert_eq!(config.server_addr.to_string(), "0.0.0.0:5000");
        assert_eq!(config.database_path, PathBuf::from("db/gitlack.db"));

        let gitlab = config.gitlab_config();
        assert_eq!(gitlab.base_url, "https://gitlab.com");
        assert_eq!(gitlab.token, "glpat-1");
        assert_eq!(gitlab.timeout_secs, 30);
        assert_eq!(config.slack_config().base_url, "https://slack.com");
        assert_eq!(config.log_level(), "info");
    }

    #[test]
    fn test_custom_hosts() {
        let config = parse(&[
            "--gitlab-scheme",
            "http",
            "--gitlab-domain",
            "gitlab.internal:8080",
            "--slack-token",
            "x",
            "--gitlab-token",
            "y",
            "--debug",
        ]);
        assert_eq!(config.gitlab_config().base_url, "http://gitlab.internal:8080");
        assert_eq!(config.log_level(), "debug");
    }

    #[test]
    fn test_missing_tokens_are_listed() {
        let config = parse(&["--slack-token", ""]);
        let err = config.validate().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("--slack-token"));
        assert!(message.contains("--gitlab-token"));
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let config = parse(&["--slack-token", "xoxb-secret", "--gitlab-token", "glpat-secret"]);
        let debug = format!("{:?}", config);
        assert!(!debug.contains("xoxb-secret"));
        assert!(!debug.contains("glpat-secret"));
    }
}
