//! Authenticated HTTP transport shared by the GitLab and Slack adapters.
//!
//! Auth headers and the timeout are fixed when the client is built; adapters
//! get the raw [`Response`] back so they can read pagination headers and map
//! status codes themselves.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Response};
use serde::Serialize;
use std::time::Duration;

use crate::error::AppError;

/// A `reqwest` client bound to one upstream API.
#[derive(Debug, Clone)]
pub struct RemoteClient {
    client: Client,
    base_url: String,
}

impl RemoteClient {
    /// Build a client whose every request carries `auth_header: auth_value`.
    pub fn new(
        base_url: &str,
        auth_header: &'static str,
        auth_value: &str,
        timeout_secs: u64,
    ) -> Result<Self, AppError> {
        let mut headers = HeaderMap::new();
        let value = HeaderValue::from_str(auth_value)
            .map_err(|_| AppError::configuration("Invalid token format"))?;
        headers.insert(HeaderName::from_static(auth_header), value);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AppError::internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Absolute URL for an endpoint path such as `/users`.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `GET` with query parameters.
    pub async fn get(&self, path: &str, query: &impl Serialize) -> Result<Response, AppError> {
        let response = self.client.get(self.url(path)).query(query).send().await?;
        Ok(response)
    }

    /// `POST` with a form-encoded body.
    pub async fn post_form(&self, path: &str, form: &impl Serialize) -> Result<Response, AppError> {
        let response = self.client.post(self.url(path)).form(form).send().await?;
        Ok(response)
    }
}
