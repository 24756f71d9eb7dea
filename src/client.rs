//! Management API Client for Scan Enablement
//!
//! Thin HTTP client for the account-level Inspector management API. The only
//! operation this provider uses is the idempotent `enable` call; there is no
//! read or query surface.

use crate::event::ResourceCategory;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Client errors
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error: {status} {} - {message}", .code.as_deref().unwrap_or("<no code>"))]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ClientError>;

/// Inspector management API client
#[derive(Clone)]
pub struct InspectorClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

#[derive(Debug, Serialize)]
struct EnableRequest<'a> {
    #[serde(rename = "resourceTypes")]
    resource_types: &'a [ResourceCategory],
}

/// Successful enable responses may still carry per-account failures
#[derive(Debug, Default, Deserialize)]
struct EnableResponse {
    #[serde(rename = "failedAccounts", default)]
    failed_accounts: Vec<FailedAccount>,
}

#[derive(Debug, Deserialize)]
struct FailedAccount {
    #[serde(rename = "accountId", default)]
    account_id: String,
    #[serde(rename = "errorCode", default)]
    error_code: String,
    #[serde(rename = "errorMessage", default)]
    error_message: String,
}

/// Error body shape used by the management API
#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(rename = "__type", alias = "code", default)]
    code: Option<String>,
    #[serde(rename = "message", alias = "Message", default)]
    message: Option<String>,
}

impl InspectorClient {
    /// Create a new client
    pub fn new(base_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        }
    }

    /// Set authentication token
    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    /// Override the request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");
        self
    }

    /// Build headers for requests
    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = &self.token {
            if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", token)) {
                headers.insert(AUTHORIZATION, value);
            }
        }

        headers
    }

    /// Request account-level scanning for the given resource categories.
    ///
    /// The enable operation is idempotent on the remote side; repeating it
    /// for already-covered categories is safe.
    pub async fn enable(&self, resource_types: &[ResourceCategory]) -> Result<()> {
        let url = format!("{}/enable", self.base_url);
        let response = self
            .client
            .post(&url)
            .headers(self.headers())
            .json(&EnableRequest { resource_types })
            .send()
            .await?;

        let status = response.status();

        if status.is_success() {
            let text = response.text().await?;
            let body: EnableResponse = if text.trim().is_empty() {
                EnableResponse::default()
            } else {
                serde_json::from_str(&text)?
            };

            if let Some(failed) = body.failed_accounts.into_iter().next() {
                return Err(ClientError::Api {
                    status: status.as_u16(),
                    code: Some(failed.error_code),
                    message: format!("account {}: {}", failed.account_id, failed.error_message),
                });
            }

            Ok(())
        } else {
            let text = response.text().await.unwrap_or_default();
            let body: ApiErrorBody = serde_json::from_str(&text).unwrap_or_default();

            Err(ClientError::Api {
                status: status.as_u16(),
                code: body.code.map(strip_type_namespace),
                message: body.message.unwrap_or(text),
            })
        }
    }
}

/// Error codes arrive namespaced, e.g. `com.amazonaws.inspector2#ConflictException`
fn strip_type_namespace(code: String) -> String {
    match code.rsplit_once('#') {
        Some((_, short)) => short.to_string(),
        None => code,
    }
}
