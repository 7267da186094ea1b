//! Permission API client.

use std::time::Duration;

use keycard_types::{ApiError, Grant, Principal};
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Deserialize;

use crate::retry::{Backoff, RetryConfig};

/// Path of the "my permissions" endpoint, relative to the API base URL.
pub const PERMISSIONS_PATH: &str = "/api/v1/me/permissions";

/// Client for the back-office permission API.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    retry_config: RetryConfig,
}

/// The endpoint answers either `{"permissions": [...]}` or a bare array.
#[derive(Deserialize)]
#[serde(untagged)]
enum PermissionsBody {
    Wrapped { permissions: Vec<Grant> },
    Bare(Vec<Grant>),
}

impl PermissionsBody {
    fn into_grants(self) -> Vec<Grant> {
        match self {
            PermissionsBody::Wrapped { permissions } => permissions,
            PermissionsBody::Bare(grants) => grants,
        }
    }
}

impl ApiClient {
    /// Create a new API client with the given per-request timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            retry_config: RetryConfig::default(),
        })
    }

    /// Set the retry configuration for transient errors (429, 5xx, network).
    pub fn with_retry_config(mut self, config: RetryConfig) -> Self {
        self.retry_config = config;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch the flat list of grants held by `principal`.
    pub async fn fetch_grants(&self, principal: &Principal) -> Result<Vec<Grant>, ApiError> {
        let url = format!("{}{}", self.base_url, PERMISSIONS_PATH);

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", principal.access_token)).map_err(|_| {
                ApiError::Auth {
                    message: "Invalid access token format".into(),
                }
            })?,
        );

        let mut backoff = Backoff::new(&self.retry_config);
        loop {
            tracing::debug!(
                user_id = %principal.user_id,
                retry = backoff.retries(),
                "GET {url}"
            );

            let err = match self.http.get(&url).headers(headers.clone()).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let body = response
                            .text()
                            .await
                            .map_err(|e| ApiError::Network(e.to_string()))?;
                        return parse_grants(&body);
                    }
                    let retry_after = parse_retry_after(response.headers());
                    let body_text = response.text().await.unwrap_or_default();
                    classify_error(status, &body_text, retry_after)
                }
                Err(e) if e.is_timeout() => ApiError::Timeout,
                Err(e) => ApiError::Network(e.to_string()),
            };

            let Some(delay) = backoff.next_delay(&err) else {
                return Err(err);
            };
            tracing::warn!(
                user_id = %principal.user_id,
                retry = backoff.retries(),
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "permission API error, retrying: {err}"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

/// Decode a successful response body into grants.
fn parse_grants(body: &str) -> Result<Vec<Grant>, ApiError> {
    serde_json::from_str::<PermissionsBody>(body)
        .map(PermissionsBody::into_grants)
        .map_err(|e| ApiError::Decode(e.to_string()))
}

/// Parse the `retry-after` header value as seconds and convert to milliseconds.
fn parse_retry_after(headers: &HeaderMap) -> Option<u64> {
    headers
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<f64>().ok())
        .map(|secs| (secs * 1000.0) as u64)
}

/// Classify an HTTP error response into a typed ApiError.
fn classify_error(status: StatusCode, body: &str, retry_after: Option<u64>) -> ApiError {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: Option<ErrorDetail>,
        message: Option<String>,
    }
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ErrorDetail {
        Message { message: Option<String> },
        Text(String),
    }

    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| match b.error {
            Some(ErrorDetail::Message { message }) => message,
            Some(ErrorDetail::Text(text)) => Some(text),
            None => b.message,
        })
        .unwrap_or_else(|| body.to_string());

    match status.as_u16() {
        401 => ApiError::Auth { message },
        403 => ApiError::Forbidden { message },
        400 | 404 | 422 => ApiError::BadRequest { message },
        429 => ApiError::RateLimited {
            retry_after_ms: retry_after,
        },
        code => ApiError::Server {
            status: code,
            message,
        },
    }
}
