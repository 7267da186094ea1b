//! HTTP-backed permission source.

use crate::client::ApiClient;
use crate::retry::RetryConfig;
use keycard_types::{ApiError, FetchFuture, PermissionSource, Principal};
use std::time::Duration;

/// Permission source backed by the back-office REST API.
///
/// Wraps `ApiClient` and implements `PermissionSource`; retry logic stays in
/// the client.
#[derive(Clone)]
pub struct HttpPermissionSource {
    client: ApiClient,
}

impl HttpPermissionSource {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        Ok(Self {
            client: ApiClient::new(base_url, timeout)?,
        })
    }

    pub fn with_retry_config(mut self, config: RetryConfig) -> Self {
        self.client = self.client.with_retry_config(config);
        self
    }
}

impl PermissionSource for HttpPermissionSource {
    fn fetch_grants<'a>(&'a self, principal: &'a Principal) -> FetchFuture<'a> {
        Box::pin(self.client.fetch_grants(principal))
    }

    fn name(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_source_name() {
        let source = HttpPermissionSource::new("http://localhost:3000", Duration::from_secs(5))
            .unwrap()
            .with_retry_config(RetryConfig {
                max_retries: 3,
                ..RetryConfig::default()
            });
        assert_eq!(source.name(), "http");
    }
}
