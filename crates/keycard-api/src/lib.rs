//! HTTP client for the Keycard permission API.

mod client;
mod retry;
mod source;

pub use client::{ApiClient, PERMISSIONS_PATH};
pub use retry::RetryConfig;
pub use source::HttpPermissionSource;
