//! Error hierarchy for Keycard.

use thiserror::Error;

/// Errors surfaced at the library boundary: loading config, building a
/// permission source, resolving the caller.
#[derive(Debug, Error)]
pub enum KeycardError {
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Not authenticated: set an access token and user id")]
    Unauthenticated,
}

/// Errors from the upstream permission API.
///
/// `Clone` because a single coalesced fetch hands its outcome to every waiter.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    #[error("Authentication failed: {message}")]
    Auth { message: String },

    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    #[error("Bad request: {message}")]
    BadRequest { message: String },

    #[error("Rate limited (retry after {retry_after_ms:?}ms)")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("Server error: {status} {message}")]
    Server { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed response: {0}")]
    Decode(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors from configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file parse error at {path}: {message}")]
    Parse { path: String, message: String },

    #[error("Missing required configuration: {key}")]
    MissingKey { key: String },

    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

/// Errors from parsing the `resource:action[:scope]` text form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpecParseError {
    #[error("expected 'resource:action[:scope]', got '{0}'")]
    Format(String),

    #[error("unknown scope '{0}' (expected own, department, property, organization or platform)")]
    UnknownScope(String),

    #[error("unknown common permission '{0}'")]
    UnknownCommon(String),
}
