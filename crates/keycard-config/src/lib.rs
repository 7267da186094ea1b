//! Multi-tier TOML configuration for Keycard.
//!
//! Reads configuration from multiple sources with precedence:
//! CLI flags > env vars > config file > defaults

use keycard_permissions::{CacheConfig, GateOptions};
use keycard_types::{ConfigError, Grant, Identity, KeycardError, Principal};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

/// The default permission API base URL.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:3000";

/// The default staleness window, in seconds.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;

/// Longest staleness window accepted, in seconds.
pub const MAX_CACHE_TTL_SECS: u64 = 3600;

/// The default per-request timeout, in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Resolved configuration for a Keycard session.
#[derive(Debug, Clone)]
pub struct KeycardConfig {
    pub api_base_url: String,
    pub access_token: Option<String>,
    pub user_id: Option<Uuid>,
    pub cache_ttl: Duration,
    pub request_timeout: Duration,
    pub max_retries: u32,
    pub gate: GateOptions,
    /// Offline grants. When non-empty, no HTTP source is used.
    pub grants: Vec<Grant>,
    pub config_dir: PathBuf,
}

/// Settings that can be read from a TOML config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsFile {
    #[serde(default)]
    pub api: ApiSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub gate: GateOptions,
    #[serde(default)]
    pub grants: Vec<Grant>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiSettings {
    pub base_url: Option<String>,
    pub access_token: Option<String>,
    pub user_id: Option<String>,
    pub timeout_secs: Option<u64>,
    pub max_retries: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheSettings {
    pub ttl_secs: Option<u64>,
}

/// CLI overrides that take highest precedence.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub api_base_url: Option<String>,
    pub access_token: Option<String>,
    pub user_id: Option<String>,
    pub cache_ttl_secs: Option<u64>,
}

impl KeycardConfig {
    /// Load configuration from all sources, applying precedence rules.
    ///
    /// Precedence (highest to lowest):
    /// 1. CLI flags
    /// 2. Environment variables (KEYCARD_API_URL, KEYCARD_TOKEN,
    ///    KEYCARD_USER_ID, KEYCARD_CACHE_TTL_SECS)
    /// 3. Config file (~/.keycard/config.toml)
    /// 4. Defaults
    pub fn load(overrides: CliOverrides) -> Result<Self, KeycardError> {
        let config_dir = config_dir();
        let settings = load_settings_file(&config_dir.join("config.toml"));
        Ok(Self::resolve(settings, overrides, config_dir, |key| {
            std::env::var(key).ok()
        })?)
    }

    /// Apply precedence rules to already-loaded settings. `env` looks up
    /// environment variables.
    pub fn resolve(
        settings: SettingsFile,
        overrides: CliOverrides,
        config_dir: PathBuf,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let api_base_url = overrides
            .api_base_url
            .or_else(|| env("KEYCARD_API_URL"))
            .or(settings.api.base_url)
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());

        let access_token = overrides
            .access_token
            .or_else(|| env("KEYCARD_TOKEN"))
            .or(settings.api.access_token)
            .filter(|t| !t.trim().is_empty());

        let user_id = overrides
            .user_id
            .or_else(|| env("KEYCARD_USER_ID"))
            .or(settings.api.user_id)
            .map(|raw| {
                Uuid::parse_str(raw.trim()).map_err(|e| ConfigError::InvalidValue {
                    key: "user_id".into(),
                    message: e.to_string(),
                })
            })
            .transpose()?;

        let ttl_secs = match overrides.cache_ttl_secs {
            Some(secs) => secs,
            None => env("KEYCARD_CACHE_TTL_SECS")
                .map(|raw| {
                    raw.trim()
                        .parse::<u64>()
                        .map_err(|e| ConfigError::InvalidValue {
                            key: "KEYCARD_CACHE_TTL_SECS".into(),
                            message: e.to_string(),
                        })
                })
                .transpose()?
                .or(settings.cache.ttl_secs)
                .unwrap_or(DEFAULT_CACHE_TTL_SECS),
        };
        if ttl_secs == 0 || ttl_secs > MAX_CACHE_TTL_SECS {
            return Err(ConfigError::InvalidValue {
                key: "cache.ttl_secs".into(),
                message: format!("must be between 1 and {MAX_CACHE_TTL_SECS}, got {ttl_secs}"),
            });
        }

        let timeout_secs = settings
            .api
            .timeout_secs
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);

        Ok(KeycardConfig {
            api_base_url,
            access_token,
            user_id,
            cache_ttl: Duration::from_secs(ttl_secs),
            request_timeout: Duration::from_secs(timeout_secs.max(1)),
            max_retries: settings.api.max_retries.unwrap_or(0),
            gate: settings.gate,
            grants: settings.grants,
            config_dir,
        })
    }

    /// The caller identity. Missing token or user id means unauthenticated.
    pub fn identity(&self) -> Identity {
        match (&self.user_id, &self.access_token) {
            (Some(user_id), Some(token)) => Principal::new(*user_id, token.clone()).into(),
            _ => Identity::Unauthenticated,
        }
    }

    /// The configured principal, for operations that cannot run anonymously.
    ///
    /// Nothing configured is `Unauthenticated`; a token without a user id (or
    /// the reverse) is a `MissingKey` for the absent half.
    pub fn require_principal(&self) -> Result<Principal, KeycardError> {
        match (&self.user_id, &self.access_token) {
            (Some(user_id), Some(token)) => Ok(Principal::new(*user_id, token.clone())),
            (None, None) => Err(KeycardError::Unauthenticated),
            (None, Some(_)) => Err(ConfigError::MissingKey {
                key: "user_id".into(),
            }
            .into()),
            (Some(_), None) => Err(ConfigError::MissingKey {
                key: "access_token".into(),
            }
            .into()),
        }
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            ttl: self.cache_ttl,
        }
    }

    pub fn is_offline(&self) -> bool {
        !self.grants.is_empty()
    }
}

/// Get the Keycard config directory path (~/.keycard/).
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("KEYCARD_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    dirs_next::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".keycard")
}

/// Load and parse a TOML settings file, returning defaults on any error.
pub fn load_settings_file(path: &Path) -> SettingsFile {
    match std::fs::read_to_string(path) {
        Ok(content) => toml::from_str(&content).unwrap_or_else(|e| {
            tracing::warn!("Failed to parse {}: {}", path.display(), e);
            SettingsFile::default()
        }),
        Err(_) => SettingsFile::default(),
    }
}
