//! Source trait for upstream permission lookups.

use crate::{ApiError, Grant, Principal};
use std::future::Future;
use std::pin::Pin;

/// A boxed future resolving to the grants held by one principal.
pub type FetchFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<Grant>, ApiError>> + Send + 'a>>;

/// Anything that can list the grants held by a principal (HTTP API, static
/// config, test doubles).
///
/// Dyn-compatible so the cache works with `Arc<dyn PermissionSource>`.
pub trait PermissionSource: Send + Sync {
    /// Fetch the flat list of grants for `principal`.
    fn fetch_grants<'a>(&'a self, principal: &'a Principal) -> FetchFuture<'a>;

    /// Source name for logging (e.g., "http", "static").
    fn name(&self) -> &str;
}
