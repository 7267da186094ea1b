//! Grants held by an identity, as returned by the permission API.

use crate::scope::Scope;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One granted (resource, action, scope) tuple.
///
/// `resource` and `action` may be glob patterns (`*`, `property.*`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Grant {
    pub resource: String,
    pub action: String,
    pub scope: Scope,
}

impl Grant {
    pub fn new(resource: impl Into<String>, action: impl Into<String>, scope: Scope) -> Self {
        Self {
            resource: resource.into(),
            action: action.into(),
            scope,
        }
    }
}

/// The flat list of grants for one identity, stamped with its fetch time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionSet {
    pub grants: Vec<Grant>,
    pub fetched_at: DateTime<Utc>,
}

impl PermissionSet {
    pub fn new(grants: Vec<Grant>) -> Self {
        Self {
            grants,
            fetched_at: Utc::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.grants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }
}
