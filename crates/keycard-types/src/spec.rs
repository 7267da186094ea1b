//! A single permission query.

use crate::error::SpecParseError;
use crate::scope::Scope;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Identifies one permission check: may the caller perform `action` on
/// `resource` at (at least) `scope`?
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionSpec {
    pub resource: String,
    pub action: String,
    /// Requested breadth. Absent means `own`, the weakest requirement.
    #[serde(default)]
    pub scope: Scope,
    /// Opaque caller context (e.g. the property or department being viewed).
    /// Carried for diagnostics; it does not take part in matching.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<BTreeMap<String, serde_json::Value>>,
}

impl PermissionSpec {
    pub fn new(resource: impl Into<String>, action: impl Into<String>, scope: Scope) -> Self {
        Self {
            resource: resource.into(),
            action: action.into(),
            scope,
            context: None,
        }
    }

    /// Attach a context entry, creating the map on first use.
    pub fn with_context(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.context
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value);
        self
    }

    /// A spec missing its resource or action can never be allowed.
    pub fn is_well_formed(&self) -> bool {
        !self.resource.trim().is_empty() && !self.action.trim().is_empty()
    }
}

impl fmt::Display for PermissionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.resource, self.action, self.scope)
    }
}

/// Parses `resource:action` or `resource:action:scope`.
impl FromStr for PermissionSpec {
    type Err = SpecParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split(':').collect();
        let (resource, action, scope) = match parts.as_slice() {
            [resource, action] => (*resource, *action, Scope::default()),
            [resource, action, scope] => (*resource, *action, scope.parse()?),
            _ => return Err(SpecParseError::Format(s.to_string())),
        };
        if resource.is_empty() || action.is_empty() {
            return Err(SpecParseError::Format(s.to_string()));
        }
        Ok(Self::new(resource, action, scope))
    }
}
