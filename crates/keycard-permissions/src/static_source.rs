//! Permission source backed by a fixed grant list (offline mode, fixtures).

use keycard_types::{FetchFuture, Grant, PermissionSource, Principal};
use std::collections::HashMap;
use uuid::Uuid;

/// Serves grants from memory. Users without an explicit entry receive the
/// default grant list.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    default_grants: Vec<Grant>,
    per_user: HashMap<Uuid, Vec<Grant>>,
}

impl StaticSource {
    pub fn new(default_grants: Vec<Grant>) -> Self {
        Self {
            default_grants,
            per_user: HashMap::new(),
        }
    }

    pub fn with_user(mut self, user_id: Uuid, grants: Vec<Grant>) -> Self {
        self.per_user.insert(user_id, grants);
        self
    }

    fn grants_for(&self, user_id: &Uuid) -> Vec<Grant> {
        self.per_user
            .get(user_id)
            .unwrap_or(&self.default_grants)
            .clone()
    }
}

impl PermissionSource for StaticSource {
    fn fetch_grants<'a>(&'a self, principal: &'a Principal) -> FetchFuture<'a> {
        let grants = self.grants_for(&principal.user_id);
        Box::pin(async move { Ok(grants) })
    }

    fn name(&self) -> &str {
        "static"
    }
}
