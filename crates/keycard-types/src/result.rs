//! The transient outcome of a permission check.

use serde::Serialize;

/// Message surfaced to consumers whenever a lookup fails. Raw upstream errors
/// go to the log, never to the UI.
pub const PERMISSION_CHECK_FAILED: &str = "permission check failed";

/// Outcome of evaluating one spec or a batch of specs.
///
/// `is_loading` means "not yet known" and must not be read as denial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionResult {
    pub allowed: bool,
    pub is_loading: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Where a single evaluation stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationState {
    Pending,
    Allowed,
    Denied,
    Error,
}

impl PermissionResult {
    pub fn allowed() -> Self {
        Self {
            allowed: true,
            is_loading: false,
            error: None,
        }
    }

    pub fn denied() -> Self {
        Self {
            allowed: false,
            is_loading: false,
            error: None,
        }
    }

    pub fn loading() -> Self {
        Self {
            allowed: false,
            is_loading: true,
            error: None,
        }
    }

    /// A fail-closed result carrying the generic failure message.
    pub fn failed() -> Self {
        Self {
            allowed: false,
            is_loading: false,
            error: Some(PERMISSION_CHECK_FAILED.to_string()),
        }
    }

    pub fn from_allowed(allowed: bool) -> Self {
        if allowed {
            Self::allowed()
        } else {
            Self::denied()
        }
    }

    pub fn state(&self) -> EvaluationState {
        if self.error.is_some() {
            EvaluationState::Error
        } else if self.is_loading {
            EvaluationState::Pending
        } else if self.allowed {
            EvaluationState::Allowed
        } else {
            EvaluationState::Denied
        }
    }

    /// Settled and denied, without an error.
    pub fn is_denied(&self) -> bool {
        self.state() == EvaluationState::Denied
    }
}
