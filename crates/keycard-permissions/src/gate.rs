//! Gate: turns a permission decision into a render decision.

use crate::cache::CacheEvent;
use crate::common::CommonPermission;
use crate::evaluator::PermissionEvaluator;
use keycard_types::{EvaluationState, PermissionResult, PermissionSpec};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Consumer-facing gate options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateOptions {
    /// AND the specs instead of OR-ing them.
    pub require_all: bool,
    /// Render the loading view while permissions are unknown. When off, the
    /// gate renders nothing during loading to avoid flicker on fast checks.
    pub show_loading: bool,
    /// Render nothing instead of the unauthorized view when denied.
    pub hide_on_denied: bool,
}

impl Default for GateOptions {
    fn default() -> Self {
        Self {
            require_all: false,
            show_loading: true,
            hide_on_denied: false,
        }
    }
}

/// What the consumer should render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// The guarded content.
    Content,
    /// The loading view.
    Loading,
    /// The unauthorized view (or the generic fallback).
    Unauthorized,
    /// Nothing at all.
    Nothing,
}

/// The gate's decision table.
///
/// | state             | decision                                  |
/// |-------------------|-------------------------------------------|
/// | unauthenticated   | Unauthorized, or Nothing if hide_on_denied |
/// | loading           | Loading if show_loading, else Nothing     |
/// | error             | Unauthorized                              |
/// | denied            | Unauthorized, or Nothing if hide_on_denied |
/// | allowed           | Content                                   |
pub fn gate_decision(
    authenticated: bool,
    result: &PermissionResult,
    options: &GateOptions,
) -> GateDecision {
    let denied = if options.hide_on_denied {
        GateDecision::Nothing
    } else {
        GateDecision::Unauthorized
    };

    if !authenticated {
        return denied;
    }

    match result.state() {
        EvaluationState::Pending if options.show_loading => GateDecision::Loading,
        EvaluationState::Pending => GateDecision::Nothing,
        EvaluationState::Error => GateDecision::Unauthorized,
        EvaluationState::Denied => denied,
        EvaluationState::Allowed => GateDecision::Content,
    }
}

/// Views a consumer can supply for the non-content outcomes.
#[derive(Debug, Clone)]
pub struct Fallbacks<T> {
    pub loading: Option<T>,
    pub unauthorized: Option<T>,
    /// Used when the specific view for an outcome is absent.
    pub fallback: Option<T>,
}

impl<T> Default for Fallbacks<T> {
    fn default() -> Self {
        Self {
            loading: None,
            unauthorized: None,
            fallback: None,
        }
    }
}

impl GateDecision {
    /// Pick the view to render. `None` means render nothing.
    pub fn pick<'a, T>(self, content: &'a T, fallbacks: &'a Fallbacks<T>) -> Option<&'a T> {
        match self {
            GateDecision::Content => Some(content),
            GateDecision::Loading => fallbacks.loading.as_ref().or(fallbacks.fallback.as_ref()),
            GateDecision::Unauthorized => fallbacks
                .unauthorized
                .as_ref()
                .or(fallbacks.fallback.as_ref()),
            GateDecision::Nothing => None,
        }
    }
}

/// A set of specs guarded together for one piece of UI.
#[derive(Clone)]
pub struct Gate {
    evaluator: PermissionEvaluator,
    specs: Vec<PermissionSpec>,
    options: GateOptions,
}

impl Gate {
    pub fn new(evaluator: PermissionEvaluator, specs: Vec<PermissionSpec>) -> Self {
        Self {
            evaluator,
            specs,
            options: GateOptions::default(),
        }
    }

    /// Gate on a single common permission.
    pub fn common(evaluator: PermissionEvaluator, permission: CommonPermission) -> Self {
        Self::new(evaluator, vec![permission.spec()])
    }

    pub fn with_options(mut self, options: GateOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &GateOptions {
        &self.options
    }

    pub fn specs(&self) -> &[PermissionSpec] {
        &self.specs
    }

    /// Decide from the current cache state, without waiting.
    pub fn decide(&self) -> GateDecision {
        let result = self
            .evaluator
            .decide_batch(&self.specs, self.options.require_all);
        gate_decision(
            self.evaluator.identity().is_authenticated(),
            &result,
            &self.options,
        )
    }

    /// Wait for the permission set and decide.
    pub async fn resolve(&self) -> GateDecision {
        let result = self
            .evaluator
            .evaluate_batch(&self.specs, self.options.require_all)
            .await;
        gate_decision(
            self.evaluator.identity().is_authenticated(),
            &result,
            &self.options,
        )
    }

    /// Cache events after which `decide` may answer differently.
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.evaluator.subscribe()
    }
}
