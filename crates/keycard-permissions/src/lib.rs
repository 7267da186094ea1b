//! Permission evaluation, caching and gating for Keycard.
//!
//! Scopes: own < department < property < organization < platform
//! Batch modes: require all (AND) / require any (OR), empty batch allows
//! Failure mode: fail closed, never an error past the evaluator

pub mod cache;
pub mod common;
pub mod evaluator;
pub mod gate;
pub mod matcher;
pub mod static_source;

pub use cache::{CacheConfig, CacheEvent, CacheSnapshot, CacheStats, PermissionCache};
pub use common::CommonPermission;
pub use evaluator::{PermissionEvaluator, combine};
pub use gate::{Fallbacks, Gate, GateDecision, GateOptions, gate_decision};
pub use matcher::GrantMatcher;
pub use static_source::StaticSource;
pub use keycard_types::*;
