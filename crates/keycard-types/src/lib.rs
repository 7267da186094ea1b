//! Shared permission types and error hierarchy for Keycard.

pub mod error;
pub mod grant;
pub mod identity;
pub mod result;
pub mod scope;
pub mod source;
pub mod spec;

pub use error::{ApiError, ConfigError, KeycardError, SpecParseError};
pub use grant::{Grant, PermissionSet};
pub use identity::{Identity, Principal};
pub use result::{EvaluationState, PERMISSION_CHECK_FAILED, PermissionResult};
pub use scope::Scope;
pub use source::{FetchFuture, PermissionSource};
pub use spec::PermissionSpec;
