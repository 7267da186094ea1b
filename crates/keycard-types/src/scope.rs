//! Grant scopes, ordered by containment.

use crate::error::SpecParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The breadth of a permission grant.
///
/// Variants are declared narrowest first so the derived `Ord` is the
/// containment order: `Own < Department < Property < Organization < Platform`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    #[default]
    Own,
    Department,
    Property,
    Organization,
    Platform,
}

impl Scope {
    pub const ALL: [Scope; 5] = [
        Scope::Own,
        Scope::Department,
        Scope::Property,
        Scope::Organization,
        Scope::Platform,
    ];

    /// Returns `true` if a grant held at `self` satisfies a check requesting `requested`.
    pub fn covers(self, requested: Scope) -> bool {
        self >= requested
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Scope::Own => "own",
            Scope::Department => "department",
            Scope::Property => "property",
            Scope::Organization => "organization",
            Scope::Platform => "platform",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = SpecParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "own" => Ok(Scope::Own),
            "department" => Ok(Scope::Department),
            "property" => Ok(Scope::Property),
            "organization" | "organisation" => Ok(Scope::Organization),
            "platform" => Ok(Scope::Platform),
            other => Err(SpecParseError::UnknownScope(other.to_string())),
        }
    }
}
