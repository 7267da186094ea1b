//! Grant matcher: decides whether a held grant satisfies a permission spec.

use keycard_types::{Grant, PermissionSet, PermissionSpec};

/// Evaluates whether a `Grant` satisfies a given `PermissionSpec`.
pub struct GrantMatcher;

impl GrantMatcher {
    /// Check if a grant satisfies the spec.
    ///
    /// Resource and action: exact string or glob on the grant side
    /// (e.g., `*`, `property.*`).
    /// Scope: the grant's scope must cover the requested one.
    pub fn matches(grant: &Grant, spec: &PermissionSpec) -> bool {
        Self::matches_pattern(&grant.resource, &spec.resource)
            && Self::matches_pattern(&grant.action, &spec.action)
            && grant.scope.covers(spec.scope)
    }

    /// First grant in the set that satisfies the spec, if any.
    pub fn find<'a>(set: &'a PermissionSet, spec: &PermissionSpec) -> Option<&'a Grant> {
        if !spec.is_well_formed() {
            return None;
        }
        set.grants.iter().find(|g| Self::matches(g, spec))
    }

    pub fn has_permission(set: &PermissionSet, spec: &PermissionSpec) -> bool {
        Self::find(set, spec).is_some()
    }

    /// At least one spec is satisfied. False for an empty list.
    pub fn has_any_permission(set: &PermissionSet, specs: &[PermissionSpec]) -> bool {
        specs.iter().any(|s| Self::has_permission(set, s))
    }

    /// Every spec is satisfied. True for an empty list.
    pub fn has_all_permissions(set: &PermissionSet, specs: &[PermissionSpec]) -> bool {
        specs.iter().all(|s| Self::has_permission(set, s))
    }

    /// Human-readable description of a grant.
    pub fn describe(grant: &Grant) -> String {
        format!("grant: {}:{} @ {}", grant.resource, grant.action, grant.scope)
    }

    fn matches_pattern(pattern: &str, value: &str) -> bool {
        if pattern == "*" || pattern == value {
            return true;
        }
        if !pattern.contains(&['*', '?', '[', '{'][..]) {
            return false;
        }

        match globset::GlobBuilder::new(pattern)
            .case_insensitive(false)
            .literal_separator(false)
            .build()
        {
            Ok(glob) => glob.compile_matcher().is_match(value),
            // If glob fails to parse, fall back to exact match
            Err(_) => pattern == value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keycard_types::Scope;

    fn spec(resource: &str, action: &str, scope: Scope) -> PermissionSpec {
        PermissionSpec::new(resource, action, scope)
    }

    fn set(grants: Vec<Grant>) -> PermissionSet {
        PermissionSet::new(grants)
    }

    #[test]
    fn test_exact_match() {
        let g = Grant::new("user", "create", Scope::Own);
        assert!(GrantMatcher::matches(&g, &spec("user", "create", Scope::Own)));
    }

    #[test]
    fn test_resource_mismatch() {
        let g = Grant::new("user", "create", Scope::Platform);
        assert!(!GrantMatcher::matches(&g, &spec("property", "create", Scope::Own)));
    }

    #[test]
    fn test_action_mismatch() {
        let g = Grant::new("user", "read", Scope::Platform);
        assert!(!GrantMatcher::matches(&g, &spec("user", "delete", Scope::Own)));
    }

    #[test]
    fn test_narrower_scope_implied() {
        let g = Grant::new("user", "create", Scope::Department);
        assert!(GrantMatcher::matches(&g, &spec("user", "create", Scope::Own)));
        assert!(GrantMatcher::matches(&g, &spec("user", "create", Scope::Department)));
    }

    #[test]
    fn test_broader_scope_not_implied() {
        let g = Grant::new("user", "create", Scope::Department);
        assert!(!GrantMatcher::matches(&g, &spec("user", "create", Scope::Property)));
        assert!(!GrantMatcher::matches(
            &g,
            &spec("user", "create", Scope::Organization)
        ));
    }

    #[test]
    fn test_platform_grant_covers_all_scopes() {
        let g = Grant::new("department", "update", Scope::Platform);
        for scope in Scope::ALL {
            assert!(GrantMatcher::matches(&g, &spec("department", "update", scope)));
        }
    }

    #[test]
    fn test_wildcard_action() {
        let g = Grant::new("property", "*", Scope::Property);
        assert!(GrantMatcher::matches(&g, &spec("property", "update", Scope::Property)));
        assert!(GrantMatcher::matches(&g, &spec("property", "delete", Scope::Own)));
    }

    #[test]
    fn test_glob_resource() {
        let g = Grant::new("property.*", "read", Scope::Organization);
        assert!(GrantMatcher::matches(
            &g,
            &spec("property.settings", "read", Scope::Property)
        ));
        assert!(!GrantMatcher::matches(&g, &spec("user", "read", Scope::Own)));
    }

    #[test]
    fn test_wildcard_on_spec_side_is_literal() {
        // A spec asking for "*" only matches a grant that holds "*".
        let g = Grant::new("user", "read", Scope::Platform);
        assert!(!GrantMatcher::matches(&g, &spec("*", "read", Scope::Own)));
    }

    #[test]
    fn test_malformed_spec_never_matches() {
        let s = set(vec![Grant::new("*", "*", Scope::Platform)]);
        assert!(!GrantMatcher::has_permission(&s, &spec("", "read", Scope::Own)));
        assert!(!GrantMatcher::has_permission(&s, &spec("user", "", Scope::Own)));
    }

    #[test]
    fn test_has_any_and_all() {
        let s = set(vec![
            Grant::new("user", "read", Scope::Property),
            Grant::new("department", "read", Scope::Own),
        ]);
        let specs = vec![
            spec("user", "read", Scope::Department),
            spec("department", "read", Scope::Department),
        ];
        assert!(GrantMatcher::has_any_permission(&s, &specs));
        assert!(!GrantMatcher::has_all_permissions(&s, &specs));
        assert!(GrantMatcher::has_all_permissions(&s, &specs[..1]));
    }

    #[test]
    fn test_empty_lists() {
        let s = set(vec![]);
        assert!(!GrantMatcher::has_any_permission(&s, &[]));
        assert!(GrantMatcher::has_all_permissions(&s, &[]));
    }

    #[test]
    fn test_find_returns_first_matching_grant() {
        let s = set(vec![
            Grant::new("user", "read", Scope::Own),
            Grant::new("user", "*", Scope::Platform),
        ]);
        let found = GrantMatcher::find(&s, &spec("user", "read", Scope::Property)).unwrap();
        assert_eq!(found.scope, Scope::Platform);
        assert_eq!(GrantMatcher::describe(found), "grant: user:* @ platform");
    }
}
