//! Permission evaluator: the main entry point for permission checks.

use crate::cache::{CacheEvent, CacheSnapshot, PermissionCache};
use crate::matcher::GrantMatcher;
use futures_util::StreamExt;
use futures_util::stream::{FuturesUnordered, Stream};
use keycard_types::{Identity, PermissionResult, PermissionSpec};
use tokio::sync::broadcast;

/// Decides access for one identity against the shared permission cache.
///
/// Never returns an error: lookup failures and unauthenticated callers both
/// yield `allowed = false`.
#[derive(Clone)]
pub struct PermissionEvaluator {
    cache: PermissionCache,
    identity: Identity,
}

impl PermissionEvaluator {
    pub fn new(cache: PermissionCache, identity: Identity) -> Self {
        Self { cache, identity }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn cache(&self) -> &PermissionCache {
        &self.cache
    }

    /// Subscribe to cache changes so callers can re-run `decide`.
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.cache.subscribe()
    }

    /// Evaluate one spec, waiting for the permission set if necessary.
    ///
    /// Evaluation order:
    /// 1. Unauthenticated: denied, no lookup.
    /// 2. Malformed spec (no resource or action): denied.
    /// 3. Fetch or reuse the permission set; a failed fetch fails closed.
    /// 4. Allowed iff some grant matches with a covering scope.
    pub async fn evaluate_one(&self, spec: &PermissionSpec) -> PermissionResult {
        let Some(principal) = self.identity.principal() else {
            return PermissionResult::denied();
        };
        if !spec.is_well_formed() {
            tracing::warn!(%spec, "malformed permission spec, denying");
            return PermissionResult::denied();
        }

        match self.cache.get(principal).await {
            Ok(set) => {
                let allowed = GrantMatcher::has_permission(&set, spec);
                tracing::debug!(
                    user_id = %principal.user_id,
                    %spec,
                    context = ?spec.context,
                    allowed,
                    "permission evaluated"
                );
                PermissionResult::from_allowed(allowed)
            }
            Err(e) => {
                tracing::warn!(user_id = %principal.user_id, %spec, "permission check failed: {e}");
                PermissionResult::failed()
            }
        }
    }

    /// Evaluate several specs and combine them.
    ///
    /// `require_all` = AND, otherwise OR. An empty batch is allowed for an
    /// authenticated caller. OR resolves as soon as one spec is allowed; AND
    /// resolves as soon as one spec is not.
    pub async fn evaluate_batch(
        &self,
        specs: &[PermissionSpec],
        require_all: bool,
    ) -> PermissionResult {
        if !self.identity.is_authenticated() {
            return PermissionResult::denied();
        }
        if specs.is_empty() {
            return PermissionResult::allowed();
        }

        let pending: FuturesUnordered<_> =
            specs.iter().map(|spec| self.evaluate_one(spec)).collect();
        settle_batch(pending, require_all).await
    }

    /// Decide one spec from what the cache holds right now.
    ///
    /// Missing or stale entries start a background fetch and report loading;
    /// a failed entry reports the failure until it goes stale or something
    /// re-triggers a fetch.
    pub fn decide(&self, spec: &PermissionSpec) -> PermissionResult {
        let Some(principal) = self.identity.principal() else {
            return PermissionResult::denied();
        };
        if !spec.is_well_formed() {
            tracing::warn!(%spec, "malformed permission spec, denying");
            return PermissionResult::denied();
        }

        match self.cache.snapshot(&principal.user_id) {
            CacheSnapshot::Fresh(set) => {
                PermissionResult::from_allowed(GrantMatcher::has_permission(&set, spec))
            }
            CacheSnapshot::Loading => PermissionResult::loading(),
            CacheSnapshot::Missing | CacheSnapshot::Stale => {
                if !self.cache.prefetch(principal) {
                    tracing::warn!("no async runtime to fetch permissions, still loading");
                }
                PermissionResult::loading()
            }
            CacheSnapshot::Failed(_) => PermissionResult::failed(),
        }
    }

    /// Decide several specs from the current cache state and combine them.
    pub fn decide_batch(&self, specs: &[PermissionSpec], require_all: bool) -> PermissionResult {
        if !self.identity.is_authenticated() {
            return PermissionResult::denied();
        }
        let results: Vec<PermissionResult> = specs.iter().map(|s| self.decide(s)).collect();
        combine(&results, require_all)
    }
}

/// Drain per-spec results as they complete, stopping at the first one that
/// settles the batch. Evaluations still pending at that point are dropped.
async fn settle_batch<S>(mut pending: S, require_all: bool) -> PermissionResult
where
    S: Stream<Item = PermissionResult> + Unpin,
{
    let mut results = Vec::new();
    while let Some(result) = pending.next().await {
        if !require_all && result.allowed {
            return PermissionResult::allowed();
        }
        if require_all && !result.allowed && !result.is_loading {
            return result;
        }
        results.push(result);
    }
    combine(&results, require_all)
}

/// Combine per-spec results.
///
/// AND: any error fails, then any settled denial denies, then any loading
/// keeps the batch loading, otherwise allowed.
/// OR: any allowed allows (even with others loading), then any loading keeps
/// the batch loading, then any error fails, otherwise denied.
/// Empty input is allowed under both modes; callers check authentication first.
pub fn combine(results: &[PermissionResult], require_all: bool) -> PermissionResult {
    if results.is_empty() {
        return PermissionResult::allowed();
    }

    if require_all {
        if results.iter().any(|r| r.error.is_some()) {
            PermissionResult::failed()
        } else if results.iter().any(PermissionResult::is_denied) {
            PermissionResult::denied()
        } else if results.iter().any(|r| r.is_loading) {
            PermissionResult::loading()
        } else {
            PermissionResult::allowed()
        }
    } else if results.iter().any(|r| r.allowed) {
        PermissionResult::allowed()
    } else if results.iter().any(|r| r.is_loading) {
        PermissionResult::loading()
    } else if results.iter().any(|r| r.error.is_some()) {
        PermissionResult::failed()
    } else {
        PermissionResult::denied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheConfig;
    use crate::static_source::StaticSource;
    use futures_util::FutureExt;
    use futures_util::future::{self, BoxFuture};
    use keycard_types::{Grant, Principal, Scope};
    use std::sync::Arc;
    use std::time::Duration;
    use uuid::Uuid;

    fn spec(s: &str) -> PermissionSpec {
        s.parse().unwrap()
    }

    fn evaluator(grants: Vec<Grant>) -> PermissionEvaluator {
        let cache = PermissionCache::new(
            Arc::new(StaticSource::new(grants)),
            CacheConfig::default(),
        );
        PermissionEvaluator::new(cache, Principal::new(Uuid::new_v4(), "t").into())
    }

    fn anonymous(grants: Vec<Grant>) -> PermissionEvaluator {
        let cache = PermissionCache::new(
            Arc::new(StaticSource::new(grants)),
            CacheConfig::default(),
        );
        PermissionEvaluator::new(cache, Identity::Unauthenticated)
    }

    #[test]
    fn combine_empty_is_allowed() {
        assert_eq!(combine(&[], true), PermissionResult::allowed());
        assert_eq!(combine(&[], false), PermissionResult::allowed());
    }

    #[test]
    fn combine_and_one_denied() {
        let results = [
            PermissionResult::allowed(),
            PermissionResult::denied(),
            PermissionResult::allowed(),
        ];
        assert_eq!(combine(&results, true), PermissionResult::denied());
    }

    #[test]
    fn combine_and_denied_beats_loading() {
        let results = [PermissionResult::loading(), PermissionResult::denied()];
        assert_eq!(combine(&results, true), PermissionResult::denied());
    }

    #[test]
    fn combine_and_loading_is_not_allowed() {
        let results = [PermissionResult::allowed(), PermissionResult::loading()];
        let combined = combine(&results, true);
        assert!(!combined.allowed);
        assert!(combined.is_loading);
    }

    #[test]
    fn combine_and_error_fails_closed() {
        let results = [PermissionResult::allowed(), PermissionResult::failed()];
        assert_eq!(combine(&results, true), PermissionResult::failed());
    }

    #[test]
    fn combine_or_allowed_despite_loading() {
        let results = [PermissionResult::loading(), PermissionResult::allowed()];
        assert_eq!(combine(&results, false), PermissionResult::allowed());
    }

    #[test]
    fn combine_or_allowed_despite_error() {
        let results = [PermissionResult::failed(), PermissionResult::allowed()];
        assert_eq!(combine(&results, false), PermissionResult::allowed());
    }

    #[test]
    fn combine_or_all_denied() {
        let results = [PermissionResult::denied(), PermissionResult::denied()];
        assert_eq!(combine(&results, false), PermissionResult::denied());
    }

    #[test]
    fn combine_or_denied_and_loading_is_loading() {
        let results = [PermissionResult::denied(), PermissionResult::loading()];
        assert_eq!(combine(&results, false), PermissionResult::loading());
    }

    #[tokio::test]
    async fn department_grant_implies_own_not_organization() {
        let e = evaluator(vec![Grant::new("user", "create", Scope::Department)]);
        assert!(e.evaluate_one(&spec("user:create:own")).await.allowed);
        assert!(!e.evaluate_one(&spec("user:create:organization")).await.allowed);
    }

    #[tokio::test]
    async fn platform_grant_satisfies_every_scope() {
        let e = evaluator(vec![Grant::new("property", "update", Scope::Platform)]);
        for scope in Scope::ALL {
            let s = PermissionSpec::new("property", "update", scope);
            assert!(e.evaluate_one(&s).await.allowed, "scope {scope}");
        }
    }

    #[tokio::test]
    async fn malformed_spec_is_denied_not_error() {
        let e = evaluator(vec![Grant::new("*", "*", Scope::Platform)]);
        let result = e.evaluate_one(&PermissionSpec::new("", "read", Scope::Own)).await;
        assert_eq!(result, PermissionResult::denied());
    }

    #[tokio::test]
    async fn unauthenticated_is_denied_everywhere() {
        let e = anonymous(vec![Grant::new("*", "*", Scope::Platform)]);
        assert_eq!(
            e.evaluate_one(&spec("user:read")).await,
            PermissionResult::denied()
        );
        assert_eq!(e.evaluate_batch(&[], true).await, PermissionResult::denied());
        assert_eq!(e.evaluate_batch(&[], false).await, PermissionResult::denied());
        assert_eq!(e.decide(&spec("user:read")), PermissionResult::denied());
        assert_eq!(e.decide_batch(&[], false), PermissionResult::denied());
        assert_eq!(e.cache().stats().fetches, 0);
    }

    #[tokio::test]
    async fn empty_batch_is_vacuously_allowed() {
        let e = evaluator(vec![]);
        assert_eq!(e.evaluate_batch(&[], true).await, PermissionResult::allowed());
        assert_eq!(e.evaluate_batch(&[], false).await, PermissionResult::allowed());
        assert_eq!(e.decide_batch(&[], true), PermissionResult::allowed());
    }

    #[tokio::test]
    async fn batch_and_or() {
        let e = evaluator(vec![
            Grant::new("user", "read", Scope::Property),
            Grant::new("department", "read", Scope::Department),
        ]);
        let specs = [spec("user:read:property"), spec("department:update:own")];
        assert!(!e.evaluate_batch(&specs, true).await.allowed);
        assert!(e.evaluate_batch(&specs, false).await.allowed);

        let readable = [spec("user:read:department"), spec("department:read:own")];
        assert!(e.evaluate_batch(&readable, true).await.allowed);
    }

    #[tokio::test]
    async fn decide_reports_loading_then_settles() {
        let e = evaluator(vec![Grant::new("user", "read", Scope::Own)]);
        let s = spec("user:read");

        let first = e.decide(&s);
        assert!(first.is_loading);
        assert!(!first.allowed);

        // Waiting through the async path joins the background fetch.
        assert!(e.evaluate_one(&s).await.allowed);
        assert_eq!(e.decide(&s), PermissionResult::allowed());
        assert_eq!(e.cache().stats().fetches, 1);
    }

    /// `None` stands for a lookup that never completes.
    fn batch_of(
        results: Vec<Option<PermissionResult>>,
    ) -> FuturesUnordered<BoxFuture<'static, PermissionResult>> {
        results
            .into_iter()
            .map(|r| match r {
                Some(result) => future::ready(result).boxed(),
                None => future::pending().boxed(),
            })
            .collect()
    }

    #[tokio::test]
    async fn or_batch_settles_while_a_spec_is_still_pending() {
        let pending = batch_of(vec![
            None,
            Some(PermissionResult::denied()),
            Some(PermissionResult::allowed()),
        ]);
        let result = tokio::time::timeout(Duration::from_secs(1), settle_batch(pending, false))
            .await
            .expect("OR batch waited on a pending spec");
        assert_eq!(result, PermissionResult::allowed());
    }

    #[tokio::test]
    async fn and_batch_settles_on_first_denial_while_a_spec_is_pending() {
        let pending = batch_of(vec![
            None,
            Some(PermissionResult::allowed()),
            Some(PermissionResult::denied()),
        ]);
        let result = tokio::time::timeout(Duration::from_secs(1), settle_batch(pending, true))
            .await
            .expect("AND batch waited on a pending spec");
        assert_eq!(result, PermissionResult::denied());
    }

    #[tokio::test]
    async fn drained_batch_falls_back_to_combine() {
        let pending = batch_of(vec![
            Some(PermissionResult::denied()),
            Some(PermissionResult::failed()),
        ]);
        assert_eq!(settle_batch(pending, false).await, PermissionResult::failed());
    }
}
