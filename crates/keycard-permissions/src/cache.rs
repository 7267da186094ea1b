//! Per-user permission-set cache with TTL, request coalescing and invalidation.

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use keycard_types::{ApiError, PermissionSet, PermissionSource, Principal};
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;
use uuid::Uuid;

/// Default staleness window for a fetched permission set.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Cache configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// How long a fetched permission set may be reused.
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl: DEFAULT_TTL }
    }
}

/// Change notifications for subscribers (gates re-decide on these).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    /// A fresh permission set was stored for the user.
    Refreshed { user_id: Uuid },
    /// The fetch for the user failed; checks fail closed until re-triggered.
    Failed { user_id: Uuid },
    /// The user's entry was dropped.
    Invalidated { user_id: Uuid },
    /// Every entry was dropped.
    Cleared,
}

/// What the cache currently knows about one user, without fetching.
#[derive(Debug, Clone)]
pub enum CacheSnapshot {
    Missing,
    Loading,
    Fresh(Arc<PermissionSet>),
    /// Past the TTL. Must not be used for decisions.
    Stale,
    /// The last fetch failed within the TTL.
    Failed(ApiError),
}

/// Cache statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from a fresh entry.
    pub hits: u64,
    /// Lookups that had to start a fetch (missing, stale or failed entry).
    pub misses: u64,
    /// Lookups that joined a fetch already in flight.
    pub coalesced: u64,
    /// Upstream fetches started.
    pub fetches: u64,
    /// Upstream fetches that failed.
    pub failures: u64,
    /// Entries currently held.
    pub entries: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses + self.coalesced;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

type FetchResult = Result<Arc<PermissionSet>, ApiError>;
type SharedFetch = Shared<BoxFuture<'static, FetchResult>>;

enum Lookup {
    Hit(Arc<PermissionSet>),
    InFlight(SharedFetch),
    /// Missing, stale or failed.
    Miss,
}

enum Entry {
    Loading { fetch: SharedFetch, generation: u64 },
    Ready { set: Arc<PermissionSet>, loaded_at: Instant },
    Failed { error: ApiError, failed_at: Instant },
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    coalesced: AtomicU64,
    fetches: AtomicU64,
    failures: AtomicU64,
}

struct Inner {
    source: Arc<dyn PermissionSource>,
    ttl: Duration,
    entries: Mutex<HashMap<Uuid, Entry>>,
    events: broadcast::Sender<CacheEvent>,
    counters: Counters,
    generation: AtomicU64,
}

/// Single owner of every user's permission set.
///
/// Cheap to clone: clones share the same entries. Concurrent lookups for the
/// same user share one upstream fetch. Entries are replaced on refresh, never
/// mutated in place.
#[derive(Clone)]
pub struct PermissionCache {
    inner: Arc<Inner>,
}

impl PermissionCache {
    pub fn new(source: Arc<dyn PermissionSource>, config: CacheConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                source,
                ttl: config.ttl,
                entries: Mutex::new(HashMap::new()),
                events,
                counters: Counters::default(),
                generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }

    pub fn source_name(&self) -> &str {
        self.inner.source.name()
    }

    /// Subscribe to cache change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.inner.events.subscribe()
    }

    /// Return the principal's permission set, fetching it if missing, stale or
    /// previously failed. Joins an in-flight fetch instead of starting another.
    pub async fn get(&self, principal: &Principal) -> FetchResult {
        let fetch = {
            let mut entries = self.inner.lock_entries();
            match self.inner.lookup(&entries, &principal.user_id) {
                Lookup::Hit(set) => {
                    self.inner.counters.hits.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(user_id = %principal.user_id, "permission cache hit");
                    return Ok(set);
                }
                Lookup::InFlight(fetch) => {
                    self.inner.counters.coalesced.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(user_id = %principal.user_id, "joining in-flight permission fetch");
                    fetch
                }
                Lookup::Miss => {
                    self.inner.counters.misses.fetch_add(1, Ordering::Relaxed);
                    self.start_fetch(&mut entries, principal)?
                }
            }
        };
        fetch.await
    }

    /// Force a new fetch for the principal, replacing whatever is cached.
    /// Waiters on an older in-flight fetch still receive its result, but it
    /// is not stored.
    pub async fn refresh(&self, principal: &Principal) -> FetchResult {
        let fetch = {
            let mut entries = self.inner.lock_entries();
            self.start_fetch(&mut entries, principal)?
        };
        fetch.await
    }

    /// Start a background fetch unless one is running or a fresh entry exists.
    /// Returns `false` if no async runtime is available to run it.
    pub fn prefetch(&self, principal: &Principal) -> bool {
        let mut entries = self.inner.lock_entries();
        match self.inner.lookup(&entries, &principal.user_id) {
            Lookup::Hit(_) | Lookup::InFlight(_) => true,
            Lookup::Miss => {
                self.inner.counters.misses.fetch_add(1, Ordering::Relaxed);
                self.start_fetch(&mut entries, principal).is_ok()
            }
        }
    }

    /// Current state for the user, without fetching.
    pub fn snapshot(&self, user_id: &Uuid) -> CacheSnapshot {
        let entries = self.inner.lock_entries();
        match entries.get(user_id) {
            None => CacheSnapshot::Missing,
            Some(Entry::Loading { .. }) => CacheSnapshot::Loading,
            Some(Entry::Ready { set, loaded_at }) => {
                if loaded_at.elapsed() <= self.inner.ttl {
                    CacheSnapshot::Fresh(Arc::clone(set))
                } else {
                    CacheSnapshot::Stale
                }
            }
            Some(Entry::Failed { error, failed_at }) => {
                if failed_at.elapsed() <= self.inner.ttl {
                    CacheSnapshot::Failed(error.clone())
                } else {
                    CacheSnapshot::Stale
                }
            }
        }
    }

    /// Drop the user's entry. The next lookup fetches again.
    pub fn invalidate(&self, user_id: &Uuid) {
        let removed = self.inner.lock_entries().remove(user_id).is_some();
        if removed {
            tracing::debug!(%user_id, "permission cache entry invalidated");
            let _ = self.inner.events.send(CacheEvent::Invalidated { user_id: *user_id });
        }
    }

    /// Drop every entry.
    pub fn invalidate_all(&self) {
        self.inner.lock_entries().clear();
        tracing::debug!("permission cache cleared");
        let _ = self.inner.events.send(CacheEvent::Cleared);
    }

    pub fn stats(&self) -> CacheStats {
        let c = &self.inner.counters;
        CacheStats {
            hits: c.hits.load(Ordering::Relaxed),
            misses: c.misses.load(Ordering::Relaxed),
            coalesced: c.coalesced.load(Ordering::Relaxed),
            fetches: c.fetches.load(Ordering::Relaxed),
            failures: c.failures.load(Ordering::Relaxed),
            entries: self.inner.lock_entries().len(),
        }
    }

    /// Spawn the upstream fetch and record it as the user's in-flight entry.
    /// Must be called with the entries lock held so only one fetch is started.
    fn start_fetch(
        &self,
        entries: &mut HashMap<Uuid, Entry>,
        principal: &Principal,
    ) -> Result<SharedFetch, ApiError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| ApiError::Internal(format!("no async runtime for permission fetch: {e}")))?;

        let generation = self.inner.generation.fetch_add(1, Ordering::Relaxed) + 1;
        self.inner.counters.fetches.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            user_id = %principal.user_id,
            source = self.inner.source.name(),
            generation,
            "fetching permission set"
        );

        // The task runs to completion even if every waiter goes away; its
        // result is then simply stored (or dropped if superseded).
        let task_inner = Arc::clone(&self.inner);
        let task_principal = principal.clone();
        let handle =
            runtime.spawn(async move { task_inner.run_fetch(task_principal, generation).await });

        // Weak: this future is stored in the entry map it would otherwise keep alive.
        let inner = Arc::downgrade(&self.inner);
        let user_id = principal.user_id;
        let fetch: SharedFetch = async move {
            match handle.await {
                Ok(result) => result,
                // Cancelled before settling (runtime shutdown).
                Err(e) => {
                    let error = ApiError::Internal(format!("permission fetch task failed: {e}"));
                    match inner.upgrade() {
                        Some(inner) => inner.finish(user_id, generation, Err(error)),
                        None => Err(error),
                    }
                }
            }
        }
        .boxed()
        .shared();

        entries.insert(
            principal.user_id,
            Entry::Loading {
                fetch: fetch.clone(),
                generation,
            },
        );
        Ok(fetch)
    }
}

impl Inner {
    fn lookup(&self, entries: &HashMap<Uuid, Entry>, user_id: &Uuid) -> Lookup {
        match entries.get(user_id) {
            Some(Entry::Ready { set, loaded_at }) if loaded_at.elapsed() <= self.ttl => {
                Lookup::Hit(Arc::clone(set))
            }
            Some(Entry::Loading { fetch, .. }) => Lookup::InFlight(fetch.clone()),
            _ => Lookup::Miss,
        }
    }

    fn lock_entries(&self) -> MutexGuard<'_, HashMap<Uuid, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn run_fetch(&self, principal: Principal, generation: u64) -> FetchResult {
        let result = match AssertUnwindSafe(self.source.fetch_grants(&principal))
            .catch_unwind()
            .await
        {
            Ok(fetched) => fetched.map(|grants| Arc::new(PermissionSet::new(grants))),
            Err(_) => Err(ApiError::Internal(format!(
                "permission source '{}' panicked",
                self.source.name()
            ))),
        };
        self.finish(principal.user_id, generation, result)
    }

    /// Record a fetch outcome. Only the entry this fetch created is settled;
    /// a later refresh or an invalidation wins.
    fn finish(&self, user_id: Uuid, generation: u64, result: FetchResult) -> FetchResult {
        let stored = {
            let mut entries = self.lock_entries();
            let current = matches!(
                entries.get(&user_id),
                Some(Entry::Loading { generation: g, .. }) if *g == generation
            );
            if current {
                let entry = match &result {
                    Ok(set) => Entry::Ready {
                        set: Arc::clone(set),
                        loaded_at: Instant::now(),
                    },
                    Err(error) => Entry::Failed {
                        error: error.clone(),
                        failed_at: Instant::now(),
                    },
                };
                entries.insert(user_id, entry);
            }
            current
        };

        match &result {
            Ok(set) => {
                tracing::debug!(%user_id, grants = set.len(), stored, "permission set fetched");
                if stored {
                    let _ = self.events.send(CacheEvent::Refreshed { user_id });
                }
            }
            Err(e) => {
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(%user_id, "permission fetch failed: {e}");
                if stored {
                    let _ = self.events.send(CacheEvent::Failed { user_id });
                }
            }
        }

        result
    }
}
