// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use futures::lock::Mutex as AsyncMutex;
use parking_lot::Mutex;
use sundial::Clock;

use crate::{Priority, RequestShape};

/// Configuration for a [`Deduplicator`].
///
/// The response-cache TTL scales with each request's [`Priority`]:
///
/// | Priority | Default TTL |
/// |----------|-------------|
/// | `Low`    | 30 seconds  |
/// | `Normal` | 2 minutes   |
/// | `High`   | 5 minutes   |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupOptions {
    low_ttl: Duration,
    normal_ttl: Duration,
    high_ttl: Duration,
}

impl Default for DedupOptions {
    fn default() -> Self {
        Self {
            low_ttl: Duration::from_secs(30),
            normal_ttl: Duration::from_secs(120),
            high_ttl: Duration::from_secs(300),
        }
    }
}

impl DedupOptions {
    /// Creates options with the documented defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the cache TTL for [`Priority::Low`] responses.
    #[must_use]
    pub const fn low_ttl(mut self, ttl: Duration) -> Self {
        self.low_ttl = ttl;
        self
    }

    /// Sets the cache TTL for [`Priority::Normal`] responses.
    #[must_use]
    pub const fn normal_ttl(mut self, ttl: Duration) -> Self {
        self.normal_ttl = ttl;
        self
    }

    /// Sets the cache TTL for [`Priority::High`] responses.
    #[must_use]
    pub const fn high_ttl(mut self, ttl: Duration) -> Self {
        self.high_ttl = ttl;
        self
    }

    const fn ttl_for(&self, priority: Priority) -> Duration {
        match priority {
            Priority::Low => self.low_ttl,
            Priority::Normal => self.normal_ttl,
            Priority::High => self.high_ttl,
        }
    }
}

/// A snapshot of a deduplicator's cache and traffic counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DedupMetrics {
    /// Cached responses currently held.
    pub entries: usize,

    /// Approximate memory held by cached responses, per the configured weigher.
    pub approx_bytes: usize,

    /// Cacheable calls served from the response cache.
    pub hits: u64,

    /// Cacheable calls that had to execute.
    pub misses: u64,

    /// Callers that joined an execution already in flight.
    pub collapsed: u64,
}

/// The slot a leader publishes its result into and followers wait on.
///
/// The leader holds the async lock while executing, so followers block on `lock().await`
/// until the result lands. If the leader is dropped mid-flight the lock releases, and the
/// first follower to acquire it finds the cell empty and promotes itself to leader.
struct Slot<V, E> {
    cell: AsyncMutex<Option<Result<V, E>>>,
}

struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
    priority: Priority,
    weight: usize,
}

type Weigher<V> = Arc<dyn Fn(&V) -> usize + Send + Sync>;

/// Collapses concurrent identical requests and caches their responses.
///
/// `V` is the shared response type and `E` the shared error type; both must be `Clone` so a
/// single outcome can fan out to every collapsed caller. See the [crate documentation]
/// [crate] for the invariants and an example.
pub struct Deduplicator<V, E> {
    in_flight: Mutex<HashMap<String, Weak<Slot<V, E>>>>,
    cache: Mutex<HashMap<String, CacheEntry<V>>>,
    /// Bumped by invalidation; an in-flight execution only stores its result when the
    /// generation it started under is still current.
    generation: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    collapsed: AtomicU64,
    weigher: Option<Weigher<V>>,
    options: DedupOptions,
    clock: Clock,
}

impl<V: Clone, E: Clone> Deduplicator<V, E> {
    /// Creates a deduplicator.
    #[must_use]
    pub fn new(options: DedupOptions, clock: &Clock) -> Self {
        Self {
            in_flight: Mutex::new(HashMap::new()),
            cache: Mutex::new(HashMap::new()),
            generation: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            collapsed: AtomicU64::new(0),
            weigher: None,
            options,
            clock: clock.clone(),
        }
    }

    /// Sets the function used to estimate a cached response's memory weight.
    ///
    /// Without a weigher, every entry counts as `size_of::<V>()`.
    #[must_use]
    pub fn with_weigher(mut self, weigher: impl Fn(&V) -> usize + Send + Sync + 'static) -> Self {
        self.weigher = Some(Arc::new(weigher));
        self
    }

    /// Runs `operation` under deduplication.
    ///
    /// A fresh cached response for the same signature is returned without invoking
    /// `operation`. Otherwise the caller either becomes the leader (executing the
    /// operation) or a follower of an execution already in flight; all callers for one
    /// signature receive the same resolved value or the same error.
    ///
    /// # Errors
    ///
    /// Returns the shared execution's error, delivered identically to every collapsed
    /// caller. The failed entry is removed so a subsequent call retries.
    pub async fn execute<F, Fut>(&self, shape: &RequestShape, operation: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let key = shape.signature().into_string();
        let cacheable = shape.is_cacheable();

        if cacheable {
            if let Some(value) = self.cache_lookup(&key) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(value);
            }
            self.misses.fetch_add(1, Ordering::Relaxed);
        }

        let generation = self.generation.load(Ordering::Acquire);
        let slot = self.join_or_lead(&key);

        let mut cell = slot.cell.lock().await;
        if let Some(result) = cell.as_ref() {
            return result.clone();
        }

        // The cell is empty and we hold its lock: execute as the leader while followers
        // block on the lock.
        let result = operation().await;
        *cell = Some(result.clone());
        drop(cell);

        self.in_flight.lock().remove(&key);
        if cacheable && let Ok(value) = &result {
            self.store(key, value.clone(), shape.cache_priority(), generation);
        }

        result
    }

    /// Removes cached responses and in-flight registrations whose signature contains
    /// `pattern`. Returns the number of cache entries dropped.
    ///
    /// Call after a mutation so stale reads are refetched (a cart write invalidates
    /// `"/cart"`). Executions already in flight keep running and still resolve their
    /// callers, but their results no longer enter the cache.
    pub fn invalidate_matching(&self, pattern: &str) -> usize {
        self.generation.fetch_add(1, Ordering::AcqRel);

        let removed = {
            let mut cache = self.cache.lock();
            let before = cache.len();
            cache.retain(|key, _| !key.contains(pattern));
            before - cache.len()
        };
        self.in_flight.lock().retain(|key, _| !key.contains(pattern));

        tracing::debug!(pattern, removed, "invalidated cached responses");
        removed
    }

    /// Drops every cached response and zeroes the traffic counters.
    ///
    /// In-flight executions are unaffected and still resolve their callers.
    pub fn clear_cache(&self) {
        self.cache.lock().clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.collapsed.store(0, Ordering::Relaxed);
    }

    /// Removes expired cache entries and returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.instant();
        let mut cache = self.cache.lock();
        let before = cache.len();
        cache.retain(|_, entry| now < entry.expires_at);
        before - cache.len()
    }

    /// Removes cached responses below `keep`, the memory-pressure relief valve.
    ///
    /// `evict_below(Priority::Normal)` drops low-priority entries;
    /// `evict_below(Priority::High)` keeps only high-priority ones.
    pub fn evict_below(&self, keep: Priority) -> usize {
        let mut cache = self.cache.lock();
        let before = cache.len();
        cache.retain(|_, entry| entry.priority >= keep);
        before - cache.len()
    }

    /// Returns a snapshot of cache size and traffic counters.
    #[must_use]
    pub fn metrics(&self) -> DedupMetrics {
        let cache = self.cache.lock();
        DedupMetrics {
            entries: cache.len(),
            approx_bytes: cache.values().map(|entry| entry.weight).sum(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            collapsed: self.collapsed.load(Ordering::Relaxed),
        }
    }

    fn cache_lookup(&self, key: &str) -> Option<V> {
        let now = self.clock.instant();
        let mut cache = self.cache.lock();
        match cache.get(key) {
            Some(entry) if now < entry.expires_at => Some(entry.value.clone()),
            Some(_) => {
                cache.remove(key);
                None
            }
            None => None,
        }
    }

    fn join_or_lead(&self, key: &str) -> Arc<Slot<V, E>> {
        let mut in_flight = self.in_flight.lock();
        if let Some(existing) = in_flight.get(key)
            && let Some(slot) = existing.upgrade()
        {
            self.collapsed.fetch_add(1, Ordering::Relaxed);
            return slot;
        }

        // No live execution for this signature; register one. Only a weak reference is
        // kept so an execution abandoned by every caller does not pin its slot.
        let slot = Arc::new(Slot {
            cell: AsyncMutex::new(None),
        });
        in_flight.insert(key.to_string(), Arc::downgrade(&slot));
        slot
    }

    fn store(&self, key: String, value: V, priority: Priority, generation: u64) {
        if self.generation.load(Ordering::Acquire) != generation {
            // Invalidated while in flight; the result may describe pre-mutation state.
            return;
        }

        let weight = self
            .weigher
            .as_ref()
            .map_or(std::mem::size_of::<V>(), |weigher| weigher(&value));
        let expires_at = self.clock.instant() + self.options.ttl_for(priority);

        self.cache.lock().insert(
            key,
            CacheEntry {
                value,
                expires_at,
                priority,
                weight,
            },
        );
    }
}

impl<V, E> Debug for Deduplicator<V, E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deduplicator")
            .field("in_flight", &self.in_flight.lock().len())
            .field("cached", &self.cache.lock().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;
    use sundial::ClockControl;

    use super::*;
    use crate::RequestShape;

    type TestDedup = Deduplicator<String, String>;

    fn dedup_with_control() -> (TestDedup, ClockControl) {
        let control = ClockControl::new();
        let clock = control.to_clock();
        (Deduplicator::new(DedupOptions::default(), &clock), control)
    }

    #[test]
    fn cached_response_expires_by_priority() {
        let (dedup, control) = dedup_with_control();
        let shape = RequestShape::get("/products").priority(Priority::Low);

        let result = block_on(dedup.execute(&shape, || async { Ok("v1".to_string()) }));
        assert_eq!(result.as_deref(), Ok("v1"));

        // Still inside the low-priority 30s window.
        control.advance(Duration::from_secs(29));
        let result = block_on(dedup.execute(&shape, || async { Ok("v2".to_string()) }));
        assert_eq!(result.as_deref(), Ok("v1"));

        // Past the window: the operation runs again.
        control.advance(Duration::from_secs(2));
        let result = block_on(dedup.execute(&shape, || async { Ok("v2".to_string()) }));
        assert_eq!(result.as_deref(), Ok("v2"));
    }

    #[test]
    fn mutations_collapse_but_never_cache() {
        let (dedup, _control) = dedup_with_control();
        let shape = RequestShape::new(http::Method::POST, "/cart/items")
            .json_body(serde_json::json!({"product_id": "7"}));

        let first = block_on(dedup.execute(&shape, || async { Ok("created".to_string()) }));
        assert_eq!(first.as_deref(), Ok("created"));

        // A sequential repeat is a fresh execution, not a cache hit.
        let second = block_on(dedup.execute(&shape, || async { Ok("created again".to_string()) }));
        assert_eq!(second.as_deref(), Ok("created again"));
        assert_eq!(dedup.metrics().entries, 0);
    }

    #[test]
    fn failure_is_not_cached_and_retries() {
        let (dedup, _control) = dedup_with_control();
        let shape = RequestShape::get("/products");

        let failed = block_on(dedup.execute(&shape, || async { Err("boom".to_string()) }));
        assert_eq!(failed.as_deref().map_err(String::as_str), Err("boom"));

        let retried = block_on(dedup.execute(&shape, || async { Ok("ok".to_string()) }));
        assert_eq!(retried.as_deref(), Ok("ok"));
    }

    #[test]
    fn invalidation_by_substring_drops_matching_entries() {
        let (dedup, _control) = dedup_with_control();
        let cart = RequestShape::get("/cart?user=u1");
        let products = RequestShape::get("/products");

        block_on(dedup.execute(&cart, || async { Ok("cart".to_string()) })).unwrap();
        block_on(dedup.execute(&products, || async { Ok("catalog".to_string()) })).unwrap();
        assert_eq!(dedup.metrics().entries, 2);

        assert_eq!(dedup.invalidate_matching("/cart"), 1);

        // The cart read refetches; the products read is still served from cache.
        let cart_again = block_on(dedup.execute(&cart, || async { Ok("fresh cart".to_string()) }));
        assert_eq!(cart_again.as_deref(), Ok("fresh cart"));
        let products_again = block_on(dedup.execute(&products, || async { unreachable!() }));
        assert_eq!(products_again.as_deref(), Ok("catalog"));
    }

    #[test]
    fn clear_cache_resets_entries_and_counters() {
        let (dedup, _control) = dedup_with_control();
        let shape = RequestShape::get("/products");

        block_on(dedup.execute(&shape, || async { Ok("v".to_string()) })).unwrap();
        block_on(dedup.execute(&shape, || async { unreachable!() })).unwrap();
        assert_eq!(dedup.metrics().hits, 1);

        dedup.clear_cache();
        let metrics = dedup.metrics();
        assert_eq!(metrics.entries, 0);
        assert_eq!(metrics.hits, 0);
        assert_eq!(metrics.misses, 0);
    }

    #[test]
    fn eviction_respects_priority_order() {
        let (dedup, _control) = dedup_with_control();

        for (path, priority) in [
            ("/a", Priority::Low),
            ("/b", Priority::Normal),
            ("/c", Priority::High),
        ] {
            let shape = RequestShape::get(path).priority(priority);
            block_on(dedup.execute(&shape, || async { Ok("v".to_string()) })).unwrap();
        }

        assert_eq!(dedup.evict_below(Priority::Normal), 1);
        assert_eq!(dedup.metrics().entries, 2);
        assert_eq!(dedup.evict_below(Priority::High), 1);
        assert_eq!(dedup.metrics().entries, 1);
    }

    #[test]
    fn weigher_feeds_memory_estimate() {
        let control = ClockControl::new();
        let clock = control.to_clock();
        let dedup: TestDedup =
            Deduplicator::new(DedupOptions::default(), &clock).with_weigher(|value: &String| value.len());

        let shape = RequestShape::get("/products");
        block_on(dedup.execute(&shape, || async { Ok("12345".to_string()) })).unwrap();

        assert_eq!(dedup.metrics().approx_bytes, 5);
    }

    #[test]
    fn purge_expired_only_drops_stale_entries() {
        let (dedup, control) = dedup_with_control();

        let short = RequestShape::get("/short").priority(Priority::Low);
        let long = RequestShape::get("/long").priority(Priority::High);
        block_on(dedup.execute(&short, || async { Ok("a".to_string()) })).unwrap();
        block_on(dedup.execute(&long, || async { Ok("b".to_string()) })).unwrap();

        control.advance(Duration::from_secs(60));
        assert_eq!(dedup.purge_expired(), 1);
        assert_eq!(dedup.metrics().entries, 1);
    }
}
