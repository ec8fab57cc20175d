//! TTL response cache with tags, kinds and single-flight loading

use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::key::{CacheKey, CacheKind};
use crate::config::CacheConfig;
use crate::core::error::Result;

/// Where a response came from; sent as the `x-cache` header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "hit",
            CacheStatus::Miss => "miss",
        }
    }
}

/// What a loader hands back: the body and the tags it depends on
#[derive(Debug, Clone)]
pub struct Loaded {
    pub value: Value,
    pub tags: Vec<String>,
}

impl Loaded {
    pub fn new(value: Value, tags: Vec<String>) -> Self {
        Self { value, tags }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    pub enabled: bool,
    pub entries: usize,
    pub max_entries: usize,
    pub entries_by_kind: HashMap<CacheKind, usize>,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub invalidations: u64,
}

#[derive(Debug)]
struct Entry {
    value: Value,
    kind: CacheKind,
    tags: HashSet<String>,
    expires_at: Instant,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Default)]
struct State {
    entries: HashMap<CacheKey, Entry>,
    /// Bumped by every invalidation; loads started under an older epoch are not stored
    epoch: u64,
    hits: u64,
    misses: u64,
    evictions: u64,
    invalidations: u64,
}

impl State {
    fn remove_where(&mut self, mut pred: impl FnMut(&CacheKey, &Entry) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|k, e| !pred(k, e));
        before - self.entries.len()
    }

    fn purge_expired(&mut self, now: Instant) -> usize {
        self.remove_where(|_, e| e.is_expired(now))
    }

    fn invalidated(&mut self, removed: usize) -> usize {
        self.epoch += 1;
        self.invalidations += removed as u64;
        removed
    }
}

struct Inner {
    config: CacheConfig,
    state: Mutex<State>,
    /// One gate per key being loaded
    loads: Mutex<HashMap<CacheKey, Arc<AsyncMutex<()>>>>,
}

/// In-process response cache
///
/// Cloning is cheap and shares the same entries.
///
/// # Example
///
/// ```rust,ignore
/// let (body, status) = cache
///     .get_or_load(CacheKey::categories(), CacheKind::Categories, || async {
///         let categories = stores.products.categories().await?;
///         Ok(Loaded::new(serde_json::to_value(categories)?, vec![]))
///     })
///     .await?;
/// ```
#[derive(Clone)]
pub struct ResponseCache {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("enabled", &self.inner.config.enabled)
            .field("max_entries", &self.inner.config.max_entries)
            .finish_non_exhaustive()
    }
}

/// Holds a key's load gate; releases the gate entry when dropped, even if
/// the loading future is cancelled
struct LoadSlot<'a> {
    cache: &'a ResponseCache,
    key: CacheKey,
    gate: Arc<AsyncMutex<()>>,
    permit: Option<OwnedMutexGuard<()>>,
}

impl Drop for LoadSlot<'_> {
    fn drop(&mut self) {
        self.permit.take();
        if let Ok(mut loads) = self.cache.inner.loads.lock() {
            // Map entry plus ours: nobody else is waiting
            if Arc::strong_count(&self.gate) <= 2 {
                loads.remove(&self.key);
            }
        }
    }
}

impl ResponseCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                state: Mutex::new(State::default()),
                loads: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.config.enabled
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    // A poisoned lock only means a panic mid-update of plain maps
    fn state(&self) -> MutexGuard<'_, State> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lookup(&self, key: &CacheKey) -> Option<Value> {
        let now = Instant::now();
        let mut state = self.state();
        match state.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => Some(entry.value.clone()),
            Some(_) => {
                state.entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn record(&self, status: CacheStatus) {
        let mut state = self.state();
        match status {
            CacheStatus::Hit => state.hits += 1,
            CacheStatus::Miss => state.misses += 1,
        }
    }

    /// Fresh value for a key; expired entries are dropped and count as misses
    pub fn get(&self, key: &CacheKey) -> Option<Value> {
        let found = self.lookup(key);
        self.record(if found.is_some() {
            CacheStatus::Hit
        } else {
            CacheStatus::Miss
        });
        found
    }

    /// Store a value with the TTL of its kind
    pub fn insert(&self, key: CacheKey, kind: CacheKind, tags: Vec<String>, value: Value) {
        if !self.is_enabled() {
            return;
        }
        let mut state = self.state();
        self.store(&mut state, key, kind, tags, value);
    }

    fn store(
        &self,
        state: &mut State,
        key: CacheKey,
        kind: CacheKind,
        tags: Vec<String>,
        value: Value,
    ) {
        let now = Instant::now();
        let max = self.inner.config.max_entries.max(1);

        if !state.entries.contains_key(&key) && state.entries.len() >= max {
            state.purge_expired(now);

            if state.entries.len() >= max {
                let mut by_expiry: Vec<(Instant, CacheKey)> = state
                    .entries
                    .iter()
                    .map(|(k, e)| (e.expires_at, k.clone()))
                    .collect();
                by_expiry.sort_by(|a, b| a.0.cmp(&b.0));

                let excess = state.entries.len() + 1 - max;
                for (_, victim) in by_expiry.into_iter().take(excess) {
                    state.entries.remove(&victim);
                    state.evictions += 1;
                }
            }
        }

        state.entries.insert(
            key,
            Entry {
                value,
                kind,
                tags: tags.into_iter().collect(),
                expires_at: now + self.inner.config.ttl_for(kind),
            },
        );
    }

    /// Serve from cache or run `load` once per key, storing its result
    ///
    /// Concurrent callers for the same key wait for the first loader and
    /// then read its result. A load that overlaps any invalidation still
    /// answers its caller but is not stored.
    pub async fn get_or_load<F, Fut>(
        &self,
        key: CacheKey,
        kind: CacheKind,
        load: F,
    ) -> Result<(Value, CacheStatus)>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Loaded>>,
    {
        if !self.is_enabled() {
            let loaded = load().await?;
            self.record(CacheStatus::Miss);
            return Ok((loaded.value, CacheStatus::Miss));
        }

        if let Some(value) = self.lookup(&key) {
            self.record(CacheStatus::Hit);
            return Ok((value, CacheStatus::Hit));
        }

        let gate = {
            let mut loads = self
                .inner
                .loads
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            loads.entry(key.clone()).or_default().clone()
        };
        let mut slot = LoadSlot {
            cache: self,
            key: key.clone(),
            permit: None,
            gate: gate.clone(),
        };
        slot.permit = Some(gate.lock_owned().await);

        // Another caller may have filled the entry while we waited
        if let Some(value) = self.lookup(&key) {
            self.record(CacheStatus::Hit);
            return Ok((value, CacheStatus::Hit));
        }

        let epoch = self.state().epoch;
        let loaded = load().await?;

        let mut state = self.state();
        state.misses += 1;
        if state.epoch == epoch {
            self.store(&mut state, key, kind, loaded.tags, loaded.value.clone());
        } else {
            tracing::debug!(key = %slot.key, "cache load raced an invalidation, not storing");
        }
        drop(state);

        Ok((loaded.value, CacheStatus::Miss))
    }

    /// Drop every entry carrying `tag`
    pub fn invalidate_tag(&self, tag: &str) -> usize {
        let mut state = self.state();
        let removed = state.remove_where(|_, e| e.tags.contains(tag));
        state.invalidated(removed)
    }

    pub fn invalidate_kind(&self, kind: CacheKind) -> usize {
        let mut state = self.state();
        let removed = state.remove_where(|_, e| e.kind == kind);
        state.invalidated(removed)
    }

    pub fn invalidate_key(&self, key: &CacheKey) -> bool {
        let mut state = self.state();
        let removed = usize::from(state.entries.remove(key).is_some());
        state.invalidated(removed) == 1
    }

    pub fn flush(&self) -> usize {
        let mut state = self.state();
        let removed = state.entries.len();
        state.entries.clear();
        state.invalidated(removed)
    }

    /// Remove expired entries; returns how many went
    pub fn purge_expired(&self) -> usize {
        self.state().purge_expired(Instant::now())
    }

    pub fn len(&self) -> usize {
        self.state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.state();
        let mut entries_by_kind: HashMap<CacheKind, usize> =
            CacheKind::ALL.iter().map(|k| (*k, 0)).collect();
        for entry in state.entries.values() {
            *entries_by_kind.entry(entry.kind).or_default() += 1;
        }

        CacheStats {
            enabled: self.is_enabled(),
            entries: state.entries.len(),
            max_entries: self.inner.config.max_entries,
            entries_by_kind,
            hits: state.hits,
            misses: state.misses,
            evictions: state.evictions,
            invalidations: state.invalidations,
        }
    }

    /// Purge expired entries on a fixed interval until the task is aborted
    pub fn spawn_purge_task(&self, every: Duration) -> JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let purged = cache.purge_expired();
                if purged > 0 {
                    tracing::debug!(purged, "purged expired cache entries");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn config() -> CacheConfig {
        CacheConfig {
            product_list_ttl_secs: 10,
            product_detail_ttl_secs: 60,
            categories_ttl_secs: 60,
            max_entries: 100,
            ..CacheConfig::default()
        }
    }

    fn key(name: &str) -> CacheKey {
        CacheKey::new(format!("/t/{name}"), "")
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire_after_their_kind_ttl() {
        let cache = ResponseCache::new(config());
        cache.insert(key("list"), CacheKind::ProductList, vec![], json!(1));
        cache.insert(key("detail"), CacheKind::ProductDetail, vec![], json!(2));

        tokio::time::advance(Duration::from_secs(11)).await;

        assert_eq!(cache.get(&key("list")), None);
        assert_eq!(cache.get(&key("detail")), Some(json!(2)));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let cache = ResponseCache::new(config());
        cache.insert(key("a"), CacheKind::ProductList, vec![], json!(1));
        cache.insert(key("b"), CacheKind::Categories, vec![], json!(2));

        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_task_drops_expired_entries_unread() {
        let cache = ResponseCache::new(config());
        cache.insert(key("list"), CacheKind::ProductList, vec![], json!(1));
        cache.insert(key("cats"), CacheKind::Categories, vec![], json!(2));

        let task = cache.spawn_purge_task(Duration::from_secs(5));

        // Paused clock: sleeping lets the ticks at 5s and 10s run first
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(cache.len(), 2);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().misses, 0);

        task.abort();
    }

    #[tokio::test]
    async fn test_invalidate_by_tag_and_kind() {
        let cache = ResponseCache::new(config());
        cache.insert(
            key("p1"),
            CacheKind::ProductDetail,
            vec!["product:1".into()],
            json!("p1"),
        );
        cache.insert(
            key("list"),
            CacheKind::ProductList,
            vec!["product:1".into(), "product:2".into()],
            json!("list"),
        );
        cache.insert(key("cats"), CacheKind::Categories, vec![], json!("cats"));

        assert_eq!(cache.invalidate_tag("product:1"), 2);
        assert_eq!(cache.len(), 1);

        assert_eq!(cache.invalidate_kind(CacheKind::Categories), 1);
        assert!(cache.is_empty());
        assert_eq!(cache.stats().invalidations, 3);
    }

    #[tokio::test]
    async fn test_capacity_evicts_closest_to_expiry() {
        let cache = ResponseCache::new(CacheConfig {
            max_entries: 2,
            ..config()
        });
        cache.insert(key("short"), CacheKind::ProductList, vec![], json!(1));
        cache.insert(key("long"), CacheKind::Categories, vec![], json!(2));
        cache.insert(key("new"), CacheKind::ProductDetail, vec![], json!(3));

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&key("short")), None);
        assert!(cache.get(&key("long")).is_some());
        assert_eq!(cache.stats().evictions, 1);
    }

    #[tokio::test]
    async fn test_get_or_load_hits_after_first_load() {
        let cache = ResponseCache::new(config());
        let calls = AtomicUsize::new(0);

        for expected in [CacheStatus::Miss, CacheStatus::Hit] {
            let (value, status) = cache
                .get_or_load(key("k"), CacheKind::ProductList, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(Loaded::new(json!({"n": 1}), vec![]))
                })
                .await
                .unwrap();
            assert_eq!(value, json!({"n": 1}));
            assert_eq!(status, expected);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_single_flight_per_key() {
        let cache = ResponseCache::new(config());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..10 {
            let cache = cache.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_load(key("slow"), CacheKind::ProductList, || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok(Loaded::new(json!("done"), vec![]))
                    })
                    .await
                    .unwrap()
            }));
        }

        let mut misses = 0;
        for handle in handles {
            let (value, status) = handle.await.unwrap();
            assert_eq!(value, json!("done"));
            if status == CacheStatus::Miss {
                misses += 1;
            }
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(misses, 1);
        assert!(cache.inner.loads.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_load_overlapping_invalidation_is_not_stored() {
        let cache = ResponseCache::new(config());
        let during = cache.clone();

        let (value, _) = cache
            .get_or_load(key("k"), CacheKind::ProductDetail, || async move {
                // A write lands while the loader is reading
                during.invalidate_tag("product:1");
                Ok(Loaded::new(json!("stale"), vec!["product:1".into()]))
            })
            .await
            .unwrap();

        assert_eq!(value, json!("stale"));
        assert_eq!(cache.get(&key("k")), None);
    }

    #[tokio::test]
    async fn test_failed_load_is_not_stored() {
        let cache = ResponseCache::new(config());
        let result = cache
            .get_or_load(key("k"), CacheKind::ProductDetail, || async {
                Err(crate::core::error::ApiError::internal("boom"))
            })
            .await;

        assert!(result.is_err());
        assert!(cache.is_empty());
        assert!(cache.inner.loads.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_disabled_cache_always_loads() {
        let cache = ResponseCache::new(CacheConfig {
            enabled: false,
            ..config()
        });
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let (_, status) = cache
                .get_or_load(key("k"), CacheKind::Categories, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(Loaded::new(json!([]), vec![]))
                })
                .await
                .unwrap();
            assert_eq!(status, CacheStatus::Miss);
        }

        cache.insert(key("x"), CacheKind::Categories, vec![], json!(1));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(cache.is_empty());
    }
}
