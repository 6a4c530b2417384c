//! Short-lived query cache for the read endpoints.
//!
//! The cache maps a [`CacheKey`] to a computed response payload and forgets it
//! once the configured TTL has elapsed. It exposes three core operations:
//!
//! - `TtlCache::get(key)`: return the value if present and fresh; an expired entry
//!   is removed and reported as a miss.
//! - `TtlCache::set(key, value)`: store a value, (re)starting its TTL.
//! - `TtlCache::purge_expired()`: drop every expired entry.
//!
//! Design notes:
//! - Time is measured using `std::time::Instant`, which is monotonic and immune to system
//!   clock changes.
//! - The map lives behind a `Mutex`, so one cache is shared by all request workers.
//!   A poisoned lock is recovered: entries are plain values and stay consistent.
//! - Scheduler writes do not invalidate anything; entries simply age out.
//! - Keys that are never read again would otherwise stay forever, so `set` sweeps
//!   expired entries at most once per TTL.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use log::debug;
use market_common::Provider;

/// Default time-to-live of a cache entry.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Deterministic cache key built from an endpoint and its semantic parameters.
///
/// Two logically identical requests produce the same key: commodity identifiers
/// are trimmed and lower-cased, empty items are dropped, the requested order is kept.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct CacheKey(String);

impl CacheKey {
    /// Key of a price listing. `source == None` means stored quotes.
    pub fn prices(source: Option<Provider>, commodities: &[String]) -> Self {
        let source = source.map_or_else(|| "stored".to_string(), |p| p.to_string());
        CacheKey(format!("prices:{}:{}", source, normalize(commodities)))
    }

    /// Key of a history window.
    pub fn history(commodity: &str, days: u32) -> Self {
        CacheKey(format!("history:{}:{}", commodity.trim().to_lowercase(), days))
    }

    /// Key of a trend report. `category == None` means all categories.
    pub fn trends(category: Option<&str>) -> Self {
        let category = category.map_or_else(|| "all".to_string(), |c| c.trim().to_lowercase());
        CacheKey(format!("trends:{}", category))
    }

    /// Key as text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn normalize(commodities: &[String]) -> String {
    let items: Vec<String> = commodities
        .iter()
        .map(|c| c.trim().to_lowercase())
        .filter(|c| !c.is_empty())
        .collect();
    if items.is_empty() {
        "all".to_string()
    } else {
        items.join(",")
    }
}

/// Internal bookkeeping for one cached value.
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

struct Entries<V> {
    map: HashMap<CacheKey, CacheEntry<V>>,
    last_sweep: Instant,
}

impl<V> Entries<V> {
    fn sweep(&mut self, now: Instant) -> usize {
        let before = self.map.len();
        self.map.retain(|_, entry| entry.expires_at > now);
        self.last_sweep = now;
        before - self.map.len()
    }
}

/// Key-addressed memoization layer with a fixed TTL.
pub struct TtlCache<V> {
    entries: Mutex<Entries<V>>,
    ttl: Duration,
}

impl<V: Clone> TtlCache<V> {
    /// Create a new cache whose entries live for `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(Entries {
                map: HashMap::new(),
                last_sweep: Instant::now(),
            }),
            ttl,
        }
    }

    /// Configured time-to-live.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the value stored under `key` if it has not expired.
    pub fn get(&self, key: &CacheKey) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    /// Store `value` under `key`, replacing any previous entry.
    pub fn set(&self, key: CacheKey, value: V) {
        self.set_at(key, value, Instant::now());
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Instant::now())
    }

    /// Number of physically stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.lock().map.len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.lock().map.is_empty()
    }

    pub(crate) fn get_at(&self, key: &CacheKey, now: Instant) -> Option<V> {
        let mut entries = self.lock();
        match entries.map.get(key) {
            Some(entry) if entry.expires_at > now => Some(entry.value.clone()),
            Some(_) => {
                entries.map.remove(key);
                debug!("Cache entry {} expired", key);
                None
            }
            None => None,
        }
    }

    pub(crate) fn set_at(&self, key: CacheKey, value: V, now: Instant) {
        let expires_at = now + self.ttl;
        let mut entries = self.lock();
        if now.saturating_duration_since(entries.last_sweep) >= self.ttl {
            let removed = entries.sweep(now);
            if removed > 0 {
                debug!("Swept {} expired cache entries", removed);
            }
        }
        entries.map.insert(key, CacheEntry { value, expires_at });
    }

    pub(crate) fn purge_expired_at(&self, now: Instant) -> usize {
        self.lock().sweep(now)
    }

    fn lock(&self) -> MutexGuard<'_, Entries<V>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn key(name: &str) -> CacheKey {
        CacheKey::prices(Some(Provider::Demo), &[name.to_string()])
    }

    #[test]
    fn set_then_get_returns_value() {
        let cache = TtlCache::new(DEFAULT_TTL);
        cache.set(key("wheat"), vec![1, 2, 3]);
        assert_eq!(cache.get(&key("wheat")), Some(vec![1, 2, 3]));
        assert_eq!(cache.get(&key("rice")), None);
    }

    #[test]
    fn entry_is_a_miss_once_ttl_elapsed() {
        let cache = TtlCache::new(Duration::from_secs(300));
        let start = Instant::now();
        cache.set_at(key("wheat"), 42, start);

        assert_eq!(cache.get_at(&key("wheat"), start + Duration::from_secs(299)), Some(42));
        assert_eq!(cache.get_at(&key("wheat"), start + Duration::from_secs(300)), None);
        assert_eq!(cache.len(), 0, "expired entry is dropped lazily on access");
    }

    #[test]
    fn set_restarts_ttl() {
        let cache = TtlCache::new(Duration::from_secs(10));
        let start = Instant::now();
        cache.set_at(key("wheat"), 1, start);
        cache.set_at(key("wheat"), 2, start + Duration::from_secs(8));
        assert_eq!(cache.get_at(&key("wheat"), start + Duration::from_secs(15)), Some(2));
    }

    #[test]
    fn purge_removes_only_expired_entries() {
        let cache = TtlCache::new(Duration::from_millis(10));
        let start = Instant::now();
        cache.set_at(key("wheat"), 1, start);
        cache.set_at(key("rice"), 2, start + Duration::from_millis(5));
        assert_eq!(cache.purge_expired_at(start + Duration::from_millis(12)), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get_at(&key("rice"), start + Duration::from_millis(12)), Some(2));
    }

    #[test]
    fn set_sweeps_keys_that_are_never_read() {
        let cache = TtlCache::new(Duration::from_millis(1));
        let start = Instant::now();
        for i in 0..10_000 {
            cache.set_at(key(&format!("c{i}")), i, start);
        }
        cache.set_at(key("wheat"), 0, start + Duration::from_millis(2));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn set_sweeps_after_real_time_passes() {
        let cache = TtlCache::new(Duration::from_millis(1));
        for i in 0..10_000 {
            cache.set(key(&format!("c{i}")), i);
        }
        thread::sleep(Duration::from_millis(5));
        cache.set(key("wheat"), 0);
        assert!(cache.len() < 100, "{} entries left", cache.len());
    }

    #[test]
    fn keys_are_normalized() {
        let a = CacheKey::prices(Some(Provider::Demo), &["Wheat".into(), " rice ".into()]);
        let b = CacheKey::prices(Some(Provider::Demo), &["wheat".into(), "".into(), "RICE".into()]);
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "prices:demo:wheat,rice");

        assert_eq!(CacheKey::prices(None, &[]).as_str(), "prices:stored:all");
        assert_ne!(
            CacheKey::prices(Some(Provider::ApiNinjas), &[]),
            CacheKey::prices(Some(Provider::Demo), &[])
        );
        assert_eq!(CacheKey::history(" Wheat", 7).as_str(), "history:wheat:7");
        assert_eq!(CacheKey::trends(None), CacheKey::trends(Some("ALL")));
    }

    #[test]
    fn shared_between_threads() {
        let cache = Arc::new(TtlCache::new(DEFAULT_TTL));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    cache.set(key(&format!("c{i}")), i);
                    cache.get(&key(&format!("c{i}")))
                })
            })
            .collect();
        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.join().unwrap(), Some(i));
        }
        assert_eq!(cache.len(), 8);
    }
}
