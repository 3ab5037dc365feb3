//! Keyed, time-expiring memoization of query results
//!
//! Entries are keyed by the query identity plus its resolved parameters
//! ([`QueryKey`]) and expire a fixed [`Ttl`] after they were stored. Time comes
//! from an injected [`Clock`] so expiry can be tested without sleeping.
//!
//! The table lock is never held while a producer runs: concurrent misses for
//! the same key may each run the producer, and the last write wins. Producers
//! are idempotent reads, so this only costs duplicate work.

use super::ReadingStore;
use crate::config::ConnectionDescriptor;
use crate::error::DataAccessError;
use crate::types::{DeviceRecord, InstrumentSchema, RawReading};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }

    /// Move the clock forward
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Lifetime of a cache entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// Kept until the process exits or the cache is cleared
    Never,
    /// Expires this long after it was stored
    After(Duration),
}

impl Ttl {
    fn expires_at(self, now: Instant) -> Option<Instant> {
        match self {
            Ttl::Never => None,
            Ttl::After(ttl) => now.checked_add(ttl),
        }
    }
}

impl From<Option<Duration>> for Ttl {
    fn from(ttl: Option<Duration>) -> Self {
        ttl.map_or(Ttl::Never, Ttl::After)
    }
}

/// Identity of a cached query and its parameters
///
/// `start: None` is the "no start date supplied" sentinel and is a distinct
/// key from every concrete date.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    DeviceCatalog {
        source: String,
    },
    Readings {
        source: String,
        schema: String,
        device_id: i64,
        start: Option<NaiveDate>,
    },
}

struct CacheEntry<V> {
    value: V,
    expires_at: Option<Instant>,
}

impl<V> CacheEntry<V> {
    fn is_fresh(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

/// Hit/miss counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// Time-expiring cache
pub struct QueryCache<K, V> {
    entries: RwLock<HashMap<K, CacheEntry<V>>>,
    clock: Arc<dyn Clock>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<K, V> QueryCache<K, V>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
    V: Clone,
{
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Fresh value for `key`, if any
    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .get(key)
            .filter(|entry| entry.is_fresh(now))
            .map(|entry| entry.value.clone())
    }

    /// Store a value with a fresh expiry, replacing any previous entry
    pub fn insert(&self, key: K, value: V, ttl: Ttl) {
        let expires_at = ttl.expires_at(self.clock.now());
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(key, CacheEntry { value, expires_at });
    }

    /// Return the cached value or run `producer` and cache its result
    pub fn cached<F>(&self, key: K, ttl: Ttl, producer: F) -> V
    where
        F: FnOnce() -> V,
    {
        match self.try_cached(key, ttl, || Ok::<V, std::convert::Infallible>(producer())) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    /// Like [`cached`](Self::cached), but failed producers are not stored
    pub fn try_cached<F, E>(&self, key: K, ttl: Ttl, producer: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        if let Some(value) = self.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(?key, "cache hit");
            return Ok(value);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(?key, "cache miss");
        let value = producer()?;
        self.insert(key, value.clone(), ttl);
        Ok(value)
    }

    /// Drop every entry
    pub fn clear(&self) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.clear();
    }

    /// Drop expired entries, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|_, entry| entry.is_fresh(now));
        before - entries.len()
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: entries.len(),
        }
    }
}

/// A [`ReadingStore`] whose results are memoized
///
/// The device catalog uses `catalog_ttl` (normally [`Ttl::Never`]), reading
/// queries use `reading_ttl`. Both tables share one clock. Errors are passed
/// through and never cached.
pub struct CachedStore<S> {
    inner: S,
    catalog: QueryCache<QueryKey, Arc<Vec<DeviceRecord>>>,
    readings: QueryCache<QueryKey, Arc<Vec<RawReading>>>,
    catalog_ttl: Ttl,
    reading_ttl: Ttl,
}

impl<S: ReadingStore> CachedStore<S> {
    pub fn new(inner: S, clock: Arc<dyn Clock>, catalog_ttl: Ttl, reading_ttl: Ttl) -> Self {
        Self {
            inner,
            catalog: QueryCache::new(clock.clone()),
            readings: QueryCache::new(clock),
            catalog_ttl,
            reading_ttl,
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Cached device catalog
    pub fn device_catalog(
        &self,
        conn: &ConnectionDescriptor,
    ) -> Result<Arc<Vec<DeviceRecord>>, DataAccessError> {
        let key = QueryKey::DeviceCatalog {
            source: conn.source_id(),
        };
        self.catalog.try_cached(key, self.catalog_ttl, || {
            self.inner.fetch_device_catalog(conn).map(Arc::new)
        })
    }

    /// Cached readings of one instrument kind
    pub fn readings(
        &self,
        conn: &ConnectionDescriptor,
        schema: &InstrumentSchema,
        device_id: i64,
        start: Option<NaiveDate>,
    ) -> Result<Arc<Vec<RawReading>>, DataAccessError> {
        let key = QueryKey::Readings {
            source: conn.source_id(),
            schema: schema.name.clone(),
            device_id,
            start,
        };
        self.readings.try_cached(key, self.reading_ttl, || {
            self.inner
                .fetch_readings(conn, schema, device_id, start)
                .map(Arc::new)
        })
    }

    /// Drop every cached result, catalog included
    pub fn clear(&self) {
        self.catalog.clear();
        self.readings.clear();
    }

    /// Drop expired results
    pub fn purge_expired(&self) -> usize {
        self.catalog.purge_expired() + self.readings.purge_expired()
    }

    /// Combined statistics of both tables
    pub fn stats(&self) -> CacheStats {
        let catalog = self.catalog.stats();
        let readings = self.readings.stats();
        CacheStats {
            hits: catalog.hits + readings.hits,
            misses: catalog.misses + readings.misses,
            entries: catalog.entries + readings.entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockReadingStore;
    use std::cell::Cell;

    fn cache_with_clock() -> (QueryCache<&'static str, u32>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        (QueryCache::new(clock.clone()), clock)
    }

    fn conn() -> ConnectionDescriptor {
        ConnectionDescriptor {
            host: "db".to_string(),
            port: 3306,
            user: "u".to_string(),
            password: "p".to_string(),
            database: "d".to_string(),
            connect_timeout: Duration::from_secs(10),
        }
    }

    #[test]
    fn test_hit_within_ttl_runs_producer_once() {
        let (cache, clock) = cache_with_clock();
        let calls = Cell::new(0);
        let produce = || {
            calls.set(calls.get() + 1);
            42
        };

        let ttl = Ttl::After(Duration::from_secs(60));
        assert_eq!(cache.cached("k", ttl, produce), 42);
        clock.advance(Duration::from_secs(59));
        assert_eq!(cache.cached("k", ttl, produce), 42);
        assert_eq!(calls.get(), 1);
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_expired_entry_is_refreshed() {
        let (cache, clock) = cache_with_clock();
        let calls = Cell::new(0);
        let ttl = Ttl::After(Duration::from_secs(60));

        cache.cached("k", ttl, || {
            calls.set(calls.get() + 1);
            1
        });
        clock.advance(Duration::from_secs(60));
        let value = cache.cached("k", ttl, || {
            calls.set(calls.get() + 1);
            2
        });
        assert_eq!(value, 2);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_never_expires() {
        let (cache, clock) = cache_with_clock();
        cache.cached("catalog", Ttl::Never, || 7);
        clock.advance(Duration::from_secs(365 * 24 * 3600));
        assert_eq!(cache.cached("catalog", Ttl::Never, || 8), 7);
    }

    #[test]
    fn test_failed_producer_is_not_cached() {
        let (cache, _clock) = cache_with_clock();
        let ttl = Ttl::After(Duration::from_secs(60));
        let first: Result<u32, &str> = cache.try_cached("k", ttl, || Err("down"));
        assert!(first.is_err());
        let second: Result<u32, &str> = cache.try_cached("k", ttl, || Ok(5));
        assert_eq!(second, Ok(5));
    }

    #[test]
    fn test_clear_and_purge() {
        let (cache, clock) = cache_with_clock();
        cache.insert("a", 1, Ttl::After(Duration::from_secs(10)));
        cache.insert("b", 2, Ttl::Never);
        cache.insert("c", 3, Ttl::After(Duration::from_secs(100)));

        clock.advance(Duration::from_secs(11));
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.stats().entries, 2);
        assert_eq!(cache.get(&"c"), Some(3));

        cache.clear();
        assert_eq!(cache.get(&"b"), None);
    }

    #[test]
    fn test_producer_may_reenter_cache() {
        let (cache, _clock) = cache_with_clock();
        let ttl = Ttl::Never;

        let outer = cache.cached("outer", ttl, || cache.cached("inner", ttl, || 1) + 1);
        assert_eq!(outer, 2);
        assert_eq!(cache.get(&"inner"), Some(1));
        assert_eq!(cache.stats().entries, 2);
    }

    #[test]
    fn test_concurrent_producers_do_not_block_each_other() {
        use std::sync::Barrier;

        let (cache, _clock) = cache_with_clock();
        let barrier = Barrier::new(2);
        let ttl = Ttl::Never;

        // Both producers wait for each other, so they must run at the same time
        std::thread::scope(|scope| {
            let first = scope.spawn(|| {
                cache.cached("k", ttl, || {
                    barrier.wait();
                    1
                })
            });
            let second = scope.spawn(|| {
                cache.cached("k", ttl, || {
                    barrier.wait();
                    2
                })
            });
            assert_eq!(first.join().unwrap(), 1);
            assert_eq!(second.join().unwrap(), 2);
        });

        assert_eq!(cache.stats().misses, 2);
        assert_eq!(cache.stats().entries, 1);
        assert!(matches!(cache.get(&"k"), Some(1) | Some(2)));
    }

    #[test]
    fn test_last_insert_wins() {
        let (cache, _clock) = cache_with_clock();
        cache.insert("k", 1, Ttl::Never);
        cache.insert("k", 2, Ttl::Never);
        assert_eq!(cache.get(&"k"), Some(2));
        assert_eq!(cache.stats().entries, 1);
    }

    #[test]
    fn test_none_start_is_distinct_key() {
        let day = NaiveDate::from_ymd_opt(2025, 8, 7).unwrap();
        let unfiltered = QueryKey::Readings {
            source: "s".into(),
            schema: "tilt".into(),
            device_id: 1,
            start: None,
        };
        let filtered = QueryKey::Readings {
            source: "s".into(),
            schema: "tilt".into(),
            device_id: 1,
            start: Some(day),
        };
        assert_ne!(unfiltered, filtered);
    }

    #[test]
    fn test_cached_store_reuses_catalog_and_expires_readings() {
        let clock = Arc::new(ManualClock::new());
        let mut inner = MockReadingStore::new();
        inner
            .expect_fetch_device_catalog()
            .times(1)
            .returning(|_| Ok(vec![DeviceRecord::new(1, "dev-1", vec!["1".into()])]));
        inner
            .expect_fetch_readings()
            .times(2)
            .returning(|_, _, _, _| Ok(Vec::new()));

        let store = CachedStore::new(
            inner,
            clock.clone(),
            Ttl::Never,
            Ttl::After(Duration::from_secs(60)),
        );
        let conn = conn();
        let schema = InstrumentSchema::tilt();

        assert_eq!(store.device_catalog(&conn).unwrap().len(), 1);
        assert_eq!(store.device_catalog(&conn).unwrap().len(), 1);

        store.readings(&conn, &schema, 1, None).unwrap();
        store.readings(&conn, &schema, 1, None).unwrap();
        clock.advance(Duration::from_secs(61));
        store.readings(&conn, &schema, 1, None).unwrap();

        let stats = store.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 3);
    }

    #[test]
    fn test_cached_store_does_not_cache_errors() {
        let clock = Arc::new(ManualClock::new());
        let mut inner = MockReadingStore::new();
        let mut seq = mockall::Sequence::new();
        inner
            .expect_fetch_device_catalog()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(DataAccessError::ConnectionFailed("refused".into())));
        inner
            .expect_fetch_device_catalog()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(Vec::new()));

        let store = CachedStore::new(inner, clock, Ttl::Never, Ttl::Never);
        assert!(store.device_catalog(&conn()).is_err());
        assert!(store.device_catalog(&conn()).unwrap().is_empty());
    }
}
