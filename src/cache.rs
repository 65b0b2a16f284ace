//! Caller-owned dataset cache.
//!
//! Wraps a [`DatasetFetcher`] and keeps one immutable snapshot per filter.
//! Snapshots are populated lazily, swapped whole on refresh, expire after an
//! optional TTL and can be invalidated explicitly.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::FetchError;
use crate::fetcher::DatasetFetcher;
use crate::models::{FilterTokens, LocatedEntity};

/// A shared, read-only view of a fetched dataset
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub entities: Arc<Vec<LocatedEntity>>,
    pub fetched_at: DateTime<Utc>,
    loaded: Instant,
}

impl Snapshot {
    fn new(entities: Vec<LocatedEntity>) -> Self {
        Self {
            entities: Arc::new(entities),
            fetched_at: Utc::now(),
            loaded: Instant::now(),
        }
    }

    fn is_fresh(&self, ttl: Option<Duration>) -> bool {
        ttl.map_or(true, |ttl| self.loaded.elapsed() < ttl)
    }
}

/// Filters kept at once unless overridden with [`DatasetCache::with_max_filters`]
pub const DEFAULT_MAX_FILTERS: usize = 32;

pub struct DatasetCache<F> {
    fetcher: F,
    ttl: Option<Duration>,
    max_filters: usize,
    snapshots: RwLock<HashMap<FilterTokens, Snapshot>>,
    /// Serializes refreshes so concurrent misses fetch once
    refresh: Mutex<()>,
}

impl<F: DatasetFetcher> DatasetCache<F> {
    /// `ttl = None` keeps snapshots until invalidated
    pub fn new(fetcher: F, ttl: Option<Duration>) -> Self {
        Self {
            fetcher,
            ttl,
            max_filters: DEFAULT_MAX_FILTERS,
            snapshots: RwLock::new(HashMap::new()),
            refresh: Mutex::new(()),
        }
    }

    /// Bound the number of filters held at once; the oldest snapshot is
    /// evicted first
    pub fn with_max_filters(mut self, max_filters: usize) -> Self {
        self.max_filters = max_filters.max(1);
        self
    }

    /// Return the cached snapshot for `filter`, fetching it when missing or
    /// expired. A failed refresh returns the error and leaves any previous
    /// snapshot in place.
    pub async fn get(&self, filter: &FilterTokens) -> Result<Snapshot, FetchError> {
        if let Some(snapshot) = self.fresh(filter).await {
            debug!("[CACHE HIT] {} {:?}", self.fetcher.name(), filter);
            return Ok(snapshot);
        }

        let _guard = self.refresh.lock().await;
        // Another task may have refreshed while we waited
        if let Some(snapshot) = self.fresh(filter).await {
            return Ok(snapshot);
        }

        debug!("[CACHE MISS] {} {:?}", self.fetcher.name(), filter);
        let entities = match self.fetcher.fetch(filter).await {
            Ok(entities) => entities,
            Err(e) => {
                warn!("Refreshing {} cache failed: {}", self.fetcher.name(), e);
                return Err(e);
            }
        };

        let snapshot = Snapshot::new(entities);
        self.store(filter, snapshot.clone()).await;
        info!(
            "Cached {} entities from {} for {:?}",
            snapshot.entities.len(),
            self.fetcher.name(),
            filter
        );
        Ok(snapshot)
    }

    /// Insert a snapshot, dropping expired ones and the oldest beyond the bound
    async fn store(&self, filter: &FilterTokens, snapshot: Snapshot) {
        let mut snapshots = self.snapshots.write().await;
        snapshots.insert(filter.clone(), snapshot);

        let before = snapshots.len();
        snapshots.retain(|_, s| s.is_fresh(self.ttl));
        while snapshots.len() > self.max_filters {
            let oldest = snapshots
                .iter()
                .min_by_key(|(_, s)| s.loaded)
                .map(|(key, _)| key.clone());
            match oldest {
                Some(key) => snapshots.remove(&key),
                None => break,
            };
        }
        if snapshots.len() < before {
            debug!(
                "Evicted {} {} snapshots",
                before - snapshots.len(),
                self.fetcher.name()
            );
        }
    }

    async fn fresh(&self, filter: &FilterTokens) -> Option<Snapshot> {
        self.snapshots
            .read()
            .await
            .get(filter)
            .filter(|s| s.is_fresh(self.ttl))
            .cloned()
    }

    /// Drop every snapshot; the next read refetches
    pub async fn invalidate(&self) {
        let mut snapshots = self.snapshots.write().await;
        info!("Invalidating {} cached {} datasets", snapshots.len(), self.fetcher.name());
        snapshots.clear();
    }

    /// Drop the snapshot for one filter
    pub async fn invalidate_filter(&self, filter: &FilterTokens) -> bool {
        self.snapshots.write().await.remove(filter).is_some()
    }

    pub async fn len(&self) -> usize {
        self.snapshots.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.snapshots.read().await.is_empty()
    }
}

/// A cache can stand in for its fetcher anywhere a fetcher is expected
#[async_trait]
impl<F: DatasetFetcher> DatasetFetcher for DatasetCache<F> {
    fn name(&self) -> &'static str {
        self.fetcher.name()
    }

    async fn fetch(&self, filter: &FilterTokens) -> Result<Vec<LocatedEntity>, FetchError> {
        Ok(self.get(filter).await?.entities.as_ref().clone())
    }

    async fn fetch_shared(&self, filter: &FilterTokens) -> Result<Arc<Vec<LocatedEntity>>, FetchError> {
        Ok(self.get(filter).await?.entities)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::EntityKind;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Counts fetches; fails while `fail` is set
    #[derive(Default)]
    pub(crate) struct CountingFetcher {
        pub calls: AtomicUsize,
        pub fail: AtomicBool,
        pub entities: Vec<LocatedEntity>,
    }

    impl CountingFetcher {
        pub(crate) fn with(entities: Vec<LocatedEntity>) -> Self {
            Self {
                entities,
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl DatasetFetcher for CountingFetcher {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn fetch(&self, _filter: &FilterTokens) -> Result<Vec<LocatedEntity>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(FetchError::Status {
                    source_name: "counting",
                    status: 503,
                    body: "unavailable".into(),
                });
            }
            Ok(self.entities.clone())
        }
    }

    fn lots() -> Vec<LocatedEntity> {
        vec![LocatedEntity::new("1", "lot", EntityKind::Parking, 37.5, 127.0)]
    }

    #[tokio::test]
    async fn test_lazy_population_and_hits() {
        let cache = DatasetCache::new(CountingFetcher::with(lots()), None);
        let filter = FilterTokens::region("서울특별시");
        assert!(cache.is_empty().await);

        let first = cache.get(&filter).await.unwrap();
        let second = cache.get(&filter).await.unwrap();

        assert_eq!(first.entities.len(), 1);
        assert!(Arc::ptr_eq(&first.entities, &second.entities));
        assert_eq!(cache.fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_filters_cached_separately() {
        let cache = DatasetCache::new(CountingFetcher::with(lots()), None);

        cache.get(&FilterTokens::region("a")).await.unwrap();
        cache.get(&FilterTokens::region("b")).await.unwrap();

        assert_eq!(cache.len().await, 2);
        assert_eq!(cache.fetcher.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_expiry_refetches() {
        let cache = DatasetCache::new(CountingFetcher::with(lots()), Some(Duration::from_secs(60)));
        let filter = FilterTokens::default();

        cache.get(&filter).await.unwrap();
        tokio::time::advance(Duration::from_secs(30)).await;
        cache.get(&filter).await.unwrap();
        assert_eq!(cache.fetcher.calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(31)).await;
        cache.get(&filter).await.unwrap();
        assert_eq!(cache.fetcher.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let cache = DatasetCache::new(CountingFetcher::with(lots()), None);
        let filter = FilterTokens::default();

        cache.get(&filter).await.unwrap();
        cache.invalidate().await;
        cache.get(&filter).await.unwrap();
        assert!(cache.invalidate_filter(&filter).await);
        assert!(!cache.invalidate_filter(&filter).await);

        assert_eq!(cache.fetcher.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_refresh_keeps_previous_snapshot() {
        let cache = DatasetCache::new(CountingFetcher::with(lots()), Some(Duration::from_secs(10)));
        let filter = FilterTokens::default();
        cache.get(&filter).await.unwrap();

        tokio::time::advance(Duration::from_secs(11)).await;
        cache.fetcher.fail.store(true, Ordering::SeqCst);
        assert!(cache.get(&filter).await.is_err());
        assert_eq!(cache.len().await, 1);

        cache.fetcher.fail.store(false, Ordering::SeqCst);
        assert_eq!(cache.get(&filter).await.unwrap().entities.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_filters_are_dropped() {
        let cache = DatasetCache::new(CountingFetcher::with(lots()), Some(Duration::from_secs(1)));

        for i in 0..500 {
            cache.get(&FilterTokens::region(format!("junk-{}", i))).await.unwrap();
            tokio::time::advance(Duration::from_secs(2)).await;
        }

        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_oldest_filter_evicted_beyond_bound() {
        let cache = DatasetCache::new(CountingFetcher::with(lots()), None).with_max_filters(3);

        for region in ["a", "b", "c", "d", "e"] {
            cache.get(&FilterTokens::region(region)).await.unwrap();
            tokio::time::advance(Duration::from_millis(10)).await;
        }
        assert_eq!(cache.len().await, 3);

        // "e" is still cached, "a" was evicted and refetches
        cache.get(&FilterTokens::region("e")).await.unwrap();
        assert_eq!(cache.fetcher.calls.load(Ordering::SeqCst), 5);
        cache.get(&FilterTokens::region("a")).await.unwrap();
        assert_eq!(cache.fetcher.calls.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn test_shared_fetch_reuses_snapshot() {
        let cache = DatasetCache::new(CountingFetcher::with(lots()), None);
        let filter = FilterTokens::default();

        let first = cache.fetch_shared(&filter).await.unwrap();
        let second = cache.fetch_shared(&filter).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&first, &cache.get(&filter).await.unwrap().entities));
        assert_eq!(cache.fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_error_on_first_fetch_is_not_empty_success() {
        let fetcher = CountingFetcher::with(lots());
        fetcher.fail.store(true, Ordering::SeqCst);
        let cache = DatasetCache::new(fetcher, None);

        assert!(cache.fetch(&FilterTokens::default()).await.is_err());
        assert!(cache.is_empty().await);
    }
}
