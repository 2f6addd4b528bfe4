//! Cache-backed access to the normalized feeds.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;

use crate::cache::{CacheStatus, FreshnessCache, SourceKey};
use crate::clock::Clock;
use crate::config::Config;
use crate::feeds::fires::normalize_fires;
use crate::feeds::hotspots::normalize_hotspots;
use crate::feeds::types::{FireCollection, FireRecord, HotspotCollection, RawFeatureCollection, Satellite};
use crate::feeds::{FeedError, FeedFetcher};
use crate::regions::ExcludedRegions;

#[derive(Debug, Clone)]
pub struct FeedUrls {
    pub fires: String,
    pub modis: String,
    pub viirs: String,
}

impl FeedUrls {
    pub fn from_config(config: &Config) -> Self {
        Self {
            fires: config.fire_perimeters_url.clone(),
            modis: config.modis_hotspots_url.clone(),
            viirs: config.viirs_hotspots_url.clone(),
        }
    }

    fn for_key(&self, key: SourceKey) -> &str {
        match key {
            SourceKey::Fires => &self.fires,
            SourceKey::Modis => &self.modis,
            SourceKey::Viirs => &self.viirs,
        }
    }
}

pub struct WildfireService {
    fetcher: Arc<dyn FeedFetcher>,
    urls: FeedUrls,
    clock: Arc<dyn Clock>,
    excluded: ExcludedRegions,
    fires: FreshnessCache<FireCollection>,
    hotspots: FreshnessCache<HotspotCollection>,
    // One gate per source so concurrent misses share a single upstream fetch.
    gates: HashMap<SourceKey, AsyncMutex<()>>,
}

impl WildfireService {
    pub fn new(
        fetcher: Arc<dyn FeedFetcher>,
        urls: FeedUrls,
        clock: Arc<dyn Clock>,
        ttl: chrono::Duration,
        excluded: ExcludedRegions,
    ) -> Self {
        let gates = SourceKey::ALL
            .iter()
            .map(|key| (*key, AsyncMutex::new(())))
            .collect();

        Self {
            fetcher,
            urls,
            fires: FreshnessCache::new(ttl, clock.clone()),
            hotspots: FreshnessCache::new(ttl, clock.clone()),
            clock,
            excluded,
            gates,
        }
    }

    async fn fetch_collection(&self, key: SourceKey) -> Result<RawFeatureCollection, FeedError> {
        let url = self.urls.for_key(key);
        tracing::info!("Fetching fresh {} data from upstream", key);

        let body = self.fetcher.fetch_json(url).await.map_err(|e| {
            tracing::error!("Upstream fetch for {} failed: {}", key, e);
            e
        })?;

        RawFeatureCollection::from_value(body)
    }

    /// Current fire perimeters. `force_refresh` drops the cached entry and
    /// always goes upstream.
    pub async fn fetch_fires(&self, force_refresh: bool) -> Result<Arc<FireCollection>, FeedError> {
        let key = SourceKey::Fires;
        if force_refresh {
            self.fires.invalidate(key);
        } else if let Some(cached) = self.fires.get(key) {
            tracing::debug!("Returning cached fire data");
            return Ok(cached);
        }

        let _gate = self.gates[&key].lock().await;
        if !force_refresh {
            // Another request may have refilled the entry while we waited.
            if let Some(cached) = self.fires.get(key) {
                return Ok(cached);
            }
        }

        let raw = self.fetch_collection(key).await?;
        let collection = normalize_fires(&raw, self.clock.now(), &self.excluded);
        tracing::info!("Successfully fetched {} fires", collection.total);

        Ok(self.fires.put(key, collection))
    }

    pub async fn fetch_hotspots(
        &self,
        source: Satellite,
        force_refresh: bool,
    ) -> Result<Arc<HotspotCollection>, FeedError> {
        let key = source.source_key();
        if force_refresh {
            self.hotspots.invalidate(key);
        } else if let Some(cached) = self.hotspots.get(key) {
            tracing::debug!("Returning cached {} data", source);
            return Ok(cached);
        }

        let _gate = self.gates[&key].lock().await;
        if !force_refresh {
            if let Some(cached) = self.hotspots.get(key) {
                return Ok(cached);
            }
        }

        let raw = self.fetch_collection(key).await?;
        let collection = normalize_hotspots(source.fields(), &raw, self.clock.now());

        Ok(self.hotspots.put(key, collection))
    }

    /// Looks `id` up in the current (cached or freshly fetched) fire collection.
    pub async fn find_fire_by_id(&self, id: &str) -> Result<FireRecord, FeedError> {
        let fires = self.fetch_fires(false).await?;
        fires
            .find(id)
            .cloned()
            .ok_or_else(|| FeedError::NotFound(format!("fire {}", id)))
    }

    pub fn cache_status(&self, key: SourceKey) -> CacheStatus {
        match key {
            SourceKey::Fires => self.fires.status(key),
            SourceKey::Modis | SourceKey::Viirs => self.hotspots.status(key),
        }
    }

    /// When the entry for `key` was last filled, fresh or not.
    pub fn last_fetched(&self, key: SourceKey) -> Option<DateTime<Utc>> {
        match key {
            SourceKey::Fires => self.fires.fetched_at(key),
            SourceKey::Modis | SourceKey::Viirs => self.hotspots.fetched_at(key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::manual::ManualClock;
    use crate::feeds::mock::*;
    use std::time::Duration;

    const FIRES_URL: &str = "http://upstream/fires";
    const MODIS_URL: &str = "http://upstream/modis";
    const VIIRS_URL: &str = "http://upstream/viirs";

    fn urls() -> FeedUrls {
        FeedUrls {
            fires: FIRES_URL.to_string(),
            modis: MODIS_URL.to_string(),
            viirs: VIIRS_URL.to_string(),
        }
    }

    fn service_with(fetcher: Arc<StubFetcher>) -> (Arc<ManualClock>, WildfireService) {
        let clock = Arc::new(ManualClock::new(fixed_now()));
        let service = WildfireService::new(
            fetcher,
            urls(),
            clock.clone(),
            chrono::Duration::seconds(300),
            ExcludedRegions::default(),
        );
        (clock, service)
    }

    fn recent_ms() -> i64 {
        (fixed_now() - chrono::Duration::hours(1)).timestamp_millis()
    }

    fn stub_fires(fetcher: &StubFetcher) {
        fetcher.respond(
            FIRES_URL,
            Ok(feature_collection(vec![
                fire_feature(11, "Park", recent_ms(), 429_603.0, square_around(39.9, -121.8)),
                fire_feature(12, "Yukon", recent_ms(), 20_000.0, square_around(64.0, -150.0)),
            ])),
        );
    }

    #[tokio::test]
    async fn test_second_read_is_served_from_cache() {
        let fetcher = Arc::new(StubFetcher::new());
        stub_fires(&fetcher);
        let (_, service) = service_with(fetcher.clone());

        let first = service.fetch_fires(false).await.unwrap();
        let second = service.fetch_fires(false).await.unwrap();

        assert_eq!(fetcher.calls(), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.total, 1);
        assert_eq!(first.fires[0].name, "Park");
        assert_eq!(service.cache_status(SourceKey::Fires), CacheStatus::Fresh);
    }

    #[tokio::test]
    async fn test_force_refresh_always_fetches_once() {
        let fetcher = Arc::new(StubFetcher::new());
        stub_fires(&fetcher);
        let (_, service) = service_with(fetcher.clone());

        service.fetch_fires(false).await.unwrap();
        assert_eq!(fetcher.calls(), 1);

        service.fetch_fires(true).await.unwrap();
        assert_eq!(fetcher.calls(), 2);

        service.fetch_fires(false).await.unwrap();
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_expired_entry_is_refetched() {
        let fetcher = Arc::new(StubFetcher::new());
        stub_fires(&fetcher);
        let (clock, service) = service_with(fetcher.clone());

        assert_eq!(service.last_fetched(SourceKey::Fires), None);
        service.fetch_fires(false).await.unwrap();
        assert_eq!(service.last_fetched(SourceKey::Fires), Some(fixed_now()));

        clock.advance(chrono::Duration::seconds(301));
        assert_eq!(service.cache_status(SourceKey::Fires), CacheStatus::Stale);
        assert_eq!(service.last_fetched(SourceKey::Fires), Some(fixed_now()));

        service.fetch_fires(false).await.unwrap();
        assert_eq!(fetcher.calls(), 2);
        assert_eq!(
            service.last_fetched(SourceKey::Fires),
            Some(fixed_now() + chrono::Duration::seconds(301))
        );
        assert_eq!(service.last_fetched(SourceKey::Modis), None);
    }

    #[tokio::test]
    async fn test_upstream_failure_propagates_and_is_not_cached() {
        let fetcher = Arc::new(StubFetcher::new());
        fetcher.respond(
            FIRES_URL,
            Err(FeedError::SourceUnavailable("HTTP 503".to_string())),
        );
        let (_, service) = service_with(fetcher.clone());

        let err = service.fetch_fires(false).await.unwrap_err();
        assert!(matches!(err, FeedError::SourceUnavailable(_)));
        assert_eq!(service.cache_status(SourceKey::Fires), CacheStatus::Empty);

        service.fetch_fires(false).await.unwrap_err();
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_wrong_document_type_is_malformed() {
        let fetcher = Arc::new(StubFetcher::new());
        fetcher.respond(FIRES_URL, Ok(serde_json::json!({"type": "Feature"})));
        let (_, service) = service_with(fetcher);

        let err = service.fetch_fires(false).await.unwrap_err();
        assert!(matches!(err, FeedError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_find_fire_by_id() {
        let fetcher = Arc::new(StubFetcher::new());
        stub_fires(&fetcher);
        let (_, service) = service_with(fetcher.clone());

        let fire = service.find_fire_by_id("11").await.unwrap();
        assert_eq!(fire.name, "Park");

        // excluded by region policy, so not addressable either
        let err = service.find_fire_by_id("12").await.unwrap_err();
        assert!(matches!(err, FeedError::NotFound(_)));
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_hotspot_sources_are_cached_separately() {
        let fetcher = Arc::new(StubFetcher::new());
        fetcher.respond(
            MODIS_URL,
            Ok(feature_collection(vec![modis_feature(1, 38.5, -120.5, 85.0)])),
        );
        fetcher.respond(
            VIIRS_URL,
            Ok(feature_collection(vec![
                viirs_feature(1, 38.5, -120.5),
                viirs_feature(2, 40.0, -110.0),
            ])),
        );
        let (_, service) = service_with(fetcher.clone());

        let modis = service.fetch_hotspots(Satellite::Modis, false).await.unwrap();
        let viirs = service.fetch_hotspots(Satellite::Viirs, false).await.unwrap();
        service.fetch_hotspots(Satellite::Viirs, false).await.unwrap();

        assert_eq!(modis.total, 1);
        assert_eq!(modis.source, Satellite::Modis);
        assert_eq!(viirs.total, 2);
        assert_eq!(fetcher.calls(), 2);
        assert_eq!(service.cache_status(SourceKey::Fires), CacheStatus::Empty);

        service.fetch_hotspots(Satellite::Modis, true).await.unwrap();
        assert_eq!(fetcher.calls(), 3);
    }

    #[tokio::test]
    async fn test_concurrent_misses_share_one_fetch() {
        let fetcher = Arc::new(StubFetcher::with_delay(Duration::from_millis(50)));
        stub_fires(&fetcher);
        let (_, service) = service_with(fetcher.clone());

        let (a, b, c) = tokio::join!(
            service.fetch_fires(false),
            service.fetch_fires(false),
            service.fetch_fires(false)
        );

        assert_eq!(fetcher.calls(), 1);
        assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
        assert_eq!(c.unwrap().total, 1);
    }
}
