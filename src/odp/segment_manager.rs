use std::{
    sync::{Arc, RwLock},
    time::Duration,
};

use super::{Cache, LruCache, OdpIntegration, OdpSegmentApiManager};

/// Per-call options for [`OdpSegmentManager::fetch_qualified_segments`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptimizelySegmentOption {
    /// Don't read from or write to the cache.
    IgnoreCache,
    /// Clear the whole cache before fetching.
    ResetCache,
}

/// Configuration for the segments cache.
#[derive(Debug, Clone)]
pub struct OdpSegmentManagerConfig {
    pub cache_size: usize,
    /// `None` keeps cached segments until evicted.
    pub cache_timeout: Option<Duration>,
}

impl OdpSegmentManagerConfig {
    pub const DEFAULT_CACHE_SIZE: usize = 10_000;
    pub const DEFAULT_CACHE_TIMEOUT: Duration = Duration::from_secs(600);

    pub fn new() -> OdpSegmentManagerConfig {
        OdpSegmentManagerConfig {
            cache_size: OdpSegmentManagerConfig::DEFAULT_CACHE_SIZE,
            cache_timeout: Some(OdpSegmentManagerConfig::DEFAULT_CACHE_TIMEOUT),
        }
    }

    pub fn with_cache_size(mut self, cache_size: usize) -> OdpSegmentManagerConfig {
        self.cache_size = cache_size;
        self
    }

    pub fn with_cache_timeout(mut self, cache_timeout: Option<Duration>) -> OdpSegmentManagerConfig {
        self.cache_timeout = cache_timeout;
        self
    }

    pub fn to_cache(&self) -> LruCache<String, Vec<String>> {
        LruCache::new(self.cache_size, self.cache_timeout)
    }
}

impl Default for OdpSegmentManagerConfig {
    fn default() -> OdpSegmentManagerConfig {
        OdpSegmentManagerConfig::new()
    }
}

/// Fetches qualified segments through a cache.
///
/// Cached segments belong to one ODP configuration: updating the configuration clears the cache.
pub struct OdpSegmentManager {
    api_manager: Arc<dyn OdpSegmentApiManager>,
    cache: Arc<dyn Cache<String, Vec<String>>>,
    integration: RwLock<Option<OdpIntegration>>,
}

impl OdpSegmentManager {
    pub fn new(
        api_manager: Arc<dyn OdpSegmentApiManager>,
        cache: Arc<dyn Cache<String, Vec<String>>>,
    ) -> OdpSegmentManager {
        OdpSegmentManager {
            api_manager,
            cache,
            integration: RwLock::new(None),
        }
    }

    /// Returns the configured segments the user qualifies for, or `None` when ODP is not
    /// integrated or the fetch failed. Failures are not cached.
    pub async fn fetch_qualified_segments(
        &self,
        user_key: &str,
        user_value: &str,
        options: &[OptimizelySegmentOption],
    ) -> Option<Vec<String>> {
        let config = {
            let integration = self
                .integration
                .read()
                .expect("thread holding segment manager lock should not panic");
            match integration.as_ref() {
                Some(OdpIntegration::Integrated(config)) => config.clone(),
                Some(OdpIntegration::NotIntegrated) => {
                    log::warn!(target: "optimizely", "ODP is not integrated, can't fetch qualified segments");
                    return None;
                }
                None => {
                    log::warn!(target: "optimizely", "ODP config is not ready, can't fetch qualified segments");
                    return None;
                }
            }
        };

        if config.segments_to_check.is_empty() {
            log::debug!(target: "optimizely", "no segments are used in the project, skipping fetch");
            return Some(Vec::new());
        }

        let cache_key = cache_key(user_key, user_value);
        let ignore_cache = options.contains(&OptimizelySegmentOption::IgnoreCache);

        if options.contains(&OptimizelySegmentOption::ResetCache) {
            self.cache.reset();
        }

        if !ignore_cache {
            if let Some(segments) = self.cache.lookup(&cache_key) {
                log::debug!(target: "optimizely", user_key, user_value; "qualified segments found in cache");
                return Some(segments);
            }
        }

        log::debug!(target: "optimizely", user_key, user_value; "fetching qualified segments");
        let segments = self
            .api_manager
            .fetch_segments(
                &config.api_key,
                &config.api_host,
                user_key,
                user_value,
                &config.segments_to_check,
            )
            .await?;

        if !ignore_cache {
            self.cache.save(cache_key, segments.clone());
        }
        Some(segments)
    }

    /// Switch to a new ODP configuration. Always clears the cache.
    pub fn update_config(&self, integration: OdpIntegration) {
        *self
            .integration
            .write()
            .expect("thread holding segment manager lock should not panic") = Some(integration);
        self.cache.reset();
    }
}

fn cache_key(user_key: &str, user_value: &str) -> String {
    format!("{user_key}-$-{user_value}")
}
