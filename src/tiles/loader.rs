use crate::prelude::{Arc, Duration, HashMap, Mutex};
use crate::tiles::cache::{CacheEntry, TileCache};
use crate::tiles::fetch::{ImageDecoder, TileDecoder, TileFetcher, TileImage};
use crate::Result;
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::{Deserialize, Serialize};

/// Primary URL plus an optional fallback for one tile.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TileRequest {
    pub url: String,
    pub fallback: Option<String>,
}

impl TileRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, fallback: impl Into<String>) -> Self {
        self.fallback = Some(fallback.into());
        self
    }
}

/// Configuration for the tile loader
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TileLoaderConfig {
    /// Entries kept before the oldest is evicted
    pub cache_capacity: usize,
    /// Extra attempts on the primary URL after the first failure
    pub max_retries: u32,
    /// Base delay, doubled after every failed attempt
    #[serde(with = "crate::core::config::millis")]
    pub retry_delay: Duration,
}

impl Default for TileLoaderConfig {
    fn default() -> Self {
        Self {
            cache_capacity: crate::constants::TILE_CACHE_CAPACITY,
            max_retries: 2,
            retry_delay: Duration::from_millis(200),
        }
    }
}

/// Unified configuration presets for TileLoaderConfig
impl TileLoaderConfig {
    pub fn low_bandwidth() -> Self {
        Self {
            cache_capacity: 256,
            max_retries: 1,
            retry_delay: Duration::from_millis(500),
        }
    }

    pub fn high_performance() -> Self {
        Self {
            cache_capacity: 2048,
            max_retries: 3,
            retry_delay: Duration::from_millis(100),
        }
    }

    pub fn for_testing() -> Self {
        Self {
            cache_capacity: 64,
            max_retries: 0,
            retry_delay: Duration::from_millis(1),
        }
    }

    /// Delay before retry number `attempt` (0-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.retry_delay.saturating_mul(1u32 << attempt.min(16))
    }
}

type PendingTile = Shared<BoxFuture<'static, CacheEntry>>;

/// The one place tile images are fetched.
///
/// Results, including failures, land in a bounded [`TileCache`]. Concurrent
/// requests for a URL that is already loading await the same shared future,
/// so a URL never has more than one request on the wire.
pub struct TileLoader {
    cache: TileCache,
    in_flight: Arc<Mutex<HashMap<String, PendingTile>>>,
    fetcher: Arc<dyn TileFetcher>,
    decoder: Arc<dyn TileDecoder>,
    config: TileLoaderConfig,
}

impl TileLoader {
    /// Create a loader with the default `image` decoder
    pub fn new(fetcher: Arc<dyn TileFetcher>, config: TileLoaderConfig) -> Self {
        Self::with_decoder(fetcher, Arc::new(ImageDecoder), config)
    }

    pub fn with_decoder(
        fetcher: Arc<dyn TileFetcher>,
        decoder: Arc<dyn TileDecoder>,
        config: TileLoaderConfig,
    ) -> Self {
        Self {
            cache: TileCache::new(config.cache_capacity),
            in_flight: Arc::new(Mutex::new(HashMap::default())),
            fetcher,
            decoder,
            config,
        }
    }

    /// Create a loader over HTTP with default configuration
    #[cfg(feature = "http")]
    pub fn with_default_config() -> Self {
        Self::new(
            Arc::new(crate::tiles::fetch::HttpTileFetcher),
            TileLoaderConfig::default(),
        )
    }

    /// Resolve a tile to its image, or `None` if it is (now known to be) unavailable.
    ///
    /// Never fails: errors are retried, then the fallback is tried, then a
    /// negative entry is cached.
    pub async fn load(&self, request: TileRequest) -> CacheEntry {
        match self.lookup_or_start(request) {
            Ok(entry) => entry,
            Err(pending) => pending.await,
        }
    }

    /// Fire-and-forget loads, used to warm the cache ahead of playback.
    pub fn prewarm(&self, requests: Vec<TileRequest>) -> crate::runtime::TaskHandle {
        let loader = self.clone();
        crate::runtime::spawn(async move {
            let count = requests.len();
            futures::future::join_all(requests.into_iter().map(|request| loader.load(request)))
                .await;
            log::debug!("prewarmed {} tiles", count);
        })
    }

    /// Cached entry, or the in-flight future for this URL (started if needed).
    fn lookup_or_start(&self, request: TileRequest) -> std::result::Result<CacheEntry, PendingTile> {
        let mut in_flight = match self.in_flight.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        // Checked under the in-flight lock so a finishing load cannot slip
        // between the cache miss and the in-flight lookup.
        if let Some(entry) = self.cache.get(&request.url) {
            return Ok(entry);
        }
        if let Some(pending) = in_flight.get(&request.url) {
            log::trace!("joining in-flight request {}", request.url);
            return Err(pending.clone());
        }

        let pending = self.start(request.clone());
        in_flight.insert(request.url, pending.clone());
        Err(pending)
    }

    fn start(&self, request: TileRequest) -> PendingTile {
        let fetcher = Arc::clone(&self.fetcher);
        let decoder = Arc::clone(&self.decoder);
        let config = self.config.clone();
        let cache = self.cache.clone();
        let in_flight = Arc::clone(&self.in_flight);

        async move {
            let entry = resolve(&*fetcher, &*decoder, &config, &request).await;

            let mut in_flight = match in_flight.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            cache.insert(request.url.clone(), entry.clone());
            in_flight.remove(&request.url);
            entry
        }
        .boxed()
        .shared()
    }

    pub fn cache(&self) -> &TileCache {
        &self.cache
    }

    /// Get configuration
    pub fn config(&self) -> &TileLoaderConfig {
        &self.config
    }

    /// Number of URLs currently on the wire
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().map(|map| map.len()).unwrap_or(0)
    }
}

impl Clone for TileLoader {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            in_flight: Arc::clone(&self.in_flight),
            fetcher: Arc::clone(&self.fetcher),
            decoder: Arc::clone(&self.decoder),
            config: self.config.clone(),
        }
    }
}

impl std::fmt::Debug for TileLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileLoader")
            .field("cached", &self.cache.len())
            .field("in_flight", &self.in_flight_count())
            .field("config", &self.config)
            .finish()
    }
}

async fn resolve(
    fetcher: &dyn TileFetcher,
    decoder: &dyn TileDecoder,
    config: &TileLoaderConfig,
    request: &TileRequest,
) -> CacheEntry {
    match fetch_with_retry(fetcher, decoder, config, &request.url).await {
        Ok(image) => return Some(image),
        Err(e) => log::debug!("tile {} failed after retries: {}", request.url, e),
    }

    if let Some(fallback) = &request.fallback {
        match fetch_once(fetcher, decoder, fallback).await {
            Ok(image) => {
                log::debug!("tile {} served from fallback", request.url);
                return Some(image);
            }
            Err(e) => log::debug!("fallback {} failed: {}", fallback, e),
        }
    }

    log::warn!("giving up on tile {}", request.url);
    None
}

async fn fetch_with_retry(
    fetcher: &dyn TileFetcher,
    decoder: &dyn TileDecoder,
    config: &TileLoaderConfig,
    url: &str,
) -> Result<TileImage> {
    let mut attempt = 0;
    loop {
        log::debug!("fetch tile {} attempt {}", url, attempt + 1);
        match fetch_once(fetcher, decoder, url).await {
            Ok(image) => return Ok(image),
            Err(e) if attempt < config.max_retries => {
                let delay = config.backoff(attempt);
                log::debug!("tile {} attempt {} failed: {}; retrying in {:?}", url, attempt + 1, e, delay);
                crate::runtime::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

async fn fetch_once(fetcher: &dyn TileFetcher, decoder: &dyn TileDecoder, url: &str) -> Result<TileImage> {
    let bytes = fetcher.fetch(url).await?;
    decoder.decode(&bytes)
}
