//! JWKS fetching and caching.
//!
//! Fetches platform key sets over HTTPS and caches them to keep launch
//! validation off the network in the common case. A fetch failure is a
//! terminal error for the request that triggered it; retry policy belongs
//! to the caller.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};
use trellis_core::{JwkSet, JwksFetcher, LtiError, LtiResult};

/// Default TTL for cached key sets (10 minutes).
pub const DEFAULT_JWKS_CACHE_TTL: Duration = Duration::from_secs(600);

/// Bound on a single JWKS fetch.
pub const JWKS_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Cached key set with TTL tracking.
#[derive(Debug, Clone)]
struct CachedJwks {
    keys: JwkSet,
    fetched_at: Instant,
    ttl: Duration,
}

impl CachedJwks {
    fn is_expired(&self) -> bool {
        self.fetched_at.elapsed() > self.ttl
    }
}

/// TTL cache over platform JWKS endpoints.
///
/// Cloneable; clones share one cache.
#[derive(Clone)]
pub struct JwksCache {
    /// Cached key sets keyed by JWKS URL.
    cache: Arc<RwLock<HashMap<String, CachedJwks>>>,
    default_ttl: Duration,
    http_client: reqwest::Client,
}

impl JwksCache {
    /// Create a new cache with the given TTL.
    #[must_use]
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            cache: Arc::new(RwLock::new(HashMap::new())),
            default_ttl,
            http_client: reqwest::Client::builder()
                .timeout(JWKS_FETCH_TIMEOUT)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }

    /// Create a cache with a custom HTTP client.
    #[must_use]
    pub fn with_client(default_ttl: Duration, http_client: reqwest::Client) -> Self {
        Self {
            cache: Arc::new(RwLock::new(HashMap::new())),
            default_ttl,
            http_client,
        }
    }

    /// Get keys from cache or fetch from the JWKS URL.
    #[instrument(skip(self))]
    pub async fn get_keys(&self, jwks_url: &str) -> LtiResult<JwkSet> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.get(jwks_url) {
                if !cached.is_expired() {
                    debug!(jwks_url = %jwks_url, "JWKS cache hit");
                    return Ok(cached.keys.clone());
                }
            }
        }

        debug!(jwks_url = %jwks_url, "JWKS cache miss, fetching");
        self.fetch_and_cache(jwks_url).await
    }

    /// Fetch fresh keys, bypassing the cache. Use when a kid is missing
    /// from the cached set and key rotation is suspected.
    #[instrument(skip(self))]
    pub async fn get_keys_force_refresh(&self, jwks_url: &str) -> LtiResult<JwkSet> {
        info!(jwks_url = %jwks_url, "Force refreshing JWKS");
        self.fetch_and_cache(jwks_url).await
    }

    /// Remove a cached entry.
    pub async fn invalidate(&self, jwks_url: &str) {
        let mut cache = self.cache.write().await;
        if cache.remove(jwks_url).is_some() {
            debug!(jwks_url = %jwks_url, "JWKS cache entry invalidated");
        }
    }

    /// Clear all cached entries.
    pub async fn clear(&self) {
        let mut cache = self.cache.write().await;
        cache.clear();
        info!("JWKS cache cleared");
    }

    async fn fetch_and_cache(&self, jwks_url: &str) -> LtiResult<JwkSet> {
        let jwks = self.fetch_jwks(jwks_url).await?;

        let cached = CachedJwks {
            keys: jwks.clone(),
            fetched_at: Instant::now(),
            ttl: self.default_ttl,
        };

        let mut cache = self.cache.write().await;
        cache.insert(jwks_url.to_string(), cached);

        info!(
            jwks_url = %jwks_url,
            key_count = jwks.keys.len(),
            "JWKS cached"
        );

        Ok(jwks)
    }

    async fn fetch_jwks(&self, jwks_url: &str) -> LtiResult<JwkSet> {
        let response = self
            .http_client
            .get(jwks_url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| LtiError::JwksFetchFailed {
                jwks_url: jwks_url.to_string(),
                message: format!("HTTP error: {e}"),
            })?;

        if !response.status().is_success() {
            return Err(LtiError::JwksFetchFailed {
                jwks_url: jwks_url.to_string(),
                message: format!("HTTP status {}", response.status()),
            });
        }

        let jwks: JwkSet = response.json().await.map_err(|e| LtiError::JwksFetchFailed {
            jwks_url: jwks_url.to_string(),
            message: format!("JSON parse error: {e}"),
        })?;

        if jwks.keys.is_empty() {
            warn!(jwks_url = %jwks_url, "JWKS returned empty key set");
        }

        Ok(jwks)
    }
}

impl Default for JwksCache {
    fn default() -> Self {
        Self::new(DEFAULT_JWKS_CACHE_TTL)
    }
}

#[async_trait]
impl JwksFetcher for JwksCache {
    async fn fetch(&self, jwks_url: &str) -> LtiResult<JwkSet> {
        self.get_keys(jwks_url).await
    }
}
