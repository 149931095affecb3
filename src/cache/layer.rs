//! Cache layer that orchestrates caching logic with network fetching.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::store::CacheService;
use super::traits::CacheResult;

/// Cache layer that manages the degradation ladder for reads.
///
/// This layer sits between a client and the network, providing transparent
/// caching with offline support:
///
/// 1. fresh cache entry
/// 2. live fetch (result written back to the cache)
/// 3. expired cache entry
/// 4. caller-supplied fallback value
/// 5. the fetch error
pub struct CacheLayer<V> {
  cache: Arc<CacheService<V>>,
}

impl<V: Clone> CacheLayer<V> {
  pub fn new(cache: Arc<CacheService<V>>) -> Self {
    Self { cache }
  }

  /// Walk the full ladder for `key`.
  pub async fn fetch<F, Fut, E>(
    &self,
    key: &str,
    ttl: Option<Duration>,
    fetcher: F,
    fallback: Option<V>,
  ) -> Result<CacheResult<V>, E>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<V, E>>,
    E: std::fmt::Display,
  {
    // Hold on to the stale entry before fetching; a concurrent set() may
    // purge it while we wait on the network.
    let stale = match self.cache.peek(key) {
      Some(lookup) if !lookup.expired => {
        debug!(cache = self.cache.name(), key, "fresh cache hit");
        return Ok(CacheResult::from_cache(lookup.data, lookup.age, false));
      }
      other => other,
    };

    match fetcher().await {
      Ok(data) => {
        self.cache.set(key, data.clone(), ttl);
        Ok(CacheResult::from_network(data))
      }
      Err(e) => {
        if let Some(lookup) = stale {
          warn!(key, error = %e, "fetch failed, serving expired cache entry");
          return Ok(CacheResult::from_cache(lookup.data, lookup.age, true));
        }
        if let Some(data) = fallback {
          warn!(key, error = %e, "fetch failed, serving fallback data");
          return Ok(CacheResult::fallback(data));
        }
        Err(e)
      }
    }
  }

  /// Ladder without the live rung, used while offline.
  pub fn offline(&self, key: &str, fallback: Option<V>) -> Option<CacheResult<V>> {
    if let Some(lookup) = self.cache.peek(key) {
      return Some(CacheResult::offline(lookup.data, lookup.age));
    }
    fallback.map(CacheResult::fallback)
  }
}

impl<V> Clone for CacheLayer<V> {
  fn clone(&self) -> Self {
    Self {
      cache: Arc::clone(&self.cache),
    }
  }
}
