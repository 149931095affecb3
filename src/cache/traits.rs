//! Result metadata shared by the cache-aware fetch paths.

use std::time::Duration;

/// Result from a cache-aware fetch, including data and where it came from.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
  /// Age of the cached entry (if served from cache)
  pub age: Option<Duration>,
}

impl<T> CacheResult<T> {
  /// Fresh data from the network.
  pub fn from_network(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Network,
      age: None,
    }
  }

  /// Data served from cache.
  pub fn from_cache(data: T, age: Duration, is_stale: bool) -> Self {
    Self {
      data,
      source: if is_stale {
        CacheSource::CacheStale
      } else {
        CacheSource::CacheFresh
      },
      age: Some(age),
    }
  }

  /// Stale data served because the network is known to be down.
  pub fn offline(data: T, age: Duration) -> Self {
    Self {
      data,
      source: CacheSource::Offline,
      age: Some(age),
    }
  }

  /// Static sample data served after every other source failed.
  pub fn fallback(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Fallback,
      age: None,
    }
  }

  /// Convert the payload, keeping where it came from.
  pub fn try_map<U, E>(self, f: impl FnOnce(T) -> Result<U, E>) -> Result<CacheResult<U>, E> {
    Ok(CacheResult {
      data: f(self.data)?,
      source: self.source,
      age: self.age,
    })
  }

  /// Whether the data did not come from a fresh source.
  pub fn is_degraded(&self) -> bool {
    matches!(
      self.source,
      CacheSource::CacheStale | CacheSource::Offline | CacheSource::Fallback
    )
  }
}

/// Indicates where data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fresh data from network
  Network,
  /// Data from cache, still within its TTL
  CacheFresh,
  /// Data from cache past its TTL, served because the fetch failed
  CacheStale,
  /// Offline mode - network unavailable, serving cached data
  Offline,
  /// Built-in sample data
  Fallback,
}

impl CacheSource {
  pub fn label(&self) -> &'static str {
    match self {
      CacheSource::Network => "live",
      CacheSource::CacheFresh => "cached",
      CacheSource::CacheStale => "stale",
      CacheSource::Offline => "offline",
      CacheSource::Fallback => "sample data",
    }
  }
}
