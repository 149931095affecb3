//! Bounded, TTL-expiring in-memory store.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Default time-to-live for entries set without an explicit TTL.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Default maximum number of entries per store.
pub const DEFAULT_MAX_SIZE: usize = 100;

/// A single cached value with the moment it was written and its lifetime.
#[derive(Debug, Clone)]
pub struct CacheItem<V> {
  pub data: V,
  pub timestamp: Instant,
  pub ttl: Duration,
}

impl<V> CacheItem<V> {
  fn is_expired(&self, now: Instant) -> bool {
    now.saturating_duration_since(self.timestamp) > self.ttl
  }
}

/// Result of [`CacheService::peek`]: the entry regardless of expiry.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheLookup<V> {
  pub data: V,
  pub expired: bool,
  pub age: Duration,
}

struct Inner<V> {
  entries: HashMap<String, CacheItem<V>>,
  /// Keys in insertion order; the front is evicted first.
  order: VecDeque<String>,
}

impl<V> Inner<V> {
  fn remove(&mut self, key: &str) -> Option<CacheItem<V>> {
    let item = self.entries.remove(key)?;
    if let Some(pos) = self.order.iter().position(|k| k == key) {
      self.order.remove(pos);
    }
    Some(item)
  }

  fn purge_expired(&mut self, now: Instant) -> usize {
    let expired: Vec<String> = self
      .entries
      .iter()
      .filter(|(_, item)| item.is_expired(now))
      .map(|(key, _)| key.clone())
      .collect();
    for key in &expired {
      self.remove(key);
    }
    expired.len()
  }
}

/// Key/value store with per-entry TTL and a hard size bound.
///
/// Expiry is lazy: an expired entry reads as absent immediately, but is only
/// physically removed by the next `get`, `set` or `cleanup` that sees it.
/// When full, the entry inserted first is evicted (FIFO, not LRU).
pub struct CacheService<V> {
  name: &'static str,
  inner: Mutex<Inner<V>>,
  max_size: usize,
  default_ttl: Duration,
}

impl<V: Clone> CacheService<V> {
  pub fn new(name: &'static str) -> Self {
    Self::with_limits(name, DEFAULT_MAX_SIZE, DEFAULT_TTL)
  }

  pub fn with_limits(name: &'static str, max_size: usize, default_ttl: Duration) -> Self {
    Self {
      name,
      inner: Mutex::new(Inner {
        entries: HashMap::new(),
        order: VecDeque::new(),
      }),
      max_size: max_size.max(1),
      default_ttl,
    }
  }

  pub fn name(&self) -> &'static str {
    self.name
  }

  pub fn max_size(&self) -> usize {
    self.max_size
  }

  pub fn default_ttl(&self) -> Duration {
    self.default_ttl
  }

  // Nothing in here can leave the maps inconsistent mid-update, so a
  // poisoned lock is still safe to use.
  fn lock(&self) -> MutexGuard<'_, Inner<V>> {
    self.inner.lock().unwrap_or_else(|e| e.into_inner())
  }

  /// Insert or overwrite `key`. Purges expired entries first, then evicts the
  /// oldest insertion if a new key would exceed the bound.
  pub fn set(&self, key: &str, data: V, ttl: Option<Duration>) {
    let now = Instant::now();
    let mut inner = self.lock();
    inner.purge_expired(now);

    let item = CacheItem {
      data,
      timestamp: now,
      ttl: ttl.unwrap_or(self.default_ttl),
    };

    if let Some(existing) = inner.entries.get_mut(key) {
      // Overwrite keeps the original insertion slot
      *existing = item;
      return;
    }

    while inner.entries.len() >= self.max_size {
      let Some(oldest) = inner.order.pop_front() else {
        break;
      };
      inner.entries.remove(&oldest);
      debug!(cache = self.name, key = %oldest, "evicted oldest entry");
    }

    inner.entries.insert(key.to_string(), item);
    inner.order.push_back(key.to_string());
  }

  /// Get a live value. An expired entry is deleted and reads as `None`.
  pub fn get(&self, key: &str) -> Option<V> {
    let now = Instant::now();
    let mut inner = self.lock();
    let expired = inner.entries.get(key)?.is_expired(now);
    if expired {
      inner.remove(key);
      debug!(cache = self.name, key, "entry expired");
      return None;
    }
    inner.entries.get(key).map(|item| item.data.clone())
  }

  pub fn has(&self, key: &str) -> bool {
    self.get(key).is_some()
  }

  /// Read an entry without applying expiry, so callers can serve stale data.
  pub fn peek(&self, key: &str) -> Option<CacheLookup<V>> {
    let now = Instant::now();
    let inner = self.lock();
    inner.entries.get(key).map(|item| CacheLookup {
      data: item.data.clone(),
      expired: item.is_expired(now),
      age: now.saturating_duration_since(item.timestamp),
    })
  }

  pub fn delete(&self, key: &str) -> bool {
    self.lock().remove(key).is_some()
  }

  pub fn clear(&self) {
    let mut inner = self.lock();
    inner.entries.clear();
    inner.order.clear();
  }

  /// Remove every expired entry, returning how many were purged.
  pub fn cleanup(&self) -> usize {
    self.lock().purge_expired(Instant::now())
  }

  /// Physical entry count, including expired entries not yet purged.
  pub fn len(&self) -> usize {
    self.lock().entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

impl<V> std::fmt::Debug for CacheService<V> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("CacheService")
      .field("name", &self.name)
      .field("max_size", &self.max_size)
      .field("default_ttl", &self.default_ttl)
      .finish_non_exhaustive()
  }
}
