use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use super::store::CacheService;

/// Raw API responses, stored untransformed.
pub type ResponseCache = CacheService<Value>;

/// The per-domain response caches, created once and passed to every client,
/// query and store that needs them.
#[derive(Debug, Clone)]
pub struct CacheRegistry {
  pub documents: Arc<ResponseCache>,
  pub exchanges: Arc<ResponseCache>,
  pub users: Arc<ResponseCache>,
  pub general: Arc<ResponseCache>,
}

impl CacheRegistry {
  pub fn new(max_size: usize, default_ttl: Duration) -> Self {
    let make = |name| Arc::new(CacheService::with_limits(name, max_size, default_ttl));
    Self {
      documents: make("documents"),
      exchanges: make("exchanges"),
      users: make("users"),
      general: make("general"),
    }
  }

  pub fn clear_all(&self) {
    self.documents.clear();
    self.exchanges.clear();
    self.users.clear();
    self.general.clear();
  }
}

impl Default for CacheRegistry {
  fn default() -> Self {
    Self::new(super::store::DEFAULT_MAX_SIZE, super::store::DEFAULT_TTL)
  }
}
