//! Resilient API access: online tracking, session recovery, and the cache
//! and fallback ladder for reads.

use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::envelope::{decode_list, decode_one};
use super::error::ApiError;
use super::fallback;
use super::http::BackendClient;
use super::types::{Contact, DashboardStats, Document, ExchangesResponse, Task, User};
use crate::cache::{CacheLayer, CacheRegistry, CacheResult, QueryKey, ResponseCache};

/// Credentials used to sign in again when a refresh fails.
#[derive(Clone)]
pub struct DemoCredentials {
  pub email: String,
  pub password: String,
}

impl std::fmt::Debug for DemoCredentials {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("DemoCredentials")
      .field("email", &self.email)
      .finish_non_exhaustive()
  }
}

#[derive(Debug, Clone, Default)]
pub struct SmartOptions {
  /// Serve built-in sample data when nothing else is available
  pub use_fallback: bool,
  pub demo_credentials: Option<DemoCredentials>,
  /// TTL for responses written to the cache; the cache default when unset
  pub ttl: Option<Duration>,
}

/// API client that degrades instead of failing.
///
/// Reads walk: fresh cache → live request → expired cache → sample data.
/// A 401 triggers one token refresh (then a demo login, if configured) and a
/// single retry of the original request.
#[derive(Clone)]
pub struct SmartApiService {
  backend: BackendClient,
  caches: CacheRegistry,
  options: SmartOptions,
}

impl SmartApiService {
  pub fn new(backend: BackendClient, caches: CacheRegistry, options: SmartOptions) -> Self {
    Self {
      backend,
      caches,
      options,
    }
  }

  pub fn backend(&self) -> &BackendClient {
    &self.backend
  }

  pub fn caches(&self) -> &CacheRegistry {
    &self.caches
  }

  /// Shared with `ApiService`, so any request through either flips it.
  pub fn is_online(&self) -> bool {
    self.backend.connectivity().is_online()
  }

  pub fn set_online(&self, online: bool) {
    self.backend.connectivity().set_online(online);
  }

  /// Receive online/offline transitions.
  pub fn subscribe(&self) -> watch::Receiver<bool> {
    self.backend.connectivity().subscribe()
  }

  /// Check reachability. Any HTTP answer counts as online.
  pub async fn probe(&self) -> bool {
    let reachable = match self.backend.execute(Method::GET, "/health", None).await {
      Err(e) => !e.is_network(),
      Ok(_) => true,
    };
    self.set_online(reachable);
    reachable
  }

  fn cache_for(&self, path: &str) -> &Arc<ResponseCache> {
    let route = path.trim_start_matches('/');
    if route.starts_with("documents") {
      &self.caches.documents
    } else if route.starts_with("exchanges") {
      &self.caches.exchanges
    } else if route.starts_with("users") {
      &self.caches.users
    } else {
      &self.caches.general
    }
  }

  /// Try to get a usable token after a 401.
  async fn recover_session(&self) -> Result<(), ApiError> {
    match self.backend.refresh().await {
      Ok(()) => return Ok(()),
      Err(e) => warn!(error = %e, "token refresh failed"),
    }

    if let Some(demo) = &self.options.demo_credentials {
      match self.backend.login(&demo.email, &demo.password).await {
        Ok(_) => {
          info!(email = %demo.email, "signed in with demo credentials");
          return Ok(());
        }
        Err(e) => warn!(error = %e, "demo login failed"),
      }
    }

    self.backend.reject_session();
    Err(ApiError::Unauthorized)
  }

  async fn request_with_retry(
    &self,
    method: Method,
    path: &str,
    body: Option<&Value>,
  ) -> Result<Value, ApiError> {
    let first = self.backend.execute(method.clone(), path, body).await;
    match first {
      Err(ApiError::Unauthorized) => {
        debug!(path, "401, attempting session recovery");
        self.recover_session().await?;
        let retried = self.backend.execute(method, path, body).await;
        if matches!(retried, Err(ApiError::Unauthorized)) {
          self.backend.reject_session();
        }
        retried
      }
      other => other,
    }
  }

  /// GET through the cache and fallback ladder.
  pub async fn get(&self, path: &str) -> Result<CacheResult<Value>, ApiError> {
    let layer = CacheLayer::new(Arc::clone(self.cache_for(path)));
    let key = key_for_path(path);
    let fallback = if self.options.use_fallback {
      fallback::payload_for(path)
    } else {
      None
    };

    if !self.is_online() {
      debug!(path, "offline, skipping network");
      return layer
        .offline(&key, fallback)
        .ok_or_else(|| ApiError::NoFallback(path.to_string()));
    }

    layer
      .fetch(
        &key,
        self.options.ttl,
        || self.request_with_retry(Method::GET, path, None),
        fallback,
      )
      .await
  }

  /// POST with session recovery. Never served from cache or fallback.
  pub async fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<Value, ApiError> {
    let body = serde_json::to_value(body)?;
    let value = self
      .request_with_retry(Method::POST, path, Some(&body))
      .await?;
    self.invalidate_collection(path);
    Ok(value)
  }

  /// PUT with session recovery. Never served from cache or fallback.
  pub async fn put<B: Serialize>(&self, path: &str, body: &B) -> Result<Value, ApiError> {
    let body = serde_json::to_value(body)?;
    let value = self
      .request_with_retry(Method::PUT, path, Some(&body))
      .await?;
    self.invalidate_collection(path);
    Ok(value)
  }

  /// Drop the cached list a write affects.
  fn invalidate_collection(&self, path: &str) {
    let route = path.split('?').next().unwrap_or(path);
    let collection = route
      .trim_start_matches('/')
      .split('/')
      .next()
      .unwrap_or_default();
    let key = key_for_path(&format!("/{}", collection));
    if self.cache_for(path).delete(&key) {
      debug!(key, "cache invalidated after write");
    }
  }

  pub async fn get_exchanges(&self) -> Result<CacheResult<ExchangesResponse>, ApiError> {
    let result = self.get("/exchanges").await?;
    result.try_map(|v| {
      Ok(ExchangesResponse {
        exchanges: decode_list(v, "exchanges")?,
      })
    })
  }

  pub async fn get_tasks(&self) -> Result<CacheResult<Vec<Task>>, ApiError> {
    self.get("/tasks").await?.try_map(|v| decode_list(v, "tasks"))
  }

  pub async fn get_contacts(&self) -> Result<CacheResult<Vec<Contact>>, ApiError> {
    self.get("/contacts").await?.try_map(|v| decode_list(v, "contacts"))
  }

  pub async fn get_users(&self) -> Result<CacheResult<Vec<User>>, ApiError> {
    self.get("/users").await?.try_map(|v| decode_list(v, "users"))
  }

  pub async fn get_documents(&self) -> Result<CacheResult<Vec<Document>>, ApiError> {
    self.get("/documents").await?.try_map(|v| decode_list(v, "documents"))
  }

  pub async fn get_dashboard_stats(&self) -> Result<CacheResult<DashboardStats>, ApiError> {
    self.get("/dashboard/stats").await?.try_map(|v| decode_one(v, "stats"))
  }
}

/// Cache key for a backend path. Known list routes share their keys with
/// the entity stores.
fn key_for_path(path: &str) -> String {
  let known = match path {
    "/contacts" => Some(QueryKey::Contacts),
    "/exchanges" => Some(QueryKey::Exchanges),
    "/tasks" => Some(QueryKey::Tasks { exchange_id: None }),
    "/users" => Some(QueryKey::Users),
    "/documents" => Some(QueryKey::Documents { exchange_id: None }),
    "/dashboard/stats" => Some(QueryKey::DashboardStats),
    "/notifications/preferences" => Some(QueryKey::NotificationPreferences),
    "/integrations/practicepanther/status" => Some(QueryKey::PracticePantherStatus),
    "/integrations/practicepanther/sync-logs" => Some(QueryKey::PracticePantherSyncLogs),
    _ => None,
  };
  match known {
    Some(key) => key.cache_key(),
    None => path.trim_start_matches('/').to_string(),
  }
}
