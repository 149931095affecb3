//! Async queries for views and stores.
//!
//! `Query<T>` runs a fetcher on a spawned task and reports through a
//! channel that the UI drains on every tick. `CachedQuery<T>` binds a query
//! to one slot of a response cache: warm slots resolve without a request,
//! cold slots fetch, store the raw JSON and publish the transformed value.
//!
//! ```ignore
//! let mut contacts = CachedQuery::new(
//!     CacheBinding::new(caches.general.clone(), QueryKey::Contacts),
//!     QueryOptions::default(),
//!     move || { let api = api.clone(); async move { api.get("/contacts").await } },
//!     |raw| decode_list::<Contact>(raw, "contacts"),
//! );
//!
//! // In the tick handler
//! if contacts.poll() {
//!     // re-render
//! }
//! ```

use serde_json::Value;
use std::fmt::Display;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::cache::{QueryKey, ResponseCache};

/// The state of a query
#[derive(Debug, Clone)]
pub enum QueryState<T> {
  /// Query has not been started
  Idle,
  /// Query is currently fetching data
  Loading,
  /// Query completed successfully
  Success(T),
  /// Query failed with an error
  Error(String),
}

impl<T> QueryState<T> {
  pub fn is_loading(&self) -> bool {
    matches!(self, QueryState::Loading)
  }

  #[cfg(test)]
  pub fn is_success(&self) -> bool {
    matches!(self, QueryState::Success(_))
  }

  pub fn is_error(&self) -> bool {
    matches!(self, QueryState::Error(_))
  }

  pub fn data(&self) -> Option<&T> {
    match self {
      QueryState::Success(data) => Some(data),
      _ => None,
    }
  }

  pub fn error(&self) -> Option<&str> {
    match self {
      QueryState::Error(e) => Some(e),
      _ => None,
    }
  }
}

type BoxFuture<T> = Pin<Box<dyn Future<Output = Result<T, String>> + Send>>;

type FetcherFn<T> = Box<dyn Fn() -> BoxFuture<T> + Send + Sync>;

/// Async query with loading/success/error state.
///
/// At most one request is in flight per query. Starting another one, or
/// dropping the query, aborts the running task; an aborted request never
/// surfaces as an error.
pub struct Query<T> {
  state: QueryState<T>,
  fetcher: Option<FetcherFn<T>>,
  receiver: Option<mpsc::UnboundedReceiver<Result<T, String>>>,
  task: Option<JoinHandle<()>>,
}

impl<T: Send + 'static> Query<T> {
  /// Create a query that calls `fetcher` each time it (re)fetches.
  pub fn new<F, Fut, E>(fetcher: F) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    E: Display,
  {
    Self {
      state: QueryState::Idle,
      fetcher: Some(Box::new(move || {
        let fut = fetcher();
        Box::pin(async move { fut.await.map_err(|e| e.to_string()) })
      })),
      receiver: None,
      task: None,
    }
  }

  /// Run a single future, typically a mutation. The query starts loading
  /// immediately and cannot be refetched.
  pub fn once<Fut, E>(future: Fut) -> Self
  where
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    E: Display,
  {
    let mut query = Self {
      state: QueryState::Idle,
      fetcher: None,
      receiver: None,
      task: None,
    };
    query.spawn(Box::pin(async move { future.await.map_err(|e| e.to_string()) }));
    query
  }

  #[cfg(test)]
  pub fn state(&self) -> &QueryState<T> {
    &self.state
  }

  pub fn data(&self) -> Option<&T> {
    self.state.data()
  }

  pub fn is_loading(&self) -> bool {
    self.state.is_loading()
  }

  #[cfg(test)]
  pub fn is_success(&self) -> bool {
    self.state.is_success()
  }

  pub fn is_error(&self) -> bool {
    self.state.is_error()
  }

  pub fn error(&self) -> Option<&str> {
    self.state.error()
  }

  /// Start fetching unless a request is already running.
  pub fn fetch(&mut self) {
    if self.state.is_loading() {
      return;
    }
    self.start_fetch();
  }

  /// Abort any running request and start a new one.
  pub fn refetch(&mut self) {
    self.start_fetch();
  }

  /// Replace the state with data obtained elsewhere, aborting any request.
  pub fn set_data(&mut self, data: T) {
    self.cancel();
    self.state = QueryState::Success(data);
  }

  pub fn set_error(&mut self, error: impl Into<String>) {
    self.cancel();
    self.state = QueryState::Error(error.into());
  }

  /// Abort the running request, if any. Leaves the current state alone
  /// unless it was `Loading`, which reverts to `Idle`.
  pub fn cancel(&mut self) {
    if let Some(task) = self.task.take() {
      task.abort();
    }
    self.receiver = None;
    if self.state.is_loading() {
      self.state = QueryState::Idle;
    }
  }

  /// Drain a finished request. Returns `true` if the state changed.
  pub fn poll(&mut self) -> bool {
    let receiver = match &mut self.receiver {
      Some(rx) => rx,
      None => return false,
    };

    match receiver.try_recv() {
      Ok(Ok(data)) => {
        self.state = QueryState::Success(data);
        self.finish();
        true
      }
      Ok(Err(error)) => {
        self.state = QueryState::Error(error);
        self.finish();
        true
      }
      Err(mpsc::error::TryRecvError::Empty) => false,
      Err(mpsc::error::TryRecvError::Disconnected) => {
        // The task panicked before reporting
        self.state = QueryState::Error("Request ended without a result".to_string());
        self.finish();
        true
      }
    }
  }

  fn finish(&mut self) {
    self.receiver = None;
    self.task = None;
  }

  fn start_fetch(&mut self) {
    let Some(fetcher) = &self.fetcher else {
      return;
    };
    let future = fetcher();
    self.spawn(future);
  }

  fn spawn(&mut self, future: BoxFuture<T>) {
    self.cancel();
    let (tx, rx) = mpsc::unbounded_channel();
    self.receiver = Some(rx);
    self.state = QueryState::Loading;
    self.task = Some(tokio::spawn(async move {
      let result = future.await;
      let _ = tx.send(result);
    }));
  }
}

impl<T> Drop for Query<T> {
  fn drop(&mut self) {
    if let Some(task) = self.task.take() {
      task.abort();
    }
  }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Query<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Query")
      .field("state", &self.state)
      .field("in_flight", &self.task.is_some())
      .finish_non_exhaustive()
  }
}

/// The cache slot a `CachedQuery` reads and writes.
#[derive(Debug, Clone)]
pub struct CacheBinding {
  pub cache: Arc<ResponseCache>,
  pub key: String,
  /// What the key identifies, for logs
  pub label: String,
  /// Entry TTL; the cache default when unset
  pub ttl: Option<Duration>,
}

impl CacheBinding {
  pub fn new(cache: Arc<ResponseCache>, key: QueryKey) -> Self {
    Self {
      cache,
      key: key.cache_key(),
      label: key.description(),
      ttl: None,
    }
  }

  pub fn with_ttl(mut self, ttl: Duration) -> Self {
    self.ttl = Some(ttl);
    self
  }
}

#[derive(Debug, Clone, Copy)]
pub struct QueryOptions {
  /// Fetch as soon as the query is created
  pub immediate: bool,
  /// Skip the cache on the first fetch
  pub force_refresh: bool,
}

impl Default for QueryOptions {
  fn default() -> Self {
    Self {
      immediate: true,
      force_refresh: false,
    }
  }
}

type TransformFn<T> = Arc<dyn Fn(Value) -> Result<T, String> + Send + Sync>;

/// A query whose raw response lives in a response cache.
///
/// The cache holds the untransformed JSON; every consumer applies its own
/// transform. Two queries on the same key do not coordinate: whichever
/// response lands last is what the cache keeps.
pub struct CachedQuery<T> {
  binding: CacheBinding,
  transform: TransformFn<T>,
  query: Query<T>,
}

impl<T: Send + 'static> CachedQuery<T> {
  pub fn new<F, Fut, E, X, XE>(
    binding: CacheBinding,
    options: QueryOptions,
    fetcher: F,
    transform: X,
  ) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, E>> + Send + 'static,
    E: Display,
    X: Fn(Value) -> Result<T, XE> + Send + Sync + 'static,
    XE: Display,
  {
    let transform: TransformFn<T> =
      Arc::new(move |raw: Value| transform(raw).map_err(|e| e.to_string()));

    let query = {
      let cache = Arc::clone(&binding.cache);
      let key = binding.key.clone();
      let label = binding.label.clone();
      let ttl = binding.ttl;
      let transform = Arc::clone(&transform);
      Query::new(move || {
        let request = fetcher();
        let cache = Arc::clone(&cache);
        let key = key.clone();
        let label = label.clone();
        let transform = Arc::clone(&transform);
        async move {
          let raw = request.await.map_err(|e| e.to_string())?;
          debug!(query = %label, "caching response");
          cache.set(&key, raw.clone(), ttl);
          transform(raw)
        }
      })
    };

    let mut cached = Self {
      binding,
      transform,
      query,
    };
    if options.immediate {
      if options.force_refresh {
        cached.refetch();
      } else {
        cached.fetch();
      }
    }
    cached
  }

  pub fn data(&self) -> Option<&T> {
    self.query.data()
  }

  pub fn is_loading(&self) -> bool {
    self.query.is_loading()
  }

  pub fn error(&self) -> Option<&str> {
    self.query.error()
  }

  /// Resolve from the cache when possible, otherwise request.
  pub fn fetch(&mut self) {
    match self.binding.cache.get(&self.binding.key) {
      Some(raw) => {
        debug!(query = %self.binding.label, "served from cache");
        match (self.transform)(raw) {
          Ok(data) => self.query.set_data(data),
          Err(e) => self.query.set_error(e),
        }
      }
      None => self.query.refetch(),
    }
  }

  /// Request regardless of what the cache holds.
  pub fn refetch(&mut self) {
    self.query.refetch();
  }

  /// Drop the cached entry and request again.
  pub fn invalidate(&mut self) {
    debug!(query = %self.binding.label, "invalidated");
    self.binding.cache.delete(&self.binding.key);
    self.refetch();
  }

  pub fn poll(&mut self) -> bool {
    self.query.poll()
  }
}

impl<T: std::fmt::Debug> std::fmt::Debug for CachedQuery<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("CachedQuery")
      .field("query", &self.binding.label)
      .field("key", &self.binding.key)
      .field("query", &self.query)
      .finish_non_exhaustive()
  }
}
