use color_eyre::Result;
use std::sync::Arc;
use tokio::sync::watch;

use crate::api::{
  ApiService, AuthEvent, BackendClient, ClearSessionPolicy, IgnoreUnauthorized, SmartApiService,
  SmartOptions, SupabaseClient, UnauthorizedPolicy,
};
use crate::cache::CacheRegistry;
use crate::config::Config;
use crate::session::Session;

/// Shared services handed to every view.
#[derive(Clone)]
pub struct AppContext {
  pub config: Arc<Config>,
  pub session: Session,
  pub caches: CacheRegistry,
  pub api: ApiService,
  pub smart: SmartApiService,
}

impl AppContext {
  /// Services for the interactive console: a rejected session is cleared
  /// and the header shows the login banner.
  pub fn new(config: Config, session: Session) -> Result<Self> {
    let initial = if session.is_signed_in() {
      AuthEvent::SignedIn
    } else {
      AuthEvent::SignedOut
    };
    let (tx, _) = watch::channel(initial);
    let events = Arc::new(tx);
    let policy = Arc::new(ClearSessionPolicy::new(Arc::clone(&events)));
    Self::build(config, session, policy, events)
  }

  /// Services for one-shot CLI commands, which leave the session alone on 401.
  pub fn headless(config: Config, session: Session) -> Result<Self> {
    let (tx, _) = watch::channel(AuthEvent::SignedOut);
    Self::build(config, session, Arc::new(IgnoreUnauthorized), Arc::new(tx))
  }

  fn build(
    config: Config,
    session: Session,
    policy: Arc<dyn UnauthorizedPolicy>,
    events: Arc<watch::Sender<AuthEvent>>,
  ) -> Result<Self> {
    let supabase_key = Config::get_supabase_key()?;
    let backend = BackendClient::new(
      &config.api.url,
      config.timeout(),
      session.clone(),
      policy,
      events,
    )?;
    let db = SupabaseClient::new(
      &config.api.supabase_url,
      &supabase_key,
      config.timeout(),
      session.clone(),
    )?
    .with_connectivity(backend.connectivity().clone());

    let caches = CacheRegistry::new(config.cache.max_size, config.cache_ttl());
    let api = ApiService::new(backend.clone(), db);
    let smart = SmartApiService::new(
      backend,
      caches.clone(),
      SmartOptions {
        use_fallback: config.smart.use_fallback,
        demo_credentials: config.demo_credentials(),
        ttl: Some(config.cache_ttl()),
      },
    );

    Ok(Self {
      config: Arc::new(config),
      session,
      caches,
      api,
      smart,
    })
  }

  /// Header title: the configured one, or the backend host.
  pub fn title(&self) -> String {
    match &self.config.title {
      Some(title) => title.clone(),
      None => extract_host(&self.config.api.url).to_string(),
    }
  }

  pub fn auth_events(&self) -> watch::Receiver<AuthEvent> {
    self.api.backend().auth_events()
  }
}

fn extract_host(url: &str) -> &str {
  url
    .strip_prefix("https://")
    .or_else(|| url.strip_prefix("http://"))
    .unwrap_or(url)
    .split('/')
    .next()
    .unwrap_or(url)
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;
  use crate::api::service::tests::service_for;
  use wiremock::MockServer;

  /// Context wired to a mock server, for view tests.
  pub(crate) fn context_for(server: &MockServer) -> AppContext {
    let config = Config {
      api: crate::config::ApiConfig {
        url: server.uri(),
        supabase_url: server.uri(),
        timeout_secs: 5,
      },
      cache: Default::default(),
      smart: Default::default(),
      default_view: None,
      title: Some("Test Desk".to_string()),
    };
    let api = service_for(server);
    let caches = CacheRegistry::default();
    let smart = SmartApiService::new(api.backend().clone(), caches.clone(), SmartOptions::default());
    AppContext {
      config: Arc::new(config),
      session: api.backend().session().clone(),
      caches,
      api,
      smart,
    }
  }

  #[tokio::test]
  async fn test_entity_calls_drive_online_flag() {
    let server = MockServer::start().await;
    let ctx = context_for(&server);
    let mut changes = ctx.smart.subscribe();
    drop(server);

    assert!(ctx.smart.is_online());
    let err = ctx.api.get("/contacts").await.unwrap_err();
    assert!(err.is_network());
    assert!(!ctx.smart.is_online());
    assert!(changes.has_changed().unwrap());

    ctx.smart.set_online(true);
    let err = ctx.api.get_users_raw().await.unwrap_err();
    assert!(err.is_network());
    assert!(!ctx.smart.is_online());
  }

  #[test]
  fn test_extract_host() {
    assert_eq!(extract_host("https://api.exdesk.io/api"), "api.exdesk.io");
    assert_eq!(extract_host("http://localhost:5001"), "localhost:5001");
    assert_eq!(extract_host("backend"), "backend");
  }
}
