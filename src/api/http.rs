//! Authenticated JSON client for the backend REST API.

use reqwest::{Method, Response, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};
use url::Url;

use super::auth::{AuthEvent, UnauthorizedPolicy};
use super::connectivity::Connectivity;
use super::envelope::{decode_one, error_message};
use super::error::ApiError;
use super::types::LoginResponse;
use crate::session::Session;

/// Backend REST client.
///
/// Every call carries `Authorization: Bearer <token>` from the session. The
/// guarded helpers (`get`, `post`, ...) hand unrecoverable 401s to the
/// configured [`UnauthorizedPolicy`]; `execute` returns them untouched so
/// callers can attempt their own recovery first.
#[derive(Clone)]
pub struct BackendClient {
  http: reqwest::Client,
  base_url: String,
  session: Session,
  on_unauthorized: Arc<dyn UnauthorizedPolicy>,
  auth_events: Arc<watch::Sender<AuthEvent>>,
  connectivity: Connectivity,
}

impl BackendClient {
  pub fn new(
    base_url: &str,
    timeout: Duration,
    session: Session,
    on_unauthorized: Arc<dyn UnauthorizedPolicy>,
    auth_events: Arc<watch::Sender<AuthEvent>>,
  ) -> Result<Self, ApiError> {
    // Validate up front so per-request joins cannot fail on the base
    Url::parse(base_url)?;

    let http = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| ApiError::Network(format!("Failed to build HTTP client: {}", e)))?;

    Ok(Self {
      http,
      base_url: base_url.trim_end_matches('/').to_string(),
      session,
      on_unauthorized,
      auth_events,
      connectivity: Connectivity::default(),
    })
  }

  pub fn session(&self) -> &Session {
    &self.session
  }

  pub fn connectivity(&self) -> &Connectivity {
    &self.connectivity
  }

  pub fn auth_events(&self) -> watch::Receiver<AuthEvent> {
    self.auth_events.subscribe()
  }

  fn url(&self, path: &str) -> Result<Url, ApiError> {
    let path = path.trim_start_matches('/');
    Ok(Url::parse(&format!("{}/{}", self.base_url, path))?)
  }

  async fn send(
    &self,
    method: Method,
    path: &str,
    body: Option<&Value>,
    with_token: bool,
  ) -> Result<Value, ApiError> {
    let url = self.url(path)?;
    debug!(%method, path, "backend request");

    let mut request = self.http.request(method, url);
    if with_token {
      if let Some(token) = self.session.token()? {
        request = request.bearer_auth(token);
      }
    }
    if let Some(body) = body {
      request = request.json(body);
    }

    let response = self.connectivity.dispatch(request).await?;
    read_json(response).await
  }

  /// Perform a request and return 401s as `ApiError::Unauthorized` without
  /// invoking the unauthorized policy.
  pub async fn execute(
    &self,
    method: Method,
    path: &str,
    body: Option<&Value>,
  ) -> Result<Value, ApiError> {
    self.send(method, path, body, true).await
  }

  async fn guarded(
    &self,
    method: Method,
    path: &str,
    body: Option<&Value>,
  ) -> Result<Value, ApiError> {
    match self.execute(method, path, body).await {
      Err(ApiError::Unauthorized) => {
        self.reject_session();
        Err(ApiError::Unauthorized)
      }
      other => other,
    }
  }

  /// Apply the unauthorized policy.
  pub fn reject_session(&self) {
    self.on_unauthorized.on_unauthorized(&self.session);
  }

  pub async fn get(&self, path: &str) -> Result<Value, ApiError> {
    self.guarded(Method::GET, path, None).await
  }

  pub async fn post(&self, path: &str, body: &Value) -> Result<Value, ApiError> {
    self.guarded(Method::POST, path, Some(body)).await
  }

  pub async fn put(&self, path: &str, body: &Value) -> Result<Value, ApiError> {
    self.guarded(Method::PUT, path, Some(body)).await
  }

  pub async fn delete(&self, path: &str) -> Result<Value, ApiError> {
    self.guarded(Method::DELETE, path, None).await
  }

  /// Exchange credentials for tokens and persist them.
  pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError> {
    let body = json!({ "email": email, "password": password });
    let value = self
      .send(Method::POST, "/auth/login", Some(&body), false)
      .await
      .map_err(|e| match e {
        ApiError::Unauthorized => ApiError::Validation("Invalid email or password".to_string()),
        other => other,
      })?;
    let login: LoginResponse = decode_one(value, "session")?;

    self
      .session
      .store_tokens(&login.token, login.refresh_token.as_deref())?;
    if let Some(user) = &login.user {
      self.session.store_user(user)?;
    }
    info!(email, "signed in");
    self.auth_events.send_replace(AuthEvent::SignedIn);
    Ok(login)
  }

  /// Trade the stored refresh token for a new access token.
  pub async fn refresh(&self) -> Result<(), ApiError> {
    let refresh_token = self
      .session
      .refresh_token()?
      .ok_or(ApiError::Unauthorized)?;

    let body = json!({ "refreshToken": refresh_token });
    let value = self
      .send(Method::POST, "/auth/refresh", Some(&body), false)
      .await?;
    let refreshed: LoginResponse = decode_one(value, "session")?;

    self
      .session
      .store_tokens(&refreshed.token, refreshed.refresh_token.as_deref())?;
    debug!("access token refreshed");
    Ok(())
  }

  pub fn logout(&self) -> Result<(), ApiError> {
    self.session.clear()?;
    self.auth_events.send_replace(AuthEvent::SignedOut);
    Ok(())
  }
}

/// Append URL-encoded query parameters to a path.
pub fn with_query(path: &str, params: &[(&str, String)]) -> String {
  if params.is_empty() {
    return path.to_string();
  }
  let query = url::form_urlencoded::Serializer::new(String::new())
    .extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())))
    .finish();
  format!("{}?{}", path, query)
}

/// Read a JSON body, mapping non-2xx statuses to errors. Empty bodies
/// (204 No Content) read as `null`.
pub(crate) async fn read_json(response: Response) -> Result<Value, ApiError> {
  let status = response.status();
  let bytes = response
    .bytes()
    .await
    .map_err(|e| ApiError::Network(e.to_string()))?;

  if status == StatusCode::UNAUTHORIZED {
    return Err(ApiError::Unauthorized);
  }

  if !status.is_success() {
    let body: Value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    let message = error_message(&body)
      .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
    return Err(ApiError::Http { status, message });
  }

  if bytes.is_empty() {
    return Ok(Value::Null);
  }
  Ok(serde_json::from_slice(&bytes)?)
}
