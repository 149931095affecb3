//! Minimal Supabase client: PostgREST tables and object storage.

use reqwest::header::{HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::fmt::Display;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::connectivity::Connectivity;
use super::envelope::error_message;
use super::error::ApiError;
use super::http::read_json;
use crate::session::Session;

const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";

/// Supabase project client.
///
/// Requests carry the project key in `apikey` and, in `Authorization`, the
/// session's access token when signed in (the project key otherwise).
#[derive(Clone)]
pub struct SupabaseClient {
  http: reqwest::Client,
  base_url: String,
  api_key: String,
  session: Session,
  connectivity: Connectivity,
}

impl SupabaseClient {
  pub fn new(
    base_url: &str,
    api_key: &str,
    timeout: Duration,
    session: Session,
  ) -> Result<Self, ApiError> {
    Url::parse(base_url)?;

    let http = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| ApiError::Network(format!("Failed to build HTTP client: {}", e)))?;

    Ok(Self {
      http,
      base_url: base_url.trim_end_matches('/').to_string(),
      api_key: api_key.to_string(),
      session,
      connectivity: Connectivity::default(),
    })
  }

  /// Report reachability into a flag shared with other clients.
  pub fn with_connectivity(mut self, connectivity: Connectivity) -> Self {
    self.connectivity = connectivity;
    self
  }

  /// Start a query against a table.
  pub fn table(&self, name: &str) -> TableQuery {
    TableQuery {
      client: self.clone(),
      table: name.to_string(),
      params: Vec::new(),
    }
  }

  fn request(&self, method: Method, url: Url) -> Result<RequestBuilder, ApiError> {
    let bearer = self
      .session
      .token()?
      .unwrap_or_else(|| self.api_key.clone());
    Ok(
      self
        .http
        .request(method, url)
        .header("apikey", &self.api_key)
        .bearer_auth(bearer),
    )
  }

  fn object_url(&self, bucket: &str, path: &str) -> Result<Url, ApiError> {
    Ok(Url::parse(&format!(
      "{}/storage/v1/object/{}/{}",
      self.base_url,
      bucket,
      path.trim_start_matches('/')
    ))?)
  }

  /// Upload a file into a storage bucket.
  pub async fn upload(
    &self,
    bucket: &str,
    path: &str,
    bytes: Vec<u8>,
    content_type: &str,
  ) -> Result<(), ApiError> {
    let url = self.object_url(bucket, path)?;
    debug!(bucket, path, size = bytes.len(), "storage upload");
    let request = self
      .request(Method::POST, url)?
      .header(CONTENT_TYPE, content_type)
      .header("x-upsert", "false")
      .body(bytes);
    let response = self.connectivity.dispatch(request).await?;
    read_json(response).await.map_err(as_query_error)?;
    Ok(())
  }

  /// Download a stored file.
  pub async fn download(&self, bucket: &str, path: &str) -> Result<Vec<u8>, ApiError> {
    let url = self.object_url(bucket, path)?;
    debug!(bucket, path, "storage download");
    let request = self.request(Method::GET, url)?;
    let response = self.connectivity.dispatch(request).await?;

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
      return Err(ApiError::Query(
        error_message(&body).unwrap_or_else(|| format!("download failed ({})", status)),
      ));
    }
    Ok(bytes.to_vec())
  }

  /// Delete a stored file.
  pub async fn remove(&self, bucket: &str, path: &str) -> Result<(), ApiError> {
    let url = Url::parse(&format!("{}/storage/v1/object/{}", self.base_url, bucket))?;
    debug!(bucket, path, "storage remove");
    let request = self
      .request(Method::DELETE, url)?
      .json(&json!({ "prefixes": [path] }));
    let response = self.connectivity.dispatch(request).await?;
    read_json(response).await.map_err(as_query_error)?;
    Ok(())
  }
}

/// Builder for a PostgREST request against one table.
pub struct TableQuery {
  client: SupabaseClient,
  table: String,
  params: Vec<(String, String)>,
}

impl TableQuery {
  pub fn select(mut self, columns: &str) -> Self {
    self.params.push(("select".to_string(), columns.to_string()));
    self
  }

  pub fn eq(mut self, column: &str, value: impl Display) -> Self {
    self.params.push((column.to_string(), format!("eq.{}", value)));
    self
  }

  pub fn order(mut self, column: &str, ascending: bool) -> Self {
    let direction = if ascending { "asc" } else { "desc" };
    self
      .params
      .push(("order".to_string(), format!("{}.{}", column, direction)));
    self
  }

  pub fn limit(mut self, count: u32) -> Self {
    self.params.push(("limit".to_string(), count.to_string()));
    self
  }

  pub fn offset(mut self, count: u32) -> Self {
    self.params.push(("offset".to_string(), count.to_string()));
    self
  }

  fn url(&self) -> Result<Url, ApiError> {
    let mut url = Url::parse(&format!(
      "{}/rest/v1/{}",
      self.client.base_url, self.table
    ))?;
    if !self.params.is_empty() {
      url.query_pairs_mut().extend_pairs(self.params.iter());
    }
    Ok(url)
  }

  async fn send(
    self,
    method: Method,
    build: impl FnOnce(RequestBuilder) -> RequestBuilder,
  ) -> Result<Value, ApiError> {
    let url = self.url()?;
    debug!(%method, table = %self.table, "supabase request");
    let request = build(self.client.request(method, url)?);
    let response = self.client.connectivity.dispatch(request).await?;
    read_json(response).await.map_err(as_query_error)
  }

  /// Run the query and decode every row.
  pub async fn execute<T: DeserializeOwned>(self) -> Result<Vec<T>, ApiError> {
    let value = self.send(Method::GET, |r| r).await?;
    rows(value)
  }

  /// Run the query expecting exactly one row.
  pub async fn single<T: DeserializeOwned>(self) -> Result<T, ApiError> {
    let value = self
      .send(Method::GET, |r| {
        r.header(ACCEPT, HeaderValue::from_static(SINGLE_OBJECT))
      })
      .await?;
    Ok(serde_json::from_value(value)?)
  }

  /// Insert one row and return it as stored.
  pub async fn insert<T: DeserializeOwned, B: Serialize>(self, body: &B) -> Result<T, ApiError> {
    let table = self.table.clone();
    let value = self
      .send(Method::POST, |r| {
        r.header("Prefer", "return=representation").json(body)
      })
      .await?;
    rows::<T>(value)?
      .into_iter()
      .next()
      .ok_or_else(|| ApiError::Decode(format!("insert into {} returned no rows", table)))
  }

  /// Patch every matching row and return the updated rows.
  pub async fn update<T: DeserializeOwned, B: Serialize>(
    self,
    body: &B,
  ) -> Result<Vec<T>, ApiError> {
    let value = self
      .send(Method::PATCH, |r| {
        r.header("Prefer", "return=representation").json(body)
      })
      .await?;
    rows(value)
  }

  /// Delete every matching row.
  pub async fn delete(self) -> Result<(), ApiError> {
    self.send(Method::DELETE, |r| r).await?;
    Ok(())
  }
}

fn rows<T: DeserializeOwned>(value: Value) -> Result<Vec<T>, ApiError> {
  match value {
    Value::Null => Ok(Vec::new()),
    Value::Array(_) => Ok(serde_json::from_value(value)?),
    // A single object comes back when the caller asked for one
    other => Ok(vec![serde_json::from_value(other)?]),
  }
}

/// PostgREST and storage failures surface as query errors.
fn as_query_error(e: ApiError) -> ApiError {
  match e {
    ApiError::Http { message, .. } => ApiError::Query(message),
    other => other,
  }
}
