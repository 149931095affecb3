use std::future::Future;
use std::sync::Arc;

use super::matches_term;
use crate::api::envelope::decode_list;
use crate::api::types::{User, UserRole};
use crate::api::{ApiError, ApiService};
use crate::cache::{CacheRegistry, QueryKey, ResponseCache};
use crate::query::{CacheBinding, CachedQuery, QueryOptions};

/// Platform users, read straight from the users table.
pub struct UsersStore {
  api: ApiService,
  cache: Arc<ResponseCache>,
  query: CachedQuery<Vec<User>>,
}

impl UsersStore {
  pub fn new(api: ApiService, caches: &CacheRegistry) -> Self {
    Self::with_options(api, caches, QueryOptions::default())
  }

  pub fn with_options(api: ApiService, caches: &CacheRegistry, options: QueryOptions) -> Self {
    let cache = Arc::clone(&caches.users);
    let fetch_api = api.clone();
    let query = CachedQuery::new(
      CacheBinding::new(Arc::clone(&cache), QueryKey::Users),
      options,
      move || {
        let api = fetch_api.clone();
        async move { api.get_users_raw().await }
      },
      |raw| decode_list::<User>(raw, "users"),
    );
    Self { api, cache, query }
  }

  pub fn users(&self) -> &[User] {
    self.query.data().map(Vec::as_slice).unwrap_or(&[])
  }

  pub fn is_loading(&self) -> bool {
    self.query.is_loading()
  }

  pub fn error(&self) -> Option<&str> {
    self.query.error()
  }

  pub fn poll(&mut self) -> bool {
    self.query.poll()
  }

  pub fn refresh(&mut self) {
    self.query.refetch();
  }

  pub fn active(&self) -> Vec<&User> {
    self.users().iter().filter(|u| u.is_active).collect()
  }

  pub fn search(&self, term: &str) -> Vec<&User> {
    self
      .users()
      .iter()
      .filter(|u| {
        matches_term(
          term,
          &[
            Some(u.email.as_str()),
            u.first_name.as_deref(),
            u.last_name.as_deref(),
          ],
        )
      })
      .collect()
  }

  pub fn set_active(
    &self,
    id: String,
    active: bool,
  ) -> impl Future<Output = Result<User, ApiError>> + Send + 'static {
    let api = self.api.clone();
    let cache = Arc::clone(&self.cache);
    async move {
      let user = api.set_user_active(&id, active).await?;
      cache.delete(&QueryKey::Users.cache_key());
      Ok(user)
    }
  }

  pub fn update_role(
    &self,
    id: String,
    role: UserRole,
  ) -> impl Future<Output = Result<User, ApiError>> + Send + 'static {
    let api = self.api.clone();
    let cache = Arc::clone(&self.cache);
    async move {
      let user = api.update_user_role(&id, role).await?;
      cache.delete(&QueryKey::Users.cache_key());
      Ok(user)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::service::tests::service_for;
  use serde_json::json;
  use std::time::Duration;
  use wiremock::matchers::{body_partial_json, method, path, query_param};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  fn users_body() -> serde_json::Value {
    json!([
      { "id": "u1", "email": "admin@exdesk.io", "first_name": "Ana", "last_name": "Ruiz",
        "role": "admin", "is_active": true },
      { "id": "u2", "email": "client@acme.io", "role": "CLIENT", "is_active": false }
    ])
  }

  #[tokio::test]
  async fn test_loads_from_users_table_into_users_cache() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/rest/v1/users"))
      .respond_with(ResponseTemplate::new(200).set_body_json(users_body()))
      .expect(1)
      .mount(&server)
      .await;

    let caches = CacheRegistry::default();
    let mut store = UsersStore::new(service_for(&server), &caches);
    for _ in 0..100 {
      if store.poll() {
        break;
      }
      tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(store.users().len(), 2);
    assert!(caches.users.has("users"));
    assert!(!caches.general.has("users"));
    assert_eq!(store.active().len(), 1);
    assert_eq!(store.search("ruiz")[0].id, "u1");
  }

  #[tokio::test]
  async fn test_deactivate_patches_row_and_invalidates() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
      .and(path("/rest/v1/users"))
      .and(query_param("id", "eq.u1"))
      .and(body_partial_json(json!({ "is_active": false })))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!([
        { "id": "u1", "email": "admin@exdesk.io", "role": "admin", "is_active": false }
      ])))
      .expect(1)
      .mount(&server)
      .await;

    let caches = CacheRegistry::default();
    caches.users.set("users", users_body(), None);
    let store = UsersStore::new(service_for(&server), &caches);

    let user = store.set_active("u1".to_string(), false).await.unwrap();
    assert!(!user.is_active);
    assert!(!caches.users.has("users"));
  }
}
