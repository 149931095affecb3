use std::future::Future;
use std::sync::Arc;

use super::{matches_term, require_fields};
use crate::api::envelope::decode_list;
use crate::api::types::{Contact, ContactUpdate, NewContact};
use crate::api::{ApiError, ApiService};
use crate::cache::{CacheRegistry, QueryKey, ResponseCache};
use crate::query::{CacheBinding, CachedQuery, QueryOptions};

/// Contacts list backed by the general cache.
pub struct ContactsStore {
  api: ApiService,
  cache: Arc<ResponseCache>,
  query: CachedQuery<Vec<Contact>>,
}

impl ContactsStore {
  pub fn new(api: ApiService, caches: &CacheRegistry) -> Self {
    Self::with_options(api, caches, QueryOptions::default())
  }

  pub fn with_options(api: ApiService, caches: &CacheRegistry, options: QueryOptions) -> Self {
    let cache = Arc::clone(&caches.general);
    let fetch_api = api.clone();
    let query = CachedQuery::new(
      CacheBinding::new(Arc::clone(&cache), QueryKey::Contacts),
      options,
      move || {
        let api = fetch_api.clone();
        async move { api.get("/contacts").await }
      },
      |raw| decode_list::<Contact>(raw, "contacts"),
    );
    Self { api, cache, query }
  }

  pub fn contacts(&self) -> &[Contact] {
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

  /// Match name, email or company.
  pub fn search(&self, term: &str) -> Vec<&Contact> {
    self
      .contacts()
      .iter()
      .filter(|c| {
        matches_term(
          term,
          &[
            Some(c.first_name.as_str()),
            Some(c.last_name.as_str()),
            Some(c.email.as_str()),
            c.company.as_deref(),
          ],
        )
      })
      .collect()
  }

  pub fn create(
    &self,
    contact: NewContact,
  ) -> impl Future<Output = Result<Contact, ApiError>> + Send + 'static {
    let api = self.api.clone();
    let cache = Arc::clone(&self.cache);
    async move {
      require_fields(&[&contact.first_name, &contact.last_name, &contact.email])?;
      let created = api.create_contact(&contact).await?;
      cache.delete(&QueryKey::Contacts.cache_key());
      Ok(created)
    }
  }

  pub fn update(
    &self,
    id: String,
    update: ContactUpdate,
  ) -> impl Future<Output = Result<Contact, ApiError>> + Send + 'static {
    let api = self.api.clone();
    let cache = Arc::clone(&self.cache);
    async move {
      let updated = api.update_contact(&id, &update).await?;
      cache.delete(&QueryKey::Contacts.cache_key());
      Ok(updated)
    }
  }

  pub fn delete(&self, id: String) -> impl Future<Output = Result<(), ApiError>> + Send + 'static {
    let api = self.api.clone();
    let cache = Arc::clone(&self.cache);
    async move {
      api.delete_contact(&id).await?;
      cache.delete(&QueryKey::Contacts.cache_key());
      Ok(())
    }
  }
}
