use std::collections::BTreeSet;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use super::require_fields;
use crate::api::envelope::decode_list;
use crate::api::types::{Document, DocumentUpload};
use crate::api::{ApiError, ApiService};
use crate::cache::{CacheRegistry, QueryKey, ResponseCache};
use crate::query::{CacheBinding, CachedQuery, QueryOptions};

/// Document metadata backed by the documents cache. File bodies are never
/// cached.
pub struct DocumentsStore {
  api: ApiService,
  cache: Arc<ResponseCache>,
  key: QueryKey,
  query: CachedQuery<Vec<Document>>,
}

impl DocumentsStore {
  pub fn new(api: ApiService, caches: &CacheRegistry, exchange_id: Option<String>) -> Self {
    Self::with_options(api, caches, exchange_id, QueryOptions::default())
  }

  pub fn with_options(
    api: ApiService,
    caches: &CacheRegistry,
    exchange_id: Option<String>,
    options: QueryOptions,
  ) -> Self {
    let cache = Arc::clone(&caches.documents);
    let key = QueryKey::Documents {
      exchange_id: exchange_id.clone(),
    };
    let fetch_api = api.clone();
    let query = CachedQuery::new(
      CacheBinding::new(Arc::clone(&cache), key.clone()),
      options,
      move || {
        let api = fetch_api.clone();
        let exchange_id = exchange_id.clone();
        async move { api.get_documents_raw(exchange_id.as_deref()).await }
      },
      |raw| decode_list::<Document>(raw, "documents"),
    );
    Self {
      api,
      cache,
      key,
      query,
    }
  }

  pub fn documents(&self) -> &[Document] {
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

  pub fn by_category(&self, category: &str) -> Vec<&Document> {
    self
      .documents()
      .iter()
      .filter(|d| d.category.eq_ignore_ascii_case(category))
      .collect()
  }

  /// Distinct categories in display order.
  pub fn categories(&self) -> Vec<&str> {
    self
      .documents()
      .iter()
      .map(|d| d.category.as_str())
      .collect::<BTreeSet<_>>()
      .into_iter()
      .collect()
  }

  pub fn total_size(&self) -> u64 {
    self.documents().iter().map(|d| d.file_size).sum()
  }

  pub fn upload(
    &self,
    upload: DocumentUpload,
  ) -> impl Future<Output = Result<Document, ApiError>> + Send + 'static {
    let api = self.api.clone();
    let cache = Arc::clone(&self.cache);
    let key = self.key.cache_key();
    async move { send_upload(&api, &cache, &key, upload).await }
  }

  /// Read `path` from disk into `upload` and send it.
  pub fn upload_file(
    &self,
    path: PathBuf,
    upload: DocumentUpload,
  ) -> impl Future<Output = Result<Document, ApiError>> + Send + 'static {
    let api = self.api.clone();
    let cache = Arc::clone(&self.cache);
    let key = self.key.cache_key();
    async move {
      // An empty path leaves the body empty, which the service rejects
      let bytes = if path.as_os_str().is_empty() {
        Vec::new()
      } else {
        tokio::fs::read(&path).await.map_err(|e| {
          ApiError::Validation(format!("Failed to read {}: {}", path.display(), e))
        })?
      };
      send_upload(&api, &cache, &key, DocumentUpload { bytes, ..upload }).await
    }
  }

  pub fn download(
    &self,
    document: Document,
  ) -> impl Future<Output = Result<Vec<u8>, ApiError>> + Send + 'static {
    let api = self.api.clone();
    async move { api.download_document(&document).await }
  }

  pub fn delete(
    &self,
    document: Document,
  ) -> impl Future<Output = Result<(), ApiError>> + Send + 'static {
    let api = self.api.clone();
    let cache = Arc::clone(&self.cache);
    let key = self.key.cache_key();
    async move {
      api.delete_document(&document).await?;
      invalidate_documents(&cache, &key);
      Ok(())
    }
  }
}

async fn send_upload(
  api: &ApiService,
  cache: &ResponseCache,
  key: &str,
  upload: DocumentUpload,
) -> Result<Document, ApiError> {
  require_fields(&[&upload.category])?;
  let document = api.upload_document(upload).await?;
  invalidate_documents(cache, key);
  Ok(document)
}

fn invalidate_documents(cache: &ResponseCache, key: &str) {
  cache.delete(key);
  cache.delete(&QueryKey::Documents { exchange_id: None }.cache_key());
}

/// Human-readable byte count.
pub fn format_size(bytes: u64) -> String {
  const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
  let mut size = bytes as f64;
  let mut unit = 0;
  while size >= 1024.0 && unit < UNITS.len() - 1 {
    size /= 1024.0;
    unit += 1;
  }
  if unit == 0 {
    format!("{} B", bytes)
  } else {
    format!("{:.1} {}", size, UNITS[unit])
  }
}
