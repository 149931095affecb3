//! Typed CRUD façade over the backend REST API and Supabase.

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, error, info};

use super::envelope::{decode_list, decode_one};
use super::error::ApiError;
use super::http::{with_query, BackendClient};
use super::supabase::SupabaseClient;
use super::types::*;

pub const DOCUMENTS_BUCKET: &str = "documents";

/// Entity-level API used by stores and views.
#[derive(Clone)]
pub struct ApiService {
  backend: BackendClient,
  db: SupabaseClient,
}

impl ApiService {
  pub fn new(backend: BackendClient, db: SupabaseClient) -> Self {
    Self { backend, db }
  }

  pub fn backend(&self) -> &BackendClient {
    &self.backend
  }

  // --------------------------------------------------------------------------
  // Generic backend verbs
  // --------------------------------------------------------------------------

  pub async fn get(&self, path: &str) -> Result<Value, ApiError> {
    debug!(path, "GET");
    self.backend.get(path).await.inspect_err(|e| {
      error!(path, error = %e, "GET failed");
    })
  }

  pub async fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<Value, ApiError> {
    debug!(path, "POST");
    let body = serde_json::to_value(body)?;
    self.backend.post(path, &body).await.inspect_err(|e| {
      error!(path, error = %e, "POST failed");
    })
  }

  pub async fn put<B: Serialize>(&self, path: &str, body: &B) -> Result<Value, ApiError> {
    debug!(path, "PUT");
    let body = serde_json::to_value(body)?;
    self.backend.put(path, &body).await.inspect_err(|e| {
      error!(path, error = %e, "PUT failed");
    })
  }

  pub async fn delete(&self, path: &str) -> Result<Value, ApiError> {
    debug!(path, "DELETE");
    self.backend.delete(path).await.inspect_err(|e| {
      error!(path, error = %e, "DELETE failed");
    })
  }

  async fn get_list<T: DeserializeOwned>(
    &self,
    path: &str,
    field: &str,
  ) -> Result<Vec<T>, ApiError> {
    decode_list(self.get(path).await?, field)
  }

  async fn get_one<T: DeserializeOwned>(&self, path: &str, field: &str) -> Result<T, ApiError> {
    decode_one(self.get(path).await?, field)
  }

  // --------------------------------------------------------------------------
  // Users (Supabase)
  // --------------------------------------------------------------------------

  /// Raw user rows, newest first.
  pub async fn get_users_raw(&self) -> Result<Value, ApiError> {
    let rows: Vec<Value> = self
      .db
      .table("users")
      .select("*")
      .order("created_at", false)
      .execute()
      .await
      .inspect_err(|e| error!(error = %e, "failed to load users"))?;
    Ok(Value::Array(rows))
  }

  pub async fn get_user(&self, id: &str) -> Result<User, ApiError> {
    self
      .db
      .table("users")
      .select("*")
      .eq("id", id)
      .single()
      .await
  }

  pub async fn update_user(&self, id: &str, update: &UserUpdate) -> Result<User, ApiError> {
    let mut rows: Vec<User> = self.db.table("users").eq("id", id).update(update).await?;
    info!(user = id, "user updated");
    rows
      .pop()
      .ok_or_else(|| ApiError::Query(format!("user {} not found", id)))
  }

  pub async fn set_user_active(&self, id: &str, active: bool) -> Result<User, ApiError> {
    self
      .update_user(
        id,
        &UserUpdate {
          is_active: Some(active),
          ..Default::default()
        },
      )
      .await
  }

  pub async fn update_user_role(&self, id: &str, role: UserRole) -> Result<User, ApiError> {
    self
      .update_user(
        id,
        &UserUpdate {
          role: Some(role),
          ..Default::default()
        },
      )
      .await
  }

  // --------------------------------------------------------------------------
  // Contacts
  // --------------------------------------------------------------------------

  pub async fn create_contact(&self, contact: &NewContact) -> Result<Contact, ApiError> {
    let value = self.post("/contacts", contact).await?;
    info!(email = %contact.email, "contact created");
    decode_one(value, "contact")
  }

  pub async fn update_contact(
    &self,
    id: &str,
    update: &ContactUpdate,
  ) -> Result<Contact, ApiError> {
    let value = self.put(&format!("/contacts/{}", id), update).await?;
    info!(contact = id, "contact updated");
    decode_one(value, "contact")
  }

  pub async fn delete_contact(&self, id: &str) -> Result<(), ApiError> {
    self.delete(&format!("/contacts/{}", id)).await?;
    info!(contact = id, "contact deleted");
    Ok(())
  }

  // --------------------------------------------------------------------------
  // Exchanges
  // --------------------------------------------------------------------------

  pub async fn get_exchange(&self, id: &str) -> Result<Exchange, ApiError> {
    self.get_one(&format!("/exchanges/{}", id), "exchange").await
  }

  pub async fn create_exchange(&self, exchange: &NewExchange) -> Result<Exchange, ApiError> {
    let value = self.post("/exchanges", exchange).await?;
    info!(name = %exchange.name, "exchange created");
    decode_one(value, "exchange")
  }

  pub async fn update_exchange(
    &self,
    id: &str,
    update: &ExchangeUpdate,
  ) -> Result<Exchange, ApiError> {
    let value = self.put(&format!("/exchanges/{}", id), update).await?;
    info!(exchange = id, "exchange updated");
    decode_one(value, "exchange")
  }

  pub fn participants_path(exchange_id: &str) -> String {
    format!("/exchanges/{}/participants", exchange_id)
  }

  // --------------------------------------------------------------------------
  // Tasks
  // --------------------------------------------------------------------------

  pub fn tasks_path(exchange_id: Option<&str>) -> String {
    match exchange_id {
      Some(id) => with_query("/tasks", &[("exchangeId", id.to_string())]),
      None => "/tasks".to_string(),
    }
  }

  pub async fn create_task(&self, task: &NewTask) -> Result<Task, ApiError> {
    let value = self.post("/tasks", task).await?;
    info!(title = %task.title, "task created");
    decode_one(value, "task")
  }

  pub async fn update_task(&self, id: &str, update: &TaskUpdate) -> Result<Task, ApiError> {
    let value = self.put(&format!("/tasks/{}", id), update).await?;
    info!(task = id, "task updated");
    decode_one(value, "task")
  }

  pub async fn update_task_status(&self, id: &str, status: TaskStatus) -> Result<Task, ApiError> {
    let value = self
      .put(&format!("/tasks/{}", id), &json!({ "status": status }))
      .await?;
    info!(task = id, status = status.label(), "task status changed");
    decode_one(value, "task")
  }

  pub async fn delete_task(&self, id: &str) -> Result<(), ApiError> {
    self.delete(&format!("/tasks/{}", id)).await?;
    info!(task = id, "task deleted");
    Ok(())
  }

  // --------------------------------------------------------------------------
  // Documents (Supabase table + storage)
  // --------------------------------------------------------------------------

  pub async fn get_documents_raw(&self, exchange_id: Option<&str>) -> Result<Value, ApiError> {
    let mut query = self.db.table("documents").select("*");
    if let Some(id) = exchange_id {
      query = query.eq("exchange_id", id);
    }
    let rows: Vec<Value> = query
      .order("created_at", false)
      .execute()
      .await
      .inspect_err(|e| error!(error = %e, "failed to load documents"))?;
    Ok(Value::Array(rows))
  }

  /// Upload the file to storage, then record its metadata.
  pub async fn upload_document(&self, upload: DocumentUpload) -> Result<Document, ApiError> {
    if upload.filename.trim().is_empty() || upload.bytes.is_empty() {
      return Err(ApiError::Validation("Please select a file to upload".to_string()));
    }

    let folder = upload.exchange_id.as_deref().unwrap_or("general");
    let stored_filename = format!(
      "{}_{}",
      Utc::now().timestamp_millis(),
      sanitize_filename(&upload.filename)
    );
    let file_path = format!("{}/{}", folder, stored_filename);
    let file_size = upload.bytes.len() as u64;

    self
      .db
      .upload(DOCUMENTS_BUCKET, &file_path, upload.bytes, &upload.mime_type)
      .await?;

    let uploaded_by = self.backend.session().user().ok().flatten().map(|u| u.id);
    let record = NewDocumentRecord {
      exchange_id: upload.exchange_id,
      original_filename: upload.filename,
      stored_filename,
      file_path,
      mime_type: upload.mime_type,
      file_size,
      category: upload.category,
      pin_required: upload.pin.is_some(),
      pin: upload.pin,
      uploaded_by,
    };
    let document: Document = self.db.table("documents").insert(&record).await?;
    info!(document = %document.id, path = %document.file_path, "document uploaded");
    Ok(document)
  }

  pub async fn download_document(&self, document: &Document) -> Result<Vec<u8>, ApiError> {
    self.db.download(DOCUMENTS_BUCKET, &document.file_path).await
  }

  pub async fn delete_document(&self, document: &Document) -> Result<(), ApiError> {
    self
      .db
      .remove(DOCUMENTS_BUCKET, &document.file_path)
      .await?;
    self
      .db
      .table("documents")
      .eq("id", &document.id)
      .delete()
      .await?;
    info!(document = %document.id, "document deleted");
    Ok(())
  }

  // --------------------------------------------------------------------------
  // Messages (Supabase)
  // --------------------------------------------------------------------------

  /// Raw message rows for one exchange, oldest first.
  pub async fn get_messages_raw(&self, exchange_id: &str) -> Result<Value, ApiError> {
    let rows: Vec<Value> = self
      .db
      .table("messages")
      .select("*")
      .eq("exchange_id", exchange_id)
      .order("created_at", true)
      .execute()
      .await
      .inspect_err(|e| error!(exchange = exchange_id, error = %e, "failed to load messages"))?;
    Ok(Value::Array(rows))
  }

  pub async fn send_message(&self, message: &NewMessage) -> Result<Message, ApiError> {
    if message.content.trim().is_empty() {
      return Err(ApiError::Validation("Message cannot be empty".to_string()));
    }
    let sent: Message = self.db.table("messages").insert(message).await?;
    info!(exchange = %message.exchange_id, "message sent");
    Ok(sent)
  }

  // --------------------------------------------------------------------------
  // Audit logs (Supabase)
  // --------------------------------------------------------------------------

  /// Raw audit rows for one page, newest first, plus one lookahead row.
  pub async fn get_audit_rows(&self, filter: &AuditLogFilter) -> Result<Value, ApiError> {
    let mut query = self.db.table("audit_logs").select("*");
    if let Some(action) = &filter.action {
      query = query.eq("action", action);
    }
    if let Some(user_id) = &filter.user_id {
      query = query.eq("user_id", user_id);
    }
    if let Some(entity_type) = &filter.entity_type {
      query = query.eq("entity_type", entity_type);
    }

    // One extra row tells us whether another page exists
    let rows: Vec<Value> = query
      .order("created_at", false)
      .limit(filter.per_page + 1)
      .offset(filter.offset())
      .execute()
      .await
      .inspect_err(|e| error!(error = %e, "failed to load audit logs"))?;
    Ok(Value::Array(rows))
  }

  // --------------------------------------------------------------------------
  // Notification preferences
  // --------------------------------------------------------------------------

  pub async fn get_notification_preferences(&self) -> Result<NotificationPreferences, ApiError> {
    self
      .get_one("/notifications/preferences", "preferences")
      .await
  }

  pub async fn update_notification_preferences(
    &self,
    prefs: &NotificationPreferences,
  ) -> Result<NotificationPreferences, ApiError> {
    let value = self.put("/notifications/preferences", prefs).await?;
    info!("notification preferences saved");
    match value {
      // Some deployments answer with an empty body
      Value::Null => Ok(*prefs),
      other => decode_one(other, "preferences"),
    }
  }

  // --------------------------------------------------------------------------
  // PracticePanther integration
  // --------------------------------------------------------------------------

  pub async fn get_pp_status(&self) -> Result<PracticePantherStatus, ApiError> {
    self
      .get_one("/integrations/practicepanther/status", "status")
      .await
  }

  /// Start a sync run. The backend answers with the created log row when it
  /// has one.
  pub async fn trigger_pp_sync(
    &self,
    sync_type: &str,
  ) -> Result<Option<PracticePantherSyncLog>, ApiError> {
    let value = self
      .post(
        "/integrations/practicepanther/sync",
        &json!({ "syncType": sync_type }),
      )
      .await?;
    info!(sync_type, "PracticePanther sync requested");
    Ok(decode_one(value, "syncLog").ok())
  }

  pub async fn get_pp_sync_logs(&self) -> Result<Vec<PracticePantherSyncLog>, ApiError> {
    self
      .get_list("/integrations/practicepanther/sync-logs", "logs")
      .await
  }

  pub async fn disconnect_pp(&self) -> Result<(), ApiError> {
    self
      .post("/integrations/practicepanther/disconnect", &json!({}))
      .await?;
    info!("PracticePanther disconnected");
    Ok(())
  }

  // --------------------------------------------------------------------------
  // Dashboard
  // --------------------------------------------------------------------------

  pub async fn get_dashboard_stats(&self) -> Result<DashboardStats, ApiError> {
    self.get_one("/dashboard/stats", "stats").await
  }
}

/// Cut raw audit rows from [`ApiService::get_audit_rows`] into a page.
pub fn audit_page(filter: &AuditLogFilter, raw: Value) -> Result<Page<AuditLog>, ApiError> {
  let mut items: Vec<AuditLog> = decode_list(raw, "audit_logs")?;
  let has_more = items.len() > filter.per_page as usize;
  items.truncate(filter.per_page as usize);
  Ok(Page {
    items,
    page: filter.page,
    per_page: filter.per_page,
    has_more,
  })
}

/// Keep storage paths to a safe character set.
fn sanitize_filename(name: &str) -> String {
  name
    .trim()
    .chars()
    .map(|c| {
      if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
        c
      } else {
        '_'
      }
    })
    .collect()
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;
  use crate::api::http::tests::client_for;
  use crate::session::Session;
  use std::time::Duration;
  use wiremock::matchers::{body_json, method, path, query_param};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  pub(crate) fn service_for(server: &MockServer) -> ApiService {
    let session = Session::in_memory();
    let backend = client_for(server, session.clone());
    let db = SupabaseClient::new(&server.uri(), "anon", Duration::from_secs(5), session)
      .unwrap()
      .with_connectivity(backend.connectivity().clone());
    ApiService::new(backend, db)
  }

  #[tokio::test]
  async fn test_tasks_filtered_by_exchange() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/tasks"))
      .and(query_param("exchangeId", "e1"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "data": [{ "id": "t1", "title": "Wire funds", "status": "pending" }]
      })))
      .expect(1)
      .mount(&server)
      .await;

    let raw = service_for(&server)
      .get(&ApiService::tasks_path(Some("e1")))
      .await
      .unwrap();
    let tasks: Vec<Task> = decode_list(raw, "tasks").unwrap();
    assert_eq!(tasks[0].title, "Wire funds");
  }

  #[tokio::test]
  async fn test_update_task_status_sends_status_only() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
      .and(path("/tasks/t1"))
      .and(body_json(json!({ "status": "in_progress" })))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "task": { "id": "t1", "title": "Wire funds", "status": "in_progress" }
      })))
      .expect(1)
      .mount(&server)
      .await;

    let task = service_for(&server)
      .update_task_status("t1", TaskStatus::InProgress)
      .await
      .unwrap();
    assert_eq!(task.status, TaskStatus::InProgress);
  }

  #[tokio::test]
  async fn test_audit_logs_paginate_with_lookahead_row() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/rest/v1/audit_logs"))
      .and(query_param("limit", "3"))
      .and(query_param("offset", "2"))
      .and(query_param("entity_type", "eq.exchange"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!([
        { "id": "a3", "action": "UPDATE" },
        { "id": "a4", "action": "UPDATE" },
        { "id": "a5", "action": "CREATE" }
      ])))
      .mount(&server)
      .await;

    let filter = AuditLogFilter {
      entity_type: Some("exchange".to_string()),
      page: 2,
      per_page: 2,
      ..Default::default()
    };
    let raw = service_for(&server).get_audit_rows(&filter).await.unwrap();
    let page = audit_page(&filter, raw).unwrap();
    assert_eq!(page.items.len(), 2);
    assert!(page.has_more);
    assert_eq!(page.items[0].id, "a3");
  }

  #[test]
  fn test_audit_page_without_lookahead_is_last() {
    let filter = AuditLogFilter {
      per_page: 2,
      ..Default::default()
    };
    let page = audit_page(&filter, json!([{ "id": "a1", "action": "LOGIN" }])).unwrap();
    assert_eq!(page.items.len(), 1);
    assert!(!page.has_more);
    assert_eq!(page.page, filter.page);
  }

  #[tokio::test]
  async fn test_messages_come_back_oldest_first() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/rest/v1/messages"))
      .and(query_param("exchange_id", "eq.e1"))
      .and(query_param("order", "created_at.asc"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!([
        { "id": "m1", "exchange_id": "e1", "content": "Docs are in" }
      ])))
      .expect(1)
      .mount(&server)
      .await;

    let raw = service_for(&server).get_messages_raw("e1").await.unwrap();
    let messages: Vec<Message> = decode_list(raw, "messages").unwrap();
    assert_eq!(messages[0].content, "Docs are in");
  }

  #[tokio::test]
  async fn test_upload_document_stores_file_then_metadata() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(wiremock::matchers::path_regex(
        r"^/storage/v1/object/documents/e1/\d+_closing_statement.pdf$",
      ))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
      .expect(1)
      .mount(&server)
      .await;
    Mock::given(method("POST"))
      .and(path("/rest/v1/documents"))
      .respond_with(ResponseTemplate::new(201).set_body_json(json!([{
        "id": "d1",
        "exchange_id": "e1",
        "original_filename": "closing statement.pdf",
        "file_path": "e1/1_closing_statement.pdf",
        "mime_type": "application/pdf",
        "file_size": 4,
        "pin_required": true
      }])))
      .expect(1)
      .mount(&server)
      .await;

    let document = service_for(&server)
      .upload_document(DocumentUpload {
        exchange_id: Some("e1".to_string()),
        filename: "closing statement.pdf".to_string(),
        mime_type: "application/pdf".to_string(),
        category: "closing".to_string(),
        bytes: b"%PDF".to_vec(),
        pin: Some("1234".to_string()),
      })
      .await
      .unwrap();
    assert_eq!(document.id, "d1");
    assert!(document.pin_required);
  }

  #[tokio::test]
  async fn test_empty_upload_is_rejected_locally() {
    let server = MockServer::start().await;
    let err = service_for(&server)
      .upload_document(DocumentUpload::default())
      .await
      .unwrap_err();
    assert!(matches!(err, ApiError::Validation(_)));
  }

  #[tokio::test]
  async fn test_notification_preferences_empty_reply_keeps_sent_values() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
      .and(path("/notifications/preferences"))
      .respond_with(ResponseTemplate::new(204))
      .mount(&server)
      .await;

    let prefs = NotificationPreferences::default().toggled(NotificationSetting::Sms);
    let saved = service_for(&server)
      .update_notification_preferences(&prefs)
      .await
      .unwrap();
    assert_eq!(saved, prefs);
  }

  #[tokio::test]
  async fn test_exchange_crud_round() {
    let server = MockServer::start().await;
    let row = json!({ "id": "e1", "name": "Maple St", "status": "PENDING" });
    Mock::given(method("POST"))
      .and(path("/exchanges"))
      .and(body_json(json!({ "name": "Maple St", "exchange_value": 900000.0 })))
      .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "exchange": row })))
      .expect(1)
      .mount(&server)
      .await;
    Mock::given(method("GET"))
      .and(path("/exchanges/e1"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "exchange": row })))
      .mount(&server)
      .await;
    Mock::given(method("PUT"))
      .and(path("/exchanges/e1"))
      .and(body_json(json!({ "status": "45D" })))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "exchange": { "id": "e1", "name": "Maple St", "status": "45D" }
      })))
      .expect(1)
      .mount(&server)
      .await;
    Mock::given(method("GET"))
      .and(path("/exchanges/e1/participants"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "participants": [{ "id": "p1", "role": "qi", "name": "Quinn" }]
      })))
      .mount(&server)
      .await;

    let api = service_for(&server);
    let created = api
      .create_exchange(&NewExchange {
        name: "Maple St".to_string(),
        exchange_value: Some(900000.0),
        ..Default::default()
      })
      .await
      .unwrap();
    assert_eq!(created.id, "e1");

    let fetched = api.get_exchange("e1").await.unwrap();
    assert_eq!(fetched.status, ExchangeStatus::Pending);

    let update = ExchangeUpdate {
      status: Some(ExchangeStatus::Identification),
      ..Default::default()
    };
    let updated = api.update_exchange("e1", &update).await.unwrap();
    assert_eq!(updated.status, ExchangeStatus::Identification);

    let raw = api.get(&ApiService::participants_path("e1")).await.unwrap();
    let participants: Vec<ExchangeParticipant> = decode_list(raw, "participants").unwrap();
    assert_eq!(participants[0].name.as_deref(), Some("Quinn"));
  }

  #[tokio::test]
  async fn test_single_user_row() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/rest/v1/users"))
      .and(query_param("id", "eq.u1"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "id": "u1", "email": "cal@x.io", "role": "coordinator"
      })))
      .mount(&server)
      .await;

    let user = service_for(&server).get_user("u1").await.unwrap();
    assert_eq!(user.role, UserRole::Coordinator);
  }

  #[test]
  fn test_sanitize_filename() {
    assert_eq!(sanitize_filename(" deed (final).pdf "), "deed__final_.pdf");
  }
}
