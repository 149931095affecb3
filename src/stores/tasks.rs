use std::future::Future;
use std::sync::Arc;

use chrono::{Duration as Days, NaiveDate};

use super::require_fields;
use crate::api::envelope::decode_list;
use crate::api::types::{NewTask, Task, TaskStatus, TaskUpdate};
use crate::api::{ApiError, ApiService};
use crate::cache::{CacheRegistry, QueryKey, ResponseCache};
use crate::query::{CacheBinding, CachedQuery, QueryOptions};

/// Counts shown on the task list header and the reports view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskStats {
  pub total: usize,
  pub pending: usize,
  pub in_progress: usize,
  pub completed: usize,
  pub cancelled: usize,
  pub overdue: usize,
}

impl TaskStats {
  pub fn from_tasks(tasks: &[Task], today: NaiveDate) -> Self {
    let mut stats = TaskStats {
      total: tasks.len(),
      ..Default::default()
    };
    for task in tasks {
      match task.status {
        TaskStatus::Pending => stats.pending += 1,
        TaskStatus::InProgress => stats.in_progress += 1,
        TaskStatus::Completed => stats.completed += 1,
        TaskStatus::Cancelled => stats.cancelled += 1,
      }
      if task.is_overdue(today) {
        stats.overdue += 1;
      }
    }
    stats
  }

  /// Completed share of all tasks, 0 to 100.
  pub fn completion_rate(&self) -> u16 {
    if self.total == 0 {
      return 0;
    }
    let completed = self.completed.min(self.total);
    u16::try_from(completed * 100 / self.total).unwrap_or(100)
  }
}

/// Tasks for one exchange, or across all exchanges.
pub struct TasksStore {
  api: ApiService,
  cache: Arc<ResponseCache>,
  key: QueryKey,
  query: CachedQuery<Vec<Task>>,
}

impl TasksStore {
  pub fn new(api: ApiService, caches: &CacheRegistry, exchange_id: Option<String>) -> Self {
    Self::with_options(api, caches, exchange_id, QueryOptions::default())
  }

  pub fn with_options(
    api: ApiService,
    caches: &CacheRegistry,
    exchange_id: Option<String>,
    options: QueryOptions,
  ) -> Self {
    let cache = Arc::clone(&caches.general);
    let key = QueryKey::Tasks {
      exchange_id: exchange_id.clone(),
    };
    let path = ApiService::tasks_path(exchange_id.as_deref());
    let fetch_api = api.clone();
    let query = CachedQuery::new(
      CacheBinding::new(Arc::clone(&cache), key.clone()),
      options,
      move || {
        let api = fetch_api.clone();
        let path = path.clone();
        async move { api.get(&path).await }
      },
      |raw| decode_list::<Task>(raw, "tasks"),
    );
    Self {
      api,
      cache,
      key,
      query,
    }
  }

  pub fn tasks(&self) -> &[Task] {
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

  pub fn by_status(&self, status: TaskStatus) -> Vec<&Task> {
    self.tasks().iter().filter(|t| t.status == status).collect()
  }

  /// Open tasks due between `today` and `today + days`, soonest first.
  pub fn due_within(&self, today: NaiveDate, days: i64) -> Vec<&Task> {
    let horizon = today + Days::days(days);
    let mut due: Vec<&Task> = self
      .tasks()
      .iter()
      .filter(|t| t.status.is_open())
      .filter(|t| t.due_date.is_some_and(|d| d >= today && d <= horizon))
      .collect();
    due.sort_by_key(|t| t.due_date);
    due
  }

  pub fn stats(&self, today: NaiveDate) -> TaskStats {
    TaskStats::from_tasks(self.tasks(), today)
  }

  pub fn create(
    &self,
    task: NewTask,
  ) -> impl Future<Output = Result<Task, ApiError>> + Send + 'static {
    let api = self.api.clone();
    let cache = Arc::clone(&self.cache);
    let key = self.key.cache_key();
    async move {
      require_fields(&[&task.title])?;
      let created = api.create_task(&task).await?;
      invalidate_tasks(&cache, &key);
      Ok(created)
    }
  }

  pub fn update_status(
    &self,
    id: String,
    status: TaskStatus,
  ) -> impl Future<Output = Result<Task, ApiError>> + Send + 'static {
    let api = self.api.clone();
    let cache = Arc::clone(&self.cache);
    let key = self.key.cache_key();
    async move {
      let task = api.update_task_status(&id, status).await?;
      invalidate_tasks(&cache, &key);
      Ok(task)
    }
  }

  pub fn update(
    &self,
    id: String,
    update: TaskUpdate,
  ) -> impl Future<Output = Result<Task, ApiError>> + Send + 'static {
    let api = self.api.clone();
    let cache = Arc::clone(&self.cache);
    let key = self.key.cache_key();
    async move {
      let task = api.update_task(&id, &update).await?;
      invalidate_tasks(&cache, &key);
      Ok(task)
    }
  }

  pub fn delete(&self, id: String) -> impl Future<Output = Result<(), ApiError>> + Send + 'static {
    let api = self.api.clone();
    let cache = Arc::clone(&self.cache);
    let key = self.key.cache_key();
    async move {
      api.delete_task(&id).await?;
      invalidate_tasks(&cache, &key);
      Ok(())
    }
  }
}

/// A task change affects both its exchange's list and the global list.
fn invalidate_tasks(cache: &ResponseCache, key: &str) {
  cache.delete(key);
  cache.delete(&QueryKey::Tasks { exchange_id: None }.cache_key());
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::service::tests::service_for;
  use serde_json::json;
  use wiremock::matchers::{method, path, query_param};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  fn day(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
  }

  fn tasks_body() -> serde_json::Value {
    json!({ "tasks": [
      { "id": "t1", "title": "Collect deed", "status": "pending", "priority": "high",
        "due_date": "2026-10-01" },
      { "id": "t2", "title": "Sign docs", "status": "IN_PROGRESS", "priority": "low",
        "due_date": "2026-10-20" },
      { "id": "t3", "title": "Wire funds", "status": "completed", "priority": "high",
        "due_date": "2026-09-01" },
      { "id": "t4", "title": "Old", "status": "cancelled", "priority": "medium" }
    ]})
  }

  fn warm_store(server: &MockServer) -> TasksStore {
    let caches = CacheRegistry::default();
    caches.general.set("tasks", tasks_body(), None);
    TasksStore::new(service_for(server), &caches, None)
  }

  #[test]
  fn test_stats_from_tasks() {
    let tasks: Vec<Task> = decode_list(tasks_body(), "tasks").unwrap();
    let stats = TaskStats::from_tasks(&tasks, day("2026-10-18"));
    assert_eq!(
      stats,
      TaskStats {
        total: 4,
        pending: 1,
        in_progress: 1,
        completed: 1,
        cancelled: 1,
        overdue: 1,
      }
    );
    assert_eq!(stats.completion_rate(), 25);
    assert_eq!(TaskStats::default().completion_rate(), 0);

    let inconsistent = TaskStats {
      total: 2,
      completed: 700,
      ..Default::default()
    };
    assert_eq!(inconsistent.completion_rate(), 100);
  }

  #[tokio::test]
  async fn test_derived_filters() {
    let server = MockServer::start().await;
    let store = warm_store(&server);
    let today = day("2026-10-18");

    assert_eq!(store.by_status(TaskStatus::InProgress)[0].id, "t2");
    let due: Vec<&str> = store.due_within(today, 7).iter().map(|t| t.id.as_str()).collect();
    assert_eq!(due, vec!["t2"]);
  }

  #[tokio::test]
  async fn test_exchange_scoped_fetch_uses_query_param() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/tasks"))
      .and(query_param("exchangeId", "ex-1"))
      .respond_with(ResponseTemplate::new(200).set_body_json(tasks_body()))
      .expect(1)
      .mount(&server)
      .await;

    let caches = CacheRegistry::default();
    let mut store = TasksStore::new(service_for(&server), &caches, Some("ex-1".to_string()));
    for _ in 0..100 {
      if store.poll() {
        break;
      }
      tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert_eq!(store.tasks().len(), 4);
  }

  #[tokio::test]
  async fn test_status_change_invalidates_both_lists() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
      .and(path("/tasks/t1"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "task": { "id": "t1", "title": "Collect deed", "status": "in_progress" }
      })))
      .mount(&server)
      .await;

    let caches = CacheRegistry::default();
    let scoped = QueryKey::Tasks {
      exchange_id: Some("ex-1".to_string()),
    }
    .cache_key();
    caches.general.set("tasks", tasks_body(), None);
    caches.general.set(&scoped, tasks_body(), None);
    let store = TasksStore::new(service_for(&server), &caches, Some("ex-1".to_string()));

    let task = store
      .update_status("t1".to_string(), TaskStatus::InProgress)
      .await
      .unwrap();
    assert_eq!(task.status, TaskStatus::InProgress);
    assert!(!caches.general.has("tasks"));
    assert!(!caches.general.has(&scoped));
  }

  #[tokio::test]
  async fn test_create_requires_title() {
    let server = MockServer::start().await;
    let store = warm_store(&server);
    let err = store.create(NewTask::default()).await.unwrap_err();
    assert!(matches!(err, ApiError::Validation(_)));
  }
}
