use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Duration as Days, NaiveDate};

use super::tasks::{TaskStats, TasksStore};
use crate::api::envelope::decode_list;
use crate::api::types::{Exchange, ExchangeStatus, Task};
use crate::api::ApiService;
use crate::cache::{CacheRegistry, QueryKey};
use crate::query::{CacheBinding, CachedQuery, QueryOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusCount {
  pub status: ExchangeStatus,
  pub count: usize,
}

/// Portfolio figures computed over the exchange and task lists.
pub struct ReportsStore {
  exchanges: CachedQuery<Vec<Exchange>>,
  tasks: TasksStore,
}

impl ReportsStore {
  pub fn new(api: ApiService, caches: &CacheRegistry) -> Self {
    Self::with_options(api, caches, QueryOptions::default())
  }

  pub fn with_options(api: ApiService, caches: &CacheRegistry, options: QueryOptions) -> Self {
    let fetch_api = api.clone();
    let exchanges = CachedQuery::new(
      CacheBinding::new(Arc::clone(&caches.exchanges), QueryKey::Exchanges),
      options,
      move || {
        let api = fetch_api.clone();
        async move { api.get("/exchanges").await }
      },
      |raw| decode_list::<Exchange>(raw, "exchanges"),
    );
    let tasks = TasksStore::with_options(api, caches, None, options);
    Self { exchanges, tasks }
  }

  pub fn exchanges(&self) -> &[Exchange] {
    self.exchanges.data().map(Vec::as_slice).unwrap_or(&[])
  }

  pub fn is_loading(&self) -> bool {
    self.exchanges.is_loading() || self.tasks.is_loading()
  }

  /// First failure across both lists.
  pub fn error(&self) -> Option<&str> {
    self.exchanges.error().or_else(|| self.tasks.error())
  }

  pub fn poll(&mut self) -> bool {
    let exchanges = self.exchanges.poll();
    let tasks = self.tasks.poll();
    exchanges || tasks
  }

  pub fn refresh(&mut self) {
    self.exchanges.refetch();
    self.tasks.refresh();
  }

  /// Exchange count per status, in status order, omitting empty statuses.
  pub fn status_breakdown(&self) -> Vec<StatusCount> {
    let mut counts: BTreeMap<ExchangeStatus, usize> = BTreeMap::new();
    for exchange in self.exchanges() {
      *counts.entry(exchange.status).or_default() += 1;
    }
    counts
      .into_iter()
      .map(|(status, count)| StatusCount { status, count })
      .collect()
  }

  pub fn active_count(&self) -> usize {
    self
      .exchanges()
      .iter()
      .filter(|e| e.status.is_active())
      .count()
  }

  /// Sum of exchange values, ignoring exchanges without one.
  pub fn total_value(&self) -> f64 {
    self.exchanges().iter().filter_map(|e| e.exchange_value).sum()
  }

  /// Exchanges whose next deadline falls within `days`, soonest first.
  pub fn upcoming_deadlines(&self, today: NaiveDate, days: i64) -> Vec<(&Exchange, NaiveDate)> {
    let horizon = today + Days::days(days);
    let mut upcoming: Vec<(&Exchange, NaiveDate)> = self
      .exchanges()
      .iter()
      .filter(|e| e.status.is_active())
      .filter_map(|e| e.next_deadline(today).map(|d| (e, d)))
      .filter(|(_, d)| *d <= horizon)
      .collect();
    upcoming.sort_by_key(|(_, d)| *d);
    upcoming
  }

  pub fn task_stats(&self, today: NaiveDate) -> TaskStats {
    self.tasks.stats(today)
  }

  /// Open tasks falling due within `days`.
  pub fn tasks_due_soon(&self, today: NaiveDate, days: i64) -> Vec<&Task> {
    self.tasks.due_within(today, days)
  }
}

/// `$1,234,567` style rendering for exchange values.
pub fn format_currency(value: f64) -> String {
  let whole = value.round() as i64;
  let digits = whole.unsigned_abs().to_string();
  let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
  for (i, ch) in digits.chars().enumerate() {
    if i > 0 && (digits.len() - i) % 3 == 0 {
      grouped.push(',');
    }
    grouped.push(ch);
  }
  if whole < 0 {
    format!("-${}", grouped)
  } else {
    format!("${}", grouped)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::service::tests::service_for;
  use serde_json::json;
  use wiremock::MockServer;

  fn day(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
  }

  async fn warm_store(server: &MockServer) -> ReportsStore {
    let caches = CacheRegistry::default();
    caches.exchanges.set(
      "exchanges",
      json!({ "exchanges": [
        { "id": "e1", "name": "Maple St", "status": "45D", "exchange_value": 1250000.0,
          "identification_deadline": "2026-10-25", "completion_deadline": "2027-02-10" },
        { "id": "e2", "name": "Oak Ave", "status": "180D", "exchange_value": 800000.0,
          "identification_deadline": "2026-08-01", "completion_deadline": "2026-11-05" },
        { "id": "e3", "name": "Pine Rd", "status": "COMPLETED", "exchange_value": 450000.0 },
        { "id": "e4", "name": "Elm Ct", "status": "45D" }
      ]}),
      None,
    );
    caches.general.set(
      "tasks",
      json!([
        { "id": "t1", "title": "a", "status": "completed" },
        { "id": "t2", "title": "b", "status": "pending", "due_date": "2026-10-01" }
      ]),
      None,
    );
    ReportsStore::new(service_for(server), &caches)
  }

  #[tokio::test]
  async fn test_portfolio_figures() {
    let server = MockServer::start().await;
    let store = warm_store(&server).await;
    let today = day("2026-10-18");

    assert!(!store.is_loading());
    assert_eq!(
      store.status_breakdown(),
      vec![
        StatusCount {
          status: ExchangeStatus::Identification,
          count: 2
        },
        StatusCount {
          status: ExchangeStatus::Closing,
          count: 1
        },
        StatusCount {
          status: ExchangeStatus::Completed,
          count: 1
        },
      ]
    );
    assert_eq!(store.active_count(), 3);
    assert_eq!(store.total_value(), 2_500_000.0);

    let upcoming: Vec<(&str, NaiveDate)> = store
      .upcoming_deadlines(today, 30)
      .into_iter()
      .map(|(e, d)| (e.id.as_str(), d))
      .collect();
    assert_eq!(
      upcoming,
      vec![("e1", day("2026-10-25")), ("e2", day("2026-11-05"))]
    );

    let stats = store.task_stats(today);
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.overdue, 1);
  }

  #[test]
  fn test_format_currency() {
    assert_eq!(format_currency(0.0), "$0");
    assert_eq!(format_currency(999.4), "$999");
    assert_eq!(format_currency(1_250_000.0), "$1,250,000");
    assert_eq!(format_currency(-1234.0), "-$1,234");
  }
}
