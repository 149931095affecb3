//! Sample payloads served when the backend is unreachable and nothing is
//! cached. Shapes match the live endpoints so the normal decoders apply.

use serde_json::{json, Value};

/// Fallback payload for a GET path, if one exists.
pub fn payload_for(path: &str) -> Option<Value> {
  let route = path.split('?').next().unwrap_or(path).trim_end_matches('/');
  match route {
    "/exchanges" => Some(json!({ "exchanges": sample_exchanges() })),
    "/tasks" => Some(json!({ "tasks": sample_tasks() })),
    "/contacts" => Some(json!({ "contacts": sample_contacts() })),
    "/users" => Some(json!({ "users": sample_users() })),
    "/documents" => Some(json!({ "documents": [] })),
    "/dashboard/stats" => Some(sample_dashboard_stats()),
    _ => None,
  }
}

pub fn sample_exchanges() -> Value {
  json!([
    {
      "id": "sample-ex-1",
      "name": "Riverside Apartments",
      "status": "45D",
      "exchange_value": 1_250_000.0,
      "client_name": "Jordan Avery",
      "relinquished_property_address": "118 Riverside Dr, Austin TX",
      "identification_deadline": "2025-03-14",
      "completion_deadline": "2025-07-28",
      "participant_count": 4,
      "task_count": 6,
      "document_count": 3
    },
    {
      "id": "sample-ex-2",
      "name": "Oak Street Retail",
      "status": "180D",
      "exchange_value": 780_000.0,
      "client_name": "Morgan Lee",
      "relinquished_property_address": "42 Oak St, Denver CO",
      "identification_deadline": "2025-01-20",
      "completion_deadline": "2025-06-04",
      "participant_count": 3,
      "task_count": 2,
      "document_count": 5
    },
    {
      "id": "sample-ex-3",
      "name": "Harbor Warehouse",
      "status": "COMPLETED",
      "exchange_value": 2_100_000.0,
      "client_name": "Casey Brooks",
      "participant_count": 5,
      "task_count": 0,
      "document_count": 9
    }
  ])
}

fn sample_tasks() -> Value {
  json!([
    {
      "id": "sample-task-1",
      "title": "Identify replacement properties",
      "status": "in_progress",
      "priority": "urgent",
      "exchange_id": "sample-ex-1",
      "due_date": "2025-03-14"
    },
    {
      "id": "sample-task-2",
      "title": "Collect closing statement",
      "status": "pending",
      "priority": "high",
      "exchange_id": "sample-ex-2"
    },
    {
      "id": "sample-task-3",
      "title": "Send exchange agreement",
      "status": "completed",
      "priority": "medium",
      "exchange_id": "sample-ex-1"
    }
  ])
}

fn sample_contacts() -> Value {
  json!([
    {
      "id": "sample-contact-1",
      "first_name": "Jordan",
      "last_name": "Avery",
      "email": "jordan.avery@example.com",
      "company": "Avery Holdings",
      "contact_type": "client"
    },
    {
      "id": "sample-contact-2",
      "first_name": "Sam",
      "last_name": "Ortiz",
      "email": "sam.ortiz@example.com",
      "company": "Title Partners",
      "contact_type": "escrow"
    }
  ])
}

fn sample_users() -> Value {
  json!([
    {
      "id": "sample-user-1",
      "email": "admin@example.com",
      "first_name": "Demo",
      "last_name": "Admin",
      "role": "admin",
      "is_active": true
    }
  ])
}

fn sample_dashboard_stats() -> Value {
  json!({
    "total_exchanges": 3,
    "active_exchanges": 2,
    "completed_exchanges": 1,
    "pending_tasks": 2,
    "overdue_tasks": 1,
    "total_documents": 17,
    "total_users": 1
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::envelope::decode_list;
  use crate::api::types::{Exchange, ExchangesResponse, Task};

  #[test]
  fn test_sample_payloads_decode() {
    let exchanges: ExchangesResponse =
      serde_json::from_value(payload_for("/exchanges").unwrap()).unwrap();
    assert_eq!(exchanges.exchanges.len(), 3);

    let tasks: Vec<Task> =
      decode_list(payload_for("/tasks?exchangeId=x").unwrap(), "tasks").unwrap();
    assert_eq!(tasks.len(), 3);

    let direct: Vec<Exchange> = serde_json::from_value(sample_exchanges()).unwrap();
    assert_eq!(direct, exchanges.exchanges);
  }

  #[test]
  fn test_unknown_path_has_no_fallback() {
    assert!(payload_for("/integrations/practicepanther/status").is_none());
  }
}
