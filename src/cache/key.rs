//! Cache keys for API queries.

use sha2::{Digest, Sha256};

/// Query identities used as cache keys.
///
/// Unparameterised lists keep readable keys (`"contacts"`); parameterised
/// queries are hashed so filters of any length map to fixed-size keys.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueryKey {
  Contacts,
  Exchanges,
  ExchangeParticipants { exchange_id: String },
  Tasks { exchange_id: Option<String> },
  Users,
  Documents { exchange_id: Option<String> },
  Messages { exchange_id: String },
  AuditLogs { filter: String, page: u32 },
  DashboardStats,
  NotificationPreferences,
  PracticePantherStatus,
  PracticePantherSyncLogs,
}

impl QueryKey {
  pub fn cache_key(&self) -> String {
    match self {
      Self::Contacts => "contacts".to_string(),
      Self::Exchanges => "exchanges".to_string(),
      Self::Users => "users".to_string(),
      Self::Tasks { exchange_id: None } => "tasks".to_string(),
      Self::Documents { exchange_id: None } => "documents".to_string(),
      Self::DashboardStats => "dashboard_stats".to_string(),
      Self::NotificationPreferences => "notification_preferences".to_string(),
      Self::PracticePantherStatus => "pp_status".to_string(),
      Self::PracticePantherSyncLogs => "pp_sync_logs".to_string(),
      other => hash_key(&other.normalized()),
    }
  }

  fn normalized(&self) -> String {
    match self {
      Self::ExchangeParticipants { exchange_id } => {
        format!("exchange_participants:{}", exchange_id.trim())
      }
      Self::Tasks { exchange_id } => {
        format!("tasks:{}", exchange_id.as_deref().unwrap_or("").trim())
      }
      Self::Documents { exchange_id } => {
        format!("documents:{}", exchange_id.as_deref().unwrap_or("").trim())
      }
      Self::Messages { exchange_id } => format!("messages:{}", exchange_id.trim()),
      Self::AuditLogs { filter, page } => {
        format!("audit_logs:{}:{}", normalize_filter(filter), page)
      }
      other => format!("{:?}", other).to_lowercase(),
    }
  }

  /// Human-readable description for logs.
  pub fn description(&self) -> String {
    match self {
      Self::ExchangeParticipants { exchange_id } => {
        format!("participants of exchange {}", exchange_id)
      }
      Self::Tasks {
        exchange_id: Some(id),
      } => format!("tasks for exchange {}", id),
      Self::Documents {
        exchange_id: Some(id),
      } => format!("documents for exchange {}", id),
      Self::Messages { exchange_id } => format!("messages for exchange {}", exchange_id),
      Self::AuditLogs { filter, page } => {
        if filter.is_empty() {
          format!("audit logs page {}", page)
        } else {
          format!("audit logs [{}] page {}", filter, page)
        }
      }
      other => other.cache_key().replace('_', " "),
    }
  }
}

/// Collapses whitespace so equivalent filters share a cache entry. Case is
/// kept because the server matches filter values exactly.
fn normalize_filter(filter: &str) -> String {
  filter.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn hash_key(input: &str) -> String {
  let mut hasher = Sha256::new();
  hasher.update(input.as_bytes());
  hex::encode(hasher.finalize())
}
