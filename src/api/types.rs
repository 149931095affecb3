//! Records mirrored from the remote schema.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// ============================================================================
// Users
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
  #[serde(alias = "ADMIN")]
  Admin,
  #[serde(alias = "COORDINATOR")]
  Coordinator,
  #[default]
  #[serde(alias = "CLIENT")]
  Client,
  #[serde(alias = "AGENCY")]
  Agency,
  #[serde(alias = "THIRD_PARTY")]
  ThirdParty,
}

impl UserRole {
  pub const ALL: [UserRole; 5] = [
    UserRole::Admin,
    UserRole::Coordinator,
    UserRole::Client,
    UserRole::Agency,
    UserRole::ThirdParty,
  ];

  pub fn label(&self) -> &'static str {
    match self {
      UserRole::Admin => "admin",
      UserRole::Coordinator => "coordinator",
      UserRole::Client => "client",
      UserRole::Agency => "agency",
      UserRole::ThirdParty => "third_party",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
  pub id: String,
  pub email: String,
  #[serde(default)]
  pub first_name: Option<String>,
  #[serde(default)]
  pub last_name: Option<String>,
  #[serde(default)]
  pub role: UserRole,
  #[serde(default = "default_true")]
  pub is_active: bool,
  #[serde(default)]
  pub two_fa_enabled: bool,
  #[serde(default)]
  pub created_at: Option<DateTime<Utc>>,
  #[serde(default)]
  pub last_login: Option<DateTime<Utc>>,
}

impl User {
  pub fn display_name(&self) -> String {
    full_name(self.first_name.as_deref(), self.last_name.as_deref())
      .unwrap_or_else(|| self.email.clone())
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UserUpdate {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub first_name: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub last_name: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub role: Option<UserRole>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub is_active: Option<bool>,
}

// ============================================================================
// Contacts
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
  pub id: String,
  #[serde(default)]
  pub first_name: String,
  #[serde(default)]
  pub last_name: String,
  #[serde(default)]
  pub email: String,
  #[serde(default)]
  pub phone: Option<String>,
  #[serde(default)]
  pub company: Option<String>,
  #[serde(default)]
  pub contact_type: Option<String>,
  #[serde(default)]
  pub pp_contact_id: Option<String>,
}

impl Contact {
  pub fn display_name(&self) -> String {
    full_name(Some(self.first_name.as_str()), Some(self.last_name.as_str()))
      .unwrap_or_else(|| self.email.clone())
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NewContact {
  pub first_name: String,
  pub last_name: String,
  pub email: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub phone: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub company: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub contact_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ContactUpdate {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub first_name: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub last_name: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub email: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub phone: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub company: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub contact_type: Option<String>,
}

// ============================================================================
// Exchanges
// ============================================================================

/// Workflow stage of an exchange. Unknown stages decode as `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ExchangeStatus {
  #[serde(rename = "PENDING", alias = "pending")]
  Pending,
  /// Inside the 45-day identification period
  #[serde(rename = "45D", alias = "45d")]
  Identification,
  /// Inside the 180-day closing period
  #[serde(rename = "180D", alias = "180d")]
  Closing,
  #[serde(rename = "ON_HOLD", alias = "on_hold")]
  OnHold,
  #[serde(rename = "COMPLETED", alias = "completed")]
  Completed,
  #[serde(rename = "TERMINATED", alias = "terminated")]
  Terminated,
  #[serde(other)]
  Other,
}

impl ExchangeStatus {
  /// Stages a user can move an exchange into.
  pub const SETTABLE: [ExchangeStatus; 6] = [
    ExchangeStatus::Pending,
    ExchangeStatus::Identification,
    ExchangeStatus::Closing,
    ExchangeStatus::OnHold,
    ExchangeStatus::Completed,
    ExchangeStatus::Terminated,
  ];

  /// Parse a display label ("45-Day") or wire name ("45D"), case-insensitively.
  pub fn parse(input: &str) -> Option<ExchangeStatus> {
    let input = input.trim();
    Self::SETTABLE.into_iter().find(|status| {
      status.label().eq_ignore_ascii_case(input) || status.wire_name().eq_ignore_ascii_case(input)
    })
  }

  fn wire_name(&self) -> &'static str {
    match self {
      ExchangeStatus::Pending => "PENDING",
      ExchangeStatus::Identification => "45D",
      ExchangeStatus::Closing => "180D",
      ExchangeStatus::OnHold => "ON_HOLD",
      ExchangeStatus::Completed => "COMPLETED",
      ExchangeStatus::Terminated => "TERMINATED",
      ExchangeStatus::Other => "OTHER",
    }
  }

  pub fn label(&self) -> &'static str {
    match self {
      ExchangeStatus::Pending => "Pending",
      ExchangeStatus::Identification => "45-Day",
      ExchangeStatus::Closing => "180-Day",
      ExchangeStatus::OnHold => "On Hold",
      ExchangeStatus::Completed => "Completed",
      ExchangeStatus::Terminated => "Terminated",
      ExchangeStatus::Other => "Other",
    }
  }

  /// Whether the exchange still has work outstanding.
  pub fn is_active(&self) -> bool {
    matches!(
      self,
      ExchangeStatus::Pending | ExchangeStatus::Identification | ExchangeStatus::Closing
    )
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
  pub id: String,
  #[serde(default, alias = "exchange_name")]
  pub name: String,
  pub status: ExchangeStatus,
  #[serde(default)]
  pub exchange_value: Option<f64>,
  #[serde(default)]
  pub client_name: Option<String>,
  #[serde(default)]
  pub coordinator_id: Option<String>,
  #[serde(default)]
  pub relinquished_property_address: Option<String>,
  #[serde(default, deserialize_with = "lenient_date")]
  pub identification_deadline: Option<NaiveDate>,
  #[serde(default, deserialize_with = "lenient_date")]
  pub completion_deadline: Option<NaiveDate>,
  #[serde(default)]
  pub participant_count: u32,
  #[serde(default)]
  pub task_count: u32,
  #[serde(default)]
  pub document_count: u32,
  #[serde(default)]
  pub created_at: Option<DateTime<Utc>>,
  #[serde(default)]
  pub updated_at: Option<DateTime<Utc>>,
}

impl Exchange {
  /// The next deadline that has not passed as of `today`.
  pub fn next_deadline(&self, today: NaiveDate) -> Option<NaiveDate> {
    [self.identification_deadline, self.completion_deadline]
      .into_iter()
      .flatten()
      .filter(|d| *d >= today)
      .min()
  }
}

/// Shape returned by the exchanges list endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangesResponse {
  pub exchanges: Vec<Exchange>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NewExchange {
  pub name: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub client_name: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub exchange_value: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub relinquished_property_address: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExchangeUpdate {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub status: Option<ExchangeStatus>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub exchange_value: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub coordinator_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeParticipant {
  pub id: String,
  #[serde(default)]
  pub exchange_id: Option<String>,
  #[serde(default)]
  pub user_id: Option<String>,
  #[serde(default)]
  pub contact_id: Option<String>,
  #[serde(default)]
  pub role: String,
  #[serde(default)]
  pub name: Option<String>,
  #[serde(default)]
  pub email: Option<String>,
}

// ============================================================================
// Tasks
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
  #[default]
  #[serde(alias = "PENDING")]
  Pending,
  #[serde(alias = "IN_PROGRESS")]
  InProgress,
  #[serde(alias = "COMPLETED")]
  Completed,
  #[serde(alias = "CANCELLED")]
  Cancelled,
}

impl TaskStatus {
  pub const ALL: [TaskStatus; 4] = [
    TaskStatus::Pending,
    TaskStatus::InProgress,
    TaskStatus::Completed,
    TaskStatus::Cancelled,
  ];

  pub fn label(&self) -> &'static str {
    match self {
      TaskStatus::Pending => "Pending",
      TaskStatus::InProgress => "In Progress",
      TaskStatus::Completed => "Completed",
      TaskStatus::Cancelled => "Cancelled",
    }
  }

  /// The status a task moves to when advanced from the task list.
  /// The backend decides whether the transition is legal.
  pub fn next(&self) -> TaskStatus {
    match self {
      TaskStatus::Pending => TaskStatus::InProgress,
      TaskStatus::InProgress => TaskStatus::Completed,
      TaskStatus::Completed | TaskStatus::Cancelled => TaskStatus::Pending,
    }
  }

  pub fn is_open(&self) -> bool {
    matches!(self, TaskStatus::Pending | TaskStatus::InProgress)
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
  #[serde(alias = "LOW")]
  Low,
  #[default]
  #[serde(alias = "MEDIUM")]
  Medium,
  #[serde(alias = "HIGH")]
  High,
  #[serde(alias = "URGENT")]
  Urgent,
}

impl TaskPriority {
  pub const ALL: [TaskPriority; 4] = [
    TaskPriority::Low,
    TaskPriority::Medium,
    TaskPriority::High,
    TaskPriority::Urgent,
  ];

  /// Parse a label typed by the user, case-insensitively.
  pub fn parse(label: &str) -> Option<TaskPriority> {
    Self::ALL
      .into_iter()
      .find(|p| p.label().eq_ignore_ascii_case(label.trim()))
  }

  pub fn label(&self) -> &'static str {
    match self {
      TaskPriority::Low => "low",
      TaskPriority::Medium => "medium",
      TaskPriority::High => "high",
      TaskPriority::Urgent => "urgent",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
  pub id: String,
  pub title: String,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(default)]
  pub status: TaskStatus,
  #[serde(default)]
  pub priority: TaskPriority,
  #[serde(default)]
  pub assigned_to: Option<String>,
  #[serde(default)]
  pub exchange_id: Option<String>,
  #[serde(default, deserialize_with = "lenient_date")]
  pub due_date: Option<NaiveDate>,
  #[serde(default)]
  pub completed_at: Option<DateTime<Utc>>,
  #[serde(default)]
  pub created_at: Option<DateTime<Utc>>,
}

impl Task {
  pub fn is_overdue(&self, today: NaiveDate) -> bool {
    self.status.is_open() && self.due_date.is_some_and(|due| due < today)
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NewTask {
  pub title: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  pub priority: TaskPriority,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub assigned_to: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub exchange_id: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TaskUpdate {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub title: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub status: Option<TaskStatus>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub priority: Option<TaskPriority>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub assigned_to: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub due_date: Option<NaiveDate>,
}

// ============================================================================
// Documents
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
  pub id: String,
  #[serde(default)]
  pub exchange_id: Option<String>,
  #[serde(default)]
  pub original_filename: String,
  #[serde(default)]
  pub stored_filename: String,
  #[serde(default)]
  pub file_path: String,
  #[serde(default)]
  pub mime_type: String,
  #[serde(default)]
  pub file_size: u64,
  #[serde(default = "default_category")]
  pub category: String,
  #[serde(default)]
  pub pin_required: bool,
  #[serde(default)]
  pub uploaded_by: Option<String>,
  #[serde(default)]
  pub created_at: Option<DateTime<Utc>>,
}

/// Metadata row inserted after the file lands in storage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewDocumentRecord {
  pub exchange_id: Option<String>,
  pub original_filename: String,
  pub stored_filename: String,
  pub file_path: String,
  pub mime_type: String,
  pub file_size: u64,
  pub category: String,
  pub pin_required: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub pin: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub uploaded_by: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentUpload {
  pub exchange_id: Option<String>,
  pub filename: String,
  pub mime_type: String,
  pub category: String,
  pub bytes: Vec<u8>,
  pub pin: Option<String>,
}

// ============================================================================
// Messages
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
  pub id: String,
  pub exchange_id: String,
  #[serde(default)]
  pub sender_id: Option<String>,
  #[serde(default)]
  pub content: String,
  #[serde(default)]
  pub created_at: Option<DateTime<Utc>>,
  #[serde(default)]
  pub read_by: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewMessage {
  pub exchange_id: String,
  pub sender_id: Option<String>,
  pub content: String,
}

// ============================================================================
// Audit logs
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLog {
  pub id: String,
  pub action: String,
  #[serde(default)]
  pub entity_type: Option<String>,
  #[serde(default)]
  pub entity_id: Option<String>,
  #[serde(default)]
  pub user_id: Option<String>,
  #[serde(default)]
  pub details: Value,
  #[serde(default)]
  pub ip_address: Option<String>,
  #[serde(default)]
  pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditLogFilter {
  pub action: Option<String>,
  pub user_id: Option<String>,
  pub entity_type: Option<String>,
  /// 1-based page number
  pub page: u32,
  pub per_page: u32,
}

impl Default for AuditLogFilter {
  fn default() -> Self {
    Self {
      action: None,
      user_id: None,
      entity_type: None,
      page: 1,
      per_page: 50,
    }
  }
}

impl AuditLogFilter {
  pub fn offset(&self) -> u32 {
    self.page.saturating_sub(1) * self.per_page
  }

  /// Filter description used for cache keys and titles.
  pub fn describe(&self) -> String {
    [
      self.action.as_ref().map(|a| format!("action={}", a)),
      self.user_id.as_ref().map(|u| format!("user={}", u)),
      self.entity_type.as_ref().map(|t| format!("entity={}", t)),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>()
    .join(" ")
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
  pub items: Vec<T>,
  pub page: u32,
  pub per_page: u32,
  pub has_more: bool,
}

// ============================================================================
// Notifications
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPreferences {
  #[serde(default = "default_true")]
  pub email_enabled: bool,
  #[serde(default)]
  pub sms_enabled: bool,
  #[serde(default = "default_true")]
  pub in_app_enabled: bool,
  #[serde(default = "default_true")]
  pub task_due: bool,
  #[serde(default = "default_true")]
  pub document_uploaded: bool,
  #[serde(default = "default_true")]
  pub exchange_status: bool,
  #[serde(default = "default_true")]
  pub new_message: bool,
}

impl Default for NotificationPreferences {
  fn default() -> Self {
    Self {
      email_enabled: true,
      sms_enabled: false,
      in_app_enabled: true,
      task_due: true,
      document_uploaded: true,
      exchange_status: true,
      new_message: true,
    }
  }
}

/// One toggle on the notification settings screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationSetting {
  Email,
  Sms,
  InApp,
  TaskDue,
  DocumentUploaded,
  ExchangeStatus,
  NewMessage,
}

impl NotificationSetting {
  pub const ALL: [NotificationSetting; 7] = [
    NotificationSetting::Email,
    NotificationSetting::Sms,
    NotificationSetting::InApp,
    NotificationSetting::TaskDue,
    NotificationSetting::DocumentUploaded,
    NotificationSetting::ExchangeStatus,
    NotificationSetting::NewMessage,
  ];

  pub fn label(&self) -> &'static str {
    match self {
      NotificationSetting::Email => "Email notifications",
      NotificationSetting::Sms => "SMS notifications",
      NotificationSetting::InApp => "In-app notifications",
      NotificationSetting::TaskDue => "Task due reminders",
      NotificationSetting::DocumentUploaded => "Document uploads",
      NotificationSetting::ExchangeStatus => "Exchange status changes",
      NotificationSetting::NewMessage => "New messages",
    }
  }

  fn slot(self, prefs: &mut NotificationPreferences) -> &mut bool {
    match self {
      NotificationSetting::Email => &mut prefs.email_enabled,
      NotificationSetting::Sms => &mut prefs.sms_enabled,
      NotificationSetting::InApp => &mut prefs.in_app_enabled,
      NotificationSetting::TaskDue => &mut prefs.task_due,
      NotificationSetting::DocumentUploaded => &mut prefs.document_uploaded,
      NotificationSetting::ExchangeStatus => &mut prefs.exchange_status,
      NotificationSetting::NewMessage => &mut prefs.new_message,
    }
  }
}

impl NotificationPreferences {
  pub fn get(&self, setting: NotificationSetting) -> bool {
    let mut copy = *self;
    *setting.slot(&mut copy)
  }

  pub fn toggled(mut self, setting: NotificationSetting) -> Self {
    let slot = setting.slot(&mut self);
    *slot = !*slot;
    self
  }
}

// ============================================================================
// PracticePanther integration
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PracticePantherStatus {
  #[serde(default)]
  pub connected: bool,
  #[serde(default)]
  pub account_name: Option<String>,
  #[serde(default)]
  pub last_sync_at: Option<DateTime<Utc>>,
  #[serde(default)]
  pub contacts_synced: u64,
  #[serde(default)]
  pub matters_synced: u64,
  #[serde(default)]
  pub token_expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PracticePantherSyncLog {
  pub id: String,
  #[serde(default)]
  pub sync_type: String,
  #[serde(default)]
  pub status: String,
  #[serde(default)]
  pub records_processed: u64,
  #[serde(default)]
  pub error_message: Option<String>,
  #[serde(default)]
  pub started_at: Option<DateTime<Utc>>,
  #[serde(default)]
  pub completed_at: Option<DateTime<Utc>>,
}

// ============================================================================
// Auth and dashboard
// ============================================================================

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoginResponse {
  #[serde(alias = "access_token")]
  pub token: String,
  #[serde(default, alias = "refreshToken")]
  pub refresh_token: Option<String>,
  #[serde(default)]
  pub user: Option<User>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardStats {
  #[serde(default)]
  pub total_exchanges: u64,
  #[serde(default)]
  pub active_exchanges: u64,
  #[serde(default)]
  pub completed_exchanges: u64,
  #[serde(default)]
  pub pending_tasks: u64,
  #[serde(default)]
  pub overdue_tasks: u64,
  #[serde(default)]
  pub total_documents: u64,
  #[serde(default)]
  pub total_users: u64,
}

// ============================================================================
// Helpers
// ============================================================================

fn default_true() -> bool {
  true
}

fn default_category() -> String {
  "general".to_string()
}

fn full_name(first: Option<&str>, last: Option<&str>) -> Option<String> {
  let name = [first, last]
    .into_iter()
    .flatten()
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .collect::<Vec<_>>()
    .join(" ");
  if name.is_empty() {
    None
  } else {
    Some(name)
  }
}

/// Accept `YYYY-MM-DD`, a full RFC 3339 timestamp, or null.
fn lenient_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
  D: Deserializer<'de>,
{
  let raw: Option<String> = Option::deserialize(deserializer)?;
  let Some(raw) = raw else {
    return Ok(None);
  };
  let raw = raw.trim();
  if raw.is_empty() {
    return Ok(None);
  }
  if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
    return Ok(Some(date));
  }
  DateTime::parse_from_rfc3339(raw)
    .map(|dt| Some(dt.date_naive()))
    .map_err(|e| serde::de::Error::custom(format!("invalid date '{}': {}", raw, e)))
}
