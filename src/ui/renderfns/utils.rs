use crate::api::types::{ExchangeStatus, TaskPriority, TaskStatus};
use crate::cache::CacheSource;
use chrono::{DateTime, NaiveDate, Utc};
use ratatui::prelude::Color;

/// Truncate to `max_len` characters, adding "..." if truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

pub fn exchange_status_color(status: ExchangeStatus) -> Color {
  match status {
    ExchangeStatus::Pending => Color::White,
    ExchangeStatus::Identification => Color::Yellow,
    ExchangeStatus::Closing => Color::LightMagenta,
    ExchangeStatus::OnHold => Color::DarkGray,
    ExchangeStatus::Completed => Color::Green,
    ExchangeStatus::Terminated => Color::Red,
    ExchangeStatus::Other => Color::Gray,
  }
}

pub fn task_status_color(status: TaskStatus) -> Color {
  match status {
    TaskStatus::Pending => Color::White,
    TaskStatus::InProgress => Color::Yellow,
    TaskStatus::Completed => Color::Green,
    TaskStatus::Cancelled => Color::DarkGray,
  }
}

pub fn priority_color(priority: TaskPriority) -> Color {
  match priority {
    TaskPriority::Low => Color::DarkGray,
    TaskPriority::Medium => Color::White,
    TaskPriority::High => Color::Yellow,
    TaskPriority::Urgent => Color::Red,
  }
}

/// Tag color for data that did not come straight from the network.
pub fn source_color(source: CacheSource) -> Color {
  match source {
    CacheSource::Network | CacheSource::CacheFresh => Color::DarkGray,
    CacheSource::CacheStale | CacheSource::Offline => Color::Yellow,
    CacheSource::Fallback => Color::Red,
  }
}

/// Deadline cell: date plus days remaining, colored by urgency.
pub fn deadline_label(deadline: Option<NaiveDate>, today: NaiveDate) -> (String, Color) {
  match deadline {
    None => ("-".to_string(), Color::DarkGray),
    Some(date) => {
      let days = (date - today).num_days();
      let color = match days {
        d if d < 0 => Color::Red,
        0..=7 => Color::LightRed,
        8..=30 => Color::Yellow,
        _ => Color::White,
      };
      (format!("{} ({}d)", date.format("%Y-%m-%d"), days), color)
    }
  }
}

pub fn format_timestamp(ts: Option<DateTime<Utc>>) -> String {
  ts.map(|t| t.format("%Y-%m-%d %H:%M").to_string())
    .unwrap_or_else(|| "-".to_string())
}
