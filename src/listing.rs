//! Plain-text listings for `exdesk ls`.

use clap::ValueEnum;

use crate::api::{ApiError, SmartApiService};
use crate::cache::CacheResult;
use crate::stores::format_currency;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum Entity {
  Exchanges,
  Tasks,
  Contacts,
  Users,
  Documents,
}

/// One tab-separated line per row, followed by a note when the rows did
/// not come live from the backend.
pub async fn rows(smart: &SmartApiService, entity: Entity) -> Result<Vec<String>, ApiError> {
  let listed: CacheResult<Vec<String>> = match entity {
    Entity::Exchanges => smart.get_exchanges().await?.try_map(|r| {
      Ok::<_, ApiError>(
        r.exchanges
          .into_iter()
          .map(|e| {
            let value = e.exchange_value.map(format_currency).unwrap_or_default();
            format!("{}\t{}\t{}\t{}", e.id, e.name, e.status.label(), value)
          })
          .collect(),
      )
    })?,
    Entity::Tasks => smart.get_tasks().await?.try_map(|tasks| {
      Ok::<_, ApiError>(
        tasks
          .into_iter()
          .map(|t| {
            let due = t.due_date.map(|d| d.to_string()).unwrap_or_default();
            format!(
              "{}\t{}\t{}\t{}\t{}",
              t.id,
              t.title,
              t.status.label(),
              t.priority.label(),
              due
            )
          })
          .collect(),
      )
    })?,
    Entity::Contacts => smart.get_contacts().await?.try_map(|contacts| {
      Ok::<_, ApiError>(
        contacts
          .into_iter()
          .map(|c| format!("{}\t{}\t{}", c.id, c.display_name(), c.email))
          .collect(),
      )
    })?,
    Entity::Users => smart.get_users().await?.try_map(|users| {
      Ok::<_, ApiError>(
        users
          .into_iter()
          .map(|u| format!("{}\t{}\t{}\t{}", u.id, u.display_name(), u.email, u.role.label()))
          .collect(),
      )
    })?,
    Entity::Documents => smart.get_documents().await?.try_map(|documents| {
      Ok::<_, ApiError>(
        documents
          .into_iter()
          .map(|d| format!("{}\t{}\t{}\t{}", d.id, d.original_filename, d.category, d.file_size))
          .collect(),
      )
    })?,
  };
  Ok(with_source(listed))
}

fn with_source(listed: CacheResult<Vec<String>>) -> Vec<String> {
  let degraded = listed.is_degraded();
  let source = listed.source.label();
  let mut lines = listed.data;
  if degraded {
    lines.push(format!("({} rows from {})", lines.len(), source));
  }
  lines
}
