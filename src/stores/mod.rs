//! Entity stores: a cache-bound query per entity list, derived filters over
//! the loaded rows, and mutations that invalidate the cached list.
//!
//! Mutations return `'static` futures so views can hand them straight to
//! `Query::once` without borrowing the store.

mod contacts;
mod documents;
mod reports;
mod tasks;
mod users;

pub use contacts::ContactsStore;
pub use documents::{format_size, DocumentsStore};
pub use reports::{format_currency, ReportsStore};
pub use tasks::TasksStore;
pub use users::UsersStore;

use crate::api::ApiError;

pub(crate) const MISSING_FIELDS: &str = "Please fill in all fields";

/// Reject the form when any required field is blank.
pub(crate) fn require_fields(fields: &[&str]) -> Result<(), ApiError> {
  if fields.iter().any(|f| f.trim().is_empty()) {
    return Err(ApiError::Validation(MISSING_FIELDS.to_string()));
  }
  Ok(())
}

/// Case-insensitive substring match over any of `haystacks`.
pub(crate) fn matches_term(term: &str, haystacks: &[Option<&str>]) -> bool {
  let term = term.trim().to_lowercase();
  if term.is_empty() {
    return true;
  }
  haystacks
    .iter()
    .flatten()
    .any(|h| h.to_lowercase().contains(&term))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_require_fields() {
    assert!(require_fields(&["a", "b"]).is_ok());
    let err = require_fields(&["a", "  "]).unwrap_err();
    assert_eq!(err.to_string(), MISSING_FIELDS);
  }

  #[test]
  fn test_matches_term() {
    assert!(matches_term("", &[None]));
    assert!(matches_term("ACME", &[None, Some("Acme Title Co")]));
    assert!(!matches_term("zeta", &[Some("alpha")]));
  }
}
