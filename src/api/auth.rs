//! What happens when the backend rejects our credentials.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, warn};

use crate::session::Session;

/// Authentication state broadcast to the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
  SignedIn,
  SignedOut,
  /// Credentials were rejected and could not be recovered
  LoginRequired,
}

/// Policy invoked when a request comes back 401 and cannot be recovered.
pub trait UnauthorizedPolicy: Send + Sync {
  fn on_unauthorized(&self, session: &Session);
}

/// Clears stored credentials and announces that a new login is needed.
pub struct ClearSessionPolicy {
  events: Arc<watch::Sender<AuthEvent>>,
}

impl ClearSessionPolicy {
  pub fn new(events: Arc<watch::Sender<AuthEvent>>) -> Self {
    Self { events }
  }
}

impl UnauthorizedPolicy for ClearSessionPolicy {
  fn on_unauthorized(&self, session: &Session) {
    warn!("credentials rejected, clearing session");
    if let Err(e) = session.clear() {
      error!(error = %e, "failed to clear session");
    }
    self.events.send_replace(AuthEvent::LoginRequired);
  }
}

/// Leaves the session alone. Used by one-shot CLI commands.
pub struct IgnoreUnauthorized;

impl UnauthorizedPolicy for IgnoreUnauthorized {
  fn on_unauthorized(&self, _session: &Session) {}
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_clear_session_policy() {
    let (tx, rx) = watch::channel(AuthEvent::SignedIn);
    let policy = ClearSessionPolicy::new(Arc::new(tx));
    let session = Session::in_memory();
    session.store_tokens("t", Some("r")).unwrap();

    policy.on_unauthorized(&session);

    assert!(!session.is_signed_in());
    assert_eq!(*rx.borrow(), AuthEvent::LoginRequired);
  }
}
