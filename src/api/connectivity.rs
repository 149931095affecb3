//! Reachability shared by every HTTP client.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

use super::error::ApiError;

/// Online/offline flag fed by request outcomes.
///
/// Any response from a server marks us online; a transport failure marks
/// us offline. Clones share one flag.
#[derive(Clone, Debug)]
pub struct Connectivity {
  online: Arc<watch::Sender<bool>>,
}

impl Default for Connectivity {
  fn default() -> Self {
    let (online, _) = watch::channel(true);
    Self {
      online: Arc::new(online),
    }
  }
}

impl Connectivity {
  pub fn is_online(&self) -> bool {
    *self.online.borrow()
  }

  pub fn set_online(&self, online: bool) {
    let changed = self.online.send_if_modified(|current| {
      if *current == online {
        return false;
      }
      *current = online;
      true
    });
    if changed {
      if online {
        info!("backend reachable, back online");
      } else {
        warn!("backend unreachable, switching to offline mode");
      }
    }
  }

  /// Receive online/offline transitions.
  pub fn subscribe(&self) -> watch::Receiver<bool> {
    self.online.subscribe()
  }

  /// Send a request, noting whether the server could be reached.
  pub async fn dispatch(
    &self,
    request: reqwest::RequestBuilder,
  ) -> Result<reqwest::Response, ApiError> {
    match request.send().await {
      Ok(response) => {
        self.set_online(true);
        Ok(response)
      }
      Err(e) => {
        self.set_online(false);
        Err(ApiError::Network(e.to_string()))
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::time::Duration;
  use wiremock::matchers::method;
  use wiremock::{Mock, MockServer, ResponseTemplate};

  #[tokio::test]
  async fn test_server_answer_counts_as_online() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .respond_with(ResponseTemplate::new(500))
      .mount(&server)
      .await;

    let connectivity = Connectivity::default();
    connectivity.set_online(false);
    let request = reqwest::Client::new().get(server.uri());
    let response = connectivity.dispatch(request).await.unwrap();

    assert_eq!(response.status(), 500);
    assert!(connectivity.is_online());
  }

  #[tokio::test]
  async fn test_transport_failure_goes_offline_and_notifies() {
    let connectivity = Connectivity::default();
    let mut changes = connectivity.subscribe();

    let request = reqwest::Client::builder()
      .timeout(Duration::from_secs(1))
      .build()
      .unwrap()
      .get("http://127.0.0.1:1/health");
    let err = connectivity.dispatch(request).await.unwrap_err();

    assert!(err.is_network());
    assert!(!connectivity.is_online());
    assert!(changes.has_changed().unwrap());
    assert!(!*changes.borrow_and_update());
  }
}
