use reqwest::StatusCode;
use thiserror::Error;

/// Failures surfaced by the data layer.
#[derive(Debug, Error)]
pub enum ApiError {
  /// Transport failure: connection refused, DNS, timeout, TLS.
  #[error("Network error: {0}")]
  Network(String),

  #[error("Request failed with status {status}: {message}")]
  Http { status: StatusCode, message: String },

  #[error("Session expired, please log in again")]
  Unauthorized,

  #[error("{0}")]
  Validation(String),

  /// Error body returned by the Supabase REST or storage API.
  #[error("Query error: {0}")]
  Query(String),

  #[error("Unexpected response: {0}")]
  Decode(String),

  #[error("Session storage error: {0}")]
  Session(String),

  #[error("Offline and no cached data for {0}")]
  NoFallback(String),
}

impl ApiError {
  pub fn is_network(&self) -> bool {
    matches!(self, ApiError::Network(_))
  }
}

impl From<reqwest::Error> for ApiError {
  fn from(e: reqwest::Error) -> Self {
    if e.is_decode() {
      return ApiError::Decode(e.to_string());
    }
    match e.status() {
      Some(StatusCode::UNAUTHORIZED) => ApiError::Unauthorized,
      Some(status) => ApiError::Http {
        status,
        message: e.to_string(),
      },
      None => ApiError::Network(e.to_string()),
    }
  }
}

impl From<serde_json::Error> for ApiError {
  fn from(e: serde_json::Error) -> Self {
    ApiError::Decode(e.to_string())
  }
}

impl From<url::ParseError> for ApiError {
  fn from(e: url::ParseError) -> Self {
    ApiError::Validation(format!("Invalid URL: {}", e))
  }
}

impl From<color_eyre::Report> for ApiError {
  fn from(e: color_eyre::Report) -> Self {
    ApiError::Session(e.to_string())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_http_error_names_status() {
    let err = ApiError::Http {
      status: StatusCode::NOT_FOUND,
      message: "missing".to_string(),
    };
    assert_eq!(err.to_string(), "Request failed with status 404 Not Found: missing");
    assert!(!err.is_network());
    assert!(ApiError::Network("x".to_string()).is_network());
  }

  #[test]
  fn test_validation_message_is_shown_verbatim() {
    let err = ApiError::Validation("Please fill in all fields".to_string());
    assert_eq!(err.to_string(), "Please fill in all fields");
  }
}
