//! Decoding of the response envelopes used across the backend.
//!
//! Endpoints are inconsistent about wrapping: a list may arrive as
//! `{ "contacts": [...] }`, `{ "data": [...] }` or a bare array, and a
//! single record as `{ "exchange": {...} }`, `{ "data": {...} }` or the
//! bare object. Everything funnels through here so the rest of the crate
//! only sees typed values.

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::error::ApiError;

/// Decode a list response, looking for `field`, then `data`, then a bare array.
pub fn decode_list<T: DeserializeOwned>(value: Value, field: &str) -> Result<Vec<T>, ApiError> {
  let items = match value {
    Value::Array(_) => value,
    Value::Object(mut map) => match map.remove(field).or_else(|| map.remove("data")) {
      Some(inner @ Value::Array(_)) => inner,
      // Some endpoints nest one level deeper: { data: { contacts: [...] } }
      Some(Value::Object(mut nested)) => match nested.remove(field) {
        Some(inner @ Value::Array(_)) => inner,
        _ => {
          return Err(ApiError::Decode(format!(
            "expected a list under '{}' or 'data'",
            field
          )))
        }
      },
      Some(Value::Null) | None => Value::Array(Vec::new()),
      Some(other) => {
        return Err(ApiError::Decode(format!(
          "expected a list under '{}', found {}",
          field,
          kind(&other)
        )))
      }
    },
    Value::Null => Value::Array(Vec::new()),
    other => {
      return Err(ApiError::Decode(format!(
        "expected a list of {}, found {}",
        field,
        kind(&other)
      )))
    }
  };

  serde_json::from_value(items).map_err(|e| ApiError::Decode(format!("{}: {}", field, e)))
}

/// Decode a single record, looking for `field`, then `data`, then the bare object.
pub fn decode_one<T: DeserializeOwned>(value: Value, field: &str) -> Result<T, ApiError> {
  let record = match value {
    Value::Object(mut map) => {
      if let Some(inner @ Value::Object(_)) = map.remove(field) {
        inner
      } else if let Some(inner @ Value::Object(_)) = map.remove("data") {
        inner
      } else {
        Value::Object(map)
      }
    }
    other => {
      return Err(ApiError::Decode(format!(
        "expected a {} object, found {}",
        field,
        kind(&other)
      )))
    }
  };

  serde_json::from_value(record).map_err(|e| ApiError::Decode(format!("{}: {}", field, e)))
}

/// Extract a human-readable message from an error body.
pub fn error_message(body: &Value) -> Option<String> {
  ["error", "message", "msg", "error_description"]
    .iter()
    .find_map(|key| match body.get(key) {
      Some(Value::String(s)) => Some(s.clone()),
      Some(Value::Object(inner)) => inner
        .get("message")
        .and_then(|m| m.as_str())
        .map(String::from),
      _ => None,
    })
}

fn kind(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "a boolean",
    Value::Number(_) => "a number",
    Value::String(_) => "a string",
    Value::Array(_) => "an array",
    Value::Object(_) => "an object",
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde::Deserialize;
  use serde_json::json;

  #[derive(Debug, Deserialize, PartialEq)]
  struct Item {
    id: u32,
  }

  #[test]
  fn test_list_shapes() {
    let named: Vec<Item> = decode_list(json!({ "users": [{ "id": 1 }] }), "users").unwrap();
    let data: Vec<Item> = decode_list(json!({ "data": [{ "id": 2 }] }), "users").unwrap();
    let bare: Vec<Item> = decode_list(json!([{ "id": 3 }]), "users").unwrap();
    let nested: Vec<Item> =
      decode_list(json!({ "data": { "users": [{ "id": 4 }] } }), "users").unwrap();

    assert_eq!(named, vec![Item { id: 1 }]);
    assert_eq!(data, vec![Item { id: 2 }]);
    assert_eq!(bare, vec![Item { id: 3 }]);
    assert_eq!(nested, vec![Item { id: 4 }]);
  }

  #[test]
  fn test_list_missing_or_null_is_empty() {
    let empty: Vec<Item> = decode_list(json!({ "total": 0 }), "users").unwrap();
    assert!(empty.is_empty());
    let null: Vec<Item> = decode_list(Value::Null, "users").unwrap();
    assert!(null.is_empty());
  }

  #[test]
  fn test_list_wrong_shape_is_decode_error() {
    let err = decode_list::<Item>(json!("nope"), "users").unwrap_err();
    assert!(matches!(err, ApiError::Decode(_)));
  }

  #[test]
  fn test_one_shapes() {
    let named: Item = decode_one(json!({ "exchange": { "id": 1 } }), "exchange").unwrap();
    let data: Item = decode_one(json!({ "data": { "id": 2 } }), "exchange").unwrap();
    let bare: Item = decode_one(json!({ "id": 3 }), "exchange").unwrap();
    assert_eq!((named.id, data.id, bare.id), (1, 2, 3));
  }

  #[test]
  fn test_error_message() {
    assert_eq!(
      error_message(&json!({ "error": "Invalid credentials" })).as_deref(),
      Some("Invalid credentials")
    );
    assert_eq!(
      error_message(&json!({ "error": { "message": "nested" } })).as_deref(),
      Some("nested")
    );
    assert_eq!(error_message(&json!({ "ok": false })), None);
  }
}
