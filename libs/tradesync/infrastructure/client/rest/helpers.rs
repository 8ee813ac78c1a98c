//! Shared HTTP helper functions for the REST client

use super::RestError;
use serde_json::Value;
use tracing::warn;

/// Extract error message from a failed API response
pub async fn extract_api_error(response: reqwest::Response, context: &str) -> RestError {
    let status = response.status();
    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    RestError::ApiError(format!("{} ({}): {}", context, status, error_text))
}

/// Check if response is successful, returning the response or an error
pub async fn require_success(
    response: reqwest::Response,
    context: &str,
) -> Result<reqwest::Response, RestError> {
    if !response.status().is_success() {
        return Err(extract_api_error(response, context).await);
    }
    Ok(response)
}

/// Deserialize JSON response with proper error handling
pub async fn parse_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, RestError> {
    response
        .json()
        .await
        .map_err(|e| RestError::DeserializeFailed(e.to_string()))
}

/// Bodies arrive either bare or wrapped as `{"data": ...}`
pub fn unwrap_data(body: Value) -> Value {
    match body {
        Value::Object(mut obj) if obj.contains_key("data") => {
            obj.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

/// Map every array entry, skipping the ones that fail
pub fn collect_entities<T, E, F>(body: Value, kind: &str, map: F) -> Result<Vec<T>, RestError>
where
    E: std::fmt::Display,
    F: Fn(&Value) -> Result<T, E>,
{
    let entries = match unwrap_data(body) {
        Value::Array(entries) => entries,
        Value::Null => Vec::new(),
        other => {
            return Err(RestError::DeserializeFailed(format!(
                "expected an array of {}, got {}",
                kind,
                json_kind(&other)
            )))
        }
    };

    let mut entities = Vec::with_capacity(entries.len());
    for entry in &entries {
        match map(entry) {
            Ok(entity) => entities.push(entity),
            Err(e) => warn!("[Rest] Skipping unparseable {} entry: {}", kind, e),
        }
    }
    Ok(entities)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
