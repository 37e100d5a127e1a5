//! Classified outcome of one backend call.

use std::collections::HashMap;
use std::time::Duration;

use once_cell::sync::OnceCell;
use serde::Serialize;
use serde_json::{json, Value};

use crate::domain::foundation::Timestamp;
use crate::domain::template::path::{extract, to_display};

/// How a call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApiResponseStatus {
    Success,
    ClientError,
    ServerError,
    Timeout,
    NetworkError,
}

impl ApiResponseStatus {
    /// Maps an HTTP status code: 2xx success, 4xx client error, anything
    /// else server error.
    pub fn from_code(code: u16) -> Self {
        match code {
            200..=299 => ApiResponseStatus::Success,
            400..=499 => ApiResponseStatus::ClientError,
            _ => ApiResponseStatus::ServerError,
        }
    }

    /// Worth another attempt when retries are configured.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ApiResponseStatus::ServerError
                | ApiResponseStatus::Timeout
                | ApiResponseStatus::NetworkError
        )
    }
}

/// Response of an external API call with lazily parsed JSON data.
#[derive(Debug, Clone)]
pub struct ExternalApiResponse {
    pub status: ApiResponseStatus,
    pub status_code: Option<u16>,
    pub body: Option<String>,
    pub headers: HashMap<String, String>,
    pub error_message: Option<String>,
    pub timestamp: Timestamp,
    pub duration: Duration,
    parsed: OnceCell<Option<Value>>,
}

impl ExternalApiResponse {
    /// Builds a response from a completed HTTP exchange.
    pub fn from_http(
        status_code: u16,
        body: String,
        headers: HashMap<String, String>,
        duration: Duration,
    ) -> Self {
        let status = ApiResponseStatus::from_code(status_code);
        let error_message = match status {
            ApiResponseStatus::Success => None,
            _ => Some(format!("HTTP {}", status_code)),
        };
        Self {
            status,
            status_code: Some(status_code),
            body: Some(body),
            headers,
            error_message,
            timestamp: Timestamp::now(),
            duration,
            parsed: OnceCell::new(),
        }
    }

    /// A call that produced no HTTP response.
    pub fn failure(status: ApiResponseStatus, message: impl Into<String>, duration: Duration) -> Self {
        Self {
            status,
            status_code: None,
            body: None,
            headers: HashMap::new(),
            error_message: Some(message.into()),
            timestamp: Timestamp::now(),
            duration,
            parsed: OnceCell::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ApiResponseStatus::Success
    }

    /// Body parsed as JSON, if it is JSON.
    pub fn json(&self) -> Option<&Value> {
        self.parsed
            .get_or_init(|| {
                let body = self.body.as_deref()?.trim();
                if body.is_empty() {
                    return None;
                }
                serde_json::from_str(body).ok()
            })
            .as_ref()
    }

    /// Structured data: objects as is, top-level arrays under `data`.
    pub fn data(&self) -> Option<Value> {
        match self.json()? {
            Value::Array(items) => Some(json!({ "data": items })),
            other => Some(other.clone()),
        }
    }

    /// Extracts a value by path; `"."` is the whole body.
    pub fn extract(&self, path: &str) -> Option<Value> {
        let path = path.trim();
        if path == "." || path == "$" {
            return self.json().cloned();
        }
        extract(&self.data()?, path).cloned()
    }

    /// Error text carried by a JSON error body (`error`, `message` or `msg`).
    pub fn error_detail(&self) -> Option<String> {
        let body = self.json()?.as_object()?;
        ["error", "message", "msg"].iter().find_map(|key| {
            let value = body.get(*key)?;
            let text = match value {
                Value::Object(inner) => inner.get("message").map(to_display)?,
                other => to_display(other),
            };
            (!text.trim().is_empty()).then_some(text)
        })
    }
}
