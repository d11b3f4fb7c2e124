//! Canned responses

use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::MockResult;

/// A scripted response returned in place of the real backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fulfillment {
    #[serde(default = "default_status")]
    pub status: u16,

    #[serde(default)]
    pub json: Value,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

fn default_status() -> u16 {
    200
}

impl Fulfillment {
    /// 200 with a JSON body
    pub fn json(body: Value) -> Self {
        Self {
            status: default_status(),
            json: body,
            headers: BTreeMap::new(),
        }
    }

    /// 200 with any serializable body
    pub fn serialize<T: Serialize>(body: &T) -> MockResult<Self> {
        Ok(Self::json(serde_json::to_value(body)?))
    }

    /// Error-shaped body with the given status
    pub fn error(status: u16, message: &str) -> Self {
        Self::json(serde_json::json!({ "error": message })).with_status(status)
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }
}

impl Default for Fulfillment {
    fn default() -> Self {
        Self::json(Value::Null)
    }
}

impl IntoResponse for Fulfillment {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = (status, axum::Json(self.json)).into_response();

        let headers = response.headers_mut();
        for (name, value) in &self.headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => tracing::warn!("Dropping invalid fulfillment header {}: {}", name, value),
            }
        }
        headers
            .entry(header::CONTENT_TYPE)
            .or_insert(HeaderValue::from_static("application/json"));

        response
    }
}
