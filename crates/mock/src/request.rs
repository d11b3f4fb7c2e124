//! Captured request snapshots

use axum::body::Bytes;
use axum::http::{HeaderMap, Method};
use serde_json::Value;

use crate::error::{MockError, MockResult};
use crate::matcher::subset_match;

/// Read-only snapshot of an intercepted request
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    /// Arrival order within the owning session, starting at 1
    pub seq: u64,
    pub method: Method,
    /// Full URL as the page issued it
    pub url: String,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// `body` parsed as JSON, when it is non-empty valid JSON
    pub json: Option<Value>,
}

impl CapturedRequest {
    /// Build a snapshot, parsing the body as JSON when possible
    pub fn new(method: Method, url: impl Into<String>, headers: HeaderMap, body: Bytes) -> Self {
        let json = if body.is_empty() {
            None
        } else {
            serde_json::from_slice(&body).ok()
        };

        Self {
            seq: 0,
            method,
            url: url.into(),
            headers,
            body,
            json,
        }
    }

    /// Shorthand for a JSON request, mostly useful in tests
    pub fn with_json(method: Method, url: impl Into<String>, json: Value) -> Self {
        let body = Bytes::from(json.to_string());
        Self::new(method, url, HeaderMap::new(), body)
    }

    /// Shorthand for a request without a body
    pub fn empty(method: Method, url: impl Into<String>) -> Self {
        Self::new(method, url, HeaderMap::new(), Bytes::new())
    }

    /// Parsed JSON body, if any
    pub fn post_data_json(&self) -> Option<&Value> {
        self.json.as_ref()
    }

    /// Look up a top-level field of the JSON body
    pub fn json_field(&self, field: &str) -> Option<&Value> {
        self.json.as_ref().and_then(|v| v.get(field))
    }

    /// Request path without scheme, host, or query
    pub fn path(&self) -> &str {
        let without_scheme = self
            .url
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(&self.url);
        let path = without_scheme
            .find('/')
            .map(|i| &without_scheme[i..])
            .unwrap_or("/");
        path.split(['?', '#']).next().unwrap_or(path)
    }

    /// Fail unless the request used `expected`
    pub fn expect_method(&self, expected: &Method) -> MockResult<()> {
        if &self.method == expected {
            Ok(())
        } else {
            Err(MockError::MethodMismatch {
                url: self.url.clone(),
                expected: expected.to_string(),
                actual: self.method.to_string(),
            })
        }
    }

    /// Fail unless the JSON body contains everything in `expected`
    pub fn expect_body(&self, expected: &Value) -> MockResult<()> {
        let actual = self.json.as_ref().ok_or_else(|| MockError::MissingBody {
            method: self.method.to_string(),
            url: self.url.clone(),
        })?;

        subset_match(expected, actual).map_err(|mismatches| MockError::BodyMismatch {
            method: self.method.to_string(),
            url: self.url.clone(),
            mismatches,
        })
    }
}
