//! Error types for request interception

use thiserror::Error;

use crate::matcher::Mismatch;

#[derive(Error, Debug, Clone)]
pub enum MockError {
    #[error("Invalid route pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Unhandled request: {method} {url} matches no registered route")]
    Unhandled { method: String, url: String },

    #[error("No rule matched {method} {url} (pattern(s) matched but every predicate declined)")]
    NoRuleMatched { method: String, url: String },

    #[error("Method mismatch for {url}: expected {expected}, got {actual}")]
    MethodMismatch {
        url: String,
        expected: String,
        actual: String,
    },

    #[error("Body mismatch for {method} {url}:\n{}", format_mismatches(.mismatches))]
    BodyMismatch {
        method: String,
        url: String,
        mismatches: Vec<Mismatch>,
    },

    #[error("Missing JSON body for {method} {url}")]
    MissingBody { method: String, url: String },

    #[error("Handler for {method} {url} did not resolve within {timeout_ms} ms")]
    HandlerTimeout {
        method: String,
        url: String,
        timeout_ms: u64,
    },

    #[error("Journal assertion failed: {0}")]
    JournalAssertion(String),

    #[error("Mock server error: {0}")]
    Server(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<std::io::Error> for MockError {
    fn from(err: std::io::Error) -> Self {
        MockError::Server(err.to_string())
    }
}

impl From<serde_json::Error> for MockError {
    fn from(err: serde_json::Error) -> Self {
        MockError::Serialization(err.to_string())
    }
}

fn format_mismatches(mismatches: &[Mismatch]) -> String {
    mismatches
        .iter()
        .map(|m| format!("  {}", m))
        .collect::<Vec<_>>()
        .join("\n")
}

pub type MockResult<T> = Result<T, MockError>;
