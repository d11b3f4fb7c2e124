//! Error types for E2E testing

use thiserror::Error;

use jwt_pizza_mock::MockError;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Storefront failed to start: {0}")]
    ServerStartup(String),

    #[error("Storefront health check failed after {0} attempts")]
    ServerHealthCheck(usize),

    #[error("Playwright not found. Install with: npx playwright install")]
    PlaywrightNotFound,

    #[error("Playwright error: {0}")]
    Playwright(String),

    #[error("Scenario parse error: {0}")]
    SpecParse(String),

    #[error("No scenarios selected: {0}")]
    NoScenarios(String),

    #[error("Contract violation in scenario '{scenario}': {reason}")]
    Contract { scenario: String, reason: String },

    #[error("Timeout waiting for: {0}")]
    Timeout(String),

    #[error("Mock interception error: {0}")]
    Mock(#[from] MockError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type E2eResult<T> = Result<T, E2eError>;
