//! Main test runner that orchestrates the storefront, mock sessions, and Playwright

use std::path::PathBuf;
use std::time::Instant;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use jwt_pizza_mock::{InterceptRecord, MockResult, MockServerConfig, MockSession};

use crate::error::{E2eError, E2eResult};
use crate::mocks;
use crate::playwright::{PlaywrightConfig, PlaywrightHandle, ScriptOutcome, StepResult};
use crate::server::{AppServer, AppServerConfig};
use crate::spec::Scenario;

/// Result of running a single scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,
    pub success: bool,
    pub duration_ms: u64,
    pub steps: Vec<StepResult>,
    /// Every request the mock session saw, in arrival order
    pub requests: Vec<RequestRecord>,
    pub mock_failures: Vec<String>,
    pub error: Option<String>,
}

impl TestResult {
    fn failed(name: &str, error: String) -> Self {
        Self {
            name: name.to_string(),
            success: false,
            duration_ms: 0,
            steps: vec![],
            requests: vec![],
            mock_failures: vec![],
            error: Some(error),
        }
    }
}

/// Journal entry as written to the results file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestRecord {
    pub seq: u64,
    pub method: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    /// Index of the rule that answered, if any
    pub rule: Option<usize>,
    pub status: Option<u16>,
}

impl From<&InterceptRecord> for RequestRecord {
    fn from(record: &InterceptRecord) -> Self {
        Self {
            seq: record.request.seq,
            method: record.request.method.to_string(),
            url: record.request.url.clone(),
            body: record.request.json.clone(),
            rule: record.rule,
            status: record.status,
        }
    }
}

/// Result of running all scenarios
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSuiteResult {
    pub started_at: DateTime<Utc>,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub duration_ms: u64,
    pub results: Vec<TestResult>,
}

impl TestSuiteResult {
    pub fn success(&self) -> bool {
        self.failed == 0
    }
}

/// Main E2E test runner
pub struct TestRunner {
    app_config: AppServerConfig,
    playwright_config: PlaywrightConfig,
    mock_config: MockServerConfig,

    /// Running storefront handle (if any)
    app: Option<AppServer>,

    scenarios_dir: PathBuf,
    output_dir: PathBuf,
}

impl TestRunner {
    /// Create a new test runner with default configuration
    pub fn new() -> Self {
        Self::with_config(RunnerConfig::default())
    }

    /// Create a test runner with custom configuration
    pub fn with_config(config: RunnerConfig) -> Self {
        Self {
            app_config: config.app,
            playwright_config: config.playwright,
            mock_config: config.mock,
            app: None,
            scenarios_dir: config.scenarios_dir,
            output_dir: config.output_dir,
        }
    }

    /// Start (or attach to) the storefront
    pub async fn start_app(&mut self) -> E2eResult<()> {
        if self.app.is_some() {
            return Ok(()); // Already running
        }

        let app = AppServer::start(self.app_config.clone()).await?;

        // Navigate relative to wherever the storefront actually answered
        self.playwright_config.base_url = app.base_url().to_string();

        self.app = Some(app);
        Ok(())
    }

    /// Stop the storefront
    pub fn stop_app(&mut self) -> E2eResult<()> {
        if let Some(mut app) = self.app.take() {
            app.stop()?;
        }
        Ok(())
    }

    /// Load every scenario in the scenarios directory
    pub fn load_scenarios(&self) -> E2eResult<Vec<Scenario>> {
        Scenario::load_all(&self.scenarios_dir)
    }

    /// Run all scenarios in the scenarios directory
    pub async fn run_all(&mut self) -> E2eResult<TestSuiteResult> {
        let scenarios = self.load_scenarios()?;
        if scenarios.is_empty() {
            return Err(E2eError::NoScenarios(format!(
                "{} holds no scenario files",
                self.scenarios_dir.display()
            )));
        }
        self.run_scenarios(&scenarios).await
    }

    /// Run scenarios matching a tag
    pub async fn run_tagged(&mut self, tag: &str) -> E2eResult<TestSuiteResult> {
        let scenarios = self.load_scenarios()?;
        let filtered: Vec<Scenario> = Scenario::filter_by_tag(&scenarios, tag)
            .into_iter()
            .cloned()
            .collect();
        if filtered.is_empty() {
            return Err(E2eError::NoScenarios(format!("no scenario is tagged '{}'", tag)));
        }
        self.run_scenarios(&filtered).await
    }

    /// Run a specific scenario by name
    pub async fn run_named(&mut self, name: &str) -> E2eResult<TestSuiteResult> {
        let scenario = self
            .load_scenarios()?
            .into_iter()
            .find(|s| s.name == name)
            .ok_or_else(|| E2eError::NoScenarios(format!("no scenario named '{}'", name)))?;

        self.run_scenarios(std::slice::from_ref(&scenario)).await
    }

    /// Run a list of scenarios, one fresh mock session each
    pub async fn run_scenarios(&mut self, scenarios: &[Scenario]) -> E2eResult<TestSuiteResult> {
        if scenarios.is_empty() {
            return Err(E2eError::NoScenarios("empty scenario list".to_string()));
        }

        let started_at = Utc::now();
        let start = Instant::now();
        let mut results = Vec::new();
        let mut passed = 0;
        let mut failed = 0;

        // Ensure the storefront is up
        self.start_app().await?;

        info!("Running {} scenario(s)...", scenarios.len());

        for scenario in scenarios {
            let result = match self.run_scenario(scenario).await {
                Ok(result) => result,
                Err(e) => TestResult::failed(&scenario.name, e.to_string()),
            };

            if result.success {
                passed += 1;
                info!("✓ {} ({} ms)", result.name, result.duration_ms);
            } else {
                failed += 1;
                error!(
                    "✗ {} - {}",
                    result.name,
                    result.error.as_deref().unwrap_or("unknown error")
                );
            }
            results.push(result);
        }

        let duration_ms = start.elapsed().as_millis() as u64;

        info!("");
        info!(
            "Test Results: {} passed, {} failed ({} ms)",
            passed, failed, duration_ms
        );

        Ok(TestSuiteResult {
            started_at,
            total: scenarios.len(),
            passed,
            failed,
            duration_ms,
            results,
        })
    }

    /// Run a single scenario against its own mock session
    pub async fn run_scenario(&self, scenario: &Scenario) -> E2eResult<TestResult> {
        let start = Instant::now();
        debug!("Running scenario: {}", scenario.name);

        mocks::validate_contract(scenario)?;
        let routes = mocks::compile(scenario)?;

        let playwright = PlaywrightHandle::new(self.playwright_config.clone())?;
        let session = MockSession::start_with(self.mock_config.clone(), routes).await?;

        let outcome = playwright
            .run_scenario(scenario, &session.base_url(), &session.patterns())
            .await;

        // The journal and failures are read before the session goes away
        let requests: Vec<RequestRecord> = session.records().iter().map(RequestRecord::from).collect();
        let mock_failures: Vec<String> = session
            .failures()
            .iter()
            .map(|f| f.error.to_string())
            .collect();
        let verified = session.verify();
        session.shutdown().await;

        if !mock_failures.is_empty() {
            warn!(
                "Scenario '{}' recorded {} mock failure(s)",
                scenario.name,
                mock_failures.len()
            );
        }

        Ok(scenario_result(
            &scenario.name,
            start,
            outcome,
            verified,
            requests,
            mock_failures,
        ))
    }

    /// Write suite results to `test-results.json` in the output directory
    pub fn write_results(&self, results: &TestSuiteResult) -> E2eResult<PathBuf> {
        std::fs::create_dir_all(&self.output_dir)?;

        let path = self.output_dir.join("test-results.json");
        let json = serde_json::to_string_pretty(results)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }
}

/// Combine the script outcome with what the mock session saw
fn scenario_result(
    name: &str,
    start: Instant,
    outcome: E2eResult<ScriptOutcome>,
    verified: MockResult<()>,
    requests: Vec<RequestRecord>,
    mock_failures: Vec<String>,
) -> TestResult {
    let outcome = outcome.unwrap_or_else(|e| ScriptOutcome {
        error: Some(e.to_string()),
        ..Default::default()
    });

    // An interception failure explains a UI failure better than the locator timeout it caused
    let error = match verified {
        Err(e) => Some(e.to_string()),
        Ok(()) => outcome.error.clone(),
    };

    TestResult {
        name: name.to_string(),
        success: error.is_none() && outcome.finished,
        duration_ms: start.elapsed().as_millis() as u64,
        steps: outcome.steps,
        requests,
        mock_failures,
        error,
    }
}

impl Default for TestRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TestRunner {
    fn drop(&mut self) {
        let _ = self.stop_app();
    }
}

/// Configuration for the test runner
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub app: AppServerConfig,
    pub playwright: PlaywrightConfig,
    pub mock: MockServerConfig,
    pub scenarios_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            app: AppServerConfig::default(),
            playwright: PlaywrightConfig::default(),
            mock: MockServerConfig::default(),
            scenarios_dir: PathBuf::from("scenarios"),
            output_dir: PathBuf::from("test-results"),
        }
    }
}
