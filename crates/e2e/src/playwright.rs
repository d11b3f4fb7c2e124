//! Playwright browser automation
//!
//! A scenario runs as one node script so the page keeps its state (local
//! storage, the logged-in user) across steps. The script installs one route
//! per mocked pattern on the browser context. Every request matching one of
//! them, whatever its resource type, is forwarded to the scenario's mock
//! session and fulfilled with whatever it answers. A lower-priority catch-all
//! forwards the page's remaining API calls so the session can report them as
//! unhandled.

use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Duration;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::process::Command as TokioCommand;
use tracing::{debug, info, warn};

use jwt_pizza_mock::server::{FAILURE_HEADER, ORIGINAL_URL_HEADER};
use jwt_pizza_mock::UrlPattern;

use crate::error::{E2eError, E2eResult};
use crate::spec::{Scenario, TestStep};

/// Playwright browser handle
pub struct PlaywrightHandle {
    config: PlaywrightConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

/// Result of executing a test step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub success: bool,
    pub step_name: String,
    pub duration_ms: u64,
    pub error: Option<String>,
}

/// What a scenario script reported
#[derive(Debug, Clone, Default)]
pub struct ScriptOutcome {
    /// Steps that ran, in order; the last one carries the failure if any
    pub steps: Vec<StepResult>,

    /// Why the script stopped early
    pub error: Option<String>,

    /// Whether the script reached its end
    pub finished: bool,
}

impl ScriptOutcome {
    pub fn success(&self) -> bool {
        self.finished && self.error.is_none()
    }
}

/// One JSON line printed by the generated script
#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum ScriptEvent {
    Step {
        name: String,
        success: bool,
        duration_ms: u64,
        #[serde(default)]
        error: Option<String>,
    },
    Log {
        message: String,
    },
    Done {
        success: bool,
        #[serde(default)]
        error: Option<String>,
    },
}

/// Helpers shared by every generated script. Expects `mockUrl` and
/// `interceptPattern` to be defined before it.
const PRELUDE: &str = r#"
const mockFailures = [];
const droppedHeaders = ['host', 'content-length', 'connection', 'keep-alive', 'transfer-encoding', 'upgrade', 'expect'];

async function __forwardApi(route) {
  if (!['fetch', 'xhr'].includes(route.request().resourceType())) {
    return route.continue();
  }
  return __forward(route);
}

async function __forward(route) {
  const request = route.request();
  const target = new URL(request.url());
  const headers = { ...request.headers(), '__ORIGINAL_URL_HEADER__': request.url() };
  for (const name of droppedHeaders) delete headers[name];
  try {
    const response = await fetch(mockUrl + target.pathname + target.search, {
      method: request.method(),
      headers,
      body: request.postDataBuffer() ?? undefined,
    });
    const body = Buffer.from(await response.arrayBuffer());
    if (response.headers.get('__FAILURE_HEADER__')) {
      let message = `mock failure for ${request.method()} ${request.url()}`;
      try { message = JSON.parse(body.toString()).error || message; } catch (_) {}
      mockFailures.push(message);
    }
    await route.fulfill({ status: response.status, headers: Object.fromEntries(response.headers), body });
  } catch (e) {
    mockFailures.push(`mock server unreachable for ${request.method()} ${request.url()}: ${e.message}`);
    await route.abort();
  }
}

async function __step(index, name, body) {
  const started = Date.now();
  let error = null;
  try {
    await body();
    if (mockFailures.length > 0) throw new Error(mockFailures[0]);
  } catch (e) {
    error = e && e.message ? e.message : String(e);
  }
  console.log(JSON.stringify({ event: 'step', index, name, success: error === null, duration_ms: Date.now() - started, error }));
  if (error !== null) throw new Error(error);
}

function __log(message) {
  console.log(JSON.stringify({ event: 'log', message }));
}
"#;

/// Quote a string as a JavaScript literal
fn js(value: &str) -> String {
    Value::String(value.to_string()).to_string()
}

impl PlaywrightHandle {
    /// Create a new Playwright handle
    pub fn new(config: PlaywrightConfig) -> E2eResult<Self> {
        // Verify playwright is installed
        Self::check_playwright_installed(&config)?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PlaywrightConfig {
        &self.config
    }

    /// Check if Playwright is installed
    fn check_playwright_installed(config: &PlaywrightConfig) -> E2eResult<()> {
        let output = Command::new("npx")
            .args(["playwright", "--version"])
            .current_dir(&config.project_dir)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match output {
            Ok(status) if status.success() => Ok(()),
            _ => Err(E2eError::PlaywrightNotFound),
        }
    }

    /// Build the Playwright script for a scenario whose requests under
    /// `patterns` go to the mock session at `mock_url`
    pub fn build_script(&self, scenario: &Scenario, mock_url: &str, patterns: &[UrlPattern]) -> String {
        let mut script = String::new();

        // Header
        script.push_str(&format!(
            r#"
const {{ chromium, firefox, webkit }} = require('playwright');
const {{ expect: baseExpect }} = require('@playwright/test');

const baseUrl = {base_url};
const mockUrl = {mock_url};
const interceptPattern = {pattern};
const expect = baseExpect.configure({{ timeout: {timeout} }});
"#,
            base_url = js(self.config.base_url.trim_end_matches('/')),
            mock_url = js(mock_url.trim_end_matches('/')),
            pattern = js(&self.config.intercept_pattern),
            timeout = self.config.step_timeout_ms,
        ));

        script.push_str(
            &PRELUDE
                .replace("__ORIGINAL_URL_HEADER__", ORIGINAL_URL_HEADER)
                .replace("__FAILURE_HEADER__", FAILURE_HEADER),
        );

        script.push_str(&format!(
            r#"
(async () => {{
  const browser = await {browser}.launch({{ headless: {headless} }});
  const context = await browser.newContext({{
    viewport: {{ width: {width}, height: {height} }}
  }});
  context.setDefaultTimeout({timeout});
  // Routes registered later take precedence
  await context.route(interceptPattern, __forwardApi);
{mocked}  const page = await context.newPage();

  try {{
"#,
            browser = self.config.browser.as_str(),
            headless = self.config.headless,
            width = scenario.viewport.width,
            height = scenario.viewport.height,
            timeout = self.config.step_timeout_ms,
            mocked = patterns
                .iter()
                .map(|p| format!("  await context.route({}, __forward);\n", js(p.as_str())))
                .collect::<String>(),
        ));

        // Generate step code
        for (i, step) in scenario.steps.iter().enumerate() {
            script.push_str(&format!(
                "\n    await __step({}, {}, async () => {{\n{}\n    }});\n",
                i,
                js(&step.name()),
                self.step_to_js(step)
            ));
        }

        // Footer
        script.push_str(
            r#"
    console.log(JSON.stringify({ event: 'done', success: true }));
  } catch (error) {
    console.log(JSON.stringify({ event: 'done', success: false, error: error.message }));
    process.exitCode = 1;
  } finally {
    await browser.close();
  }
})();
"#,
        );

        script
    }

    /// Convert a step to JavaScript code
    fn step_to_js(&self, step: &TestStep) -> String {
        match step {
            TestStep::Navigate { url, wait_for_selector } => {
                let target = if url.starts_with("http://") || url.starts_with("https://") {
                    js(url)
                } else {
                    format!("baseUrl + {}", js(url))
                };
                let wait = wait_for_selector
                    .as_ref()
                    .map(|s| format!("\n      await page.waitForSelector({});", js(s)))
                    .unwrap_or_default();
                format!("      await page.goto({});{}", target, wait)
            }
            TestStep::Click { selector, timeout_ms } => {
                let timeout = timeout_ms.unwrap_or(self.config.step_timeout_ms);
                format!(
                    "      await page.locator({}).click({{ timeout: {} }});",
                    js(selector),
                    timeout
                )
            }
            TestStep::Fill { selector, value } => {
                format!("      await page.locator({}).fill({});", js(selector), js(value))
            }
            TestStep::Press { selector, key } => match selector {
                Some(sel) => format!("      await page.locator({}).press({});", js(sel), js(key)),
                None => format!("      await page.keyboard.press({});", js(key)),
            },
            TestStep::Select { selector, value } => {
                format!(
                    "      await page.locator({}).selectOption({});",
                    js(selector),
                    js(value)
                )
            }
            TestStep::Wait { selector, timeout_ms, state } => {
                format!(
                    "      await page.waitForSelector({}, {{ state: '{}', timeout: {} }});",
                    js(selector),
                    state.as_str(),
                    timeout_ms
                )
            }
            TestStep::Assert { selector, visible, text, text_contains, count } => {
                let locator = format!("page.locator({})", js(selector));
                let mut assertions = Vec::new();

                match visible {
                    Some(true) => assertions.push(format!("      await expect({}).toBeVisible();", locator)),
                    Some(false) => assertions.push(format!("      await expect({}).toBeHidden();", locator)),
                    None => {}
                }
                if let Some(t) = text {
                    assertions.push(format!("      await expect({}).toHaveText({});", locator, js(t)));
                }
                if let Some(tc) = text_contains {
                    assertions.push(format!(
                        "      await expect({}).toContainText({});",
                        locator,
                        js(tc)
                    ));
                }
                if let Some(c) = count {
                    assertions.push(format!("      await expect({}).toHaveCount({});", locator, c));
                }
                if assertions.is_empty() {
                    // Bare assert means "exists"
                    assertions.push(format!("      await expect({}.first()).toBeAttached();", locator));
                }

                assertions.join("\n")
            }
            TestStep::AssertTitle { title } => {
                format!("      await expect(page).toHaveTitle({});", js(title))
            }
            TestStep::Log { message } => format!("      __log({});", js(message)),
        }
    }

    /// Run a scenario's script to completion
    pub async fn run_scenario(
        &self,
        scenario: &Scenario,
        mock_url: &str,
        patterns: &[UrlPattern],
    ) -> E2eResult<ScriptOutcome> {
        let script = self.build_script(scenario, mock_url, patterns);

        // Write script to temp file
        let temp_dir = tempfile::tempdir()?;
        let script_path = temp_dir.path().join("scenario.js");
        std::fs::write(&script_path, script)?;

        debug!("Running Playwright script: {}", script_path.display());

        // Resolve playwright from the storefront checkout
        let node_path = self.config.project_dir.join("node_modules");
        let mut command = TokioCommand::new("node");
        command
            .arg(&script_path)
            .current_dir(&self.config.project_dir)
            .env("NODE_PATH", &node_path)
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.config.scenario_timeout, command.output())
            .await
            .map_err(|_| {
                E2eError::Timeout(format!(
                    "scenario '{}' after {:?}",
                    scenario.name, self.config.scenario_timeout
                ))
            })??;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let outcome = parse_output(&stdout);

        if !outcome.finished {
            return Err(E2eError::Playwright(format!(
                "Script for '{}' exited with {} before finishing:\nstdout: {}\nstderr: {}",
                scenario.name, output.status, stdout, stderr
            )));
        }
        if !stderr.trim().is_empty() {
            debug!("Playwright stderr for '{}': {}", scenario.name, stderr.trim());
        }

        Ok(outcome)
    }
}

/// Collect the step results and final status from a script's stdout
pub fn parse_output(stdout: &str) -> ScriptOutcome {
    let mut outcome = ScriptOutcome::default();

    for line in stdout.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let event: ScriptEvent = match serde_json::from_str(line) {
            Ok(event) => event,
            Err(_) => {
                debug!("[browser] {}", line);
                continue;
            }
        };

        match event {
            ScriptEvent::Step { name, success, duration_ms, error } => {
                if !success {
                    warn!("Step '{}' failed: {}", name, error.as_deref().unwrap_or("unknown error"));
                }
                outcome.steps.push(StepResult {
                    success,
                    step_name: name,
                    duration_ms,
                    error,
                });
            }
            ScriptEvent::Log { message } => info!("[TEST LOG] {}", message),
            ScriptEvent::Done { success, error } => {
                outcome.finished = true;
                if !success {
                    outcome.error = Some(error.unwrap_or_else(|| "scenario failed".to_string()));
                }
            }
        }
    }

    outcome
}

/// Configuration for Playwright
#[derive(Debug, Clone)]
pub struct PlaywrightConfig {
    /// Storefront origin the steps navigate relative to
    pub base_url: String,

    /// Storefront checkout holding `node_modules/playwright`
    pub project_dir: PathBuf,

    pub browser: Browser,
    pub headless: bool,

    /// Fetch/XHR requests matching this glob but no mocked pattern are still
    /// forwarded, so the mock session records them as unhandled
    pub intercept_pattern: String,

    /// Default timeout for actions and assertions
    pub step_timeout_ms: u64,

    /// Upper bound on one scenario's script
    pub scenario_timeout: Duration,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5173".to_string(),
            project_dir: PathBuf::from("."),
            browser: Browser::Chromium,
            headless: true,
            intercept_pattern: "**/api/**".to_string(),
            step_timeout_ms: 5000,
            scenario_timeout: Duration::from_secs(120),
        }
    }
}
