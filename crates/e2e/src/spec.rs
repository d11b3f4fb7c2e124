//! Declarative YAML scenario specification

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

use jwt_pizza_mock::Fulfillment;

use crate::error::{E2eError, E2eResult};

/// A complete scenario parsed from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Unique name for this scenario
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Tags for filtering scenarios
    #[serde(default)]
    pub tags: Vec<String>,

    /// Viewport size for the browser
    #[serde(default = "default_viewport")]
    pub viewport: Viewport,

    /// Mocked backend routes, evaluated first-match-wins in this order
    #[serde(default)]
    pub mocks: Vec<MockSpec>,

    /// Steps to execute in order
    pub steps: Vec<TestStep>,
}

fn default_viewport() -> Viewport {
    Viewport { width: 1280, height: 720 }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// One mocked route rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MockSpec {
    /// Glob over the full request URL, e.g. `*/**/api/order`
    pub pattern: String,

    /// Only apply this rule when the predicate holds
    #[serde(default)]
    pub when: Option<WhenSpec>,

    /// Assertions on the request; a failure fails the scenario
    #[serde(default)]
    pub expect: ExpectSpec,

    /// Canned response
    #[serde(default)]
    pub respond: Fulfillment,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WhenSpec {
    #[serde(default)]
    pub method: Option<String>,

    /// JSON body contains this value (subset match)
    #[serde(default)]
    pub body: Option<Value>,

    /// Require the request to carry (true) or lack (false) a JSON body
    #[serde(default)]
    pub has_body: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExpectSpec {
    #[serde(default)]
    pub method: Option<String>,

    /// Expected JSON body (subset match)
    #[serde(default)]
    pub body: Option<Value>,
}

/// A single step in a scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TestStep {
    /// Navigate to a URL (relative to base)
    Navigate {
        url: String,
        #[serde(default)]
        wait_for_selector: Option<String>,
    },

    /// Click an element
    Click {
        selector: String,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },

    /// Fill an input field
    Fill {
        selector: String,
        value: String,
    },

    /// Press a key, on an element or on the page
    Press {
        #[serde(default)]
        selector: Option<String>,
        key: String,
    },

    /// Select an option from a dropdown
    Select {
        selector: String,
        value: String,
    },

    /// Wait for an element to reach a state
    Wait {
        selector: String,
        #[serde(default = "default_wait_timeout")]
        timeout_ms: u64,
        #[serde(default)]
        state: WaitState,
    },

    /// Assert something about an element
    Assert {
        selector: String,
        #[serde(default)]
        visible: Option<bool>,
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        text_contains: Option<String>,
        #[serde(default)]
        count: Option<usize>,
    },

    /// Assert the document title
    AssertTitle {
        title: String,
    },

    /// Log a message (for debugging)
    Log {
        message: String,
    },
}

fn default_wait_timeout() -> u64 {
    5000 // 5 seconds default
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitState {
    #[default]
    Visible,
    Hidden,
    Attached,
    Detached,
}

impl WaitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WaitState::Visible => "visible",
            WaitState::Hidden => "hidden",
            WaitState::Attached => "attached",
            WaitState::Detached => "detached",
        }
    }
}

impl TestStep {
    /// Short label used in logs and results
    pub fn name(&self) -> String {
        match self {
            TestStep::Navigate { url, .. } => format!("navigate:{}", url),
            TestStep::Click { selector, .. } => format!("click:{}", selector),
            TestStep::Fill { selector, .. } => format!("fill:{}", selector),
            TestStep::Press { key, .. } => format!("press:{}", key),
            TestStep::Select { selector, .. } => format!("select:{}", selector),
            TestStep::Wait { selector, .. } => format!("wait:{}", selector),
            TestStep::Assert { selector, .. } => format!("assert:{}", selector),
            TestStep::AssertTitle { title } => format!("title:{}", title),
            TestStep::Log { message } => {
                format!("log:{}", message.chars().take(30).collect::<String>())
            }
        }
    }
}

impl Scenario {
    /// Parse a scenario from a YAML string
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        let scenario: Self = serde_yaml::from_str(yaml)?;
        if scenario.name.trim().is_empty() {
            return Err(E2eError::SpecParse("scenario name is empty".to_string()));
        }
        Ok(scenario)
    }

    /// Parse a scenario from a YAML file
    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
            .map_err(|e| E2eError::SpecParse(format!("{}: {}", path.display(), e)))
    }

    /// Load all scenarios from a directory, ordered by file name
    pub fn load_all(dir: &Path) -> E2eResult<Vec<Self>> {
        let mut scenarios: Vec<Self> = Vec::new();

        for entry in walkdir::WalkDir::new(dir).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                E2eError::SpecParse(format!("cannot read scenarios in {}: {}", dir.display(), e))
            })?;
            let is_yaml = entry
                .path()
                .extension()
                .map(|ext| ext == "yaml" || ext == "yml")
                .unwrap_or(false);
            if !is_yaml {
                continue;
            }

            let scenario = Self::from_file(entry.path())?;
            if scenarios.iter().any(|s| s.name == scenario.name) {
                return Err(E2eError::SpecParse(format!(
                    "duplicate scenario name '{}' in {}",
                    scenario.name,
                    entry.path().display()
                )));
            }
            scenarios.push(scenario);
        }

        Ok(scenarios)
    }

    /// Filter scenarios by tag
    pub fn filter_by_tag<'a>(scenarios: &'a [Self], tag: &str) -> Vec<&'a Self> {
        scenarios
            .iter()
            .filter(|s| s.tags.iter().any(|t| t == tag))
            .collect()
    }
}
