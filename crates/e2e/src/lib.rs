//! JWT Pizza E2E Test Framework
//!
//! This crate drives the JWT Pizza storefront in a real browser against a
//! mocked backend:
//! - Spawns (or attaches to) the storefront dev server
//! - Parses declarative YAML scenarios: UI steps plus mocked API routes
//! - Starts a fresh mock session per scenario and forwards the page's API
//!   calls to it from inside the browser
//! - Runs the steps through Playwright and fails on any interception error
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    E2E Test Runner (Rust)                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TestRunner                                                 │
//! │    ├── start_app() -> AppServer                             │
//! │    ├── run_scenario(scenario) -> TestResult                 │
//! │    │     ├── mocks::compile() -> RouteTable                 │
//! │    │     ├── MockSession::start_with(routes)                │
//! │    │     ├── PlaywrightHandle::run_scenario()               │
//! │    │     └── MockSession::verify()                          │
//! │    └── write_results()                                      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Scenario (YAML)                                            │
//! │    ├── name, description, tags                              │
//! │    ├── mocks: [MockSpec]                                    │
//! │    │     ├── pattern, when?                                 │
//! │    │     ├── expect { method?, body? }                      │
//! │    │     └── respond { status, json }                       │
//! │    └── steps: [TestStep]                                    │
//! │          ├── navigate { url }                               │
//! │          ├── click { selector }                             │
//! │          ├── fill { selector, value }                       │
//! │          ├── select { selector, value }                     │
//! │          └── assert { selector, visible?, text_contains? }  │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod mocks;
pub mod playwright;
pub mod runner;
pub mod server;
pub mod spec;

pub use error::{E2eError, E2eResult};
pub use runner::TestRunner;
pub use spec::{Scenario, TestStep};
