//! JWT Pizza Mock Interception Layer
//!
//! This crate stands in for the JWT Pizza backend during browser E2E tests:
//! - Captures every request the page under test sends to the API
//! - Routes it to the first rule whose glob pattern and predicate match
//! - Asserts method and body shape (subset match) before fulfilling
//! - Answers with a canned JSON response, or records a failure
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 MockSession (one per test)                  │
//! ├─────────────────────────────────────────────────────────────┤
//! │  axum fallback ──► Interceptor                              │
//! │                      ├── journal: [CapturedRequest]         │
//! │                      ├── failures: [InterceptFailure]       │
//! │                      └── RouteTable                         │
//! │                            └── [RouteRule]                  │
//! │                                  ├── pattern: UrlPattern    │
//! │                                  ├── when: RequestPredicate │
//! │                                  └── handler ──► Fulfillment│
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use jwt_pizza_mock::{Expectation, Fulfillment, MockSession};
//! use serde_json::json;
//!
//! # async fn demo() -> jwt_pizza_mock::MockResult<()> {
//! let session = MockSession::start().await?;
//! session.route(
//!     "*/**/api/auth",
//!     Expectation::put()
//!         .with_body(json!({ "email": "d@jwt.com", "password": "a" }))
//!         .respond(Fulfillment::json(json!({ "token": "abcdef" }))),
//! )?;
//! // ... drive the page against session.base_url() ...
//! session.verify()?;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod error;
pub mod fulfillment;
pub mod matcher;
pub mod pattern;
pub mod request;
pub mod route;
pub mod server;

pub use error::{MockError, MockResult};
pub use fulfillment::Fulfillment;
pub use matcher::{subset_match, Mismatch};
pub use pattern::UrlPattern;
pub use request::CapturedRequest;
pub use route::{Expectation, RequestPredicate, RouteHandler, RouteRule, RouteTable};
pub use server::{InterceptFailure, InterceptRecord, MockServerConfig, MockSession};
