//! Route rules and the ordered route table

use async_trait::async_trait;
use axum::http::Method;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::error::{MockError, MockResult};
use crate::fulfillment::Fulfillment;
use crate::matcher::is_subset;
use crate::pattern::UrlPattern;
use crate::request::CapturedRequest;

/// Produces the fulfillment for an intercepted request, or fails the test
#[async_trait]
pub trait RouteHandler: Send + Sync {
    async fn handle(&self, request: &CapturedRequest) -> MockResult<Fulfillment>;
}

/// Adapter for synchronous closures
struct FnHandler<F>(F);

#[async_trait]
impl<F> RouteHandler for FnHandler<F>
where
    F: Fn(&CapturedRequest) -> MockResult<Fulfillment> + Send + Sync,
{
    async fn handle(&self, request: &CapturedRequest) -> MockResult<Fulfillment> {
        (self.0)(request)
    }
}

/// Scripted handler: assert method and body, then answer with a fixed response
#[derive(Debug, Clone)]
pub struct Expectation {
    pub method: Option<Method>,
    pub body: Option<Value>,
    pub response: Fulfillment,
}

impl Expectation {
    /// Expect the given method; responds with `null` until [`respond`](Self::respond) is called
    pub fn method(method: Method) -> Self {
        Self {
            method: Some(method),
            body: None,
            response: Fulfillment::default(),
        }
    }

    pub fn get() -> Self {
        Self::method(Method::GET)
    }

    pub fn post() -> Self {
        Self::method(Method::POST)
    }

    pub fn put() -> Self {
        Self::method(Method::PUT)
    }

    pub fn delete() -> Self {
        Self::method(Method::DELETE)
    }

    /// Require the JSON body to contain `body` (subset match)
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn respond(mut self, response: Fulfillment) -> Self {
        self.response = response;
        self
    }
}

#[async_trait]
impl RouteHandler for Expectation {
    async fn handle(&self, request: &CapturedRequest) -> MockResult<Fulfillment> {
        if let Some(method) = &self.method {
            request.expect_method(method)?;
        }
        if let Some(body) = &self.body {
            request.expect_body(body)?;
        }
        Ok(self.response.clone())
    }
}

/// Decides whether a rule applies to a request
#[derive(Clone, Default)]
pub enum RequestPredicate {
    #[default]
    Always,
    Method(Method),
    /// JSON body contains the given value (subset match)
    BodyMatches(Value),
    BodyPresent,
    BodyAbsent,
    All(Vec<RequestPredicate>),
    Custom(Arc<dyn Fn(&CapturedRequest) -> bool + Send + Sync>),
}

impl RequestPredicate {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&CapturedRequest) -> bool + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(f))
    }

    pub fn evaluate(&self, request: &CapturedRequest) -> bool {
        match self {
            Self::Always => true,
            Self::Method(m) => &request.method == m,
            Self::BodyMatches(expected) => request
                .json
                .as_ref()
                .map(|actual| is_subset(expected, actual))
                .unwrap_or(false),
            Self::BodyPresent => request.json.is_some(),
            Self::BodyAbsent => request.json.is_none(),
            Self::All(all) => all.iter().all(|p| p.evaluate(request)),
            Self::Custom(f) => f(request),
        }
    }
}

impl fmt::Debug for RequestPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Always => write!(f, "Always"),
            Self::Method(m) => write!(f, "Method({})", m),
            Self::BodyMatches(v) => write!(f, "BodyMatches({})", v),
            Self::BodyPresent => write!(f, "BodyPresent"),
            Self::BodyAbsent => write!(f, "BodyAbsent"),
            Self::All(all) => f.debug_tuple("All").field(all).finish(),
            Self::Custom(_) => write!(f, "Custom(<fn>)"),
        }
    }
}

/// One registered rule: pattern, predicate, handler
#[derive(Clone)]
pub struct RouteRule {
    pub pattern: UrlPattern,
    pub when: RequestPredicate,
    pub handler: Arc<dyn RouteHandler>,
}

impl fmt::Debug for RouteRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteRule")
            .field("pattern", &self.pattern)
            .field("when", &self.when)
            .finish_non_exhaustive()
    }
}

/// Ordered rule list, evaluated first-match-wins in registration order
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    rules: Vec<RouteRule>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for every request matching `pattern`
    pub fn route<H>(&mut self, pattern: &str, handler: H) -> MockResult<&mut Self>
    where
        H: RouteHandler + 'static,
    {
        self.route_when(pattern, RequestPredicate::Always, handler)
    }

    /// Register a synchronous closure handler
    pub fn route_fn<F>(&mut self, pattern: &str, f: F) -> MockResult<&mut Self>
    where
        F: Fn(&CapturedRequest) -> MockResult<Fulfillment> + Send + Sync + 'static,
    {
        self.route(pattern, FnHandler(f))
    }

    /// Register a handler that only applies when `when` holds
    pub fn route_when<H>(
        &mut self,
        pattern: &str,
        when: RequestPredicate,
        handler: H,
    ) -> MockResult<&mut Self>
    where
        H: RouteHandler + 'static,
    {
        let pattern = UrlPattern::new(pattern)?;
        self.push(RouteRule {
            pattern,
            when,
            handler: Arc::new(handler),
        });
        Ok(self)
    }

    pub fn push(&mut self, rule: RouteRule) {
        self.rules.push(rule);
    }

    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Distinct patterns in registration order
    pub fn patterns(&self) -> Vec<&UrlPattern> {
        let mut seen: Vec<&UrlPattern> = Vec::new();
        for rule in &self.rules {
            if !seen.contains(&&rule.pattern) {
                seen.push(&rule.pattern);
            }
        }
        seen
    }

    /// Find the rule for a request without running its handler.
    ///
    /// Returns the rule index and a handle to its handler so the caller can
    /// release any lock on the table before awaiting.
    pub fn resolve(&self, request: &CapturedRequest) -> MockResult<(usize, Arc<dyn RouteHandler>)> {
        let mut pattern_matched = false;

        for (index, rule) in self.rules.iter().enumerate() {
            if !rule.pattern.matches(&request.url) {
                continue;
            }
            pattern_matched = true;
            if rule.when.evaluate(request) {
                return Ok((index, Arc::clone(&rule.handler)));
            }
        }

        let method = request.method.to_string();
        let url = request.url.clone();
        if pattern_matched {
            Err(MockError::NoRuleMatched { method, url })
        } else {
            Err(MockError::Unhandled { method, url })
        }
    }

    /// Resolve and run the handler for a request
    pub async fn dispatch(&self, request: &CapturedRequest) -> MockResult<Fulfillment> {
        let (_, handler) = self.resolve(request)?;
        handler.handle(request).await
    }
}
