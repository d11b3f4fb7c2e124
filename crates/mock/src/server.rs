//! Per-test interception server
//!
//! A [`MockSession`] owns one route table, one request journal, and one
//! failure log, served by an axum server on its own port. Sessions share
//! nothing, so tests using separate sessions stay isolated even when they
//! run concurrently. Dropping the session tears the server down.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, Method, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use parking_lot::{Mutex, RwLock};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::error::{MockError, MockResult};
use crate::fulfillment::Fulfillment;
use crate::pattern::UrlPattern;
use crate::request::CapturedRequest;
use crate::route::{RequestPredicate, RouteHandler, RouteRule, RouteTable};

/// Header carrying the URL the page originally requested, set by a browser-side forwarder
pub const ORIGINAL_URL_HEADER: &str = "x-mock-original-url";

/// Header set on responses produced by an intercept failure
pub const FAILURE_HEADER: &str = "x-mock-failure";

/// Configuration for a mock session
#[derive(Debug, Clone)]
pub struct MockServerConfig {
    /// Address to bind (port 0 = ephemeral)
    pub bind_addr: SocketAddr,

    /// Upper bound on a single handler invocation
    pub handler_timeout: Duration,
}

impl Default for MockServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            handler_timeout: Duration::from_secs(5),
        }
    }
}

/// Journal entry for one intercepted request
#[derive(Debug, Clone)]
pub struct InterceptRecord {
    pub request: CapturedRequest,
    /// Index of the rule that handled the request, if one was resolved
    pub rule: Option<usize>,
    /// Status sent back to the page; `None` while the handler is still running
    pub status: Option<u16>,
}

/// A request that failed interception
#[derive(Debug, Clone)]
pub struct InterceptFailure {
    pub request: CapturedRequest,
    pub error: MockError,
}

struct Interceptor {
    routes: RwLock<RouteTable>,
    journal: Mutex<Vec<InterceptRecord>>,
    failures: Mutex<Vec<InterceptFailure>>,
    handler_timeout: Duration,
}

impl Interceptor {
    fn new(routes: RouteTable, handler_timeout: Duration) -> Self {
        Self {
            routes: RwLock::new(routes),
            journal: Mutex::new(Vec::new()),
            failures: Mutex::new(Vec::new()),
            handler_timeout,
        }
    }

    /// Append to the journal, assigning the arrival sequence number
    fn arrive(&self, mut request: CapturedRequest) -> CapturedRequest {
        let mut journal = self.journal.lock();
        request.seq = journal.len() as u64 + 1;
        journal.push(InterceptRecord {
            request: request.clone(),
            rule: None,
            status: None,
        });
        request
    }

    fn complete(&self, seq: u64, rule: Option<usize>, status: u16) {
        let mut journal = self.journal.lock();
        if let Some(record) = journal.get_mut((seq - 1) as usize) {
            record.rule = rule;
            record.status = Some(status);
        }
    }

    async fn intercept(&self, request: CapturedRequest) -> Response {
        let request = self.arrive(request);
        info!(
            seq = request.seq,
            "Intercepted {} {}", request.method, request.url
        );

        let resolved = self.routes.read().resolve(&request);
        let outcome = match resolved {
            Ok((index, handler)) => {
                match tokio::time::timeout(self.handler_timeout, handler.handle(&request)).await {
                    Ok(Ok(fulfillment)) => Ok((index, fulfillment)),
                    Ok(Err(e)) => Err((Some(index), e)),
                    Err(_) => Err((
                        Some(index),
                        MockError::HandlerTimeout {
                            method: request.method.to_string(),
                            url: request.url.clone(),
                            timeout_ms: self.handler_timeout.as_millis() as u64,
                        },
                    )),
                }
            }
            Err(e) => Err((None, e)),
        };

        match outcome {
            Ok((index, fulfillment)) => {
                debug!(
                    seq = request.seq,
                    rule = index,
                    "Fulfilled with status {}", fulfillment.status
                );
                self.complete(request.seq, Some(index), fulfillment.status);
                fulfillment.into_response()
            }
            Err((index, e)) => {
                error!(seq = request.seq, "Intercept failure: {}", e);
                self.complete(request.seq, index, 500);
                let message = e.to_string();
                self.failures.lock().push(InterceptFailure { request, error: e });
                Fulfillment::error(500, &message)
                    .with_header(FAILURE_HEADER, "1")
                    .into_response()
            }
        }
    }
}

/// Rebuild the URL the page requested
fn resolve_url(uri: &Uri, headers: &HeaderMap) -> String {
    if let Some(original) = headers
        .get(ORIGINAL_URL_HEADER)
        .and_then(|v| v.to_str().ok())
    {
        return original.to_string();
    }

    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    let path = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
    format!("http://{}{}", host, path)
}

async fn intercept_handler(
    State(interceptor): State<Arc<Interceptor>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let url = resolve_url(&uri, &headers);
    let request = CapturedRequest::new(method, url, headers, body);
    interceptor.intercept(request).await
}

fn router(interceptor: Arc<Interceptor>) -> Router {
    Router::new()
        .fallback(intercept_handler)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(interceptor)
}

/// A running mock backend owned by a single test
pub struct MockSession {
    interceptor: Arc<Interceptor>,
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl MockSession {
    /// Start an empty session on an ephemeral port
    pub async fn start() -> MockResult<Self> {
        Self::start_with(MockServerConfig::default(), RouteTable::new()).await
    }

    /// Start a session with pre-registered routes
    pub async fn start_with(config: MockServerConfig, routes: RouteTable) -> MockResult<Self> {
        let listener = TcpListener::bind(config.bind_addr).await?;
        let addr = listener.local_addr()?;

        let interceptor = Arc::new(Interceptor::new(routes, config.handler_timeout));
        let app = router(Arc::clone(&interceptor));
        let (tx, rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async {
                let _ = rx.await;
            });
            if let Err(e) = server.await {
                error!("Mock server error: {}", e);
            }
        });

        info!("Mock backend listening on http://{}", addr);

        Ok(Self {
            interceptor,
            addr,
            shutdown: Some(tx),
            task: Some(task),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Base URL of the mock server, e.g. `http://127.0.0.1:41234`
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Register a handler for every request matching `pattern`
    pub fn route<H>(&self, pattern: &str, handler: H) -> MockResult<()>
    where
        H: RouteHandler + 'static,
    {
        self.interceptor.routes.write().route(pattern, handler)?;
        Ok(())
    }

    /// Register a synchronous closure handler
    pub fn route_fn<F>(&self, pattern: &str, f: F) -> MockResult<()>
    where
        F: Fn(&CapturedRequest) -> MockResult<Fulfillment> + Send + Sync + 'static,
    {
        self.interceptor.routes.write().route_fn(pattern, f)?;
        Ok(())
    }

    /// Register a handler guarded by a predicate
    pub fn route_when<H>(&self, pattern: &str, when: RequestPredicate, handler: H) -> MockResult<()>
    where
        H: RouteHandler + 'static,
    {
        self.interceptor
            .routes
            .write()
            .route_when(pattern, when, handler)?;
        Ok(())
    }

    pub fn push_rule(&self, rule: RouteRule) {
        self.interceptor.routes.write().push(rule);
    }

    /// Distinct registered patterns, in registration order
    pub fn patterns(&self) -> Vec<UrlPattern> {
        self.interceptor
            .routes
            .read()
            .patterns()
            .into_iter()
            .cloned()
            .collect()
    }

    /// Every intercepted request, in arrival order
    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.interceptor
            .journal
            .lock()
            .iter()
            .map(|r| r.request.clone())
            .collect()
    }

    /// Full journal including resolved rule and status
    pub fn records(&self) -> Vec<InterceptRecord> {
        self.interceptor.journal.lock().clone()
    }

    pub fn failures(&self) -> Vec<InterceptFailure> {
        self.interceptor.failures.lock().clone()
    }

    /// Fail with the first recorded intercept failure, if any
    pub fn verify(&self) -> MockResult<()> {
        match self.interceptor.failures.lock().first() {
            Some(failure) => Err(failure.error.clone()),
            None => Ok(()),
        }
    }

    /// Journal entries whose URL matches `pattern`
    pub fn requests_matching(&self, pattern: &str) -> MockResult<Vec<CapturedRequest>> {
        let pattern = UrlPattern::new(pattern)?;
        Ok(self
            .requests()
            .into_iter()
            .filter(|r| pattern.matches(&r.url))
            .collect())
    }

    pub fn assert_requested(&self, pattern: &str) -> MockResult<()> {
        if self.requests_matching(pattern)?.is_empty() {
            return Err(MockError::JournalAssertion(format!(
                "expected a request matching {}, but none arrived",
                pattern
            )));
        }
        Ok(())
    }

    pub fn assert_requested_times(&self, pattern: &str, times: usize) -> MockResult<()> {
        let found = self.requests_matching(pattern)?.len();
        if found != times {
            return Err(MockError::JournalAssertion(format!(
                "expected {} request(s) matching {}, but {} arrived",
                times, pattern, found
            )));
        }
        Ok(())
    }

    pub fn assert_not_requested(&self, pattern: &str) -> MockResult<()> {
        let found = self.requests_matching(pattern)?.len();
        if found != 0 {
            return Err(MockError::JournalAssertion(format!(
                "expected no requests matching {}, but {} arrived",
                pattern, found
            )));
        }
        Ok(())
    }

    /// Stop the server and wait for it to finish
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            let abort = task.abort_handle();
            if tokio::time::timeout(Duration::from_secs(5), task).await.is_err() {
                warn!("Mock server on {} did not stop in time, aborting", self.addr);
                abort.abort();
            }
        }
        debug!("Mock backend on {} stopped", self.addr);
    }
}

impl Drop for MockSession {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
