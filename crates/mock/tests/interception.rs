//! Interception tests
//!
//! Each test starts its own mock session and plays the page's part with a
//! plain HTTP client, sending the same requests the storefront sends.

use std::time::Duration;

use async_trait::async_trait;
use jwt_pizza_mock::server::{FAILURE_HEADER, ORIGINAL_URL_HEADER};
use jwt_pizza_mock::{
    CapturedRequest, Expectation, Fulfillment, MockError, MockResult, MockServerConfig,
    MockSession, RequestPredicate, RouteHandler, RouteTable,
};
// reqwest re-exports the same `http::Method` the mock crate uses.
use reqwest::{Client, Method};
use serde_json::{json, Value};

const APP: &str = "http://localhost:5173";

/// Send a request as if the page at `APP` issued it, forwarded to the mock
async fn page_request(
    client: &Client,
    session: &MockSession,
    method: Method,
    path: &str,
    body: Option<Value>,
) -> (u16, bool, Value) {
    let mut req = client
        .request(method, format!("{}{}", session.base_url(), path))
        .header(ORIGINAL_URL_HEADER, format!("{}{}", APP, path));
    if let Some(body) = body {
        req = req.json(&body);
    }
    let res = req.send().await.unwrap();
    let status = res.status().as_u16();
    let failed = res.headers().contains_key(FAILURE_HEADER);
    let body = res.json::<Value>().await.unwrap();
    (status, failed, body)
}

fn menu() -> Value {
    json!([
        { "id": 1, "title": "Veggie", "image": "pizza1.png", "price": 0.0038, "description": "A garden of delight" },
        { "id": 2, "title": "Pepperoni", "image": "pizza2.png", "price": 0.0042, "description": "Spicy treat" }
    ])
}

fn order_items() -> Value {
    json!([
        { "menuId": 1, "description": "Veggie", "price": 0.0038 },
        { "menuId": 2, "description": "Pepperoni", "price": 0.0042 }
    ])
}

async fn purchase_session() -> MockSession {
    let session = MockSession::start().await.unwrap();
    session
        .route(
            "*/**/api/order/menu",
            Expectation::get().respond(Fulfillment::json(menu())),
        )
        .unwrap();
    session
        .route(
            "*/**/api/franchise",
            Expectation::get().respond(Fulfillment::json(json!([
                { "id": 2, "name": "LotaPizza", "stores": [
                    { "id": 4, "name": "Lehi" },
                    { "id": 5, "name": "Springville" },
                    { "id": 6, "name": "American Fork" }
                ] },
                { "id": 3, "name": "PizzaCorp", "stores": [{ "id": 7, "name": "Spanish Fork" }] },
                { "id": 4, "name": "topSpot", "stores": [] }
            ]))),
        )
        .unwrap();
    session
        .route(
            "*/**/api/auth",
            Expectation::put()
                .with_body(json!({ "email": "d@jwt.com", "password": "a" }))
                .respond(Fulfillment::json(json!({
                    "user": { "id": 3, "name": "Kai Chen", "email": "d@jwt.com", "roles": [{ "role": "diner" }] },
                    "token": "abcdef"
                }))),
        )
        .unwrap();
    session
        .route(
            "*/**/api/order",
            Expectation::post()
                .with_body(json!({ "items": order_items(), "storeId": "4", "franchiseId": 2 }))
                .respond(Fulfillment::json(json!({
                    "order": { "items": order_items(), "storeId": "4", "franchiseId": 2, "id": 23 },
                    "jwt": "eyJpYXQ"
                }))),
        )
        .unwrap();
    session
}

#[tokio::test]
async fn purchase_with_login_traffic_is_fulfilled() {
    let session = purchase_session().await;
    let client = Client::new();

    let (status, _, body) = page_request(&client, &session, Method::GET, "/api/order/menu", None).await;
    assert_eq!(status, 200);
    assert_eq!(body, menu());

    let (_, _, body) = page_request(&client, &session, Method::GET, "/api/franchise", None).await;
    assert_eq!(body[0]["stores"][0]["name"], "Lehi");

    let (_, _, body) = page_request(
        &client,
        &session,
        Method::PUT,
        "/api/auth",
        Some(json!({ "email": "d@jwt.com", "password": "a" })),
    )
    .await;
    assert_eq!(body["user"]["name"], "Kai Chen");

    let (status, failed, body) = page_request(
        &client,
        &session,
        Method::POST,
        "/api/order",
        Some(json!({ "items": order_items(), "storeId": "4", "franchiseId": 2 })),
    )
    .await;
    assert_eq!(status, 200);
    assert!(!failed);
    assert_eq!(body["order"]["id"], 23);
    assert_eq!(body["jwt"], "eyJpYXQ");

    session.verify().unwrap();
    session.assert_requested_times("**/api/order", 1).unwrap();

    let methods: Vec<_> = session.requests().iter().map(|r| r.method.to_string()).collect();
    assert_eq!(methods, vec!["GET", "GET", "PUT", "POST"]);
    let seqs: Vec<_> = session.requests().iter().map(|r| r.seq).collect();
    assert_eq!(seqs, vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn wrong_method_fails_the_test() {
    let session = purchase_session().await;
    let client = Client::new();

    let (status, failed, body) =
        page_request(&client, &session, Method::POST, "/api/order/menu", Some(json!({}))).await;
    assert_eq!(status, 500);
    assert!(failed);
    assert!(body["error"].as_str().unwrap().contains("expected GET, got POST"));

    assert!(matches!(
        session.verify(),
        Err(MockError::MethodMismatch { .. })
    ));
}

#[tokio::test]
async fn body_missing_expected_field_is_never_fulfilled() {
    let session = purchase_session().await;
    let client = Client::new();

    let (status, failed, _) = page_request(
        &client,
        &session,
        Method::POST,
        "/api/order",
        Some(json!({ "items": order_items(), "franchiseId": 2 })),
    )
    .await;
    assert_eq!(status, 500);
    assert!(failed);

    match session.verify() {
        Err(MockError::BodyMismatch { mismatches, .. }) => {
            assert_eq!(mismatches.len(), 1);
            assert_eq!(mismatches[0].path, "$.storeId");
        }
        other => panic!("expected body mismatch, got {:?}", other),
    }
}

#[tokio::test]
async fn unregistered_endpoint_never_passes_through() {
    let session = purchase_session().await;
    let client = Client::new();

    let (status, failed, _) =
        page_request(&client, &session, Method::GET, "/api/franchise/4", None).await;
    assert_eq!(status, 500);
    assert!(failed);
    assert!(matches!(session.verify(), Err(MockError::Unhandled { .. })));

    let records = session.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].rule, None);
    assert_eq!(records[0].status, Some(500));
}

#[tokio::test]
async fn register_then_logout_branches_on_body() {
    let session = MockSession::start().await.unwrap();
    session
        .route_fn("*/**/api/auth", |req: &CapturedRequest| {
            let registering = req
                .json_field("email")
                .map(|email| email == "register@jwt.com")
                .unwrap_or(false);
            if registering {
                req.expect_method(&Method::POST)?;
                req.expect_body(&json!({ "email": "register@jwt.com", "password": "a", "name": "Register" }))?;
                Ok(Fulfillment::json(json!({
                    "user": { "id": 4, "name": "Register", "email": "register@jwt.com", "roles": [{ "role": "diner" }] },
                    "token": "abcdef"
                })))
            } else {
                req.expect_method(&Method::DELETE)?;
                Ok(Fulfillment::json(json!({ "user": null, "token": null })))
            }
        })
        .unwrap();
    let client = Client::new();

    let (_, _, body) = page_request(
        &client,
        &session,
        Method::POST,
        "/api/auth",
        Some(json!({ "name": "Register", "email": "register@jwt.com", "password": "a" })),
    )
    .await;
    assert_eq!(body["token"], "abcdef");

    let (_, _, body) = page_request(&client, &session, Method::DELETE, "/api/auth", None).await;
    assert_eq!(body, json!({ "user": null, "token": null }));

    session.verify().unwrap();
    session.assert_requested_times("*/**/api/auth", 2).unwrap();
}

#[tokio::test]
async fn admin_creates_franchise_with_predicate_rules() {
    let mut table = RouteTable::new();
    table
        .route_when(
            "*/**/api/franchise",
            RequestPredicate::BodyMatches(json!({ "name": "Marcos" })),
            Expectation::post()
                .with_body(json!({ "name": "Marcos", "admins": [{ "email": "admin@jwt.com" }] }))
                .respond(Fulfillment::json(json!({
                    "id": 3, "name": "Marcos",
                    "admins": [{ "id": 4, "name": "Admin", "email": "admin@jwt.com" }]
                }))),
        )
        .unwrap()
        .route(
            "*/**/api/franchise",
            Expectation::get().respond(Fulfillment::json(json!([
                { "id": 2, "name": "pizzaPocket",
                  "admins": [{ "id": 4, "name": "Marcos", "email": "f@jwt.com" }],
                  "stores": [{ "id": 4, "name": "SLC", "totalRevenue": 0 }] }
            ]))),
        )
        .unwrap()
        .route(
            "*/**/api/franchise/2/store/4",
            Expectation::delete().respond(Fulfillment::json(json!({ "message": "store deleted" }))),
        )
        .unwrap()
        .route(
            "*/**/api/franchise/2",
            Expectation::delete().respond(Fulfillment::json(json!({ "message": "franchise deleted" }))),
        )
        .unwrap();

    let session = MockSession::start_with(MockServerConfig::default(), table)
        .await
        .unwrap();
    let client = Client::new();

    let (_, _, list) = page_request(&client, &session, Method::GET, "/api/franchise", None).await;
    assert_eq!(list[0]["name"], "pizzaPocket");

    let (_, _, created) = page_request(
        &client,
        &session,
        Method::POST,
        "/api/franchise",
        Some(json!({ "stores": [], "name": "Marcos", "admins": [{ "email": "admin@jwt.com" }] })),
    )
    .await;
    assert_eq!(created["id"], 3);

    let (_, _, store) =
        page_request(&client, &session, Method::DELETE, "/api/franchise/2/store/4", None).await;
    assert_eq!(store["message"], "store deleted");

    let (_, _, franchise) =
        page_request(&client, &session, Method::DELETE, "/api/franchise/2", None).await;
    assert_eq!(franchise["message"], "franchise deleted");

    session.verify().unwrap();
    let rules: Vec<_> = session.records().iter().map(|r| r.rule).collect();
    assert_eq!(rules, vec![Some(1), Some(0), Some(2), Some(3)]);
}

#[tokio::test]
async fn direct_requests_use_host_header_url() {
    let session = MockSession::start().await.unwrap();
    session
        .route(
            "**/api/order/menu",
            Expectation::get().respond(Fulfillment::json(menu())),
        )
        .unwrap();

    let body: Value = reqwest::get(format!("{}/api/order/menu", session.base_url()))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body, menu());
    assert_eq!(
        session.requests()[0].url,
        format!("{}/api/order/menu", session.base_url())
    );
    session.verify().unwrap();
}

struct SlowHandler;

#[async_trait]
impl RouteHandler for SlowHandler {
    async fn handle(&self, _request: &CapturedRequest) -> MockResult<Fulfillment> {
        tokio::time::sleep(Duration::from_secs(2)).await;
        Ok(Fulfillment::json(json!({})))
    }
}

#[tokio::test]
async fn slow_handler_times_out() {
    let config = MockServerConfig {
        handler_timeout: Duration::from_millis(50),
        ..Default::default()
    };
    let session = MockSession::start_with(config, RouteTable::new()).await.unwrap();
    session.route("**/api/order", SlowHandler).unwrap();

    let client = Client::new();
    let (status, failed, _) = page_request(&client, &session, Method::GET, "/api/order", None).await;
    assert_eq!(status, 500);
    assert!(failed);
    assert!(matches!(
        session.verify(),
        Err(MockError::HandlerTimeout { timeout_ms: 50, .. })
    ));
}

#[tokio::test]
async fn sessions_are_isolated() {
    let first = purchase_session().await;
    let second = MockSession::start().await.unwrap();
    assert_ne!(first.addr(), second.addr());

    let client = Client::new();
    let (status, _, _) = page_request(&client, &second, Method::GET, "/api/order/menu", None).await;
    assert_eq!(status, 500);

    first.verify().unwrap();
    assert!(first.requests().is_empty());
    assert!(second.verify().is_err());
    assert_eq!(first.patterns().len(), 4);
    assert!(second.patterns().is_empty());
}

#[tokio::test]
async fn repeated_runs_give_identical_outcomes() {
    let mut outcomes = Vec::new();
    for _ in 0..2 {
        let session = purchase_session().await;
        let client = Client::new();
        let (_, _, body) = page_request(
            &client,
            &session,
            Method::PUT,
            "/api/auth",
            Some(json!({ "email": "d@jwt.com", "password": "a" })),
        )
        .await;
        session.verify().unwrap();
        outcomes.push((body, session.requests().len()));
        session.shutdown().await;
    }
    assert_eq!(outcomes[0], outcomes[1]);
}

#[tokio::test]
async fn shutdown_stops_serving() {
    let session = MockSession::start().await.unwrap();
    let url = format!("{}/api/order", session.base_url());
    session.shutdown().await;

    let client = Client::builder()
        .timeout(Duration::from_millis(500))
        .build()
        .unwrap();
    assert!(client.get(url).send().await.is_err());
}

#[tokio::test]
async fn journal_assertions() {
    let session = purchase_session().await;
    let client = Client::new();
    page_request(&client, &session, Method::GET, "/api/order/menu", None).await;

    session.assert_requested("**/api/order/menu").unwrap();
    session.assert_not_requested("**/api/auth").unwrap();
    assert!(matches!(
        session.assert_requested_times("**/api/order/menu", 2),
        Err(MockError::JournalAssertion(_))
    ));
    assert!(session.assert_requested("**/api/{oops").is_err());
}
