//! Scenario file tests
//!
//! Loads the shipped scenarios, checks them against the backend contract,
//! and replays the storefront's traffic for each against its compiled mocks
//! without a browser.

use std::path::PathBuf;

use jwt_pizza_e2e::{mocks, Scenario};
use jwt_pizza_mock::server::{FAILURE_HEADER, ORIGINAL_URL_HEADER};
use jwt_pizza_mock::{MockError, MockServerConfig, MockSession};
use reqwest::{Client, Method};
use serde_json::{json, Value};
use test_case::test_case;

const APP: &str = "http://localhost:5173";

fn scenarios_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("scenarios")
}

fn scenario(name: &str) -> Scenario {
    Scenario::load_all(&scenarios_dir())
        .unwrap()
        .into_iter()
        .find(|s| s.name == name)
        .unwrap_or_else(|| panic!("no scenario named {}", name))
}

async fn session_for(name: &str) -> MockSession {
    let routes = mocks::compile(&scenario(name)).unwrap();
    MockSession::start_with(MockServerConfig::default(), routes)
        .await
        .unwrap()
}

/// Send a request the way the browser-side forwarder does
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
    (status, failed, res.json::<Value>().await.unwrap())
}

#[test]
fn test_all_scenarios_load_in_file_order() {
    let names: Vec<String> = Scenario::load_all(&scenarios_dir())
        .unwrap()
        .into_iter()
        .map(|s| s.name)
        .collect();
    assert_eq!(
        names,
        [
            "admin-dashboard",
            "diner-dashboard",
            "franchise-dashboard",
            "pages",
            "purchase-with-login",
            "register-and-logout",
        ]
    );
}

#[test_case("purchase-with-login", 4 ; "purchase")]
#[test_case("register-and-logout", 2 ; "register")]
#[test_case("admin-dashboard", 5 ; "admin")]
#[test_case("pages", 1 ; "pages")]
#[test_case("diner-dashboard", 2 ; "diner")]
#[test_case("franchise-dashboard", 2 ; "franchise")]
fn test_scenario_compiles_and_honours_contract(name: &str, rules: usize) {
    let scenario = scenario(name);
    mocks::validate_contract(&scenario).unwrap();
    assert_eq!(mocks::compile(&scenario).unwrap().len(), rules);
    assert!(!scenario.steps.is_empty());
}

#[test]
fn test_smoke_tag_selects_three_scenarios() {
    let all = Scenario::load_all(&scenarios_dir()).unwrap();
    let mut smoke: Vec<&str> = Scenario::filter_by_tag(&all, "smoke")
        .into_iter()
        .map(|s| s.name.as_str())
        .collect();
    smoke.sort();
    assert_eq!(smoke, ["pages", "purchase-with-login", "register-and-logout"]);
}

#[tokio::test]
async fn test_purchase_with_login_traffic() {
    let session = session_for("purchase-with-login").await;
    let client = Client::new();

    let (status, _, menu) = page_request(&client, &session, Method::GET, "/api/order/menu", None).await;
    assert_eq!(status, 200);
    assert_eq!(menu.as_array().unwrap().len(), 2);

    let (_, _, franchises) = page_request(&client, &session, Method::GET, "/api/franchise", None).await;
    assert_eq!(franchises[0]["stores"][0]["name"], "Lehi");

    let (_, _, login) = page_request(
        &client,
        &session,
        Method::PUT,
        "/api/auth",
        Some(json!({ "email": "d@jwt.com", "password": "a" })),
    )
    .await;
    assert_eq!(login["user"]["name"], "Kai Chen");

    // The page sends extra fields the mock does not care about
    let (status, failed, order) = page_request(
        &client,
        &session,
        Method::POST,
        "/api/order",
        Some(json!({
            "items": [
                { "menuId": 1, "description": "Veggie", "price": 0.0038 },
                { "menuId": 2, "description": "Pepperoni", "price": 0.0042 }
            ],
            "storeId": "4",
            "franchiseId": 2,
            "clientVersion": "20240518"
        })),
    )
    .await;
    assert_eq!((status, failed), (200, false));
    assert_eq!(order["order"]["id"], 23);
    assert_eq!(order["jwt"], "eyJpYXQ");

    session.verify().unwrap();
    session.assert_requested_times("**/api/order", 1).unwrap();
    session.shutdown().await;
}

#[tokio::test]
async fn test_purchase_rejects_numeric_store_id() {
    let session = session_for("purchase-with-login").await;
    let client = Client::new();

    let (status, failed, body) = page_request(
        &client,
        &session,
        Method::POST,
        "/api/order",
        Some(json!({
            "items": [
                { "menuId": 1, "description": "Veggie", "price": 0.0038 },
                { "menuId": 2, "description": "Pepperoni", "price": 0.0042 }
            ],
            "storeId": 4,
            "franchiseId": 2
        })),
    )
    .await;
    assert_eq!((status, failed), (500, true));
    assert!(body["error"].as_str().unwrap().contains("$.storeId"));

    match session.verify() {
        Err(MockError::BodyMismatch { mismatches, .. }) => {
            assert_eq!(mismatches.len(), 1);
            assert_eq!(mismatches[0].path, "$.storeId");
        }
        other => panic!("expected a body mismatch, got {:?}", other),
    }
}

#[tokio::test]
async fn test_register_and_logout_traffic() {
    let session = session_for("register-and-logout").await;
    let client = Client::new();

    let (_, failed, registered) = page_request(
        &client,
        &session,
        Method::POST,
        "/api/auth",
        Some(json!({ "name": "Register", "email": "register@jwt.com", "password": "a" })),
    )
    .await;
    assert!(!failed);
    assert_eq!(registered["user"]["id"], 4);
    assert_eq!(registered["token"], "abcdef");

    let (_, failed, logged_out) =
        page_request(&client, &session, Method::DELETE, "/api/auth", None).await;
    assert!(!failed);
    assert_eq!(logged_out, json!({ "user": null, "token": null }));

    session.verify().unwrap();
    let rules: Vec<Option<usize>> = session.records().iter().map(|r| r.rule).collect();
    assert_eq!(rules, [Some(0), Some(1)]);
}

#[tokio::test]
async fn test_register_with_wrong_method_fails() {
    let session = session_for("register-and-logout").await;
    let client = Client::new();

    let (status, failed, _) = page_request(
        &client,
        &session,
        Method::PUT,
        "/api/auth",
        Some(json!({ "name": "Register", "email": "register@jwt.com", "password": "a" })),
    )
    .await;
    assert_eq!((status, failed), (500, true));
    assert!(matches!(
        session.verify(),
        Err(MockError::MethodMismatch { .. })
    ));
}

#[tokio::test]
async fn test_admin_create_franchise_traffic() {
    let session = session_for("admin-dashboard").await;
    let client = Client::new();

    let (_, _, login) = page_request(
        &client,
        &session,
        Method::PUT,
        "/api/auth",
        Some(json!({ "email": "admin@jwt.com", "password": "a" })),
    )
    .await;
    assert_eq!(login["user"]["roles"][0]["role"], "admin");

    let (_, _, list) = page_request(&client, &session, Method::GET, "/api/franchise", None).await;
    assert_eq!(list[0]["name"], "pizzaPocket");

    let (_, failed, created) = page_request(
        &client,
        &session,
        Method::POST,
        "/api/franchise",
        Some(json!({ "stores": [], "name": "Marcos", "admins": [{ "email": "admin@jwt.com" }] })),
    )
    .await;
    assert!(!failed);
    assert_eq!(created["id"], 3);
    assert_eq!(created["admins"][0]["email"], "admin@jwt.com");

    let (_, _, store) =
        page_request(&client, &session, Method::DELETE, "/api/franchise/2/store/4", None).await;
    assert_eq!(store["message"], "store deleted");

    let (_, _, franchise) =
        page_request(&client, &session, Method::DELETE, "/api/franchise/2", None).await;
    assert_eq!(franchise["message"], "franchise deleted");

    session.verify().unwrap();
    let rules: Vec<Option<usize>> = session.records().iter().map(|r| r.rule).collect();
    assert_eq!(rules, [Some(0), Some(2), Some(1), Some(3), Some(4)]);
}

#[tokio::test]
async fn test_admin_create_with_wrong_admin_fails() {
    let session = session_for("admin-dashboard").await;
    let client = Client::new();

    let (status, failed, _) = page_request(
        &client,
        &session,
        Method::POST,
        "/api/franchise",
        Some(json!({ "name": "Marcos", "admins": [{ "email": "f@jwt.com" }] })),
    )
    .await;
    assert_eq!((status, failed), (500, true));

    match session.verify() {
        Err(MockError::BodyMismatch { mismatches, .. }) => {
            assert_eq!(mismatches[0].path, "$.admins[0].email");
        }
        other => panic!("expected a body mismatch, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unmocked_endpoint_fails_the_scenario() {
    let session = session_for("diner-dashboard").await;
    let client = Client::new();

    let (status, failed, _) =
        page_request(&client, &session, Method::GET, "/api/order/menu", None).await;
    assert_eq!((status, failed), (500, true));
    assert!(matches!(session.verify(), Err(MockError::Unhandled { .. })));
}

#[tokio::test]
async fn test_repeated_runs_are_identical() {
    let client = Client::new();
    let mut outcomes = Vec::new();

    for _ in 0..2 {
        let session = session_for("franchise-dashboard").await;
        let (status, _, body) =
            page_request(&client, &session, Method::GET, "/api/franchise/4", None).await;
        outcomes.push((status, body, session.records().len()));
        session.verify().unwrap();
        session.shutdown().await;
    }

    assert_eq!(outcomes[0], outcomes[1]);
}

#[tokio::test]
async fn test_diner_order_history_traffic() {
    let session = session_for("diner-dashboard").await;
    let client = Client::new();

    let (_, _, login) = page_request(
        &client,
        &session,
        Method::PUT,
        "/api/auth",
        Some(json!({ "email": "d@jwt.com", "password": "a" })),
    )
    .await;
    assert_eq!(login["user"]["name"], "Kai Chen");

    let (status, failed, history) =
        page_request(&client, &session, Method::GET, "/api/order", None).await;
    assert_eq!((status, failed), (200, false));
    assert_eq!(history["dinerId"], 1);
    assert_eq!(history["orders"][0]["id"], 12);
    // The history page number rides on the order, not the envelope
    assert_eq!(history["orders"][0]["page"], 1);
    assert!(history.get("page").is_none());

    session.verify().unwrap();
    session.shutdown().await;
}
