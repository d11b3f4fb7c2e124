//! Typed JWT Pizza backend contract
//!
//! The intercepted endpoints double as the API the storefront expects from
//! its backend. These models let canned responses be checked against that
//! contract before a scenario ever reaches the browser.

use axum::http::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{MockError, MockResult};
use crate::pattern::UrlPattern;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuItem {
    pub id: u64,
    pub title: String,
    pub image: String,
    pub price: f64,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSummary {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreRevenue {
    pub id: u64,
    pub name: String,
    pub total_revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FranchiseSummary {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub stores: Vec<StoreSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FranchiseAdmin {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub name: Option<String>,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateFranchiseRequest {
    pub name: String,
    pub admins: Vec<FranchiseAdmin>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedFranchise {
    pub id: u64,
    pub name: String,
    pub admins: Vec<FranchiseAdmin>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FranchiseDetail {
    pub id: u64,
    pub name: String,
    pub admins: Vec<FranchiseAdmin>,
    pub stores: Vec<StoreRevenue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
    pub role: String,
    #[serde(default, rename = "objectId", skip_serializing_if = "Option::is_none")]
    pub object_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub roles: Vec<Role>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Login and register answer with the same shape; logout nulls both fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: Option<User>,
    pub token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub menu_id: u64,
    pub description: String,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub items: Vec<OrderItem>,
    /// The storefront sends the store id as the selected option value (a string)
    pub store_id: Value,
    pub franchise_id: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: u64,
    pub items: Vec<OrderItem>,
    pub store_id: Value,
    pub franchise_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderResponse {
    pub order: Order,
    pub jwt: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderHistory {
    pub diner_id: u64,
    pub orders: Vec<Order>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u64>,
}

/// Every intercepted endpoint of the backend contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Menu,
    ListFranchises,
    CreateFranchise,
    GetFranchise,
    DeleteFranchise,
    DeleteStore,
    Login,
    Register,
    Logout,
    OrderHistory,
    PlaceOrder,
}

impl Endpoint {
    pub const ALL: [Endpoint; 11] = [
        Endpoint::Menu,
        Endpoint::ListFranchises,
        Endpoint::CreateFranchise,
        Endpoint::GetFranchise,
        Endpoint::DeleteFranchise,
        Endpoint::DeleteStore,
        Endpoint::Login,
        Endpoint::Register,
        Endpoint::Logout,
        Endpoint::OrderHistory,
        Endpoint::PlaceOrder,
    ];

    pub fn method(&self) -> Method {
        match self {
            Endpoint::Menu
            | Endpoint::ListFranchises
            | Endpoint::GetFranchise
            | Endpoint::OrderHistory => Method::GET,
            Endpoint::CreateFranchise | Endpoint::Register | Endpoint::PlaceOrder => Method::POST,
            Endpoint::Login => Method::PUT,
            Endpoint::DeleteFranchise | Endpoint::DeleteStore | Endpoint::Logout => Method::DELETE,
        }
    }

    /// Glob over full URLs that selects this endpoint's path
    pub fn pattern(&self) -> &'static str {
        match self {
            Endpoint::Menu => "**/api/order/menu",
            Endpoint::ListFranchises | Endpoint::CreateFranchise => "**/api/franchise",
            Endpoint::GetFranchise | Endpoint::DeleteFranchise => "**/api/franchise/*",
            Endpoint::DeleteStore => "**/api/franchise/*/store/*",
            Endpoint::Login | Endpoint::Register | Endpoint::Logout => "**/api/auth",
            Endpoint::OrderHistory | Endpoint::PlaceOrder => "**/api/order",
        }
    }

    /// Identify the endpoint a request targets
    pub fn classify(method: &Method, url: &str) -> Option<Endpoint> {
        Self::ALL.into_iter().find(|endpoint| {
            &endpoint.method() == method
                && UrlPattern::new(endpoint.pattern())
                    .map(|p| p.matches(strip_query(url)))
                    .unwrap_or(false)
        })
    }

    /// Check that a request body has this endpoint's shape
    pub fn validate_request(&self, body: &Value) -> MockResult<()> {
        match self {
            Endpoint::CreateFranchise => decode::<CreateFranchiseRequest>(self, body),
            Endpoint::Login => decode::<LoginRequest>(self, body),
            Endpoint::Register => decode::<RegisterRequest>(self, body),
            Endpoint::PlaceOrder => decode::<OrderRequest>(self, body),
            _ => Ok(()),
        }
    }

    /// Check that a canned response has this endpoint's shape
    pub fn validate_response(&self, body: &Value) -> MockResult<()> {
        match self {
            Endpoint::Menu => decode::<Vec<MenuItem>>(self, body),
            Endpoint::ListFranchises => decode::<Vec<FranchiseSummary>>(self, body),
            Endpoint::CreateFranchise => decode::<CreatedFranchise>(self, body),
            Endpoint::GetFranchise => decode::<FranchiseDetail>(self, body),
            Endpoint::DeleteFranchise | Endpoint::DeleteStore => {
                decode::<MessageResponse>(self, body)
            }
            Endpoint::Login | Endpoint::Register | Endpoint::Logout => {
                decode::<AuthResponse>(self, body)
            }
            Endpoint::OrderHistory => decode::<OrderHistory>(self, body),
            Endpoint::PlaceOrder => decode::<OrderResponse>(self, body),
        }
    }
}

fn strip_query(url: &str) -> &str {
    url.split(['?', '#']).next().unwrap_or(url)
}

fn decode<T: DeserializeOwned>(endpoint: &Endpoint, body: &Value) -> MockResult<()> {
    serde_json::from_value::<T>(body.clone())
        .map(|_| ())
        .map_err(|e| MockError::Serialization(format!("{:?} payload: {}", endpoint, e)))
}
