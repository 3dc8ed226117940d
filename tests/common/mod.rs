#![allow(dead_code)]

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use scoped_crud_api::auth::CallerIdentity;
use scoped_crud_api::handlers::resource_routes;
use scoped_crud_api::middleware::AuthPolicy;
use scoped_crud_api::resource::ResourceController;
use scoped_crud_api::resources::{Account, Transaction};
use scoped_crud_api::testing::{bearer, MemoryStore, TEST_JWT_SECRET};

/// Both demo resources over in-memory stores. Transactions see `accounts` as their
/// related table.
pub async fn app(accounts: Vec<Account>, transactions: Vec<Transaction>) -> anyhow::Result<Router> {
    let account_store = MemoryStore::<Account>::new();
    account_store.seed(accounts.clone()).await;

    let transaction_store = MemoryStore::<Transaction>::new();
    transaction_store.with_related("accounts", &accounts).await;
    transaction_store.seed(transactions).await;

    let accounts = ResourceController::<Account, _>::register(account_store)?;
    let transactions = ResourceController::<Transaction, _>::register(transaction_store)?;
    let account_policy = AuthPolicy::new(TEST_JWT_SECRET, accounts.descriptor());
    let transaction_policy = AuthPolicy::new(TEST_JWT_SECRET, transactions.descriptor());

    Ok(Router::new()
        .merge(resource_routes(accounts, account_policy))
        .merge(resource_routes(transactions, transaction_policy)))
}

pub fn caller() -> CallerIdentity {
    CallerIdentity::new(uuid::Uuid::new_v4())
}

pub async fn send_raw(app: &Router, request: Request<Body>) -> anyhow::Result<(StatusCode, Value)> {
    let response = app.clone().oneshot(request).await?;
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    let body = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes)? };
    Ok((status, body))
}

pub async fn get(app: &Router, uri: &str, caller: &CallerIdentity) -> anyhow::Result<(StatusCode, Value)> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .header("authorization", bearer(caller))
        .body(Body::empty())?;
    send_raw(app, request).await
}

pub async fn send_json(
    app: &Router,
    method: Method,
    uri: &str,
    caller: &CallerIdentity,
    body: Value,
) -> anyhow::Result<(StatusCode, Value)> {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", bearer(caller))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))?;
    send_raw(app, request).await
}

pub async fn delete(app: &Router, uri: &str, caller: &CallerIdentity) -> anyhow::Result<(StatusCode, Value)> {
    let request = Request::builder()
        .method(Method::DELETE)
        .uri(uri)
        .header("authorization", bearer(caller))
        .body(Body::empty())?;
    send_raw(app, request).await
}

/// `data.items` of a list response
pub fn items(body: &Value) -> Vec<Value> {
    body["data"]["items"].as_array().cloned().unwrap_or_default()
}
