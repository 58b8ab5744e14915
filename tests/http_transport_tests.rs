// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! HTTP transport tests against a local axum server.
//!
//! These tests verify that:
//! 1. Every request carries the API key and the right bearer token
//! 2. Query parameters and JSON bodies reach the server intact
//! 3. Slow and unreachable servers map to network errors

use axum::{
    extract::Query,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use fitness_tracker::db::{DataGateway, HttpTransport, RestRequest, RestTransport};
use fitness_tracker::error::{AppError, AuthError, NetworkError};
use reqwest::Method;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

const ANON_KEY: &str = "anon-key";

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

async fn echo(headers: HeaderMap, Query(params): Query<HashMap<String, String>>) -> Json<Value> {
    Json(json!([{
        "apikey": header(&headers, "apikey"),
        "authorization": header(&headers, "authorization"),
        "accept": header(&headers, "accept"),
        "query": params,
    }]))
}

async fn create(headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    (
        StatusCode::CREATED,
        Json(json!({ "prefer": header(&headers, "prefer"), "body": body })),
    )
}

async fn slow() -> Json<Value> {
    tokio::time::sleep(Duration::from_secs(2)).await;
    Json(json!([]))
}

async fn forbidden() -> (StatusCode, &'static str) {
    (StatusCode::UNAUTHORIZED, "JWT expired")
}

async fn spawn_server() -> SocketAddr {
    let app = Router::new()
        .route("/rest/v1/echo", get(echo))
        .route("/rest/v1/create", post(create))
        .route("/rest/v1/slow", get(slow))
        .route("/rest/v1/private", get(forbidden));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn transport(addr: SocketAddr, timeout: Duration) -> HttpTransport {
    HttpTransport::new(format!("http://{}/", addr), ANON_KEY, timeout).unwrap()
}

#[tokio::test]
async fn test_headers_and_query_reach_server() {
    let addr = spawn_server().await;
    let transport = transport(addr, Duration::from_secs(5));

    let request = RestRequest::new(Method::GET, "rest/v1/echo")
        .query_param("select", "*")
        .query_param("status", "in.(\"active\",\"completed\")");
    let response = transport.send(request).await.unwrap();

    assert_eq!(response.status, 200);
    let body: Value = serde_json::from_slice(&response.body).unwrap();
    assert_eq!(body[0]["apikey"], ANON_KEY);
    assert_eq!(body[0]["authorization"], "Bearer anon-key");
    assert_eq!(body[0]["query"]["select"], "*");
    assert_eq!(body[0]["query"]["status"], "in.(\"active\",\"completed\")");

    let request = RestRequest::new(Method::GET, "rest/v1/echo").bearer(Some("user-token".to_string()));
    let response = transport.send(request).await.unwrap();
    let body: Value = serde_json::from_slice(&response.body).unwrap();
    assert_eq!(body[0]["apikey"], ANON_KEY);
    assert_eq!(body[0]["authorization"], "Bearer user-token");
}

#[tokio::test]
async fn test_gateway_over_http() {
    let addr = spawn_server().await;
    let gateway = DataGateway::new(
        Arc::new(transport(addr, Duration::from_secs(5))),
        Duration::from_secs(5),
    );
    gateway.set_access_token(Some("user-token".to_string())).await;

    let rows: Vec<Value> = gateway
        .from("echo")
        .eq("user_id", "u1")
        .single()
        .execute()
        .await
        .unwrap()
        .decoded()
        .unwrap();
    assert_eq!(rows[0]["authorization"], "Bearer user-token");
    assert_eq!(rows[0]["accept"], "application/vnd.pgrst.object+json");
    assert_eq!(rows[0]["query"]["user_id"], "eq.u1");

    let response = gateway
        .from("create")
        .insert(&json!({ "name": "Bench" }))
        .await
        .unwrap();
    assert_eq!(response.status, 201);
    let created: Value = response.decoded().unwrap();
    assert_eq!(created["prefer"], "return=representation");
    assert_eq!(created["body"]["name"], "Bench");

    let err = gateway.from("private").execute().await.unwrap_err();
    assert!(matches!(err, AppError::Auth(AuthError::Unauthorized)));
}

#[tokio::test]
async fn test_client_timeout_maps_to_timeout() {
    let addr = spawn_server().await;
    let transport = transport(addr, Duration::from_millis(100));

    let err = transport
        .send(RestRequest::new(Method::GET, "rest/v1/slow"))
        .await
        .unwrap_err();
    assert!(matches!(err, NetworkError::Timeout));
}

#[tokio::test]
async fn test_unreachable_server_is_retryable() {
    let addr = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let gateway = DataGateway::new(
        Arc::new(transport(addr, Duration::from_secs(5))),
        Duration::from_secs(5),
    );

    let err = gateway.from("echo").execute().await.unwrap_err();
    assert!(matches!(err, AppError::Network(NetworkError::Transport(_))));
    assert!(err.is_retryable());
}
