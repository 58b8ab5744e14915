// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory backend used by the integration tests.
//!
//! Emulates the PostgREST table endpoints (`eq`/`in` filters, ordering,
//! offset/limit, single-object reads, inserts, patches, deletes) and the auth
//! endpoints, with failure and latency injection.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use fitness_tracker::db::{DataGateway, RestRequest, RestResponse, RestTransport};
use fitness_tracker::error::NetworkError;
use fitness_tracker::models::Exercise;
use reqwest::Method;
use serde_json::{json, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const JWT_SECRET: &[u8] = b"memory-backend-secret";

struct FailureRule {
    method: Method,
    path: String,
    /// Matching calls to let through before failing
    skip: usize,
    /// Failures left; `usize::MAX` means always
    remaining: usize,
    status: u16,
}

struct Account {
    id: String,
    password: String,
    metadata: Value,
}

#[derive(Default)]
pub struct MemoryBackend {
    tables: Mutex<HashMap<String, Vec<Value>>>,
    accounts: Mutex<HashMap<String, Account>>,
    requests: Mutex<Vec<RestRequest>>,
    failures: Mutex<Vec<FailureRule>>,
    delay: Mutex<Option<Duration>>,
}

impl MemoryBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Gateway talking to this backend.
    pub fn gateway(self: &Arc<Self>) -> DataGateway {
        DataGateway::new(self.clone(), Duration::from_secs(5))
    }

    pub fn seed(&self, resource: &str, rows: Vec<Value>) {
        self.tables
            .lock()
            .unwrap()
            .entry(resource.to_string())
            .or_default()
            .extend(rows);
    }

    pub fn rows(&self, resource: &str) -> Vec<Value> {
        self.tables
            .lock()
            .unwrap()
            .get(resource)
            .cloned()
            .unwrap_or_default()
    }

    /// Fail the call after `skip` matching calls have succeeded, once.
    pub fn fail_after(&self, method: Method, path: &str, skip: usize, status: u16) {
        self.failures.lock().unwrap().push(FailureRule {
            method,
            path: path.to_string(),
            skip,
            remaining: 1,
            status,
        });
    }

    pub fn fail_always(&self, method: Method, path: &str, status: u16) {
        self.failures.lock().unwrap().push(FailureRule {
            method,
            path: path.to_string(),
            skip: 0,
            remaining: usize::MAX,
            status,
        });
    }

    pub fn clear_failures(&self) {
        self.failures.lock().unwrap().clear();
    }

    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn requests(&self) -> Vec<RestRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of requests with `method` whose path ends with `path`.
    pub fn calls(&self, method: Method, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == method && r.path.ends_with(path))
            .count()
    }

    pub fn register_account(&self, id: &str, email: &str, password: &str) {
        self.accounts.lock().unwrap().insert(
            email.to_string(),
            Account {
                id: id.to_string(),
                password: password.to_string(),
                metadata: json!({}),
            },
        );
    }

    fn injected_failure(&self, request: &RestRequest) -> Option<u16> {
        let mut failures = self.failures.lock().unwrap();
        for rule in failures.iter_mut() {
            if rule.method != request.method || !request.path.ends_with(&rule.path) {
                continue;
            }
            if rule.skip > 0 {
                rule.skip -= 1;
                continue;
            }
            if rule.remaining > 0 {
                if rule.remaining != usize::MAX {
                    rule.remaining -= 1;
                }
                return Some(rule.status);
            }
        }
        None
    }

    fn handle(&self, request: &RestRequest) -> RestResponse {
        if let Some(resource) = request.path.strip_prefix("rest/v1/") {
            return self.handle_rest(resource, request);
        }
        match request.path.as_str() {
            "auth/v1/token" => self.handle_token(request),
            "auth/v1/signup" => self.handle_signup(request),
            "auth/v1/logout" => respond(204, Value::Null),
            _ => respond(404, json!({ "message": "no route" })),
        }
    }

    // ─── REST ────────────────────────────────────────────────────

    fn handle_rest(&self, resource: &str, request: &RestRequest) -> RestResponse {
        let mut tables = self.tables.lock().unwrap();
        let table = tables.entry(resource.to_string()).or_default();
        let filters = parse_filters(request);

        if request.method == Method::GET {
            let mut rows: Vec<Value> = table
                .iter()
                .filter(|row| matches_all(row, &filters))
                .cloned()
                .collect();

            if let Some(order) = request.query_value("order") {
                let keys: Vec<(String, bool)> = order
                    .split(',')
                    .filter_map(|part| part.rsplit_once('.'))
                    .map(|(col, dir)| (col.to_string(), dir == "asc"))
                    .collect();
                rows.sort_by(|a, b| {
                    for (col, ascending) in &keys {
                        let ord = cmp_values(&a[col.as_str()], &b[col.as_str()]);
                        let ord = if *ascending { ord } else { ord.reverse() };
                        if ord != Ordering::Equal {
                            return ord;
                        }
                    }
                    Ordering::Equal
                });
            }

            let offset: usize = request
                .query_value("offset")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0);
            let limit: usize = request
                .query_value("limit")
                .and_then(|v| v.parse().ok())
                .unwrap_or(usize::MAX);
            let rows: Vec<Value> = rows.into_iter().skip(offset).take(limit).collect();

            if request.header_value("Accept") == Some("application/vnd.pgrst.object+json") {
                if rows.len() != 1 {
                    return respond(406, json!({ "message": "JSON object requested, multiple (or no) rows returned" }));
                }
                return respond(200, rows[0].clone());
            }
            return respond(200, Value::Array(rows));
        }

        if request.method == Method::POST {
            let incoming = match request.body.clone() {
                Some(Value::Array(rows)) => rows,
                Some(row @ Value::Object(_)) => vec![row],
                _ => return respond(400, json!({ "message": "bad body" })),
            };
            for row in &incoming {
                if table.iter().any(|existing| existing["id"] == row["id"]) {
                    return respond(409, json!({ "message": "duplicate key value violates unique constraint" }));
                }
            }
            table.extend(incoming.iter().cloned());
            return respond(201, Value::Array(incoming));
        }

        if request.method == Method::PATCH {
            let Some(Value::Object(patch)) = request.body.clone() else {
                return respond(400, json!({ "message": "bad body" }));
            };
            let mut updated = Vec::new();
            for row in table.iter_mut().filter(|row| matches_all(row, &filters)) {
                if let Value::Object(fields) = row {
                    for (k, v) in &patch {
                        fields.insert(k.clone(), v.clone());
                    }
                }
                updated.push(row.clone());
            }
            return respond(200, Value::Array(updated));
        }

        if request.method == Method::DELETE {
            let (removed, kept): (Vec<Value>, Vec<Value>) = table
                .drain(..)
                .partition(|row| matches_all(row, &filters));
            *table = kept;
            return respond(200, Value::Array(removed));
        }

        respond(405, Value::Null)
    }

    // ─── Auth ────────────────────────────────────────────────────

    fn handle_token(&self, request: &RestRequest) -> RestResponse {
        let body = request.body.clone().unwrap_or(Value::Null);
        let accounts = self.accounts.lock().unwrap();

        match request.query_value("grant_type") {
            Some("password") => {
                let email = body["email"].as_str().unwrap_or_default();
                let password = body["password"].as_str().unwrap_or_default();
                match accounts.get(email) {
                    Some(account) if account.password == password => {
                        respond(200, auth_payload(email, account))
                    }
                    _ => respond(400, json!({ "error": "invalid_grant" })),
                }
            }
            Some("refresh_token") => {
                let token = body["refresh_token"].as_str().unwrap_or_default();
                let found = accounts
                    .iter()
                    .find(|(_, a)| format!("refresh-{}", a.id) == token);
                match found {
                    Some((email, account)) => respond(200, auth_payload(email, account)),
                    None => respond(400, json!({ "error": "invalid_grant" })),
                }
            }
            _ => respond(400, json!({ "error": "unsupported_grant_type" })),
        }
    }

    fn handle_signup(&self, request: &RestRequest) -> RestResponse {
        let body = request.body.clone().unwrap_or(Value::Null);
        let email = body["email"].as_str().unwrap_or_default().to_string();
        let mut accounts = self.accounts.lock().unwrap();
        if accounts.contains_key(&email) {
            return respond(422, json!({ "msg": "User already registered" }));
        }
        let account = Account {
            id: uuid::Uuid::new_v4().to_string(),
            password: body["password"].as_str().unwrap_or_default().to_string(),
            metadata: body["data"].clone(),
        };
        let payload = auth_payload(&email, &account);
        accounts.insert(email, account);
        respond(200, payload)
    }
}

#[async_trait]
impl RestTransport for MemoryBackend {
    async fn send(&self, request: RestRequest) -> Result<RestResponse, NetworkError> {
        self.requests.lock().unwrap().push(request.clone());

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(status) = self.injected_failure(&request) {
            return Ok(respond(status, json!({ "message": "injected failure" })));
        }
        Ok(self.handle(&request))
    }
}

fn respond(status: u16, body: Value) -> RestResponse {
    let body = if body.is_null() {
        Vec::new()
    } else {
        serde_json::to_vec(&body).unwrap()
    };
    RestResponse { status, body }
}

fn auth_payload(email: &str, account: &Account) -> Value {
    json!({
        "user": {
            "id": account.id,
            "email": email,
            "user_metadata": account.metadata,
        },
        "session": {
            "access_token": test_jwt(&account.id, 3600),
            "refresh_token": format!("refresh-{}", account.id),
        }
    })
}

/// Signed access token expiring `ttl_secs` from now (negative for expired).
pub fn test_jwt(user_id: &str, ttl_secs: i64) -> String {
    let claims = json!({
        "sub": user_id,
        "exp": Utc::now().timestamp() + ttl_secs,
        "aud": "authenticated",
    });
    jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(JWT_SECRET),
    )
    .unwrap()
}

enum Filter {
    Eq(String, String),
    In(String, Vec<String>),
}

fn parse_filters(request: &RestRequest) -> Vec<Filter> {
    request
        .query
        .iter()
        .filter(|(k, _)| !matches!(k.as_str(), "select" | "order" | "offset" | "limit"))
        .filter_map(|(column, expr)| {
            if let Some(value) = expr.strip_prefix("eq.") {
                Some(Filter::Eq(column.clone(), value.to_string()))
            } else if let Some(list) = expr.strip_prefix("in.(").and_then(|l| l.strip_suffix(')')) {
                let values = list
                    .split(',')
                    .map(|v| v.trim_matches('"').to_string())
                    .collect();
                Some(Filter::In(column.clone(), values))
            } else {
                None
            }
        })
        .collect()
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn matches_all(row: &Value, filters: &[Filter]) -> bool {
    filters.iter().all(|filter| match filter {
        Filter::Eq(column, value) => as_text(&row[column.as_str()]) == *value,
        Filter::In(column, values) => values.contains(&as_text(&row[column.as_str()])),
    })
}

fn cmp_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        _ => as_text(a).cmp(&as_text(b)),
    }
}

/// Catalog row in wire format.
pub fn exercise_row(id: &str, name: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "primary_muscles": "chest,triceps",
        "instructions": "Step one\nStep two",
        "muscle_group": "chest",
    })
}

pub fn exercise(id: &str, name: &str) -> Exercise {
    serde_json::from_value(exercise_row(id, name)).unwrap()
}
