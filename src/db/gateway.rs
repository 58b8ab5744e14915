// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! REST query builder over the backend's table endpoints.
//!
//! Provides:
//! - Structured reads (`select`/`eq`/`in_list`/`order`/`range`/`single`)
//! - Inserts, filtered updates and filtered deletes
//! - Status-code mapping into the crate's error taxonomy
//! - Bounded pagination for large reads
//!
//! Filters are encoded PostgREST style: `column=eq.value`,
//! `order=column.asc`, `select=columns`, `offset=n&limit=m`.

use crate::db::transport::{RestRequest, RestResponse, RestTransport};
use crate::error::{AppError, AuthError, DecodingError, NetworkError, Result};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Rows requested per page for large reads.
pub const PAGE_SIZE: usize = 1000;
/// Upper bound on pages fetched by one paginated read.
pub const MAX_PAGES: usize = 10;

const REST_PREFIX: &str = "rest/v1";
const SINGLE_OBJECT_ACCEPT: &str = "application/vnd.pgrst.object+json";

/// Page size and page cap for paginated reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page_size: usize,
    pub max_pages: usize,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page_size: PAGE_SIZE,
            max_pages: MAX_PAGES,
        }
    }
}

/// How rows that fail to decode are treated in a batch read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowPolicy {
    /// Any bad row fails the whole read.
    Strict,
    /// Bad rows are logged and skipped.
    SkipInvalid,
}

/// Backend data gateway.
///
/// Cheap to clone; clones share the transport and the access token.
#[derive(Clone)]
pub struct DataGateway {
    transport: Option<Arc<dyn RestTransport>>,
    /// Current user token. Requests hold the read guard for their whole
    /// round trip; rotation takes the write guard.
    token: Arc<RwLock<Option<String>>>,
    timeout: Duration,
    pagination: Pagination,
}

impl DataGateway {
    pub fn new(transport: Arc<dyn RestTransport>, timeout: Duration) -> Self {
        Self {
            transport: Some(transport),
            token: Arc::new(RwLock::new(None)),
            timeout,
            pagination: Pagination::default(),
        }
    }

    /// Gateway with no backend client. Every call fails with
    /// [`NetworkError::NotInitialized`].
    pub fn offline() -> Self {
        Self {
            transport: None,
            token: Arc::new(RwLock::new(None)),
            timeout: Duration::from_secs(15),
            pagination: Pagination::default(),
        }
    }

    pub fn with_pagination(mut self, pagination: Pagination) -> Self {
        self.pagination = pagination;
        self
    }

    pub fn pagination(&self) -> Pagination {
        self.pagination
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Helper to get the transport or return an error if offline.
    pub(crate) fn transport(&self) -> std::result::Result<&Arc<dyn RestTransport>, NetworkError> {
        self.transport.as_ref().ok_or(NetworkError::NotInitialized)
    }

    /// Replace the access token, waiting for in-flight requests to finish.
    pub async fn set_access_token(&self, token: Option<String>) {
        let mut guard = self.token.write().await;
        *guard = token;
    }

    pub async fn access_token(&self) -> Option<String> {
        self.token.read().await.clone()
    }

    /// Start a query against one resource (table).
    pub fn from(&self, resource: &str) -> QueryBuilder {
        QueryBuilder::new(self.clone(), resource)
    }

    /// Issue a request with the current token, bounded by the gateway timeout.
    pub(crate) async fn send(&self, request: RestRequest) -> Result<RestResponse> {
        let transport = self.transport()?;

        let token = self.token.read().await;
        let request = request.bearer(token.clone());
        let path = request.path.clone();

        let outcome = tokio::time::timeout(self.timeout, transport.send(request)).await;
        drop(token);

        let response = match outcome {
            Ok(result) => result?,
            Err(_) => {
                tracing::warn!(path = %path, timeout_secs = self.timeout.as_secs(), "Backend request timed out");
                return Err(NetworkError::Timeout.into());
            }
        };

        check_status(&path, response)
    }

    /// Read every page of `resource` in order.
    ///
    /// Stops at the first short page or after `max_pages` pages, whichever
    /// comes first.
    pub async fn fetch_all_pages<T, F>(
        &self,
        resource: &str,
        configure: F,
        policy: RowPolicy,
    ) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
        F: Fn(QueryBuilder) -> QueryBuilder,
    {
        let Pagination {
            page_size,
            max_pages,
        } = self.pagination;
        if page_size == 0 {
            return Err(AppError::Validation("Page size must be at least 1".to_string()));
        }
        let mut rows = Vec::new();

        for page in 0..max_pages {
            let from = page * page_size;
            let query = configure(self.from(resource)).range(from, from + page_size - 1);
            let values: Vec<serde_json::Value> = query.execute().await?.decoded()?;
            let fetched = values.len();

            rows.extend(decode_rows::<T>(resource, values, policy)?);
            tracing::debug!(resource, page, fetched, "Fetched page");

            if fetched < page_size {
                break;
            }
            if page + 1 == max_pages {
                tracing::warn!(resource, max_pages, "Page cap reached, remaining rows not fetched");
            }
        }

        tracing::info!(resource, total = rows.len(), "Paginated read complete");
        Ok(rows)
    }
}

fn check_status(path: &str, response: RestResponse) -> Result<RestResponse> {
    if response.is_success() {
        return Ok(response);
    }

    let status = response.status;
    let body = response.text();

    match status {
        401 | 403 => Err(AuthError::Unauthorized.into()),
        // PostgREST answers 406 when a single object was requested and none matched
        406 => Err(AppError::NotFound(path.to_string())),
        408 | 429 | 500..=599 => {
            tracing::warn!(status, path, "Backend returned retryable status");
            Err(NetworkError::Status { status, body }.into())
        }
        _ => Err(AppError::Rejected {
            status,
            message: body,
        }),
    }
}

fn decode_rows<T: DeserializeOwned>(
    resource: &str,
    values: Vec<serde_json::Value>,
    policy: RowPolicy,
) -> Result<Vec<T>> {
    let mut rows = Vec::with_capacity(values.len());
    for value in values {
        match serde_json::from_value::<T>(value) {
            Ok(row) => rows.push(row),
            Err(e) if policy == RowPolicy::SkipInvalid => {
                tracing::warn!(resource, error = %e, "Skipping undecodable row");
            }
            Err(e) => return Err(DecodingError::from_json(&e).into()),
        }
    }
    Ok(rows)
}

/// Chainable query against one resource.
///
/// Owned and consumed by its terminal call, so one builder never serves two
/// operations.
pub struct QueryBuilder {
    gateway: DataGateway,
    resource: String,
    columns: String,
    filters: Vec<(String, String)>,
    order: Vec<String>,
    offset: Option<usize>,
    limit: Option<usize>,
    single: bool,
}

impl QueryBuilder {
    fn new(gateway: DataGateway, resource: &str) -> Self {
        Self {
            gateway,
            resource: resource.to_string(),
            columns: "*".to_string(),
            filters: Vec::new(),
            order: Vec::new(),
            offset: None,
            limit: None,
            single: false,
        }
    }

    pub fn select(mut self, columns: &str) -> Self {
        self.columns = columns.to_string();
        self
    }

    pub fn eq(mut self, column: &str, value: impl Display) -> Self {
        self.filters
            .push((column.to_string(), format!("eq.{}", value)));
        self
    }

    /// `column` matches any of `values`.
    pub fn in_list<I, V>(mut self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Display,
    {
        let quoted: Vec<String> = values
            .into_iter()
            .map(|v| format!("\"{}\"", v.to_string().replace('"', "\\\"")))
            .collect();
        self.filters
            .push((column.to_string(), format!("in.({})", quoted.join(","))));
        self
    }

    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        let direction = if ascending { "asc" } else { "desc" };
        self.order.push(format!("{}.{}", column, direction));
        self
    }

    /// Inclusive row range, 0-based.
    pub fn range(mut self, from: usize, to: usize) -> Self {
        self.offset = Some(from);
        self.limit = Some(to.saturating_sub(from) + 1);
        self
    }

    pub fn limit(mut self, count: usize) -> Self {
        self.limit = Some(count);
        self
    }

    /// Expect exactly one row, returned as an object rather than an array.
    pub fn single(mut self) -> Self {
        self.single = true;
        self
    }

    fn request(&self, method: Method) -> RestRequest {
        let mut request = RestRequest::new(method.clone(), format!("{}/{}", REST_PREFIX, self.resource));

        if method == Method::GET {
            request = request.query_param("select", self.columns.as_str());
        }
        for (column, filter) in &self.filters {
            request = request.query_param(column.as_str(), filter.as_str());
        }
        if !self.order.is_empty() {
            request = request.query_param("order", self.order.join(","));
        }
        if let Some(offset) = self.offset {
            request = request.query_param("offset", offset.to_string());
        }
        if let Some(limit) = self.limit {
            request = request.query_param("limit", limit.to_string());
        }
        if self.single {
            request = request.header("Accept", SINGLE_OBJECT_ACCEPT);
        }
        if method != Method::GET {
            request = request.header("Prefer", "return=representation");
        }
        request
    }

    fn require_filter(&self, operation: &str) -> Result<()> {
        if self.filters.is_empty() {
            return Err(AppError::Validation(format!(
                "{} on {} requires at least one filter",
                operation, self.resource
            )));
        }
        Ok(())
    }

    async fn run(self, method: Method, body: Option<serde_json::Value>) -> Result<Response> {
        let mut request = self.request(method);
        if let Some(body) = body {
            request = request.json(body);
        }
        let raw = self.gateway.send(request).await?;
        Ok(Response {
            status: raw.status,
            body: raw.body,
        })
    }

    /// Issue the accumulated query as a GET.
    pub async fn execute(self) -> Result<Response> {
        self.run(Method::GET, None).await
    }

    /// Insert one record (or a slice of records) and return the stored rows.
    pub async fn insert<T: Serialize + ?Sized>(self, record: &T) -> Result<Response> {
        let body = to_json(record)?;
        self.run(Method::POST, Some(body)).await
    }

    /// Apply `patch` to the rows matching the chained filters.
    pub async fn update<T: Serialize + ?Sized>(self, patch: &T) -> Result<Response> {
        self.require_filter("update")?;
        let body = to_json(patch)?;
        self.run(Method::PATCH, Some(body)).await
    }

    /// Delete the rows matching the chained filters.
    pub async fn delete(self) -> Result<Response> {
        self.require_filter("delete")?;
        self.run(Method::DELETE, None).await
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<serde_json::Value> {
    serde_json::to_value(value)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to encode request body: {}", e)))
}

/// Raw response bytes with typed decoding helpers.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub body: Vec<u8>,
}

impl Response {
    pub fn bytes(&self) -> &[u8] {
        &self.body
    }

    /// Decode the whole body as `T`.
    pub fn decoded<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| DecodingError::from_json(&e).into())
    }

    /// Decode a single row from either an object or a non-empty array body.
    pub fn decoded_one<T: DeserializeOwned>(&self) -> Result<T> {
        let value: serde_json::Value = self.decoded()?;
        let row = match value {
            serde_json::Value::Array(mut rows) => {
                if rows.is_empty() {
                    return Err(DecodingError::Shape("expected one row, got none".to_string()).into());
                }
                rows.swap_remove(0)
            }
            other => other,
        };
        serde_json::from_value(row).map_err(|e| DecodingError::from_json(&e).into())
    }

    /// Decode an array body, skipping (and logging) rows that do not decode.
    pub fn decoded_lenient<T: DeserializeOwned>(&self, resource: &str) -> Result<Vec<T>> {
        let values: Vec<serde_json::Value> = self.decoded()?;
        decode_rows(resource, values, RowPolicy::SkipInvalid)
    }
}
