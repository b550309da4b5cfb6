//! HTTP client for the hosted platform.
//!
//! Rows go through the REST endpoint (`/rest/v1/{table}`), files through
//! storage (`/storage/v1/object/{bucket}/{path}`), and change feeds through
//! the realtime websocket (see [`realtime`]).

mod auth;
mod realtime;

pub use auth::RestAuth;

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::ExposeSecret;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::backend::{Backend, ChangeFeed, Row};
use crate::config::PlatformConfig;
use crate::error::BackendError;
use crate::query::{Filter, Query, Table};

/// Platform client using the service key.
#[derive(Clone)]
pub struct RestBackend {
    inner: Arc<RestBackendInner>,
}

struct RestBackendInner {
    client: reqwest::Client,
    config: PlatformConfig,
}

impl RestBackend {
    /// Create a new client.
    #[must_use]
    pub fn new(config: PlatformConfig) -> Self {
        Self {
            inner: Arc::new(RestBackendInner {
                client: reqwest::Client::new(),
                config,
            }),
        }
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        let config = &self.inner.config;
        self.inner
            .client
            .request(method, url)
            .header("apikey", config.anon_key.expose_secret())
            .bearer_auth(config.service_key.expose_secret())
    }

    fn table_url(&self, table: Table) -> String {
        format!("{}/{}", self.inner.config.rest_url(), table.as_str())
    }

    /// Send a request and decode the JSON row array it returns.
    async fn execute(
        &self,
        table: Table,
        request: reqwest::RequestBuilder,
    ) -> Result<Vec<Row>, BackendError> {
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(BackendError::RateLimited(retry_after));
        }

        let body = response.text().await?;

        if status == StatusCode::CONFLICT {
            return Err(BackendError::Conflict {
                table: table.as_str(),
                message: error_message(&body),
            });
        }

        if !status.is_success() {
            tracing::error!(
                status = %status,
                table = %table,
                body = %body.chars().take(500).collect::<String>(),
                "Platform returned non-success status"
            );
            return Err(BackendError::Status {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        if body.trim().is_empty() {
            return Ok(Vec::new());
        }

        match serde_json::from_str::<Vec<Row>>(&body) {
            Ok(rows) => Ok(rows),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    table = %table,
                    body = %body.chars().take(500).collect::<String>(),
                    "Failed to parse platform response"
                );
                Err(BackendError::Parse(e))
            }
        }
    }
}

/// Pull the `message` field out of an error body, falling back to the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("error"))
                .and_then(Value::as_str)
                .map(str::to_owned)
        })
        .unwrap_or_else(|| body.chars().take(200).collect())
}

fn filter_params(filters: &[Filter]) -> Vec<(String, String)> {
    filters.iter().map(Filter::to_param).collect()
}

#[async_trait]
impl Backend for RestBackend {
    #[instrument(skip(self, query), fields(table = %table))]
    async fn select(&self, table: Table, query: &Query) -> Result<Vec<Row>, BackendError> {
        let request = self
            .request(reqwest::Method::GET, &self.table_url(table))
            .query(&query.to_params());
        let rows = self.execute(table, request).await?;
        debug!(count = rows.len(), "Selected rows");
        Ok(rows)
    }

    #[instrument(skip(self, rows), fields(table = %table, count = rows.len()))]
    async fn insert(&self, table: Table, rows: Vec<Row>) -> Result<Vec<Row>, BackendError> {
        let request = self
            .request(reqwest::Method::POST, &self.table_url(table))
            .header("Prefer", "return=representation")
            .json(&rows);
        self.execute(table, request).await
    }

    #[instrument(skip(self, filters, patch), fields(table = %table))]
    async fn update(
        &self,
        table: Table,
        filters: &[Filter],
        patch: Row,
    ) -> Result<Vec<Row>, BackendError> {
        let request = self
            .request(reqwest::Method::PATCH, &self.table_url(table))
            .header("Prefer", "return=representation")
            .query(&filter_params(filters))
            .json(&patch);
        self.execute(table, request).await
    }

    #[instrument(skip(self, filters), fields(table = %table))]
    async fn delete(&self, table: Table, filters: &[Filter]) -> Result<Vec<Row>, BackendError> {
        let request = self
            .request(reqwest::Method::DELETE, &self.table_url(table))
            .header("Prefer", "return=representation")
            .query(&filter_params(filters));
        self.execute(table, request).await
    }

    async fn subscribe(
        &self,
        table: Table,
        filter: Option<Filter>,
    ) -> Result<ChangeFeed, BackendError> {
        realtime::subscribe(&self.inner.config, table, filter).await
    }

    #[instrument(skip(self, bytes), fields(bucket = %bucket, path = %path, size = bytes.len()))]
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, BackendError> {
        let storage = self.inner.config.storage_url();
        let response = self
            .request(
                reqwest::Method::POST,
                &format!("{storage}/object/{bucket}/{path}"),
            )
            .header("Content-Type", content_type)
            .header("x-upsert", "true")
            .body(bytes)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Storage(format!(
                "HTTP {status}: {}",
                error_message(&body)
            )));
        }

        Ok(format!("{storage}/object/public/{bucket}/{path}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_prefers_json_message() {
        assert_eq!(
            error_message(r#"{"code":"23505","message":"duplicate key"}"#),
            "duplicate key"
        );
        assert_eq!(error_message("gateway timeout"), "gateway timeout");
    }
}
