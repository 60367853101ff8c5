// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Network transport behind the guard.

use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use tracing::debug;
use url::Url;

use super::request::{ApiRequest, ApiResponse};
use crate::config::ClientConfig;
use crate::error::ClientError;

/// Sends one request and reads the whole response.
///
/// Only failures where no response arrived are errors; every HTTP status is
/// returned as a response so the guard can decide what to do with it.
pub trait Transport: Send + Sync + 'static {
    fn send(&self, request: ApiRequest) -> impl Future<Output = Result<ApiResponse, ClientError>> + Send;
}

/// reqwest-backed transport with a cookie jar, so the backend's session
/// cookies are included on every call.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    base_url: Url,
    http: Client,
}

impl ReqwestTransport {
    pub fn new(base_url: Url, timeout: Option<Duration>) -> Result<Self, ClientError> {
        let mut builder = Client::builder().cookie_store(true);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { base_url, http })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, ClientError> {
        Self::new(config.base_url.clone(), config.timeout)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve a request path against the base URL. Absolute URLs pass
    /// through unchanged.
    pub fn resolve(&self, path: &str) -> Result<Url, ClientError> {
        self.base_url
            .join(path)
            .map_err(|e| ClientError::Config(format!("invalid request path {path:?}: {e}")))
    }
}

impl Transport for ReqwestTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ClientError> {
        let url = self.resolve(&request.path)?;

        let mut builder = self
            .http
            .request(request.method.clone(), url)
            .headers(request.headers.clone());
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ClientError::network(&request, e.to_string()))?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| ClientError::network(&request, format!("failed to read body: {e}")))?;

        debug!(
            method = %request.method,
            path = %request.path,
            status = status.as_u16(),
            bytes = body.len(),
            "Transport response"
        );

        Ok(ApiResponse::new(status, headers, body.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport() -> ReqwestTransport {
        ReqwestTransport::new(Url::parse("http://localhost:8080").unwrap(), None).unwrap()
    }

    #[test]
    fn resolve_joins_relative_paths() {
        let url = transport().resolve("/api/fa/approvals?page=2").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/api/fa/approvals?page=2");
    }

    #[test]
    fn resolve_passes_absolute_urls_through() {
        let url = transport().resolve("https://other.example.edu/admin/refresh").unwrap();
        assert_eq!(url.as_str(), "https://other.example.edu/admin/refresh");
    }

    #[tokio::test]
    async fn connection_failure_is_a_network_error() {
        let transport =
            ReqwestTransport::new(Url::parse("http://127.0.0.1:9").unwrap(), Some(Duration::from_secs(2)))
                .unwrap();
        let err = transport.send(ApiRequest::get("/ping")).await.unwrap_err();
        assert!(matches!(err, ClientError::Network { .. }), "got {err:?}");
    }
}
