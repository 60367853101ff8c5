// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Scripted in-process backend for guard and session tests.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};
use tokio::sync::Semaphore;
use url::Url;

use super::guard::GuardedClient;
use super::navigator::Navigator;
use super::request::{ApiRequest, ApiResponse};
use super::transport::Transport;
use crate::auth::csrf::CSRF_HEADER;
use crate::auth::identity::{Identity, IdentityStore, MemoryIdentityStore};
use crate::auth::Role;
use crate::config::{AuthEndpoints, ClientConfig};
use crate::error::ClientError;

#[derive(Debug, Clone)]
pub(crate) enum RefreshBehavior {
    /// 200 with the given CSRF token header; revalidates the session.
    Succeed(Option<String>),
    Reject(StatusCode),
    NetworkError,
}

#[derive(Debug)]
pub(crate) struct BackendState {
    pub session_valid: bool,
    /// Token expected on mutations. `None` disables the check.
    pub server_csrf: Option<String>,
    pub refresh: RefreshBehavior,
    pub login_status: StatusCode,
    pub login_token: Option<String>,
    pub login_body: Value,
    /// Every non-auth call answers 401.
    pub always_unauthorized: bool,
    /// Every non-GET call answers 403.
    pub reject_mutations: bool,
    /// Token rolled on every successful API response.
    pub roll_token: Option<String>,
    pub unreachable_paths: Vec<String>,
    pub not_found_paths: Vec<String>,
    pub requests: Vec<ApiRequest>,
    pub refresh_calls: usize,
}

impl Default for BackendState {
    fn default() -> Self {
        Self {
            session_valid: true,
            server_csrf: None,
            refresh: RefreshBehavior::Succeed(Some("T2".to_string())),
            login_status: StatusCode::OK,
            login_token: Some("T1".to_string()),
            login_body: json!({"email": "asha@college.edu", "name": "Asha"}),
            always_unauthorized: false,
            reject_mutations: false,
            roll_token: None,
            unreachable_paths: Vec::new(),
            not_found_paths: Vec::new(),
            requests: Vec::new(),
            refresh_calls: 0,
        }
    }
}

pub(crate) struct MockBackend {
    state: Mutex<BackendState>,
    endpoints: AuthEndpoints,
    /// When set, refresh calls park until a permit is added.
    refresh_gate: Option<Semaphore>,
}

impl MockBackend {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(BackendState::default()),
            endpoints: AuthEndpoints::default(),
            refresh_gate: None,
        })
    }

    pub(crate) fn gated() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(BackendState::default()),
            endpoints: AuthEndpoints::default(),
            refresh_gate: Some(Semaphore::new(0)),
        })
    }

    fn lock(&self) -> MutexGuard<'_, BackendState> {
        self.state.lock().unwrap()
    }

    pub(crate) fn update(&self, f: impl FnOnce(&mut BackendState)) {
        f(&mut self.lock());
    }

    pub(crate) fn refresh_calls(&self) -> usize {
        self.lock().refresh_calls
    }

    pub(crate) fn session_valid(&self) -> bool {
        self.lock().session_valid
    }

    /// Requests received for `path`, ignoring the query string.
    pub(crate) fn requests_to(&self, path: &str) -> Vec<ApiRequest> {
        self.lock()
            .requests
            .iter()
            .filter(|r| r.path == path || strip_query(&r.path) == path)
            .cloned()
            .collect()
    }

    pub(crate) fn open_refresh_gate(&self) {
        if let Some(gate) = &self.refresh_gate {
            gate.add_permits(1024);
        }
    }

    async fn refresh(&self, request: &ApiRequest) -> Result<ApiResponse, ClientError> {
        self.lock().refresh_calls += 1;
        if let Some(gate) = &self.refresh_gate {
            gate.acquire().await.unwrap().forget();
        }

        let mut state = self.lock();
        match state.refresh.clone() {
            RefreshBehavior::Succeed(token) => {
                state.session_valid = true;
                if let Some(token) = &token {
                    state.server_csrf = Some(token.clone());
                }
                Ok(respond(StatusCode::OK, token.as_deref(), json!({})))
            }
            RefreshBehavior::Reject(status) => {
                Ok(respond(status, None, json!({"message": "refresh token expired"})))
            }
            RefreshBehavior::NetworkError => Err(ClientError::network(request, "connection reset")),
        }
    }
}

impl Transport for Arc<MockBackend> {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ClientError> {
        let path = strip_query(&request.path).to_string();
        self.lock().requests.push(request.clone());

        let endpoints = &self.endpoints;
        if path == endpoints.user_refresh || path == endpoints.admin_refresh {
            return self.refresh(&request).await;
        }

        let mut state = self.lock();
        if state.unreachable_paths.contains(&path) {
            return Err(ClientError::network(&request, "connection refused"));
        }
        if path == endpoints.student_login || path == endpoints.fa_login || path == endpoints.admin_login {
            if state.login_status.is_success() {
                state.session_valid = true;
                state.server_csrf = state.login_token.clone();
            }
            let body = if state.login_status.is_success() {
                state.login_body.clone()
            } else {
                json!({"message": "invalid credentials"})
            };
            return Ok(respond(state.login_status, state.login_token.as_deref(), body));
        }
        if path == endpoints.user_logout || path == endpoints.admin_logout {
            state.session_valid = false;
            return Ok(respond(StatusCode::OK, None, json!({})));
        }
        if !state.session_valid || state.always_unauthorized {
            return Ok(respond(StatusCode::UNAUTHORIZED, None, json!({"message": "session expired"})));
        }
        if request.method != Method::GET {
            let sent = request.headers.get(CSRF_HEADER).and_then(|v| v.to_str().ok());
            let mismatch = state
                .server_csrf
                .as_deref()
                .is_some_and(|expected| sent != Some(expected));
            if state.reject_mutations || mismatch {
                return Ok(respond(StatusCode::FORBIDDEN, None, json!({"message": "invalid csrf token"})));
            }
        }
        if state.not_found_paths.contains(&path) {
            return Ok(respond(StatusCode::NOT_FOUND, None, json!({"message": "not found"})));
        }

        Ok(respond(
            StatusCode::OK,
            state.roll_token.as_deref(),
            json!({"path": path, "ok": true}),
        ))
    }
}

fn strip_query(path: &str) -> &str {
    path.split('?').next().unwrap_or_default()
}

fn respond(status: StatusCode, token: Option<&str>, body: Value) -> ApiResponse {
    let mut headers = HeaderMap::new();
    if let Some(token) = token {
        headers.insert(CSRF_HEADER, HeaderValue::from_str(token).unwrap());
    }
    ApiResponse::new(status, headers, serde_json::to_vec(&body).unwrap())
}

/// Navigator that records every redirect.
#[derive(Debug, Default)]
pub(crate) struct RecordingNavigator {
    targets: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub(crate) fn targets(&self) -> Vec<String> {
        self.targets.lock().unwrap().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn redirect(&self, target: &str) {
        self.targets.lock().unwrap().push(target.to_string());
    }
}

pub(crate) fn test_config() -> ClientConfig {
    ClientConfig::new(Url::parse("http://portal.test").unwrap())
}

/// Guarded client over `backend`, optionally signed in as `role`.
pub(crate) fn guarded(
    backend: Arc<MockBackend>,
    role: Option<Role>,
) -> (
    GuardedClient<Arc<MockBackend>>,
    Arc<RecordingNavigator>,
    Arc<MemoryIdentityStore>,
) {
    let identity = Arc::new(match role {
        Some(role) => MemoryIdentityStore::with_identity(Identity::new(role)),
        None => MemoryIdentityStore::new(),
    });
    let navigator = Arc::new(RecordingNavigator::default());
    let client = GuardedClient::new(
        backend,
        &test_config(),
        identity.clone() as Arc<dyn IdentityStore>,
        navigator.clone() as Arc<dyn Navigator>,
    );
    (client, navigator, identity)
}

/// Poll `condition` until it holds, failing the test after two seconds.
pub(crate) async fn wait_until(condition: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached in time"
        );
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}
