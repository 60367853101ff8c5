// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Session-Guarded Client
//!
//! Every API call goes through [`GuardedClient::execute`], which:
//!
//! 1. Defaults the content type to JSON and attaches the cached CSRF token
//!    to every non-GET request.
//! 2. Adopts any rolled `x-csrf-token` value from every response.
//! 3. On `401` (session expired), refreshes the session once for all
//!    concurrent callers and replays the request.
//! 4. On `403` (CSRF mismatch), refreshes once to get a new CSRF token and
//!    replays the request.
//!
//! ## Single-Flight Refresh
//!
//! The refresh state is shared by all clones of the client:
//!
//! ```text
//! Idle ──401──▶ Refreshing(queue) ──settled──▶ Idle
//!                     ▲
//!                     └── further 401s join the queue
//! ```
//!
//! Only the request that moves the state out of `Idle` calls the refresh
//! endpoint. Everyone else parks on a oneshot channel and is released with
//! the same outcome when the call settles. On failure the identity and CSRF
//! cache are cleared and the navigator is sent to the role's login page
//! exactly once.
//!
//! ## Retry Limits
//!
//! Each request is replayed at most once per failure class. A replay that
//! gets `401` again is returned to the caller as is. Requests to the
//! authentication endpoints themselves are never retried.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::navigator::Navigator;
use super::request::{ApiRequest, ApiResponse, JSON_CONTENT_TYPE};
use super::transport::{ReqwestTransport, Transport};
use crate::auth::csrf::{token_from_headers, CsrfCache, CSRF_HEADER};
use crate::auth::identity::{FileIdentityStore, Identity, IdentityStore, MemoryIdentityStore};
use crate::auth::Role;
use crate::config::{AuthEndpoints, ClientConfig};
use crate::error::ClientError;

type RefreshOutcome = Result<(), ClientError>;

/// Process-wide refresh state.
enum RefreshState {
    Idle,
    /// A refresh call is in flight; senders are the requests waiting on it.
    Refreshing(Vec<oneshot::Sender<RefreshOutcome>>),
}

/// Per-request replay markers, one per failure class.
#[derive(Debug, Default, Clone, Copy)]
struct RetryMarkers {
    session: bool,
    csrf: bool,
}

struct Inner<T> {
    transport: T,
    endpoints: AuthEndpoints,
    csrf: CsrfCache,
    identity: Arc<dyn IdentityStore>,
    navigator: Arc<dyn Navigator>,
    refresh: Mutex<RefreshState>,
}

impl<T> Inner<T> {
    fn refresh_state(&self) -> MutexGuard<'_, RefreshState> {
        self.refresh.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return to `Idle` and hand `outcome` to every queued request.
    fn release(&self, outcome: RefreshOutcome) {
        let queue = match std::mem::replace(&mut *self.refresh_state(), RefreshState::Idle) {
            RefreshState::Refreshing(queue) => queue,
            RefreshState::Idle => Vec::new(),
        };
        debug!(
            queued = queue.len(),
            success = outcome.is_ok(),
            "Releasing requests queued on session refresh"
        );
        for waiter in queue {
            // A waiter whose caller went away has nothing to receive.
            let _ = waiter.send(outcome.clone());
        }
    }
}

/// Held by the request performing a refresh. Dropping it unsettled, e.g.
/// when that request's task is cancelled, still releases the queue.
struct RefreshFlight<'a, T> {
    inner: &'a Inner<T>,
    settled: bool,
}

impl<T> RefreshFlight<'_, T> {
    fn settle(mut self, outcome: RefreshOutcome) {
        self.settled = true;
        self.inner.release(outcome);
    }
}

impl<T> Drop for RefreshFlight<'_, T> {
    fn drop(&mut self) {
        if !self.settled {
            warn!("Session refresh abandoned before completion");
            self.inner
                .release(Err(ClientError::RefreshFailed("refresh was cancelled".to_string())));
        }
    }
}

/// HTTP client that keeps CSRF tokens current and recovers expired sessions.
///
/// Cloning is cheap and clones share the CSRF cache and refresh state.
pub struct GuardedClient<T = ReqwestTransport> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for GuardedClient<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl GuardedClient<ReqwestTransport> {
    /// Build a reqwest-backed client. The identity is kept in
    /// `config.identity_file` when set, in memory otherwise.
    pub fn from_config(
        config: &ClientConfig,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, ClientError> {
        let transport = ReqwestTransport::from_config(config)?;
        let identity: Arc<dyn IdentityStore> = match &config.identity_file {
            Some(path) => Arc::new(FileIdentityStore::new(path)),
            None => Arc::new(MemoryIdentityStore::new()),
        };
        Ok(Self::new(transport, config, identity, navigator))
    }
}

impl<T: Transport> GuardedClient<T> {
    pub fn new(
        transport: T,
        config: &ClientConfig,
        identity: Arc<dyn IdentityStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                endpoints: config.endpoints.clone(),
                csrf: CsrfCache::new(config.csrf_cookie_days),
                identity,
                navigator,
                refresh: Mutex::new(RefreshState::Idle),
            }),
        }
    }

    pub fn endpoints(&self) -> &AuthEndpoints {
        &self.inner.endpoints
    }

    pub fn csrf(&self) -> &CsrfCache {
        &self.inner.csrf
    }

    pub fn identity_store(&self) -> &Arc<dyn IdentityStore> {
        &self.inner.identity
    }

    pub fn identity(&self) -> Option<Identity> {
        self.inner.identity.load()
    }

    fn current_role(&self) -> Option<Role> {
        self.identity().map(|identity| identity.role)
    }

    /// Whether a session refresh call is currently in flight.
    pub fn is_refreshing(&self) -> bool {
        matches!(*self.inner.refresh_state(), RefreshState::Refreshing(_))
    }

    /// Number of requests parked on the in-flight refresh.
    pub fn queued_requests(&self) -> usize {
        match &*self.inner.refresh_state() {
            RefreshState::Refreshing(queue) => queue.len(),
            RefreshState::Idle => 0,
        }
    }

    /// Send a request through the guard.
    ///
    /// Non-2xx responses that are not recovered come back as
    /// [`ClientError::Status`]; a terminal session failure comes back as
    /// [`ClientError::RefreshFailed`] (401 path) or the `403` status error.
    pub async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, ClientError> {
        let request_id = Uuid::new_v4();
        let mut markers = RetryMarkers::default();

        loop {
            let response = self.send_observed(self.decorate(&request)).await?;
            if response.is_success() {
                return Ok(response);
            }

            let err = ClientError::from_response(&request, &response);
            if self.inner.endpoints.skips_refresh(&request.path) {
                return Err(err);
            }

            match response.status {
                StatusCode::UNAUTHORIZED if !markers.session => {
                    markers.session = true;
                    debug!(
                        %request_id,
                        method = %request.method,
                        path = %request.path,
                        "Session expired, waiting for refresh"
                    );
                    self.await_session_refresh().await?;
                    debug!(%request_id, path = %request.path, "Replaying after session refresh");
                }
                StatusCode::FORBIDDEN if !markers.csrf => {
                    markers.csrf = true;
                    debug!(
                        %request_id,
                        method = %request.method,
                        path = %request.path,
                        "CSRF rejected, refreshing token"
                    );
                    if !self.refresh_csrf().await {
                        return Err(err);
                    }
                    debug!(%request_id, path = %request.path, "Replaying after CSRF refresh");
                }
                StatusCode::FORBIDDEN => {
                    warn!(
                        %request_id,
                        path = %request.path,
                        "CSRF rejected again after refresh, ending session"
                    );
                    self.end_session(self.current_role());
                    return Err(err);
                }
                _ => return Err(err),
            }
        }
    }

    /// GET `path` and decode the JSON response.
    pub async fn get_json<R: DeserializeOwned>(&self, path: &str) -> Result<R, ClientError> {
        self.execute(ApiRequest::get(path)).await?.json()
    }

    /// Send `body` as JSON and decode the JSON response.
    pub async fn send_json<B, R>(&self, method: Method, path: &str, body: &B) -> Result<R, ClientError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        self.execute(ApiRequest::new(method, path).json(body)?)
            .await?
            .json()
    }

    /// Refresh the session now, joining an in-flight refresh if there is one.
    pub async fn refresh_session(&self) -> Result<(), ClientError> {
        self.await_session_refresh().await
    }

    /// Forget the identity and CSRF token without navigating.
    pub fn clear_session(&self) {
        self.inner.identity.clear();
        self.inner.csrf.clear();
    }

    /// Send the navigator to the login page for `role`.
    pub fn redirect_to_login(&self, role: Option<Role>) {
        let target = self.inner.endpoints.login_page_for(role);
        info!(role = ?role, target_page = %target, "Redirecting to login");
        self.inner.navigator.redirect(target);
    }

    /// Call the refresh endpoint for `role` once, outside the guard. Returns
    /// the CSRF token from the response, if any.
    pub(crate) async fn call_refresh(&self, role: Option<Role>) -> Result<Option<String>, ClientError> {
        let endpoint = self.inner.endpoints.refresh_for(role);
        let request = ApiRequest::post(endpoint).json(&serde_json::json!({}))?;

        let response = self
            .inner
            .transport
            .send(request)
            .await
            .map_err(|e| ClientError::RefreshFailed(e.to_string()))?;

        if !response.is_success() {
            return Err(ClientError::RefreshFailed(format!(
                "{endpoint} returned {}",
                response.status
            )));
        }

        Ok(token_from_headers(&response.headers))
    }

    fn decorate(&self, request: &ApiRequest) -> ApiRequest {
        let mut outgoing = request.clone();

        if !outgoing.headers.contains_key(CONTENT_TYPE) {
            outgoing
                .headers
                .insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
        }

        if outgoing.method != Method::GET {
            if let Some(token) = self.inner.csrf.get() {
                match HeaderValue::from_str(&token) {
                    Ok(value) => {
                        outgoing.headers.insert(CSRF_HEADER, value);
                    }
                    Err(_) => warn!("Cached CSRF token is not a valid header value"),
                }
            }
        }

        outgoing
    }

    async fn send_observed(&self, request: ApiRequest) -> Result<ApiResponse, ClientError> {
        let response = self.inner.transport.send(request).await?;
        if self.inner.csrf.observe(&response.headers) {
            debug!("Adopted rolled CSRF token");
        }
        Ok(response)
    }

    async fn await_session_refresh(&self) -> RefreshOutcome {
        let waiter = {
            let mut state = self.inner.refresh_state();
            match &mut *state {
                RefreshState::Refreshing(queue) => {
                    let (tx, rx) = oneshot::channel();
                    queue.push(tx);
                    Some(rx)
                }
                RefreshState::Idle => {
                    *state = RefreshState::Refreshing(Vec::new());
                    None
                }
            }
        };

        if let Some(rx) = waiter {
            return rx.await.unwrap_or_else(|_| {
                Err(ClientError::RefreshFailed("refresh was abandoned".to_string()))
            });
        }

        let flight = RefreshFlight {
            inner: &self.inner,
            settled: false,
        };
        // Read before the call: a failure clears the identity, and the
        // redirect must still target the role that was signed in.
        let role = self.current_role();

        match self.call_refresh(role).await {
            Ok(token) => {
                if let Some(token) = token {
                    self.inner.csrf.set(&token);
                }
                info!(role = ?role, "Session refreshed");
                flight.settle(Ok(()));
                Ok(())
            }
            Err(err) => {
                warn!(role = ?role, error = %err, "Session refresh failed, ending session");
                self.end_session(role);
                flight.settle(Err(err.clone()));
                Err(err)
            }
        }
    }

    /// Single-shot refresh for a CSRF mismatch. Returns whether the request
    /// should be replayed.
    async fn refresh_csrf(&self) -> bool {
        let role = self.current_role();
        match self.call_refresh(role).await {
            Ok(Some(token)) => {
                self.inner.csrf.set(&token);
                true
            }
            Ok(None) => {
                error!(role = ?role, "Refresh response carried no CSRF token");
                false
            }
            Err(err) => {
                warn!(role = ?role, error = %err, "CSRF refresh failed, ending session");
                self.end_session(role);
                false
            }
        }
    }

    fn end_session(&self, role: Option<Role>) {
        self.clear_session();
        self.redirect_to_login(role);
    }
}
