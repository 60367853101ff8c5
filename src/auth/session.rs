// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Session Flows
//!
//! Sign-in, sign-out and startup restore on top of a [`GuardedClient`].
//!
//! Authentication endpoints are skip-listed by the guard, so a rejected
//! login comes straight back to the caller instead of triggering a refresh.
//! The CSRF token issued on login is picked up by the guard's response
//! observation like any other rolled token.

use serde_json::{json, Value};
use tracing::{info, warn};

use super::identity::Identity;
use super::roles::Role;
use crate::client::{ApiRequest, ApiResponse, GuardedClient, ReqwestTransport, Transport};
use crate::error::ClientError;

/// Signed-in state of one portal user.
pub struct Session<T = ReqwestTransport> {
    client: GuardedClient<T>,
}

impl<T> Clone for Session<T> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
        }
    }
}

impl<T: Transport> Session<T> {
    pub fn new(client: GuardedClient<T>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &GuardedClient<T> {
        &self.client
    }

    /// Identity of the signed-in user, if any.
    pub fn current(&self) -> Option<Identity> {
        self.client.identity()
    }

    pub async fn login_student(&self, email: &str) -> Result<Identity, ClientError> {
        self.login_user(Role::Student, email).await
    }

    pub async fn login_fa(&self, email: &str) -> Result<Identity, ClientError> {
        self.login_user(Role::Fa, email).await
    }

    async fn login_user(&self, role: Role, email: &str) -> Result<Identity, ClientError> {
        let endpoints = self.client.endpoints();
        let endpoint = match role {
            Role::Fa => &endpoints.fa_login,
            _ => &endpoints.student_login,
        };

        let request = ApiRequest::post(endpoint.as_str()).json(&json!({ "email": email }))?;
        let response = self.client.execute(request).await?;
        self.establish(Identity::from_profile(role, response.json()?)?)
    }

    /// Admin sign-in. The profile is taken from the response's `admin`
    /// member, or the whole body when there is none.
    pub async fn login_admin(
        &self,
        email: &str,
        password: &str,
        captcha_token: Option<&str>,
    ) -> Result<Identity, ClientError> {
        let mut request = ApiRequest::post(self.client.endpoints().admin_login.as_str());
        if let Some(token) = captcha_token {
            request = request.query("captchaToken", token);
        }
        let request = request.json(&json!({ "email": email, "password": password }))?;

        let body: Value = self.client.execute(request).await?.json()?;
        let profile = body.get("admin").cloned().unwrap_or(body);
        self.establish(Identity::from_profile(Role::Admin, profile)?)
    }

    fn establish(&self, identity: Identity) -> Result<Identity, ClientError> {
        self.client.identity_store().save(&identity)?;
        info!(
            role = %identity.role,
            email = identity.email().unwrap_or("-"),
            csrf_issued = self.client.csrf().get().is_some(),
            "Signed in"
        );
        Ok(identity)
    }

    /// Sign out on the backend, then forget the session locally and go to
    /// the login page. A failed backend call is logged, never returned.
    pub async fn logout(&self) {
        let role = self.current().map(|identity| identity.role);
        let endpoint = self.client.endpoints().logout_for(role).to_string();

        if let Err(err) = self.post_empty(&endpoint).await {
            warn!(role = ?role, error = %err, "Logout request failed");
        }

        self.client.clear_session();
        info!(role = ?role, "Signed out");
        self.client.redirect_to_login(role);
    }

    /// Revalidate a stored identity at startup. On failure the stored
    /// identity is dropped without navigating anywhere.
    pub async fn restore(&self) -> Option<Identity> {
        let identity = self.current()?;

        match self.client.call_refresh(Some(identity.role)).await {
            Ok(token) => {
                if let Some(token) = token {
                    self.client.csrf().set(&token);
                }
                info!(role = %identity.role, "Session restored");
                Some(identity)
            }
            Err(err) => {
                warn!(role = %identity.role, error = %err, "Stored session is no longer valid");
                self.client.clear_session();
                None
            }
        }
    }

    async fn post_empty(&self, path: &str) -> Result<ApiResponse, ClientError> {
        self.client
            .execute(ApiRequest::post(path).json(&json!({}))?)
            .await
    }
}
