// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! CSRF token cache.
//!
//! The backend issues a CSRF token in the `x-csrf-token` response header on
//! login and refresh, and may roll it on any response. The cache keeps the
//! most recent value seen, shaped like the `csrfToken` cookie the portal
//! stores it in (multi-day expiry, `SameSite=Strict`), and the guard attaches
//! it as `X-CSRF-Token` on every mutating request.

use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};
use reqwest::header::{HeaderMap, HeaderName};

/// Header carrying the token in both directions. Header names are
/// case-insensitive, so this also matches `X-CSRF-Token`.
pub const CSRF_HEADER: HeaderName = HeaderName::from_static("x-csrf-token");

/// Cookie name the token is stored under.
pub const CSRF_COOKIE_NAME: &str = "csrfToken";

/// Cached CSRF token with its cookie expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrfCookie {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl CsrfCookie {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Render as a `Set-Cookie` style string.
    pub fn to_cookie_string(&self) -> String {
        format!(
            "{CSRF_COOKIE_NAME}={};expires={};path=/;SameSite=Strict",
            self.value,
            self.expires_at.format("%a, %d %b %Y %H:%M:%S GMT")
        )
    }
}

/// Process-wide CSRF token cache.
#[derive(Debug)]
pub struct CsrfCache {
    cookie: RwLock<Option<CsrfCookie>>,
    lifetime: Duration,
}

impl CsrfCache {
    pub fn new(lifetime_days: i64) -> Self {
        Self {
            cookie: RwLock::new(None),
            lifetime: Duration::days(lifetime_days),
        }
    }

    /// Current token, unless absent or expired.
    pub fn get(&self) -> Option<String> {
        self.cookie()
            .filter(|c| !c.is_expired(Utc::now()))
            .map(|c| c.value)
    }

    pub fn cookie(&self) -> Option<CsrfCookie> {
        self.cookie.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Store a token with a fresh expiry. An empty token clears the cache.
    pub fn set(&self, token: &str) {
        let token = token.trim();
        if token.is_empty() {
            self.clear();
            return;
        }
        *self.cookie.write().unwrap_or_else(|e| e.into_inner()) = Some(CsrfCookie {
            value: token.to_string(),
            expires_at: Utc::now() + self.lifetime,
        });
    }

    pub fn clear(&self) {
        *self.cookie.write().unwrap_or_else(|e| e.into_inner()) = None;
    }

    /// Adopt the token from response headers if it differs from the cached
    /// one. Returns whether the cache was written.
    pub fn observe(&self, headers: &HeaderMap) -> bool {
        let Some(token) = token_from_headers(headers) else {
            return false;
        };
        if self.get().as_deref() == Some(token.as_str()) {
            return false;
        }
        self.set(&token);
        true
    }
}

/// Non-empty CSRF token from response headers.
pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get(&CSRF_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
