// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variable names, defaults, and the endpoint table used by the
//! guarded client. Configuration is loaded from the environment at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `PORTAL_API_BASE_URL` | Backend base URL | `http://localhost:8080` |
//! | `PORTAL_HTTP_TIMEOUT_SECS` | Per-call timeout, `0` disables | `30` |
//! | `PORTAL_IDENTITY_FILE` | JSON file holding the signed-in identity | in memory |
//! | `PORTAL_CSRF_COOKIE_DAYS` | Lifetime of the cached CSRF cookie | `7` |
//! | `PORTAL_KEEPALIVE_SECS` | Background session refresh interval | `300` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info` |

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::auth::Role;
use crate::error::ClientError;

pub const API_BASE_URL_ENV: &str = "PORTAL_API_BASE_URL";
pub const HTTP_TIMEOUT_ENV: &str = "PORTAL_HTTP_TIMEOUT_SECS";
pub const IDENTITY_FILE_ENV: &str = "PORTAL_IDENTITY_FILE";
pub const CSRF_COOKIE_DAYS_ENV: &str = "PORTAL_CSRF_COOKIE_DAYS";
pub const KEEPALIVE_ENV: &str = "PORTAL_KEEPALIVE_SECS";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

const DEFAULT_API_BASE_URL: &str = "http://localhost:8080";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CSRF_COOKIE_DAYS: i64 = 7;
pub(crate) const DEFAULT_KEEPALIVE_SECS: u64 = 300;

/// Page shown when a signed-in user opens a route meant for another role.
pub const UNAUTHORIZED_PAGE: &str = "/unauthorized";

/// Authentication endpoints and login pages.
///
/// Requests to any of the endpoints listed in [`AuthEndpoints::skips_refresh`]
/// never trigger the refresh flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthEndpoints {
    pub student_login: String,
    pub fa_login: String,
    pub admin_login: String,
    pub user_refresh: String,
    pub admin_refresh: String,
    pub user_logout: String,
    pub admin_logout: String,
    pub user_login_page: String,
    pub admin_login_page: String,
}

impl Default for AuthEndpoints {
    fn default() -> Self {
        Self {
            student_login: "/api/auth/login-student".to_string(),
            fa_login: "/api/auth/login-fa".to_string(),
            admin_login: "/admin/login".to_string(),
            user_refresh: "/api/auth/refresh".to_string(),
            admin_refresh: "/admin/refresh".to_string(),
            user_logout: "/api/auth/logout".to_string(),
            admin_logout: "/admin/logout".to_string(),
            user_login_page: "/login".to_string(),
            admin_login_page: "/admin/login".to_string(),
        }
    }
}

impl AuthEndpoints {
    /// Refresh endpoint for the cached role. Anything but admin uses the
    /// student/FA endpoint, including an unknown role.
    pub fn refresh_for(&self, role: Option<Role>) -> &str {
        match role {
            Some(Role::Admin) => &self.admin_refresh,
            _ => &self.user_refresh,
        }
    }

    pub fn logout_for(&self, role: Option<Role>) -> &str {
        match role {
            Some(Role::Admin) => &self.admin_logout,
            _ => &self.user_logout,
        }
    }

    pub fn login_page_for(&self, role: Option<Role>) -> &str {
        match role {
            Some(Role::Admin) => &self.admin_login_page,
            _ => &self.user_login_page,
        }
    }

    /// Whether a request path belongs to the authentication flow itself.
    ///
    /// The query string is ignored and absolute URLs match on their path.
    pub fn skips_refresh(&self, path: &str) -> bool {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        [
            &self.student_login,
            &self.fa_login,
            &self.admin_login,
            &self.user_refresh,
            &self.admin_refresh,
            &self.user_logout,
            &self.admin_logout,
        ]
        .iter()
        .any(|endpoint| path == endpoint.as_str() || path.ends_with(endpoint.as_str()))
    }
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: Url,
    pub timeout: Option<Duration>,
    pub identity_file: Option<PathBuf>,
    pub csrf_cookie_days: i64,
    pub keepalive_interval: Duration,
    pub endpoints: AuthEndpoints,
}

impl ClientConfig {
    /// Configuration with every default except the base URL.
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            timeout: Some(Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS)),
            identity_file: None,
            csrf_cookie_days: DEFAULT_CSRF_COOKIE_DAYS,
            keepalive_interval: Duration::from_secs(DEFAULT_KEEPALIVE_SECS),
            endpoints: AuthEndpoints::default(),
        }
    }

    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ClientError> {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let base_url = parse_base_url(
            &get(API_BASE_URL_ENV).unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
        )?;

        let timeout_secs: u64 = parse_or(get(HTTP_TIMEOUT_ENV), HTTP_TIMEOUT_ENV, DEFAULT_HTTP_TIMEOUT_SECS)?;
        let csrf_cookie_days: i64 =
            parse_or(get(CSRF_COOKIE_DAYS_ENV), CSRF_COOKIE_DAYS_ENV, DEFAULT_CSRF_COOKIE_DAYS)?;
        if csrf_cookie_days <= 0 {
            return Err(ClientError::Config(format!(
                "{CSRF_COOKIE_DAYS_ENV} must be positive, got {csrf_cookie_days}"
            )));
        }
        let keepalive_secs: u64 = parse_or(get(KEEPALIVE_ENV), KEEPALIVE_ENV, DEFAULT_KEEPALIVE_SECS)?;
        if keepalive_secs == 0 {
            return Err(ClientError::Config(format!("{KEEPALIVE_ENV} must be positive")));
        }

        Ok(Self {
            timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
            identity_file: get(IDENTITY_FILE_ENV).map(PathBuf::from),
            csrf_cookie_days,
            keepalive_interval: Duration::from_secs(keepalive_secs),
            ..Self::new(base_url)
        })
    }
}

/// Parse and validate the backend base URL.
pub fn parse_base_url(raw: &str) -> Result<Url, ClientError> {
    let url = Url::parse(raw)
        .map_err(|e| ClientError::Config(format!("{API_BASE_URL_ENV} is not a URL ({raw}): {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ClientError::Config(format!(
            "{API_BASE_URL_ENV} must use http or https, got {other}"
        ))),
    }
}

fn parse_or<T: std::str::FromStr>(raw: Option<String>, name: &str, default: T) -> Result<T, ClientError>
where
    T::Err: std::fmt::Display,
{
    match raw {
        Some(value) => value
            .parse()
            .map_err(|e| ClientError::Config(format!("invalid {name} value {value:?}: {e}"))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_apply_when_environment_is_empty() {
        let config = ClientConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.base_url.as_str(), "http://localhost:8080/");
        assert_eq!(config.timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.csrf_cookie_days, 7);
        assert_eq!(config.keepalive_interval, Duration::from_secs(300));
        assert!(config.identity_file.is_none());
    }

    #[test]
    fn overrides_are_parsed() {
        let config = ClientConfig::from_lookup(lookup(&[
            (API_BASE_URL_ENV, "https://portal.example.edu"),
            (HTTP_TIMEOUT_ENV, "0"),
            (IDENTITY_FILE_ENV, "/tmp/identity.json"),
            (KEEPALIVE_ENV, " 60 "),
        ]))
        .unwrap();
        assert_eq!(config.base_url.host_str(), Some("portal.example.edu"));
        assert_eq!(config.timeout, None);
        assert_eq!(config.identity_file, Some(PathBuf::from("/tmp/identity.json")));
        assert_eq!(config.keepalive_interval, Duration::from_secs(60));
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(ClientConfig::from_lookup(lookup(&[(API_BASE_URL_ENV, "ftp://x")])).is_err());
        assert!(ClientConfig::from_lookup(lookup(&[(HTTP_TIMEOUT_ENV, "soon")])).is_err());
        assert!(ClientConfig::from_lookup(lookup(&[(CSRF_COOKIE_DAYS_ENV, "0")])).is_err());
        assert!(ClientConfig::from_lookup(lookup(&[(KEEPALIVE_ENV, "0")])).is_err());
    }

    #[test]
    fn refresh_endpoint_follows_role() {
        let endpoints = AuthEndpoints::default();
        assert_eq!(endpoints.refresh_for(Some(Role::Admin)), "/admin/refresh");
        assert_eq!(endpoints.refresh_for(Some(Role::Student)), "/api/auth/refresh");
        assert_eq!(endpoints.refresh_for(Some(Role::Fa)), "/api/auth/refresh");
        assert_eq!(endpoints.refresh_for(None), "/api/auth/refresh");
        assert_eq!(endpoints.login_page_for(Some(Role::Admin)), "/admin/login");
        assert_eq!(endpoints.login_page_for(Some(Role::Fa)), "/login");
    }

    #[test]
    fn skip_list_covers_auth_endpoints_only() {
        let endpoints = AuthEndpoints::default();
        assert!(endpoints.skips_refresh("/api/auth/login-student"));
        assert!(endpoints.skips_refresh("/admin/login?captchaToken=abc"));
        assert!(endpoints.skips_refresh("http://localhost:8080/admin/refresh"));
        assert!(endpoints.skips_refresh("/api/auth/logout"));
        assert!(!endpoints.skips_refresh("/api/student/activities"));
        assert!(!endpoints.skips_refresh("/admin/login-history"));
    }
}
