// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Client error type.
//!
//! Variants carry string context rather than source errors so that a single
//! refresh failure can be cloned out to every request waiting on it.

use reqwest::StatusCode;

use crate::client::{ApiRequest, ApiResponse};

/// Longest response body kept in a [`ClientError::Status`].
const MAX_ERROR_BODY: usize = 2048;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    #[error("client configuration invalid: {0}")]
    Config(String),

    #[error("{method} {path} failed: {message}")]
    Network {
        method: String,
        path: String,
        message: String,
    },

    #[error("{method} {path} returned {status}")]
    Status {
        method: String,
        path: String,
        status: StatusCode,
        body: String,
    },

    #[error("session refresh failed: {0}")]
    RefreshFailed(String),

    #[error("response was invalid: {0}")]
    InvalidResponse(String),

    #[error("identity store error: {0}")]
    Storage(String),
}

impl ClientError {
    /// Build a network error for a request that never got a response.
    pub fn network(request: &ApiRequest, message: impl Into<String>) -> Self {
        ClientError::Network {
            method: request.method.to_string(),
            path: request.path.clone(),
            message: message.into(),
        }
    }

    /// Build a status error from a non-success response.
    pub fn from_response(request: &ApiRequest, response: &ApiResponse) -> Self {
        let mut body = response.text();
        if body.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }
        ClientError::Status {
            method: request.method.to_string(),
            path: request.path.clone(),
            status: response.status,
            body,
        }
    }

    /// HTTP status carried by this error, if the server answered.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True when the failure ended the session (refresh could not recover it).
    pub fn is_session_terminal(&self) -> bool {
        matches!(self, ClientError::RefreshFailed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderMap;

    #[test]
    fn status_error_keeps_request_context() {
        let request = ApiRequest::post("/api/student/requests");
        let response = ApiResponse::new(StatusCode::BAD_REQUEST, HeaderMap::new(), b"bad".to_vec());

        let err = ClientError::from_response(&request, &response);
        assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));
        assert_eq!(err.to_string(), "POST /api/student/requests returned 400 Bad Request");
        match err {
            ClientError::Status { body, .. } => assert_eq!(body, "bad"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn long_bodies_are_truncated() {
        let request = ApiRequest::get("/big");
        let response = ApiResponse::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            HeaderMap::new(),
            "é".repeat(MAX_ERROR_BODY).into_bytes(),
        );

        match ClientError::from_response(&request, &response) {
            ClientError::Status { body, .. } => assert!(body.len() <= MAX_ERROR_BODY),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn only_refresh_failures_are_terminal() {
        assert!(ClientError::RefreshFailed("gone".into()).is_session_terminal());
        assert!(!ClientError::network(&ApiRequest::get("/x"), "refused").is_session_terminal());
        assert_eq!(ClientError::Config("x".into()).status(), None);
    }
}
