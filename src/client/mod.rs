// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Portal HTTP Client
//!
//! All portal API traffic goes through [`GuardedClient`], which sits between
//! callers and a [`Transport`]:
//!
//! ```text
//! caller ──▶ GuardedClient ──▶ Transport (reqwest + cookie jar) ──▶ backend
//!                 │
//!                 ├─ CSRF header on mutations, rolled tokens adopted
//!                 ├─ 401 → single-flight session refresh → replay
//!                 └─ 403 → one CSRF refresh → replay
//! ```
//!
//! When the session cannot be recovered the [`Navigator`] is told which
//! login page to show.

pub mod guard;
pub mod navigator;
pub mod request;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use guard::GuardedClient;
pub use navigator::{LogNavigator, Navigator};
pub use request::{ApiRequest, ApiResponse, JSON_CONTENT_TYPE};
pub use transport::{ReqwestTransport, Transport};
