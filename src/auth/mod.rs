// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Client-side session state for the activity points portal.
//!
//! ## Session Model
//!
//! 1. The backend issues an access cookie and a CSRF token on login
//! 2. The cookie lives in the transport's jar and is never read here
//! 3. The CSRF token is cached and sent as `X-CSRF-Token` on mutations
//! 4. The identity (role + profile) is stored to pick the refresh
//!    endpoint and the login page when the session ends
//!
//! Admin sessions use `/admin/*` endpoints; student and FA sessions share
//! `/api/auth/*`.

pub mod access;
pub mod csrf;
pub mod identity;
pub mod keepalive;
pub mod roles;
pub mod session;

pub use access::{check_access, Access};
pub use csrf::{CsrfCache, CsrfCookie, CSRF_HEADER};
pub use identity::{FileIdentityStore, Identity, IdentityStore, MemoryIdentityStore};
pub use keepalive::SessionKeepAlive;
pub use roles::Role;
pub use session::Session;
