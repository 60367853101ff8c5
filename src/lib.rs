// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Activity Points Portal - Session-Guarded API Client
//!
//! HTTP client for the activity points portal backend that keeps CSRF
//! tokens current and transparently recovers expired cookie sessions.
//!
//! ## Modules
//!
//! - `client` - Guarded HTTP client, transport and request values
//! - `auth` - Roles, identity, CSRF cache and session flows
//! - `config` - Endpoint paths and environment configuration
//! - `error` - Client error type

pub mod auth;
pub mod client;
pub mod config;
pub mod error;

pub use client::GuardedClient;
pub use config::ClientConfig;
pub use error::ClientError;
