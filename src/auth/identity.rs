// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Signed-in identity and where it is kept.
//!
//! The identity is the only session state the client reads directly: the
//! role picks the refresh endpoint and the login page to fall back to.
//! Credentials themselves stay in the transport's cookie jar.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use super::roles::Role;
use crate::error::ClientError;

/// Identity descriptor written at login.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub role: Role,

    /// Profile fields returned by the login endpoint, kept verbatim.
    #[serde(flatten)]
    pub profile: Map<String, Value>,
}

impl Identity {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            profile: Map::new(),
        }
    }

    /// Build from a login response body. The body's own `role` field, if
    /// any, is replaced by `role`.
    pub fn from_profile(role: Role, profile: Value) -> Result<Self, ClientError> {
        let Value::Object(mut profile) = profile else {
            return Err(ClientError::InvalidResponse(
                "login response is not a JSON object".to_string(),
            ));
        };
        profile.remove("role");
        Ok(Self { role, profile })
    }

    pub fn email(&self) -> Option<&str> {
        self.profile.get("email").and_then(Value::as_str)
    }

    pub fn name(&self) -> Option<&str> {
        self.profile.get("name").and_then(Value::as_str)
    }
}

/// Storage for the identity descriptor.
pub trait IdentityStore: Send + Sync {
    fn load(&self) -> Option<Identity>;
    fn save(&self, identity: &Identity) -> Result<(), ClientError>;
    fn clear(&self);
}

/// Process-local identity store.
#[derive(Debug, Default)]
pub struct MemoryIdentityStore {
    identity: RwLock<Option<Identity>>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_identity(identity: Identity) -> Self {
        Self {
            identity: RwLock::new(Some(identity)),
        }
    }
}

impl IdentityStore for MemoryIdentityStore {
    fn load(&self) -> Option<Identity> {
        self.identity
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn save(&self, identity: &Identity) -> Result<(), ClientError> {
        *self.identity.write().unwrap_or_else(|e| e.into_inner()) = Some(identity.clone());
        Ok(())
    }

    fn clear(&self) {
        *self.identity.write().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

/// Identity persisted as a JSON file so it survives restarts.
#[derive(Debug, Clone)]
pub struct FileIdentityStore {
    path: PathBuf,
}

impl FileIdentityStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl IdentityStore for FileIdentityStore {
    /// A missing file means signed out. An unreadable or corrupt file is
    /// logged and also treated as signed out.
    fn load(&self) -> Option<Identity> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read identity file");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(identity) => Some(identity),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring unparseable identity file");
                None
            }
        }
    }

    fn save(&self, identity: &Identity) -> Result<(), ClientError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                ClientError::Storage(format!("failed to create {}: {e}", parent.display()))
            })?;
        }
        let json = serde_json::to_vec_pretty(identity)
            .map_err(|e| ClientError::Storage(format!("failed to encode identity: {e}")))?;
        fs::write(&self.path, json).map_err(|e| {
            ClientError::Storage(format!("failed to write {}: {e}", self.path.display()))
        })
    }

    fn clear(&self) {
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "Failed to remove identity file");
            }
        }
    }
}
