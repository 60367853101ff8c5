// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Route access decisions for the portal's role areas.
//!
//! Admin and student/FA areas are disjoint: an admin is refused the student
//! and FA areas just as a student or FA is refused the admin area.

use super::identity::Identity;
use super::roles::Role;
use crate::config::{AuthEndpoints, UNAUTHORIZED_PAGE};

/// Outcome of an access check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    Granted,
    /// Nobody is signed in; go to this login page.
    Login(String),
    /// Signed in with the wrong role.
    Unauthorized,
}

impl Access {
    pub fn is_granted(&self) -> bool {
        matches!(self, Access::Granted)
    }

    /// Page to navigate to, if access is not granted.
    pub fn redirect_target(&self) -> Option<&str> {
        match self {
            Access::Granted => None,
            Access::Login(target) => Some(target.as_str()),
            Access::Unauthorized => Some(UNAUTHORIZED_PAGE),
        }
    }
}

/// Decide whether `identity` may enter the area reserved for `required`.
pub fn check_access(required: Role, identity: Option<&Identity>, endpoints: &AuthEndpoints) -> Access {
    match identity {
        None => Access::Login(endpoints.login_page_for(Some(required)).to_string()),
        Some(identity) if identity.role == required => Access::Granted,
        Some(_) => Access::Unauthorized,
    }
}
