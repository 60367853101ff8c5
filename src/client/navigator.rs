// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Where the user is sent when the session cannot be recovered.

use tracing::warn;

/// Receives the login page to show after a terminal session failure.
pub trait Navigator: Send + Sync {
    fn redirect(&self, target: &str);
}

impl<F> Navigator for F
where
    F: Fn(&str) + Send + Sync,
{
    fn redirect(&self, target: &str) {
        self(target)
    }
}

/// Navigator that only logs the target.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNavigator;

impl Navigator for LogNavigator {
    fn redirect(&self, target: &str) {
        warn!(target_page = %target, "Session ended, sign-in required");
    }
}
