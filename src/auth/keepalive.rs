// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Session Keep-Alive
//!
//! Background task that refreshes the session on a fixed interval while
//! someone is signed in, so the access cookie rarely expires mid-request.
//!
//! The refresh joins the guard's single flight: a keep-alive tick that
//! lands while requests are already refreshing does not add a second call.
//! A failed refresh ends the session the same way a failed 401 recovery
//! does.
//!
//! ## Shutdown
//!
//! Stopped through a `tokio_util::sync::CancellationToken`.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::{GuardedClient, ReqwestTransport, Transport};
use crate::config::DEFAULT_KEEPALIVE_SECS;

pub struct SessionKeepAlive<T = ReqwestTransport> {
    client: GuardedClient<T>,
    interval: Duration,
}

impl<T: Transport> SessionKeepAlive<T> {
    pub fn new(client: GuardedClient<T>) -> Self {
        Self {
            client,
            interval: Duration::from_secs(DEFAULT_KEEPALIVE_SECS),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Run until the cancellation token is triggered.
    ///
    /// ```rust,ignore
    /// tokio::spawn(keepalive.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Session keep-alive starting"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {},
                _ = shutdown.cancelled() => {
                    info!("Session keep-alive shutting down");
                    return;
                }
            }

            self.tick().await;
        }
    }

    async fn tick(&self) {
        let Some(identity) = self.client.identity() else {
            debug!("Keep-alive: nobody signed in");
            return;
        };

        match self.client.refresh_session().await {
            Ok(()) => debug!(role = %identity.role, "Keep-alive: session refreshed"),
            Err(err) => warn!(
                role = %identity.role,
                error = %err,
                "Keep-alive: refresh failed, session ended"
            ),
        }
    }
}
