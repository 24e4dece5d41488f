// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Session Expiry Watcher
//!
//! Background task that notices when the session's expiration marker has
//! elapsed and locks the wallet, so the decrypted keys do not outlive the
//! session even when nobody calls into the key store.
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken`; `main` cancels it on ctrl-c.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{AccountKeyStore, AuthStatus, KeyStoreResult};

/// Default interval between checks.
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(60);

pub struct AuthWatcher {
    store: Arc<AccountKeyStore>,
    interval: Duration,
}

impl AuthWatcher {
    pub fn new(store: Arc<AccountKeyStore>) -> Self {
        Self {
            store,
            interval: DEFAULT_CHECK_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Run until the cancellation token is triggered.
    ///
    /// ```rust,ignore
    /// tokio::spawn(watcher.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Session expiry watcher starting"
        );

        loop {
            if shutdown.is_cancelled() {
                info!("Session expiry watcher shutting down");
                return;
            }

            if let Err(e) = self.check_once().await {
                warn!(error = %e, "Session expiry check failed");
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {},
                _ = shutdown.cancelled() => {
                    info!("Session expiry watcher shutting down");
                    return;
                }
            }
        }
    }

    /// One check. Locks the wallet when the session has lapsed and returns
    /// the status observed before locking.
    pub async fn check_once(&self) -> KeyStoreResult<AuthStatus> {
        let status = self.store.lock_if_expired().await?;
        debug!(status = ?status, "Session check");
        Ok(status)
    }
}
