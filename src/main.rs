// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use stellar_wallet_core::config::WalletConfig;
use stellar_wallet_core::keys::{AccountKeyStore, AuthStatus, AuthWatcher, Sep5Deriver};
use stellar_wallet_core::ledger::{HorizonLedger, LedgerService};
use stellar_wallet_core::storage::FileStore;
use stellar_wallet_core::telemetry::{init_tracing, LogFormat};
use stellar_wallet_core::WalletResult;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        init_tracing(LogFormat::default());
        error!(error = %e, "Wallet daemon failed");
        std::process::exit(1);
    }
}

async fn run() -> WalletResult<()> {
    let config = WalletConfig::from_env()?;
    init_tracing(config.log_format);

    let paths = config.storage_paths();
    let data = Arc::new(FileStore::open(paths.plaintext_dir())?);
    let secure = Arc::new(FileStore::open(paths.secure_dir())?);
    data.health_check()?;
    secure.health_check()?;
    info!(data_dir = %paths.root().display(), "Opened wallet storage");

    let store = Arc::new(AccountKeyStore::new(
        data,
        secure,
        Arc::new(Sep5Deriver),
        config.keystore_config(),
    ));
    let network = store.active_network().await?;
    let status = store.auth_status().await?;
    info!(network = %network, status = ?status, "Wallet state loaded");

    let ledger = HorizonLedger::new()?.with_endpoints(network, config.ledger_endpoints());
    if status == AuthStatus::Authenticated {
        if let Some(account) = store.accounts().active().await? {
            match ledger.load_account(network, &account.public_key).await {
                Ok(sequence) => {
                    info!(public_key = %account.public_key, sequence, "Active account reachable")
                }
                Err(e) => warn!(public_key = %account.public_key, error = %e, "Active account not loaded"),
            }
        }
    }
    if config.project_id.is_none() {
        info!("No relay project id configured, remote signing disabled");
    }

    let shutdown = CancellationToken::new();
    let watcher = AuthWatcher::new(store.clone()).with_interval(config.auth_check_interval);
    let handle = tokio::spawn(watcher.run(shutdown.clone()));

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutting down");
    shutdown.cancel();
    if let Err(e) = handle.await {
        warn!(error = %e, "Session watcher task failed");
    }
    Ok(())
}
