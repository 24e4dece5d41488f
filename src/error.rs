// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Crate-level error wrapping every module error.

use thiserror::Error;

use crate::config::ConfigError;
use crate::keys::KeyStoreError;
use crate::ledger::LedgerError;
use crate::sessions::{BrokerError, TransportError};
use crate::storage::StorageError;
use crate::transactions::TransactionError;
use crate::vault::VaultError;

#[derive(Debug, Error)]
pub enum WalletError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Vault(#[from] VaultError),

    #[error(transparent)]
    KeyStore(#[from] KeyStoreError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Transaction(#[from] TransactionError),

    #[error(transparent)]
    Broker(#[from] BrokerError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

pub type WalletResult<T> = Result<T, WalletError>;
