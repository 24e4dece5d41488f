// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Account Key Store
//!
//! Owns everything that touches private keys at rest:
//!
//! | Piece | Storage | Contents |
//! |-------|---------|----------|
//! | [`accounts::AccountRepository`] | plaintext | ordered account list, active account |
//! | [`keystore::KeyManager`] | secure | password-encrypted long-term key records |
//! | [`session::SessionStore`] | secure + plaintext | hash key, temporary store, expiration |
//!
//! [`AccountKeyStore`] composes them into the wallet lifecycle:
//!
//! ```text
//! LoggedOut --sign_up / import_wallet--> LoggedIn --logout--> LoggedOut
//!                                           |
//!                                  hash key expired / lock
//!                                           v
//!                                        Locked --sign_in--> LoggedIn
//! ```

pub mod accounts;
pub mod derivation;
pub mod keystore;
pub mod session;
pub mod store;
pub mod watcher;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ledger::LedgerError;
use crate::network::Network;
use crate::storage::StorageError;
use crate::vault::VaultError;

pub use accounts::AccountRepository;
pub use derivation::{generate_mnemonic, KeyPair, MnemonicDeriver, Sep5Deriver};
pub use keystore::KeyManager;
pub use session::{SessionStore, TemporaryStore};
pub use store::{AccountKeyStore, ActiveAccount, KeyStoreConfig};
pub use watcher::AuthWatcher;

/// A wallet account as persisted in the plaintext account list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: String,
    pub name: String,
    pub public_key: String,
    /// Provenance only: the wallet came from an existing phrase or key.
    pub imported: bool,
    pub network: Network,
    /// `None` for accounts imported from a raw secret key.
    #[serde(default)]
    pub derivation_index: Option<u32>,
}

/// Coarse authentication state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthStatus {
    /// No wallet on this device.
    NotAuthenticated,
    /// Accounts exist but the session is gone or expired.
    HashKeyExpired,
    Authenticated,
}

#[derive(Debug, Error)]
pub enum KeyStoreError {
    #[error("Invalid mnemonic phrase: {0}")]
    InvalidMnemonic(String),

    #[error("Invalid secret key")]
    InvalidSecretKey,

    #[error("Invalid password")]
    InvalidPassword,

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("No wallet found on this device")]
    NoWallet,

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Account already exists: {0}")]
    DuplicateAccount(String),

    #[error("Invalid account name")]
    InvalidAccountName,

    #[error("Wallet has no mnemonic phrase")]
    MnemonicUnavailable,

    #[error("No free derivation index below {0}")]
    DerivationExhausted(u32),

    #[error("Corrupt stored data: {0}")]
    CorruptData(String),

    /// Secret material may still be on disk.
    #[error("Failed to erase secure storage: {0}")]
    SecureEraseFailed(String),

    #[error(transparent)]
    Vault(#[from] VaultError),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(#[from] StorageError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

pub type KeyStoreResult<T> = Result<T, KeyStoreError>;

impl From<serde_json::Error> for KeyStoreError {
    fn from(e: serde_json::Error) -> Self {
        KeyStoreError::CorruptData(e.to_string())
    }
}
