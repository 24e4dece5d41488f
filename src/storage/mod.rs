// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Key/Value Storage
//!
//! The wallet core persists everything through a minimal string key/value
//! contract. Two stores are used side by side:
//!
//! - a **plaintext** store for non-secret configuration (account list,
//!   active account, session expiration marker, active network)
//! - a **secure** store for secret material (hash key, temporary store
//!   ciphertext, password-encrypted key records)
//!
//! ## Storage Layout
//!
//! ```text
//! plaintext/
//!   accountList          # JSON array of accounts
//!   activeAccountId      # account id
//!   hashKeyExpiresAt     # epoch millis
//!   activeNetwork        # PUBLIC | TESTNET | FUTURENET
//! secure/
//!   hashKey              # {"hashKey": b64, "salt": b64}
//!   temporaryStore       # vault bundle (opaque)
//!   keystoreIndex        # JSON array of stored key ids
//!   keystore.{id}        # password-encrypted key record
//! ```
//!
//! Both [`MemoryStore`] and [`FileStore`] implement [`KeyValueStore`]; the
//! platform keychain of a host application can be plugged in the same way.

pub mod file_store;
pub mod memory;
pub mod paths;

use async_trait::async_trait;

pub use file_store::{FileStore, StorageError, StorageResult};
pub use memory::MemoryStore;
pub use paths::StoragePaths;

/// Storage key names shared by the key store and its session helpers.
pub mod keys {
    /// Plaintext: JSON array of [`crate::keys::Account`].
    pub const ACCOUNT_LIST: &str = "accountList";
    /// Plaintext: id of the selected account.
    pub const ACTIVE_ACCOUNT_ID: &str = "activeAccountId";
    /// Plaintext: hash key expiration, epoch milliseconds.
    pub const HASH_KEY_EXPIRES_AT: &str = "hashKeyExpiresAt";
    /// Plaintext: selected network.
    pub const ACTIVE_NETWORK: &str = "activeNetwork";

    /// Secure: serialized hash key and salt.
    pub const HASH_KEY: &str = "hashKey";
    /// Secure: encrypted temporary store.
    pub const TEMPORARY_STORE: &str = "temporaryStore";
    /// Secure: ids of every stored key record.
    pub const KEYSTORE_INDEX: &str = "keystoreIndex";

    /// Secure: key record for a single account.
    pub fn keystore_entry(id: &str) -> String {
        format!("keystore.{id}")
    }
}

/// Minimal asynchronous string key/value store.
///
/// `get` returns `Ok(None)` for a missing key. `remove` on a missing key is
/// not an error.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> StorageResult<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    async fn remove(&self, key: &str) -> StorageResult<()>;
}
