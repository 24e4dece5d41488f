// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Encrypted session ("temporary store") lifecycle.
//!
//! On sign-in a fresh salt is drawn and the password is stretched into the
//! *hash key*. The hash key encrypts a small JSON document holding the
//! mnemonic and every account's private key. The ciphertext and the hash key
//! live in secure storage; the expiration marker is plaintext so it can be
//! checked without decrypting anything.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use base64ct::{Base64, Encoding};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use zeroize::{Zeroize, Zeroizing};

use crate::storage::{keys, KeyValueStore};
use crate::vault::{self, generate_salt, PasswordVault, SymmetricKey};

use super::{KeyStoreError, KeyStoreResult};

/// Default lifetime of a session, in seconds.
pub const DEFAULT_HASH_KEY_TTL_SECS: i64 = 24 * 60 * 60;

/// Decrypted session contents. Secrets are wiped on drop.
#[derive(Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemporaryStore {
    #[serde(default)]
    pub mnemonic_phrase: Option<String>,
    /// Account id to `S...` secret key.
    #[serde(default)]
    pub private_keys: BTreeMap<String, String>,
    /// Epoch milliseconds.
    pub expiration: i64,
}

impl TemporaryStore {
    pub fn new(mnemonic_phrase: Option<String>) -> Self {
        Self {
            mnemonic_phrase,
            private_keys: BTreeMap::new(),
            expiration: 0,
        }
    }

    pub fn private_key(&self, account_id: &str) -> Option<Zeroizing<String>> {
        self.private_keys
            .get(account_id)
            .map(|k| Zeroizing::new(k.clone()))
    }
}

impl Drop for TemporaryStore {
    fn drop(&mut self) {
        self.mnemonic_phrase.zeroize();
        for key in self.private_keys.values_mut() {
            key.zeroize();
        }
    }
}

impl fmt::Debug for TemporaryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemporaryStore")
            .field("accounts", &self.private_keys.len())
            .field("has_mnemonic", &self.mnemonic_phrase.is_some())
            .field("expiration", &self.expiration)
            .finish()
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HashKeyRecord {
    hash_key: String,
    salt: String,
}

impl Drop for HashKeyRecord {
    fn drop(&mut self) {
        self.hash_key.zeroize();
    }
}

/// Reads and writes the hash key, the encrypted temporary store and the
/// expiration marker.
#[derive(Clone)]
pub struct SessionStore {
    data: Arc<dyn KeyValueStore>,
    secure: Arc<dyn KeyValueStore>,
    vault: PasswordVault,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(
        data: Arc<dyn KeyValueStore>,
        secure: Arc<dyn KeyValueStore>,
        vault: PasswordVault,
        ttl: Duration,
    ) -> Self {
        Self {
            data,
            secure,
            vault,
            ttl,
        }
    }

    /// Derive a new hash key from `password` and persist `store` under it.
    ///
    /// The store's expiration is overwritten with `now + ttl`.
    pub async fn create(&self, password: &str, mut store: TemporaryStore) -> KeyStoreResult<()> {
        let salt = generate_salt();
        let key = self.vault.derive_key_async(password, &salt).await?;
        let expires_at = Utc::now() + self.ttl;
        store.expiration = expires_at.timestamp_millis();

        let record = HashKeyRecord {
            hash_key: Base64::encode_string(key.as_bytes()),
            salt: Base64::encode_string(&salt),
        };
        let serialized = Zeroizing::new(serde_json::to_string(&record)?);
        self.secure.set(keys::HASH_KEY, &serialized).await?;
        self.write_store(&key, &store).await?;
        self.data
            .set(keys::HASH_KEY_EXPIRES_AT, &store.expiration.to_string())
            .await?;

        debug!(expires_at = %expires_at, "Session created");
        Ok(())
    }

    /// Re-encrypt `store` under the current hash key without extending the
    /// session.
    pub async fn update(&self, store: &TemporaryStore) -> KeyStoreResult<()> {
        let key = self
            .load_hash_key()
            .await?
            .ok_or(KeyStoreError::NotAuthenticated)?;
        self.write_store(&key, store).await
    }

    /// Decrypt the temporary store.
    ///
    /// `Ok(None)` when there is no session or it has expired. Decryption
    /// failures are returned as errors; callers that only need a yes/no use
    /// [`SessionStore::is_valid`].
    pub async fn open(&self) -> KeyStoreResult<Option<TemporaryStore>> {
        let now = Utc::now().timestamp_millis();
        match self.expires_at().await? {
            Some(expires_at) if now < expires_at => {}
            _ => return Ok(None),
        }

        let Some(key) = self.load_hash_key().await? else {
            return Ok(None);
        };
        let Some(bundle) = self.secure.get(keys::TEMPORARY_STORE).await? else {
            return Ok(None);
        };

        let plaintext = vault::decrypt(&bundle, &key)?;
        let store: TemporaryStore = serde_json::from_slice(&plaintext)?;
        if now >= store.expiration {
            return Ok(None);
        }
        Ok(Some(store))
    }

    /// True iff the temporary store exists, is unexpired and decrypts.
    /// Never fails.
    pub async fn is_valid(&self) -> bool {
        match self.open().await {
            Ok(store) => store.is_some(),
            Err(e) => {
                debug!(error = %e, "Temporary store could not be opened");
                false
            }
        }
    }

    /// Expiration marker in epoch milliseconds.
    pub async fn expires_at(&self) -> KeyStoreResult<Option<i64>> {
        match self.data.get(keys::HASH_KEY_EXPIRES_AT).await? {
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .map(Some)
                .map_err(|e| KeyStoreError::CorruptData(format!("expiration marker: {e}"))),
            None => Ok(None),
        }
    }

    /// Remove the hash key, temporary store and expiration marker.
    ///
    /// All three removals are attempted; the first failure is returned.
    pub async fn clear(&self) -> KeyStoreResult<()> {
        let (hash_key, temp_store, expires) = tokio::join!(
            self.secure.remove(keys::HASH_KEY),
            self.secure.remove(keys::TEMPORARY_STORE),
            self.data.remove(keys::HASH_KEY_EXPIRES_AT),
        );
        hash_key?;
        temp_store?;
        expires?;
        Ok(())
    }

    async fn load_hash_key(&self) -> KeyStoreResult<Option<SymmetricKey>> {
        let Some(raw) = self.secure.get(keys::HASH_KEY).await? else {
            return Ok(None);
        };
        let raw = Zeroizing::new(raw);
        let record: HashKeyRecord = serde_json::from_str(&raw)?;
        let bytes = Zeroizing::new(
            Base64::decode_vec(&record.hash_key)
                .map_err(|e| KeyStoreError::CorruptData(format!("hash key: {e}")))?,
        );
        Ok(Some(SymmetricKey::from_slice(&bytes)?))
    }

    async fn write_store(&self, key: &SymmetricKey, store: &TemporaryStore) -> KeyStoreResult<()> {
        let plaintext = Zeroizing::new(serde_json::to_vec(store)?);
        let bundle = vault::encrypt(&plaintext, key)?;
        self.secure.set(keys::TEMPORARY_STORE, &bundle).await?;
        Ok(())
    }
}
