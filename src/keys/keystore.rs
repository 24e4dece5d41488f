// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Long-term key records, each sealed with the user's password.
//!
//! These survive a lock and are what `sign_in` unlocks. The plaintext of a
//! record is `{"privateKey": "S...", "mnemonicPhrase": "..."}`.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use zeroize::{Zeroize, Zeroizing};

use crate::storage::{keys, KeyValueStore, StorageError, StorageResult};
use crate::vault::{PasswordSealed, PasswordVault, VaultError};

use super::{KeyPair, KeyStoreError, KeyStoreResult};

/// Record persisted in secure storage under `keystore.{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredKey {
    pub id: String,
    pub public_key: String,
    pub encrypted: String,
    pub salt: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeyPayload {
    private_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    mnemonic_phrase: Option<String>,
}

impl Drop for KeyPayload {
    fn drop(&mut self) {
        self.private_key.zeroize();
        self.mnemonic_phrase.zeroize();
    }
}

/// Decrypted contents of a [`StoredKey`].
pub struct UnlockedKey {
    pub id: String,
    pub public_key: String,
    pub private_key: Zeroizing<String>,
    pub mnemonic_phrase: Option<Zeroizing<String>>,
}

impl fmt::Debug for UnlockedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnlockedKey")
            .field("id", &self.id)
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub struct KeyManager {
    secure: Arc<dyn KeyValueStore>,
    vault: PasswordVault,
}

impl KeyManager {
    pub fn new(secure: Arc<dyn KeyValueStore>, vault: PasswordVault) -> Self {
        Self { secure, vault }
    }

    /// Seal and persist a key. Returns the newly assigned account id.
    pub async fn store_key(
        &self,
        keypair: &KeyPair,
        mnemonic_phrase: Option<&str>,
        password: &str,
    ) -> KeyStoreResult<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let payload = KeyPayload {
            private_key: keypair.secret_key().to_string(),
            mnemonic_phrase: mnemonic_phrase.map(str::to_string),
        };
        let plaintext = Zeroizing::new(serde_json::to_vec(&payload)?);
        let sealed = self
            .vault
            .encrypt_with_password_async(plaintext, password)
            .await?;

        let record = StoredKey {
            id: id.clone(),
            public_key: keypair.public_key().to_string(),
            encrypted: sealed.bundle,
            salt: sealed.salt,
            created_at: Utc::now(),
        };
        self.secure
            .set(&keys::keystore_entry(&id), &serde_json::to_string(&record)?)
            .await?;

        let mut index = self.ids().await?;
        index.push(id.clone());
        self.secure
            .set(keys::KEYSTORE_INDEX, &serde_json::to_string(&index)?)
            .await?;

        debug!(key_id = %id, "Stored sealed key record");
        Ok(id)
    }

    pub async fn record(&self, id: &str) -> KeyStoreResult<Option<StoredKey>> {
        match self.secure.get(&keys::keystore_entry(id)).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Decrypt the record for `id`.
    ///
    /// # Errors
    ///
    /// [`KeyStoreError::InvalidPassword`] if the password does not open it,
    /// [`KeyStoreError::AccountNotFound`] if no record exists.
    pub async fn load_key(&self, id: &str, password: &str) -> KeyStoreResult<UnlockedKey> {
        let record = self
            .record(id)
            .await?
            .ok_or_else(|| KeyStoreError::AccountNotFound(id.to_string()))?;

        let sealed = PasswordSealed {
            bundle: record.encrypted,
            salt: record.salt,
        };
        let plaintext = self
            .vault
            .decrypt_with_password_async(sealed, password)
            .await
            .map_err(|e| match e {
                VaultError::DecryptionFailed => KeyStoreError::InvalidPassword,
                other => KeyStoreError::Vault(other),
            })?;
        let mut payload: KeyPayload = serde_json::from_slice(&plaintext)?;

        Ok(UnlockedKey {
            id: record.id,
            public_key: record.public_key,
            private_key: Zeroizing::new(std::mem::take(&mut payload.private_key)),
            mnemonic_phrase: payload.mnemonic_phrase.take().map(Zeroizing::new),
        })
    }

    /// Ids of every stored record, in insertion order.
    pub async fn ids(&self) -> KeyStoreResult<Vec<String>> {
        match self.secure.get(keys::KEYSTORE_INDEX).await? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    /// Remove every record and the index. Each removal is attempted even when
    /// an earlier one fails; the per-key outcomes are returned.
    pub async fn purge(&self) -> Vec<(String, StorageResult<()>)> {
        let ids = match self.ids().await {
            Ok(ids) => ids,
            Err(e) => {
                // Records cannot be located without the index, so it stays.
                warn!(error = %e, "Key index unreadable during purge");
                let err = match e {
                    KeyStoreError::StorageUnavailable(storage) => storage,
                    other => StorageError::IntegrityViolation(other.to_string()),
                };
                return vec![(keys::KEYSTORE_INDEX.to_string(), Err(err))];
            }
        };

        let mut outcomes = Vec::with_capacity(ids.len() + 1);
        for id in ids {
            let key = keys::keystore_entry(&id);
            let result = self.secure.remove(&key).await;
            outcomes.push((key, result));
        }
        let result = self.secure.remove(keys::KEYSTORE_INDEX).await;
        outcomes.push((keys::KEYSTORE_INDEX.to_string(), result));
        outcomes
    }
}
