// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet lifecycle on top of the account, key and session stores.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use chrono::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use zeroize::Zeroizing;

use crate::ledger::{LedgerError, LedgerService};
use crate::network::Network;
use crate::storage::{keys, KeyValueStore, StorageError};
use crate::vault::{KdfParams, PasswordVault};

use super::accounts::{default_account_name, AccountRepository};
use super::derivation::{normalize_phrase, KeyPair, MnemonicDeriver, DEFAULT_DERIVATION_INDEX};
use super::keystore::{KeyManager, UnlockedKey};
use super::session::{SessionStore, TemporaryStore, DEFAULT_HASH_KEY_TTL_SECS};
use super::{Account, AuthStatus, KeyStoreError, KeyStoreResult};

/// Upper bound when searching for an unused derivation index.
pub const MAX_DERIVATION_INDEX: u32 = 50;

#[derive(Debug, Clone, Copy)]
pub struct KeyStoreConfig {
    pub hash_key_ttl: Duration,
    pub default_network: Network,
    pub kdf: KdfParams,
}

impl Default for KeyStoreConfig {
    fn default() -> Self {
        Self {
            hash_key_ttl: Duration::seconds(DEFAULT_HASH_KEY_TTL_SECS),
            default_network: Network::Testnet,
            kdf: KdfParams::STANDARD,
        }
    }
}

/// The selected account together with its decrypted secret.
pub struct ActiveAccount {
    pub account: Account,
    pub private_key: Zeroizing<String>,
}

impl fmt::Debug for ActiveAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveAccount")
            .field("account", &self.account)
            .finish_non_exhaustive()
    }
}

/// Account key store.
///
/// `data` holds plaintext configuration, `secure` holds secrets. Both may be
/// the same backend in tests.
///
/// Every operation that writes wallet state holds `write_lock` from its first
/// read to its last write. Reads that only inspect state do not take it.
pub struct AccountKeyStore {
    data: Arc<dyn KeyValueStore>,
    secure: Arc<dyn KeyValueStore>,
    deriver: Arc<dyn MnemonicDeriver>,
    accounts: AccountRepository,
    key_manager: KeyManager,
    session: SessionStore,
    config: KeyStoreConfig,
    write_lock: Mutex<()>,
}

impl AccountKeyStore {
    pub fn new(
        data: Arc<dyn KeyValueStore>,
        secure: Arc<dyn KeyValueStore>,
        deriver: Arc<dyn MnemonicDeriver>,
        config: KeyStoreConfig,
    ) -> Self {
        let vault = PasswordVault::new(config.kdf);
        Self {
            accounts: AccountRepository::new(data.clone()),
            key_manager: KeyManager::new(secure.clone(), vault),
            session: SessionStore::new(data.clone(), secure.clone(), vault, config.hash_key_ttl),
            data,
            secure,
            deriver,
            config,
            write_lock: Mutex::new(()),
        }
    }

    pub fn accounts(&self) -> &AccountRepository {
        &self.accounts
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    // ========== Wallet Creation ==========

    /// Create a wallet from a freshly generated phrase.
    pub async fn sign_up(&self, mnemonic_phrase: &str, password: &str) -> KeyStoreResult<Account> {
        self.create_wallet(mnemonic_phrase, password, false).await
    }

    /// Create a wallet from an existing phrase. `imported` is provenance only.
    pub async fn import_wallet(
        &self,
        mnemonic_phrase: &str,
        password: &str,
    ) -> KeyStoreResult<Account> {
        self.create_wallet(mnemonic_phrase, password, true).await
    }

    async fn create_wallet(
        &self,
        mnemonic_phrase: &str,
        password: &str,
        imported: bool,
    ) -> KeyStoreResult<Account> {
        let _guard = self.write_lock.lock().await;
        let result = self.try_create_wallet(mnemonic_phrase, password, imported).await;

        if let Err(e) = &result {
            warn!(imported, error = %e, "Wallet creation failed, rolling back");
            if let Err(cleanup) = self.erase_wallet().await {
                error!(error = %cleanup, "Rollback after failed wallet creation was incomplete");
            }
        }
        result
    }

    async fn try_create_wallet(
        &self,
        mnemonic_phrase: &str,
        password: &str,
        imported: bool,
    ) -> KeyStoreResult<Account> {
        let phrase = Zeroizing::new(normalize_phrase(mnemonic_phrase));
        let keypair = self.deriver.derive(&phrase, DEFAULT_DERIVATION_INDEX)?;

        // A new wallet replaces whatever was on the device.
        self.erase_wallet().await?;

        let network = self.active_network().await?;
        let id = self
            .key_manager
            .store_key(&keypair, Some(phrase.as_str()), password)
            .await?;

        let account = Account {
            id: id.clone(),
            name: default_account_name(1),
            public_key: keypair.public_key().to_string(),
            imported,
            network,
            derivation_index: Some(DEFAULT_DERIVATION_INDEX),
        };
        self.accounts.save(std::slice::from_ref(&account)).await?;
        self.accounts.set_active(&id).await?;

        let mut temporary = TemporaryStore::new(Some(phrase.as_str().to_string()));
        temporary
            .private_keys
            .insert(id.clone(), keypair.secret_key().to_string());
        self.session.create(password, temporary).await?;

        info!(account_id = %id, imported, %network, "Wallet created");
        Ok(account)
    }

    // ========== Session ==========

    /// Erase the wallet from this device.
    ///
    /// Removes the hash key, temporary store, expiration marker, account list
    /// and active-account pointer concurrently, then every stored key record.
    /// Every removal is attempted. Plaintext failures are logged; any secure
    /// failure is returned as [`KeyStoreError::SecureEraseFailed`].
    pub async fn logout(&self) -> KeyStoreResult<()> {
        let _guard = self.write_lock.lock().await;
        self.erase_wallet().await
    }

    async fn erase_wallet(&self) -> KeyStoreResult<()> {
        let (hash_key, temp_store, expires, list, active) = tokio::join!(
            self.secure.remove(keys::HASH_KEY),
            self.secure.remove(keys::TEMPORARY_STORE),
            self.data.remove(keys::HASH_KEY_EXPIRES_AT),
            self.data.remove(keys::ACCOUNT_LIST),
            self.data.remove(keys::ACTIVE_ACCOUNT_ID),
        );

        let plaintext = [
            (keys::HASH_KEY_EXPIRES_AT, expires),
            (keys::ACCOUNT_LIST, list),
            (keys::ACTIVE_ACCOUNT_ID, active),
        ];
        for (key, result) in &plaintext {
            if let Err(e) = result {
                warn!(key = *key, error = %e, "Failed to clear plaintext entry during logout");
            }
        }

        let mut secure: Vec<(String, Result<(), StorageError>)> = vec![
            (keys::HASH_KEY.to_string(), hash_key),
            (keys::TEMPORARY_STORE.to_string(), temp_store),
        ];
        secure.extend(self.key_manager.purge().await);

        let failures: Vec<String> = secure
            .iter()
            .filter_map(|(key, result)| result.as_ref().err().map(|e| format!("{key}: {e}")))
            .collect();

        if failures.is_empty() {
            info!("Wallet data cleared");
            Ok(())
        } else {
            error!(failures = ?failures, "Secret material could not be erased");
            Err(KeyStoreError::SecureEraseFailed(failures.join("; ")))
        }
    }

    /// Drop the session but keep accounts. `sign_in` restores it.
    pub async fn lock(&self) -> KeyStoreResult<()> {
        let _guard = self.write_lock.lock().await;
        self.session.clear().await?;
        info!("Wallet locked");
        Ok(())
    }

    /// Lock the wallet if its session has lapsed, checked and applied under
    /// the write lock so a concurrent `sign_in` is never undone. Returns the
    /// status observed before locking.
    pub async fn lock_if_expired(&self) -> KeyStoreResult<AuthStatus> {
        let _guard = self.write_lock.lock().await;
        let status = self.auth_status().await?;
        if status == AuthStatus::HashKeyExpired && self.session.expires_at().await?.is_some() {
            self.session.clear().await?;
            info!("Session expired, wallet locked");
        }
        Ok(status)
    }

    /// True only if the temporary store exists, is unexpired and decrypts.
    pub async fn get_is_authenticated(&self) -> bool {
        self.session.is_valid().await
    }

    pub async fn auth_status(&self) -> KeyStoreResult<AuthStatus> {
        if self.accounts.list().await?.is_empty() {
            return Ok(AuthStatus::NotAuthenticated);
        }
        if self.get_is_authenticated().await {
            Ok(AuthStatus::Authenticated)
        } else {
            Ok(AuthStatus::HashKeyExpired)
        }
    }

    /// Unlock a locked wallet with its password.
    ///
    /// Every account's secret is recovered from its key record, or re-derived
    /// from the phrase when the record is missing.
    pub async fn sign_in(&self, password: &str) -> KeyStoreResult<Account> {
        let _guard = self.write_lock.lock().await;
        let accounts = self.accounts.list().await?;
        let active = self.accounts.active().await?.ok_or(KeyStoreError::NoWallet)?;

        let active_key = self.key_manager.load_key(&active.id, password).await?;
        let mut mnemonic = active_key.mnemonic_phrase.clone();
        let mut unlocked: Vec<UnlockedKey> = vec![active_key];

        for account in accounts.iter().filter(|a| a.id != active.id) {
            match self.key_manager.load_key(&account.id, password).await {
                Ok(key) => {
                    if mnemonic.is_none() {
                        mnemonic = key.mnemonic_phrase.clone();
                    }
                    unlocked.push(key);
                }
                Err(KeyStoreError::AccountNotFound(_)) => {
                    debug!(account_id = %account.id, "No key record, will re-derive");
                }
                Err(e) => return Err(e),
            }
        }

        let mut temporary = TemporaryStore::new(mnemonic.as_ref().map(|m| m.as_str().to_string()));
        for key in &unlocked {
            temporary
                .private_keys
                .insert(key.id.clone(), key.private_key.as_str().to_string());
        }
        for account in &accounts {
            if temporary.private_keys.contains_key(&account.id) {
                continue;
            }
            let (Some(index), Some(phrase)) = (account.derivation_index, mnemonic.as_ref()) else {
                warn!(account_id = %account.id, "Account key unrecoverable on sign-in");
                continue;
            };
            let keypair = self.deriver.derive(phrase, index)?;
            if keypair.public_key() != account.public_key {
                return Err(KeyStoreError::CorruptData(format!(
                    "derived key for {} does not match stored public key",
                    account.id
                )));
            }
            temporary
                .private_keys
                .insert(account.id.clone(), keypair.secret_key().to_string());
        }

        self.session.create(password, temporary).await?;
        info!(account_id = %active.id, accounts = accounts.len(), "Signed in");
        Ok(active)
    }

    // ========== Accounts ==========

    pub async fn all_accounts(&self) -> KeyStoreResult<Vec<Account>> {
        self.accounts.list().await
    }

    /// The selected account and its secret. Requires an authenticated session.
    pub async fn active_account(&self) -> KeyStoreResult<ActiveAccount> {
        let temporary = self.open_session().await?;
        let account = self.accounts.active().await?.ok_or(KeyStoreError::NoWallet)?;
        let private_key = temporary
            .private_key(&account.id)
            .ok_or(KeyStoreError::NotAuthenticated)?;
        Ok(ActiveAccount {
            account,
            private_key,
        })
    }

    /// Derive the next account from the wallet phrase.
    pub async fn create_account(&self, password: &str) -> KeyStoreResult<Account> {
        let _guard = self.write_lock.lock().await;
        let mut temporary = self.open_session().await?;
        self.verify_password(password).await?;
        let phrase = temporary
            .mnemonic_phrase
            .clone()
            .map(Zeroizing::new)
            .ok_or(KeyStoreError::MnemonicUnavailable)?;

        let accounts = self.accounts.list().await?;
        let used_indices: HashSet<u32> =
            accounts.iter().filter_map(|a| a.derivation_index).collect();
        let known_keys: HashSet<&str> = accounts.iter().map(|a| a.public_key.as_str()).collect();

        let mut next = None;
        for index in 0..MAX_DERIVATION_INDEX {
            if used_indices.contains(&index) {
                continue;
            }
            let keypair = self.deriver.derive(&phrase, index)?;
            if !known_keys.contains(keypair.public_key()) {
                next = Some((index, keypair));
                break;
            }
        }
        let (index, keypair) = next.ok_or(KeyStoreError::DerivationExhausted(MAX_DERIVATION_INDEX))?;

        let account = self
            .add_account(&keypair, Some(phrase.as_str()), password, Some(index), false, &mut temporary)
            .await?;
        info!(account_id = %account.id, derivation_index = index, "Account created");
        Ok(account)
    }

    /// Add an account from a raw `S...` secret key.
    pub async fn import_secret_key(
        &self,
        secret_key: &str,
        password: &str,
    ) -> KeyStoreResult<Account> {
        let _guard = self.write_lock.lock().await;
        let mut temporary = self.open_session().await?;
        self.verify_password(password).await?;

        let keypair = KeyPair::from_secret_key(secret_key)?;
        if self
            .accounts
            .list()
            .await?
            .iter()
            .any(|a| a.public_key == keypair.public_key())
        {
            return Err(KeyStoreError::DuplicateAccount(
                keypair.public_key().to_string(),
            ));
        }

        let account = self
            .add_account(&keypair, None, password, None, true, &mut temporary)
            .await?;
        info!(account_id = %account.id, "Secret key imported");
        Ok(account)
    }

    pub async fn rename_account(&self, public_key: &str, name: &str) -> KeyStoreResult<Account> {
        let _guard = self.write_lock.lock().await;
        self.accounts.rename(public_key, name).await
    }

    pub async fn select_account(&self, public_key: &str) -> KeyStoreResult<Account> {
        let _guard = self.write_lock.lock().await;
        let account = self.accounts.find_by_public_key(public_key).await?;
        self.accounts.set_active(&account.id).await?;
        debug!(account_id = %account.id, "Account selected");
        Ok(account)
    }

    pub async fn active_network(&self) -> KeyStoreResult<Network> {
        match self.data.get(keys::ACTIVE_NETWORK).await? {
            Some(raw) => raw.parse::<Network>().map_err(KeyStoreError::CorruptData),
            None => Ok(self.config.default_network),
        }
    }

    pub async fn select_network(&self, network: Network) -> KeyStoreResult<()> {
        let _guard = self.write_lock.lock().await;
        self.data.set(keys::ACTIVE_NETWORK, network.as_str()).await?;
        info!(%network, "Network selected");
        Ok(())
    }

    /// Find funded accounts on the public network derived from the wallet
    /// phrase at indices `0..count` and add the ones not yet known.
    pub async fn discover_accounts(
        &self,
        ledger: &dyn LedgerService,
        password: &str,
        count: u32,
    ) -> KeyStoreResult<Vec<Account>> {
        let _guard = self.write_lock.lock().await;
        let mut temporary = self.open_session().await?;
        self.verify_password(password).await?;
        let phrase = temporary
            .mnemonic_phrase
            .clone()
            .map(Zeroizing::new)
            .ok_or(KeyStoreError::MnemonicUnavailable)?;

        let known: HashSet<String> = self
            .accounts
            .list()
            .await?
            .into_iter()
            .map(|a| a.public_key)
            .collect();

        let mut added = Vec::new();
        for index in 0..count.min(MAX_DERIVATION_INDEX) {
            let keypair = self.deriver.derive(&phrase, index)?;
            if known.contains(keypair.public_key()) {
                continue;
            }
            match ledger.load_account(Network::Public, keypair.public_key()).await {
                Ok(_) => {
                    let account = self
                        .add_account(&keypair, Some(phrase.as_str()), password, Some(index), false, &mut temporary)
                        .await?;
                    added.push(account);
                }
                Err(LedgerError::AccountNotFound(_)) => {}
                Err(e) => {
                    warn!(derivation_index = index, error = %e, "Account discovery lookup failed");
                }
            }
        }

        info!(discovered = added.len(), "Account discovery finished");
        Ok(added)
    }

    // ========== Internals ==========

    async fn open_session(&self) -> KeyStoreResult<TemporaryStore> {
        match self.session.open().await {
            Ok(Some(store)) => Ok(store),
            Ok(None) => Err(KeyStoreError::NotAuthenticated),
            Err(e) => {
                debug!(error = %e, "Session unreadable");
                Err(KeyStoreError::NotAuthenticated)
            }
        }
    }

    async fn verify_password(&self, password: &str) -> KeyStoreResult<()> {
        let active = self.accounts.active().await?.ok_or(KeyStoreError::NoWallet)?;
        self.key_manager.load_key(&active.id, password).await?;
        Ok(())
    }

    async fn add_account(
        &self,
        keypair: &KeyPair,
        mnemonic_phrase: Option<&str>,
        password: &str,
        derivation_index: Option<u32>,
        imported: bool,
        temporary: &mut TemporaryStore,
    ) -> KeyStoreResult<Account> {
        let network = self.active_network().await?;
        let count = self.accounts.list().await?.len();
        let id = self
            .key_manager
            .store_key(keypair, mnemonic_phrase, password)
            .await?;

        let account = Account {
            id: id.clone(),
            name: default_account_name(count + 1),
            public_key: keypair.public_key().to_string(),
            imported,
            network,
            derivation_index,
        };
        self.accounts.append(account.clone()).await?;
        self.accounts.set_active(&id).await?;

        temporary
            .private_keys
            .insert(id, keypair.secret_key().to_string());
        self.session.update(temporary).await?;
        Ok(account)
    }
}
