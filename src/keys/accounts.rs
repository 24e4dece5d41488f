// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Plaintext account list and active-account pointer.

use std::sync::Arc;

use crate::storage::{keys, KeyValueStore};

use super::{Account, KeyStoreError, KeyStoreResult};

/// Repository for the ordered account list.
#[derive(Clone)]
pub struct AccountRepository {
    store: Arc<dyn KeyValueStore>,
}

impl AccountRepository {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// All accounts in creation order. A missing list is empty.
    pub async fn list(&self) -> KeyStoreResult<Vec<Account>> {
        match self.store.get(keys::ACCOUNT_LIST).await? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    pub async fn save(&self, accounts: &[Account]) -> KeyStoreResult<()> {
        let raw = serde_json::to_string(accounts)?;
        self.store.set(keys::ACCOUNT_LIST, &raw).await?;
        Ok(())
    }

    /// Append an account, refusing a second entry for the same public key.
    pub async fn append(&self, account: Account) -> KeyStoreResult<Vec<Account>> {
        let mut accounts = self.list().await?;
        if accounts.iter().any(|a| a.public_key == account.public_key) {
            return Err(KeyStoreError::DuplicateAccount(account.public_key));
        }
        accounts.push(account);
        self.save(&accounts).await?;
        Ok(accounts)
    }

    pub async fn find_by_public_key(&self, public_key: &str) -> KeyStoreResult<Account> {
        self.list()
            .await?
            .into_iter()
            .find(|a| a.public_key == public_key)
            .ok_or_else(|| KeyStoreError::AccountNotFound(public_key.to_string()))
    }

    pub async fn rename(&self, public_key: &str, name: &str) -> KeyStoreResult<Account> {
        let name = name.trim();
        if name.is_empty() {
            return Err(KeyStoreError::InvalidAccountName);
        }

        let mut accounts = self.list().await?;
        let account = accounts
            .iter_mut()
            .find(|a| a.public_key == public_key)
            .ok_or_else(|| KeyStoreError::AccountNotFound(public_key.to_string()))?;
        account.name = name.to_string();
        let renamed = account.clone();

        self.save(&accounts).await?;
        Ok(renamed)
    }

    pub async fn active_id(&self) -> KeyStoreResult<Option<String>> {
        Ok(self.store.get(keys::ACTIVE_ACCOUNT_ID).await?)
    }

    pub async fn set_active(&self, id: &str) -> KeyStoreResult<()> {
        self.store.set(keys::ACTIVE_ACCOUNT_ID, id).await?;
        Ok(())
    }

    /// The selected account, falling back to the first one.
    pub async fn active(&self) -> KeyStoreResult<Option<Account>> {
        let accounts = self.list().await?;
        let active_id = self.active_id().await?;
        let selected = active_id
            .and_then(|id| accounts.iter().find(|a| a.id == id).cloned())
            .or_else(|| accounts.first().cloned());
        Ok(selected)
    }
}

/// Display name for the `n`-th account (1-based).
pub fn default_account_name(n: usize) -> String {
    format!("Account {n}")
}
