// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Password-Derived Key Vault
//!
//! Leaf cryptographic primitives used by the key store:
//!
//! - [`kdf`]: scrypt key derivation with fixed cost parameters
//! - [`cipher`]: XChaCha20-Poly1305 encryption into a versioned,
//!   base64-encoded bundle
//!
//! ## Bundle Format
//!
//! ```text
//! base64( version:u8 = 1 || nonce:[u8; 24] || ciphertext || tag:[u8; 16] )
//! ```
//!
//! Nothing in this module touches storage. Key material returned from here is
//! wrapped in [`SymmetricKey`], which zeroizes on drop and has no `Debug`.

pub mod cipher;
pub mod kdf;

use base64ct::{Base64, Encoding};
use thiserror::Error;
use zeroize::Zeroizing;

pub use cipher::{decrypt, encrypt, BUNDLE_VERSION};
pub use kdf::{generate_salt, KdfParams, SymmetricKey, SALT_LEN};

/// Errors raised by vault primitives.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VaultError {
    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    /// Wrong key, tampered ciphertext, or a bundle that cannot be parsed.
    #[error("Invalid password or corrupted data")]
    DecryptionFailed,

    #[error("Cipher version {0} not supported")]
    UnsupportedVersion(u8),
}

pub type VaultResult<T> = Result<T, VaultError>;

/// Output of [`PasswordVault::encrypt_with_password`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordSealed {
    /// Vault bundle.
    pub bundle: String,
    /// Base64 salt that must be supplied again to decrypt.
    pub salt: String,
}

/// KDF plus cipher bound to one set of cost parameters.
#[derive(Debug, Clone, Copy)]
pub struct PasswordVault {
    params: KdfParams,
}

impl Default for PasswordVault {
    fn default() -> Self {
        Self::new(KdfParams::STANDARD)
    }
}

impl PasswordVault {
    pub fn new(params: KdfParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> KdfParams {
        self.params
    }

    /// Deterministic for a fixed `(password, salt)` pair.
    pub fn derive_key(&self, password: &str, salt: &[u8]) -> VaultResult<SymmetricKey> {
        kdf::derive_key(password.as_bytes(), salt, &self.params)
    }

    /// Derive a key from a fresh salt and seal `plaintext` with it.
    pub fn encrypt_with_password(
        &self,
        plaintext: &[u8],
        password: &str,
    ) -> VaultResult<PasswordSealed> {
        let salt = generate_salt();
        let key = self.derive_key(password, &salt)?;
        let bundle = encrypt(plaintext, &key)?;
        Ok(PasswordSealed {
            bundle,
            salt: Base64::encode_string(&salt),
        })
    }

    pub fn decrypt_with_password(
        &self,
        sealed: &PasswordSealed,
        password: &str,
    ) -> VaultResult<Zeroizing<Vec<u8>>> {
        let salt = Base64::decode_vec(&sealed.salt).map_err(|_| VaultError::DecryptionFailed)?;
        let key = self.derive_key(password, &salt)?;
        decrypt(&sealed.bundle, &key)
    }

    /// [`Self::derive_key`] on the blocking thread pool. Async callers use
    /// the `_async` variants so scrypt never runs on a runtime worker.
    pub async fn derive_key_async(&self, password: &str, salt: &[u8]) -> VaultResult<SymmetricKey> {
        let vault = *self;
        let password = Zeroizing::new(password.to_string());
        let salt = salt.to_vec();
        run_blocking(move || vault.derive_key(&password, &salt)).await
    }

    pub async fn encrypt_with_password_async(
        &self,
        plaintext: Zeroizing<Vec<u8>>,
        password: &str,
    ) -> VaultResult<PasswordSealed> {
        let vault = *self;
        let password = Zeroizing::new(password.to_string());
        run_blocking(move || vault.encrypt_with_password(&plaintext, &password)).await
    }

    pub async fn decrypt_with_password_async(
        &self,
        sealed: PasswordSealed,
        password: &str,
    ) -> VaultResult<Zeroizing<Vec<u8>>> {
        let vault = *self;
        let password = Zeroizing::new(password.to_string());
        run_blocking(move || vault.decrypt_with_password(&sealed, &password)).await
    }
}

async fn run_blocking<T, F>(f: F) -> VaultResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> VaultResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| VaultError::KeyDerivationFailed(format!("KDF task failed: {e}")))?
}
