// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! XChaCha20-Poly1305 sealing into versioned bundles.

use base64ct::{Base64, Encoding};
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

use super::{SymmetricKey, VaultError, VaultResult};

/// Version byte written at the head of every bundle.
pub const BUNDLE_VERSION: u8 = 1;

const NONCE_LEN: usize = 24;
const TAG_LEN: usize = 16;

/// Encrypt `plaintext` under `key` and return a base64 bundle.
///
/// A fresh random nonce is drawn for every call.
pub fn encrypt(plaintext: &[u8], key: &SymmetricKey) -> VaultResult<String> {
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));

    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    let ciphertext = cipher
        .encrypt(XNonce::from_slice(&nonce), plaintext)
        .map_err(|e| VaultError::EncryptionFailed(e.to_string()))?;

    let mut bundle = Vec::with_capacity(1 + NONCE_LEN + ciphertext.len());
    bundle.push(BUNDLE_VERSION);
    bundle.extend_from_slice(&nonce);
    bundle.extend_from_slice(&ciphertext);

    Ok(Base64::encode_string(&bundle))
}

/// Open a bundle produced by [`encrypt`].
///
/// # Errors
///
/// - [`VaultError::UnsupportedVersion`] if the version byte is unknown
/// - [`VaultError::DecryptionFailed`] on a wrong key, any tampering, or a
///   malformed bundle
pub fn decrypt(bundle: &str, key: &SymmetricKey) -> VaultResult<Zeroizing<Vec<u8>>> {
    let raw = Base64::decode_vec(bundle.trim()).map_err(|_| VaultError::DecryptionFailed)?;

    let (&version, rest) = raw.split_first().ok_or(VaultError::DecryptionFailed)?;
    if version != BUNDLE_VERSION {
        return Err(VaultError::UnsupportedVersion(version));
    }
    if rest.len() < NONCE_LEN + TAG_LEN {
        return Err(VaultError::DecryptionFailed);
    }

    let (nonce, ciphertext) = rest.split_at(NONCE_LEN);
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
    let plaintext = cipher
        .decrypt(XNonce::from_slice(nonce), ciphertext)
        .map_err(|_| VaultError::DecryptionFailed)?;

    Ok(Zeroizing::new(plaintext))
}
