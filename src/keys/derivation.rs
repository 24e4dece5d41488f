// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Mnemonic to keypair derivation (SEP-0005).
//!
//! A BIP-39 phrase becomes a 64-byte seed, which is walked down the SLIP-0010
//! ed25519 path `m/44'/148'/{index}'`. Every level is hardened.

use std::fmt;

use bip39::Mnemonic;
use ed25519_dalek::SigningKey;
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha512;
use unicode_normalization::UnicodeNormalization;
use zeroize::{Zeroize, Zeroizing};

use super::{KeyStoreError, KeyStoreResult};

type HmacSha512 = Hmac<Sha512>;

const HARDENED_OFFSET: u32 = 0x8000_0000;

/// SLIP-0044 coin type registered for Stellar.
const STELLAR_COIN_TYPE: u32 = 148;

/// Index used for the first account of a wallet.
pub const DEFAULT_DERIVATION_INDEX: u32 = 0;

/// Ed25519 keypair encoded as StrKey (`G...` public, `S...` secret).
pub struct KeyPair {
    public_key: String,
    secret_key: Zeroizing<String>,
}

impl KeyPair {
    /// Build from a raw 32-byte ed25519 seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let signing = SigningKey::from_bytes(seed);
        let public_key =
            stellar_strkey::ed25519::PublicKey(signing.verifying_key().to_bytes()).to_string();
        let secret_key = Zeroizing::new(stellar_strkey::ed25519::PrivateKey(*seed).to_string());
        Self {
            public_key,
            secret_key,
        }
    }

    /// Parse an `S...` secret key.
    pub fn from_secret_key(secret: &str) -> KeyStoreResult<Self> {
        let decoded = stellar_strkey::ed25519::PrivateKey::from_string(secret.trim())
            .map_err(|_| KeyStoreError::InvalidSecretKey)?;
        let mut seed = decoded.0;
        let keypair = Self::from_seed(&seed);
        seed.zeroize();
        Ok(keypair)
    }

    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    pub fn secret_key(&self) -> &str {
        &self.secret_key
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// Source of deterministic keypairs for a mnemonic phrase.
pub trait MnemonicDeriver: Send + Sync {
    fn derive(&self, phrase: &str, index: u32) -> KeyStoreResult<KeyPair>;

    fn public_key(&self, phrase: &str, index: u32) -> KeyStoreResult<String> {
        Ok(self.derive(phrase, index)?.public_key().to_string())
    }
}

/// SEP-0005 derivation with an empty BIP-39 passphrase.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sep5Deriver;

impl MnemonicDeriver for Sep5Deriver {
    fn derive(&self, phrase: &str, index: u32) -> KeyStoreResult<KeyPair> {
        let normalized = normalize_phrase(phrase);
        let mnemonic = Mnemonic::parse_normalized(&normalized)
            .map_err(|e| KeyStoreError::InvalidMnemonic(e.to_string()))?;
        let seed = Zeroizing::new(mnemonic.to_seed_normalized(""));

        let (mut key, mut chain_code) = master_key_from_seed(seed.as_slice())?;
        for segment in [44, STELLAR_COIN_TYPE, index] {
            let (child_key, child_chain) = derive_hardened_child(&key, &chain_code, segment)?;
            key.zeroize();
            chain_code.zeroize();
            key = child_key;
            chain_code = child_chain;
        }

        let keypair = KeyPair::from_seed(&key);
        key.zeroize();
        chain_code.zeroize();
        Ok(keypair)
    }
}

/// NFKD, lowercase, single spaces.
pub fn normalize_phrase(phrase: &str) -> String {
    let decomposed: String = phrase.nfkd().collect();
    decomposed
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Fresh 12-word English phrase from OS entropy.
pub fn generate_mnemonic() -> KeyStoreResult<String> {
    let mut entropy = Zeroizing::new([0u8; 16]);
    OsRng.fill_bytes(entropy.as_mut_slice());
    let mnemonic = Mnemonic::from_entropy(entropy.as_slice())
        .map_err(|e| KeyStoreError::InvalidMnemonic(e.to_string()))?;
    Ok(mnemonic.to_string())
}

fn master_key_from_seed(seed: &[u8]) -> KeyStoreResult<([u8; 32], [u8; 32])> {
    let mut output = hmac_sha512(b"ed25519 seed", seed)?;
    let split = split_output(&output);
    output.zeroize();
    Ok(split)
}

fn derive_hardened_child(
    key: &[u8; 32],
    chain_code: &[u8; 32],
    index: u32,
) -> KeyStoreResult<([u8; 32], [u8; 32])> {
    let mut data = [0u8; 37];
    data[1..33].copy_from_slice(key);
    data[33..37].copy_from_slice(&(index | HARDENED_OFFSET).to_be_bytes());

    let mut output = hmac_sha512(chain_code, &data)?;
    data.zeroize();
    let split = split_output(&output);
    output.zeroize();
    Ok(split)
}

fn split_output(output: &[u8; 64]) -> ([u8; 32], [u8; 32]) {
    let mut key = [0u8; 32];
    let mut chain_code = [0u8; 32];
    key.copy_from_slice(&output[..32]);
    chain_code.copy_from_slice(&output[32..]);
    (key, chain_code)
}

fn hmac_sha512(key: &[u8], data: &[u8]) -> KeyStoreResult<[u8; 64]> {
    let mut mac = HmacSha512::new_from_slice(key)
        .map_err(|e| KeyStoreError::InvalidMnemonic(format!("HMAC init failed: {e}")))?;
    mac.update(data);
    let mut out = [0u8; 64];
    out.copy_from_slice(&mac.finalize().into_bytes());
    Ok(out)
}
