// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Relational Wallet - Stellar Wallet Core
//!
//! Non-custodial key management and transaction plumbing for Stellar
//! accounts. Secrets never leave the device: they are encrypted at rest
//! under a password-derived key and only decrypted for a single signing
//! operation.
//!
//! ## Modules
//!
//! - `vault` - scrypt key derivation and authenticated encryption
//! - `storage` - plaintext and secure key/value stores
//! - `keys` - accounts, mnemonic derivation, sessions (`AccountKeyStore`)
//! - `ledger` - Horizon and Soroban RPC client
//! - `transactions` - intent validation, envelope building, signing, and the
//!   generation-guarded pipeline
//! - `sessions` - WalletConnect-style remote signing broker
//! - `config` / `telemetry` - environment configuration and tracing setup

pub mod config;
pub mod error;
pub mod keys;
pub mod ledger;
pub mod network;
pub mod sessions;
pub mod storage;
pub mod telemetry;
pub mod transactions;
pub mod vault;

#[cfg(test)]
mod test_support;

pub use error::{WalletError, WalletResult};
pub use network::Network;
