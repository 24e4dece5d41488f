// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Transaction Pipeline
//!
//! Turns a [`TransactionIntent`] into a submitted transaction:
//!
//! ```text
//! intent ──build──▶ draft ──simulate (contract only)──▶ xdr ──sign──▶ signed ──submit──▶ hash
//! ```
//!
//! | Module | Role |
//! |--------|------|
//! | [`intent`] | validated user intent, recipient classified once |
//! | [`builder`] | XDR composition, Stellar Asset Contract ids |
//! | [`signing`] | network-bound transaction hash and ed25519 signatures |
//! | [`generation`] | generation-token guarded state |
//! | [`pipeline`] | the state machine the UI drives |
//!
//! Overlapping builds are resolved by generation tokens: every build mints a
//! token and a result is committed only while its token is still live. A late
//! result from a superseded build is dropped without an error.

pub mod builder;
pub mod generation;
pub mod intent;
pub mod pipeline;
pub mod signing;

use thiserror::Error;

use crate::ledger::LedgerError;

pub use builder::{sac_contract_id, TransactionComposer};
pub use generation::{Generation, Generational, Guarded};
pub use intent::{Asset, PaymentRequest, Recipient, SwapRequest, TransactionIntent};
pub use pipeline::{TransactionPipeline, TransactionState};
pub use signing::{sign_xdr, transaction_hash, SignedTransaction};

/// Stroops per lumen.
pub const STROOPS_PER_XLM: i64 = 10_000_000;

/// Decimal places of lumens and of Stellar Asset Contract tokens.
pub const XLM_DECIMALS: u8 = 7;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransactionError {
    #[error("No transaction to sign")]
    NoTransactionToSign,

    #[error("No signed transaction to submit")]
    NoSignedTransactionToSubmit,

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid fee: {0}")]
    InvalidFee(String),

    #[error("Timeout must be greater than zero")]
    InvalidTimeout,

    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),

    #[error("Invalid source account: {0}")]
    InvalidSource(String),

    #[error("Cannot send to your own account")]
    SelfPayment,

    #[error("Insufficient balance")]
    InsufficientBalance,

    #[error("Invalid asset: {0}")]
    InvalidAsset(String),

    #[error("Send and destination assets must differ")]
    SameAsset,

    #[error("Memo must be at most 28 bytes")]
    MemoTooLong,

    #[error("Starting balance must be at least 1 XLM to create account {0}")]
    StartingBalanceTooLow(String),

    #[error("Invalid secret key")]
    InvalidSecretKey,

    #[error("XDR error: {0}")]
    Xdr(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

pub type TransactionResult<T> = Result<T, TransactionError>;

impl From<stellar_xdr::curr::Error> for TransactionError {
    fn from(e: stellar_xdr::curr::Error) -> Self {
        TransactionError::Xdr(e.to_string())
    }
}
