// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Ledger Service
//!
//! The network collaborator the transaction pipeline and account discovery
//! talk to. [`HorizonLedger`] implements it against Horizon for classic
//! operations and Soroban RPC for simulation; tests substitute scripted
//! fakes.

pub mod horizon;
pub mod soroban;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::network::Network;

pub use horizon::{HorizonLedger, LedgerEndpoints};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Horizon answered 404 for the account.
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Unexpected response: {0}")]
    InvalidResponse(String),

    #[error("Simulation failed: {0}")]
    SimulationFailed(String),

    #[error("Submission failed: {0}")]
    SubmissionFailed(String),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Validity window of a transaction, unix seconds. `0` means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBounds {
    pub min_time: u64,
    pub max_time: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub hash: String,
    #[serde(default)]
    pub ledger: Option<u32>,
}

#[async_trait]
pub trait LedgerService: Send + Sync {
    /// Current sequence number of `public_key`.
    async fn load_account(&self, network: Network, public_key: &str) -> LedgerResult<i64>;

    /// `{0, server_now + timeout_secs}`.
    async fn fetch_timebounds(&self, network: Network, timeout_secs: u64)
        -> LedgerResult<TimeBounds>;

    /// Simulate a contract-invoking draft and return the prepared envelope
    /// (resource data, fee and auth attached), base64 XDR.
    async fn simulate(&self, network: Network, xdr: &str) -> LedgerResult<String>;

    async fn submit(&self, network: Network, signed_xdr: &str) -> LedgerResult<SubmitResponse>;
}
