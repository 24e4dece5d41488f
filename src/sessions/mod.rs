// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Remote Signing Session Broker
//!
//! Approve/reject state machine for WalletConnect-style session proposals and
//! signing requests. The broker never touches key storage: signing is done by
//! a closure the caller supplies, normally backed by
//! [`crate::transactions::sign_xdr`] and the active account's secret.
//!
//! ## Guarantees
//!
//! - A request is signed only when its `chainId` equals the active chain.
//! - Every failure is answered over the transport, so a dApp is never left
//!   waiting: proposals with `USER_REJECTED`, requests with a JSON-RPC error.
//! - Per-session disconnect failures are logged and do not stop the others.

pub mod broker;
pub mod namespaces;
pub mod transport;
pub mod types;

use thiserror::Error;

pub use broker::{ApprovalOutcome, SessionBroker, SessionFilter};
pub use transport::{SessionTransport, TransportError, TransportResult};
pub use types::{
    ActiveSession, JsonRpcResponse, PeerMetadata, SdkError, SessionNamespace, SessionProposal,
    SessionRequest, SessionState,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BrokerError {
    #[error("Session broker is not initialized")]
    NotInitialized,

    #[error("Session broker is already initialized")]
    AlreadyInitialized,

    #[error("Unsupported chain: {0}")]
    UnsupportedChain(String),

    #[error("Unsupported method: {0}")]
    UnsupportedMethod(String),

    #[error("Wrong network: dApp requested {requested:?}, wallet is on {active}")]
    WrongNetworkForProposal { requested: Vec<String>, active: String },

    #[error("Wrong network: request is for {requested}, wallet is on {active}")]
    WrongNetworkForRequest { requested: String, active: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Signing failed: {0}")]
    SigningFailed(String),

    #[error("Failed to respond to the dApp: {0}")]
    TransportRespondFailed(String),

    #[error("Proposal {0} was already rejected")]
    UserRejected(u64),

    #[error("Invalid deep link: {0}")]
    InvalidDeepLink(String),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

pub type BrokerResult<T> = Result<T, BrokerError>;
