// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Contract for the remote-signing relay client.

use std::collections::BTreeMap;

use async_trait::async_trait;
use thiserror::Error;

use super::types::{ActiveSession, JsonRpcResponse, PeerMetadata, SdkError, SessionNamespace};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Transport not connected")]
    NotConnected,

    #[error("Relay rejected the call: {0}")]
    Rejected(String),

    #[error("Relay request timed out")]
    Timeout,

    #[error("Transport error: {0}")]
    Other(String),
}

pub type TransportResult<T> = Result<T, TransportError>;

/// Relay client the [`super::SessionBroker`] drives. Pairing, encryption and
/// relay persistence live behind this trait.
#[async_trait]
pub trait SessionTransport: Send + Sync {
    async fn init(&self, project_id: &str, metadata: &PeerMetadata) -> TransportResult<()>;

    async fn pair(&self, uri: &str) -> TransportResult<()>;

    /// Approve proposal `proposal_id` and return the settled session.
    async fn approve_session(
        &self,
        proposal_id: u64,
        namespaces: &BTreeMap<String, SessionNamespace>,
    ) -> TransportResult<ActiveSession>;

    async fn reject_session(&self, proposal_id: u64, reason: &SdkError) -> TransportResult<()>;

    async fn respond_session_request(
        &self,
        topic: &str,
        response: &JsonRpcResponse,
    ) -> TransportResult<()>;

    async fn active_sessions(&self) -> TransportResult<Vec<ActiveSession>>;

    async fn disconnect_session(&self, topic: &str, reason: &SdkError) -> TransportResult<()>;

    async fn shutdown(&self) -> TransportResult<()>;
}
