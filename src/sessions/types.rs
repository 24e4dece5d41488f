// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wire shapes exchanged with the remote-signing transport.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const STELLAR_NAMESPACE: &str = "stellar";

pub const STELLAR_SIGN_XDR: &str = "stellar_signXDR";
pub const STELLAR_SIGN_AND_SUBMIT_XDR: &str = "stellar_signAndSubmitXDR";
pub const ACCOUNT_CHANGED_EVENT: &str = "accountChanged";

pub const SUPPORTED_METHODS: [&str; 2] = [STELLAR_SIGN_XDR, STELLAR_SIGN_AND_SUBMIT_XDR];
pub const SUPPORTED_CHAINS: [&str; 2] = ["stellar:pubnet", "stellar:testnet"];
pub const SUPPORTED_EVENTS: [&str; 1] = [ACCOUNT_CHANGED_EVENT];

/// `getSdkError("USER_REJECTED")`.
pub const USER_REJECTED_CODE: i64 = 5000;
/// `getSdkError("USER_DISCONNECTED")`.
pub const USER_DISCONNECTED_CODE: i64 = 6000;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redirect {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub native: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub universal: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerMetadata {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub icons: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect: Option<Redirect>,
}

/// What a dApp asks for under one namespace key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalNamespace {
    #[serde(default)]
    pub chains: Vec<String>,
    #[serde(default)]
    pub methods: Vec<String>,
    #[serde(default)]
    pub events: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionProposal {
    pub id: u64,
    pub proposer: PeerMetadata,
    #[serde(default)]
    pub required_namespaces: BTreeMap<String, ProposalNamespace>,
    #[serde(default)]
    pub optional_namespaces: BTreeMap<String, ProposalNamespace>,
}

/// What the wallet grants under one namespace key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionNamespace {
    /// `"{chain}:{publicKey}"`.
    pub accounts: Vec<String>,
    pub chains: Vec<String>,
    pub methods: Vec<String>,
    pub events: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    pub id: u64,
    pub topic: String,
    pub chain_id: String,
    pub method: String,
    /// Base64 transaction envelope to sign.
    pub xdr: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveSession {
    pub topic: String,
    pub peer: PeerMetadata,
    pub namespaces: BTreeMap<String, SessionNamespace>,
}

impl ActiveSession {
    pub fn accounts(&self) -> impl Iterator<Item = &str> {
        self.namespaces
            .values()
            .flat_map(|ns| ns.accounts.iter().map(String::as_str))
    }

    pub fn has_account(&self, account: &str) -> bool {
        self.accounts().any(|a| a == account)
    }
}

/// Lifecycle of a proposal and the session it becomes.
///
/// ```text
/// Proposed ──▶ Approved ──▶ Active ──▶ Disconnected
///     └──────▶ Rejected
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    Proposed,
    Approved,
    Active,
    Rejected,
    Disconnected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SdkError {
    pub code: i64,
    pub message: String,
}

impl SdkError {
    pub fn user_rejected(message: impl Into<String>) -> Self {
        Self {
            code: USER_REJECTED_CODE,
            message: message.into(),
        }
    }

    pub fn user_disconnected() -> Self {
        Self {
            code: USER_DISCONNECTED_CODE,
            message: "User disconnected.".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

/// JSON-RPC 2.0 response to a session request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub id: u64,
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn result(id: u64, result: Value) -> Self {
        Self {
            id,
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: u64, error: SdkError) -> Self {
        Self {
            id,
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(JsonRpcError {
                code: error.code,
                message: error.message,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn error_response_shape() {
        let response = JsonRpcResponse::error(7, SdkError::user_rejected("no thanks"));
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({"id": 7, "jsonrpc": "2.0", "error": {"code": 5000, "message": "no thanks"}})
        );
    }

    #[test]
    fn proposal_parses_with_missing_optional_namespaces() {
        let proposal: SessionProposal = serde_json::from_value(json!({
            "id": 1,
            "proposer": {"name": "dApp", "redirect": {"native": "dapp://"}},
            "requiredNamespaces": {
                "stellar": {"chains": ["stellar:pubnet"], "methods": ["stellar_signXDR"], "events": []}
            }
        }))
        .unwrap();
        assert!(proposal.optional_namespaces.is_empty());
        assert_eq!(
            proposal.proposer.redirect.unwrap().native.as_deref(),
            Some("dapp://")
        );
    }
}
