// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Stellar network definitions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Static configuration of one Stellar network.
#[derive(Debug, Clone)]
pub struct NetworkDetails {
    /// Network name for display
    pub name: &'static str,
    /// Passphrase hashed into every transaction signature
    pub passphrase: &'static str,
    /// Horizon REST endpoint
    pub horizon_url: &'static str,
    /// Soroban JSON-RPC endpoint
    pub soroban_rpc_url: &'static str,
    /// CAIP-2 chain id used by remote signing sessions
    pub chain_id: Option<&'static str>,
}

/// Stellar public network.
pub const PUBLIC_DETAILS: NetworkDetails = NetworkDetails {
    name: "Public",
    passphrase: "Public Global Stellar Network ; September 2015",
    horizon_url: "https://horizon.stellar.org",
    soroban_rpc_url: "https://soroban-rpc.mainnet.stellar.gateway.fm",
    chain_id: Some("stellar:pubnet"),
};

/// Stellar test network.
pub const TESTNET_DETAILS: NetworkDetails = NetworkDetails {
    name: "Testnet",
    passphrase: "Test SDF Network ; September 2015",
    horizon_url: "https://horizon-testnet.stellar.org",
    soroban_rpc_url: "https://soroban-testnet.stellar.org",
    chain_id: Some("stellar:testnet"),
};

/// Stellar future network (protocol previews).
pub const FUTURENET_DETAILS: NetworkDetails = NetworkDetails {
    name: "Futurenet",
    passphrase: "Test SDF Future Network ; October 2022",
    horizon_url: "https://horizon-futurenet.stellar.org",
    soroban_rpc_url: "https://rpc-futurenet.stellar.org",
    chain_id: None,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Network {
    Public,
    Testnet,
    Futurenet,
}

impl Network {
    pub fn details(self) -> &'static NetworkDetails {
        match self {
            Network::Public => &PUBLIC_DETAILS,
            Network::Testnet => &TESTNET_DETAILS,
            Network::Futurenet => &FUTURENET_DETAILS,
        }
    }

    pub fn passphrase(self) -> &'static str {
        self.details().passphrase
    }

    /// `sha256(passphrase)`, the network id bound into signatures and
    /// contract ids.
    pub fn network_id(self) -> [u8; 32] {
        Sha256::digest(self.passphrase().as_bytes()).into()
    }

    pub fn chain_id(self) -> Option<&'static str> {
        self.details().chain_id
    }

    /// Reverse of [`Network::chain_id`].
    pub fn from_chain_id(chain_id: &str) -> Option<Network> {
        [Network::Public, Network::Testnet, Network::Futurenet]
            .into_iter()
            .find(|n| n.chain_id() == Some(chain_id))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Network::Public => "PUBLIC",
            Network::Testnet => "TESTNET",
            Network::Futurenet => "FUTURENET",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PUBLIC" | "MAINNET" | "PUBNET" => Ok(Network::Public),
            "TESTNET" => Ok(Network::Testnet),
            "FUTURENET" => Ok(Network::Futurenet),
            other => Err(format!("Unknown Stellar network `{other}`")),
        }
    }
}
