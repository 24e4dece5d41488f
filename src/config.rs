// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variable names and defaults for the wallet daemon. Values are
//! read once at startup by [`WalletConfig::from_env`].
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `WALLET_DATA_DIR` | Root of the plaintext and secure stores | `./wallet-data` |
//! | `STELLAR_NETWORK` | `PUBLIC`, `TESTNET` or `FUTURENET` | `TESTNET` |
//! | `HORIZON_URL` | Horizon base URL for the selected network | per network |
//! | `SOROBAN_RPC_URL` | Soroban RPC URL for the selected network | per network |
//! | `HASH_KEY_TTL_SECS` | Session lifetime after sign-in | `86400` |
//! | `AUTH_CHECK_INTERVAL_SECS` | Session expiry check interval | `60` |
//! | `WALLET_KIT_PROJECT_ID` | Relay project id for the session broker | unset |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info` |

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::keys::session::DEFAULT_HASH_KEY_TTL_SECS;
use crate::keys::KeyStoreConfig;
use crate::ledger::LedgerEndpoints;
use crate::network::Network;
use crate::storage::paths::DATA_ROOT;
use crate::storage::StoragePaths;
use crate::telemetry::LogFormat;

pub const DATA_DIR_ENV: &str = "WALLET_DATA_DIR";
pub const NETWORK_ENV: &str = "STELLAR_NETWORK";
pub const HORIZON_URL_ENV: &str = "HORIZON_URL";
pub const SOROBAN_RPC_URL_ENV: &str = "SOROBAN_RPC_URL";
pub const HASH_KEY_TTL_ENV: &str = "HASH_KEY_TTL_SECS";
pub const AUTH_CHECK_INTERVAL_ENV: &str = "AUTH_CHECK_INTERVAL_SECS";
pub const PROJECT_ID_ENV: &str = "WALLET_KIT_PROJECT_ID";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_AUTH_CHECK_INTERVAL_SECS: u64 = 60;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone)]
pub struct WalletConfig {
    pub data_dir: PathBuf,
    pub network: Network,
    pub horizon_url: Option<Url>,
    pub soroban_rpc_url: Option<Url>,
    pub hash_key_ttl_secs: i64,
    pub auth_check_interval: Duration,
    pub project_id: Option<String>,
    pub log_format: LogFormat,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DATA_ROOT),
            network: Network::Testnet,
            horizon_url: None,
            soroban_rpc_url: None,
            hash_key_ttl_secs: DEFAULT_HASH_KEY_TTL_SECS,
            auth_check_interval: Duration::from_secs(DEFAULT_AUTH_CHECK_INTERVAL_SECS),
            project_id: None,
            log_format: LogFormat::default(),
        }
    }
}

impl WalletConfig {
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable source. Unset and blank variables
    /// fall back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<Self> {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(dir) = get(DATA_DIR_ENV) {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(raw) = get(NETWORK_ENV) {
            config.network = raw
                .parse()
                .map_err(|reason| invalid(NETWORK_ENV, reason))?;
        }
        config.horizon_url = get(HORIZON_URL_ENV)
            .map(|raw| parse_url(HORIZON_URL_ENV, &raw))
            .transpose()?;
        config.soroban_rpc_url = get(SOROBAN_RPC_URL_ENV)
            .map(|raw| parse_url(SOROBAN_RPC_URL_ENV, &raw))
            .transpose()?;
        if let Some(raw) = get(HASH_KEY_TTL_ENV) {
            config.hash_key_ttl_secs = parse_positive(HASH_KEY_TTL_ENV, &raw)?;
        }
        if let Some(raw) = get(AUTH_CHECK_INTERVAL_ENV) {
            let secs = parse_positive(AUTH_CHECK_INTERVAL_ENV, &raw)?;
            config.auth_check_interval = Duration::from_secs(secs.unsigned_abs());
        }
        config.project_id = get(PROJECT_ID_ENV);
        if let Some(raw) = get(LOG_FORMAT_ENV) {
            config.log_format = raw
                .parse()
                .map_err(|reason| invalid(LOG_FORMAT_ENV, reason))?;
        }

        Ok(config)
    }

    pub fn storage_paths(&self) -> StoragePaths {
        StoragePaths::new(&self.data_dir)
    }

    pub fn keystore_config(&self) -> KeyStoreConfig {
        KeyStoreConfig {
            hash_key_ttl: chrono::Duration::seconds(self.hash_key_ttl_secs),
            default_network: self.network,
            ..KeyStoreConfig::default()
        }
    }

    /// Endpoints for the configured network with any overrides applied.
    pub fn ledger_endpoints(&self) -> LedgerEndpoints {
        let mut endpoints = LedgerEndpoints::defaults(self.network);
        if let Some(url) = &self.horizon_url {
            endpoints.horizon_url = url.as_str().trim_end_matches('/').to_string();
        }
        if let Some(url) = &self.soroban_rpc_url {
            endpoints.soroban_rpc_url = url.to_string();
        }
        endpoints
    }
}

fn invalid(var: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        var,
        reason: reason.into(),
    }
}

fn parse_url(var: &'static str, raw: &str) -> ConfigResult<Url> {
    Url::parse(raw.trim()).map_err(|e| invalid(var, format!("invalid URL `{raw}`: {e}")))
}

fn parse_positive(var: &'static str, raw: &str) -> ConfigResult<i64> {
    match raw.trim().parse::<i64>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(invalid(var, format!("expected a positive integer, got `{raw}`"))),
    }
}
