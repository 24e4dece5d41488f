// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Horizon + Soroban RPC implementation of [`LedgerService`].

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::network::Network;

use super::soroban::{
    assemble_transaction, JsonRpcRequest, JsonRpcResponse, SimulateParams,
    SimulateTransactionResponse,
};
use super::{LedgerError, LedgerResult, LedgerService, SubmitResponse, TimeBounds};

/// Default HTTP timeout for ledger requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Base URLs for one network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEndpoints {
    pub horizon_url: String,
    pub soroban_rpc_url: String,
}

impl LedgerEndpoints {
    pub fn defaults(network: Network) -> Self {
        let details = network.details();
        Self {
            horizon_url: details.horizon_url.to_string(),
            soroban_rpc_url: details.soroban_rpc_url.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AccountResponse {
    sequence: String,
}

#[derive(Debug, Deserialize)]
struct HorizonProblem {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    detail: Option<String>,
    #[serde(default)]
    extras: Option<HorizonExtras>,
}

#[derive(Debug, Deserialize)]
struct HorizonExtras {
    #[serde(default)]
    result_codes: Option<serde_json::Value>,
}

impl HorizonProblem {
    fn describe(&self) -> String {
        if let Some(codes) = self.extras.as_ref().and_then(|e| e.result_codes.as_ref()) {
            return codes.to_string();
        }
        self.detail
            .clone()
            .or_else(|| self.title.clone())
            .unwrap_or_else(|| "unknown error".to_string())
    }
}

/// Ledger client talking to public Horizon and Soroban RPC endpoints.
#[derive(Clone)]
pub struct HorizonLedger {
    http: Client,
    overrides: HashMap<Network, LedgerEndpoints>,
}

impl HorizonLedger {
    pub fn new() -> LedgerResult<Self> {
        let http = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| LedgerError::RequestFailed(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            overrides: HashMap::new(),
        })
    }

    /// Replace the default endpoints of `network`.
    pub fn with_endpoints(mut self, network: Network, endpoints: LedgerEndpoints) -> Self {
        self.overrides.insert(network, endpoints);
        self
    }

    pub fn endpoints(&self, network: Network) -> LedgerEndpoints {
        self.overrides
            .get(&network)
            .cloned()
            .unwrap_or_else(|| LedgerEndpoints::defaults(network))
    }

    fn horizon(&self, network: Network, path: &str) -> String {
        format!(
            "{}/{}",
            self.endpoints(network).horizon_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    async fn server_time(&self, network: Network) -> DateTime<Utc> {
        let response = match self.http.get(self.horizon(network, "/")).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(%network, error = %e, "Horizon unreachable, using local clock for timebounds");
                return Utc::now();
            }
        };

        response
            .headers()
            .get(reqwest::header::DATE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| DateTime::parse_from_rfc2822(v).ok())
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(Utc::now)
    }
}

#[async_trait]
impl LedgerService for HorizonLedger {
    async fn load_account(&self, network: Network, public_key: &str) -> LedgerResult<i64> {
        if stellar_strkey::ed25519::PublicKey::from_string(public_key).is_err() {
            return Err(LedgerError::RequestFailed(format!(
                "invalid account id `{public_key}`"
            )));
        }

        let response = self
            .http
            .get(self.horizon(network, &format!("accounts/{public_key}")))
            .send()
            .await
            .map_err(|e| LedgerError::RequestFailed(format!("account request failed: {e}")))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(LedgerError::AccountNotFound(public_key.to_string()));
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LedgerError::RequestFailed(format!(
                "account request returned {status}: {body}"
            )));
        }

        let account: AccountResponse = response
            .json()
            .await
            .map_err(|e| LedgerError::InvalidResponse(format!("invalid account response: {e}")))?;
        account
            .sequence
            .parse()
            .map_err(|_| LedgerError::InvalidResponse(format!("bad sequence `{}`", account.sequence)))
    }

    async fn fetch_timebounds(
        &self,
        network: Network,
        timeout_secs: u64,
    ) -> LedgerResult<TimeBounds> {
        let now = self.server_time(network).await;
        let now_secs = u64::try_from(now.timestamp())
            .map_err(|_| LedgerError::InvalidResponse("server time before epoch".to_string()))?;
        Ok(TimeBounds {
            min_time: 0,
            max_time: now_secs.saturating_add(timeout_secs),
        })
    }

    async fn simulate(&self, network: Network, xdr: &str) -> LedgerResult<String> {
        let url = self.endpoints(network).soroban_rpc_url;
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method: "simulateTransaction",
            params: SimulateParams { transaction: xdr },
        };

        let response = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| LedgerError::RequestFailed(format!("simulation request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LedgerError::SimulationFailed(format!(
                "simulation returned {status}: {body}"
            )));
        }

        let envelope: JsonRpcResponse<SimulateTransactionResponse> =
            response.json().await.map_err(|e| {
                LedgerError::InvalidResponse(format!("invalid simulation response: {e}"))
            })?;

        if let Some(error) = envelope.error {
            return Err(LedgerError::SimulationFailed(format!(
                "rpc error {}: {}",
                error.code, error.message
            )));
        }
        let simulation = envelope.result.ok_or_else(|| {
            LedgerError::InvalidResponse("simulation response has no result".to_string())
        })?;

        debug!(
            %network,
            latest_ledger = ?simulation.latest_ledger,
            min_resource_fee = ?simulation.min_resource_fee,
            "Simulation complete"
        );
        assemble_transaction(xdr, &simulation)
    }

    async fn submit(&self, network: Network, signed_xdr: &str) -> LedgerResult<SubmitResponse> {
        let response = self
            .http
            .post(self.horizon(network, "transactions"))
            .form(&[("tx", signed_xdr)])
            .send()
            .await
            .map_err(|e| LedgerError::RequestFailed(format!("submit request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let reason = serde_json::from_str::<HorizonProblem>(&body)
                .map(|p| p.describe())
                .unwrap_or(body);
            return Err(LedgerError::SubmissionFailed(format!(
                "Horizon returned {status}: {reason}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| LedgerError::InvalidResponse(format!("invalid submit response: {e}")))
    }
}
