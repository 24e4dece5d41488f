// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Soroban RPC `simulateTransaction` types and envelope assembly.
//!
//! A contract call drafted without resource data is rejected by the network.
//! Assembly takes the simulation output and attaches:
//!
//! - `ext = V1(transactionData)`
//! - `fee = classic fee + minResourceFee`
//! - the simulated authorization entries, unless the operation already has some

use serde::{Deserialize, Serialize};
use stellar_xdr::curr::{
    Limits, Operation, OperationBody, ReadXdr, SorobanAuthorizationEntry, SorobanTransactionData,
    TransactionEnvelope, TransactionExt, WriteXdr,
};

use super::{LedgerError, LedgerResult};

#[derive(Debug, Serialize)]
pub struct JsonRpcRequest<'a, P: Serialize> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    pub params: P,
}

#[derive(Debug, Serialize)]
pub struct SimulateParams<'a> {
    pub transaction: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct JsonRpcResponse<T> {
    #[serde(default)]
    pub result: Option<T>,
    #[serde(default)]
    pub error: Option<JsonRpcErrorBody>,
}

#[derive(Debug, Deserialize)]
pub struct JsonRpcErrorBody {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulateTransactionResponse {
    /// Set when the host function failed during simulation.
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub transaction_data: Option<String>,
    #[serde(default)]
    pub min_resource_fee: Option<String>,
    #[serde(default)]
    pub results: Vec<SimulateHostFunctionResult>,
    #[serde(default)]
    pub latest_ledger: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SimulateHostFunctionResult {
    #[serde(default)]
    pub auth: Vec<String>,
    #[serde(default)]
    pub xdr: Option<String>,
}

fn xdr_error(context: &str, e: stellar_xdr::curr::Error) -> LedgerError {
    LedgerError::InvalidResponse(format!("{context}: {e}"))
}

/// Apply a simulation result to a draft envelope and return the prepared
/// envelope as base64 XDR.
pub fn assemble_transaction(
    draft_xdr: &str,
    simulation: &SimulateTransactionResponse,
) -> LedgerResult<String> {
    if let Some(error) = &simulation.error {
        return Err(LedgerError::SimulationFailed(error.clone()));
    }

    let data_b64 = simulation.transaction_data.as_deref().ok_or_else(|| {
        LedgerError::SimulationFailed("simulation returned no transactionData".to_string())
    })?;
    let transaction_data = SorobanTransactionData::from_xdr_base64(data_b64, Limits::none())
        .map_err(|e| xdr_error("transactionData", e))?;

    let min_resource_fee: u32 = simulation
        .min_resource_fee
        .as_deref()
        .unwrap_or("0")
        .trim()
        .parse()
        .map_err(|_| {
            LedgerError::InvalidResponse("minResourceFee is not a valid u32".to_string())
        })?;

    let envelope = TransactionEnvelope::from_xdr_base64(draft_xdr, Limits::none())
        .map_err(|e| xdr_error("draft envelope", e))?;
    let TransactionEnvelope::Tx(mut v1) = envelope else {
        return Err(LedgerError::InvalidResponse(
            "only v1 envelopes can be prepared".to_string(),
        ));
    };

    v1.tx.fee = v1.tx.fee.checked_add(min_resource_fee).ok_or_else(|| {
        LedgerError::SimulationFailed("fee overflow after adding resource fee".to_string())
    })?;

    if let Some(result) = simulation.results.first() {
        if !result.auth.is_empty() {
            let mut operations: Vec<Operation> = v1.tx.operations.to_vec();
            if let Some(Operation {
                body: OperationBody::InvokeHostFunction(invoke),
                ..
            }) = operations.first_mut()
            {
                if invoke.auth.is_empty() {
                    let entries = result
                        .auth
                        .iter()
                        .map(|a| SorobanAuthorizationEntry::from_xdr_base64(a, Limits::none()))
                        .collect::<Result<Vec<_>, _>>()
                        .map_err(|e| xdr_error("auth entry", e))?;
                    invoke.auth = entries.try_into().map_err(|e| xdr_error("auth entries", e))?;
                }
            }
            v1.tx.operations = operations
                .try_into()
                .map_err(|e| xdr_error("operations", e))?;
        }
    }

    v1.tx.ext = TransactionExt::V1(transaction_data);

    TransactionEnvelope::Tx(v1)
        .to_xdr_base64(Limits::none())
        .map_err(|e| xdr_error("prepared envelope", e))
}
