// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Shared fixtures and scripted collaborators for unit tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use stellar_xdr::curr::{Limits, WriteXdr};
use tokio::sync::oneshot;

use crate::keys::derivation::KeyPair;
use crate::ledger::soroban::{assemble_transaction, SimulateTransactionResponse};
use crate::ledger::{LedgerError, LedgerResult, LedgerService, SubmitResponse, TimeBounds};
use crate::network::Network;
use crate::sessions::transport::{SessionTransport, TransportError, TransportResult};
use crate::sessions::types::{
    ActiveSession, JsonRpcResponse, PeerMetadata, SdkError, SessionNamespace,
};
use crate::storage::{KeyValueStore, MemoryStore, StorageError, StorageResult};
use crate::transactions::builder::build_envelope;
use crate::transactions::{Asset, PaymentRequest, TransactionIntent};

/// SEP-5 test vector 1.
pub const TEST_MNEMONIC: &str =
    "illness spike retreat truth genius clock brain pass fit cave bargain toe";

/// `SorobanTransactionData` with zero resources, base64.
pub const EMPTY_SOROBAN_DATA: &str = "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=";

/// Native asset contract on testnet.
pub const NATIVE_SAC_TESTNET: &str = "CDLZFC3SYJYDZT7K67VZ75HPJVIEUVNIXF47ZG2FB2RMQQVU2HHGCYSC";
/// Native asset contract on the public network.
pub const NATIVE_SAC_PUBLIC: &str = "CAS3J7GYLGXMF6TDJBBYYSE3HQ6BBSMLNUQ34T6TZMYMW2EVH34XOWMA";

pub fn keypair(n: u8) -> KeyPair {
    KeyPair::from_seed(&[n; 32])
}

/// Native testnet payment with the minimum fee.
pub fn payment_intent(source: &str, destination: &str, amount: &str) -> TransactionIntent {
    TransactionIntent::payment(PaymentRequest {
        source: source.to_string(),
        recipient: destination.to_string(),
        asset: Asset::Native,
        amount: amount.to_string(),
        fee: "0.00001".to_string(),
        memo: None,
        timeout_secs: 180,
        network: Network::Testnet,
        available_balance: None,
        token_decimals: None,
    })
    .unwrap()
}

fn bounds() -> TimeBounds {
    TimeBounds {
        min_time: 0,
        max_time: 1_900_000_000,
    }
}

/// Unsimulated `transfer` call on the native asset contract, base64.
pub fn contract_transfer_draft(fee: u32) -> String {
    let mut intent = payment_intent(keypair(1).public_key(), NATIVE_SAC_TESTNET, "1");
    if let TransactionIntent::ContractInvocation(transfer) = &mut intent {
        transfer.options.fee_stroops = fee;
    }
    build_envelope(&intent, 1, bounds(), true)
        .unwrap()
        .to_xdr_base64(Limits::none())
        .unwrap()
}

/// Unsigned classic payment from `keypair(1)` to `keypair(2)`, base64.
pub fn unsigned_payment_xdr() -> String {
    let intent = payment_intent(keypair(1).public_key(), keypair(2).public_key(), "1");
    build_envelope(&intent, 1, bounds(), true)
        .unwrap()
        .to_xdr_base64(Limits::none())
        .unwrap()
}

// ========== Storage ==========

/// [`MemoryStore`] that fails chosen keys on `set` or `remove` and records
/// every removal attempt.
#[derive(Default)]
pub struct FailingStore {
    inner: MemoryStore,
    fail_set: Mutex<HashSet<String>>,
    fail_remove: Mutex<HashSet<String>>,
    removed: Mutex<Vec<String>>,
}

impl FailingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_set(&self, key: &str) {
        self.fail_set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string());
    }

    pub fn fail_remove(&self, key: &str) {
        self.fail_remove
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string());
    }

    pub fn removed(&self) -> Vec<String> {
        self.removed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }
}

fn injected(key: &str) -> StorageError {
    StorageError::Unavailable(format!("injected failure on {key}"))
}

#[async_trait]
impl KeyValueStore for FailingStore {
    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        if self
            .fail_set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(key)
        {
            return Err(injected(key));
        }
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        self.removed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(key.to_string());
        if self
            .fail_remove
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(key)
        {
            return Err(injected(key));
        }
        self.inner.remove(key).await
    }
}

/// [`MemoryStore`] that yields to the scheduler before every call, so
/// concurrent flows interleave at each storage access.
#[derive(Default)]
pub struct YieldingStore {
    inner: MemoryStore,
}

impl YieldingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }
}

#[async_trait]
impl KeyValueStore for YieldingStore {
    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        tokio::task::yield_now().await;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        tokio::task::yield_now().await;
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        tokio::task::yield_now().await;
        self.inner.remove(key).await
    }
}

// ========== Ledger ==========

/// In-memory ledger. Calls to `fetch_timebounds` and `submit` can be held
/// back with gates, released in the order they were created.
#[derive(Default)]
pub struct ScriptedLedger {
    accounts: Mutex<HashMap<String, i64>>,
    timebounds_gates: Mutex<VecDeque<oneshot::Receiver<()>>>,
    submit_gates: Mutex<VecDeque<oneshot::Receiver<()>>>,
    simulate_calls: AtomicUsize,
    submitted: Mutex<Vec<String>>,
    submit_error: Mutex<Option<LedgerError>>,
}

impl ScriptedLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create `public_key` with sequence number `sequence`.
    pub fn fund(&self, public_key: &str, sequence: i64) {
        self.accounts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(public_key.to_string(), sequence);
    }

    pub fn gate_timebounds(&self) -> oneshot::Sender<()> {
        gate(&self.timebounds_gates)
    }

    pub fn gate_submit(&self) -> oneshot::Sender<()> {
        gate(&self.submit_gates)
    }

    pub fn fail_submit(&self, error: LedgerError) {
        *self
            .submit_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(error);
    }

    pub fn simulate_calls(&self) -> usize {
        self.simulate_calls.load(Ordering::SeqCst)
    }

    pub fn submitted(&self) -> Vec<String> {
        self.submitted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

fn gate(queue: &Mutex<VecDeque<oneshot::Receiver<()>>>) -> oneshot::Sender<()> {
    let (tx, rx) = oneshot::channel();
    queue
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push_back(rx);
    tx
}

async fn pass_gate(queue: &Mutex<VecDeque<oneshot::Receiver<()>>>) {
    let next = queue
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .pop_front();
    if let Some(rx) = next {
        let _ = rx.await;
    }
}

#[async_trait]
impl LedgerService for ScriptedLedger {
    async fn load_account(&self, _network: Network, public_key: &str) -> LedgerResult<i64> {
        self.accounts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(public_key)
            .copied()
            .ok_or_else(|| LedgerError::AccountNotFound(public_key.to_string()))
    }

    async fn fetch_timebounds(
        &self,
        _network: Network,
        timeout_secs: u64,
    ) -> LedgerResult<TimeBounds> {
        pass_gate(&self.timebounds_gates).await;
        let now = u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default();
        Ok(TimeBounds {
            min_time: 0,
            max_time: now + timeout_secs,
        })
    }

    async fn simulate(&self, _network: Network, xdr: &str) -> LedgerResult<String> {
        self.simulate_calls.fetch_add(1, Ordering::SeqCst);
        let simulation = SimulateTransactionResponse {
            transaction_data: Some(EMPTY_SOROBAN_DATA.to_string()),
            min_resource_fee: Some("100".to_string()),
            ..Default::default()
        };
        assemble_transaction(xdr, &simulation)
    }

    async fn submit(&self, _network: Network, signed_xdr: &str) -> LedgerResult<SubmitResponse> {
        let index = {
            let mut submitted = self.submitted.lock().unwrap_or_else(PoisonError::into_inner);
            submitted.push(signed_xdr.to_string());
            submitted.len()
        };
        pass_gate(&self.submit_gates).await;

        if let Some(err) = self
            .submit_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
        {
            return Err(err);
        }
        Ok(SubmitResponse {
            hash: format!("{index:064x}"),
            ledger: Some(1),
        })
    }
}

// ========== Session transport ==========

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    Init(String),
    Pair(String),
    Approve(u64),
    Reject { id: u64, code: i64 },
    Respond { topic: String },
    Disconnect { topic: String, code: i64 },
    Shutdown,
}

/// Relay stand-in. Approvals settle sessions named `topic-{n}` in order.
#[derive(Default)]
pub struct RecordingTransport {
    calls: Mutex<Vec<TransportCall>>,
    responses: Mutex<Vec<JsonRpcResponse>>,
    sessions: Mutex<Vec<ActiveSession>>,
    peer: Mutex<Option<PeerMetadata>>,
    settled: AtomicUsize,
    approve_error: Mutex<Option<TransportError>>,
    respond_error: Mutex<Option<TransportError>>,
    failing_topics: Mutex<HashSet<String>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<TransportCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Every response sent, including ones whose delivery failed.
    pub fn responses(&self) -> Vec<JsonRpcResponse> {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Metadata reported for sessions settled from now on.
    pub fn set_peer(&self, peer: PeerMetadata) {
        *self.peer.lock().unwrap_or_else(PoisonError::into_inner) = Some(peer);
    }

    /// Fail the next `approve_session` call.
    pub fn fail_approve(&self, error: TransportError) {
        *self
            .approve_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(error);
    }

    /// Fail the next `respond_session_request` call.
    pub fn fail_next_respond(&self, error: TransportError) {
        *self
            .respond_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(error);
    }

    pub fn fail_disconnect(&self, topic: &str) {
        self.failing_topics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(topic.to_string());
    }

    fn record(&self, call: TransportCall) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }
}

#[async_trait]
impl SessionTransport for RecordingTransport {
    async fn init(&self, project_id: &str, _metadata: &PeerMetadata) -> TransportResult<()> {
        self.record(TransportCall::Init(project_id.to_string()));
        Ok(())
    }

    async fn pair(&self, uri: &str) -> TransportResult<()> {
        self.record(TransportCall::Pair(uri.to_string()));
        Ok(())
    }

    async fn approve_session(
        &self,
        proposal_id: u64,
        namespaces: &std::collections::BTreeMap<String, SessionNamespace>,
    ) -> TransportResult<ActiveSession> {
        self.record(TransportCall::Approve(proposal_id));
        if let Some(err) = self
            .approve_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            return Err(err);
        }

        let n = self.settled.fetch_add(1, Ordering::SeqCst) + 1;
        let peer = self
            .peer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .unwrap_or_else(|| PeerMetadata {
                name: "Swap dApp".to_string(),
                ..Default::default()
            });
        let session = ActiveSession {
            topic: format!("topic-{n}"),
            peer,
            namespaces: namespaces.clone(),
        };
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(session.clone());
        Ok(session)
    }

    async fn reject_session(&self, proposal_id: u64, reason: &SdkError) -> TransportResult<()> {
        self.record(TransportCall::Reject {
            id: proposal_id,
            code: reason.code,
        });
        Ok(())
    }

    async fn respond_session_request(
        &self,
        topic: &str,
        response: &JsonRpcResponse,
    ) -> TransportResult<()> {
        self.record(TransportCall::Respond {
            topic: topic.to_string(),
        });
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(response.clone());
        match self
            .respond_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn active_sessions(&self) -> TransportResult<Vec<ActiveSession>> {
        Ok(self
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    async fn disconnect_session(&self, topic: &str, reason: &SdkError) -> TransportResult<()> {
        self.record(TransportCall::Disconnect {
            topic: topic.to_string(),
            code: reason.code,
        });
        if self
            .failing_topics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(topic)
        {
            return Err(TransportError::Other(format!("cannot disconnect {topic}")));
        }
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|s| s.topic != topic);
        Ok(())
    }

    async fn shutdown(&self) -> TransportResult<()> {
        self.record(TransportCall::Shutdown);
        Ok(())
    }
}
