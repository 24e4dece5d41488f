// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! The session broker service.
//!
//! Constructed explicitly around a [`SessionTransport`] and brought up with
//! [`SessionBroker::init`]. Every operation except `init` fails with
//! [`BrokerError::NotInitialized`] until then.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::json;
use stellar_xdr::curr::{Limits, ReadXdr, TransactionEnvelope};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::network::Network;
use crate::transactions::TransactionResult;

use super::namespaces::negotiate;
use super::transport::SessionTransport;
use super::types::{
    ActiveSession, JsonRpcResponse, PeerMetadata, SdkError, SessionProposal, SessionRequest,
    SessionState, SUPPORTED_METHODS,
};
use super::{BrokerError, BrokerResult};

/// Size past which settled proposals and disconnected sessions are dropped
/// from the state maps. Pending and active entries are always kept.
pub const MAX_TRACKED_STATES: usize = 64;

/// What the UI should do after a proposal is approved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalOutcome {
    /// Deep-link back to the dApp's native scheme.
    Redirect(String),
    /// Pairing came from a QR code or the dApp has no native scheme.
    ReturnToBrowser { dapp_name: String },
}

/// Restricts session listing to one account on one network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionFilter {
    pub public_key: String,
    pub network: Network,
}

impl SessionFilter {
    pub fn new(public_key: impl Into<String>, network: Network) -> Self {
        Self {
            public_key: public_key.into(),
            network,
        }
    }

    /// `"{chain}:{publicKey}"`, or `None` for networks without a chain id.
    pub fn account(&self) -> Option<String> {
        self.network
            .chain_id()
            .map(|chain| format!("{chain}:{}", self.public_key))
    }

    fn matches(&self, session: &ActiveSession) -> bool {
        self.account()
            .is_some_and(|account| session.has_account(&account))
    }
}

pub struct SessionBroker {
    transport: Arc<dyn SessionTransport>,
    initialized: AtomicBool,
    proposals: Mutex<HashMap<u64, SessionState>>,
    sessions: Mutex<HashMap<String, SessionState>>,
}

impl SessionBroker {
    pub fn new(transport: Arc<dyn SessionTransport>) -> Self {
        Self {
            transport,
            initialized: AtomicBool::new(false),
            proposals: Mutex::new(HashMap::new()),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    // ========== Lifecycle ==========

    pub async fn init(&self, project_id: &str, metadata: &PeerMetadata) -> BrokerResult<()> {
        if self.is_initialized() {
            return Err(BrokerError::AlreadyInitialized);
        }
        if project_id.trim().is_empty() {
            return Err(BrokerError::InvalidRequest("project id is empty".to_string()));
        }
        self.transport.init(project_id, metadata).await?;
        self.initialized.store(true, Ordering::SeqCst);
        info!(wallet = %metadata.name, "Session broker initialized");
        Ok(())
    }

    pub async fn shutdown(&self) -> BrokerResult<()> {
        self.ensure_initialized()?;
        self.initialized.store(false, Ordering::SeqCst);
        self.proposals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.transport.shutdown().await?;
        info!("Session broker shut down");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    pub fn proposal_state(&self, proposal_id: u64) -> Option<SessionState> {
        self.proposals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&proposal_id)
            .copied()
    }

    pub fn session_state(&self, topic: &str) -> Option<SessionState> {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(topic)
            .copied()
    }

    // ========== Proposals ==========

    /// Approve `proposal` for `public_keys` on `active_network`.
    ///
    /// Any failure rejects the proposal over the transport before returning
    /// the error, so no half-approved session is left behind.
    pub async fn approve_session_proposal(
        &self,
        proposal: &SessionProposal,
        public_keys: &[String],
        active_network: Network,
    ) -> BrokerResult<ApprovalOutcome> {
        self.ensure_initialized()?;
        if self.proposal_state(proposal.id) == Some(SessionState::Rejected) {
            return Err(BrokerError::UserRejected(proposal.id));
        }
        self.set_proposal_state(proposal.id, SessionState::Proposed);

        let session = match self.settle(proposal, public_keys, active_network).await {
            Ok(session) => session,
            Err(e) => {
                warn!(
                    proposal_id = proposal.id,
                    dapp = %proposal.proposer.name,
                    error = %e,
                    "Session proposal could not be approved"
                );
                self.reject_session_proposal(proposal, &e.to_string()).await;
                return Err(e);
            }
        };

        self.set_proposal_state(proposal.id, SessionState::Approved);
        self.set_session_state(&session.topic, SessionState::Active);
        info!(
            proposal_id = proposal.id,
            topic = %session.topic,
            dapp = %session.peer.name,
            "Session approved"
        );

        let native = session
            .peer
            .redirect
            .as_ref()
            .and_then(|r| r.native.clone())
            .filter(|scheme| !scheme.is_empty());
        Ok(match native {
            Some(scheme) => ApprovalOutcome::Redirect(scheme),
            None => ApprovalOutcome::ReturnToBrowser {
                dapp_name: session.peer.name,
            },
        })
    }

    /// Reject with `USER_REJECTED`. Never fails; a transport error is logged.
    /// A proposal that was already rejected is not rejected twice.
    pub async fn reject_session_proposal(&self, proposal: &SessionProposal, message: &str) {
        if !self.is_initialized() {
            warn!(proposal_id = proposal.id, "Cannot reject proposal, broker not initialized");
            return;
        }
        if self.proposal_state(proposal.id) == Some(SessionState::Rejected) {
            debug!(proposal_id = proposal.id, "Proposal already rejected");
            return;
        }

        match self
            .transport
            .reject_session(proposal.id, &SdkError::user_rejected(message))
            .await
        {
            Ok(()) => {
                self.set_proposal_state(proposal.id, SessionState::Rejected);
                info!(proposal_id = proposal.id, "Session proposal rejected");
            }
            Err(e) => {
                error!(proposal_id = proposal.id, error = %e, "Failed to reject session proposal");
            }
        }
    }

    async fn settle(
        &self,
        proposal: &SessionProposal,
        public_keys: &[String],
        active_network: Network,
    ) -> BrokerResult<ActiveSession> {
        let active_chain = active_network
            .chain_id()
            .ok_or_else(|| BrokerError::UnsupportedChain(active_network.to_string()))?;
        let namespaces = negotiate(proposal, public_keys, active_chain)?;
        Ok(self
            .transport
            .approve_session(proposal.id, &namespaces)
            .await?)
    }

    // ========== Requests ==========

    /// Sign `request` with `sign` and send `{signedXDR}` back to the dApp.
    ///
    /// A request whose chain differs from `active_chain` is rejected without
    /// calling `sign` or responding with a signature. A transport failure
    /// while responding is reported as [`BrokerError::TransportRespondFailed`].
    pub async fn approve_session_request<F>(
        &self,
        request: &SessionRequest,
        sign: F,
        active_chain: &str,
    ) -> BrokerResult<String>
    where
        F: FnOnce(&str, Network) -> TransactionResult<String>,
    {
        self.ensure_initialized()?;

        if request.chain_id != active_chain {
            let err = BrokerError::WrongNetworkForRequest {
                requested: request.chain_id.clone(),
                active: active_chain.to_string(),
            };
            warn!(
                request_id = request.id,
                requested = %request.chain_id,
                active = %active_chain,
                "Refusing to sign request for another network"
            );
            self.reject_quietly(request, &err.to_string()).await;
            return Err(err);
        }

        let signed = match sign_request(request, sign, active_chain) {
            Ok(signed) => signed,
            Err(e) => {
                warn!(request_id = request.id, error = %e, "Session request could not be signed");
                self.reject_quietly(request, &e.to_string()).await;
                return Err(e);
            }
        };

        let response = JsonRpcResponse::result(request.id, json!({ "signedXDR": signed }));
        if let Err(e) = self
            .transport
            .respond_session_request(&request.topic, &response)
            .await
        {
            let err = BrokerError::TransportRespondFailed(e.to_string());
            error!(request_id = request.id, topic = %request.topic, error = %e, "Failed to deliver signature");
            self.reject_quietly(request, &err.to_string()).await;
            return Err(err);
        }

        info!(
            request_id = request.id,
            topic = %request.topic,
            method = %request.method,
            "Session request signed"
        );
        Ok(signed)
    }

    /// Answer `request` with a `USER_REJECTED` JSON-RPC error.
    pub async fn reject_session_request(
        &self,
        request: &SessionRequest,
        message: &str,
    ) -> BrokerResult<()> {
        self.ensure_initialized()?;
        let response = JsonRpcResponse::error(request.id, SdkError::user_rejected(message));
        self.transport
            .respond_session_request(&request.topic, &response)
            .await?;
        debug!(request_id = request.id, "Session request rejected");
        Ok(())
    }

    async fn reject_quietly(&self, request: &SessionRequest, message: &str) {
        if let Err(e) = self.reject_session_request(request, message).await {
            error!(request_id = request.id, error = %e, "Failed to reject session request");
        }
    }

    // ========== Sessions ==========

    pub async fn get_active_sessions(
        &self,
        filter: Option<&SessionFilter>,
    ) -> BrokerResult<Vec<ActiveSession>> {
        self.ensure_initialized()?;
        let sessions = self.transport.active_sessions().await?;
        Ok(match filter {
            Some(filter) => sessions.into_iter().filter(|s| filter.matches(s)).collect(),
            None => sessions,
        })
    }

    /// Disconnect every matching session concurrently with
    /// `USER_DISCONNECTED`. Returns how many succeeded.
    pub async fn disconnect_all_sessions(&self, filter: Option<&SessionFilter>) -> BrokerResult<usize> {
        let sessions = match self.get_active_sessions(filter).await {
            Ok(sessions) => sessions,
            Err(BrokerError::NotInitialized) => return Err(BrokerError::NotInitialized),
            Err(e) => {
                error!(error = %e, "Failed to list sessions to disconnect");
                return Ok(0);
            }
        };

        let mut tasks = JoinSet::new();
        for session in sessions {
            let transport = self.transport.clone();
            tasks.spawn(async move {
                let result = transport
                    .disconnect_session(&session.topic, &SdkError::user_disconnected())
                    .await;
                (session.topic, result)
            });
        }

        let mut disconnected = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((topic, Ok(()))) => {
                    self.set_session_state(&topic, SessionState::Disconnected);
                    disconnected += 1;
                }
                Ok((topic, Err(e))) => {
                    warn!(topic = %topic, error = %e, "Failed to disconnect a session");
                }
                Err(e) => {
                    warn!(error = %e, "Disconnect task failed");
                }
            }
        }

        debug!(disconnected, "Sessions disconnected");
        Ok(disconnected)
    }

    /// Pair from a wallet deep link carrying a `uri` query parameter.
    pub async fn pair_from_deep_link(&self, link: &str) -> BrokerResult<()> {
        self.ensure_initialized()?;
        let url = Url::parse(link).map_err(|e| BrokerError::InvalidDeepLink(e.to_string()))?;
        let uri = url
            .query_pairs()
            .find(|(key, _)| key == "uri")
            .map(|(_, value)| value.into_owned())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| BrokerError::InvalidDeepLink("missing `uri` parameter".to_string()))?;

        self.transport.pair(&uri).await?;
        info!("Paired from deep link");
        Ok(())
    }

    /// The peer disconnected `topic`.
    pub fn handle_session_deleted(&self, topic: &str) {
        self.set_session_state(topic, SessionState::Disconnected);
        info!(topic = %topic, "Session deleted by peer");
    }

    fn ensure_initialized(&self) -> BrokerResult<()> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(BrokerError::NotInitialized)
        }
    }

    fn set_proposal_state(&self, proposal_id: u64, state: SessionState) {
        let mut proposals = self.proposals.lock().unwrap_or_else(PoisonError::into_inner);
        track(&mut proposals, proposal_id, state, |s| {
            matches!(s, SessionState::Approved | SessionState::Rejected)
        });
    }

    fn set_session_state(&self, topic: &str, state: SessionState) {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        track(&mut sessions, topic.to_string(), state, |s| {
            s == SessionState::Disconnected
        });
    }
}

/// Record `state` for `key`, pruning settled entries other than `key` once
/// the map outgrows [`MAX_TRACKED_STATES`].
fn track<K: Eq + Hash + Clone>(
    map: &mut HashMap<K, SessionState>,
    key: K,
    state: SessionState,
    settled: impl Fn(SessionState) -> bool,
) {
    map.insert(key.clone(), state);
    if map.len() > MAX_TRACKED_STATES {
        let before = map.len();
        map.retain(|k, s| *k == key || !settled(*s));
        debug!(pruned = before - map.len(), "Pruned settled session states");
    }
}

fn sign_request<F>(request: &SessionRequest, sign: F, active_chain: &str) -> BrokerResult<String>
where
    F: FnOnce(&str, Network) -> TransactionResult<String>,
{
    if !SUPPORTED_METHODS.contains(&request.method.as_str()) {
        return Err(BrokerError::UnsupportedMethod(request.method.clone()));
    }
    TransactionEnvelope::from_xdr_base64(&request.xdr, Limits::none())
        .map_err(|e| BrokerError::InvalidRequest(format!("invalid transaction XDR: {e}")))?;
    let network = Network::from_chain_id(active_chain)
        .ok_or_else(|| BrokerError::UnsupportedChain(active_chain.to_string()))?;

    sign(&request.xdr, network).map_err(|e| BrokerError::SigningFailed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::sessions::types::{
        ProposalNamespace, Redirect, STELLAR_SIGN_XDR, USER_DISCONNECTED_CODE, USER_REJECTED_CODE,
    };
    use crate::sessions::TransportError;
    use crate::test_support::{keypair, unsigned_payment_xdr, RecordingTransport, TransportCall};
    use crate::transactions::{sign_xdr, TransactionError};

    const TESTNET: &str = "stellar:testnet";
    const PUBNET: &str = "stellar:pubnet";

    async fn broker() -> (Arc<RecordingTransport>, SessionBroker) {
        let transport = Arc::new(RecordingTransport::new());
        let broker = SessionBroker::new(transport.clone());
        broker
            .init("project-id", &PeerMetadata {
                name: "Wallet".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        (transport, broker)
    }

    fn proposal(id: u64, chains: &[&str]) -> SessionProposal {
        SessionProposal {
            id,
            proposer: PeerMetadata {
                name: "Swap dApp".to_string(),
                ..Default::default()
            },
            required_namespaces: BTreeMap::from([(
                "stellar".to_string(),
                ProposalNamespace {
                    chains: chains.iter().map(|c| c.to_string()).collect(),
                    methods: vec![STELLAR_SIGN_XDR.to_string()],
                    events: vec![],
                },
            )]),
            optional_namespaces: BTreeMap::new(),
        }
    }

    fn request(chain_id: &str, xdr: String) -> SessionRequest {
        SessionRequest {
            id: 42,
            topic: "topic-1".to_string(),
            chain_id: chain_id.to_string(),
            method: STELLAR_SIGN_XDR.to_string(),
            xdr,
        }
    }

    fn signer(calls: &AtomicUsize) -> impl FnOnce(&str, Network) -> TransactionResult<String> + '_ {
        move |xdr: &str, network: Network| {
            calls.fetch_add(1, Ordering::SeqCst);
            sign_xdr(xdr, keypair(1).secret_key(), network).map(|s| s.xdr)
        }
    }

    #[tokio::test]
    async fn operations_require_init() {
        let broker = SessionBroker::new(Arc::new(RecordingTransport::new()));
        assert_eq!(
            broker.get_active_sessions(None).await.unwrap_err(),
            BrokerError::NotInitialized
        );
        assert_eq!(
            broker
                .approve_session_proposal(&proposal(1, &[TESTNET]), &[], Network::Testnet)
                .await
                .unwrap_err(),
            BrokerError::NotInitialized
        );
        assert_eq!(broker.shutdown().await.unwrap_err(), BrokerError::NotInitialized);
    }

    #[tokio::test]
    async fn approve_without_redirect_returns_to_browser() {
        let (transport, broker) = broker().await;
        let pk = keypair(1).public_key().to_string();

        let outcome = broker
            .approve_session_proposal(&proposal(1, &[TESTNET]), &[pk.clone()], Network::Testnet)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            ApprovalOutcome::ReturnToBrowser {
                dapp_name: "Swap dApp".to_string()
            }
        );
        assert_eq!(broker.proposal_state(1), Some(SessionState::Approved));
        assert_eq!(broker.session_state("topic-1"), Some(SessionState::Active));

        let sessions = broker.get_active_sessions(None).await.unwrap();
        assert!(sessions[0].has_account(&format!("{TESTNET}:{pk}")));
        assert!(transport.calls().contains(&TransportCall::Approve(1)));
    }

    #[tokio::test]
    async fn approve_with_native_scheme_redirects() {
        let (transport, broker) = broker().await;
        transport.set_peer(PeerMetadata {
            name: "Swap dApp".to_string(),
            redirect: Some(Redirect {
                native: Some("swapdapp://".to_string()),
                universal: None,
            }),
            ..Default::default()
        });

        let outcome = broker
            .approve_session_proposal(&proposal(1, &[TESTNET]), &[], Network::Testnet)
            .await
            .unwrap();
        assert_eq!(outcome, ApprovalOutcome::Redirect("swapdapp://".to_string()));
    }

    #[tokio::test]
    async fn wrong_network_proposal_is_rejected() {
        let (transport, broker) = broker().await;

        let err = broker
            .approve_session_proposal(&proposal(3, &[PUBNET]), &[], Network::Testnet)
            .await
            .unwrap_err();

        assert!(matches!(err, BrokerError::WrongNetworkForProposal { .. }));
        assert_eq!(broker.proposal_state(3), Some(SessionState::Rejected));
        assert!(transport.calls().iter().any(|c| matches!(
            c,
            TransportCall::Reject { id: 3, code } if *code == USER_REJECTED_CODE
        )));
        assert!(!transport.calls().contains(&TransportCall::Approve(3)));

        assert_eq!(
            broker
                .approve_session_proposal(&proposal(3, &[TESTNET]), &[], Network::Testnet)
                .await
                .unwrap_err(),
            BrokerError::UserRejected(3)
        );
    }

    #[tokio::test]
    async fn failed_approve_call_rejects_same_proposal() {
        let (transport, broker) = broker().await;
        transport.fail_approve(TransportError::Timeout);

        let err = broker
            .approve_session_proposal(&proposal(4, &[TESTNET]), &[], Network::Testnet)
            .await
            .unwrap_err();

        assert_eq!(err, BrokerError::Transport(TransportError::Timeout));
        assert_eq!(broker.proposal_state(4), Some(SessionState::Rejected));
        assert!(broker.get_active_sessions(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reject_is_idempotent() {
        let (transport, broker) = broker().await;
        let p = proposal(5, &[TESTNET]);
        broker.reject_session_proposal(&p, "no").await;
        broker.reject_session_proposal(&p, "no").await;

        let rejects = transport
            .calls()
            .into_iter()
            .filter(|c| matches!(c, TransportCall::Reject { .. }))
            .count();
        assert_eq!(rejects, 1);
    }

    #[tokio::test]
    async fn request_is_signed_and_answered() {
        let (transport, broker) = broker().await;
        let calls = AtomicUsize::new(0);

        let signed = broker
            .approve_session_request(&request(TESTNET, unsigned_payment_xdr()), signer(&calls), TESTNET)
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let responses = transport.responses();
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].id, 42);
        assert_eq!(
            responses[0].result,
            Some(json!({ "signedXDR": signed }))
        );
    }

    #[tokio::test]
    async fn wrong_chain_never_signs_or_responds_with_signature() {
        let (transport, broker) = broker().await;
        let calls = AtomicUsize::new(0);

        let err = broker
            .approve_session_request(&request(PUBNET, unsigned_payment_xdr()), signer(&calls), TESTNET)
            .await
            .unwrap_err();

        assert!(matches!(err, BrokerError::WrongNetworkForRequest { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        let responses = transport.responses();
        assert_eq!(responses.len(), 1);
        assert!(responses[0].result.is_none());
        assert_eq!(responses[0].error.as_ref().unwrap().code, USER_REJECTED_CODE);
    }

    #[tokio::test]
    async fn unparseable_xdr_is_rejected_before_signing() {
        let (transport, broker) = broker().await;
        let calls = AtomicUsize::new(0);

        let err = broker
            .approve_session_request(&request(TESTNET, "bm90IHhkcg==".to_string()), signer(&calls), TESTNET)
            .await
            .unwrap_err();

        assert!(matches!(err, BrokerError::InvalidRequest(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(transport.responses()[0].error.is_some());
    }

    #[tokio::test]
    async fn signing_error_is_rejected() {
        let (transport, broker) = broker().await;

        let err = broker
            .approve_session_request(
                &request(TESTNET, unsigned_payment_xdr()),
                |_: &str, _: Network| Err(TransactionError::InvalidSecretKey),
                TESTNET,
            )
            .await
            .unwrap_err();

        assert_eq!(err, BrokerError::SigningFailed("Invalid secret key".to_string()));
        assert!(transport.responses()[0].error.is_some());
    }

    #[tokio::test]
    async fn respond_failure_is_distinct_and_rejects() {
        let (transport, broker) = broker().await;
        transport.fail_next_respond(TransportError::Other("relay down".to_string()));
        let calls = AtomicUsize::new(0);

        let err = broker
            .approve_session_request(&request(TESTNET, unsigned_payment_xdr()), signer(&calls), TESTNET)
            .await
            .unwrap_err();

        assert!(matches!(err, BrokerError::TransportRespondFailed(msg) if msg.contains("relay down")));
        let responses = transport.responses();
        assert_eq!(responses.len(), 2);
        assert!(responses[0].result.is_some());
        assert!(responses[1].error.is_some());
    }

    #[tokio::test]
    async fn disconnect_all_continues_past_failures() {
        let (transport, broker) = broker().await;
        for id in 1..=3 {
            broker
                .approve_session_proposal(&proposal(id, &[TESTNET]), &[], Network::Testnet)
                .await
                .unwrap();
        }
        transport.fail_disconnect("topic-2");

        let disconnected = broker.disconnect_all_sessions(None).await.unwrap();
        assert_eq!(disconnected, 2);
        assert_eq!(broker.session_state("topic-1"), Some(SessionState::Disconnected));
        assert_eq!(broker.session_state("topic-2"), Some(SessionState::Active));
        assert_eq!(broker.session_state("topic-3"), Some(SessionState::Disconnected));

        let attempted = transport
            .calls()
            .into_iter()
            .filter(|c| matches!(c, TransportCall::Disconnect { code, .. } if *code == USER_DISCONNECTED_CODE))
            .count();
        assert_eq!(attempted, 3);
    }

    #[tokio::test]
    async fn filter_selects_account_on_network() {
        let (_transport, broker) = broker().await;
        let mine = keypair(1).public_key().to_string();
        let other = keypair(2).public_key().to_string();
        broker
            .approve_session_proposal(&proposal(1, &[TESTNET]), &[mine.clone()], Network::Testnet)
            .await
            .unwrap();
        broker
            .approve_session_proposal(&proposal(2, &[TESTNET]), &[other], Network::Testnet)
            .await
            .unwrap();

        let filter = SessionFilter::new(mine.clone(), Network::Testnet);
        let sessions = broker.get_active_sessions(Some(&filter)).await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].topic, "topic-1");

        let on_public = SessionFilter::new(mine, Network::Public);
        assert!(broker.get_active_sessions(Some(&on_public)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn deep_link_pairs_with_uri_parameter() {
        let (transport, broker) = broker().await;
        broker
            .pair_from_deep_link("wallet://wc?uri=wc%3Aabc%402%3Frelay-protocol%3Dirn")
            .await
            .unwrap();
        assert!(transport
            .calls()
            .contains(&TransportCall::Pair("wc:abc@2?relay-protocol=irn".to_string())));

        assert!(matches!(
            broker.pair_from_deep_link("wallet://wc?foo=bar").await,
            Err(BrokerError::InvalidDeepLink(_))
        ));
    }

    #[tokio::test]
    async fn settled_states_are_pruned() {
        let (_transport, broker) = broker().await;
        let count = MAX_TRACKED_STATES as u64 + 10;

        for id in 1..=count {
            broker
                .reject_session_proposal(&proposal(id, &[TESTNET]), "no")
                .await;
        }
        assert_eq!(broker.proposal_state(1), None);
        assert_eq!(broker.proposal_state(count), Some(SessionState::Rejected));
        assert!(broker.proposals.lock().unwrap().len() <= MAX_TRACKED_STATES);

        for id in 1..=count {
            broker
                .approve_session_proposal(&proposal(1000 + id, &[TESTNET]), &[], Network::Testnet)
                .await
                .unwrap();
        }
        broker.handle_session_deleted("topic-1");
        broker.handle_session_deleted("topic-2");
        assert_eq!(broker.session_state("topic-2"), Some(SessionState::Disconnected));
        assert_eq!(broker.session_state("topic-1"), None);
        assert_eq!(broker.session_state("topic-3"), Some(SessionState::Active));
        assert_eq!(
            broker.sessions.lock().unwrap().len(),
            count as usize - 1
        );
    }

    #[tokio::test]
    async fn peer_deletion_and_shutdown() {
        let (transport, broker) = broker().await;
        broker
            .approve_session_proposal(&proposal(1, &[TESTNET]), &[], Network::Testnet)
            .await
            .unwrap();

        broker.handle_session_deleted("topic-1");
        assert_eq!(broker.session_state("topic-1"), Some(SessionState::Disconnected));

        broker.shutdown().await.unwrap();
        assert!(!broker.is_initialized());
        assert!(transport.calls().contains(&TransportCall::Shutdown));
    }
}
