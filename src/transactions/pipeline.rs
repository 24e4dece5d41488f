// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! The build → sign → submit state machine.
//!
//! Failures never propagate to the caller. They are written to
//! [`TransactionState::error`] and the operation returns `None`, the same way
//! a superseded result returns `None` without touching state.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::ledger::LedgerService;
use crate::network::Network;

use super::builder::TransactionComposer;
use super::generation::{Generation, Generational, Guarded};
use super::intent::TransactionIntent;
use super::signing::sign_xdr;
use super::TransactionError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionState {
    pub transaction_xdr: Option<String>,
    pub signed_transaction_xdr: Option<String>,
    pub transaction_hash: Option<String>,
    pub is_building: bool,
    pub is_submitting: bool,
    pub error: Option<String>,
    pub generation: Option<Generation>,
}

impl Generational for TransactionState {
    fn generation(&self) -> Option<Generation> {
        self.generation
    }

    fn set_generation(&mut self, generation: Option<Generation>) {
        self.generation = generation;
    }
}

pub struct TransactionPipeline {
    ledger: Arc<dyn LedgerService>,
    state: Guarded<TransactionState>,
}

impl TransactionPipeline {
    pub fn new(ledger: Arc<dyn LedgerService>) -> Self {
        Self {
            ledger,
            state: Guarded::new(TransactionState::default()),
        }
    }

    pub fn state(&self) -> TransactionState {
        self.state.snapshot()
    }

    /// Build (and for contract calls, simulate) `intent`.
    ///
    /// Returns the committed XDR, or `None` on failure or when a newer build
    /// superseded this one.
    pub async fn build_transaction(&self, intent: &TransactionIntent) -> Option<String> {
        let generation = self.state.begin(|s| {
            s.is_building = true;
            s.error = None;
            s.transaction_xdr = None;
            s.signed_transaction_xdr = None;
            s.transaction_hash = None;
        });
        debug!(generation = generation.value(), network = %intent.network(), "Building transaction");

        let result = TransactionComposer::new(self.ledger.as_ref())
            .compose(intent)
            .await;

        match result {
            Ok(xdr) => {
                let committed = self.state.commit(generation, |s| {
                    s.transaction_xdr = Some(xdr.clone());
                    s.is_building = false;
                });
                if committed {
                    info!(generation = generation.value(), simulated = intent.requires_simulation(), "Transaction built");
                    Some(xdr)
                } else {
                    debug!(generation = generation.value(), "Build superseded, result dropped");
                    None
                }
            }
            Err(e) => {
                let committed = self.state.commit(generation, |s| {
                    s.error = Some(e.to_string());
                    s.is_building = false;
                });
                if committed {
                    warn!(generation = generation.value(), error = %e, "Transaction build failed");
                }
                None
            }
        }
    }

    /// Sign the built transaction. A transaction that is already signed is
    /// not signed again; its existing signed XDR is returned.
    pub fn sign_transaction(&self, secret_key: &str, network: Network) -> Option<String> {
        self.state.update(|s| {
            let Some(xdr) = s.transaction_xdr.clone() else {
                s.error = Some(TransactionError::NoTransactionToSign.to_string());
                return None;
            };
            if let Some(signed) = &s.signed_transaction_xdr {
                return Some(signed.clone());
            }

            match sign_xdr(&xdr, secret_key, network) {
                Ok(signed) => {
                    debug!(hash = %signed.hash, "Transaction signed");
                    s.signed_transaction_xdr = Some(signed.xdr.clone());
                    s.transaction_hash = Some(signed.hash);
                    s.error = None;
                    Some(signed.xdr)
                }
                Err(e) => {
                    warn!(error = %e, "Transaction signing failed");
                    s.error = Some(e.to_string());
                    None
                }
            }
        })
    }

    /// Submit the signed transaction. Returns the transaction hash.
    pub async fn submit_transaction(&self, network: Network) -> Option<String> {
        let Some(signed) = self.state.snapshot().signed_transaction_xdr else {
            self.state.update(|s| {
                s.error = Some(TransactionError::NoSignedTransactionToSubmit.to_string());
            });
            return None;
        };

        let generation = self.state.resume_or_begin(|s| {
            s.is_submitting = true;
            s.error = None;
        });

        match self.ledger.submit(network, &signed).await {
            Ok(response) => {
                let committed = self.state.commit(generation, |s| {
                    s.transaction_hash = Some(response.hash.clone());
                    s.is_submitting = false;
                });
                if committed {
                    info!(hash = %response.hash, ledger = ?response.ledger, %network, "Transaction submitted");
                    Some(response.hash)
                } else {
                    debug!(generation = generation.value(), "Submit superseded, result dropped");
                    None
                }
            }
            Err(e) => {
                let error = TransactionError::from(e);
                let committed = self.state.commit(generation, |s| {
                    s.error = Some(error.to_string());
                    s.is_submitting = false;
                });
                if committed {
                    warn!(error = %error, %network, "Transaction submission failed");
                }
                None
            }
        }
    }

    /// Back to the initial state. Outstanding builds and submits become stale.
    pub fn reset_transaction(&self) {
        self.state.reset(TransactionState::default());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::LedgerError;
    use crate::test_support::{keypair, payment_intent, ScriptedLedger, NATIVE_SAC_TESTNET};

    struct Fixture {
        ledger: Arc<ScriptedLedger>,
        pipeline: TransactionPipeline,
        source: String,
        destination: String,
    }

    fn fixture() -> Fixture {
        let ledger = Arc::new(ScriptedLedger::new());
        let source = keypair(1).public_key().to_string();
        let destination = keypair(2).public_key().to_string();
        ledger.fund(&source, 100);
        ledger.fund(&destination, 5);
        Fixture {
            pipeline: TransactionPipeline::new(ledger.clone()),
            ledger,
            source,
            destination,
        }
    }

    fn payment_amount(xdr: &str) -> i64 {
        use stellar_xdr::curr::{Limits, OperationBody, ReadXdr, TransactionEnvelope};
        let TransactionEnvelope::Tx(v1) = TransactionEnvelope::from_xdr_base64(xdr, Limits::none()).unwrap() else {
            panic!("expected v1 envelope");
        };
        match &v1.tx.operations[0].body {
            OperationBody::Payment(op) => op.amount,
            other => panic!("unexpected operation {other:?}"),
        }
    }

    #[tokio::test]
    async fn full_cycle() {
        let f = fixture();
        let intent = payment_intent(&f.source, &f.destination, "1");

        let xdr = f.pipeline.build_transaction(&intent).await.unwrap();
        assert_eq!(f.pipeline.state().transaction_xdr.as_deref(), Some(xdr.as_str()));
        assert!(!f.pipeline.state().is_building);

        let signed = f
            .pipeline
            .sign_transaction(keypair(1).secret_key(), Network::Testnet)
            .unwrap();
        let hash = f.pipeline.submit_transaction(Network::Testnet).await.unwrap();

        let state = f.pipeline.state();
        assert_eq!(state.signed_transaction_xdr.as_deref(), Some(signed.as_str()));
        assert_eq!(state.transaction_hash.as_deref(), Some(hash.as_str()));
        assert!(!state.is_submitting);
        assert_eq!(state.error, None);
        assert_eq!(f.ledger.submitted(), vec![signed]);
    }

    #[tokio::test]
    async fn later_intent_wins_when_earlier_resolves_last() {
        let f = fixture();
        let ten = payment_intent(&f.source, &f.destination, "10");
        let twenty = payment_intent(&f.source, &f.destination, "20");

        let release_ten = f.ledger.gate_timebounds();
        let release_twenty = f.ledger.gate_timebounds();

        let (first, second, ()) = tokio::join!(
            f.pipeline.build_transaction(&ten),
            f.pipeline.build_transaction(&twenty),
            async {
                for _ in 0..5 {
                    tokio::task::yield_now().await;
                }
                release_twenty.send(()).unwrap();
                for _ in 0..5 {
                    tokio::task::yield_now().await;
                }
                release_ten.send(()).unwrap();
            }
        );

        assert_eq!(first, None);
        let committed = second.unwrap();
        assert_eq!(payment_amount(&committed), 200_000_000);
        let state = f.pipeline.state();
        assert_eq!(state.transaction_xdr, Some(committed));
        assert!(!state.is_building);
        assert_eq!(state.error, None);
    }

    #[tokio::test]
    async fn superseded_failure_is_not_reported() {
        let f = fixture();
        let bad = payment_intent(&f.source, &keypair(9).public_key().to_string(), "0.1");
        let good = payment_intent(&f.source, &f.destination, "2");

        let release_bad = f.ledger.gate_timebounds();
        let (first, second, ()) = tokio::join!(
            f.pipeline.build_transaction(&bad),
            f.pipeline.build_transaction(&good),
            async {
                for _ in 0..5 {
                    tokio::task::yield_now().await;
                }
                release_bad.send(()).unwrap();
            }
        );

        assert_eq!(first, None);
        assert!(second.is_some());
        assert_eq!(f.pipeline.state().error, None);
    }

    #[tokio::test]
    async fn build_failure_is_recorded() {
        let f = fixture();
        let unfunded_source = keypair(7).public_key().to_string();
        let intent = payment_intent(&unfunded_source, &f.destination, "1");

        assert_eq!(f.pipeline.build_transaction(&intent).await, None);
        let state = f.pipeline.state();
        assert!(!state.is_building);
        assert!(state.error.unwrap().contains("Account not found"));
    }

    #[tokio::test]
    async fn contract_recipient_is_simulated() {
        let f = fixture();
        let intent = payment_intent(&f.source, NATIVE_SAC_TESTNET, "1");
        f.pipeline.build_transaction(&intent).await.unwrap();
        assert_eq!(f.ledger.simulate_calls(), 1);
    }

    #[test]
    fn sign_without_build() {
        let f = fixture();
        assert_eq!(
            f.pipeline
                .sign_transaction(keypair(1).secret_key(), Network::Testnet),
            None
        );
        assert_eq!(
            f.pipeline.state().error.as_deref(),
            Some("No transaction to sign")
        );
    }

    #[tokio::test]
    async fn submit_without_signature() {
        let f = fixture();
        assert_eq!(f.pipeline.submit_transaction(Network::Testnet).await, None);
        assert_eq!(
            f.pipeline.state().error.as_deref(),
            Some("No signed transaction to submit")
        );
        assert!(f.ledger.submitted().is_empty());
    }

    #[tokio::test]
    async fn resigning_returns_existing_signature() {
        let f = fixture();
        let intent = payment_intent(&f.source, &f.destination, "1");
        f.pipeline.build_transaction(&intent).await.unwrap();

        let first = f
            .pipeline
            .sign_transaction(keypair(1).secret_key(), Network::Testnet)
            .unwrap();
        let second = f
            .pipeline
            .sign_transaction(keypair(3).secret_key(), Network::Testnet)
            .unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn signing_errors_are_captured() {
        let f = fixture();
        let intent = payment_intent(&f.source, &f.destination, "1");
        f.pipeline.build_transaction(&intent).await.unwrap();

        assert_eq!(f.pipeline.sign_transaction("garbage", Network::Testnet), None);
        assert_eq!(f.pipeline.state().error.as_deref(), Some("Invalid secret key"));
    }

    #[tokio::test]
    async fn submit_failure_is_recorded() {
        let f = fixture();
        f.ledger
            .fail_submit(LedgerError::SubmissionFailed("tx_bad_seq".to_string()));
        let intent = payment_intent(&f.source, &f.destination, "1");
        f.pipeline.build_transaction(&intent).await.unwrap();
        f.pipeline
            .sign_transaction(keypair(1).secret_key(), Network::Testnet)
            .unwrap();

        assert_eq!(f.pipeline.submit_transaction(Network::Testnet).await, None);
        let state = f.pipeline.state();
        assert!(!state.is_submitting);
        assert!(state.error.unwrap().contains("tx_bad_seq"));
    }

    #[tokio::test]
    async fn reset_restores_initial_state() {
        let f = fixture();
        let intent = payment_intent(&f.source, &f.destination, "1");
        f.pipeline.build_transaction(&intent).await.unwrap();
        f.pipeline
            .sign_transaction(keypair(1).secret_key(), Network::Testnet)
            .unwrap();

        f.pipeline.reset_transaction();
        assert_eq!(f.pipeline.state(), TransactionState::default());
    }

    #[tokio::test]
    async fn build_after_reset_discards_stale_submit() {
        let f = fixture();
        let intent = payment_intent(&f.source, &f.destination, "1");
        f.pipeline.build_transaction(&intent).await.unwrap();
        f.pipeline
            .sign_transaction(keypair(1).secret_key(), Network::Testnet)
            .unwrap();

        let release_submit = f.ledger.gate_submit();
        let (submitted, ()) = tokio::join!(f.pipeline.submit_transaction(Network::Testnet), async {
            for _ in 0..5 {
                tokio::task::yield_now().await;
            }
            f.pipeline.reset_transaction();
            release_submit.send(()).unwrap();
        });

        assert_eq!(submitted, None);
        assert_eq!(f.pipeline.state(), TransactionState::default());
    }
}
