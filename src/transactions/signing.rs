// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Network-bound transaction hashes and ed25519 signatures.
//!
//! ```text
//! hash = sha256( TransactionSignaturePayload { sha256(passphrase), tagged tx } )
//! ```
//!
//! The decorated signature hint is the last four bytes of the public key.
//! V0 envelopes are upgraded to V1 before signing.

use ed25519_dalek::{Signer, SigningKey};
use sha2::{Digest, Sha256};
use stellar_xdr::curr::{
    DecoratedSignature, Hash, Limits, MuxedAccount, Preconditions, ReadXdr, Signature,
    SignatureHint, Transaction, TransactionEnvelope, TransactionExt, TransactionSignaturePayload,
    TransactionSignaturePayloadTaggedTransaction, TransactionV0Envelope, TransactionV1Envelope,
    WriteXdr,
};
use zeroize::Zeroizing;

use crate::network::Network;

use super::{TransactionError, TransactionResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    /// Base64 envelope including the new signature.
    pub xdr: String,
    /// Hex transaction hash.
    pub hash: String,
}

/// Hash that signers commit to for `envelope` on `network`.
pub fn transaction_hash(envelope: &TransactionEnvelope, network: Network) -> TransactionResult<[u8; 32]> {
    let tagged_transaction = match envelope {
        TransactionEnvelope::TxV0(v0) => {
            TransactionSignaturePayloadTaggedTransaction::Tx(upgrade_v0(v0.clone()).tx)
        }
        TransactionEnvelope::Tx(v1) => TransactionSignaturePayloadTaggedTransaction::Tx(v1.tx.clone()),
        TransactionEnvelope::TxFeeBump(bump) => {
            TransactionSignaturePayloadTaggedTransaction::TxFeeBump(bump.tx.clone())
        }
    };
    let payload = TransactionSignaturePayload {
        network_id: Hash(network.network_id()),
        tagged_transaction,
    };
    let bytes = payload.to_xdr(Limits::none())?;
    Ok(Sha256::digest(&bytes).into())
}

/// Append a signature by `secret_key` to `envelope`.
pub fn sign_envelope(
    envelope: TransactionEnvelope,
    secret_key: &str,
    network: Network,
) -> TransactionResult<TransactionEnvelope> {
    let signing_key = signing_key(secret_key)?;
    let envelope = match envelope {
        TransactionEnvelope::TxV0(v0) => TransactionEnvelope::Tx(upgrade_v0(v0)),
        other => other,
    };

    let hash = transaction_hash(&envelope, network)?;
    let signature = signing_key.sign(&hash);
    let public_key = signing_key.verifying_key().to_bytes();
    let mut hint = [0u8; 4];
    hint.copy_from_slice(&public_key[28..]);
    let decorated = DecoratedSignature {
        hint: SignatureHint(hint),
        signature: Signature(signature.to_bytes().to_vec().try_into()?),
    };

    Ok(match envelope {
        TransactionEnvelope::Tx(mut v1) => {
            let mut signatures = v1.signatures.to_vec();
            signatures.push(decorated);
            v1.signatures = signatures.try_into()?;
            TransactionEnvelope::Tx(v1)
        }
        TransactionEnvelope::TxFeeBump(mut bump) => {
            let mut signatures = bump.signatures.to_vec();
            signatures.push(decorated);
            bump.signatures = signatures.try_into()?;
            TransactionEnvelope::TxFeeBump(bump)
        }
        TransactionEnvelope::TxV0(_) => {
            return Err(TransactionError::Xdr("v0 envelope was not upgraded".to_string()))
        }
    })
}

/// Parse, sign and re-encode a base64 envelope.
pub fn sign_xdr(xdr: &str, secret_key: &str, network: Network) -> TransactionResult<SignedTransaction> {
    let envelope = TransactionEnvelope::from_xdr_base64(xdr, Limits::none())?;
    let signed = sign_envelope(envelope, secret_key, network)?;
    let hash = transaction_hash(&signed, network)?;
    Ok(SignedTransaction {
        xdr: signed.to_xdr_base64(Limits::none())?,
        hash: hex(&hash),
    })
}

fn signing_key(secret_key: &str) -> TransactionResult<SigningKey> {
    let secret = stellar_strkey::ed25519::PrivateKey::from_string(secret_key.trim())
        .map_err(|_| TransactionError::InvalidSecretKey)?;
    let seed = Zeroizing::new(secret.0);
    Ok(SigningKey::from_bytes(&seed))
}

fn upgrade_v0(v0: TransactionV0Envelope) -> TransactionV1Envelope {
    let tx = v0.tx;
    TransactionV1Envelope {
        tx: Transaction {
            source_account: MuxedAccount::Ed25519(tx.source_account_ed25519),
            fee: tx.fee,
            seq_num: tx.seq_num,
            cond: tx
                .time_bounds
                .map(Preconditions::Time)
                .unwrap_or(Preconditions::None),
            memo: tx.memo,
            operations: tx.operations,
            ext: TransactionExt::V0,
        },
        signatures: v0.signatures,
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::TimeBounds;
    use crate::test_support::{keypair, payment_intent};
    use crate::transactions::builder::build_envelope;
    use ed25519_dalek::{Verifier, VerifyingKey};
    use stellar_xdr::curr::{TransactionV0, TransactionV0Ext};

    fn draft() -> TransactionEnvelope {
        let intent = payment_intent(keypair(1).public_key(), keypair(2).public_key(), "3");
        build_envelope(
            &intent,
            10,
            TimeBounds {
                min_time: 0,
                max_time: 1_900_000_000,
            },
            true,
        )
        .unwrap()
    }

    #[test]
    fn signature_verifies_against_network_hash() {
        let signer = keypair(1);
        let xdr = draft().to_xdr_base64(Limits::none()).unwrap();
        let signed = sign_xdr(&xdr, signer.secret_key(), Network::Testnet).unwrap();

        let envelope = TransactionEnvelope::from_xdr_base64(&signed.xdr, Limits::none()).unwrap();
        let TransactionEnvelope::Tx(v1) = &envelope else {
            panic!("expected v1");
        };
        assert_eq!(v1.signatures.len(), 1);

        let hash = transaction_hash(&envelope, Network::Testnet).unwrap();
        assert_eq!(signed.hash, hex(&hash));

        let public = stellar_strkey::ed25519::PublicKey::from_string(signer.public_key()).unwrap();
        assert_eq!(&v1.signatures[0].hint.0[..], &public.0[28..]);
        let verifying = VerifyingKey::from_bytes(&public.0).unwrap();
        let sig_bytes: [u8; 64] = v1.signatures[0].signature.0.to_vec().try_into().unwrap();
        let signature = ed25519_dalek::Signature::from_bytes(&sig_bytes);
        assert!(verifying.verify(&hash, &signature).is_ok());

        let other_network = transaction_hash(&envelope, Network::Public).unwrap();
        assert!(verifying.verify(&other_network, &signature).is_err());
    }

    #[test]
    fn v0_envelope_is_signed_as_v1() {
        let TransactionEnvelope::Tx(v1) = draft() else {
            panic!("expected v1");
        };
        let MuxedAccount::Ed25519(source) = v1.tx.source_account.clone() else {
            panic!("expected plain account");
        };
        let Preconditions::Time(bounds) = v1.tx.cond.clone() else {
            panic!("expected time bounds");
        };
        let v0 = TransactionEnvelope::TxV0(TransactionV0Envelope {
            tx: TransactionV0 {
                source_account_ed25519: source,
                fee: v1.tx.fee,
                seq_num: v1.tx.seq_num.clone(),
                time_bounds: Some(bounds),
                memo: v1.tx.memo.clone(),
                operations: v1.tx.operations.clone(),
                ext: TransactionV0Ext::V0,
            },
            signatures: Default::default(),
        });

        assert_eq!(
            transaction_hash(&v0, Network::Testnet).unwrap(),
            transaction_hash(&TransactionEnvelope::Tx(v1), Network::Testnet).unwrap()
        );

        let signed = sign_envelope(v0, keypair(1).secret_key(), Network::Testnet).unwrap();
        assert!(matches!(signed, TransactionEnvelope::Tx(ref s) if s.signatures.len() == 1));
    }

    #[test]
    fn bad_inputs_are_errors() {
        let xdr = draft().to_xdr_base64(Limits::none()).unwrap();
        assert_eq!(
            sign_xdr(&xdr, "SNOTASECRET", Network::Testnet).unwrap_err(),
            TransactionError::InvalidSecretKey
        );
        assert!(matches!(
            sign_xdr("not xdr", keypair(1).secret_key(), Network::Testnet),
            Err(TransactionError::Xdr(_))
        ));
    }
}
