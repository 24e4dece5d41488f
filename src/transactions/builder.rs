// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! XDR composition for [`TransactionIntent`]s.
//!
//! | Intent | Operation |
//! |--------|-----------|
//! | classic, destination exists or non-native | `payment` |
//! | classic, native to a missing account | `createAccount` (min 1 XLM) |
//! | contract recipient | `invokeHostFunction` → SAC `transfer(from, to, amount)` |
//! | swap | `pathPaymentStrictSend` to self |

use sha2::{Digest, Sha256};
use stellar_xdr::curr::{
    ContractIdPreimage, CreateAccountOp, Hash, HashIdPreimage, HashIdPreimageContractId,
    HostFunction, Int128Parts, InvokeContractArgs, InvokeHostFunctionOp, Limits, Memo,
    MuxedAccount, Operation, OperationBody, PathPaymentStrictSendOp, PaymentOp, Preconditions,
    ScAddress, ScSymbol, ScVal, SequenceNumber, StringM, TimeBounds as XdrTimeBounds, TimePoint,
    Transaction, TransactionEnvelope, TransactionExt, TransactionV1Envelope, Uint256, VecM,
    WriteXdr,
};
use tracing::debug;

use crate::ledger::{LedgerError, LedgerService, TimeBounds};
use crate::network::Network;

use super::intent::{
    account_bytes, account_id, Asset, ClassicPayment, ContractTransfer, PathPayment,
    TransactionIntent, TxOptions,
};
use super::{TransactionError, TransactionResult, STROOPS_PER_XLM};

/// Builds envelopes against a ledger for sequence numbers, timebounds and
/// simulation.
pub struct TransactionComposer<'a> {
    ledger: &'a dyn LedgerService,
}

impl<'a> TransactionComposer<'a> {
    pub fn new(ledger: &'a dyn LedgerService) -> Self {
        Self { ledger }
    }

    /// Unsigned envelope for `intent`, not yet simulated.
    pub async fn draft(&self, intent: &TransactionIntent) -> TransactionResult<TransactionEnvelope> {
        let options = intent.options();
        let network = options.network;
        let sequence = self.ledger.load_account(network, &options.source).await?;

        let destination_funded = match intent {
            TransactionIntent::ClassicPayment(payment) if payment.asset.is_native() => {
                match self.ledger.load_account(network, &payment.destination).await {
                    Ok(_) => true,
                    Err(LedgerError::AccountNotFound(_)) => false,
                    Err(e) => return Err(e.into()),
                }
            }
            _ => true,
        };

        let bounds = self
            .ledger
            .fetch_timebounds(network, options.timeout_secs)
            .await?;
        build_envelope(intent, sequence, bounds, destination_funded)
    }

    /// Base64 envelope ready to sign. Contract calls are simulated; classic
    /// operations never are.
    pub async fn compose(&self, intent: &TransactionIntent) -> TransactionResult<String> {
        let draft = self.draft(intent).await?.to_xdr_base64(Limits::none())?;
        if !intent.requires_simulation() {
            return Ok(draft);
        }
        debug!(network = %intent.network(), "Simulating contract invocation");
        Ok(self.ledger.simulate(intent.network(), &draft).await?)
    }
}

/// Assemble the envelope for `intent` from already fetched ledger state.
pub fn build_envelope(
    intent: &TransactionIntent,
    account_sequence: i64,
    bounds: TimeBounds,
    destination_funded: bool,
) -> TransactionResult<TransactionEnvelope> {
    let operation = match intent {
        TransactionIntent::ClassicPayment(payment) => classic_operation(payment, destination_funded)?,
        TransactionIntent::ContractInvocation(transfer) => contract_operation(transfer)?,
        TransactionIntent::PathPayment(swap) => path_payment_operation(swap)?,
    };
    let options = intent.options();

    let seq_num = account_sequence.checked_add(1).ok_or_else(|| {
        TransactionError::Ledger(LedgerError::InvalidResponse("sequence overflow".to_string()))
    })?;

    let tx = Transaction {
        source_account: muxed(&options.source)?,
        fee: options.fee_stroops,
        seq_num: SequenceNumber(seq_num),
        cond: Preconditions::Time(XdrTimeBounds {
            min_time: TimePoint(bounds.min_time),
            max_time: TimePoint(bounds.max_time),
        }),
        memo: memo(options)?,
        operations: vec![operation].try_into()?,
        ext: TransactionExt::V0,
    };

    Ok(TransactionEnvelope::Tx(TransactionV1Envelope {
        tx,
        signatures: VecM::default(),
    }))
}

/// Id of the Stellar Asset Contract wrapping `asset` on `network`.
pub fn sac_contract_id(asset: &Asset, network: Network) -> TransactionResult<[u8; 32]> {
    let preimage = HashIdPreimage::ContractId(HashIdPreimageContractId {
        network_id: Hash(network.network_id()),
        contract_id_preimage: ContractIdPreimage::Asset(asset.to_xdr()?),
    });
    let bytes = preimage.to_xdr(Limits::none())?;
    Ok(Sha256::digest(&bytes).into())
}

/// `C...` address of the Stellar Asset Contract wrapping `asset`.
pub fn sac_contract_address(asset: &Asset, network: Network) -> TransactionResult<String> {
    Ok(stellar_strkey::Contract(sac_contract_id(asset, network)?).to_string())
}

fn classic_operation(payment: &ClassicPayment, destination_funded: bool) -> TransactionResult<Operation> {
    let body = if payment.asset.is_native() && !destination_funded {
        if payment.amount < STROOPS_PER_XLM {
            return Err(TransactionError::StartingBalanceTooLow(
                payment.destination.clone(),
            ));
        }
        OperationBody::CreateAccount(CreateAccountOp {
            destination: account_id(&payment.destination)
                .map_err(|_| TransactionError::InvalidRecipient(payment.destination.clone()))?,
            starting_balance: payment.amount,
        })
    } else {
        OperationBody::Payment(PaymentOp {
            destination: muxed(&payment.destination)
                .map_err(|_| TransactionError::InvalidRecipient(payment.destination.clone()))?,
            asset: payment.asset.to_xdr()?,
            amount: payment.amount,
        })
    };
    Ok(Operation {
        source_account: None,
        body,
    })
}

fn contract_operation(transfer: &ContractTransfer) -> TransactionResult<Operation> {
    let network = transfer.options.network;
    let token = sac_contract_id(&transfer.asset, network)?;
    let to = stellar_strkey::Contract::from_string(&transfer.contract)
        .map_err(|_| TransactionError::InvalidRecipient(transfer.contract.clone()))?;
    let from = account_id(&transfer.options.source)
        .map_err(|_| TransactionError::InvalidSource(transfer.options.source.clone()))?;

    let args: Vec<ScVal> = vec![
        ScVal::Address(ScAddress::Account(from)),
        ScVal::Address(ScAddress::Contract(Hash(to.0))),
        ScVal::I128(Int128Parts {
            hi: (transfer.amount >> 64) as i64,
            lo: transfer.amount as u64,
        }),
    ];

    let host_function = HostFunction::InvokeContract(InvokeContractArgs {
        contract_address: ScAddress::Contract(Hash(token)),
        function_name: ScSymbol(StringM::try_from(b"transfer".to_vec())?),
        args: args.try_into()?,
    });

    Ok(Operation {
        source_account: None,
        body: OperationBody::InvokeHostFunction(InvokeHostFunctionOp {
            host_function,
            auth: VecM::default(),
        }),
    })
}

fn path_payment_operation(swap: &PathPayment) -> TransactionResult<Operation> {
    let path = swap
        .path
        .iter()
        .map(Asset::to_xdr)
        .collect::<TransactionResult<Vec<_>>>()?;

    Ok(Operation {
        source_account: None,
        body: OperationBody::PathPaymentStrictSend(PathPaymentStrictSendOp {
            send_asset: swap.send_asset.to_xdr()?,
            send_amount: swap.send_amount,
            destination: muxed(&swap.options.source)?,
            dest_asset: swap.dest_asset.to_xdr()?,
            dest_min: swap.dest_min,
            path: path.try_into()?,
        }),
    })
}

fn muxed(address: &str) -> TransactionResult<MuxedAccount> {
    account_bytes(address)
        .map(|bytes| MuxedAccount::Ed25519(Uint256(bytes)))
        .map_err(|_| TransactionError::InvalidSource(address.to_string()))
}

fn memo(options: &TxOptions) -> TransactionResult<Memo> {
    match &options.memo {
        Some(text) => Ok(Memo::Text(
            StringM::try_from(text.as_bytes().to_vec()).map_err(|_| TransactionError::MemoTooLong)?,
        )),
        None => Ok(Memo::None),
    }
}
