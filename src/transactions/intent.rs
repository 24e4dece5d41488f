// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Validated transaction intents.
//!
//! Whether a payment goes to a classic account or to a contract is decided
//! here, once, and carried as the [`TransactionIntent`] variant. Nothing
//! downstream looks at the address prefix again.

use std::fmt;

use serde::{Deserialize, Serialize};
use stellar_xdr::curr::{
    AccountId, AlphaNum12, AlphaNum4, Asset as XdrAsset, AssetCode12, AssetCode4, PublicKey,
    Uint256,
};

use crate::network::Network;

use super::{TransactionError, TransactionResult, XLM_DECIMALS};

/// Maximum number of intermediate assets in a path payment.
pub const MAX_PATH_LEN: usize = 5;

/// Maximum `MEMO_TEXT` length in bytes.
pub const MAX_MEMO_BYTES: usize = 28;

/// An asset as the user names it: `native` or `CODE:ISSUER`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum Asset {
    Native,
    Credit { code: String, issuer: String },
}

impl Asset {
    pub fn parse(raw: &str) -> TransactionResult<Self> {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("native") || raw.eq_ignore_ascii_case("xlm") {
            return Ok(Asset::Native);
        }
        let (code, issuer) = raw
            .split_once(':')
            .ok_or_else(|| TransactionError::InvalidAsset(raw.to_string()))?;
        Self::credit(code, issuer)
    }

    pub fn credit(code: &str, issuer: &str) -> TransactionResult<Self> {
        if code.is_empty() || code.len() > 12 || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(TransactionError::InvalidAsset(format!(
                "asset code `{code}` must be 1-12 alphanumeric characters"
            )));
        }
        account_bytes(issuer)
            .map_err(|_| TransactionError::InvalidAsset(format!("invalid issuer `{issuer}`")))?;
        Ok(Asset::Credit {
            code: code.to_string(),
            issuer: issuer.to_string(),
        })
    }

    pub fn is_native(&self) -> bool {
        matches!(self, Asset::Native)
    }

    pub fn to_xdr(&self) -> TransactionResult<XdrAsset> {
        match self {
            Asset::Native => Ok(XdrAsset::Native),
            Asset::Credit { code, issuer } => {
                let issuer = account_id(issuer)
                    .map_err(|_| TransactionError::InvalidAsset(format!("invalid issuer `{issuer}`")))?;
                let bytes = code.as_bytes();
                if bytes.len() <= 4 {
                    let mut asset_code = [0u8; 4];
                    asset_code[..bytes.len()].copy_from_slice(bytes);
                    Ok(XdrAsset::CreditAlphanum4(AlphaNum4 {
                        asset_code: AssetCode4(asset_code),
                        issuer,
                    }))
                } else {
                    let mut asset_code = [0u8; 12];
                    asset_code[..bytes.len()].copy_from_slice(bytes);
                    Ok(XdrAsset::CreditAlphanum12(AlphaNum12 {
                        asset_code: AssetCode12(asset_code),
                        issuer,
                    }))
                }
            }
        }
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Asset::Native => f.write_str("native"),
            Asset::Credit { code, issuer } => write!(f, "{code}:{issuer}"),
        }
    }
}

/// Payment destination, classified once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type", content = "address")]
pub enum Recipient {
    /// `G...` account.
    Account(String),
    /// `C...` contract.
    Contract(String),
}

impl Recipient {
    pub fn classify(address: &str) -> TransactionResult<Self> {
        let address = address.trim();
        if stellar_strkey::ed25519::PublicKey::from_string(address).is_ok() {
            return Ok(Recipient::Account(address.to_string()));
        }
        if stellar_strkey::Contract::from_string(address).is_ok() {
            return Ok(Recipient::Contract(address.to_string()));
        }
        Err(TransactionError::InvalidRecipient(address.to_string()))
    }

    pub fn address(&self) -> &str {
        match self {
            Recipient::Account(a) | Recipient::Contract(a) => a,
        }
    }
}

/// A send as entered by the user. Amounts and fee are decimal strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub source: String,
    pub recipient: String,
    pub asset: Asset,
    pub amount: String,
    /// In XLM.
    pub fee: String,
    #[serde(default)]
    pub memo: Option<String>,
    pub timeout_secs: u64,
    pub network: Network,
    /// Spendable balance of `asset`, when known.
    #[serde(default)]
    pub available_balance: Option<String>,
    /// Decimals of the token contract. Defaults to 7.
    #[serde(default)]
    pub token_decimals: Option<u8>,
}

/// A same-account path payment (strict send).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapRequest {
    pub source: String,
    pub send_asset: Asset,
    pub send_amount: String,
    pub dest_asset: Asset,
    pub dest_min: String,
    #[serde(default)]
    pub path: Vec<Asset>,
    pub fee: String,
    #[serde(default)]
    pub memo: Option<String>,
    pub timeout_secs: u64,
    pub network: Network,
    #[serde(default)]
    pub available_balance: Option<String>,
}

/// Fields shared by every intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOptions {
    pub source: String,
    pub fee_stroops: u32,
    pub memo: Option<String>,
    pub timeout_secs: u64,
    pub network: Network,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassicPayment {
    pub options: TxOptions,
    pub destination: String,
    pub asset: Asset,
    /// Stroops.
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractTransfer {
    pub options: TxOptions,
    /// `C...` recipient.
    pub contract: String,
    pub asset: Asset,
    /// Token base units.
    pub amount: i128,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPayment {
    pub options: TxOptions,
    pub send_asset: Asset,
    pub send_amount: i64,
    pub dest_asset: Asset,
    pub dest_min: i64,
    pub path: Vec<Asset>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionIntent {
    ClassicPayment(ClassicPayment),
    ContractInvocation(ContractTransfer),
    PathPayment(PathPayment),
}

impl TransactionIntent {
    pub fn payment(request: PaymentRequest) -> TransactionResult<Self> {
        let recipient = Recipient::classify(&request.recipient)?;
        if recipient.address() == request.source.trim() {
            return Err(TransactionError::SelfPayment);
        }
        let options = tx_options(
            &request.source,
            &request.fee,
            request.memo.as_deref(),
            request.timeout_secs,
            request.network,
        )?;

        match recipient {
            Recipient::Account(destination) => {
                let amount = to_i64(positive_amount(&request.amount, XLM_DECIMALS)?)?;
                check_balance(i128::from(amount), request.available_balance.as_deref(), XLM_DECIMALS)?;
                Ok(TransactionIntent::ClassicPayment(ClassicPayment {
                    options,
                    destination,
                    asset: request.asset,
                    amount,
                }))
            }
            Recipient::Contract(contract) => {
                let decimals = request.token_decimals.unwrap_or(XLM_DECIMALS);
                let amount = positive_amount(&request.amount, decimals)?;
                check_balance(amount, request.available_balance.as_deref(), decimals)?;
                Ok(TransactionIntent::ContractInvocation(ContractTransfer {
                    options,
                    contract,
                    asset: request.asset,
                    amount,
                }))
            }
        }
    }

    pub fn swap(request: SwapRequest) -> TransactionResult<Self> {
        if request.send_asset == request.dest_asset {
            return Err(TransactionError::SameAsset);
        }
        if request.path.len() > MAX_PATH_LEN {
            return Err(TransactionError::InvalidAsset(format!(
                "path has more than {MAX_PATH_LEN} assets"
            )));
        }
        let options = tx_options(
            &request.source,
            &request.fee,
            request.memo.as_deref(),
            request.timeout_secs,
            request.network,
        )?;
        let send_amount = to_i64(positive_amount(&request.send_amount, XLM_DECIMALS)?)?;
        let dest_min = to_i64(positive_amount(&request.dest_min, XLM_DECIMALS)?)?;
        check_balance(
            i128::from(send_amount),
            request.available_balance.as_deref(),
            XLM_DECIMALS,
        )?;

        Ok(TransactionIntent::PathPayment(PathPayment {
            options,
            send_asset: request.send_asset,
            send_amount,
            dest_asset: request.dest_asset,
            dest_min,
            path: request.path,
        }))
    }

    pub fn options(&self) -> &TxOptions {
        match self {
            TransactionIntent::ClassicPayment(p) => &p.options,
            TransactionIntent::ContractInvocation(c) => &c.options,
            TransactionIntent::PathPayment(p) => &p.options,
        }
    }

    pub fn network(&self) -> Network {
        self.options().network
    }

    /// Contract calls must be simulated before they can be signed.
    pub fn requires_simulation(&self) -> bool {
        matches!(self, TransactionIntent::ContractInvocation(_))
    }
}

fn tx_options(
    source: &str,
    fee: &str,
    memo: Option<&str>,
    timeout_secs: u64,
    network: Network,
) -> TransactionResult<TxOptions> {
    let source = source.trim();
    account_bytes(source).map_err(|_| TransactionError::InvalidSource(source.to_string()))?;

    let fee_stroops = parse_amount(fee, XLM_DECIMALS)
        .map_err(|_| TransactionError::InvalidFee(fee.to_string()))?;
    if fee_stroops == 0 {
        return Err(TransactionError::InvalidFee("fee must be greater than zero".to_string()));
    }
    let fee_stroops = u32::try_from(fee_stroops)
        .map_err(|_| TransactionError::InvalidFee(format!("{fee} XLM is too large")))?;

    if timeout_secs == 0 {
        return Err(TransactionError::InvalidTimeout);
    }

    let memo = memo.map(str::trim).filter(|m| !m.is_empty());
    if memo.is_some_and(|m| m.len() > MAX_MEMO_BYTES) {
        return Err(TransactionError::MemoTooLong);
    }

    Ok(TxOptions {
        source: source.to_string(),
        fee_stroops,
        memo: memo.map(str::to_string),
        timeout_secs,
        network,
    })
}

/// Parse a decimal string into base units with `decimals` places.
pub fn parse_amount(amount: &str, decimals: u8) -> TransactionResult<i128> {
    let amount = amount.trim();
    let parts: Vec<&str> = amount.split('.').collect();

    if parts.len() > 2 || amount.is_empty() {
        return Err(TransactionError::InvalidAmount(amount.to_string()));
    }

    let whole = if parts[0].is_empty() {
        0
    } else {
        parts[0]
            .parse::<u128>()
            .map_err(|_| TransactionError::InvalidAmount(amount.to_string()))?
    };

    let fraction = match parts.get(1) {
        Some(frac) if frac.len() > decimals as usize => {
            return Err(TransactionError::InvalidAmount(format!(
                "too many decimal places (max {decimals})"
            )));
        }
        Some(frac) if !frac.is_empty() => {
            let padded = format!("{:0<width$}", frac, width = decimals as usize);
            padded
                .parse::<u128>()
                .map_err(|_| TransactionError::InvalidAmount(amount.to_string()))?
        }
        _ => 0,
    };

    let total = 10u128
        .checked_pow(u32::from(decimals))
        .and_then(|m| whole.checked_mul(m))
        .and_then(|w| w.checked_add(fraction))
        .ok_or_else(|| TransactionError::InvalidAmount("amount overflow".to_string()))?;

    i128::try_from(total).map_err(|_| TransactionError::InvalidAmount("amount overflow".to_string()))
}

fn positive_amount(amount: &str, decimals: u8) -> TransactionResult<i128> {
    let value = parse_amount(amount, decimals)?;
    if value <= 0 {
        return Err(TransactionError::InvalidAmount(
            "amount must be greater than zero".to_string(),
        ));
    }
    Ok(value)
}

fn to_i64(value: i128) -> TransactionResult<i64> {
    i64::try_from(value).map_err(|_| TransactionError::InvalidAmount("amount overflow".to_string()))
}

fn check_balance(amount: i128, available: Option<&str>, decimals: u8) -> TransactionResult<()> {
    let Some(available) = available else {
        return Ok(());
    };
    let available = parse_amount(available, decimals)?;
    if amount > available {
        return Err(TransactionError::InsufficientBalance);
    }
    Ok(())
}

pub(crate) fn account_bytes(address: &str) -> Result<[u8; 32], stellar_strkey::DecodeError> {
    stellar_strkey::ed25519::PublicKey::from_string(address).map(|pk| pk.0)
}

pub(crate) fn account_id(address: &str) -> Result<AccountId, stellar_strkey::DecodeError> {
    account_bytes(address).map(|bytes| AccountId(PublicKey::PublicKeyTypeEd25519(Uint256(bytes))))
}
