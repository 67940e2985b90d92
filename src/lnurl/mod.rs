//! LNURL-pay types shared by the local resolver, the remote client and the payment router.

pub mod isomorphic;
pub mod local;
pub mod remote;

use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::liquid::assets::LiquidAsset;
use crate::wallet::WalletAccount;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentOptionCode {
    Lightning,
    Btc,
    Usdt,
}

impl PaymentOptionCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentOptionCode::Lightning => "LIGHTNING",
            PaymentOptionCode::Btc => "BTC",
            PaymentOptionCode::Usdt => "USDT",
        }
    }

    pub fn liquid_asset(&self) -> Option<LiquidAsset> {
        match self {
            PaymentOptionCode::Lightning => None,
            PaymentOptionCode::Btc => Some(LiquidAsset::Btc),
            PaymentOptionCode::Usdt => Some(LiquidAsset::Usdt),
        }
    }
}

impl fmt::Display for PaymentOptionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentOptionCode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "LIGHTNING" => Ok(PaymentOptionCode::Lightning),
            "BTC" => Ok(PaymentOptionCode::Btc),
            "USDT" => Ok(PaymentOptionCode::Usdt),
            other => anyhow::bail!("unknown payment option code: {other}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentOptionNetwork {
    Bitcoin,
    Liquid,
}

impl PaymentOptionNetwork {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentOptionNetwork::Bitcoin => "BITCOIN",
            PaymentOptionNetwork::Liquid => "LIQUID",
        }
    }
}

impl fmt::Display for PaymentOptionNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentOptionNetwork {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "BITCOIN" => Ok(PaymentOptionNetwork::Bitcoin),
            "LIQUID" => Ok(PaymentOptionNetwork::Liquid),
            other => anyhow::bail!("unknown payment option network: {other}"),
        }
    }
}

/// One way a payment address can be paid. Bounds are in the option's base unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentOption {
    pub code: PaymentOptionCode,
    pub network: PaymentOptionNetwork,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_sendable: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_sendable: Option<Decimal>,
}

impl PaymentOption {
    pub fn lightning(min_sendable: Option<Decimal>, max_sendable: Option<Decimal>) -> Self {
        Self {
            code: PaymentOptionCode::Lightning,
            network: PaymentOptionNetwork::Bitcoin,
            min_sendable,
            max_sendable,
        }
    }

    pub fn matches(&self, code: PaymentOptionCode, network: PaymentOptionNetwork) -> bool {
        self.code == code && self.network == network
    }
}

/// Public part of a currency a payment address accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyInfo {
    pub code: PaymentOptionCode,
    pub name: String,
    pub network: PaymentOptionNetwork,
    pub symbol: String,
}

/// A currency a locally hosted wallet accepts, with the account that receives it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountCurrency {
    pub code: PaymentOptionCode,
    pub network: PaymentOptionNetwork,
    pub asset: LiquidAsset,
    pub wallet_account: WalletAccount,
}

impl AccountCurrency {
    pub fn liquid(asset: LiquidAsset, code: PaymentOptionCode, wallet_account: WalletAccount) -> Self {
        Self {
            code,
            network: PaymentOptionNetwork::Liquid,
            asset,
            wallet_account,
        }
    }

    pub fn info(&self) -> CurrencyInfo {
        CurrencyInfo {
            code: self.code,
            name: self.asset.name().to_string(),
            network: self.network,
            symbol: self.asset.symbol().to_string(),
        }
    }
}

/// Query of an LNURL-pay callback as it arrives from the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackParams {
    pub account: Option<String>,
    pub amount: Option<String>,
    pub currency: Option<String>,
    pub network: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainPaymentRequest {
    /// Base units of the requested currency.
    pub amount: Decimal,
    pub currency: PaymentOptionCode,
    pub network: PaymentOptionNetwork,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LnUrlStatus {
    #[serde(rename = "ERROR")]
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LnUrlError {
    pub status: LnUrlStatus,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnchainPayload {
    pub currency: PaymentOptionCode,
    pub network: PaymentOptionNetwork,
    pub address: String,
    pub bip21: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRequestResponse {
    pub pr: String,
    #[serde(default)]
    pub routes: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub onchain: Option<OnchainPayload>,
}

/// Callback answer: a payment request or a typed error, never a transport failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LnUrlResponse {
    Error(LnUrlError),
    Payment(PaymentRequestResponse),
}

impl LnUrlResponse {
    pub fn error(reason: impl Into<String>) -> Self {
        LnUrlResponse::Error(LnUrlError {
            status: LnUrlStatus::Error,
            reason: reason.into(),
        })
    }

    pub fn invoice(pr: impl Into<String>) -> Self {
        LnUrlResponse::Payment(PaymentRequestResponse {
            pr: pr.into(),
            routes: Vec::new(),
            onchain: None,
        })
    }

    pub fn onchain(payload: OnchainPayload) -> Self {
        LnUrlResponse::Payment(PaymentRequestResponse {
            pr: String::new(),
            routes: Vec::new(),
            onchain: Some(payload),
        })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, LnUrlResponse::Error(_))
    }
}

/// First step of LNURL-pay (LUD-06).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayRequestInfo {
    pub callback: String,
    /// Millisatoshis.
    pub min_sendable: u64,
    /// Millisatoshis.
    pub max_sendable: u64,
    pub metadata: String,
    #[serde(default)]
    pub currencies: Vec<CurrencyInfo>,
    pub tag: String,
}

/// Splits `user@domain`, lowercasing both parts.
pub fn split_money_address(money_address: &str) -> Option<(String, String)> {
    let (user, domain) = money_address.trim().split_once('@')?;
    if user.is_empty() || domain.is_empty() {
        return None;
    }
    Some((user.to_lowercase(), domain.to_lowercase()))
}

/// Resolves a `user@domain` payment address into payment options and payment requests.
#[async_trait]
pub trait MoneyAddressResolver: Send + Sync {
    async fn get_payment_options(&self, money_address: &str) -> Result<Vec<PaymentOption>>;

    async fn get_invoice_response(
        &self,
        money_address: &str,
        amount_sats: u64,
    ) -> Result<LnUrlResponse>;

    async fn get_chain_response(
        &self,
        money_address: &str,
        request: &ChainPaymentRequest,
    ) -> Result<LnUrlResponse>;
}
