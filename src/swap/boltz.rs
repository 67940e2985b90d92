use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::limits::SwapLimits;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BoltzChain {
    #[serde(rename = "BTC")]
    Btc,
    #[serde(rename = "L-BTC")]
    LBtc,
}

impl BoltzChain {
    pub fn as_str(&self) -> &'static str {
        match self {
            BoltzChain::Btc => "BTC",
            BoltzChain::LBtc => "L-BTC",
        }
    }
}

impl fmt::Display for BoltzChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BoltzChain {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "BTC" => Ok(BoltzChain::Btc),
            "L-BTC" | "LBTC" => Ok(BoltzChain::LBtc),
            other => anyhow::bail!("unknown chain: {other}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainDirection {
    pub from: BoltzChain,
    pub to: BoltzChain,
}

/// Pair info keyed by `from` then `to` asset, as the provider publishes it.
pub type PairMap<T> = HashMap<String, HashMap<String, T>>;

pub fn pair<T>(pairs: &PairMap<T>, from: BoltzChain, to: BoltzChain) -> Result<&T> {
    pairs
        .get(from.as_str())
        .and_then(|m| m.get(to.as_str()))
        .with_context(|| format!("provider does not offer pair {from}/{to}"))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmarinePair {
    pub hash: String,
    pub rate: f64,
    pub limits: SwapLimits,
    pub fees: SubmarineFees,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmarineFees {
    pub percentage: f64,
    pub miner_fees: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReversePair {
    pub hash: String,
    pub rate: f64,
    pub limits: SwapLimits,
    pub fees: ReverseFees,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReverseFees {
    pub percentage: f64,
    pub miner_fees: ReverseMinerFees,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ReverseMinerFees {
    pub lockup: u64,
    pub claim: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainPair {
    pub hash: String,
    pub rate: f64,
    pub limits: SwapLimits,
    pub fees: ChainFees,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainFees {
    pub percentage: f64,
    pub miner_fees: ChainMinerFees,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChainMinerFees {
    pub server: u64,
    pub user: UserMinerFees,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct UserMinerFees {
    pub claim: u64,
    pub lockup: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmarineRequest {
    pub invoice: String,
    pub from: BoltzChain,
    pub to: BoltzChain,
    pub refund_public_key: String,
    pub referral_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmarineResponse {
    pub id: String,
    pub bip21: String,
    pub address: String,
    pub expected_amount: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim_public_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub swap_tree: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accept_zero_conf: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_block_height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blinding_key: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReverseRequest {
    pub address: String,
    pub from: BoltzChain,
    pub to: BoltzChain,
    pub claim_covenant: bool,
    pub invoice_amount: u64,
    pub preimage_hash: String,
    pub claim_public_key: String,
    pub referral_id: String,
    pub description: String,
    pub address_signature: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReverseResponse {
    pub id: String,
    pub invoice: String,
    pub swap_tree: Value,
    pub lockup_address: String,
    pub refund_public_key: String,
    pub timeout_block_height: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub onchain_amount: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blinding_key: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainRequest {
    pub user_lock_amount: u64,
    pub claim_address: String,
    pub from: BoltzChain,
    pub to: BoltzChain,
    pub preimage_hash: String,
    pub claim_public_key: String,
    pub refund_public_key: String,
    pub referral_id: String,
    pub pair_hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainResponse {
    pub id: String,
    pub claim_details: ChainSwapDetails,
    pub lockup_details: ChainSwapDetails,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainSwapDetails {
    pub swap_tree: Value,
    pub lockup_address: String,
    pub server_public_key: String,
    pub timeout_block_height: u32,
    pub amount: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blinding_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refund_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bip21: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Signed BIP21 a receiver publishes behind a magic routing hint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MagicRouteHintInfo {
    pub bip21: String,
    pub signature: String,
}

#[async_trait]
pub trait SwapProviderClient: Send + Sync {
    async fn get_submarine_info(&self) -> Result<PairMap<SubmarinePair>>;

    async fn get_reverse_info(&self) -> Result<PairMap<ReversePair>>;

    async fn get_chain_info(&self) -> Result<PairMap<ChainPair>>;

    async fn create_submarine(&self, request: &SubmarineRequest) -> Result<SubmarineResponse>;

    async fn create_reverse(&self, request: &ReverseRequest) -> Result<ReverseResponse>;

    async fn create_chain(&self, request: &ChainRequest) -> Result<ChainResponse>;

    async fn get_magic_route_hint_info(&self, invoice: &str) -> Result<MagicRouteHintInfo>;
}

#[derive(Clone)]
pub struct BoltzHttpClient {
    http: reqwest::Client,
    base_url: String,
}

impl BoltzHttpClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v2{path}", self.base_url)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let resp = self
            .http
            .get(self.url(path))
            .send()
            .await
            .with_context(|| format!("GET {path}"))?;
        read_json(resp, path).await
    }

    async fn post<B: Serialize + Sync, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let resp = self
            .http
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .with_context(|| format!("POST {path}"))?;
        read_json(resp, path).await
    }
}

async fn read_json<T: DeserializeOwned>(resp: reqwest::Response, path: &str) -> Result<T> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("{path} returned {status}: {body}");
    }
    resp.json()
        .await
        .with_context(|| format!("decode {path} response"))
}

#[async_trait]
impl SwapProviderClient for BoltzHttpClient {
    async fn get_submarine_info(&self) -> Result<PairMap<SubmarinePair>> {
        self.get("/swap/submarine").await
    }

    async fn get_reverse_info(&self) -> Result<PairMap<ReversePair>> {
        self.get("/swap/reverse").await
    }

    async fn get_chain_info(&self) -> Result<PairMap<ChainPair>> {
        self.get("/swap/chain").await
    }

    async fn create_submarine(&self, request: &SubmarineRequest) -> Result<SubmarineResponse> {
        self.post("/swap/submarine", request).await
    }

    async fn create_reverse(&self, request: &ReverseRequest) -> Result<ReverseResponse> {
        self.post("/swap/reverse", request).await
    }

    async fn create_chain(&self, request: &ChainRequest) -> Result<ChainResponse> {
        self.post("/swap/chain", request).await
    }

    async fn get_magic_route_hint_info(&self, invoice: &str) -> Result<MagicRouteHintInfo> {
        self.get(&format!("/swap/reverse/{invoice}/bip21")).await
    }
}
