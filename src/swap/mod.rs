pub mod boltz;
pub mod covenant;
pub mod fee_cache;
pub mod keys;
pub mod limits;
pub mod notifier;
pub mod service;
pub mod store;

use serde::{Deserialize, Serialize};

use self::boltz::{
    ChainRequest, ChainResponse, ReverseRequest, ReverseResponse, SubmarineRequest,
    SubmarineResponse,
};
use self::keys::SecretHex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SwapProvider {
    Boltz,
}

impl SwapProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            SwapProvider::Boltz => "BOLTZ",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SwapType {
    Submarine,
    Reverse,
    Chain,
}

impl SwapType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SwapType::Submarine => "SUBMARINE",
            SwapType::Reverse => "REVERSE",
            SwapType::Chain => "CHAIN",
        }
    }
}

/// What was sent to the provider, plus the key material needed to claim or refund later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SwapRequestPayload {
    Submarine {
        #[serde(flatten)]
        request: SubmarineRequest,
        #[serde(rename = "privateKey")]
        private_key: SecretHex,
    },
    Reverse {
        #[serde(flatten)]
        request: ReverseRequest,
        preimage: SecretHex,
        #[serde(rename = "privateKey")]
        private_key: SecretHex,
    },
    Chain {
        #[serde(flatten)]
        request: ChainRequest,
        preimage: SecretHex,
        #[serde(rename = "claimPrivateKey")]
        claim_private_key: SecretHex,
        #[serde(rename = "refundPrivateKey")]
        refund_private_key: SecretHex,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SwapResponsePayload {
    Submarine(SubmarineResponse),
    Reverse(ReverseResponse),
    Chain(ChainResponse),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapRequestRecord {
    pub provider: SwapProvider,
    #[serde(flatten)]
    pub payload: SwapRequestPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapResponseRecord {
    pub provider: SwapProvider,
    #[serde(flatten)]
    pub payload: SwapResponsePayload,
}

impl SwapRequestRecord {
    pub fn boltz(payload: SwapRequestPayload) -> Self {
        Self {
            provider: SwapProvider::Boltz,
            payload,
        }
    }

    pub fn swap_type(&self) -> SwapType {
        match self.payload {
            SwapRequestPayload::Submarine { .. } => SwapType::Submarine,
            SwapRequestPayload::Reverse { .. } => SwapType::Reverse,
            SwapRequestPayload::Chain { .. } => SwapType::Chain,
        }
    }
}

impl SwapResponseRecord {
    pub fn boltz(payload: SwapResponsePayload) -> Self {
        Self {
            provider: SwapProvider::Boltz,
            payload,
        }
    }

    pub fn swap_id(&self) -> &str {
        match &self.payload {
            SwapResponsePayload::Submarine(r) => &r.id,
            SwapResponsePayload::Reverse(r) => &r.id,
            SwapResponsePayload::Chain(r) => &r.id,
        }
    }

    pub fn swap_type(&self) -> SwapType {
        match self.payload {
            SwapResponsePayload::Submarine(_) => SwapType::Submarine,
            SwapResponsePayload::Reverse(_) => SwapType::Reverse,
            SwapResponsePayload::Chain(_) => SwapType::Chain,
        }
    }
}

/// A persisted swap. Written once, never updated; status lives in the provider's event stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapRecord {
    pub id: String,
    pub provider: SwapProvider,
    pub swap_type: SwapType,
    pub wallet_account_id: String,
    pub request: SwapRequestRecord,
    pub response: SwapResponseRecord,
}

impl SwapRecord {
    /// Invoice the swap settles, if it has one.
    pub fn invoice(&self) -> Option<&str> {
        match (&self.request.payload, &self.response.payload) {
            (SwapRequestPayload::Submarine { request, .. }, _) => Some(&request.invoice),
            (_, SwapResponsePayload::Reverse(r)) => Some(&r.invoice),
            _ => None,
        }
    }
}
