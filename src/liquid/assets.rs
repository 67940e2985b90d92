use serde::{Deserialize, Serialize};

/// Liquid mainnet policy asset (L-BTC).
pub const LBTC_ASSET_ID: &str = "6f0279e9ed041c3d710a9f57d0c02928416460c4b722ae3457a11eec381c526d";

/// Tether USD issued on Liquid mainnet.
pub const USDT_ASSET_ID: &str = "ce091c998b83c78bb71a632313ba3760f1763d9cfcffae02258ffa9865a37bd2";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LiquidAsset {
    Btc,
    Usdt,
}

impl LiquidAsset {
    pub fn asset_id(&self) -> &'static str {
        match self {
            LiquidAsset::Btc => LBTC_ASSET_ID,
            LiquidAsset::Usdt => USDT_ASSET_ID,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LiquidAsset::Btc => "Liquid Bitcoin",
            LiquidAsset::Usdt => "Tether USD",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            LiquidAsset::Btc => "BTC",
            LiquidAsset::Usdt => "USDT",
        }
    }

    /// Decimal places between the base unit and the unit shown in a BIP21 `amount`.
    pub fn conversion_decimals(&self) -> u32 {
        match self {
            LiquidAsset::Btc => 8,
            LiquidAsset::Usdt => 0,
        }
    }

    pub fn from_asset_id(asset_id: &str) -> Option<Self> {
        [LiquidAsset::Btc, LiquidAsset::Usdt]
            .into_iter()
            .find(|a| a.asset_id().eq_ignore_ascii_case(asset_id))
    }
}
