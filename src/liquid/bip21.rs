//! BIP21-style payment URIs as used on Liquid (`liquidnetwork:`) and Bitcoin (`bitcoin:`).

use std::str::FromStr as _;

use reqwest::Url;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive as _;

use crate::error::{PayError, PayResult};

const SATS_PER_BTC: u64 = 100_000_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bip21Payment {
    pub scheme: String,
    pub address: String,
    /// Amount in whole units of the asset (BTC for bitcoin and L-BTC).
    pub amount: Option<Decimal>,
    pub asset_id: Option<String>,
    pub label: Option<String>,
    pub message: Option<String>,
}

pub fn decode(uri: &str) -> PayResult<Bip21Payment> {
    let invalid = |detail: String| PayError::validation(format!("Invalid payment URI: {detail}"));

    let url = Url::parse(uri.trim()).map_err(|e| invalid(e.to_string()))?;
    let address = url.path().to_string();
    if address.is_empty() {
        return Err(invalid("missing address".to_string()));
    }

    let mut payment = Bip21Payment {
        scheme: url.scheme().to_string(),
        address,
        amount: None,
        asset_id: None,
        label: None,
        message: None,
    };

    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "amount" => {
                let amount = Decimal::from_str(&value)
                    .map_err(|e| invalid(format!("amount {value}: {e}")))?;
                if amount.is_sign_negative() {
                    return Err(invalid(format!("negative amount {value}")));
                }
                payment.amount = Some(amount);
            }
            "assetid" => payment.asset_id = Some(value.into_owned()),
            "label" => payment.label = Some(value.into_owned()),
            "message" => payment.message = Some(value.into_owned()),
            _ => {}
        }
    }

    Ok(payment)
}

/// `liquidnetwork:{address}?amount={amount}&assetid={asset}` with empty parts left out.
pub fn encode_liquid(address: &str, amount: Option<Decimal>, asset_id: Option<&str>) -> String {
    let mut params = Vec::new();
    if let Some(amount) = amount {
        params.push(format!("amount={}", amount.normalize()));
    }
    if let Some(asset_id) = asset_id {
        params.push(format!("assetid={asset_id}"));
    }

    if params.is_empty() {
        format!("liquidnetwork:{address}")
    } else {
        format!("liquidnetwork:{address}?{}", params.join("&"))
    }
}

/// Scales a base-unit amount down by `decimals` places.
pub fn from_base_units(amount: u64, decimals: u32) -> Decimal {
    Decimal::from(amount) / Decimal::from(10u64.pow(decimals))
}

/// BTC to sats, rounding any fraction of a sat up.
pub fn btc_to_sats_ceil(amount: Decimal) -> PayResult<u64> {
    (amount * Decimal::from(SATS_PER_BTC))
        .ceil()
        .to_u64()
        .ok_or_else(|| PayError::validation(format!("Invalid amount {amount}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_liquid_uri() {
        let payment = decode(
            "liquidnetwork:lq1qqexample?amount=0.00012345&assetid=6f0279e9ed041c3d710a9f57d0c02928416460c4b722ae3457a11eec381c526d&label=Send%20to%20BTC",
        )
        .expect("decode");

        assert_eq!(payment.scheme, "liquidnetwork");
        assert_eq!(payment.address, "lq1qqexample");
        assert_eq!(payment.amount, Some(Decimal::new(12345, 8)));
        assert_eq!(payment.label.as_deref(), Some("Send to BTC"));
        assert_eq!(btc_to_sats_ceil(payment.amount.expect("amount")).expect("sats"), 12_345);
    }

    #[test]
    fn rejects_garbage() {
        assert!(decode("not a uri").is_err());
        assert!(decode("liquidnetwork:lq1?amount=abc").is_err());
        assert!(decode("liquidnetwork:lq1?amount=-1").is_err());
    }

    #[test]
    fn sub_sat_amounts_round_up() {
        assert_eq!(btc_to_sats_ceil(Decimal::new(1, 9)).expect("sats"), 1);
        assert_eq!(btc_to_sats_ceil(Decimal::ZERO).expect("sats"), 0);
    }

    #[test]
    fn encodes_with_asset_decimals() {
        assert_eq!(
            encode_liquid("lq1abc", Some(from_base_units(150_000, 8)), Some("asset")),
            "liquidnetwork:lq1abc?amount=0.0015&assetid=asset"
        );
        assert_eq!(
            encode_liquid("lq1abc", Some(from_base_units(25, 0)), None),
            "liquidnetwork:lq1abc?amount=25"
        );
        assert_eq!(encode_liquid("lq1abc", None, None), "liquidnetwork:lq1abc");
    }
}
