use bitcoin::hashes::{Hash as _, sha256};
use bitcoin::secp256k1::{Keypair, Message, PublicKey, Secp256k1, SecretKey};
use lightning_invoice::{
    Currency, InvoiceBuilder, PaymentSecret, RouteHint, RouteHintHop, RoutingFees,
};
use rust_decimal::Decimal;

use liquid_pay::lightning::route_hint::MAGIC_ROUTING_HINT_SCID;
use liquid_pay::liquid::assets::LBTC_ASSET_ID;
use liquid_pay::liquid::bip21;
use liquid_pay::swap::boltz::MagicRouteHintInfo;

pub const HINT_ADDRESS: &str = "lq1qqroutehintdestination";

fn node_key() -> SecretKey {
    SecretKey::from_slice(&[0x11; 32]).expect("node key")
}

pub fn hint_key() -> SecretKey {
    SecretKey::from_slice(&[0x22; 32]).expect("hint key")
}

/// Mainnet invoice for `amount_sats`, signed by a throwaway node key. With `magic_hint` the
/// invoice carries a private route through the magic short channel id.
pub fn signed_invoice(amount_sats: u64, magic_hint: bool, tag: u8) -> String {
    let secp = Secp256k1::new();

    let mut builder = InvoiceBuilder::new(Currency::Bitcoin)
        .description(format!("test invoice {tag}"))
        .payment_hash(sha256::Hash::hash(&[tag; 32]))
        .payment_secret(PaymentSecret([tag; 32]))
        .current_timestamp()
        .min_final_cltv_expiry_delta(144)
        .amount_milli_satoshis(amount_sats * 1000);

    if magic_hint {
        builder = builder.private_route(RouteHint(vec![RouteHintHop {
            src_node_id: PublicKey::from_secret_key(&secp, &hint_key()),
            short_channel_id: MAGIC_ROUTING_HINT_SCID,
            fees: RoutingFees {
                base_msat: 0,
                proportional_millionths: 0,
            },
            cltv_expiry_delta: 40,
            htlc_minimum_msat: None,
            htlc_maximum_msat: None,
        }]));
    }

    builder
        .build_signed(|hash| secp.sign_ecdsa_recoverable(hash, &node_key()))
        .expect("build invoice")
        .to_string()
}

/// Route hint info for `amount_sats` to [`HINT_ADDRESS`], signed by `signer`.
pub fn route_hint_info(amount_sats: u64, signer: &SecretKey) -> MagicRouteHintInfo {
    let secp = Secp256k1::new();
    let amount: Decimal = bip21::from_base_units(amount_sats, 8);
    let digest = sha256::Hash::hash(HINT_ADDRESS.as_bytes()).to_byte_array();
    let signature = secp.sign_schnorr(
        &Message::from_digest(digest),
        &Keypair::from_secret_key(&secp, signer),
    );

    MagicRouteHintInfo {
        bip21: bip21::encode_liquid(HINT_ADDRESS, Some(amount), Some(LBTC_ASSET_ID)),
        signature: hex::encode(signature.serialize()),
    }
}
