//! Magic routing hints: a private route hop that tells the payer the receiver also accepts a
//! direct Liquid payment, with the on-chain details published by the swap provider.

use bitcoin::hashes::{Hash as _, sha256};
use bitcoin::secp256k1::{Message, PublicKey, Secp256k1, schnorr};
use lightning_invoice::Bolt11Invoice;
use rust_decimal::Decimal;

use crate::error::{PayError, PayResult};
use crate::liquid::assets::LBTC_ASSET_ID;
use crate::liquid::bip21::{self, Bip21Payment};
use crate::swap::boltz::MagicRouteHintInfo;

use super::invoice;

/// Short channel id that marks a route hint as "magic" rather than a real channel.
pub const MAGIC_ROUTING_HINT_SCID: u64 = 0x0846_c900_051c_0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MagicRoutingHint {
    pub pubkey: PublicKey,
    pub short_channel_id: u64,
}

#[derive(Debug, Clone)]
pub struct DecodedInvoice {
    pub invoice: Bolt11Invoice,
    pub amount_sats: Option<u64>,
    pub magic_routing_hint: Option<MagicRoutingHint>,
}

/// Destination taken from a route hint or a swap's BIP21.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteHintAddress {
    pub address: String,
    /// Whole units of `asset`.
    pub amount: Decimal,
    pub asset: String,
}

impl TryFrom<Bip21Payment> for RouteHintAddress {
    type Error = PayError;

    fn try_from(payment: Bip21Payment) -> PayResult<Self> {
        let amount = payment
            .amount
            .ok_or_else(|| PayError::validation("Payment URI has no amount"))?;
        Ok(Self {
            address: payment.address,
            amount,
            asset: payment
                .asset_id
                .unwrap_or_else(|| LBTC_ASSET_ID.to_string()),
        })
    }
}

pub fn decode_invoice(raw: &str) -> PayResult<DecodedInvoice> {
    let invoice = invoice::decode(raw)?;
    Ok(DecodedInvoice {
        amount_sats: invoice::amount_sats(&invoice),
        magic_routing_hint: find_magic_routing_hint(&invoice),
        invoice,
    })
}

pub fn find_magic_routing_hint(invoice: &Bolt11Invoice) -> Option<MagicRoutingHint> {
    invoice
        .route_hints()
        .into_iter()
        .flat_map(|hint| hint.0)
        .find(|hop| hop.short_channel_id == MAGIC_ROUTING_HINT_SCID)
        .map(|hop| MagicRoutingHint {
            pubkey: hop.src_node_id,
            short_channel_id: hop.short_channel_id,
        })
}

/// Checks the provider's route hint info against the invoice.
///
/// The BIP21 address must be signed by the hint's node key and must not ask for more than the
/// invoice does.
pub fn check_magic_route_hint_info(
    hint: &MagicRoutingHint,
    info: &MagicRouteHintInfo,
    decoded: &DecodedInvoice,
) -> PayResult<RouteHintAddress> {
    let payment = bip21::decode(&info.bip21)?;

    let signature = hex::decode(&info.signature)
        .ok()
        .and_then(|bytes| schnorr::Signature::from_slice(&bytes).ok())
        .ok_or_else(|| PayError::validation("invalid signature"))?;
    let digest = sha256::Hash::hash(payment.address.as_bytes()).to_byte_array();
    let (xonly, _) = hint.pubkey.x_only_public_key();
    Secp256k1::verification_only()
        .verify_schnorr(&signature, &Message::from_digest(digest), &xonly)
        .map_err(|_| PayError::validation("invalid signature"))?;

    let address = RouteHintAddress::try_from(payment)?;
    let requested = bip21::btc_to_sats_ceil(address.amount)?;
    if requested > decoded.amount_sats.unwrap_or(0) {
        return Err(PayError::validation("invalid amount"));
    }

    Ok(address)
}

