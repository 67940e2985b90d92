use std::str::FromStr as _;

use bitcoin::hashes::Hash as _;
use lightning_invoice::Bolt11Invoice;

use crate::error::{PayError, PayResult};

/// Parses a BOLT11 invoice, tolerating a `lightning:` URI prefix and surrounding whitespace.
pub fn decode(invoice: &str) -> PayResult<Bolt11Invoice> {
    let trimmed = invoice.trim();
    let raw = match trimmed.get(..10) {
        Some(prefix) if prefix.eq_ignore_ascii_case("lightning:") => &trimmed[10..],
        _ => trimmed,
    };
    Bolt11Invoice::from_str(raw).map_err(|e| PayError::InvalidInvoice(e.to_string()))
}

/// Requested amount in whole sats, rounding a sub-sat remainder up.
pub fn amount_sats(invoice: &Bolt11Invoice) -> Option<u64> {
    invoice.amount_milli_satoshis().map(|msat| msat.div_ceil(1000))
}

pub fn payment_hash_hex(invoice: &Bolt11Invoice) -> String {
    hex::encode(invoice.payment_hash().to_byte_array())
}
