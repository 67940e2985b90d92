use std::str::FromStr as _;
use std::sync::Arc;

use anyhow::Context as _;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive as _;

use crate::config::DEFAULT_REFERRAL_ID;
use crate::error::{PayError, PayResult};
use crate::lightning::invoice;

use super::boltz::{
    self, BoltzChain, ChainDirection, ChainFees, ChainRequest, ChainResponse, ReverseRequest,
    ReverseResponse, SubmarineRequest, SubmarineResponse, SwapProviderClient,
};
use super::covenant::{CovenantClaim, CovenantRegistrar};
use super::fee_cache::{CLAIM_FEE_TTL, ClaimFeeCache, claim_fee_key};
use super::keys::{Preimage, SwapKeys};
use super::limits::SwapLimits;
use super::notifier::SwapStatusNotifier;
use super::store::SwapRepository;
use super::{SwapRequestPayload, SwapRequestRecord, SwapResponsePayload, SwapResponseRecord};

#[derive(Debug, Clone)]
pub struct ReverseSwapInput {
    /// Liquid address the provider locks funds to.
    pub address: String,
    pub amount: u64,
    pub wallet_account_id: String,
    pub covenant: bool,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct ChainSwapInput {
    /// Address that receives the funds on the destination chain.
    pub address: String,
    pub amount: u64,
    pub wallet_account_id: String,
    pub direction: ChainDirection,
}

/// Builds, persists and starts tracking swaps with the provider.
///
/// Every swap gets fresh key material. The record is written before status tracking starts, and
/// the secret halves only leave this type inside the persisted request payload.
#[derive(Clone)]
pub struct SwapEngine {
    provider: Arc<dyn SwapProviderClient>,
    store: Arc<dyn SwapRepository>,
    notifier: Arc<dyn SwapStatusNotifier>,
    covenants: Arc<dyn CovenantRegistrar>,
    claim_fees: Arc<dyn ClaimFeeCache>,
    referral_id: String,
}

impl SwapEngine {
    pub fn new(
        provider: Arc<dyn SwapProviderClient>,
        store: Arc<dyn SwapRepository>,
        notifier: Arc<dyn SwapStatusNotifier>,
        covenants: Arc<dyn CovenantRegistrar>,
        claim_fees: Arc<dyn ClaimFeeCache>,
    ) -> Self {
        Self {
            provider,
            store,
            notifier,
            covenants,
            claim_fees,
            referral_id: DEFAULT_REFERRAL_ID.to_string(),
        }
    }

    pub fn with_referral_id(mut self, referral_id: impl Into<String>) -> Self {
        self.referral_id = referral_id.into();
        self
    }

    pub fn provider(&self) -> &Arc<dyn SwapProviderClient> {
        &self.provider
    }

    pub fn store(&self) -> &Arc<dyn SwapRepository> {
        &self.store
    }

    pub async fn submarine_limits(&self) -> PayResult<SwapLimits> {
        let info = self
            .provider
            .get_submarine_info()
            .await
            .map_err(|e| PayError::provider("get submarine swap info", e))?;
        let pair = boltz::pair(&info, BoltzChain::LBtc, BoltzChain::Btc)
            .map_err(|e| PayError::provider("get submarine swap info", e))?;
        Ok(pair.limits)
    }

    pub async fn reverse_limits(&self) -> PayResult<SwapLimits> {
        let info = self
            .provider
            .get_reverse_info()
            .await
            .map_err(|e| PayError::provider("get reverse swap info", e))?;
        let pair = boltz::pair(&info, BoltzChain::Btc, BoltzChain::LBtc)
            .map_err(|e| PayError::provider("get reverse swap info", e))?;
        Ok(pair.limits)
    }

    pub async fn chain_limits(&self, direction: ChainDirection) -> PayResult<SwapLimits> {
        check_direction(direction)?;
        let info = self
            .provider
            .get_chain_info()
            .await
            .map_err(|e| PayError::provider("get chain swap info", e))?;
        let pair = boltz::pair(&info, direction.from, direction.to)
            .map_err(|e| PayError::provider("get chain swap info", e))?;
        Ok(pair.limits)
    }

    /// Pays `invoice` from Liquid. The response carries the BIP21 to fund.
    pub async fn create_submarine_swap(
        &self,
        invoice: &str,
        wallet_account_id: &str,
    ) -> PayResult<SubmarineResponse> {
        let decoded = invoice::decode(invoice)?;
        let amount = invoice::amount_sats(&decoded).unwrap_or(0);

        self.submarine_limits().await?.check(amount)?;

        let keys = SwapKeys::generate();
        let request = SubmarineRequest {
            invoice: invoice.to_string(),
            from: BoltzChain::LBtc,
            to: BoltzChain::Btc,
            refund_public_key: keys.public_key_hex(),
            referral_id: self.referral_id.clone(),
        };

        let response = self
            .provider
            .create_submarine(&request)
            .await
            .map_err(|e| PayError::provider("create submarine swap", e))?;

        let payload = SwapRequestPayload::Submarine {
            request,
            private_key: keys.into_secret(),
        };
        self.store
            .create_swap(
                wallet_account_id,
                SwapRequestRecord::boltz(payload),
                SwapResponseRecord::boltz(SwapResponsePayload::Submarine(response.clone())),
            )
            .await
            .with_context(|| format!("persist submarine swap {}", response.id))?;

        self.notifier.subscribe(std::slice::from_ref(&response.id));
        tracing::info!(
            swap_id = %response.id,
            wallet_account_id,
            amount,
            "created submarine swap"
        );
        Ok(response)
    }

    /// Receives `amount` sats over Lightning into `input.address`.
    pub async fn create_reverse_swap(&self, input: ReverseSwapInput) -> PayResult<ReverseResponse> {
        let ReverseSwapInput {
            address,
            amount,
            wallet_account_id,
            covenant,
            description,
        } = input;

        self.reverse_limits().await?.check(amount)?;

        let preimage = Preimage::generate();
        let keys = SwapKeys::generate();

        let request = ReverseRequest {
            address_signature: keys.sign_address(&address),
            address,
            from: BoltzChain::Btc,
            to: BoltzChain::LBtc,
            claim_covenant: covenant,
            invoice_amount: amount,
            preimage_hash: preimage.hash_hex(),
            claim_public_key: keys.public_key_hex(),
            referral_id: self.referral_id.clone(),
            description,
        };

        let response = self
            .provider
            .create_reverse(&request)
            .await
            .map_err(|e| PayError::provider("create reverse swap", e))?;

        if covenant && let Some(blinding_key) = &response.blinding_key {
            let claim = CovenantClaim {
                address: request.address.clone(),
                preimage: preimage.secret(),
                tree: response.swap_tree.clone(),
                blinding_key: blinding_key.clone(),
                claim_public_key: request.claim_public_key.clone(),
                refund_public_key: response.refund_public_key.clone(),
            };
            if let Err(e) = self.covenants.register(&claim).await {
                tracing::warn!(
                    swap_id = %response.id,
                    error = %format!("{e:#}"),
                    "covenant registration failed"
                );
            }
        }

        let payload = SwapRequestPayload::Reverse {
            request,
            preimage: preimage.into_secret(),
            private_key: keys.into_secret(),
        };
        self.store
            .create_swap(
                &wallet_account_id,
                SwapRequestRecord::boltz(payload),
                SwapResponseRecord::boltz(SwapResponsePayload::Reverse(response.clone())),
            )
            .await
            .with_context(|| format!("persist reverse swap {}", response.id))?;

        self.notifier.subscribe(std::slice::from_ref(&response.id));
        tracing::info!(
            swap_id = %response.id,
            wallet_account_id = %wallet_account_id,
            amount,
            covenant,
            "created reverse swap"
        );
        Ok(response)
    }

    /// Moves `amount` sats between Liquid and Bitcoin without a Lightning leg.
    pub async fn create_chain_swap(&self, input: ChainSwapInput) -> PayResult<ChainResponse> {
        let ChainSwapInput {
            address,
            amount,
            wallet_account_id,
            direction,
        } = input;

        check_direction(direction)?;

        let info = self
            .provider
            .get_chain_info()
            .await
            .map_err(|e| PayError::provider("get chain swap info", e))?;
        let pair = boltz::pair(&info, direction.from, direction.to)
            .map_err(|e| PayError::provider("get chain swap info", e))?;

        pair.limits.check(amount)?;
        let user_lock_amount = user_lock_amount(amount, &pair.fees)?;

        let preimage = Preimage::generate();
        let claim_keys = SwapKeys::generate();
        let refund_keys = SwapKeys::generate();

        let request = ChainRequest {
            user_lock_amount,
            claim_address: address,
            from: direction.from,
            to: direction.to,
            preimage_hash: preimage.hash_hex(),
            claim_public_key: claim_keys.public_key_hex(),
            refund_public_key: refund_keys.public_key_hex(),
            referral_id: self.referral_id.clone(),
            pair_hash: pair.hash.clone(),
        };

        let response = self
            .provider
            .create_chain(&request)
            .await
            .map_err(|e| PayError::provider("create chain swap", e))?;

        let payload = SwapRequestPayload::Chain {
            request,
            preimage: preimage.into_secret(),
            claim_private_key: claim_keys.into_secret(),
            refund_private_key: refund_keys.into_secret(),
        };
        self.store
            .create_swap(
                &wallet_account_id,
                SwapRequestRecord::boltz(payload),
                SwapResponseRecord::boltz(SwapResponsePayload::Chain(response.clone())),
            )
            .await
            .with_context(|| format!("persist chain swap {}", response.id))?;

        let claim_fee = response.claim_details.amount as i64 - amount as i64;
        self.claim_fees
            .set(&claim_fee_key(&response.id), claim_fee, CLAIM_FEE_TTL);

        self.notifier.subscribe(std::slice::from_ref(&response.id));
        tracing::info!(
            swap_id = %response.id,
            wallet_account_id = %wallet_account_id,
            from = %direction.from,
            to = %direction.to,
            amount,
            user_lock_amount,
            "created chain swap"
        );
        Ok(response)
    }
}

fn check_direction(direction: ChainDirection) -> PayResult<()> {
    match (direction.from, direction.to) {
        (BoltzChain::LBtc, BoltzChain::Btc) | (BoltzChain::Btc, BoltzChain::LBtc) => Ok(()),
        _ => Err(PayError::Config(
            "You cannot send and receive to the same chain".to_string(),
        )),
    }
}

/// Amount the user must lock so `amount` arrives on the other chain.
///
/// Miner fees are added first, then the percentage fee on that sum, rounded up.
pub fn user_lock_amount(amount: u64, fees: &ChainFees) -> PayResult<u64> {
    let too_big = || PayError::validation("Amount is too big");

    let pay_amount = amount
        .checked_add(fees.miner_fees.server)
        .and_then(|v| v.checked_add(fees.miner_fees.user.claim))
        .ok_or_else(too_big)?;

    let percentage = Decimal::from_str(&fees.percentage.to_string())
        .with_context(|| format!("parse fee percentage {}", fees.percentage))?;
    let provider_fee = (Decimal::from(pay_amount) * percentage / Decimal::ONE_HUNDRED).ceil();
    let provider_fee = provider_fee
        .to_u64()
        .with_context(|| format!("fee percentage {percentage} yields invalid fee"))?;

    pay_amount.checked_add(provider_fee).ok_or_else(too_big)
}
