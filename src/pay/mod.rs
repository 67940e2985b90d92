//! Turns "pay this" requests into signable Liquid transactions.
//!
//! Lightning invoices are paid straight to the destination when the invoice carries a magic
//! routing hint, otherwise through a submarine swap. Payment addresses are resolved to an
//! invoice or an on-chain payload first, and Bitcoin addresses go through a chain swap.

use std::sync::Arc;

use anyhow::Context as _;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{PayError, PayResult};
use crate::lightning::route_hint::{self, DecodedInvoice, RouteHintAddress};
use crate::liquid::bip21;
use crate::liquid::wallet::{
    DEFAULT_LIQUID_FEE_RATE, LiquidWalletEngine, Recipient, TransactionRequest,
};
use crate::lnurl::{
    ChainPaymentRequest, LnUrlResponse, MoneyAddressResolver, PaymentOption, PaymentOptionCode,
    PaymentOptionNetwork,
};
use crate::swap::SwapResponsePayload;
use crate::swap::boltz::{BoltzChain, ChainDirection};
use crate::swap::service::{ChainSwapInput, SwapEngine};
use crate::task_graph::TaskGraph;
use crate::wallet::WalletAccount;
use crate::wallet::crypto::DescriptorCipher;

/// Unsigned PSET the wallet owner signs and broadcasts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignablePset {
    pub base_64: String,
}

/// The option a payer picked for a payment address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentOptionChoice {
    pub code: PaymentOptionCode,
    pub network: PaymentOptionNetwork,
}

#[derive(Debug, Clone)]
pub struct PayLightningAddressInput {
    pub money_address: String,
    /// Sats for Lightning, base units of the asset for on-chain options.
    pub amount: u64,
    pub payment_option: Option<PaymentOptionChoice>,
}

#[derive(Clone)]
pub struct PaymentRouter {
    swaps: SwapEngine,
    wallet_engine: Arc<dyn LiquidWalletEngine>,
    cipher: DescriptorCipher,
    resolver: Arc<dyn MoneyAddressResolver>,
}

impl PaymentRouter {
    pub fn new(
        swaps: SwapEngine,
        wallet_engine: Arc<dyn LiquidWalletEngine>,
        cipher: DescriptorCipher,
        resolver: Arc<dyn MoneyAddressResolver>,
    ) -> Self {
        Self {
            swaps,
            wallet_engine,
            cipher,
            resolver,
        }
    }

    /// Builds a PSET for caller-chosen recipients.
    pub async fn pay_liquid_address(
        &self,
        wallet_account: &WalletAccount,
        request: &TransactionRequest,
    ) -> PayResult<SignablePset> {
        self.build_pset(wallet_account, request).await
    }

    pub async fn pay_lightning_invoice(
        &self,
        invoice: &str,
        wallet_account: &WalletAccount,
    ) -> PayResult<SignablePset> {
        let mut results = TaskGraph::<PayError>::new()
            .step("check_invoice", &[], move |_| async move {
                route_hint::decode_invoice(invoice)
            })
            .step(
                "route_hint_address",
                &["check_invoice"],
                move |r| async move {
                    let decoded = r.get::<DecodedInvoice>("check_invoice")?;
                    let Some(hint) = &decoded.magic_routing_hint else {
                        return Ok(None);
                    };

                    let info = self
                        .swaps
                        .provider()
                        .get_magic_route_hint_info(invoice)
                        .await
                        .map_err(|e| PayError::provider("get magic route hint info", e))?;
                    let address = route_hint::check_magic_route_hint_info(hint, &info, decoded)?;
                    tracing::debug!(
                        address = %address.address,
                        "paying invoice through route hint"
                    );
                    Ok(Some(address))
                },
            )
            .step(
                "swap_address",
                &["route_hint_address"],
                move |r| async move {
                    if r
                        .get::<Option<RouteHintAddress>>("route_hint_address")?
                        .is_some()
                    {
                        return Ok(None);
                    }

                    let saved = self
                        .swaps
                        .store()
                        .get_reverse_swap_by_invoice(invoice)
                        .await
                        .context("look up saved swap by invoice")?;

                    let bip21 = match saved {
                        Some(swap) => match swap.response.payload {
                            SwapResponsePayload::Submarine(response) => {
                                tracing::debug!(swap_id = %response.id, "reusing saved swap");
                                response.bip21
                            }
                            _ => return Err(PayError::validation("invalid swap type")),
                        },
                        None => {
                            self.swaps
                                .create_submarine_swap(invoice, &wallet_account.id)
                                .await?
                                .bip21
                        }
                    };

                    let payment = bip21::decode(&bip21)?;
                    Ok(Some(RouteHintAddress::try_from(payment)?))
                },
            )
            .step(
                "construct_transaction",
                &["route_hint_address", "swap_address"],
                move |r| async move {
                    let hinted = r.get::<Option<RouteHintAddress>>("route_hint_address")?;
                    let swapped = r.get::<Option<RouteHintAddress>>("swap_address")?;
                    let Some(target) = hinted.as_ref().or(swapped.as_ref()) else {
                        return Err(PayError::validation("no address found to pay invoice"));
                    };

                    let request = TransactionRequest {
                        recipients: vec![Recipient {
                            address: target.address.clone(),
                            amount: bip21::btc_to_sats_ceil(target.amount)?,
                            asset_id: target.asset.clone(),
                        }],
                        fee_rate: Some(DEFAULT_LIQUID_FEE_RATE),
                    };
                    self.build_pset(wallet_account, &request).await
                },
            )
            .run()
            .await?;

        Ok(results.take::<SignablePset>("construct_transaction")?)
    }

    /// Pays `amount` base units of `asset_id` to a Liquid address.
    pub async fn pay_onchain_liquid(
        &self,
        address: &str,
        amount: u64,
        asset_id: &str,
        wallet_account: &WalletAccount,
    ) -> PayResult<SignablePset> {
        if amount == 0 {
            return Err(PayError::validation("Amount must be greater than zero"));
        }
        tracing::debug!(
            address,
            amount,
            asset_id,
            wallet_account_id = %wallet_account.id,
            "creating transaction"
        );

        let request = TransactionRequest {
            recipients: vec![Recipient {
                address: address.to_string(),
                amount,
                asset_id: asset_id.to_string(),
            }],
            fee_rate: Some(DEFAULT_LIQUID_FEE_RATE),
        };
        self.build_pset(wallet_account, &request).await
    }

    pub async fn pay_lightning_address(
        &self,
        input: &PayLightningAddressInput,
        wallet_account: &WalletAccount,
    ) -> PayResult<SignablePset> {
        let money_address = input.money_address.as_str();
        let amount = input.amount;
        let choice = input.payment_option;

        let mut results = TaskGraph::<PayError>::new()
            .step("get_info", &[], move |_| async move {
                self.resolver
                    .get_payment_options(money_address)
                    .await
                    .map_err(|e| {
                        tracing::error!(
                            money_address,
                            error = %format!("{e:#}"),
                            "error getting address info"
                        );
                        PayError::validation("Error getting address info")
                    })
            })
            .step("payment_option", &["get_info"], move |r| async move {
                let options = r.get::<Vec<PaymentOption>>("get_info")?;
                let (code, network) = match choice {
                    Some(c) => (c.code, c.network),
                    None => (PaymentOptionCode::Lightning, PaymentOptionNetwork::Bitcoin),
                };
                options
                    .iter()
                    .find(|o| o.matches(code, network))
                    .cloned()
                    .ok_or_else(|| {
                        PayError::validation("Payment option not found for this address")
                    })
            })
            .step("amount_check", &["payment_option"], move |r| async move {
                let option = r.get::<PaymentOption>("payment_option")?;
                check_sendable(amount, option)
            })
            .step(
                "pay",
                &["payment_option", "amount_check"],
                move |r| async move {
                    let option = r.get::<PaymentOption>("payment_option")?;
                    tracing::debug!(
                        code = %option.code,
                        network = %option.network,
                        "paying payment address"
                    );

                    match (option.code, option.network) {
                        (PaymentOptionCode::Lightning, PaymentOptionNetwork::Bitcoin) => {
                            self.pay_address_invoice(money_address, amount, wallet_account)
                                .await
                        }
                        (
                            code @ (PaymentOptionCode::Btc | PaymentOptionCode::Usdt),
                            PaymentOptionNetwork::Liquid,
                        ) => {
                            self.pay_address_onchain(money_address, amount, code, wallet_account)
                                .await
                        }
                        _ => Err(PayError::validation("This payment option is unavailable")),
                    }
                },
            )
            .run()
            .await?;

        Ok(results.take::<SignablePset>("pay")?)
    }

    /// Sends `amount` sats to a Bitcoin address through a Liquid to Bitcoin chain swap.
    pub async fn pay_bitcoin_address(
        &self,
        address: &str,
        amount: u64,
        wallet_account: &WalletAccount,
    ) -> PayResult<SignablePset> {
        let swap = self
            .swaps
            .create_chain_swap(ChainSwapInput {
                address: address.to_string(),
                amount,
                wallet_account_id: wallet_account.id.clone(),
                direction: ChainDirection {
                    from: BoltzChain::LBtc,
                    to: BoltzChain::Btc,
                },
            })
            .await?;

        let lockup_bip21 = swap.lockup_details.bip21.as_deref().ok_or_else(|| {
            PayError::provider(
                "create chain swap",
                anyhow::anyhow!("swap {} has no lockup bip21", swap.id),
            )
        })?;
        let lockup = RouteHintAddress::try_from(bip21::decode(lockup_bip21)?)?;

        let request = TransactionRequest {
            recipients: vec![Recipient {
                address: lockup.address,
                amount: bip21::btc_to_sats_ceil(lockup.amount)?,
                asset_id: lockup.asset,
            }],
            fee_rate: None,
        };
        self.build_pset(wallet_account, &request).await
    }

    async fn pay_address_invoice(
        &self,
        money_address: &str,
        amount: u64,
        wallet_account: &WalletAccount,
    ) -> PayResult<SignablePset> {
        let response = self
            .resolver
            .get_invoice_response(money_address, amount)
            .await;
        let invoice = match &response {
            Ok(LnUrlResponse::Payment(p)) if !p.pr.is_empty() => p.pr.clone(),
            other => {
                tracing::error!(money_address, response = ?other, "error processing payment");
                return Err(PayError::validation("Unable to process Lightning payment"));
            }
        };

        self.pay_lightning_invoice(&invoice, wallet_account)
            .await
            .map_err(|e| {
                tracing::error!(
                    money_address,
                    %invoice,
                    error = %e,
                    "error processing payment"
                );
                PayError::validation("Error processing payment")
            })
    }

    async fn pay_address_onchain(
        &self,
        money_address: &str,
        amount: u64,
        code: PaymentOptionCode,
        wallet_account: &WalletAccount,
    ) -> PayResult<SignablePset> {
        let failed = || PayError::validation("Error processing payment");

        let asset = code.liquid_asset().ok_or_else(failed)?;
        let request = ChainPaymentRequest {
            amount: Decimal::from(amount),
            currency: code,
            network: PaymentOptionNetwork::Liquid,
        };
        let response = self
            .resolver
            .get_chain_response(money_address, &request)
            .await;
        let address = match &response {
            Ok(LnUrlResponse::Payment(p)) => p
                .onchain
                .as_ref()
                .map(|o| o.address.clone())
                .filter(|a| !a.is_empty()),
            _ => None,
        };
        let Some(address) = address else {
            tracing::error!(money_address, response = ?response, "error processing payment");
            return Err(failed());
        };

        self.pay_onchain_liquid(&address, amount, asset.asset_id(), wallet_account)
            .await
            .map_err(|e| {
                tracing::error!(money_address, error = %e, "error processing payment");
                failed()
            })
    }

    async fn build_pset(
        &self,
        wallet_account: &WalletAccount,
        request: &TransactionRequest,
    ) -> PayResult<SignablePset> {
        let descriptor = self
            .cipher
            .decrypt(&wallet_account.details.local_protected_descriptor)
            .context("decrypt descriptor")?;
        let base_64 = self
            .wallet_engine
            .create_transaction(&descriptor, request)
            .await
            .with_context(|| format!("create transaction for account {}", wallet_account.id))?;
        Ok(SignablePset { base_64 })
    }
}

/// Bounds are optional and compared exactly.
fn check_sendable(amount: u64, option: &PaymentOption) -> PayResult<()> {
    let requested = Decimal::from(amount);
    if let Some(max) = option.max_sendable
        && requested > max
    {
        return Err(PayError::validation(format!(
            "Amount {amount} is bigger than max of {max}"
        )));
    }
    if let Some(min) = option.min_sendable
        && requested < min
    {
        return Err(PayError::validation(format!(
            "Amount {amount} is smaller than min of {min}"
        )));
    }
    Ok(())
}
