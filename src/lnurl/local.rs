//! Answers LNURL-pay requests for payment addresses hosted by this service.

use std::str::FromStr as _;
use std::sync::Arc;

use anyhow::Context as _;
use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive as _;

use crate::error::{PayError, PayResult};
use crate::liquid::assets::LiquidAsset;
use crate::liquid::bip21;
use crate::liquid::wallet::LiquidWalletEngine;
use crate::swap::boltz::ReverseResponse;
use crate::swap::limits::SwapLimits;
use crate::swap::service::{ReverseSwapInput, SwapEngine};
use crate::task_graph::TaskGraph;
use crate::wallet::WalletRepository;
use crate::wallet::crypto::DescriptorCipher;

use super::{
    AccountCurrency, CallbackParams, ChainPaymentRequest, CurrencyInfo, LnUrlResponse,
    MoneyAddressResolver, OnchainPayload, PayRequestInfo, PaymentOption, PaymentOptionCode,
    PaymentOptionNetwork, split_money_address,
};

const MSAT_PER_SAT: u64 = 1000;

#[derive(Clone)]
pub struct LnUrlLocalService {
    swaps: SwapEngine,
    wallet_engine: Arc<dyn LiquidWalletEngine>,
    wallets: Arc<dyn WalletRepository>,
    cipher: DescriptorCipher,
    domains: Vec<String>,
}

impl LnUrlLocalService {
    pub fn new(
        swaps: SwapEngine,
        wallet_engine: Arc<dyn LiquidWalletEngine>,
        wallets: Arc<dyn WalletRepository>,
        cipher: DescriptorCipher,
        domains: Vec<String>,
    ) -> Self {
        Self {
            swaps,
            wallet_engine,
            wallets,
            cipher,
            domains,
        }
    }

    pub fn serves_domain(&self, domain: &str) -> bool {
        self.domains.iter().any(|d| d.eq_ignore_ascii_case(domain))
    }

    fn primary_domain(&self) -> &str {
        self.domains.first().map(String::as_str).unwrap_or("localhost")
    }

    /// Entry point for the LNURL-pay callback.
    pub async fn get_response(&self, params: CallbackParams) -> LnUrlResponse {
        let Some(account) = params.account.filter(|a| !a.trim().is_empty()) else {
            return LnUrlResponse::error("No account provided");
        };
        let account = account.trim().to_lowercase();

        let Some(amount) = params
            .amount
            .as_deref()
            .and_then(|a| Decimal::from_str(a.trim()).ok())
            .filter(|a| !a.is_sign_negative())
        else {
            return LnUrlResponse::error("No amount provided");
        };

        if let Some(currency) = params.currency.filter(|c| !c.is_empty()) {
            let Some(network) = params.network.filter(|n| !n.is_empty()) else {
                return LnUrlResponse::error("A network needs to be provided");
            };

            let (Ok(code), Ok(net)) = (
                currency.parse::<PaymentOptionCode>(),
                network.parse::<PaymentOptionNetwork>(),
            ) else {
                return LnUrlResponse::error(format!(
                    "Currency {currency} on network {network} is not available"
                ));
            };

            let request = ChainPaymentRequest {
                amount,
                currency: code,
                network: net,
            };
            return self.get_chain_response(&account, &request).await;
        }

        // Lightning amounts arrive in millisatoshis.
        let Some(sats) = (amount / Decimal::from(MSAT_PER_SAT)).ceil().to_u64() else {
            return LnUrlResponse::error("No amount provided");
        };
        self.get_invoice_response(&account, sats).await
    }

    /// First LNURL-pay step for `account`.
    pub async fn get_info(&self, account: &str) -> PayResult<PayRequestInfo> {
        let owned = account.trim().to_lowercase();
        let account = owned.as_str();

        let mut results = TaskGraph::<PayError>::new()
            .step("reverse_limits", &[], move |_| async move {
                self.swaps.reverse_limits().await
            })
            .step("currencies", &[], move |_| async move {
                let currencies = self.get_currencies(account).await?;
                Ok(currencies
                    .iter()
                    .map(AccountCurrency::info)
                    .collect::<Vec<CurrencyInfo>>())
            })
            .run()
            .await?;

        let limits = results.take::<SwapLimits>("reverse_limits")?;
        let currencies = results.take::<Vec<CurrencyInfo>>("currencies")?;
        let domain = self.primary_domain();

        let plain = format!("Payment to {account}");
        let identifier = format!("{account}@{domain}");
        let metadata = serde_json::to_string(&[
            ["text/plain", plain.as_str()],
            ["text/identifier", identifier.as_str()],
        ])
        .context("encode lnurl metadata")?;

        Ok(PayRequestInfo {
            callback: format!("http://{domain}/lnurlp/{account}"),
            min_sendable: limits.minimal.saturating_mul(MSAT_PER_SAT),
            max_sendable: limits.maximal.saturating_mul(MSAT_PER_SAT),
            metadata,
            currencies,
            tag: "payRequest".to_string(),
        })
    }

    /// Currencies a hosted wallet accepts on Liquid. Empty when there is nothing to receive into.
    pub async fn get_currencies(&self, account: &str) -> PayResult<Vec<AccountCurrency>> {
        let wallet = self
            .wallets
            .get_wallet_by_money_address(account)
            .await
            .context("load wallet by money address")?;

        let Some(liquid) = wallet.as_ref().and_then(|w| w.first_liquid_account()) else {
            return Ok(Vec::new());
        };

        Ok(vec![
            AccountCurrency::liquid(LiquidAsset::Btc, PaymentOptionCode::Btc, liquid.clone()),
            AccountCurrency::liquid(LiquidAsset::Usdt, PaymentOptionCode::Usdt, liquid.clone()),
        ])
    }

    pub async fn get_chain_response(
        &self,
        account: &str,
        request: &ChainPaymentRequest,
    ) -> LnUrlResponse {
        let graph = TaskGraph::<PayError>::new()
            .step("check_currency", &[], move |_| async move {
                let currencies = self.get_currencies(account).await?;
                if currencies.is_empty() {
                    return Err(PayError::validation("No currencies are available"));
                }
                currencies
                    .into_iter()
                    .find(|c| c.code == request.currency && c.network == request.network)
                    .ok_or_else(|| {
                        PayError::validation(format!(
                            "Currency {} on network {} is not available",
                            request.currency, request.network
                        ))
                    })
            })
            .step("create_payload", &["check_currency"], move |r| async move {
                let currency = r.get::<AccountCurrency>("check_currency")?;
                let descriptor = self
                    .cipher
                    .decrypt(&currency.wallet_account.details.local_protected_descriptor)
                    .context("decrypt descriptor")?;
                let address = self
                    .wallet_engine
                    .derive_receiving_address(&descriptor, true)
                    .await
                    .context("derive receiving address")?;

                let scale = Decimal::from(10u64.pow(currency.asset.conversion_decimals()));
                let bip21 = bip21::encode_liquid(
                    &address,
                    Some(request.amount / scale),
                    Some(currency.asset.asset_id()),
                );

                Ok(LnUrlResponse::onchain(OnchainPayload {
                    currency: request.currency,
                    network: request.network,
                    address,
                    bip21,
                }))
            });

        self.finish(graph, "create_payload", account, "lnurl onchain response")
            .await
    }

    /// Creates a reverse swap into the account's first Liquid wallet and returns its invoice.
    pub async fn get_invoice_response(&self, account: &str, amount: u64) -> LnUrlResponse {
        let graph = TaskGraph::<PayError>::new()
            .step("check_amount", &[], move |_| async move {
                let SwapLimits { minimal, maximal } = self.swaps.reverse_limits().await?;
                if maximal < amount {
                    return Err(PayError::validation(format!(
                        "Amount {amount} greater than maximum of {maximal}"
                    )));
                }
                if minimal > amount {
                    return Err(PayError::validation(format!(
                        "Amount {amount} smaller than minimum of {minimal}"
                    )));
                }
                Ok(amount)
            })
            .step("create_swap", &["check_amount"], move |r| async move {
                let amount = *r.get::<u64>("check_amount")?;
                let wallet = self
                    .wallets
                    .get_wallet_by_money_address(account)
                    .await
                    .context("load wallet by money address")?;
                let Some(liquid) = wallet.as_ref().and_then(|w| w.first_liquid_account()) else {
                    return Err(PayError::validation("No wallet available"));
                };

                let descriptor = self
                    .cipher
                    .decrypt(&liquid.details.local_protected_descriptor)
                    .context("decrypt descriptor")?;
                let address = self
                    .wallet_engine
                    .derive_receiving_address(&descriptor, false)
                    .await
                    .context("derive receiving address")?;
                drop(descriptor);

                self.swaps
                    .create_reverse_swap(ReverseSwapInput {
                        address,
                        amount,
                        wallet_account_id: liquid.id.clone(),
                        covenant: false,
                        description: format!("Payment to {account}"),
                    })
                    .await
            })
            .step("create_payload", &["create_swap"], move |r| async move {
                let swap = r.get::<ReverseResponse>("create_swap")?;
                Ok(LnUrlResponse::invoice(swap.invoice.clone()))
            });

        self.finish(graph, "create_payload", account, "lnurl invoice response")
            .await
    }

    async fn finish(
        &self,
        graph: TaskGraph<'_, PayError>,
        output: &'static str,
        account: &str,
        what: &'static str,
    ) -> LnUrlResponse {
        let result = match graph.run().await {
            Ok(mut results) => results.take::<LnUrlResponse>(output).map_err(PayError::from),
            Err(e) => Err(e),
        };
        result.unwrap_or_else(|e| {
            tracing::error!(account, error = %e, "error getting {what}");
            LnUrlResponse::error(e.public_message())
        })
    }
}

#[async_trait]
impl MoneyAddressResolver for LnUrlLocalService {
    async fn get_payment_options(&self, money_address: &str) -> anyhow::Result<Vec<PaymentOption>> {
        let (account, _) = split_money_address(money_address)
            .with_context(|| format!("invalid money address {money_address}"))?;

        let currencies = self.get_currencies(&account).await?;
        if currencies.is_empty() {
            return Ok(Vec::new());
        }

        let limits = self.swaps.reverse_limits().await?;
        let mut options = vec![PaymentOption::lightning(
            Some(Decimal::from(limits.minimal)),
            Some(Decimal::from(limits.maximal)),
        )];
        options.extend(currencies.iter().map(|c| PaymentOption {
            code: c.code,
            network: c.network,
            min_sendable: None,
            max_sendable: None,
        }));
        Ok(options)
    }

    async fn get_invoice_response(
        &self,
        money_address: &str,
        amount_sats: u64,
    ) -> anyhow::Result<LnUrlResponse> {
        let (account, _) = split_money_address(money_address)
            .with_context(|| format!("invalid money address {money_address}"))?;
        Ok(LnUrlLocalService::get_invoice_response(self, &account, amount_sats).await)
    }

    async fn get_chain_response(
        &self,
        money_address: &str,
        request: &ChainPaymentRequest,
    ) -> anyhow::Result<LnUrlResponse> {
        let (account, _) = split_money_address(money_address)
            .with_context(|| format!("invalid money address {money_address}"))?;
        Ok(LnUrlLocalService::get_chain_response(self, &account, request).await)
    }
}
