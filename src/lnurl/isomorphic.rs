//! Sends payment-address lookups to the local resolver when this service hosts the domain, and
//! over the network otherwise.

use std::sync::Arc;

use anyhow::{Context as _, Result};
use async_trait::async_trait;

use super::{
    ChainPaymentRequest, LnUrlResponse, MoneyAddressResolver, PaymentOption, split_money_address,
};

#[derive(Clone)]
pub struct LnUrlIsomorphicService {
    local: Arc<dyn MoneyAddressResolver>,
    local_domains: Vec<String>,
    remote: Arc<dyn MoneyAddressResolver>,
}

impl LnUrlIsomorphicService {
    pub fn new(
        local: Arc<dyn MoneyAddressResolver>,
        local_domains: Vec<String>,
        remote: Arc<dyn MoneyAddressResolver>,
    ) -> Self {
        Self {
            local,
            local_domains,
            remote,
        }
    }

    fn resolver_for(&self, money_address: &str) -> Result<&dyn MoneyAddressResolver> {
        let (_, domain) = split_money_address(money_address)
            .with_context(|| format!("invalid money address {money_address}"))?;
        let is_local = self
            .local_domains
            .iter()
            .any(|d| d.eq_ignore_ascii_case(&domain));
        tracing::debug!(money_address, is_local, "resolving money address");
        Ok(if is_local {
            self.local.as_ref()
        } else {
            self.remote.as_ref()
        })
    }
}

#[async_trait]
impl MoneyAddressResolver for LnUrlIsomorphicService {
    async fn get_payment_options(&self, money_address: &str) -> Result<Vec<PaymentOption>> {
        self.resolver_for(money_address)?
            .get_payment_options(money_address)
            .await
    }

    async fn get_invoice_response(
        &self,
        money_address: &str,
        amount_sats: u64,
    ) -> Result<LnUrlResponse> {
        self.resolver_for(money_address)?
            .get_invoice_response(money_address, amount_sats)
            .await
    }

    async fn get_chain_response(
        &self,
        money_address: &str,
        request: &ChainPaymentRequest,
    ) -> Result<LnUrlResponse> {
        self.resolver_for(money_address)?
            .get_chain_response(money_address, request)
            .await
    }
}
