//! LNURL-pay against payment addresses hosted elsewhere (LUD-16).

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use reqwest::Url;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;

use super::{
    ChainPaymentRequest, LnUrlResponse, MoneyAddressResolver, PayRequestInfo, PaymentOption,
    split_money_address,
};

const MSAT_PER_SAT: u64 = 1000;

#[derive(Clone)]
pub struct RemoteLnUrlClient {
    http: reqwest::Client,
}

impl Default for RemoteLnUrlClient {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteLnUrlClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    pub fn well_known_url(&self, money_address: &str) -> Result<Url> {
        let (user, domain) = split_money_address(money_address)
            .with_context(|| format!("invalid money address {money_address}"))?;
        Url::parse(&format!("https://{domain}/.well-known/lnurlp/{user}"))
            .context("build lnurlp url")
    }

    pub async fn get_info(&self, money_address: &str) -> Result<PayRequestInfo> {
        let url = self.well_known_url(money_address)?;
        let info: PayRequestInfo = self.get_json(url).await?;
        anyhow::ensure!(
            info.tag == "payRequest",
            "{money_address} does not serve pay requests (tag {})",
            info.tag
        );
        Ok(info)
    }

    async fn callback(&self, money_address: &str, query: &[(&str, String)]) -> Result<LnUrlResponse> {
        let info = self.get_info(money_address).await?;
        let mut url = Url::parse(&info.callback)
            .with_context(|| format!("parse lnurl callback {}", info.callback))?;
        url.query_pairs_mut()
            .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));
        self.get_json(url).await
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let resp = self
            .http
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("GET {url}"))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("{url} returned {status}: {body}");
        }
        resp.json()
            .await
            .with_context(|| format!("decode {url} response"))
    }
}

#[async_trait]
impl MoneyAddressResolver for RemoteLnUrlClient {
    async fn get_payment_options(&self, money_address: &str) -> Result<Vec<PaymentOption>> {
        let info = self.get_info(money_address).await?;
        Ok(payment_options(&info))
    }

    async fn get_invoice_response(
        &self,
        money_address: &str,
        amount_sats: u64,
    ) -> Result<LnUrlResponse> {
        let msat = amount_sats
            .checked_mul(MSAT_PER_SAT)
            .context("amount overflows millisatoshis")?;
        self.callback(money_address, &[("amount", msat.to_string())])
            .await
    }

    async fn get_chain_response(
        &self,
        money_address: &str,
        request: &ChainPaymentRequest,
    ) -> Result<LnUrlResponse> {
        self.callback(
            money_address,
            &[
                ("amount", request.amount.normalize().to_string()),
                ("currency", request.currency.to_string()),
                ("network", request.network.to_string()),
            ],
        )
        .await
    }
}

/// Lightning bounds come from the sendable range in msat; extra currencies carry none.
pub fn payment_options(info: &PayRequestInfo) -> Vec<PaymentOption> {
    let to_sats = |msat: u64| Decimal::from(msat) / Decimal::from(MSAT_PER_SAT);

    let mut options = vec![PaymentOption::lightning(
        Some(to_sats(info.min_sendable)),
        Some(to_sats(info.max_sendable)),
    )];
    options.extend(info.currencies.iter().map(|c| PaymentOption {
        code: c.code,
        network: c.network,
        min_sendable: None,
        max_sendable: None,
    }));
    options
}
