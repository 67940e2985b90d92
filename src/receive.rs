//! Receiving into a user's Liquid account over Lightning, Liquid or Bitcoin.

use std::sync::Arc;

use anyhow::Context as _;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{PayError, PayResult};
use crate::liquid::assets::LBTC_ASSET_ID;
use crate::liquid::bip21;
use crate::liquid::wallet::LiquidWalletEngine;
use crate::swap::boltz::{BoltzChain, ChainDirection};
use crate::swap::service::{ChainSwapInput, ReverseSwapInput, SwapEngine};
use crate::wallet::crypto::DescriptorCipher;
use crate::wallet::{OwnedWalletAccount, WalletRepository};

pub const LIQUID_NETWORK: &str = "L-BTC";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightningInvoice {
    pub payment_request: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnchainAddress {
    pub address: String,
    pub network: String,
    pub bip21: String,
}

/// Deposit instructions for a Bitcoin to Liquid chain swap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitcoinReceiveSwap {
    pub id: String,
    pub min: u64,
    pub max: u64,
    pub receive_address: String,
    pub bip21: Option<String>,
}

#[derive(Clone)]
pub struct ReceiveService {
    swaps: SwapEngine,
    wallet_engine: Arc<dyn LiquidWalletEngine>,
    wallets: Arc<dyn WalletRepository>,
    cipher: DescriptorCipher,
}

impl ReceiveService {
    pub fn new(
        swaps: SwapEngine,
        wallet_engine: Arc<dyn LiquidWalletEngine>,
        wallets: Arc<dyn WalletRepository>,
        cipher: DescriptorCipher,
    ) -> Self {
        Self {
            swaps,
            wallet_engine,
            wallets,
            cipher,
        }
    }

    pub async fn create_lightning_invoice(
        &self,
        user_id: &str,
        wallet_account_id: &str,
        amount: u64,
        description: Option<String>,
    ) -> PayResult<LightningInvoice> {
        let owned = self.owned_account(user_id, wallet_account_id).await?;

        let limits = self.swaps.reverse_limits().await?;
        if amount > limits.maximal {
            return Err(PayError::validation(format!(
                "Maximum amount is {} sats",
                limits.maximal
            )));
        }
        if amount < limits.minimal {
            return Err(PayError::validation(format!(
                "Mimimum amount is {} sats",
                limits.minimal
            )));
        }

        let address = self.fresh_address(&owned).await?;
        let description = description.filter(|d| !d.is_empty()).unwrap_or_else(|| {
            format!(
                "Pay to {}",
                owned.money_address_user.as_deref().unwrap_or_default()
            )
        });

        let swap = self
            .swaps
            .create_reverse_swap(ReverseSwapInput {
                address,
                amount,
                wallet_account_id: owned.account.id.clone(),
                covenant: false,
                description,
            })
            .await
            .map_err(|e| {
                tracing::error!(wallet_account_id, error = %e, "error creating invoice");
                match e {
                    PayError::Limit(_) | PayError::Validation(_) => e,
                    _ => PayError::validation("Error creating invoice"),
                }
            })?;

        Ok(LightningInvoice {
            payment_request: swap.invoice,
        })
    }

    /// A fresh Liquid address, with a BIP21 carrying `amount` sats of `asset_id` when given.
    pub async fn create_onchain_address(
        &self,
        user_id: &str,
        wallet_account_id: &str,
        amount: Option<u64>,
        asset_id: Option<&str>,
    ) -> PayResult<OnchainAddress> {
        let owned = self.owned_account(user_id, wallet_account_id).await?;
        let address = self.fresh_address(&owned).await?;

        let amount = amount.map(|sats| bip21::from_base_units(sats, 8));
        let bip21 = bip21::encode_liquid(
            &address,
            amount.filter(|a| *a > Decimal::ZERO),
            Some(asset_id.unwrap_or(LBTC_ASSET_ID)),
        );

        Ok(OnchainAddress {
            address,
            network: LIQUID_NETWORK.to_string(),
            bip21,
        })
    }

    /// Starts a Bitcoin to Liquid chain swap paying out to a fresh address of the account.
    pub async fn create_bitcoin_receive_swap(
        &self,
        user_id: &str,
        wallet_account_id: &str,
        amount: Option<u64>,
    ) -> PayResult<BitcoinReceiveSwap> {
        let owned = self.owned_account(user_id, wallet_account_id).await?;
        let Some(amount) = amount.filter(|a| *a > 0) else {
            return Err(PayError::validation("Cannot recieve without amount"));
        };

        let address = self.fresh_address(&owned).await?;
        let swap = self
            .swaps
            .create_chain_swap(ChainSwapInput {
                address,
                amount,
                wallet_account_id: owned.account.id.clone(),
                direction: ChainDirection {
                    from: BoltzChain::Btc,
                    to: BoltzChain::LBtc,
                },
            })
            .await
            .inspect_err(|e| {
                tracing::error!(wallet_account_id, error = %e, "error creating address");
            })?;

        Ok(BitcoinReceiveSwap {
            min: swap.lockup_details.amount,
            max: swap.lockup_details.amount,
            receive_address: swap.lockup_details.lockup_address,
            bip21: swap.lockup_details.bip21,
            id: swap.id,
        })
    }

    async fn owned_account(
        &self,
        user_id: &str,
        wallet_account_id: &str,
    ) -> PayResult<OwnedWalletAccount> {
        self.wallets
            .get_account_wallet_account(user_id, wallet_account_id)
            .await
            .context("load wallet account")?
            .ok_or(PayError::NotFound("wallet account"))
    }

    async fn fresh_address(&self, owned: &OwnedWalletAccount) -> PayResult<String> {
        let descriptor = self
            .cipher
            .decrypt(&owned.account.details.local_protected_descriptor)
            .context("decrypt descriptor")?;
        let address = self
            .wallet_engine
            .derive_receiving_address(&descriptor, true)
            .await
            .with_context(|| format!("derive address for account {}", owned.account.id))?;
        Ok(address)
    }
}
