pub mod crypto;
pub mod lock;
pub mod rescan;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WalletAccountType {
    Liquid,
    Bitcoin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletAccountDetails {
    #[serde(rename = "type")]
    pub kind: WalletAccountType,
    /// Descriptor encrypted with the service key. Decrypt only for the call that needs it.
    pub local_protected_descriptor: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletAccount {
    pub id: String,
    pub wallet_id: String,
    pub name: String,
    pub details: WalletAccountDetails,
}

impl WalletAccount {
    pub fn is_liquid(&self) -> bool {
        self.details.kind == WalletAccountType::Liquid
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub id: String,
    pub name: String,
    /// User part of the wallet's `user@domain` payment address, if one is claimed.
    pub money_address_user: Option<String>,
    pub accounts: Vec<WalletAccount>,
}

impl Wallet {
    pub fn first_liquid_account(&self) -> Option<&WalletAccount> {
        self.accounts.iter().find(|a| a.is_liquid())
    }
}

/// A wallet account together with its owner's payment address user part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedWalletAccount {
    pub account: WalletAccount,
    pub money_address_user: Option<String>,
}

/// Read side of wallet persistence. Lookups scoped by `user_id` return `None` unless that user
/// owns the wallet.
#[async_trait]
pub trait WalletRepository: Send + Sync {
    async fn get_wallet_by_money_address(&self, money_address_user: &str)
    -> Result<Option<Wallet>>;

    async fn get_account_wallet(&self, user_id: &str, wallet_id: &str) -> Result<Option<Wallet>>;

    async fn get_account_wallet_account(
        &self,
        user_id: &str,
        wallet_account_id: &str,
    ) -> Result<Option<OwnedWalletAccount>>;
}
