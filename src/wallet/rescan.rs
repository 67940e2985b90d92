use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;

use crate::error::{PayError, PayResult};
use crate::liquid::wallet::{LiquidWalletEngine, ScanMode};

use super::WalletRepository;
use super::crypto::DescriptorCipher;
use super::lock::{DistributedLock, LockError};

pub fn wallet_scan_key(wallet_id: &str) -> String {
    format!("walletScan-{wallet_id}")
}

/// Runs at most one rescan per wallet across every instance sharing the lock backend.
pub struct RescanCoordinator {
    wallets: Arc<dyn WalletRepository>,
    engine: Arc<dyn LiquidWalletEngine>,
    cipher: DescriptorCipher,
    lock: Arc<dyn DistributedLock>,
    lock_ttl: Duration,
}

impl RescanCoordinator {
    pub fn new(
        wallets: Arc<dyn WalletRepository>,
        engine: Arc<dyn LiquidWalletEngine>,
        cipher: DescriptorCipher,
        lock: Arc<dyn DistributedLock>,
        lock_ttl: Duration,
    ) -> Self {
        Self {
            wallets,
            engine,
            cipher,
            lock,
            lock_ttl,
        }
    }

    pub async fn refresh_wallet(
        &self,
        user_id: &str,
        wallet_id: &str,
        full_scan: bool,
    ) -> PayResult<bool> {
        let lease = self
            .lock
            .acquire(&wallet_scan_key(wallet_id), self.lock_ttl)
            .await
            .map_err(|e| match e {
                LockError::Locked => PayError::LockContention,
                LockError::Backend(e) => PayError::Internal(e.context("acquire wallet scan lock")),
            })?;

        let result = self.rescan(user_id, wallet_id, full_scan).await;

        if let Err(e) = self.lock.release(&lease).await {
            tracing::warn!(wallet_id, error = %e, "failed to release wallet scan lock");
        }

        match &result {
            Ok(_) => tracing::info!(wallet_id, full_scan, "wallet rescan finished"),
            Err(e) => tracing::warn!(wallet_id, error = %e, "wallet rescan failed"),
        }
        result
    }

    async fn rescan(&self, user_id: &str, wallet_id: &str, full_scan: bool) -> PayResult<bool> {
        let wallet = self
            .wallets
            .get_account_wallet(user_id, wallet_id)
            .await
            .context("load wallet")?
            .ok_or(PayError::NotFound("wallet"))?;

        let mode = if full_scan {
            ScanMode::Full
        } else {
            ScanMode::Partial
        };

        for account in &wallet.accounts {
            let descriptor = self
                .cipher
                .decrypt(&account.details.local_protected_descriptor)
                .with_context(|| format!("decrypt descriptor of account {}", account.id))?;
            self.engine
                .sync_wallet(&descriptor, mode)
                .await
                .with_context(|| format!("sync wallet account {}", account.id))?;
        }

        Ok(true)
    }
}
