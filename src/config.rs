use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context as _, Result};

pub const DEFAULT_REFERRAL_ID: &str = "AMBOSS";

/// Settings shared by the swap engine, the LNURL resolver and the wallet coordinator.
#[derive(Debug, Clone, clap::Args)]
pub struct ServiceConfig {
    #[arg(long, env = "BOLTZ_URL", default_value = "https://api.boltz.exchange")]
    pub boltz_url: String,

    #[arg(long, env = "COVCLAIM_URL", default_value = "http://127.0.0.1:1234")]
    pub covclaim_url: String,

    /// Domains this service answers LNURL requests for. The first one is canonical.
    #[arg(long = "domain", env = "SERVER_DOMAINS", value_delimiter = ',', default_value = "localhost")]
    pub domains: Vec<String>,

    #[arg(long, env = "ENCRYPTION_KEY", default_value = "")]
    pub encryption_key: String,

    #[arg(long, env = "LIQUID_ELECTRUM_URL", default_value = "ssl://blockstream.info:995")]
    pub liquid_electrum_url: String,

    #[arg(long, env = "WALLET_CACHE_DIR", default_value = "data/wallets")]
    pub wallet_cache_dir: PathBuf,

    #[arg(long, env = "STORE_PATH", default_value = "data/liquid_pay.sqlite3")]
    pub store_path: PathBuf,

    #[arg(long, env = "REFERRAL_ID", default_value = DEFAULT_REFERRAL_ID)]
    pub referral_id: String,

    #[arg(long, env = "RESCAN_LOCK_TTL_SECS", default_value_t = 300)]
    pub rescan_lock_ttl_secs: u64,
}

impl ServiceConfig {
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            !self.domains.iter().all(|d| d.trim().is_empty()),
            "at least one server domain is required"
        );
        if !self.encryption_key.is_empty() {
            self.encryption_key_bytes()?;
        }
        Ok(())
    }

    pub fn encryption_key_bytes(&self) -> Result<[u8; 32]> {
        anyhow::ensure!(
            self.encryption_key.len() == 64,
            "Encryption key needs to be a 64 character hex string"
        );
        let bytes = hex::decode(&self.encryption_key).context("decode encryption key hex")?;
        bytes
            .try_into()
            .map_err(|_| anyhow::anyhow!("encryption key must be 32 bytes"))
    }

    pub fn primary_domain(&self) -> &str {
        self.domains
            .iter()
            .map(String::as_str)
            .find(|d| !d.trim().is_empty())
            .unwrap_or("localhost")
    }

    pub fn rescan_lock_ttl(&self) -> Duration {
        Duration::from_secs(self.rescan_lock_ttl_secs)
    }
}
