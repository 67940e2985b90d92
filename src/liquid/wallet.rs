use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr as _;
use std::sync::{Arc, Mutex};

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use bitcoin::hashes::{Hash as _, sha256};
use lwk_wollet::elements::{Address, AssetId};
use lwk_wollet::{
    ElectrumClient, ElectrumUrl, ElementsNetwork, Wollet, WolletDescriptor,
    full_scan_with_electrum_client,
};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// Default Liquid fee rate in sat/kvB.
pub const DEFAULT_LIQUID_FEE_RATE: f32 = 100.0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub address: String,
    /// Base units of `asset_id`.
    pub amount: u64,
    pub asset_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRequest {
    pub recipients: Vec<Recipient>,
    /// sat/kvB; the builder's default when absent.
    pub fee_rate: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    Full,
    Partial,
}

/// Descriptor-driven Liquid wallet operations. Descriptors arrive decrypted and are never kept.
#[async_trait]
pub trait LiquidWalletEngine: Send + Sync {
    /// Builds an unsigned PSET, returned as base64.
    async fn create_transaction(&self, descriptor: &str, request: &TransactionRequest)
    -> Result<String>;

    /// Next receiving address. With `mark_used` the address is not handed out again.
    async fn derive_receiving_address(&self, descriptor: &str, mark_used: bool) -> Result<String>;

    async fn sync_wallet(&self, descriptor: &str, mode: ScanMode) -> Result<()>;
}

/// `lwk`-backed engine: one persisted `Wollet` per descriptor under `cache_dir`, synced over
/// electrum.
#[derive(Clone)]
pub struct LwkWalletEngine {
    electrum_url: String,
    cache_dir: PathBuf,
    network: ElementsNetwork,
    reserved: Arc<Mutex<HashMap<String, u32>>>,
}

impl LwkWalletEngine {
    pub fn new(
        electrum_url: impl Into<String>,
        cache_dir: impl Into<PathBuf>,
        network: ElementsNetwork,
    ) -> Self {
        Self {
            electrum_url: electrum_url.into(),
            cache_dir: cache_dir.into(),
            network,
            reserved: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    async fn blocking<T, F>(&self, descriptor: &str, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(WalletHandle) -> Result<T> + Send + 'static,
    {
        let handle = WalletHandle {
            descriptor: Zeroizing::new(descriptor.to_string()),
            key: descriptor_key(descriptor),
            electrum_url: self.electrum_url.clone(),
            cache_dir: self.cache_dir.clone(),
            network: self.network,
            reserved: self.reserved.clone(),
        };
        tokio::task::spawn_blocking(move || f(handle))
            .await
            .context("join wallet task")?
    }
}

/// Everything one blocking wallet call needs, moved onto the blocking pool.
struct WalletHandle {
    descriptor: Zeroizing<String>,
    key: String,
    electrum_url: String,
    cache_dir: PathBuf,
    network: ElementsNetwork,
    reserved: Arc<Mutex<HashMap<String, u32>>>,
}

impl WalletHandle {
    fn persist_dir(&self) -> PathBuf {
        self.cache_dir.join(&self.key)
    }

    fn open(&self) -> Result<Wollet> {
        let descriptor: WolletDescriptor = self
            .descriptor
            .parse()
            .context("parse wollet descriptor")?;
        let dir = self.persist_dir();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("create wallet cache dir {}", dir.display()))?;
        Wollet::with_fs_persist(self.network, descriptor, &dir).context("create wollet")
    }

    fn synced(&self) -> Result<Wollet> {
        let mut wollet = self.open()?;
        let mut client = electrum_client(&self.electrum_url)?;
        full_scan_with_electrum_client(&mut wollet, &mut client)
            .context("sync wollet via electrum")?;
        Ok(wollet)
    }

    fn create_transaction(&self, request: &TransactionRequest) -> Result<String> {
        anyhow::ensure!(!request.recipients.is_empty(), "no recipients");

        let wollet = self.synced()?;
        let mut builder = wollet.tx_builder();
        for recipient in &request.recipients {
            let address = Address::from_str(&recipient.address)
                .with_context(|| format!("parse recipient address {}", recipient.address))?;
            let asset = AssetId::from_str(&recipient.asset_id)
                .with_context(|| format!("parse asset id {}", recipient.asset_id))?;
            builder = builder
                .add_recipient(&address, recipient.amount, asset)
                .context("add recipient")?;
        }

        let pset = builder
            .fee_rate(request.fee_rate)
            .finish()
            .context("finalize pset")?;
        Ok(pset.to_string())
    }

    fn derive_receiving_address(&self, mark_used: bool) -> Result<String> {
        let wollet = self.synced()?;
        let first_unused = wollet
            .address(None)
            .context("get next unused address")?
            .index();

        let index = if mark_used {
            let mut reserved = self
                .reserved
                .lock()
                .map_err(|_| anyhow::anyhow!("address reservation mutex poisoned"))?;
            let next = match reserved.get(&self.key) {
                Some(last) if *last >= first_unused => last + 1,
                _ => first_unused,
            };
            reserved.insert(self.key.clone(), next);
            next
        } else {
            first_unused
        };

        Ok(wollet
            .address(Some(index))
            .context("get wollet address")?
            .address()
            .to_string())
    }

    fn sync(&self, mode: ScanMode) -> Result<()> {
        if mode == ScanMode::Full {
            let dir = self.persist_dir();
            if dir.exists() {
                std::fs::remove_dir_all(&dir)
                    .with_context(|| format!("clear wallet cache dir {}", dir.display()))?;
            }
        }
        self.synced().map(|_| ())
    }
}

#[async_trait]
impl LiquidWalletEngine for LwkWalletEngine {
    async fn create_transaction(
        &self,
        descriptor: &str,
        request: &TransactionRequest,
    ) -> Result<String> {
        let request = request.clone();
        self.blocking(descriptor, move |w| w.create_transaction(&request))
            .await
    }

    async fn derive_receiving_address(&self, descriptor: &str, mark_used: bool) -> Result<String> {
        self.blocking(descriptor, move |w| w.derive_receiving_address(mark_used))
            .await
    }

    async fn sync_wallet(&self, descriptor: &str, mode: ScanMode) -> Result<()> {
        self.blocking(descriptor, move |w| w.sync(mode)).await
    }
}

/// Cache directory name for a descriptor; never the descriptor itself.
fn descriptor_key(descriptor: &str) -> String {
    let digest = sha256::Hash::hash(descriptor.as_bytes()).to_byte_array();
    hex::encode(&digest[..16])
}

fn electrum_client(url: &str) -> Result<ElectrumClient> {
    let (endpoint, tls) = match url.split_once("://") {
        Some(("ssl" | "tls", rest)) => (rest, true),
        Some((_, rest)) => (rest, false),
        None => (url, false),
    };
    let electrum_url = ElectrumUrl::new(endpoint, tls, tls)
        .with_context(|| format!("parse electrum url {endpoint}"))?;
    ElectrumClient::new(&electrum_url).context("create electrum client")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_hides_descriptor() {
        let key = descriptor_key("ct(slip77(secret),elwpkh(xpub/*))");
        assert_eq!(key.len(), 32);
        assert!(!key.contains("secret"));
        assert_eq!(key, descriptor_key("ct(slip77(secret),elwpkh(xpub/*))"));
    }
}
