use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::json;

use liquid_pay::liquid::assets::LBTC_ASSET_ID;
use liquid_pay::liquid::bip21;
use liquid_pay::liquid::wallet::{LiquidWalletEngine, ScanMode, TransactionRequest};
use liquid_pay::lnurl::{ChainPaymentRequest, LnUrlResponse, MoneyAddressResolver, PaymentOption};
use liquid_pay::swap::boltz::{
    BoltzChain, ChainPair, ChainRequest, ChainResponse, MagicRouteHintInfo, PairMap,
    ReversePair, ReverseRequest, ReverseResponse, SubmarinePair, SubmarineRequest,
    SubmarineResponse, SwapProviderClient,
};
use liquid_pay::swap::covenant::{CovenantClaim, CovenantRegistrar};
use liquid_pay::swap::limits::SwapLimits;
use liquid_pay::swap::notifier::SwapStatusNotifier;
use liquid_pay::swap::store::SwapRepository;
use liquid_pay::swap::{SwapRecord, SwapRequestRecord, SwapResponseRecord};
use liquid_pay::wallet::lock::{DistributedLock, LockError, LockLease};
use liquid_pay::wallet::{OwnedWalletAccount, Wallet, WalletRepository};

pub const SUBMARINE_LOCKUP_ADDRESS: &str = "lq1qqsubmarinelockup";
pub const SUBMARINE_EXPECTED_SATS: u64 = 50_150;
pub const CHAIN_LIQUID_LOCKUP_ADDRESS: &str = "lq1qqchainlockup";
pub const CHAIN_BITCOIN_LOCKUP_ADDRESS: &str = "bc1qchainlockup";
pub const CHAIN_SERVER_FEE: u64 = 480;
pub const CHAIN_CLAIM_FEE: u64 = 276;
pub const CHAIN_PERCENTAGE: f64 = 0.1;

fn from_json<T: DeserializeOwned>(value: serde_json::Value) -> T {
    serde_json::from_value(value).expect("decode fixture json")
}

/// Swap provider that answers from fixed pair info and records every request.
pub struct FakeProvider {
    pub submarine_limits: SwapLimits,
    pub reverse_limits: SwapLimits,
    pub chain_limits: SwapLimits,
    pub route_hint_info: Mutex<Option<MagicRouteHintInfo>>,
    pub submarine_requests: Mutex<Vec<SubmarineRequest>>,
    pub reverse_requests: Mutex<Vec<ReverseRequest>>,
    pub chain_requests: Mutex<Vec<ChainRequest>>,
    pub route_hint_lookups: Mutex<Vec<String>>,
    pub info_calls: AtomicUsize,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self {
            submarine_limits: SwapLimits {
                minimal: 1_000,
                maximal: 25_000_000,
            },
            reverse_limits: SwapLimits {
                minimal: 1_000,
                maximal: 25_000_000,
            },
            chain_limits: SwapLimits {
                minimal: 25_000,
                maximal: 10_000_000,
            },
            route_hint_info: Mutex::new(None),
            submarine_requests: Mutex::new(Vec::new()),
            reverse_requests: Mutex::new(Vec::new()),
            chain_requests: Mutex::new(Vec::new()),
            route_hint_lookups: Mutex::new(Vec::new()),
            info_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_route_hint_info(&self, info: MagicRouteHintInfo) {
        *self.route_hint_info.lock().unwrap() = Some(info);
    }

    pub fn created_swaps(&self) -> usize {
        self.submarine_requests.lock().unwrap().len()
            + self.reverse_requests.lock().unwrap().len()
            + self.chain_requests.lock().unwrap().len()
    }

    fn chain_pair(&self, limits: SwapLimits) -> serde_json::Value {
        json!({
            "hash": "chain-pair-hash",
            "rate": 1.0,
            "limits": limits,
            "fees": {
                "percentage": CHAIN_PERCENTAGE,
                "minerFees": {
                    "server": CHAIN_SERVER_FEE,
                    "user": { "claim": CHAIN_CLAIM_FEE, "lockup": 276 }
                }
            }
        })
    }
}

#[async_trait]
impl SwapProviderClient for FakeProvider {
    async fn get_submarine_info(&self) -> Result<PairMap<SubmarinePair>> {
        self.info_calls.fetch_add(1, Ordering::SeqCst);
        Ok(from_json(json!({
            "L-BTC": { "BTC": {
                "hash": "submarine-pair-hash",
                "rate": 1.0,
                "limits": self.submarine_limits,
                "fees": { "percentage": 0.1, "minerFees": 19 }
            }}
        })))
    }

    async fn get_reverse_info(&self) -> Result<PairMap<ReversePair>> {
        self.info_calls.fetch_add(1, Ordering::SeqCst);
        Ok(from_json(json!({
            "BTC": { "L-BTC": {
                "hash": "reverse-pair-hash",
                "rate": 1.0,
                "limits": self.reverse_limits,
                "fees": { "percentage": 0.25, "minerFees": { "lockup": 27, "claim": 20 } }
            }}
        })))
    }

    async fn get_chain_info(&self) -> Result<PairMap<ChainPair>> {
        self.info_calls.fetch_add(1, Ordering::SeqCst);
        Ok(from_json(json!({
            "L-BTC": { "BTC": self.chain_pair(self.chain_limits) },
            "BTC": { "L-BTC": self.chain_pair(self.chain_limits) }
        })))
    }

    async fn create_submarine(&self, request: &SubmarineRequest) -> Result<SubmarineResponse> {
        let mut requests = self.submarine_requests.lock().unwrap();
        requests.push(request.clone());
        let amount = bip21::from_base_units(SUBMARINE_EXPECTED_SATS, 8);

        Ok(from_json(json!({
            "id": format!("sub-{}", requests.len()),
            "bip21": bip21::encode_liquid(SUBMARINE_LOCKUP_ADDRESS, Some(amount), Some(LBTC_ASSET_ID)),
            "address": SUBMARINE_LOCKUP_ADDRESS,
            "expectedAmount": SUBMARINE_EXPECTED_SATS,
            "claimPublicKey": "02c0ffee",
            "swapTree": { "claimLeaf": { "version": 196, "output": "a914" } },
            "acceptZeroConf": false,
            "timeoutBlockHeight": 3_000_000,
            "blindingKey": "blinding"
        })))
    }

    async fn create_reverse(&self, request: &ReverseRequest) -> Result<ReverseResponse> {
        let mut requests = self.reverse_requests.lock().unwrap();
        requests.push(request.clone());

        Ok(from_json(json!({
            "id": format!("rev-{}", requests.len()),
            "invoice": format!("lnbc{}n1reverse{}", request.invoice_amount * 10, requests.len()),
            "swapTree": { "claimLeaf": { "version": 196, "output": "82012088" } },
            "lockupAddress": "lq1qqreverselockup",
            "refundPublicKey": "03beef",
            "timeoutBlockHeight": 3_000_100,
            "onchainAmount": request.invoice_amount - 100,
            "blindingKey": "reverse-blinding"
        })))
    }

    async fn create_chain(&self, request: &ChainRequest) -> Result<ChainResponse> {
        let mut requests = self.chain_requests.lock().unwrap();
        requests.push(request.clone());
        let id = format!("chain-{}", requests.len());

        let lock_btc = bip21::from_base_units(request.user_lock_amount, 8);
        let (lockup_address, lockup_bip21) = match request.from {
            BoltzChain::LBtc => (
                CHAIN_LIQUID_LOCKUP_ADDRESS,
                bip21::encode_liquid(CHAIN_LIQUID_LOCKUP_ADDRESS, Some(lock_btc), Some(LBTC_ASSET_ID)),
            ),
            BoltzChain::Btc => (
                CHAIN_BITCOIN_LOCKUP_ADDRESS,
                format!("bitcoin:{CHAIN_BITCOIN_LOCKUP_ADDRESS}?amount={}", lock_btc.normalize()),
            ),
        };

        Ok(from_json(json!({
            "id": id,
            "claimDetails": {
                "swapTree": { "claimLeaf": { "version": 196 } },
                "lockupAddress": request.claim_address,
                "serverPublicKey": "02aa",
                "timeoutBlockHeight": 900,
                "amount": request.user_lock_amount - CHAIN_SERVER_FEE,
            },
            "lockupDetails": {
                "swapTree": { "refundLeaf": { "version": 196 } },
                "lockupAddress": lockup_address,
                "serverPublicKey": "02bb",
                "timeoutBlockHeight": 1_000,
                "amount": request.user_lock_amount,
                "bip21": lockup_bip21,
            },
            "providerNote": "kept verbatim"
        })))
    }

    async fn get_magic_route_hint_info(&self, invoice: &str) -> Result<MagicRouteHintInfo> {
        self.route_hint_lookups
            .lock()
            .unwrap()
            .push(invoice.to_string());
        self.route_hint_info
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| anyhow::anyhow!("no route hint info for invoice"))
    }
}

#[derive(Default)]
pub struct MemorySwapStore {
    pub records: Mutex<Vec<SwapRecord>>,
}

impl MemorySwapStore {
    pub fn contains(&self, swap_id: &str) -> bool {
        self.records.lock().unwrap().iter().any(|r| r.id == swap_id)
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn record(&self, swap_id: &str) -> Option<SwapRecord> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id == swap_id)
            .cloned()
    }
}

#[async_trait]
impl SwapRepository for MemorySwapStore {
    async fn create_swap(
        &self,
        wallet_account_id: &str,
        request: SwapRequestRecord,
        response: SwapResponseRecord,
    ) -> Result<SwapRecord> {
        let record = SwapRecord {
            id: response.swap_id().to_string(),
            provider: response.provider,
            swap_type: response.swap_type(),
            wallet_account_id: wallet_account_id.to_string(),
            request,
            response,
        };
        self.records.lock().unwrap().push(record.clone());
        Ok(record)
    }

    async fn get_swap(&self, swap_id: &str) -> Result<Option<SwapRecord>> {
        Ok(self.record(swap_id))
    }

    async fn get_reverse_swap_by_invoice(&self, invoice: &str) -> Result<Option<SwapRecord>> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|r| r.invoice() == Some(invoice))
            .cloned())
    }
}

/// Remembers each subscribed id and whether it was already persisted at that moment.
pub struct RecordingNotifier {
    store: Arc<MemorySwapStore>,
    pub subscriptions: Mutex<Vec<(String, bool)>>,
}

impl RecordingNotifier {
    pub fn new(store: Arc<MemorySwapStore>) -> Self {
        Self {
            store,
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    pub fn subscribed(&self) -> Vec<(String, bool)> {
        self.subscriptions.lock().unwrap().clone()
    }
}

impl SwapStatusNotifier for RecordingNotifier {
    fn subscribe(&self, swap_ids: &[String]) {
        let mut subscriptions = self.subscriptions.lock().unwrap();
        for id in swap_ids {
            subscriptions.push((id.clone(), self.store.contains(id)));
        }
    }
}

#[derive(Default)]
pub struct FakeCovenants {
    pub claims: Mutex<Vec<CovenantClaim>>,
    pub fail: AtomicBool,
}

#[async_trait]
impl CovenantRegistrar for FakeCovenants {
    async fn register(&self, claim: &CovenantClaim) -> Result<()> {
        self.claims.lock().unwrap().push(claim.clone());
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("covenant claimer unavailable");
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeWalletEngine {
    pub transactions: Mutex<Vec<(String, TransactionRequest)>>,
    pub derived: Mutex<Vec<bool>>,
    pub syncs: Mutex<Vec<(String, ScanMode)>>,
    pub sync_delay: Duration,
    pub fail_sync: AtomicBool,
}

impl FakeWalletEngine {
    pub fn with_sync_delay(sync_delay: Duration) -> Self {
        Self {
            sync_delay,
            ..Self::default()
        }
    }

    pub fn last_transaction(&self) -> Option<(String, TransactionRequest)> {
        self.transactions.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl LiquidWalletEngine for FakeWalletEngine {
    async fn create_transaction(
        &self,
        descriptor: &str,
        request: &TransactionRequest,
    ) -> Result<String> {
        let mut transactions = self.transactions.lock().unwrap();
        transactions.push((descriptor.to_string(), request.clone()));
        Ok(format!("cHNldP8B{}", transactions.len()))
    }

    async fn derive_receiving_address(&self, _descriptor: &str, mark_used: bool) -> Result<String> {
        let mut derived = self.derived.lock().unwrap();
        derived.push(mark_used);
        Ok(format!("lq1qqfresh{}", derived.len()))
    }

    async fn sync_wallet(&self, descriptor: &str, mode: ScanMode) -> Result<()> {
        tokio::time::sleep(self.sync_delay).await;
        if self.fail_sync.load(Ordering::SeqCst) {
            anyhow::bail!("electrum unreachable");
        }
        self.syncs
            .lock()
            .unwrap()
            .push((descriptor.to_string(), mode));
        Ok(())
    }
}

/// Wallets keyed by owning user id.
#[derive(Default)]
pub struct MemoryWallets {
    pub wallets: Vec<(String, Wallet)>,
}

impl MemoryWallets {
    pub fn new(wallets: Vec<(&str, Wallet)>) -> Self {
        Self {
            wallets: wallets
                .into_iter()
                .map(|(user, w)| (user.to_string(), w))
                .collect(),
        }
    }
}

#[async_trait]
impl WalletRepository for MemoryWallets {
    async fn get_wallet_by_money_address(
        &self,
        money_address_user: &str,
    ) -> Result<Option<Wallet>> {
        Ok(self
            .wallets
            .iter()
            .map(|(_, w)| w)
            .find(|w| w.money_address_user.as_deref() == Some(money_address_user))
            .cloned())
    }

    async fn get_account_wallet(&self, user_id: &str, wallet_id: &str) -> Result<Option<Wallet>> {
        Ok(self
            .wallets
            .iter()
            .find(|(user, w)| user == user_id && w.id == wallet_id)
            .map(|(_, w)| w.clone()))
    }

    async fn get_account_wallet_account(
        &self,
        user_id: &str,
        wallet_account_id: &str,
    ) -> Result<Option<OwnedWalletAccount>> {
        Ok(self
            .wallets
            .iter()
            .filter(|(user, _)| user == user_id)
            .find_map(|(_, w)| {
                w.accounts
                    .iter()
                    .find(|a| a.id == wallet_account_id)
                    .map(|a| OwnedWalletAccount {
                        account: a.clone(),
                        money_address_user: w.money_address_user.clone(),
                    })
            }))
    }
}

/// Payment-address resolver with canned answers.
pub struct FakeResolver {
    pub options: Option<Vec<PaymentOption>>,
    pub invoice: Mutex<LnUrlResponse>,
    pub chain: Mutex<LnUrlResponse>,
    pub invoice_requests: Mutex<Vec<(String, u64)>>,
    pub chain_requests: Mutex<Vec<(String, ChainPaymentRequest)>>,
}

impl FakeResolver {
    pub fn new(options: Option<Vec<PaymentOption>>) -> Self {
        Self {
            options,
            invoice: Mutex::new(LnUrlResponse::error("no invoice configured")),
            chain: Mutex::new(LnUrlResponse::error("no payload configured")),
            invoice_requests: Mutex::new(Vec::new()),
            chain_requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl MoneyAddressResolver for FakeResolver {
    async fn get_payment_options(&self, money_address: &str) -> Result<Vec<PaymentOption>> {
        self.options
            .clone()
            .ok_or_else(|| anyhow::anyhow!("{money_address} is unreachable"))
    }

    async fn get_invoice_response(
        &self,
        money_address: &str,
        amount_sats: u64,
    ) -> Result<LnUrlResponse> {
        self.invoice_requests
            .lock()
            .unwrap()
            .push((money_address.to_string(), amount_sats));
        Ok(self.invoice.lock().unwrap().clone())
    }

    async fn get_chain_response(
        &self,
        money_address: &str,
        request: &ChainPaymentRequest,
    ) -> Result<LnUrlResponse> {
        self.chain_requests
            .lock()
            .unwrap()
            .push((money_address.to_string(), request.clone()));
        Ok(self.chain.lock().unwrap().clone())
    }
}

/// In-process lock with the same contention semantics as the SQLite one.
#[derive(Default)]
pub struct MemoryLock {
    held: Mutex<Vec<LockLease>>,
    counter: AtomicUsize,
}

impl MemoryLock {
    pub fn is_held(&self, key: &str) -> bool {
        self.held.lock().unwrap().iter().any(|l| l.key == key)
    }
}

#[async_trait]
impl DistributedLock for MemoryLock {
    async fn acquire(&self, key: &str, _ttl: Duration) -> Result<LockLease, LockError> {
        let mut held = self.held.lock().unwrap();
        if held.iter().any(|l| l.key == key) {
            return Err(LockError::Locked);
        }
        let lease = LockLease {
            key: key.to_string(),
            token: self.counter.fetch_add(1, Ordering::SeqCst).to_string(),
        };
        held.push(lease.clone());
        Ok(lease)
    }

    async fn release(&self, lease: &LockLease) -> Result<(), LockError> {
        self.held.lock().unwrap().retain(|l| l != lease);
        Ok(())
    }
}
