#![allow(dead_code)]

pub mod fakes;
pub mod invoices;

use std::sync::Arc;

use liquid_pay::swap::fee_cache::MemoryClaimFeeCache;
use liquid_pay::swap::service::SwapEngine;
use liquid_pay::wallet::crypto::DescriptorCipher;
use liquid_pay::wallet::{Wallet, WalletAccount, WalletAccountDetails, WalletAccountType};

use fakes::{FakeCovenants, FakeProvider, FakeWalletEngine, MemorySwapStore, RecordingNotifier};

pub const DESCRIPTOR: &str = "ct(slip77(0000000000000000000000000000000000000000000000000000000000000001),elwpkh([73c5da0a/84'/1776'/0']xpub/<0;1>/*))";

pub fn cipher() -> DescriptorCipher {
    DescriptorCipher::new(&[7u8; 32])
}

pub fn account(id: &str, wallet_id: &str, kind: WalletAccountType) -> WalletAccount {
    WalletAccount {
        id: id.to_string(),
        wallet_id: wallet_id.to_string(),
        name: format!("account {id}"),
        details: WalletAccountDetails {
            kind,
            local_protected_descriptor: cipher().encrypt(DESCRIPTOR).expect("encrypt descriptor"),
        },
    }
}

pub fn liquid_wallet(id: &str, money_address_user: &str) -> Wallet {
    Wallet {
        id: id.to_string(),
        name: format!("wallet {id}"),
        money_address_user: Some(money_address_user.to_string()),
        accounts: vec![account(&format!("{id}-liquid"), id, WalletAccountType::Liquid)],
    }
}

/// Swap engine wired to in-memory collaborators, with handles to inspect them.
pub struct EngineFixture {
    pub engine: SwapEngine,
    pub provider: Arc<FakeProvider>,
    pub store: Arc<MemorySwapStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub covenants: Arc<FakeCovenants>,
    pub claim_fees: Arc<MemoryClaimFeeCache>,
    pub wallet_engine: Arc<FakeWalletEngine>,
}

impl EngineFixture {
    pub fn new() -> Self {
        Self::with_provider(FakeProvider::new())
    }

    pub fn with_provider(provider: FakeProvider) -> Self {
        let _ = liquid_pay::logging::init();
        let provider = Arc::new(provider);
        let store = Arc::new(MemorySwapStore::default());
        let notifier = Arc::new(RecordingNotifier::new(store.clone()));
        let covenants = Arc::new(FakeCovenants::default());
        let claim_fees = Arc::new(MemoryClaimFeeCache::new());

        let engine = SwapEngine::new(
            provider.clone(),
            store.clone(),
            notifier.clone(),
            covenants.clone(),
            claim_fees.clone(),
        );

        Self {
            engine,
            provider,
            store,
            notifier,
            covenants,
            claim_fees,
            wallet_engine: Arc::new(FakeWalletEngine::default()),
        }
    }
}
