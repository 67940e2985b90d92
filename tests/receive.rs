mod support;

use std::sync::Arc;

use anyhow::Result;

use liquid_pay::PayError;
use liquid_pay::liquid::assets::{LBTC_ASSET_ID, USDT_ASSET_ID};
use liquid_pay::receive::{LIQUID_NETWORK, ReceiveService};
use liquid_pay::swap::boltz::BoltzChain;

use support::fakes::{CHAIN_BITCOIN_LOCKUP_ADDRESS, MemoryWallets};
use support::{EngineFixture, cipher, liquid_wallet};

const ACCOUNT: &str = "w-alice-liquid";

fn receive(fx: &EngineFixture) -> ReceiveService {
    ReceiveService::new(
        fx.engine.clone(),
        fx.wallet_engine.clone(),
        Arc::new(MemoryWallets::new(vec![(
            "user-alice",
            liquid_wallet("w-alice", "alice"),
        )])),
        cipher(),
    )
}

#[tokio::test]
async fn lightning_invoice_respects_reverse_limits() -> Result<()> {
    let fx = EngineFixture::new();
    let svc = receive(&fx);

    let err = svc
        .create_lightning_invoice("user-alice", ACCOUNT, 999, None)
        .await
        .unwrap_err();
    assert_eq!(err.public_message(), "Mimimum amount is 1000 sats");

    let err = svc
        .create_lightning_invoice("user-alice", ACCOUNT, 25_000_001, None)
        .await
        .unwrap_err();
    assert_eq!(err.public_message(), "Maximum amount is 25000000 sats");

    assert_eq!(fx.provider.created_swaps(), 0);
    assert!(fx.wallet_engine.derived.lock().unwrap().is_empty());
    Ok(())
}

#[tokio::test]
async fn lightning_invoice_defaults_description_to_money_address() -> Result<()> {
    let fx = EngineFixture::new();
    let svc = receive(&fx);

    let invoice = svc
        .create_lightning_invoice("user-alice", ACCOUNT, 4_000, None)
        .await?;
    svc.create_lightning_invoice("user-alice", ACCOUNT, 4_000, Some("coffee".to_string()))
        .await?;

    let requests = fx.provider.reverse_requests.lock().unwrap().clone();
    assert_eq!(requests[0].description, "Pay to alice");
    assert_eq!(requests[1].description, "coffee");
    assert_eq!(requests[0].address, "lq1qqfresh1");
    assert!(!requests[0].claim_covenant);
    assert_eq!(invoice.payment_request, "lnbc40000n1reverse1");
    assert_eq!(fx.wallet_engine.derived.lock().unwrap().clone(), vec![true, true]);
    Ok(())
}

#[tokio::test]
async fn foreign_accounts_are_not_found() -> Result<()> {
    let fx = EngineFixture::new();
    let svc = receive(&fx);

    let err = svc
        .create_onchain_address("user-mallory", ACCOUNT, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, PayError::NotFound("wallet account")));

    let err = svc
        .create_lightning_invoice("user-mallory", ACCOUNT, 5_000, None)
        .await
        .unwrap_err();
    assert!(matches!(err, PayError::NotFound(_)));
    Ok(())
}

#[tokio::test]
async fn onchain_address_encodes_amount_and_asset() -> Result<()> {
    let fx = EngineFixture::new();
    let svc = receive(&fx);

    let plain = svc
        .create_onchain_address("user-alice", ACCOUNT, None, None)
        .await?;
    assert_eq!(plain.network, LIQUID_NETWORK);
    assert_eq!(
        plain.bip21,
        format!("liquidnetwork:lq1qqfresh1?assetid={LBTC_ASSET_ID}")
    );

    let usdt = svc
        .create_onchain_address("user-alice", ACCOUNT, Some(150_000_000), Some(USDT_ASSET_ID))
        .await?;
    assert_eq!(usdt.address, "lq1qqfresh2");
    assert_eq!(
        usdt.bip21,
        format!("liquidnetwork:lq1qqfresh2?amount=1.5&assetid={USDT_ASSET_ID}")
    );
    Ok(())
}

#[tokio::test]
async fn bitcoin_receive_swap_quotes_the_lockup_amount() -> Result<()> {
    let fx = EngineFixture::new();
    let svc = receive(&fx);

    let err = svc
        .create_bitcoin_receive_swap("user-alice", ACCOUNT, None)
        .await
        .unwrap_err();
    assert_eq!(err.public_message(), "Cannot recieve without amount");

    let swap = svc
        .create_bitcoin_receive_swap("user-alice", ACCOUNT, Some(30_000))
        .await?;

    assert_eq!(swap.id, "chain-1");
    assert_eq!(swap.min, 30_787);
    assert_eq!(swap.max, swap.min);
    assert_eq!(swap.receive_address, CHAIN_BITCOIN_LOCKUP_ADDRESS);
    assert_eq!(
        swap.bip21.as_deref(),
        Some("bitcoin:bc1qchainlockup?amount=0.00030787")
    );

    let requests = fx.provider.chain_requests.lock().unwrap().clone();
    assert_eq!(requests[0].from, BoltzChain::Btc);
    assert_eq!(requests[0].to, BoltzChain::LBtc);
    assert_eq!(requests[0].claim_address, "lq1qqfresh1");
    Ok(())
}
