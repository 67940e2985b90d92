use anyhow::{Context as _, Result};
use clap::{Parser as _, Subcommand};
use liquid_pay::config::ServiceConfig;
use liquid_pay::lightning::{invoice, route_hint};
use liquid_pay::swap::boltz::{
    self, BoltzChain, BoltzHttpClient, ChainFees, ChainMinerFees, SwapProviderClient as _,
    UserMinerFees,
};
use liquid_pay::swap::service::user_lock_amount;
use serde_json::json;

#[derive(Debug, clap::Parser)]
struct Args {
    #[command(flatten)]
    cfg: ServiceConfig,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Provider limits for submarine, reverse and chain swaps.
    Limits,
    DecodeInvoice {
        #[arg(long)]
        invoice: String,
    },
    /// Amount to lock so `amount` sats arrive on the other chain. Fees not given on the command
    /// line are fetched from the provider.
    ChainQuote {
        #[arg(long)]
        amount: u64,

        #[arg(long, default_value = "L-BTC")]
        from: BoltzChain,

        #[arg(long, default_value = "BTC")]
        to: BoltzChain,

        #[arg(long)]
        server_fee: Option<u64>,

        #[arg(long)]
        claim_fee: Option<u64>,

        #[arg(long)]
        percentage: Option<f64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    liquid_pay::logging::init().ok();
    let args = Args::parse();
    let client = BoltzHttpClient::new(args.cfg.boltz_url.clone());

    let out = match args.command {
        Command::Limits => {
            let submarine = client.get_submarine_info().await.context("submarine info")?;
            let reverse = client.get_reverse_info().await.context("reverse info")?;
            let chain = client.get_chain_info().await.context("chain info")?;

            json!({
              "submarine": boltz::pair(&submarine, BoltzChain::LBtc, BoltzChain::Btc)?.limits,
              "reverse": boltz::pair(&reverse, BoltzChain::Btc, BoltzChain::LBtc)?.limits,
              "chain": {
                "L-BTC/BTC": boltz::pair(&chain, BoltzChain::LBtc, BoltzChain::Btc)?.limits,
                "BTC/L-BTC": boltz::pair(&chain, BoltzChain::Btc, BoltzChain::LBtc)?.limits,
              },
            })
        }
        Command::DecodeInvoice { invoice: raw } => {
            let decoded = route_hint::decode_invoice(&raw)?;
            json!({
              "amount_sats": decoded.amount_sats,
              "payment_hash": invoice::payment_hash_hex(&decoded.invoice),
              "magic_routing_hint": decoded.magic_routing_hint.map(|h| json!({
                "pubkey": h.pubkey.to_string(),
                "short_channel_id": h.short_channel_id,
              })),
            })
        }
        Command::ChainQuote {
            amount,
            from,
            to,
            server_fee,
            claim_fee,
            percentage,
        } => {
            let fees = match (server_fee, claim_fee, percentage) {
                (Some(server), Some(claim), Some(percentage)) => ChainFees {
                    percentage,
                    miner_fees: ChainMinerFees {
                        server,
                        user: UserMinerFees { claim, lockup: 0 },
                    },
                },
                _ => {
                    let chain = client.get_chain_info().await.context("chain info")?;
                    let mut fees = boltz::pair(&chain, from, to)?.fees.clone();
                    if let Some(server) = server_fee {
                        fees.miner_fees.server = server;
                    }
                    if let Some(claim) = claim_fee {
                        fees.miner_fees.user.claim = claim;
                    }
                    if let Some(percentage) = percentage {
                        fees.percentage = percentage;
                    }
                    fees
                }
            };

            json!({
              "from": from.as_str(),
              "to": to.as_str(),
              "amount": amount,
              "user_lock_amount": user_lock_amount(amount, &fees)?,
            })
        }
    };

    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
