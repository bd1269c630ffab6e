// Example: Reading a private balance
//
// This example demonstrates how to:
// 1. Build a client from a JSON config file (or the devnet defaults)
// 2. Read a balance record across both ledgers
// 3. Tell a resident record from a delegated one

use private_payments_sdk::core::config::USDC_DEVNET;
use private_payments_sdk::{parse_identity, PrivatePayments, SdkConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // 1. Config: PAYMENTS_CONFIG points at a JSON file, otherwise devnet
    let config = match std::env::var("PAYMENTS_CONFIG") {
        Ok(path) => SdkConfig::from_file(path)?,
        Err(_) => SdkConfig::default(),
    };
    let client = PrivatePayments::builder(config).build();

    // 2. Owner to inspect, e.g. `cargo run --example balance -- <pubkey>`
    let owner = match std::env::args().nth(1) {
        Some(raw) => parse_identity(&raw)?,
        None => {
            eprintln!("usage: balance <owner>");
            return Ok(());
        },
    };

    // Without a connected wallet the rollup copy is unreachable, so a
    // delegated record reports AccessDenied
    let view = client.read_balance(&owner, &USDC_DEVNET.mint).await?;

    println!("Balance record {}", view.address);
    println!(
        "  Amount: {} {}",
        view.ui_amount(USDC_DEVNET.decimals),
        USDC_DEVNET.symbol
    );
    match view.authority {
        Some(authority) => println!("  Authority: {:?}", authority),
        None => println!("  No record yet"),
    }

    Ok(())
}
