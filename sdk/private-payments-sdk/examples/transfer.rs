// Example: Sending a private transfer
//
// This example demonstrates how to:
// 1. Load the owner's keypair and connect a client
// 2. Authorize against the rollup (cached in a token file)
// 3. Run a transfer while following its progress

use private_payments_sdk::core::config::USDC_DEVNET;
use private_payments_sdk::store::tokens::FileTokenStore;
use private_payments_sdk::{
    explorer_url, parse_identity, KeypairSigner, PrivatePayments, SdkConfig, TransferRequest,
};
use rust_decimal::Decimal;
use solana_sdk::signature::read_keypair_file;
use std::str::FromStr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("private_payments_sdk=info"))
        .init();

    // `cargo run --example transfer -- <keypair.json> <recipient> <amount>`
    let args: Vec<String> = std::env::args().skip(1).collect();
    let [keypair_path, recipient, amount] = args.as_slice() else {
        eprintln!("usage: transfer <keypair.json> <recipient> <amount>");
        return Ok(());
    };

    // 1. Owner wallet and client
    let keypair = read_keypair_file(keypair_path)?;
    let tokens = FileTokenStore::open(".payments-tokens.json").await?;
    let client = PrivatePayments::builder(SdkConfig::default())
        .with_wallet(Arc::new(KeypairSigner::new(keypair)))
        .with_token_store(Arc::new(tokens))
        .build();

    // 2. Rollup authorization: the keypair signs the rollup's challenge once,
    //    the token is cached in the token file for later runs
    if !client.check_rollup_health().await {
        eprintln!("rollup endpoint is unhealthy");
        return Ok(());
    }
    if !client.is_authenticated().await? {
        client.authenticate().await?;
    }

    // 3. Transfer, printing each progress update
    let mut status = client.subscribe_status();
    let progress = tokio::spawn(async move {
        while status.changed().await.is_ok() {
            if let Some(s) = status.borrow_and_update().clone() {
                println!("[{:>3}%] {}", s.progress, s.step);
            }
        }
    });

    let request = TransferRequest {
        recipient: parse_identity(recipient)?,
        mint: USDC_DEVNET.mint,
        amount: Decimal::from_str(amount)?,
        decimals: USDC_DEVNET.decimals,
    };
    let signature = client.transfer(request).await?;

    println!("Transfer sent: {}", explorer_url(&signature, None));
    drop(client);
    progress.await?;

    Ok(())
}
