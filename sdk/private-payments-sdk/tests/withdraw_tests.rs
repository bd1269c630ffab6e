use private_payments_sdk::core::constants::PAYMENTS_PROGRAM_ID;
use private_payments_sdk::store::history::{HistoryKind, HistoryStore};
use private_payments_sdk::{PaymentsSdkError, WalletSigner, WithdrawRequest};
use rust_decimal::Decimal;
use std::sync::Arc;

mod common;
use common::*;

fn request(units: i64) -> WithdrawRequest {
    WithdrawRequest {
        mint: USDC,
        amount: Decimal::from(units),
        decimals: 6,
    }
}

fn delegated_owner(network: &Arc<Network>, amount: u64) -> Arc<CountingWallet> {
    let wallet = CountingWallet::new();
    network.seed_deposit(&wallet.pubkey(), &USDC, amount, true);
    wallet
}

#[tokio::test]
async fn delegated_withdrawal_returns_record_and_pays_out() {
    let network = Network::new();
    let wallet = delegated_owner(&network, 20_000_000);
    let owner = wallet.pubkey();

    let client = authenticated_client(&network, wallet.clone());
    let signature = client.withdraw(request(5)).await.unwrap();

    assert_eq!(
        network.submitted_names(),
        vec![
            vec!["create_session"],
            vec!["undelegate"],
            vec!["modify_balance"],
            vec!["revoke_session"],
        ]
    );
    let submitted = network.submitted();
    assert_eq!(submitted[1].ledger, Ledger::Rollup);
    assert_ne!(submitted[1].fee_payer, owner);

    assert_eq!(
        network.deposit(&owner, &USDC),
        (Some(15_000_000), None, Some(PAYMENTS_PROGRAM_ID))
    );
    assert_eq!(network.wallet_tokens(&owner, &USDC), 5_000_000);
    assert_eq!(network.vault_tokens(&USDC), 15_000_000);
    assert_eq!(wallet.prompts(), 1);
    assert_eq!(network.live_sessions(), 0);

    assert_eq!(client.status().unwrap().step, "Withdrawal complete!");
    let history = client.history().list(&owner).await.unwrap();
    assert_eq!(history[0].kind, HistoryKind::Withdraw);
    assert_eq!(history[0].signature, signature.to_string());
}

#[tokio::test]
async fn missing_commitment_proof_falls_back_to_delays() {
    let network = Network::new();
    let wallet = delegated_owner(&network, 20_000_000);
    network.without_commit_logs();

    let client = authenticated_client(&network, wallet.clone());
    client.withdraw(request(5)).await.unwrap();

    assert_eq!(network.deposit(&wallet.pubkey(), &USDC).0, Some(15_000_000));
}

#[tokio::test]
async fn resident_withdrawal_is_one_owner_signed_debit() {
    let network = Network::new();
    let wallet = CountingWallet::new();
    let owner = wallet.pubkey();
    network.seed_deposit(&owner, &USDC, 8_000_000, false);

    let client = authenticated_client(&network, wallet.clone());
    client.withdraw(request(3)).await.unwrap();

    assert_eq!(network.submitted_names(), vec![vec!["modify_balance"]]);
    assert_eq!(network.submitted()[0].fee_payer, owner);
    assert_eq!(network.deposit(&owner, &USDC).0, Some(5_000_000));
    assert_eq!(network.wallet_tokens(&owner, &USDC), 3_000_000);
    assert_eq!(network.live_sessions(), 0);
}

#[tokio::test]
async fn withdrawal_without_record_is_rejected() {
    let network = Network::new();
    let wallet = CountingWallet::new();
    let client = authenticated_client(&network, wallet.clone());

    assert!(matches!(
        client.withdraw(request(1)).await,
        Err(PaymentsSdkError::InvalidRequest(_))
    ));
    assert!(network.submitted().is_empty());
    assert!(client.status().is_none());
}

#[tokio::test]
async fn overdraft_fails_after_submission() {
    let network = Network::new();
    let wallet = CountingWallet::new();
    let owner = wallet.pubkey();
    network.seed_deposit(&owner, &USDC, 2_000_000, false);

    let client = authenticated_client(&network, wallet.clone());
    let err = client.withdraw(request(3)).await.unwrap_err();

    // Preflight is skipped, so the failure surfaces from the status poll
    match err {
        PaymentsSdkError::SubmissionFailed {
            step,
            reason,
            pending_revoke,
        } => {
            assert_eq!(step, "relocateOut");
            assert_eq!(reason, "insufficient deposit");
            // Resident withdrawals never open a session
            assert!(pending_revoke.is_none());
        },
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(network.deposit(&owner, &USDC).0, Some(2_000_000));
    assert!(network.submitted().is_empty());
    assert!(client.status().is_none());
}

#[tokio::test]
async fn withdrawal_requires_rollup_authorization() {
    let network = Network::new();
    let wallet = CountingWallet::new();
    network.seed_deposit(&wallet.pubkey(), &USDC, 8_000_000, false);
    let client = client_with_tokens(&network, wallet, Default::default());

    assert!(matches!(
        client.withdraw(request(1)).await,
        Err(PaymentsSdkError::NotAuthenticated(_))
    ));
}
