use crate::core::constants::*;
use crate::error::{PaymentsSdkError, Result};
use crate::types::DepositAccount;
use borsh::BorshDeserialize;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use std::str::FromStr;

//=============================================================================
// Identity parsing
//=============================================================================

/// Parse a base58 owner or mint identity.
pub fn parse_identity(raw: &str) -> Result<Pubkey> {
    Pubkey::from_str(raw.trim())
        .map_err(|e| PaymentsSdkError::InvalidIdentity(format!("{}: {}", raw, e)))
}

//=============================================================================
// PDA Derivation Helpers
//=============================================================================

fn find_pda(seeds: &[&[u8]], program_id: &Pubkey, what: &str) -> Result<(Pubkey, u8)> {
    Pubkey::try_find_program_address(seeds, program_id)
        .ok_or_else(|| PaymentsSdkError::PdaDerivationFailed(what.to_string()))
}

/// Balance record of (owner, mint) under the payments program
pub fn derive_deposit_pda(
    program_id: &Pubkey,
    owner: &Pubkey,
    mint: &Pubkey,
) -> Result<(Pubkey, u8)> {
    find_pda(
        &[DEPOSIT_SEED, owner.as_ref(), mint.as_ref()],
        program_id,
        "deposit",
    )
}

/// Pooled reserve of a mint under the payments program
pub fn derive_vault_pda(program_id: &Pubkey, mint: &Pubkey) -> Result<(Pubkey, u8)> {
    find_pda(&[VAULT_SEED, mint.as_ref()], program_id, "vault")
}

/// Session token of (target program, ephemeral signer, authority)
pub fn derive_session_token_pda(
    session_program: &Pubkey,
    target_program: &Pubkey,
    session_signer: &Pubkey,
    authority: &Pubkey,
) -> Result<Pubkey> {
    find_pda(
        &[
            SESSION_TOKEN_SEED,
            target_program.as_ref(),
            session_signer.as_ref(),
            authority.as_ref(),
        ],
        session_program,
        "session token",
    )
    .map(|(pda, _)| pda)
}

/// Buffer the delegation program copies a record into, owned by the record's program
pub fn derive_delegate_buffer_pda(delegated: &Pubkey, owner_program: &Pubkey) -> Result<Pubkey> {
    find_pda(
        &[DELEGATE_BUFFER_SEED, delegated.as_ref()],
        owner_program,
        "delegate buffer",
    )
    .map(|(pda, _)| pda)
}

pub fn derive_delegation_record_pda(
    delegation_program: &Pubkey,
    delegated: &Pubkey,
) -> Result<Pubkey> {
    find_pda(
        &[DELEGATION_RECORD_SEED, delegated.as_ref()],
        delegation_program,
        "delegation record",
    )
    .map(|(pda, _)| pda)
}

pub fn derive_delegation_metadata_pda(
    delegation_program: &Pubkey,
    delegated: &Pubkey,
) -> Result<Pubkey> {
    find_pda(
        &[DELEGATION_METADATA_SEED, delegated.as_ref()],
        delegation_program,
        "delegation metadata",
    )
    .map(|(pda, _)| pda)
}

/// Access-control entry gating who may read a record inside the rollup
pub fn derive_permission_pda(permission_program: &Pubkey, account: &Pubkey) -> Result<Pubkey> {
    find_pda(
        &[PERMISSION_SEED, account.as_ref()],
        permission_program,
        "permission",
    )
    .map(|(pda, _)| pda)
}

/// Associated token account; off-curve owners (PDAs) are allowed
pub fn associated_token_address(wallet: &Pubkey, mint: &Pubkey) -> Result<Pubkey> {
    find_pda(
        &[wallet.as_ref(), TOKEN_PROGRAM_ID.as_ref(), mint.as_ref()],
        &ASSOCIATED_TOKEN_PROGRAM_ID,
        "associated token account",
    )
    .map(|(pda, _)| pda)
}

//=============================================================================
// Anchor encoding
//=============================================================================

fn sighash(namespace: &str, name: &str) -> [u8; 8] {
    let digest = Sha256::digest(format!("{}:{}", namespace, name).as_bytes());
    let mut out = [0u8; 8];
    out.copy_from_slice(&digest[..8]);
    out
}

/// First 8 bytes of `sha256("global:<name>")`
pub fn instruction_discriminator(name: &str) -> [u8; 8] {
    sighash("global", name)
}

/// First 8 bytes of `sha256("account:<Name>")`
pub fn account_discriminator(name: &str) -> [u8; 8] {
    sighash("account", name)
}

/// Decode a balance record, checking its discriminator
pub fn decode_deposit(data: &[u8]) -> Result<DepositAccount> {
    if data.len() < 8 {
        return Err(PaymentsSdkError::InvalidAccountData(
            "Account data too small for discriminator".to_string(),
        ));
    }
    if data[..8] != account_discriminator("Deposit") {
        return Err(PaymentsSdkError::InvalidAccountData(
            "Not a deposit account".to_string(),
        ));
    }
    let mut body = &data[8..];
    DepositAccount::deserialize(&mut body).map_err(|e| {
        PaymentsSdkError::InvalidAccountData(format!("Failed to parse deposit: {}", e))
    })
}

//=============================================================================
// Amounts
//=============================================================================

/// Scale a UI amount to the token's fixed-point integer.
/// Rejects non-positive amounts, precision finer than one base unit, and
/// values that do not fit `u64`.
pub fn to_raw_amount(amount: Decimal, decimals: u8) -> Result<u64> {
    if amount <= Decimal::ZERO {
        return Err(PaymentsSdkError::InvalidAmount(format!(
            "{} is not positive",
            amount
        )));
    }
    let factor = 10u64
        .checked_pow(u32::from(decimals))
        .ok_or_else(|| PaymentsSdkError::InvalidAmount(format!("{} decimals", decimals)))?;
    let scaled = amount
        .checked_mul(Decimal::from(factor))
        .ok_or_else(|| PaymentsSdkError::InvalidAmount(format!("{} overflows", amount)))?;
    if !scaled.fract().is_zero() {
        return Err(PaymentsSdkError::InvalidAmount(format!(
            "{} has more than {} decimal places",
            amount, decimals
        )));
    }
    scaled
        .to_u64()
        .ok_or_else(|| PaymentsSdkError::InvalidAmount(format!("{} overflows", amount)))
}

pub fn to_ui_amount(raw: u64, decimals: u8) -> Decimal {
    Decimal::from_i128_with_scale(i128::from(raw), u32::from(decimals.min(28)))
}

//=============================================================================
// Commitment log parsing
//=============================================================================

/// Signature logged after `marker` by the first log line containing it
pub fn find_logged_signature(logs: &[String], marker: &str) -> Option<Signature> {
    logs.iter()
        .find(|line| line.contains(marker))
        .and_then(|line| line.split(marker).nth(1))
        .and_then(|rest| Signature::from_str(rest.trim()).ok())
}

//=============================================================================
// Display helpers
//=============================================================================

/// Solscan link for a signature; rollup transactions need the bearer token
/// to be resolvable by the explorer.
pub fn explorer_url(signature: &Signature, rollup: Option<(&str, &str)>) -> String {
    const BASE: &str = "https://solscan.io/tx";
    match rollup {
        Some((endpoint, token)) => format!(
            "{}/{}?cluster=custom&customUrl={}?token={}",
            BASE, signature, endpoint, token
        ),
        None => format!("{}/{}?cluster=devnet", BASE, signature),
    }
}

/// `abcd...wxyz` form used for history counterparties
pub fn short_address(key: &Pubkey) -> String {
    let full = key.to_string();
    if full.len() <= 8 {
        return full;
    }
    format!("{}...{}", &full[..4], &full[full.len() - 4..])
}
