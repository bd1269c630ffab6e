//! Raw instructions for the payments and session-keys programs.
//!
//! Account lists and argument encodings follow the deployed Anchor
//! interfaces exactly. Optional accounts that are absent are passed as the
//! called program's own id, which Anchor reads as `None`.

use crate::core::constants::{
    ASSOCIATED_TOKEN_PROGRAM_ID, MAGIC_CONTEXT_ID, MAGIC_PROGRAM_ID, TOKEN_PROGRAM_ID,
};
use crate::error::Result;
use crate::types::ModifyDepositArgs;
use crate::utils::instruction_discriminator;
use borsh::BorshSerialize;
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::system_program;

fn encode(name: &str, args: &impl BorshSerialize) -> Result<Vec<u8>> {
    let mut data = instruction_discriminator(name).to_vec();
    args.serialize(&mut data)?;
    Ok(data)
}

fn optional(account: Option<Pubkey>, program_id: &Pubkey) -> AccountMeta {
    AccountMeta::new_readonly(account.unwrap_or(*program_id), false)
}

pub fn initialize_deposit(
    program_id: &Pubkey,
    payer: &Pubkey,
    user: &Pubkey,
    deposit: &Pubkey,
    token_mint: &Pubkey,
) -> Result<Instruction> {
    let accounts = vec![
        AccountMeta::new(*payer, true),
        AccountMeta::new_readonly(*user, false),
        AccountMeta::new(*deposit, false),
        AccountMeta::new_readonly(*token_mint, false),
        AccountMeta::new_readonly(TOKEN_PROGRAM_ID, false),
        AccountMeta::new_readonly(system_program::id(), false),
    ];

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data: encode("initialize_deposit", &())?,
    })
}

pub fn create_permission(
    program_id: &Pubkey,
    payer: &Pubkey,
    user: &Pubkey,
    deposit: &Pubkey,
    permission: &Pubkey,
    permission_program: &Pubkey,
) -> Result<Instruction> {
    let accounts = vec![
        AccountMeta::new(*payer, true),
        AccountMeta::new_readonly(*user, false),
        AccountMeta::new_readonly(*deposit, false),
        AccountMeta::new(*permission, false),
        AccountMeta::new_readonly(*permission_program, false),
        AccountMeta::new_readonly(system_program::id(), false),
    ];

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data: encode("create_permission", &())?,
    })
}

/// Move tokens between the owner's token account and the vault, adjusting
/// the deposit by the same amount.
pub fn modify_balance(
    program_id: &Pubkey,
    payer: &Pubkey,
    user: &Pubkey,
    vault: &Pubkey,
    deposit: &Pubkey,
    user_token_account: &Pubkey,
    vault_token_account: &Pubkey,
    token_mint: &Pubkey,
    args: ModifyDepositArgs,
) -> Result<Instruction> {
    let accounts = vec![
        AccountMeta::new(*payer, true),
        AccountMeta::new_readonly(*user, true),
        AccountMeta::new(*vault, false),
        AccountMeta::new(*deposit, false),
        AccountMeta::new(*user_token_account, false),
        AccountMeta::new(*vault_token_account, false),
        AccountMeta::new_readonly(*token_mint, false),
        AccountMeta::new_readonly(TOKEN_PROGRAM_ID, false),
        AccountMeta::new_readonly(ASSOCIATED_TOKEN_PROGRAM_ID, false),
        AccountMeta::new_readonly(system_program::id(), false),
    ];

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data: encode("modify_balance", &args)?,
    })
}

/// Hand the deposit over to the delegation program, pinned to `validator`.
pub fn delegate(
    program_id: &Pubkey,
    payer: &Pubkey,
    validator: Option<Pubkey>,
    buffer: &Pubkey,
    delegation_record: &Pubkey,
    delegation_metadata: &Pubkey,
    deposit: &Pubkey,
    delegation_program: &Pubkey,
    user: &Pubkey,
    token_mint: &Pubkey,
) -> Result<Instruction> {
    let accounts = vec![
        AccountMeta::new(*payer, true),
        optional(validator, program_id),
        AccountMeta::new(*buffer, false),
        AccountMeta::new(*delegation_record, false),
        AccountMeta::new(*delegation_metadata, false),
        AccountMeta::new(*deposit, false),
        AccountMeta::new_readonly(*program_id, false),
        AccountMeta::new_readonly(*delegation_program, false),
        AccountMeta::new_readonly(system_program::id(), false),
    ];

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data: encode("delegate", &(*user, *token_mint))?,
    })
}

/// Commit and undelegate the deposit. Executes inside the rollup.
pub fn undelegate(
    program_id: &Pubkey,
    user: &Pubkey,
    payer: &Pubkey,
    session_token: Option<Pubkey>,
    deposit: &Pubkey,
) -> Result<Instruction> {
    let accounts = vec![
        AccountMeta::new_readonly(*user, false),
        AccountMeta::new(*payer, true),
        optional(session_token, program_id),
        AccountMeta::new(*deposit, false),
        AccountMeta::new_readonly(MAGIC_PROGRAM_ID, false),
        AccountMeta::new(MAGIC_CONTEXT_ID, false),
    ];

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data: encode("undelegate", &())?,
    })
}

pub fn transfer_deposit(
    program_id: &Pubkey,
    user: &Pubkey,
    payer: &Pubkey,
    session_token: Option<Pubkey>,
    source_deposit: &Pubkey,
    destination_deposit: &Pubkey,
    token_mint: &Pubkey,
    amount: u64,
) -> Result<Instruction> {
    let accounts = vec![
        AccountMeta::new_readonly(*user, false),
        AccountMeta::new(*payer, true),
        optional(session_token, program_id),
        AccountMeta::new(*source_deposit, false),
        AccountMeta::new(*destination_deposit, false),
        AccountMeta::new_readonly(*token_mint, false),
    ];

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data: encode("transfer_deposit", &amount)?,
    })
}

//=============================================================================
// Session keys program
//=============================================================================

/// `create_session(top_up, valid_until, lamports)`. Both the ephemeral
/// signer and the authority sign.
pub fn create_session(
    session_program: &Pubkey,
    session_token: &Pubkey,
    session_signer: &Pubkey,
    authority: &Pubkey,
    target_program: &Pubkey,
    valid_until: Option<i64>,
) -> Result<Instruction> {
    let accounts = vec![
        AccountMeta::new(*session_token, false),
        AccountMeta::new(*session_signer, true),
        AccountMeta::new(*authority, true),
        AccountMeta::new_readonly(*target_program, false),
        AccountMeta::new_readonly(system_program::id(), false),
    ];
    let args: (Option<bool>, Option<i64>, Option<u64>) = (Some(true), valid_until, None);

    Ok(Instruction {
        program_id: *session_program,
        accounts,
        data: encode("create_session", &args)?,
    })
}

pub fn revoke_session(
    session_program: &Pubkey,
    session_token: &Pubkey,
    authority: &Pubkey,
) -> Result<Instruction> {
    let accounts = vec![
        AccountMeta::new(*session_token, false),
        AccountMeta::new(*authority, false),
        AccountMeta::new_readonly(system_program::id(), false),
    ];

    Ok(Instruction {
        program_id: *session_program,
        accounts,
        data: encode("revoke_session", &())?,
    })
}
