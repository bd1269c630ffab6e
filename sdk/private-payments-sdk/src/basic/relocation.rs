use crate::advanced::instructions;
use crate::basic::session::Session;
use crate::core::config::SdkConfig;
use crate::error::Result;
use crate::types::ModifyDepositArgs;
use crate::utils::*;
use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;

/// Bookkeeping accounts the delegation program needs for one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelegationAccounts {
    pub buffer: Pubkey,
    pub record: Pubkey,
    pub metadata: Pubkey,
}

/// Builds the calls that create balance records, move tokens in and out of
/// the vault, and hand records between the persistent ledger and the rollup.
#[derive(Debug, Clone)]
pub struct RelocationEngine {
    program_id: Pubkey,
    delegation_program: Pubkey,
    permission_program: Pubkey,
    validator: Option<Pubkey>,
}

impl RelocationEngine {
    pub fn new(
        program_id: Pubkey,
        delegation_program: Pubkey,
        permission_program: Pubkey,
        validator: Option<Pubkey>,
    ) -> Self {
        Self {
            program_id,
            delegation_program,
            permission_program,
            validator,
        }
    }

    pub fn from_config(config: &SdkConfig) -> Self {
        Self::new(
            config.payments_program,
            config.delegation_program,
            config.permission_program,
            Some(config.validator()),
        )
    }

    pub fn program_id(&self) -> Pubkey {
        self.program_id
    }

    pub fn deposit_address(&self, owner: &Pubkey, mint: &Pubkey) -> Result<Pubkey> {
        Ok(derive_deposit_pda(&self.program_id, owner, mint)?.0)
    }

    pub fn delegation_accounts(&self, deposit: &Pubkey) -> Result<DelegationAccounts> {
        Ok(DelegationAccounts {
            buffer: derive_delegate_buffer_pda(deposit, &self.program_id)?,
            record: derive_delegation_record_pda(&self.delegation_program, deposit)?,
            metadata: derive_delegation_metadata_pda(&self.delegation_program, deposit)?,
        })
    }

    /// Create the record of (owner, mint) and its rollup access entry.
    pub fn build_initialize(
        &self,
        payer: &Pubkey,
        owner: &Pubkey,
        mint: &Pubkey,
    ) -> Result<Vec<Instruction>> {
        let deposit = self.deposit_address(owner, mint)?;
        let permission = derive_permission_pda(&self.permission_program, &deposit)?;
        Ok(vec![
            instructions::initialize_deposit(&self.program_id, payer, owner, &deposit, mint)?,
            instructions::create_permission(
                &self.program_id,
                payer,
                owner,
                &deposit,
                &permission,
                &self.permission_program,
            )?,
        ])
    }

    /// Hand the record to the delegation program, pinned to the validator.
    pub fn build_delegate(
        &self,
        payer: &Pubkey,
        owner: &Pubkey,
        mint: &Pubkey,
    ) -> Result<Instruction> {
        let deposit = self.deposit_address(owner, mint)?;
        let accounts = self.delegation_accounts(&deposit)?;
        instructions::delegate(
            &self.program_id,
            payer,
            self.validator,
            &accounts.buffer,
            &accounts.record,
            &accounts.metadata,
            &deposit,
            &self.delegation_program,
            owner,
            mint,
        )
    }

    /// Undelegate inside the rollup, paid for and authorized by the session.
    pub fn build_undelegate(&self, mint: &Pubkey, session: &Session) -> Result<Instruction> {
        let deposit = self.deposit_address(&session.owner, mint)?;
        instructions::undelegate(
            &self.program_id,
            &session.owner,
            &session.signer(),
            Some(session.address),
            &deposit,
        )
    }

    /// Undelegate inside the rollup with the owner as payer, no session.
    pub fn build_undelegate_as_owner(&self, owner: &Pubkey, mint: &Pubkey) -> Result<Instruction> {
        let deposit = self.deposit_address(owner, mint)?;
        instructions::undelegate(&self.program_id, owner, owner, None, &deposit)
    }

    /// Move `amount` between the owner's token account and the vault.
    /// `increase` moves it into custody.
    pub fn build_relocate(
        &self,
        owner: &Pubkey,
        mint: &Pubkey,
        amount: u64,
        increase: bool,
    ) -> Result<Instruction> {
        let deposit = self.deposit_address(owner, mint)?;
        let (vault, _) = derive_vault_pda(&self.program_id, mint)?;
        instructions::modify_balance(
            &self.program_id,
            owner,
            owner,
            &vault,
            &deposit,
            &associated_token_address(owner, mint)?,
            &associated_token_address(&vault, mint)?,
            mint,
            ModifyDepositArgs { amount, increase },
        )
    }

    /// Move `amount` from the owner's record to the recipient's. With a
    /// session the session key pays; otherwise the owner does.
    pub fn build_move(
        &self,
        owner: &Pubkey,
        recipient: &Pubkey,
        mint: &Pubkey,
        amount: u64,
        session: Option<&Session>,
    ) -> Result<Instruction> {
        let source = self.deposit_address(owner, mint)?;
        let destination = self.deposit_address(recipient, mint)?;
        let (payer, session_token) = match session {
            Some(session) => (session.signer(), Some(session.address)),
            None => (*owner, None),
        };
        instructions::transfer_deposit(
            &self.program_id,
            owner,
            &payer,
            session_token,
            &source,
            &destination,
            mint,
            amount,
        )
    }
}
