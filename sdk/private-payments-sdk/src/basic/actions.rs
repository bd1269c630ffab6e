use crate::basic::relocation::RelocationEngine;
use crate::core::config::SdkConfig;
use crate::core::connection::SolConnection;
use crate::error::{PaymentsSdkError, Result};
use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::transaction::Transaction;

fn required(value: Option<Pubkey>, what: &str) -> Result<Pubkey> {
    value.ok_or_else(|| PaymentsSdkError::InvalidRequest(format!("{} is required", what)))
}

fn positive(amount: u64) -> Result<u64> {
    if amount == 0 {
        return Err(PaymentsSdkError::InvalidAmount("amount must be positive".to_string()));
    }
    Ok(amount)
}

async fn unsigned_transaction(
    instructions: Vec<Instruction>,
    payer: &Pubkey,
    connection: &dyn SolConnection,
) -> Result<Transaction> {
    let recent_blockhash = connection
        .get_latest_blockhash()
        .await
        .map_err(|e| PaymentsSdkError::Connection(e.to_string()))?;
    let mut tx = Transaction::new_with_payer(&instructions, Some(payer));
    tx.message.recent_blockhash = recent_blockhash;
    Ok(tx)
}

fn default_engine() -> RelocationEngine {
    RelocationEngine::from_config(&SdkConfig::default())
}

/// Create a balance record and its permission entry.
pub struct InitializeDepositBuilder {
    payer: Option<Pubkey>,
    owner: Option<Pubkey>,
    mint: Option<Pubkey>,
    engine: RelocationEngine,
}

impl InitializeDepositBuilder {
    pub fn new() -> Self {
        Self {
            payer: None,
            owner: None,
            mint: None,
            engine: default_engine(),
        }
    }

    pub fn with_payer(mut self, payer: Pubkey) -> Self {
        self.payer = Some(payer);
        self
    }

    pub fn with_owner(mut self, owner: Pubkey) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn with_mint(mut self, mint: Pubkey) -> Self {
        self.mint = Some(mint);
        self
    }

    pub fn with_engine(mut self, engine: RelocationEngine) -> Self {
        self.engine = engine;
        self
    }

    pub fn build_instructions(&self) -> Result<Vec<Instruction>> {
        let owner = required(self.owner, "owner")?;
        let payer = self.payer.unwrap_or(owner);
        self.engine
            .build_initialize(&payer, &owner, &required(self.mint, "mint")?)
    }

    pub async fn build_transaction(&self, connection: &dyn SolConnection) -> Result<Transaction> {
        let owner = required(self.owner, "owner")?;
        let payer = self.payer.unwrap_or(owner);
        unsigned_transaction(self.build_instructions()?, &payer, connection).await
    }
}

/// Move tokens from the owner's token account into custody, creating the
/// record first when asked to.
pub struct DepositBuilder {
    owner: Option<Pubkey>,
    mint: Option<Pubkey>,
    amount: u64,
    initialize: bool,
    engine: RelocationEngine,
}

impl DepositBuilder {
    pub fn new() -> Self {
        Self {
            owner: None,
            mint: None,
            amount: 0,
            initialize: false,
            engine: default_engine(),
        }
    }

    pub fn with_owner(mut self, owner: Pubkey) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn with_mint(mut self, mint: Pubkey) -> Self {
        self.mint = Some(mint);
        self
    }

    pub fn with_amount(mut self, amount: u64) -> Self {
        self.amount = amount;
        self
    }

    pub fn with_initialize(mut self, initialize: bool) -> Self {
        self.initialize = initialize;
        self
    }

    pub fn with_engine(mut self, engine: RelocationEngine) -> Self {
        self.engine = engine;
        self
    }

    pub fn build_instructions(&self) -> Result<Vec<Instruction>> {
        let owner = required(self.owner, "owner")?;
        let mint = required(self.mint, "mint")?;
        let amount = positive(self.amount)?;

        let mut instructions = Vec::new();
        if self.initialize {
            instructions.extend(self.engine.build_initialize(&owner, &owner, &mint)?);
        }
        instructions.push(self.engine.build_relocate(&owner, &mint, amount, true)?);
        Ok(instructions)
    }

    pub async fn build_transaction(&self, connection: &dyn SolConnection) -> Result<Transaction> {
        let owner = required(self.owner, "owner")?;
        unsigned_transaction(self.build_instructions()?, &owner, connection).await
    }
}

/// Move tokens out of custody from a resident record.
pub struct WithdrawBuilder {
    owner: Option<Pubkey>,
    mint: Option<Pubkey>,
    amount: u64,
    engine: RelocationEngine,
}

impl WithdrawBuilder {
    pub fn new() -> Self {
        Self {
            owner: None,
            mint: None,
            amount: 0,
            engine: default_engine(),
        }
    }

    pub fn with_owner(mut self, owner: Pubkey) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn with_mint(mut self, mint: Pubkey) -> Self {
        self.mint = Some(mint);
        self
    }

    pub fn with_amount(mut self, amount: u64) -> Self {
        self.amount = amount;
        self
    }

    pub fn with_engine(mut self, engine: RelocationEngine) -> Self {
        self.engine = engine;
        self
    }

    pub fn build_instructions(&self) -> Result<Vec<Instruction>> {
        let owner = required(self.owner, "owner")?;
        let mint = required(self.mint, "mint")?;
        Ok(vec![self.engine.build_relocate(
            &owner,
            &mint,
            positive(self.amount)?,
            false,
        )?])
    }

    pub async fn build_transaction(&self, connection: &dyn SolConnection) -> Result<Transaction> {
        let owner = required(self.owner, "owner")?;
        unsigned_transaction(self.build_instructions()?, &owner, connection).await
    }
}

pub struct DelegateBuilder {
    payer: Option<Pubkey>,
    owner: Option<Pubkey>,
    mint: Option<Pubkey>,
    engine: RelocationEngine,
}

impl DelegateBuilder {
    pub fn new() -> Self {
        Self {
            payer: None,
            owner: None,
            mint: None,
            engine: default_engine(),
        }
    }

    pub fn with_payer(mut self, payer: Pubkey) -> Self {
        self.payer = Some(payer);
        self
    }

    pub fn with_owner(mut self, owner: Pubkey) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn with_mint(mut self, mint: Pubkey) -> Self {
        self.mint = Some(mint);
        self
    }

    pub fn with_engine(mut self, engine: RelocationEngine) -> Self {
        self.engine = engine;
        self
    }

    pub fn build_instructions(&self) -> Result<Vec<Instruction>> {
        let owner = required(self.owner, "owner")?;
        let payer = self.payer.unwrap_or(owner);
        Ok(vec![self.engine.build_delegate(
            &payer,
            &owner,
            &required(self.mint, "mint")?,
        )?])
    }

    pub async fn build_transaction(&self, connection: &dyn SolConnection) -> Result<Transaction> {
        let owner = required(self.owner, "owner")?;
        let payer = self.payer.unwrap_or(owner);
        unsigned_transaction(self.build_instructions()?, &payer, connection).await
    }
}

/// Owner-paid undelegation, built against the rollup connection.
pub struct UndelegateBuilder {
    owner: Option<Pubkey>,
    mint: Option<Pubkey>,
    engine: RelocationEngine,
}

impl UndelegateBuilder {
    pub fn new() -> Self {
        Self {
            owner: None,
            mint: None,
            engine: default_engine(),
        }
    }

    pub fn with_owner(mut self, owner: Pubkey) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn with_mint(mut self, mint: Pubkey) -> Self {
        self.mint = Some(mint);
        self
    }

    pub fn with_engine(mut self, engine: RelocationEngine) -> Self {
        self.engine = engine;
        self
    }

    pub fn build_instructions(&self) -> Result<Vec<Instruction>> {
        let owner = required(self.owner, "owner")?;
        Ok(vec![self
            .engine
            .build_undelegate_as_owner(&owner, &required(self.mint, "mint")?)?])
    }

    pub async fn build_transaction(&self, rollup: &dyn SolConnection) -> Result<Transaction> {
        let owner = required(self.owner, "owner")?;
        unsigned_transaction(self.build_instructions()?, &owner, rollup).await
    }
}

/// Owner-signed `transfer_deposit` without a session. Valid on whichever
/// ledger currently controls both records.
pub struct DirectTransferBuilder {
    owner: Option<Pubkey>,
    recipient: Option<Pubkey>,
    mint: Option<Pubkey>,
    amount: u64,
    engine: RelocationEngine,
}

impl DirectTransferBuilder {
    pub fn new() -> Self {
        Self {
            owner: None,
            recipient: None,
            mint: None,
            amount: 0,
            engine: default_engine(),
        }
    }

    pub fn with_owner(mut self, owner: Pubkey) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn with_recipient(mut self, recipient: Pubkey) -> Self {
        self.recipient = Some(recipient);
        self
    }

    pub fn with_mint(mut self, mint: Pubkey) -> Self {
        self.mint = Some(mint);
        self
    }

    pub fn with_amount(mut self, amount: u64) -> Self {
        self.amount = amount;
        self
    }

    pub fn with_engine(mut self, engine: RelocationEngine) -> Self {
        self.engine = engine;
        self
    }

    pub fn build_instructions(&self) -> Result<Vec<Instruction>> {
        let owner = required(self.owner, "owner")?;
        let recipient = required(self.recipient, "recipient")?;
        if owner == recipient {
            return Err(PaymentsSdkError::InvalidRequest(
                "cannot transfer to self".to_string(),
            ));
        }
        Ok(vec![self.engine.build_move(
            &owner,
            &recipient,
            &required(self.mint, "mint")?,
            positive(self.amount)?,
            None,
        )?])
    }

    pub async fn build_transaction(&self, connection: &dyn SolConnection) -> Result<Transaction> {
        let owner = required(self.owner, "owner")?;
        unsigned_transaction(self.build_instructions()?, &owner, connection).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::instruction_discriminator;

    #[test]
    fn deposit_can_initialize_first() {
        let owner = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let ixs = DepositBuilder::new()
            .with_owner(owner)
            .with_mint(mint)
            .with_amount(1_000)
            .with_initialize(true)
            .build_instructions()
            .unwrap();

        assert_eq!(ixs.len(), 3);
        assert_eq!(ixs[2].data[..8], instruction_discriminator("modify_balance"));
    }

    #[test]
    fn missing_fields_are_reported() {
        let err = WithdrawBuilder::new()
            .with_mint(Pubkey::new_unique())
            .with_amount(5)
            .build_instructions()
            .unwrap_err();
        assert!(matches!(err, PaymentsSdkError::InvalidRequest(_)));

        let err = DepositBuilder::new()
            .with_owner(Pubkey::new_unique())
            .with_mint(Pubkey::new_unique())
            .build_instructions()
            .unwrap_err();
        assert!(matches!(err, PaymentsSdkError::InvalidAmount(_)));
    }

    #[test]
    fn direct_transfer_rejects_self() {
        let owner = Pubkey::new_unique();
        let err = DirectTransferBuilder::new()
            .with_owner(owner)
            .with_recipient(owner)
            .with_mint(Pubkey::new_unique())
            .with_amount(1)
            .build_instructions()
            .unwrap_err();
        assert!(matches!(err, PaymentsSdkError::InvalidRequest(_)));
    }
}
