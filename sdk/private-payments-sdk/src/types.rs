use borsh::{BorshDeserialize, BorshSerialize};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

/// On-chain balance record: one owner's custodied amount of one token.
/// Layout follows the 8-byte account discriminator.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct DepositAccount {
    pub user: Pubkey,
    pub token_mint: Pubkey,
    /// Fixed-point, scaled by the token's decimals
    pub amount: u64,
}

/// Arguments of `modify_balance`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct ModifyDepositArgs {
    pub amount: u64,
    pub increase: bool,
}

/// Which authority currently controls a balance record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authority {
    /// Owned by the payments program on the persistent ledger
    Resident,
    /// Owned by the delegation program; the rollup holds the live copy
    Delegated,
}

/// Result of reading one balance record across both ledgers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceView {
    pub address: Pubkey,
    /// Authoritative current amount: the rollup copy when delegated,
    /// the persistent copy otherwise, zero when no record exists
    pub amount: u64,
    /// `None` when no record exists yet
    pub authority: Option<Authority>,
    pub exists_on_persistent: bool,
    pub exists_on_rollup: bool,
}

impl BalanceView {
    pub fn absent(address: Pubkey) -> Self {
        Self {
            address,
            amount: 0,
            authority: None,
            exists_on_persistent: false,
            exists_on_rollup: false,
        }
    }

    pub fn exists(&self) -> bool {
        self.exists_on_persistent
    }

    pub fn is_delegated(&self) -> bool {
        self.authority == Some(Authority::Delegated)
    }

    pub fn ui_amount(&self, decimals: u8) -> Decimal {
        crate::utils::to_ui_amount(self.amount, decimals)
    }
}

/// Display-oriented summary of the connected owner's deposit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositInfo {
    pub amount: Decimal,
    pub is_delegated: bool,
    pub raw_amount: u64,
}

/// Progress of the running transfer or withdrawal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferStatus {
    pub step: String,
    pub progress: u8,
}

/// Ledger view of a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureStatus {
    Pending,
    Confirmed,
    Failed(String),
}

/// Rollup bearer token with its expiry (unix milliseconds).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthToken {
    pub token: String,
    pub expires_at: i64,
}

impl AuthToken {
    pub fn is_valid_at(&self, now_ms: i64) -> bool {
        self.expires_at > now_ms
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(chrono::Utc::now().timestamp_millis())
    }
}
