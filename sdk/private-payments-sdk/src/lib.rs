pub mod advanced;
pub mod basic;
pub mod core;
pub mod error;
pub mod store;
pub mod types;
pub mod utils;

pub use crate::basic::client::{PrivatePayments, PrivatePaymentsBuilder};
pub use crate::basic::transfer::TransferRequest;
pub use crate::basic::withdraw::WithdrawRequest;
pub use crate::core::config::{SdkConfig, TimingConfig, TokenInfo};
pub use crate::core::connection::{check_rollup_health, SolConnection};
pub use crate::core::signer::{KeypairSigner, WalletSigner};
pub use crate::error::{PaymentsSdkError, Result};
pub use crate::types::{AuthToken, Authority, BalanceView, DepositInfo, TransferStatus};
pub use crate::utils::{
    derive_deposit_pda, derive_vault_pda, explorer_url, parse_identity, to_raw_amount,
    to_ui_amount,
};
