use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::Transaction;
use thiserror::Error;

/// SDK-specific error types for private payment operations
#[derive(Debug, Error)]
pub enum PaymentsSdkError {
    /// No valid, non-expired rollup authorization token for the owner
    #[error("Rollup not authenticated for {0}; authenticate first")]
    NotAuthenticated(Pubkey),

    /// A delegated record's live copy could not be read from the rollup
    #[error("Access denied reading delegated record {0} from the rollup")]
    AccessDenied(Pubkey),

    /// Program address derivation impossible for the given inputs
    #[error("Failed to derive program address: {0}")]
    PdaDerivationFailed(String),

    /// Malformed owner or asset identity
    #[error("Invalid identity: {0}")]
    InvalidIdentity(String),

    /// No connected signing capability
    #[error("Wallet not connected")]
    WalletUnavailable,

    /// A plan entry was rejected by its ledger or never confirmed.
    /// `pending_revoke` is the signed but unsent session revoke of the
    /// aborted plan, if it had one.
    #[error("Step `{step}` failed: {reason}")]
    SubmissionFailed {
        step: String,
        reason: String,
        pending_revoke: Option<Box<Transaction>>,
    },

    /// Cross-ledger commitment proof not observed within the retry budget
    #[error("Commitment for {0} not observed")]
    CommitmentUnconfirmed(Signature),

    /// Connection or RPC error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Invalid account data or deserialization error
    #[error("Invalid account data: {0}")]
    InvalidAccountData(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Local signing (ephemeral key or wallet) failed
    #[error("Signing error: {0}")]
    Signing(String),

    /// Token or history store failure
    #[error("Store error: {0}")]
    Store(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Borsh serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] std::io::Error),
}

impl PaymentsSdkError {
    pub fn submission(step: impl ToString, reason: impl ToString) -> Self {
        Self::SubmissionFailed {
            step: step.to_string(),
            reason: reason.to_string(),
            pending_revoke: None,
        }
    }
}

/// Result type alias for SDK operations
pub type Result<T> = std::result::Result<T, PaymentsSdkError>;
