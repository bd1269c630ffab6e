use solana_sdk::pubkey;
use solana_sdk::pubkey::Pubkey;

// Private payments program (devnet deployment)
pub const PAYMENTS_PROGRAM_ID: Pubkey = pubkey!("EnhkomtzKms55jXi3ijn9XsMKYpMT4BJjmbuDQmPo3YS");

// Ephemeral rollup infrastructure
pub const DELEGATION_PROGRAM_ID: Pubkey = pubkey!("DELeGGvXpWV2fqJUhqcF5ZSYMS4JTLjteaAMARRSaeSh");
pub const PERMISSION_PROGRAM_ID: Pubkey = pubkey!("ACLseoPoyC3cBqoUtkbjZ4aDrkurZW86v19pXz2XQnp1");
pub const MAGIC_PROGRAM_ID: Pubkey = pubkey!("Magic11111111111111111111111111111111111111");
pub const MAGIC_CONTEXT_ID: Pubkey = pubkey!("MagicContext1111111111111111111111111111111");

// Session keys program (session tokens scoped to a target program)
pub const SESSION_KEYS_PROGRAM_ID: Pubkey = pubkey!("KeyspM2ssCJbqUhQ4k7sveSiY4WjnYsrXkC8oDbwde5");

// SPL
pub const TOKEN_PROGRAM_ID: Pubkey = pubkey!("TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA");
pub const ASSOCIATED_TOKEN_PROGRAM_ID: Pubkey =
    pubkey!("ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL");

// Rollup validators, one per region
pub const TEE_VALIDATOR: Pubkey = pubkey!("FnE6VJT5QNZdedZPnCoLsARgBwoE6DeJNjBs2H1gySXA");
pub const US_VALIDATOR: Pubkey = pubkey!("MUS3hc9TCw4cGC12vHNoYcCGzJG1txjgQLZWVoeNHNd");
pub const EU_VALIDATOR: Pubkey = pubkey!("MEUGGrYPxKk17hCr7wpT6s8dtNokZj5U2L57vjYMS8e");
pub const ASIA_VALIDATOR: Pubkey = pubkey!("MAS1Dt9qreoRMQ14YQuhg8UTZMMzDdKhmkZMECCzk57");

pub const SOLANA_DEVNET_RPC: &str = "https://api.devnet.solana.com";

// PDA seeds
pub const DEPOSIT_SEED: &[u8] = b"deposit";
pub const VAULT_SEED: &[u8] = b"vault";
pub const SESSION_TOKEN_SEED: &[u8] = b"session_token";
pub const DELEGATE_BUFFER_SEED: &[u8] = b"buffer";
pub const DELEGATION_RECORD_SEED: &[u8] = b"delegation";
pub const DELEGATION_METADATA_SEED: &[u8] = b"delegation-metadata";
pub const PERMISSION_SEED: &[u8] = b"permission:";

/// Lifetime of a rollup authorization token, in milliseconds.
pub const AUTH_TOKEN_DURATION_MS: i64 = 24 * 60 * 60 * 1000;

/// Newest-first cap on the per-owner transaction history.
pub const MAX_TRANSACTION_HISTORY: usize = 100;

/// Markers the rollup writes into transaction logs once a commit to the
/// persistent ledger has been scheduled and then sent.
pub const SCHEDULED_COMMIT_LOG: &str = "ScheduledCommitSent signature:";
pub const COMMIT_SIGNATURE_LOG: &str = "ScheduledCommitSent signature[0]:";
