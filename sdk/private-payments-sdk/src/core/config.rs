//! Client configuration.
//!
//! Every endpoint, program id and retry budget the orchestrators use lives
//! in [`SdkConfig`]. The defaults target devnet and the TEE rollup region;
//! a JSON document with any subset of the fields overrides them.

use crate::core::constants::*;
use crate::error::{PaymentsSdkError, Result};
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::path::Path;
use std::time::Duration;

/// Rollup deployment regions. Each region pairs an RPC endpoint with the
/// validator identity delegated records are pinned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RollupRegion {
    #[default]
    Tee,
    Us,
    Eu,
    Asia,
}

impl RollupRegion {
    pub fn rpc_endpoint(self) -> &'static str {
        match self {
            RollupRegion::Tee => "https://tee.magicblock.app",
            RollupRegion::Us => "https://devnet-us.magicblock.app",
            RollupRegion::Eu => "https://devnet-eu.magicblock.app",
            RollupRegion::Asia => "https://devnet-as.magicblock.app",
        }
    }

    pub fn ws_endpoint(self) -> &'static str {
        match self {
            RollupRegion::Tee => "wss://tee.magicblock.app",
            RollupRegion::Us => "wss://devnet-us.magicblock.app",
            RollupRegion::Eu => "wss://devnet-eu.magicblock.app",
            RollupRegion::Asia => "wss://devnet-as.magicblock.app",
        }
    }

    pub fn validator(self) -> Pubkey {
        match self {
            RollupRegion::Tee => TEE_VALIDATOR,
            RollupRegion::Us => US_VALIDATOR,
            RollupRegion::Eu => EU_VALIDATOR,
            RollupRegion::Asia => ASIA_VALIDATOR,
        }
    }
}

/// Retry counts and delays around confirmation and cross-ledger commitment.
///
/// None of these are caller-cancelable; they bound how long a plan entry may
/// wait before the run either proceeds or fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Signature status polls before a submitted entry counts as timed out.
    pub confirm_attempts: u32,
    /// Tighter poll budget for rollup undelegations.
    pub undelegate_confirm_attempts: u32,
    pub confirm_interval_ms: u64,
    /// Attempts to observe the commitment proof of an undelegation.
    pub commitment_attempts: u32,
    pub commitment_interval_ms: u64,
    /// Pause after a transfer-side undelegation, proof or not.
    pub post_undelegate_delay_ms: u64,
    /// Extra pause when the persistent ledger still shows the record delegated.
    pub still_delegated_delay_ms: u64,
    /// Pause after a withdrawal-side undelegation before settling.
    pub propagation_delay_ms: u64,
    /// Pause after creating the recipient's record.
    pub recipient_settle_delay_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            confirm_attempts: 60,
            undelegate_confirm_attempts: 10,
            confirm_interval_ms: 1_000,
            commitment_attempts: 5,
            commitment_interval_ms: 2_000,
            post_undelegate_delay_ms: 1_000,
            still_delegated_delay_ms: 5_000,
            propagation_delay_ms: 3_000,
            recipient_settle_delay_ms: 3_000,
        }
    }
}

impl TimingConfig {
    /// No waiting at all. Intended for simulated ledgers.
    pub fn immediate() -> Self {
        Self {
            confirm_attempts: 3,
            undelegate_confirm_attempts: 3,
            confirm_interval_ms: 0,
            commitment_attempts: 2,
            commitment_interval_ms: 0,
            post_undelegate_delay_ms: 0,
            still_delegated_delay_ms: 0,
            propagation_delay_ms: 0,
            recipient_settle_delay_ms: 0,
        }
    }

    pub fn confirm_interval(&self) -> Duration {
        Duration::from_millis(self.confirm_interval_ms)
    }

    pub fn commitment_interval(&self) -> Duration {
        Duration::from_millis(self.commitment_interval_ms)
    }

    pub fn post_undelegate_delay(&self) -> Duration {
        Duration::from_millis(self.post_undelegate_delay_ms)
    }

    pub fn still_delegated_delay(&self) -> Duration {
        Duration::from_millis(self.still_delegated_delay_ms)
    }

    pub fn propagation_delay(&self) -> Duration {
        Duration::from_millis(self.propagation_delay_ms)
    }

    pub fn recipient_settle_delay(&self) -> Duration {
        Duration::from_millis(self.recipient_settle_delay_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SdkConfig {
    /// Persistent ledger RPC endpoint.
    pub rpc_url: String,
    pub region: RollupRegion,
    /// Overrides the region's RPC endpoint when set.
    pub rollup_endpoint: Option<String>,
    #[serde(with = "pubkey_string")]
    pub payments_program: Pubkey,
    #[serde(with = "pubkey_string")]
    pub delegation_program: Pubkey,
    #[serde(with = "pubkey_string")]
    pub permission_program: Pubkey,
    #[serde(with = "pubkey_string")]
    pub session_program: Pubkey,
    /// Session validity requested at creation. `None` leaves it to the
    /// session program's default window.
    pub session_validity_secs: Option<i64>,
    /// Fire a best-effort access request at the rollup when a delegated
    /// record is read.
    pub permission_ping: bool,
    pub timing: TimingConfig,
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self {
            rpc_url: SOLANA_DEVNET_RPC.to_string(),
            region: RollupRegion::default(),
            rollup_endpoint: None,
            payments_program: PAYMENTS_PROGRAM_ID,
            delegation_program: DELEGATION_PROGRAM_ID,
            permission_program: PERMISSION_PROGRAM_ID,
            session_program: SESSION_KEYS_PROGRAM_ID,
            session_validity_secs: None,
            permission_ping: true,
            timing: TimingConfig::default(),
        }
    }
}

impl SdkConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| PaymentsSdkError::Config(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            PaymentsSdkError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&raw)
    }

    pub fn rollup_endpoint(&self) -> &str {
        self.rollup_endpoint
            .as_deref()
            .unwrap_or_else(|| self.region.rpc_endpoint())
    }

    pub fn validator(&self) -> Pubkey {
        self.region.validator()
    }
}

/// Tokens the client knows how to display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInfo {
    pub symbol: &'static str,
    pub name: &'static str,
    pub mint: Pubkey,
    pub decimals: u8,
}

pub const USDC_DEVNET: TokenInfo = TokenInfo {
    symbol: "USDC",
    name: "USD Coin (Devnet)",
    mint: solana_sdk::pubkey!("4zMMC9srt5Ri5X14GAgXhaHii3GnPAEERYPJgZJDncDU"),
    decimals: 6,
};

pub const WRAPPED_SOL: TokenInfo = TokenInfo {
    symbol: "SOL",
    name: "Solana",
    mint: solana_sdk::pubkey!("So11111111111111111111111111111111111111112"),
    decimals: 9,
};

pub const SUPPORTED_TOKENS: [TokenInfo; 2] = [USDC_DEVNET, WRAPPED_SOL];

pub fn find_token(mint: &Pubkey) -> Option<&'static TokenInfo> {
    SUPPORTED_TOKENS.iter().find(|t| t.mint == *mint)
}

/// Base58 (de)serialization for program ids in config files.
mod pubkey_string {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};
    use solana_sdk::pubkey::Pubkey;
    use std::str::FromStr;

    pub fn serialize<S: Serializer>(key: &Pubkey, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&key.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Pubkey, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Pubkey::from_str(&raw).map_err(D::Error::custom)
    }
}
