use crate::types::{AuthToken, SignatureStatus};
use async_trait::async_trait;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::{RpcSendTransactionConfig, RpcTransactionConfig};
use solana_sdk::account::Account;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::Transaction;
use solana_transaction_status::UiTransactionEncoding;
use std::error::Error;
use std::sync::Arc;
use tracing::{debug, warn};

pub type ConnectionError = Box<dyn Error + Send + Sync>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendOptions {
    pub skip_preflight: bool,
}

/// One ledger, addressed by account and transaction signature.
///
/// Both the persistent ledger and the rollup are reached through this
/// trait; only the endpoint (and the rollup's bearer token) differ.
#[async_trait]
pub trait SolConnection: Send + Sync {
    async fn send_transaction_with_options(
        &self,
        tx: &Transaction,
        options: SendOptions,
    ) -> Result<Signature, ConnectionError>;

    async fn send_transaction(&self, tx: &Transaction) -> Result<Signature, ConnectionError> {
        self.send_transaction_with_options(tx, SendOptions::default())
            .await
    }

    async fn get_signature_status(
        &self,
        signature: &Signature,
    ) -> Result<SignatureStatus, ConnectionError>;

    async fn get_account(&self, pubkey: &Pubkey) -> Result<Option<Account>, ConnectionError>;

    async fn get_latest_blockhash(&self) -> Result<Hash, ConnectionError>;

    /// Log messages of a confirmed transaction, `None` when it carries no
    /// status metadata.
    async fn get_transaction_logs(
        &self,
        signature: &Signature,
    ) -> Result<Option<Vec<String>>, ConnectionError>;
}

/// Hands out a rollup connection for an authorization token.
pub trait RollupConnector: Send + Sync {
    fn connect(&self, token: &AuthToken) -> Arc<dyn SolConnection>;
}

/// JSON-RPC backed [`SolConnection`].
pub struct RpcConnection {
    client: RpcClient,
    commitment: CommitmentConfig,
}

impl RpcConnection {
    pub fn new(url: impl ToString) -> Self {
        let commitment = CommitmentConfig::confirmed();
        Self {
            client: RpcClient::new_with_commitment(url.to_string(), commitment),
            commitment,
        }
    }

    /// Rollup endpoint authorized by a bearer token carried in the query.
    pub fn ephemeral(endpoint: &str, token: &AuthToken) -> Self {
        Self::new(format!(
            "{}?token={}",
            endpoint.trim_end_matches('/'),
            token.token
        ))
    }

    pub fn url(&self) -> String {
        self.client.url()
    }
}

#[async_trait]
impl SolConnection for RpcConnection {
    async fn send_transaction_with_options(
        &self,
        tx: &Transaction,
        options: SendOptions,
    ) -> Result<Signature, ConnectionError> {
        let config = RpcSendTransactionConfig {
            skip_preflight: options.skip_preflight,
            preflight_commitment: Some(self.commitment.commitment),
            ..RpcSendTransactionConfig::default()
        };
        Ok(self.client.send_transaction_with_config(tx, config).await?)
    }

    async fn get_signature_status(
        &self,
        signature: &Signature,
    ) -> Result<SignatureStatus, ConnectionError> {
        let status = self
            .client
            .get_signature_status_with_commitment(signature, self.commitment)
            .await?;
        Ok(match status {
            None => SignatureStatus::Pending,
            Some(Ok(())) => SignatureStatus::Confirmed,
            Some(Err(e)) => SignatureStatus::Failed(e.to_string()),
        })
    }

    async fn get_account(&self, pubkey: &Pubkey) -> Result<Option<Account>, ConnectionError> {
        Ok(self
            .client
            .get_account_with_commitment(pubkey, self.commitment)
            .await?
            .value)
    }

    async fn get_latest_blockhash(&self) -> Result<Hash, ConnectionError> {
        Ok(self.client.get_latest_blockhash().await?)
    }

    async fn get_transaction_logs(
        &self,
        signature: &Signature,
    ) -> Result<Option<Vec<String>>, ConnectionError> {
        let config = RpcTransactionConfig {
            encoding: Some(UiTransactionEncoding::Json),
            commitment: Some(self.commitment),
            max_supported_transaction_version: Some(0),
        };
        let tx = self
            .client
            .get_transaction_with_config(signature, config)
            .await?;
        Ok(tx
            .transaction
            .meta
            .and_then(|meta| Option::<Vec<String>>::from(meta.log_messages)))
    }
}

/// Connects to a fixed rollup endpoint over JSON-RPC.
pub struct RpcRollupConnector {
    endpoint: String,
}

impl RpcRollupConnector {
    pub fn new(endpoint: impl ToString) -> Self {
        Self {
            endpoint: endpoint.to_string(),
        }
    }
}

impl RollupConnector for RpcRollupConnector {
    fn connect(&self, token: &AuthToken) -> Arc<dyn SolConnection> {
        Arc::new(RpcConnection::ephemeral(&self.endpoint, token))
    }
}

/// Probe the rollup's health endpoint. Any failure reads as unhealthy.
pub async fn check_rollup_health(endpoint: &str) -> bool {
    let url = format!("{}/health", endpoint.trim_end_matches('/'));
    match reqwest::get(&url).await {
        Ok(response) => {
            debug!(%url, status = %response.status(), "rollup health probe");
            response.status().is_success()
        },
        Err(e) => {
            warn!(%url, error = %e, "rollup health probe failed");
            false
        },
    }
}
