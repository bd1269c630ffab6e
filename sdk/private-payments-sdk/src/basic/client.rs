use crate::advanced::plan::{await_commitment, await_confirmation};
use crate::basic::actions::{DelegateBuilder, DepositBuilder, UndelegateBuilder};
use crate::basic::auth::{AuthManager, HttpRollupAuthenticator, RollupAuthenticator};
use crate::basic::reader::{LedgerReader, PermissionPing};
use crate::basic::relocation::RelocationEngine;
use crate::basic::session::SessionManager;
use crate::basic::status::StatusReporter;
use crate::core::config::{find_token, SdkConfig};
use crate::core::connection::{
    check_rollup_health, RollupConnector, RpcConnection, RpcRollupConnector, SolConnection,
};
use crate::core::signer::WalletSigner;
use crate::error::{PaymentsSdkError, Result};
use crate::store::history::{HistoryEntry, HistoryKind, HistoryStore, MemoryHistoryStore};
use crate::store::tokens::{AuthTokenStore, MemoryTokenStore};
use crate::types::{BalanceView, DepositInfo, TransferStatus};
use crate::utils::{short_address, to_raw_amount};
use rust_decimal::Decimal;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::Transaction;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

/// Entry point for private transfers and withdrawals of one connected owner.
pub struct PrivatePayments {
    pub(crate) config: SdkConfig,
    pub(crate) persistent: Arc<dyn SolConnection>,
    pub(crate) rollup_connector: Arc<dyn RollupConnector>,
    pub(crate) wallet: Option<Arc<dyn WalletSigner>>,
    pub(crate) auth: AuthManager,
    pub(crate) history: Arc<dyn HistoryStore>,
    pub(crate) status: StatusReporter,
    pub(crate) sessions: SessionManager,
    pub(crate) relocation: RelocationEngine,
}

pub struct PrivatePaymentsBuilder {
    config: SdkConfig,
    persistent: Option<Arc<dyn SolConnection>>,
    rollup_connector: Option<Arc<dyn RollupConnector>>,
    wallet: Option<Arc<dyn WalletSigner>>,
    token_store: Option<Arc<dyn AuthTokenStore>>,
    history: Option<Arc<dyn HistoryStore>>,
    authenticator: Option<Arc<dyn RollupAuthenticator>>,
}

impl PrivatePaymentsBuilder {
    pub fn new(config: SdkConfig) -> Self {
        Self {
            config,
            persistent: None,
            rollup_connector: None,
            wallet: None,
            token_store: None,
            history: None,
            authenticator: None,
        }
    }

    pub fn with_persistent_connection(mut self, connection: Arc<dyn SolConnection>) -> Self {
        self.persistent = Some(connection);
        self
    }

    pub fn with_rollup_connector(mut self, connector: Arc<dyn RollupConnector>) -> Self {
        self.rollup_connector = Some(connector);
        self
    }

    pub fn with_wallet(mut self, wallet: Arc<dyn WalletSigner>) -> Self {
        self.wallet = Some(wallet);
        self
    }

    pub fn with_token_store(mut self, store: Arc<dyn AuthTokenStore>) -> Self {
        self.token_store = Some(store);
        self
    }

    pub fn with_history_store(mut self, store: Arc<dyn HistoryStore>) -> Self {
        self.history = Some(store);
        self
    }

    pub fn with_authenticator(mut self, authenticator: Arc<dyn RollupAuthenticator>) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    /// Unset collaborators default to JSON-RPC connections from the config,
    /// in-memory stores and the HTTP rollup handshake.
    pub fn build(self) -> PrivatePayments {
        let config = self.config;
        let endpoint = config.rollup_endpoint().to_string();

        let persistent = self
            .persistent
            .unwrap_or_else(|| Arc::new(RpcConnection::new(&config.rpc_url)));
        let rollup_connector = self
            .rollup_connector
            .unwrap_or_else(|| Arc::new(RpcRollupConnector::new(&endpoint)));
        let token_store = self
            .token_store
            .unwrap_or_else(|| Arc::new(MemoryTokenStore::new()));
        let history = self
            .history
            .unwrap_or_else(|| Arc::new(MemoryHistoryStore::new()));

        let authenticator = self
            .authenticator
            .unwrap_or_else(|| Arc::new(HttpRollupAuthenticator::new()));
        let auth = AuthManager::new(&endpoint, token_store).with_authenticator(authenticator);

        let sessions = SessionManager::new(config.session_program, config.payments_program)
            .with_validity_secs(config.session_validity_secs);
        let relocation = RelocationEngine::from_config(&config);

        PrivatePayments {
            config,
            persistent,
            rollup_connector,
            wallet: self.wallet,
            auth,
            history,
            status: StatusReporter::new(),
            sessions,
            relocation,
        }
    }
}

impl PrivatePayments {
    pub fn builder(config: SdkConfig) -> PrivatePaymentsBuilder {
        PrivatePaymentsBuilder::new(config)
    }

    pub fn config(&self) -> &SdkConfig {
        &self.config
    }

    pub fn auth(&self) -> &AuthManager {
        &self.auth
    }

    pub fn history(&self) -> &Arc<dyn HistoryStore> {
        &self.history
    }

    pub fn relocation(&self) -> &RelocationEngine {
        &self.relocation
    }

    pub fn subscribe_status(&self) -> watch::Receiver<Option<TransferStatus>> {
        self.status.subscribe()
    }

    pub fn status(&self) -> Option<TransferStatus> {
        self.status.current()
    }

    pub fn is_transferring(&self) -> bool {
        self.status.is_running()
    }

    pub(crate) fn wallet(&self) -> Result<&Arc<dyn WalletSigner>> {
        self.wallet.as_ref().ok_or(PaymentsSdkError::WalletUnavailable)
    }

    /// The connected owner.
    pub fn owner(&self) -> Result<Pubkey> {
        Ok(self.wallet()?.pubkey())
    }

    /// Run the rollup handshake for the connected owner.
    pub async fn authenticate(&self) -> Result<()> {
        self.auth.authenticate(self.wallet()?.as_ref()).await?;
        Ok(())
    }

    pub async fn is_authenticated(&self) -> Result<bool> {
        self.auth.is_authenticated(&self.owner()?).await
    }

    pub async fn check_rollup_health(&self) -> bool {
        check_rollup_health(self.config.rollup_endpoint()).await
    }

    /// Rollup connection authorized for `owner`.
    pub(crate) async fn rollup_for(&self, owner: &Pubkey) -> Result<Arc<dyn SolConnection>> {
        let token = self.auth.require(owner).await?;
        Ok(self.rollup_connector.connect(&token))
    }

    pub(crate) fn reader(&self, rollup: Option<Arc<dyn SolConnection>>) -> LedgerReader {
        let mut reader = LedgerReader::new(
            self.persistent.clone(),
            self.config.payments_program,
            self.config.delegation_program,
        );
        if let Some(rollup) = rollup {
            reader = reader.with_rollup(rollup);
        }
        if self.config.permission_ping {
            reader = reader.with_permission_ping(PermissionPing::new(self.config.rollup_endpoint()));
        }
        reader
    }

    /// Read any owner's record, using the connected owner's rollup
    /// authorization when there is one.
    pub async fn read_balance(&self, owner: &Pubkey, mint: &Pubkey) -> Result<BalanceView> {
        let rollup = match &self.wallet {
            Some(wallet) => match self.auth.token_for(&wallet.pubkey()).await? {
                Some(token) => Some(self.rollup_connector.connect(&token)),
                None => None,
            },
            None => None,
        };
        self.reader(rollup).read_balance(owner, mint).await
    }

    /// The connected owner's custodied balance in display units.
    pub async fn deposit_info(&self, mint: &Pubkey, decimals: u8) -> Result<DepositInfo> {
        let view = self.read_balance(&self.owner()?, mint).await?;
        Ok(DepositInfo {
            amount: view.ui_amount(decimals),
            is_delegated: view.is_delegated(),
            raw_amount: view.amount,
        })
    }

    /// Move tokens into custody, creating the record when missing. Only
    /// valid while the record is resident.
    pub async fn deposit_tokens(
        &self,
        mint: &Pubkey,
        amount: Decimal,
        decimals: u8,
    ) -> Result<Signature> {
        let owner = self.owner()?;
        let raw = to_raw_amount(amount, decimals)?;
        let view = self.reader(None).read_persistent(&owner, mint).await?;
        if view.is_delegated() {
            return Err(PaymentsSdkError::InvalidRequest(
                "deposit is delegated; undelegate it first".to_string(),
            ));
        }

        let tx = DepositBuilder::new()
            .with_engine(self.relocation.clone())
            .with_owner(owner)
            .with_mint(*mint)
            .with_amount(raw)
            .with_initialize(!view.exists())
            .build_transaction(self.persistent.as_ref())
            .await?;
        let signature = self
            .send_with_wallet(tx, self.persistent.as_ref(), "deposit", None)
            .await?;

        self.record_history(
            &owner,
            HistoryEntry::success(
                HistoryKind::Deposit,
                amount,
                token_symbol(mint),
                short_address(&owner),
                signature,
            ),
        )
        .await;
        Ok(signature)
    }

    /// Delegate the connected owner's resident record to the rollup.
    pub async fn delegate_deposit(&self, mint: &Pubkey) -> Result<Signature> {
        let owner = self.owner()?;
        let view = self.reader(None).read_persistent(&owner, mint).await?;
        if !view.exists() || view.is_delegated() {
            return Err(PaymentsSdkError::InvalidRequest(
                "only an existing resident deposit can be delegated".to_string(),
            ));
        }

        let tx = DelegateBuilder::new()
            .with_engine(self.relocation.clone())
            .with_owner(owner)
            .with_mint(*mint)
            .build_transaction(self.persistent.as_ref())
            .await?;
        self.send_with_wallet(tx, self.persistent.as_ref(), "delegate", None)
            .await
    }

    /// Owner-signed undelegation inside the rollup, without a session.
    pub async fn undelegate_deposit(&self, mint: &Pubkey) -> Result<Signature> {
        let owner = self.owner()?;
        let rollup = self.rollup_for(&owner).await?;

        let tx = UndelegateBuilder::new()
            .with_engine(self.relocation.clone())
            .with_owner(owner)
            .with_mint(*mint)
            .build_transaction(rollup.as_ref())
            .await?;
        let attempts = self.config.timing.undelegate_confirm_attempts;
        let signature = self
            .send_with_wallet(tx, rollup.as_ref(), "undelegate", Some(attempts))
            .await?;

        if let Err(e) = await_commitment(rollup.as_ref(), &signature, &self.config.timing).await {
            warn!(error = %e, "undelegation commitment not observed");
        }
        Ok(signature)
    }

    async fn send_with_wallet(
        &self,
        tx: Transaction,
        connection: &dyn SolConnection,
        step: &str,
        confirm_attempts: Option<u32>,
    ) -> Result<Signature> {
        let mut signed = self
            .wallet()?
            .sign_transactions(vec![tx])
            .await
            .map_err(PaymentsSdkError::Signing)?;
        let tx = signed
            .pop()
            .ok_or_else(|| PaymentsSdkError::Signing("wallet returned nothing".to_string()))?;

        let signature = connection
            .send_transaction(&tx)
            .await
            .map_err(|e| PaymentsSdkError::submission(step, e))?;
        let timing = &self.config.timing;
        let attempts = confirm_attempts.unwrap_or(timing.confirm_attempts);
        await_confirmation(connection, &signature, attempts, timing)
            .await
            .map_err(|reason| PaymentsSdkError::submission(step, reason))?;
        info!(step, %signature, "confirmed");
        Ok(signature)
    }

    /// History writes never fail the operation that produced them.
    pub(crate) async fn record_history(&self, owner: &Pubkey, entry: HistoryEntry) {
        if let Err(e) = self.history.record(owner, entry).await {
            warn!(%owner, error = %e, "failed to record history");
        }
    }
}

pub(crate) fn token_symbol(mint: &Pubkey) -> String {
    find_token(mint)
        .map(|t| t.symbol.to_string())
        .unwrap_or_else(|| short_address(mint))
}
