use crate::core::connection::SolConnection;
use crate::error::{PaymentsSdkError, Result};
use crate::types::{Authority, BalanceView};
use crate::utils::{decode_deposit, derive_deposit_pda};
use solana_sdk::account::Account;
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use tracing::{debug, warn};

/// Best-effort request asking the rollup to let the reader see a delegated
/// record. Runs detached; failures are only logged.
#[derive(Clone)]
pub struct PermissionPing {
    endpoint: String,
    client: reqwest::Client,
}

impl PermissionPing {
    pub fn new(endpoint: impl ToString) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn spawn(&self, record: Pubkey) {
        let url = format!(
            "{}/permission?pubkey={}",
            self.endpoint.trim_end_matches('/'),
            record
        );
        let client = self.client.clone();
        tokio::spawn(async move {
            match client.get(&url).send().await {
                Ok(response) => debug!(%record, status = %response.status(), "permission ping"),
                Err(e) => warn!(%record, error = %e, "permission ping failed"),
            }
        });
    }
}

/// Reads balance records from the persistent ledger and, for delegated
/// records, their live copy in the rollup.
pub struct LedgerReader {
    persistent: Arc<dyn SolConnection>,
    rollup: Option<Arc<dyn SolConnection>>,
    program_id: Pubkey,
    delegation_program: Pubkey,
    ping: Option<PermissionPing>,
}

impl LedgerReader {
    pub fn new(
        persistent: Arc<dyn SolConnection>,
        program_id: Pubkey,
        delegation_program: Pubkey,
    ) -> Self {
        Self {
            persistent,
            rollup: None,
            program_id,
            delegation_program,
            ping: None,
        }
    }

    pub fn with_rollup(mut self, rollup: Arc<dyn SolConnection>) -> Self {
        self.rollup = Some(rollup);
        self
    }

    pub fn with_permission_ping(mut self, ping: PermissionPing) -> Self {
        self.ping = Some(ping);
        self
    }

    /// Current amount and controlling authority of (owner, mint).
    ///
    /// Both ledgers are read concurrently. A delegated record whose rollup
    /// copy cannot be read fails with `AccessDenied`: the persistent amount
    /// is stale and must not be used in its place.
    pub async fn read_balance(&self, owner: &Pubkey, mint: &Pubkey) -> Result<BalanceView> {
        let (address, _) = derive_deposit_pda(&self.program_id, owner, mint)?;

        let persistent_read = self.persistent.get_account(&address);
        let rollup_read = async {
            match &self.rollup {
                Some(rollup) => Some(rollup.get_account(&address).await),
                None => None,
            }
        };
        let (persistent, rollup) = tokio::join!(persistent_read, rollup_read);

        let persistent = persistent.map_err(|e| PaymentsSdkError::Connection(e.to_string()))?;
        let Some(account) = persistent else {
            debug!(%address, "no balance record");
            return Ok(BalanceView::absent(address));
        };

        match self.classify(&account)? {
            Authority::Resident => {
                let deposit = decode_deposit(&account.data)?;
                debug!(%address, amount = deposit.amount, "resident balance");
                Ok(BalanceView {
                    address,
                    amount: deposit.amount,
                    authority: Some(Authority::Resident),
                    exists_on_persistent: true,
                    exists_on_rollup: matches!(rollup, Some(Ok(Some(_)))),
                })
            },
            Authority::Delegated => {
                if let Some(ping) = &self.ping {
                    ping.spawn(address);
                }
                let live = match rollup {
                    Some(Ok(Some(live))) => live,
                    Some(Err(e)) => {
                        warn!(%address, error = %e, "rollup read failed for delegated record");
                        return Err(PaymentsSdkError::AccessDenied(address));
                    },
                    _ => return Err(PaymentsSdkError::AccessDenied(address)),
                };
                let deposit = decode_deposit(&live.data)?;
                debug!(%address, amount = deposit.amount, "delegated balance");
                Ok(BalanceView {
                    address,
                    amount: deposit.amount,
                    authority: Some(Authority::Delegated),
                    exists_on_persistent: true,
                    exists_on_rollup: true,
                })
            },
        }
    }

    /// Persistent-ledger view only. The amount of a delegated record is the
    /// last committed one and may be stale.
    pub async fn read_persistent(&self, owner: &Pubkey, mint: &Pubkey) -> Result<BalanceView> {
        let (address, _) = derive_deposit_pda(&self.program_id, owner, mint)?;
        let account = self
            .persistent
            .get_account(&address)
            .await
            .map_err(|e| PaymentsSdkError::Connection(e.to_string()))?;

        let Some(account) = account else {
            return Ok(BalanceView::absent(address));
        };
        let authority = self.classify(&account)?;
        let deposit = decode_deposit(&account.data)?;
        Ok(BalanceView {
            address,
            amount: deposit.amount,
            authority: Some(authority),
            exists_on_persistent: true,
            exists_on_rollup: false,
        })
    }

    fn classify(&self, account: &Account) -> Result<Authority> {
        if account.owner == self.delegation_program {
            Ok(Authority::Delegated)
        } else if account.owner == self.program_id {
            Ok(Authority::Resident)
        } else {
            Err(PaymentsSdkError::InvalidAccountData(format!(
                "balance record owned by unexpected program {}",
                account.owner
            )))
        }
    }
}
