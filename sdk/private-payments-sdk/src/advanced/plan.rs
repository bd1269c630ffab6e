//! Ordered, cross-ledger action plans.
//!
//! A plan is built from optional entries (absent ones are dropped), signed
//! in one pass and then submitted strictly in order. Each entry waits for
//! confirmation on its own ledger and runs its post-confirmation hook before
//! the next entry is sent.

use crate::core::config::TimingConfig;
use crate::core::connection::{SendOptions, SolConnection};
use crate::core::constants::{COMMIT_SIGNATURE_LOG, SCHEDULED_COMMIT_LOG};
use crate::core::signer::WalletSigner;
use crate::error::{PaymentsSdkError, Result};
use crate::types::SignatureStatus;
use crate::utils::find_logged_signature;
use solana_sdk::hash::Hash;
use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer};
use solana_sdk::transaction::Transaction;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Ledger an entry executes on. Rollup entries are paid for and signed by
/// the session key; persistent entries by the owner's wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerTarget {
    Persistent,
    Rollup,
}

impl LedgerTarget {
    /// Account paying for an entry on this ledger. `None` when the ledger
    /// needs a session key and there is none.
    pub fn fee_payer(self, owner: Pubkey, session: Option<&Keypair>) -> Option<Pubkey> {
        match self {
            LedgerTarget::Persistent => Some(owner),
            LedgerTarget::Rollup => session.map(|key| key.pubkey()),
        }
    }

    /// Entries here are signed by the session key alone, never the wallet.
    pub fn signed_by_session(self) -> bool {
        self == LedgerTarget::Rollup
    }
}

impl fmt::Display for LedgerTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerTarget::Persistent => write!(f, "persistent"),
            LedgerTarget::Rollup => write!(f, "rollup"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanStep {
    CreateSession,
    InitializeSender,
    /// Return the owner's record from the rollup to the persistent ledger
    Undelegate,
    InitializeRecipient,
    RelocateIn(u64),
    DelegateSender,
    DelegateRecipient,
    /// Balance move inside the rollup
    MoveDeposit(u64),
    RevokeSession,
    RelocateOut(u64),
}

impl PlanStep {
    pub fn name(&self) -> &'static str {
        match self {
            PlanStep::CreateSession => "createSession",
            PlanStep::InitializeSender => "initSender",
            PlanStep::Undelegate => "undelegate",
            PlanStep::InitializeRecipient => "initRecipient",
            PlanStep::RelocateIn(_) => "relocateIn",
            PlanStep::DelegateSender => "delegateSender",
            PlanStep::DelegateRecipient => "delegateRecipient",
            PlanStep::MoveDeposit(_) => "moveDeposit",
            PlanStep::RevokeSession => "revokeSession",
            PlanStep::RelocateOut(_) => "relocateOut",
        }
    }

    pub fn target(&self) -> LedgerTarget {
        match self {
            PlanStep::Undelegate | PlanStep::MoveDeposit(_) => LedgerTarget::Rollup,
            _ => LedgerTarget::Persistent,
        }
    }

    /// Status polls allowed before the entry counts as timed out.
    pub fn confirm_attempts(&self, timing: &TimingConfig) -> u32 {
        match self {
            PlanStep::Undelegate => timing.undelegate_confirm_attempts,
            _ => timing.confirm_attempts,
        }
    }
}

impl fmt::Display for PlanStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanStep::RelocateIn(amount)
            | PlanStep::MoveDeposit(amount)
            | PlanStep::RelocateOut(amount) => write!(f, "{}({})", self.name(), amount),
            _ => write!(f, "{}", self.name()),
        }
    }
}

/// What to wait for once an entry is confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AfterConfirm {
    Continue,
    Settle(Duration),
    /// Look for the commitment proof of a rollup undelegation, then pause.
    /// A missing proof is tolerated.
    AwaitCommitment,
    /// As `AwaitCommitment`, falling back to the persistent ledger's view of
    /// `record` when no proof shows up.
    AwaitUndelegation { record: Pubkey },
}

pub struct PlanEntry {
    pub step: PlanStep,
    pub instructions: Vec<Instruction>,
    /// Persistent entries that also need the session key's signature
    pub co_signed_by_session: bool,
    pub skip_preflight: bool,
    pub after_confirm: AfterConfirm,
}

impl PlanEntry {
    pub fn new(step: PlanStep, instructions: Vec<Instruction>) -> Self {
        Self {
            step,
            instructions,
            co_signed_by_session: false,
            skip_preflight: false,
            after_confirm: AfterConfirm::Continue,
        }
    }

    pub fn co_signed_by_session(mut self) -> Self {
        self.co_signed_by_session = true;
        self
    }

    pub fn skip_preflight(mut self) -> Self {
        self.skip_preflight = true;
        self
    }

    pub fn then(mut self, after_confirm: AfterConfirm) -> Self {
        self.after_confirm = after_confirm;
        self
    }
}

/// Connections and budgets an executing plan works against.
pub struct PlanContext<'a> {
    pub persistent: &'a dyn SolConnection,
    pub rollup: Option<&'a dyn SolConnection>,
    pub timing: &'a TimingConfig,
    pub delegation_program: Pubkey,
}

impl<'a> PlanContext<'a> {
    fn connection(&self, target: LedgerTarget) -> Result<&'a dyn SolConnection> {
        match target {
            LedgerTarget::Persistent => Ok(self.persistent),
            LedgerTarget::Rollup => self.rollup.ok_or_else(|| {
                PaymentsSdkError::InvalidRequest("rollup connection required".to_string())
            }),
        }
    }
}

pub struct ActionPlan {
    entries: Vec<PlanEntry>,
}

impl ActionPlan {
    pub fn new(entries: impl IntoIterator<Item = Option<PlanEntry>>) -> Self {
        Self {
            entries: entries.into_iter().flatten().collect(),
        }
    }

    pub fn steps(&self) -> Vec<PlanStep> {
        self.entries.iter().map(|e| e.step).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn touches(&self, target: LedgerTarget) -> bool {
        self.entries.iter().any(|e| e.step.target() == target)
    }

    /// Assign blockhashes and fee payers, then sign.
    ///
    /// Each ledger is asked for a blockhash once. Rollup entries are signed
    /// by the session key alone; every persistent entry goes to the wallet
    /// in a single batch.
    pub async fn sign(
        self,
        ctx: &PlanContext<'_>,
        wallet: &dyn WalletSigner,
        session: Option<&Keypair>,
    ) -> Result<SignedPlan> {
        if self.entries.is_empty() {
            return Err(PaymentsSdkError::InvalidRequest(
                "plan has no entries".to_string(),
            ));
        }

        let persistent_hash = if self.touches(LedgerTarget::Persistent) {
            Some(latest_blockhash(ctx, LedgerTarget::Persistent).await?)
        } else {
            None
        };
        let rollup_hash = if self.touches(LedgerTarget::Rollup) {
            Some(latest_blockhash(ctx, LedgerTarget::Rollup).await?)
        } else {
            None
        };

        let owner = wallet.pubkey();
        let missing_session = |step: PlanStep| {
            PaymentsSdkError::Signing(format!("`{}` needs a session key", step.name()))
        };
        let session_key = |step: PlanStep| session.ok_or_else(|| missing_session(step));

        let mut signed = Vec::with_capacity(self.entries.len());
        let mut wallet_batch = Vec::new();
        for entry in self.entries {
            let target = entry.step.target();
            let payer = target
                .fee_payer(owner, session)
                .ok_or_else(|| missing_session(entry.step))?;
            let blockhash = match target {
                LedgerTarget::Persistent => persistent_hash,
                LedgerTarget::Rollup => rollup_hash,
            }
            .ok_or_else(|| PaymentsSdkError::Connection(format!("no {} blockhash", target)))?;

            let mut tx = Transaction::new_with_payer(&entry.instructions, Some(&payer));
            tx.message.recent_blockhash = blockhash;

            if target.signed_by_session() {
                tx.try_sign(&[session_key(entry.step)?], blockhash)
                    .map_err(|e| PaymentsSdkError::Signing(e.to_string()))?;
            } else {
                if entry.co_signed_by_session {
                    tx.try_partial_sign(&[session_key(entry.step)?], blockhash)
                        .map_err(|e| PaymentsSdkError::Signing(e.to_string()))?;
                }
                wallet_batch.push(signed.len());
            }

            signed.push(SignedEntry {
                step: entry.step,
                tx,
                skip_preflight: entry.skip_preflight,
                after_confirm: entry.after_confirm,
            });
        }

        if !wallet_batch.is_empty() {
            let batch = wallet_batch.iter().map(|&i| signed[i].tx.clone()).collect();
            let returned = wallet
                .sign_transactions(batch)
                .await
                .map_err(PaymentsSdkError::Signing)?;
            if returned.len() != wallet_batch.len() {
                return Err(PaymentsSdkError::Signing(format!(
                    "wallet returned {} of {} transactions",
                    returned.len(),
                    wallet_batch.len()
                )));
            }
            for (index, tx) in wallet_batch.iter().zip(returned) {
                signed[*index].tx = tx;
            }
        }

        if let Some(entry) = signed.iter().find(|e| !e.tx.is_signed()) {
            return Err(PaymentsSdkError::Signing(format!(
                "`{}` is missing signatures",
                entry.step.name()
            )));
        }

        info!(
            entries = signed.len(),
            wallet_batch = wallet_batch.len(),
            "action plan signed"
        );
        Ok(SignedPlan { entries: signed })
    }
}

async fn latest_blockhash(ctx: &PlanContext<'_>, target: LedgerTarget) -> Result<Hash> {
    ctx.connection(target)?
        .get_latest_blockhash()
        .await
        .map_err(|e| PaymentsSdkError::Connection(format!("{} blockhash: {}", target, e)))
}

struct SignedEntry {
    step: PlanStep,
    tx: Transaction,
    skip_preflight: bool,
    after_confirm: AfterConfirm,
}

pub struct SignedPlan {
    entries: Vec<SignedEntry>,
}

impl SignedPlan {
    pub fn steps(&self) -> Vec<PlanStep> {
        self.entries.iter().map(|e| e.step).collect()
    }

    /// Submit entries one at a time and return the last signature.
    ///
    /// The first failure aborts the rest of the plan. Nothing is revoked
    /// automatically: when the aborted remainder holds the signed session
    /// revoke, it comes back in `SubmissionFailed::pending_revoke` for the
    /// caller to send before its blockhash expires.
    pub async fn submit(self, ctx: &PlanContext<'_>) -> Result<Signature> {
        let mut last = None;
        let mut entries = self.entries.into_iter();
        while let Some(entry) = entries.next() {
            match submit_entry(ctx, &entry).await {
                Ok(signature) => last = Some(signature),
                Err(PaymentsSdkError::SubmissionFailed { step, reason, .. }) => {
                    let pending_revoke = entries
                        .find(|rest| rest.step == PlanStep::RevokeSession)
                        .map(|rest| Box::new(rest.tx));
                    if pending_revoke.is_some() {
                        warn!(%step, "plan aborted with the session still open");
                    }
                    return Err(PaymentsSdkError::SubmissionFailed {
                        step,
                        reason,
                        pending_revoke,
                    });
                },
                Err(e) => return Err(e),
            }
        }

        last.ok_or_else(|| PaymentsSdkError::InvalidRequest("plan has no entries".to_string()))
    }
}

async fn submit_entry(ctx: &PlanContext<'_>, entry: &SignedEntry) -> Result<Signature> {
    let target = entry.step.target();
    let connection = ctx.connection(target)?;
    let options = SendOptions {
        skip_preflight: entry.skip_preflight,
    };

    let signature = connection
        .send_transaction_with_options(&entry.tx, options)
        .await
        .map_err(|e| PaymentsSdkError::submission(entry.step.name(), e))?;
    info!(step = %entry.step, ledger = %target, %signature, "plan entry submitted");

    await_confirmation(
        connection,
        &signature,
        entry.step.confirm_attempts(ctx.timing),
        ctx.timing,
    )
    .await
    .map_err(|reason| PaymentsSdkError::submission(entry.step.name(), reason))?;
    debug!(step = %entry.step, %signature, "plan entry confirmed");

    run_after_confirm(ctx, entry.after_confirm, &signature).await?;
    Ok(signature)
}

pub(crate) async fn await_confirmation(
    connection: &dyn SolConnection,
    signature: &Signature,
    attempts: u32,
    timing: &TimingConfig,
) -> std::result::Result<(), String> {
    for attempt in 1..=attempts {
        match connection.get_signature_status(signature).await {
            Ok(SignatureStatus::Confirmed) => return Ok(()),
            Ok(SignatureStatus::Failed(reason)) => return Err(reason),
            Ok(SignatureStatus::Pending) => {},
            Err(e) => debug!(%signature, attempt, error = %e, "status poll failed"),
        }
        if attempt < attempts {
            tokio::time::sleep(timing.confirm_interval()).await;
        }
    }
    Err(format!("not confirmed after {} attempts", attempts))
}

async fn run_after_confirm(
    ctx: &PlanContext<'_>,
    after: AfterConfirm,
    signature: &Signature,
) -> Result<()> {
    match after {
        AfterConfirm::Continue => {},
        AfterConfirm::Settle(delay) => tokio::time::sleep(delay).await,
        AfterConfirm::AwaitCommitment => {
            let rollup = ctx.connection(LedgerTarget::Rollup)?;
            if let Err(e) = await_commitment(rollup, signature, ctx.timing).await {
                warn!(error = %e, "continuing without commitment proof");
            }
            tokio::time::sleep(ctx.timing.post_undelegate_delay()).await;
        },
        AfterConfirm::AwaitUndelegation { record } => {
            let rollup = ctx.connection(LedgerTarget::Rollup)?;
            if let Err(e) = await_commitment(rollup, signature, ctx.timing).await {
                warn!(error = %e, %record, "checking persistent ledger for undelegation");
                match ctx.persistent.get_account(&record).await {
                    Ok(Some(account)) if account.owner == ctx.delegation_program => {
                        debug!(%record, "record still delegated, waiting");
                        tokio::time::sleep(ctx.timing.still_delegated_delay()).await;
                    },
                    Ok(_) => {},
                    Err(e) => warn!(%record, error = %e, "undelegation check failed"),
                }
            }
            tokio::time::sleep(ctx.timing.propagation_delay()).await;
        },
    }
    Ok(())
}

/// Persistent-ledger signature of the commit scheduled by a rollup
/// transaction.
pub async fn get_commitment_signature(
    rollup: &dyn SolConnection,
    signature: &Signature,
) -> Result<Signature> {
    let logs = rollup
        .get_transaction_logs(signature)
        .await
        .map_err(|e| PaymentsSdkError::Connection(e.to_string()))?
        .unwrap_or_default();
    let scheduled = find_logged_signature(&logs, SCHEDULED_COMMIT_LOG)
        .ok_or(PaymentsSdkError::CommitmentUnconfirmed(*signature))?;

    let logs = rollup
        .get_transaction_logs(&scheduled)
        .await
        .map_err(|e| PaymentsSdkError::Connection(e.to_string()))?
        .unwrap_or_default();
    find_logged_signature(&logs, COMMIT_SIGNATURE_LOG)
        .ok_or(PaymentsSdkError::CommitmentUnconfirmed(*signature))
}

/// Retry [`get_commitment_signature`] within the commitment budget.
pub async fn await_commitment(
    rollup: &dyn SolConnection,
    signature: &Signature,
    timing: &TimingConfig,
) -> Result<Signature> {
    for attempt in 1..=timing.commitment_attempts {
        match get_commitment_signature(rollup, signature).await {
            Ok(commit) => {
                info!(%signature, %commit, "commitment observed");
                return Ok(commit);
            },
            Err(e) => debug!(%signature, attempt, error = %e, "commitment not yet visible"),
        }
        if attempt < timing.commitment_attempts {
            tokio::time::sleep(timing.commitment_interval()).await;
        }
    }
    Err(PaymentsSdkError::CommitmentUnconfirmed(*signature))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::connection::ConnectionError;
    use async_trait::async_trait;
    use solana_sdk::account::Account;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn absent_entries_are_dropped_in_order() {
        let plan = ActionPlan::new([
            Some(PlanEntry::new(PlanStep::CreateSession, vec![])),
            None,
            Some(PlanEntry::new(PlanStep::MoveDeposit(7), vec![])),
            None,
            Some(PlanEntry::new(PlanStep::RevokeSession, vec![])),
        ]);

        assert_eq!(
            plan.steps(),
            vec![
                PlanStep::CreateSession,
                PlanStep::MoveDeposit(7),
                PlanStep::RevokeSession
            ]
        );
        assert!(plan.touches(LedgerTarget::Rollup));
    }

    #[test]
    fn only_rollup_steps_target_the_rollup() {
        assert_eq!(PlanStep::Undelegate.target(), LedgerTarget::Rollup);
        assert_eq!(PlanStep::MoveDeposit(1).target(), LedgerTarget::Rollup);
        assert_eq!(PlanStep::RelocateIn(1).target(), LedgerTarget::Persistent);
        assert_eq!(PlanStep::RevokeSession.target(), LedgerTarget::Persistent);
        assert_eq!(PlanStep::RelocateOut(5).to_string(), "relocateOut(5)");
    }

    #[test]
    fn fee_payer_follows_the_target() {
        let owner = Pubkey::new_unique();
        let session = Keypair::new();

        assert_eq!(
            LedgerTarget::Persistent.fee_payer(owner, Some(&session)),
            Some(owner)
        );
        assert_eq!(
            LedgerTarget::Rollup.fee_payer(owner, Some(&session)),
            Some(session.pubkey())
        );
        assert_eq!(LedgerTarget::Rollup.fee_payer(owner, None), None);
        assert!(LedgerTarget::Rollup.signed_by_session());
        assert!(!LedgerTarget::Persistent.signed_by_session());
    }

    /// Accepts every transaction and never confirms any.
    #[derive(Default)]
    struct StalledLedger {
        polls: AtomicU32,
    }

    #[async_trait]
    impl SolConnection for StalledLedger {
        async fn send_transaction_with_options(
            &self,
            _tx: &Transaction,
            _options: SendOptions,
        ) -> std::result::Result<Signature, ConnectionError> {
            Ok(Signature::default())
        }

        async fn get_signature_status(
            &self,
            _signature: &Signature,
        ) -> std::result::Result<SignatureStatus, ConnectionError> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            Ok(SignatureStatus::Pending)
        }

        async fn get_account(
            &self,
            _pubkey: &Pubkey,
        ) -> std::result::Result<Option<Account>, ConnectionError> {
            Ok(None)
        }

        async fn get_latest_blockhash(&self) -> std::result::Result<Hash, ConnectionError> {
            Ok(Hash::default())
        }

        async fn get_transaction_logs(
            &self,
            _signature: &Signature,
        ) -> std::result::Result<Option<Vec<String>>, ConnectionError> {
            Ok(None)
        }
    }

    fn signed(steps: &[(PlanStep, Transaction)]) -> SignedPlan {
        SignedPlan {
            entries: steps
                .iter()
                .map(|(step, tx)| SignedEntry {
                    step: *step,
                    tx: tx.clone(),
                    skip_preflight: false,
                    after_confirm: AfterConfirm::Continue,
                })
                .collect(),
        }
    }

    fn timing() -> TimingConfig {
        TimingConfig {
            confirm_attempts: 4,
            undelegate_confirm_attempts: 2,
            ..TimingConfig::immediate()
        }
    }

    #[tokio::test]
    async fn undelegation_has_its_own_confirmation_budget() {
        let ledger = StalledLedger::default();
        let timing = timing();
        let ctx = PlanContext {
            persistent: &ledger,
            rollup: Some(&ledger),
            timing: &timing,
            delegation_program: Pubkey::new_unique(),
        };

        let err = signed(&[(PlanStep::Undelegate, Transaction::default())])
            .submit(&ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentsSdkError::SubmissionFailed { ref step, .. } if step == "undelegate"));
        assert_eq!(ledger.polls.load(Ordering::SeqCst), 2);

        let err = signed(&[(PlanStep::RelocateOut(1), Transaction::default())])
            .submit(&ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentsSdkError::SubmissionFailed { ref step, .. } if step == "relocateOut"));
        assert_eq!(ledger.polls.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn aborted_plan_hands_back_the_signed_revoke() {
        let ledger = StalledLedger::default();
        let timing = timing();
        let ctx = PlanContext {
            persistent: &ledger,
            rollup: None,
            timing: &timing,
            delegation_program: Pubkey::new_unique(),
        };
        let marker = Pubkey::new_unique();
        let revoke = Transaction::new_with_payer(&[], Some(&marker));

        let err = signed(&[
            (PlanStep::RelocateIn(1), Transaction::default()),
            (PlanStep::DelegateSender, Transaction::default()),
            (PlanStep::RevokeSession, revoke.clone()),
        ])
        .submit(&ctx)
        .await
        .unwrap_err();

        match err {
            PaymentsSdkError::SubmissionFailed {
                step,
                pending_revoke,
                ..
            } => {
                assert_eq!(step, "relocateIn");
                assert_eq!(pending_revoke.as_deref(), Some(&revoke));
            },
            other => panic!("unexpected error: {}", other),
        }

        // Nothing to hand back once the revoke itself is what failed
        let err = signed(&[(PlanStep::RevokeSession, revoke)])
            .submit(&ctx)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PaymentsSdkError::SubmissionFailed {
                pending_revoke: None,
                ..
            }
        ));
    }
}
