//! Private transfer orchestration.
//!
//! Planning is a pure function of the two parties' balance states; the
//! client turns the planned steps into signed plan entries and submits them.

use crate::advanced::plan::{ActionPlan, AfterConfirm, PlanContext, PlanEntry, PlanStep};
use crate::basic::client::{token_symbol, PrivatePayments};
use crate::basic::relocation::RelocationEngine;
use crate::basic::session::Session;
use crate::core::config::TimingConfig;
use crate::error::{PaymentsSdkError, Result};
use crate::store::history::{HistoryEntry, HistoryKind};
use crate::types::BalanceView;
use crate::utils::{short_address, to_raw_amount};
use rust_decimal::Decimal;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub recipient: Pubkey,
    pub mint: Pubkey,
    /// Display units, e.g. `10.5` USDC
    pub amount: Decimal,
    pub decimals: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SenderState {
    pub exists: bool,
    pub delegated: bool,
    /// Authoritative amount already in custody
    pub custody: u64,
}

impl From<&BalanceView> for SenderState {
    fn from(view: &BalanceView) -> Self {
        Self {
            exists: view.exists(),
            delegated: view.is_delegated(),
            custody: view.amount,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecipientState {
    pub exists: bool,
    pub delegated: bool,
}

impl From<&BalanceView> for RecipientState {
    fn from(view: &BalanceView) -> Self {
        Self {
            exists: view.exists(),
            delegated: view.is_delegated(),
        }
    }
}

/// Tokens that must be moved into custody before the transfer.
pub fn amount_to_relocate(sender: &SenderState, amount: u64) -> u64 {
    amount.saturating_sub(sender.custody)
}

/// Minimal ordered steps to move `amount` from sender to recipient.
pub fn plan_transfer_steps(
    sender: &SenderState,
    recipient: &RecipientState,
    amount: u64,
) -> Vec<PlanStep> {
    let delta = amount_to_relocate(sender, amount);
    let mut steps = vec![PlanStep::CreateSession];

    // A delegated record must come back before the persistent ledger will
    // credit it again.
    let mut undelegating = false;
    if !sender.exists {
        steps.push(PlanStep::InitializeSender);
    } else if sender.delegated && delta > 0 {
        steps.push(PlanStep::Undelegate);
        undelegating = true;
    }

    if !recipient.exists {
        steps.push(PlanStep::InitializeRecipient);
    }
    if delta > 0 {
        steps.push(PlanStep::RelocateIn(delta));
    }
    if !sender.delegated || undelegating {
        steps.push(PlanStep::DelegateSender);
    }
    if !recipient.delegated {
        steps.push(PlanStep::DelegateRecipient);
    }

    steps.push(PlanStep::MoveDeposit(amount));
    steps.push(PlanStep::RevokeSession);
    steps
}

/// Turns planned steps into plan entries for one owner and mint.
pub(crate) struct EntryFactory<'a> {
    pub engine: &'a RelocationEngine,
    pub timing: &'a TimingConfig,
    pub owner: Pubkey,
    pub mint: Pubkey,
    pub recipient: Option<Pubkey>,
    pub session: Option<&'a Session>,
    /// What the undelegate entry waits for once confirmed
    pub undelegate_hook: AfterConfirm,
}

impl EntryFactory<'_> {
    fn session(&self, step: PlanStep) -> Result<&Session> {
        self.session.ok_or_else(|| {
            PaymentsSdkError::InvalidRequest(format!("`{}` needs a session", step.name()))
        })
    }

    fn recipient(&self, step: PlanStep) -> Result<Pubkey> {
        self.recipient.ok_or_else(|| {
            PaymentsSdkError::InvalidRequest(format!("`{}` needs a recipient", step.name()))
        })
    }

    pub fn entry(&self, step: PlanStep) -> Result<PlanEntry> {
        let (owner, mint) = (self.owner, self.mint);
        let entry = match step {
            PlanStep::CreateSession => {
                PlanEntry::new(step, vec![self.session(step)?.create_instruction.clone()])
                    .co_signed_by_session()
            },
            PlanStep::InitializeSender => {
                PlanEntry::new(step, self.engine.build_initialize(&owner, &owner, &mint)?)
            },
            PlanStep::Undelegate => PlanEntry::new(
                step,
                vec![self.engine.build_undelegate(&mint, self.session(step)?)?],
            )
            .then(self.undelegate_hook),
            PlanStep::InitializeRecipient => PlanEntry::new(
                step,
                self.engine
                    .build_initialize(&owner, &self.recipient(step)?, &mint)?,
            )
            .then(AfterConfirm::Settle(self.timing.recipient_settle_delay())),
            PlanStep::RelocateIn(amount) => PlanEntry::new(
                step,
                vec![self.engine.build_relocate(&owner, &mint, amount, true)?],
            ),
            PlanStep::DelegateSender => PlanEntry::new(
                step,
                vec![self.engine.build_delegate(&owner, &owner, &mint)?],
            ),
            PlanStep::DelegateRecipient => PlanEntry::new(
                step,
                vec![self
                    .engine
                    .build_delegate(&owner, &self.recipient(step)?, &mint)?],
            ),
            PlanStep::MoveDeposit(amount) => PlanEntry::new(
                step,
                vec![self.engine.build_move(
                    &owner,
                    &self.recipient(step)?,
                    &mint,
                    amount,
                    Some(self.session(step)?),
                )?],
            ),
            PlanStep::RevokeSession => {
                PlanEntry::new(step, vec![self.session(step)?.revoke_instruction.clone()])
            },
            PlanStep::RelocateOut(amount) => PlanEntry::new(
                step,
                vec![self.engine.build_relocate(&owner, &mint, amount, false)?],
            )
            .skip_preflight(),
        };
        Ok(entry)
    }
}

impl PrivatePayments {
    /// Privately move `request.amount` from the connected owner to the
    /// recipient through the rollup, returning the last entry's signature.
    ///
    /// A failure aborts the remaining entries. A session created before the
    /// failure is not revoked here; the signed revoke comes back in the
    /// error's `pending_revoke`, otherwise the session lapses at expiry.
    pub async fn transfer(&self, request: TransferRequest) -> Result<Signature> {
        let wallet = self.wallet()?.clone();
        let owner = wallet.pubkey();
        let rollup = self.rollup_for(&owner).await?;
        let amount = to_raw_amount(request.amount, request.decimals)?;
        if request.recipient == owner {
            return Err(PaymentsSdkError::InvalidRequest(
                "cannot transfer to self".to_string(),
            ));
        }

        let run = self.status.begin().ok_or_else(|| {
            PaymentsSdkError::InvalidRequest("another transfer is in flight".to_string())
        })?;
        self.status.report("Preparing transfer...", 10);

        let reader = self.reader(Some(rollup.clone()));
        self.status.report("Checking balances...", 20);
        let sender_view = reader.read_balance(&owner, &request.mint).await?;
        let recipient_view = reader
            .read_persistent(&request.recipient, &request.mint)
            .await?;

        let steps = plan_transfer_steps(
            &SenderState::from(&sender_view),
            &RecipientState::from(&recipient_view),
            amount,
        );
        info!(
            %owner,
            recipient = %request.recipient,
            amount,
            custody = sender_view.amount,
            steps = ?steps,
            "transfer planned"
        );

        self.status.report("Creating session...", 30);
        let session = self.sessions.create_session(&owner)?;

        self.status.report("Building transactions...", 40);
        let factory = EntryFactory {
            engine: &self.relocation,
            timing: &self.config.timing,
            owner,
            mint: request.mint,
            recipient: Some(request.recipient),
            session: Some(&session),
            undelegate_hook: AfterConfirm::AwaitCommitment,
        };
        let entries = steps
            .iter()
            .map(|step| factory.entry(*step).map(Some))
            .collect::<Result<Vec<_>>>()?;
        let plan = ActionPlan::new(entries);

        let ctx = PlanContext {
            persistent: self.persistent.as_ref(),
            rollup: Some(rollup.as_ref()),
            timing: &self.config.timing,
            delegation_program: self.config.delegation_program,
        };
        self.status.report("Signing transactions...", 80);
        let signed = plan
            .sign(&ctx, wallet.as_ref(), Some(&session.keypair))
            .await?;

        self.status.report("Broadcasting transactions...", 90);
        let signature = signed.submit(&ctx).await?;
        run.succeed("Transfer complete!");
        info!(%owner, %signature, "transfer complete");

        self.record_history(
            &owner,
            HistoryEntry::success(
                HistoryKind::Send,
                request.amount,
                token_symbol(&request.mint),
                short_address(&request.recipient),
                signature,
            ),
        )
        .await;
        Ok(signature)
    }
}
